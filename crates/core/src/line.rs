use serde::{Deserialize, Serialize};

use crate::detection::Detection;

/// Detections judged to sit on the same visual row of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Vertical key the line was clustered on.
    pub anchor_y: f32,
    pub members: Vec<Detection>,
}

impl Line {
    pub fn new(anchor_y: f32, first: Detection) -> Self {
        Self { anchor_y, members: vec![first] }
    }

    /// Member texts joined by a single space, in member order.
    pub fn sentence(&self) -> String {
        self.members
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_blank(&self) -> bool {
        self.members.iter().all(|d| d.text.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentence_joins_with_single_space() {
        let mut line = Line::new(10.0, Detection::from_rect("Hello", 0.0, 0.0, 10.0, 20.0));
        line.members.push(Detection::from_rect("World", 20.0, 0.0, 10.0, 20.0));
        assert_eq!(line.sentence(), "Hello World");
        assert_eq!(line.len(), 2);
    }

    #[test]
    fn blank_when_every_member_is_whitespace() {
        let mut line = Line::new(0.0, Detection::from_rect(" ", 0.0, 0.0, 1.0, 1.0));
        line.members.push(Detection::from_rect("", 5.0, 0.0, 1.0, 1.0));
        assert!(line.is_blank());
        assert_eq!(line.sentence().trim(), "");

        line.members.push(Detection::from_rect("x", 9.0, 0.0, 1.0, 1.0));
        assert!(!line.is_blank());
    }
}
