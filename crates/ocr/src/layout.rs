//! Reading-order reconstruction: clusters recognized tokens into text lines
//! by vertical proximity, orders lines top to bottom and tokens left to right.

use scanline_core::{Detection, GroupingStrategy, LayoutSettings, Line, MalformedDetection};
use std::fmt;
use tracing::debug;

pub const DEFAULT_Y_THRESHOLD: f32 = 20.0;

/// A line under construction: its anchor and the input indices of its members.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub anchor_y: f32,
    pub members: Vec<usize>,
}

impl Cluster {
    fn new(anchor_y: f32, first: usize) -> Self {
        Self { anchor_y, members: vec![first] }
    }
}

/// Decides which line each token belongs to.
///
/// `centers` holds the vertical center of every detection in input order.
/// Every index must end up in exactly one cluster.
pub trait LineGrouper: Send + Sync {
    fn name(&self) -> &'static str;
    fn group(&self, centers: &[f32], threshold: f32) -> Vec<Cluster>;
}

/// Greedy, single pass: a token joins the first line (in creation order)
/// whose anchor is strictly within `threshold`. The anchor is frozen at the
/// center of the line's first token, so results depend on input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatch;

impl LineGrouper for FirstMatch {
    fn name(&self) -> &'static str {
        "first_match"
    }

    fn group(&self, centers: &[f32], threshold: f32) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();
        for (index, &center) in centers.iter().enumerate() {
            match clusters
                .iter_mut()
                .find(|c| (c.anchor_y - center).abs() < threshold)
            {
                Some(cluster) => cluster.members.push(index),
                None => clusters.push(Cluster::new(center, index)),
            }
        }
        clusters
    }
}

/// Like [`FirstMatch`] but a token joins the line with the closest frozen
/// anchor. Ties go to the older line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestAnchor;

impl LineGrouper for NearestAnchor {
    fn name(&self) -> &'static str {
        "nearest"
    }

    fn group(&self, centers: &[f32], threshold: f32) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();
        for (index, &center) in centers.iter().enumerate() {
            let mut best: Option<(usize, f32)> = None;
            for (i, cluster) in clusters.iter().enumerate() {
                let distance = (cluster.anchor_y - center).abs();
                if distance < threshold && best.map_or(true, |(_, d)| distance < d) {
                    best = Some((i, distance));
                }
            }
            match best {
                Some((i, _)) => clusters[i].members.push(index),
                None => clusters.push(Cluster::new(center, index)),
            }
        }
        clusters
    }
}

/// First-match scan where a line's anchor is recentered to the mean center
/// of its members after every join.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningCentroid;

impl LineGrouper for RunningCentroid {
    fn name(&self) -> &'static str {
        "running_centroid"
    }

    fn group(&self, centers: &[f32], threshold: f32) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();
        for (index, &center) in centers.iter().enumerate() {
            match clusters
                .iter_mut()
                .find(|c| (c.anchor_y - center).abs() < threshold)
            {
                Some(cluster) => {
                    cluster.members.push(index);
                    let sum: f32 = cluster.members.iter().map(|&m| centers[m]).sum();
                    cluster.anchor_y = sum / cluster.members.len() as f32;
                }
                None => clusters.push(Cluster::new(center, index)),
            }
        }
        clusters
    }
}

pub fn grouper_for(strategy: GroupingStrategy) -> Box<dyn LineGrouper> {
    match strategy {
        GroupingStrategy::FirstMatch => Box::new(FirstMatch),
        GroupingStrategy::Nearest => Box::new(NearestAnchor),
        GroupingStrategy::RunningCentroid => Box::new(RunningCentroid),
    }
}

pub struct LineReconstructor {
    threshold: f32,
    grouper: Box<dyn LineGrouper>,
}

impl fmt::Debug for LineReconstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineReconstructor")
            .field("threshold", &self.threshold)
            .field("grouper", &self.grouper.name())
            .finish()
    }
}

impl Default for LineReconstructor {
    fn default() -> Self {
        Self::new(DEFAULT_Y_THRESHOLD)
    }
}

impl LineReconstructor {
    /// Frozen-anchor, first-match grouping with the given threshold.
    pub fn new(threshold: f32) -> Self {
        Self::with_grouper(threshold, Box::new(FirstMatch))
    }

    pub fn with_strategy(threshold: f32, strategy: GroupingStrategy) -> Self {
        Self::with_grouper(threshold, grouper_for(strategy))
    }

    pub fn with_grouper(threshold: f32, grouper: Box<dyn LineGrouper>) -> Self {
        Self { threshold, grouper }
    }

    pub fn from_settings(settings: &LayoutSettings) -> Self {
        Self::with_strategy(settings.y_threshold, settings.strategy)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Group detections into lines sorted by anchor, members sorted by left
    /// edge. Fails without partial output if any polygon is empty.
    pub fn reconstruct_lines(
        &self,
        detections: Vec<Detection>,
    ) -> Result<Vec<Line>, MalformedDetection> {
        let centers = detections
            .iter()
            .enumerate()
            .map(|(index, d)| d.vertical_center().ok_or(MalformedDetection { index }))
            .collect::<Result<Vec<f32>, _>>()?;

        let clusters = self.grouper.group(&centers, self.threshold);
        let grouper = self.grouper.name();

        let mut slots: Vec<Option<Detection>> = detections.into_iter().map(Some).collect();
        let mut lines: Vec<Line> = clusters
            .into_iter()
            .filter_map(|cluster| {
                let members: Vec<Detection> = cluster
                    .members
                    .iter()
                    .filter_map(|&i| {
                        let taken = slots.get_mut(i).and_then(Option::take);
                        debug_assert!(
                            taken.is_some(),
                            "grouper {grouper} placed detection #{i} twice or out of range"
                        );
                        taken
                    })
                    .collect();
                (!members.is_empty()).then_some(Line { anchor_y: cluster.anchor_y, members })
            })
            .collect();
        debug_assert!(
            slots.iter().all(Option::is_none),
            "grouper {grouper} left detections unplaced"
        );

        lines.sort_by(|a, b| a.anchor_y.total_cmp(&b.anchor_y));
        for line in &mut lines {
            line.members
                .sort_by(|a, b| left_key(a).total_cmp(&left_key(b)));
        }

        debug!(
            tokens = centers.len(),
            lines = lines.len(),
            grouper = self.grouper.name(),
            "reconstructed lines"
        );
        Ok(lines)
    }

    /// One sentence per line, top to bottom, tokens joined by a single space.
    /// Lines whose sentence is blank are dropped.
    pub fn reconstruct(&self, detections: Vec<Detection>) -> Result<Vec<String>, MalformedDetection> {
        Ok(self
            .reconstruct_lines(detections)?
            .iter()
            .filter(|line| !line.is_blank())
            .map(Line::sentence)
            .collect())
    }
}

// Only called after every polygon was checked to be non-empty.
fn left_key(d: &Detection) -> f32 {
    d.left_edge().unwrap_or(f32::INFINITY)
}
