use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Image data is empty")]
    Empty,
    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Decode a base64 image payload, accepting an optional
/// `data:<mime>;base64,` prefix and embedded line breaks.
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, PayloadError> {
    let body = strip_data_url(payload.trim());
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(PayloadError::Empty);
    }

    let bytes = STANDARD.decode(compact)?;
    if bytes.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(bytes)
}

fn strip_data_url(payload: &str) -> &str {
    match payload.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(rest, |(_, data)| data),
        None => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 PNG
    const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    #[test]
    fn decodes_plain_base64() {
        let bytes = decode_base64_image(TINY_PNG_BASE64).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[test]
    fn strips_data_url_prefix() {
        let payload = format!("data:image/png;base64,{TINY_PNG_BASE64}");
        assert_eq!(
            decode_base64_image(&payload).unwrap(),
            decode_base64_image(TINY_PNG_BASE64).unwrap()
        );
    }

    #[test]
    fn tolerates_wrapped_lines() {
        let (a, b) = TINY_PNG_BASE64.split_at(40);
        let payload = format!("{a}\n{b}\n");
        assert_eq!(&decode_base64_image(&payload).unwrap()[..4], b"\x89PNG");
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(decode_base64_image(""), Err(PayloadError::Empty)));
        assert!(matches!(decode_base64_image("  \n"), Err(PayloadError::Empty)));
        assert!(matches!(
            decode_base64_image("data:image/png;base64,"),
            Err(PayloadError::Empty)
        ));
    }

    #[test]
    fn malformed_base64_is_rejected() {
        assert!(matches!(
            decode_base64_image("not-valid-base64!!!"),
            Err(PayloadError::InvalidBase64(_))
        ));
    }
}
