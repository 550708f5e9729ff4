//! Image payload helpers shared by the vision-capable adapters.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Sniff an image media type from its leading bytes.
///
/// PNG, GIF and WEBP are recognized; anything else is treated as JPEG.
#[must_use]
pub fn sniff_media_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// Base64-encode image bytes (standard alphabet, padded)
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// `data:` URL for an image
#[must_use]
pub fn data_url(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_media_type(bytes), encode_base64(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(sniff_media_type(b"\x89PNG\r\n\x1a\n...."), "image/png");
        assert_eq!(sniff_media_type(b"GIF89a......"), "image/gif");
        assert_eq!(sniff_media_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(sniff_media_type(b"\xff\xd8\xff\xe0"), "image/jpeg");
        assert_eq!(sniff_media_type(b""), "image/jpeg");
    }

    #[test]
    fn test_data_url() {
        assert_eq!(data_url(b"GIF89a"), "data:image/gif;base64,R0lGODlh");
    }
}
