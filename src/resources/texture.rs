//! Image decoding for texture loads.

use crate::error::LoadError;

/// A decoded image as tightly packed RGBA8 rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Decode any format `image` was built with, sniffing it from the bytes.
pub fn decode_texture(bytes: &[u8], url: &str) -> Result<DecodedImage, LoadError> {
    let img = image::load_from_memory(bytes).map_err(|e| LoadError::Decode {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(LoadError::Decode {
            url: url.to_owned(),
            reason: format!("empty image {width}x{height}"),
        });
    }
    Ok(DecodedImage {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_texture(b"definitely not a png", "bad.png").unwrap_err();
        assert!(matches!(err, LoadError::Decode { url, .. } if url == "bad.png"));
    }
}
