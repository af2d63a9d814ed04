//! Frame → JPEG data URL + fingerprint.

use assetlens_core::{Frame, FrameOrigin, ImageFingerprint, LensError};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::debug;

pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// A frame after encoding. The pixel buffer is gone at this point.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// `data:image/jpeg;base64,...`
    pub data_url: String,
    pub fingerprint: ImageFingerprint,
    pub width: u32,
    pub height: u32,
    pub origin: FrameOrigin,
}

/// Encode a frame to a JPEG data URL and derive its fingerprint from the encoded string.
///
/// Identical pixels always produce the same fingerprint, so re-submitted
/// camera frames of an unchanged scene dedupe.
pub fn encode_frame(frame: Frame, quality: u8) -> Result<EncodedFrame, LensError> {
    let (width, height, origin) = (frame.width(), frame.height(), frame.origin);
    let rgba = RgbaImage::from_raw(width, height, frame.into_rgba())
        .ok_or_else(|| LensError::InvalidFrame("buffer does not match dimensions".into()))?;
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| LensError::InvalidFrame(format!("jpeg encoding failed: {e}")))?;

    let data_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg));
    let fingerprint = fingerprint_of(&data_url);
    debug!(
        %fingerprint,
        dimensions = %format!("{width}x{height}"),
        image_size = data_url.len(),
        "Encoded frame"
    );

    Ok(EncodedFrame { data_url, fingerprint, width, height, origin })
}

fn fingerprint_of(data_url: &str) -> ImageFingerprint {
    let digest = Sha256::digest(data_url.as_bytes());
    ImageFingerprint::new(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4], origin: FrameOrigin) -> Frame {
        let pixels = rgba.repeat((width * height) as usize);
        Frame::new(width, height, pixels, origin).unwrap()
    }

    #[test]
    fn produces_jpeg_data_url() {
        let encoded = encode_frame(solid(8, 8, [200, 10, 10, 255], FrameOrigin::Camera), 80).unwrap();
        assert!(encoded.data_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(encoded.width, 8);
        assert_eq!(encoded.origin, FrameOrigin::Camera);
    }

    #[test]
    fn same_pixels_same_fingerprint() {
        let a = encode_frame(solid(4, 4, [1, 2, 3, 255], FrameOrigin::Camera), 90).unwrap();
        let b = encode_frame(solid(4, 4, [1, 2, 3, 255], FrameOrigin::Upload), 90).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn different_pixels_different_fingerprint() {
        let a = encode_frame(solid(4, 4, [0, 0, 0, 255], FrameOrigin::Camera), 90).unwrap();
        let b = encode_frame(solid(4, 4, [255, 255, 255, 255], FrameOrigin::Camera), 90).unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
    }
}
