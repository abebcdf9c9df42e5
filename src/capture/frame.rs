use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::capture::config::ImageQuality;
use crate::error::{Result, StealthError};

/// One encoded screen frame ready for the outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFrame {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// Wraps bytes that are already encoded (e.g. a JPEG from the webview).
    pub fn encoded(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            width: 0,
            height: 0,
            data,
        }
    }
}

/// Encode a raw RGBA capture as JPEG, downscaling to the quality preset's long edge.
pub fn encode_frame(width: u32, height: u32, rgba: Vec<u8>, quality: ImageQuality) -> Result<ImageFrame> {
    let buffer = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        StealthError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame buffer does not match {width}x{height} RGBA"),
        ))
    })?;
    let mut image = DynamicImage::ImageRgba8(buffer);

    let max_edge = quality.max_edge();
    if width.max(height) > max_edge {
        image = image.resize(max_edge, max_edge, FilterType::Triangle);
    }
    let rgb = image.to_rgb8();

    let mut out = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.jpeg_quality());
    encoder.encode_image(&rgb)?;

    Ok(ImageFrame {
        mime_type: "image/jpeg".to_string(),
        width: rgb.width(),
        height: rgb.height(),
        data: out.into_inner(),
    })
}
