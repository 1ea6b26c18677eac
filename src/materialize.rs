//! Raw engine output to a typed pixel buffer.

use crate::engine::RawDecode;
use crate::error::{J2kViewError, Result};
use crate::properties::{BitDepth, CodestreamProperties};

/// Channel masks of [`DecodedImage::Packed`] pixels, in R, G, B, A order.
pub const PACKED_CHANNEL_MASKS: [u32; 4] = [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000];

/// Decoded pixels, one sample (or packed pixel) per `width * height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedImage {
    Gray8(Vec<u8>),
    Gray16(Vec<u16>),
    /// ARGB, see [`PACKED_CHANNEL_MASKS`].
    Packed(Vec<u32>),
}

impl DecodedImage {
    pub fn len(&self) -> usize {
        match self {
            Self::Gray8(v) => v.len(),
            Self::Gray16(v) => v.len(),
            Self::Packed(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bit_depth(&self) -> BitDepth {
        match self {
            Self::Gray8(_) => BitDepth::Gray8,
            Self::Gray16(_) => BitDepth::Gray16,
            Self::Packed(_) => BitDepth::Packed24,
        }
    }

    pub fn channel_masks(&self) -> Option<[u32; 4]> {
        matches!(self, Self::Packed(_)).then_some(PACKED_CHANNEL_MASKS)
    }

    /// Samples as bytes: gray8 as is, gray16 big-endian, packed as RGB triplets.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Gray8(v) => v.clone(),
            Self::Gray16(v) => v.iter().flat_map(|s| s.to_be_bytes()).collect(),
            Self::Packed(v) => v
                .iter()
                .flat_map(|&p| [(p >> 16) as u8, (p >> 8) as u8, p as u8])
                .collect(),
        }
    }
}

/// Builds the typed buffer from `raw`.
///
/// The packed buffer wins over 16-bit, which wins over 8-bit; the engine
/// filling more than one is still an error. Every buffer must hold exactly
/// `width * height` samples, and an image without pixels is no image.
pub fn materialize(raw: RawDecode) -> Result<(DecodedImage, CodestreamProperties)> {
    if raw.populated() > 1 {
        return Err(J2kViewError::AmbiguousImage);
    }
    let mut properties = raw
        .properties
        .ok_or_else(|| J2kViewError::Engine("no codestream properties reported".to_string()))?;

    let image = if let Some(packed) = raw.packed {
        DecodedImage::Packed(packed)
    } else if let Some(gray16) = raw.gray16 {
        DecodedImage::Gray16(gray16)
    } else if let Some(gray8) = raw.gray8 {
        DecodedImage::Gray8(gray8)
    } else {
        return Err(J2kViewError::NoImage);
    };

    let expected = properties.pixel_count();
    if expected == 0 {
        return Err(J2kViewError::NoImage);
    }
    if image.len() != expected {
        return Err(J2kViewError::BufferLengthMismatch {
            expected,
            actual: image.len(),
            width: properties.width,
            height: properties.height,
        });
    }

    if image.bit_depth() != properties.bit_depth {
        log::warn!(
            "engine reported {} bits but filled the {}-bit buffer",
            properties.bit_depth.bits(),
            image.bit_depth().bits()
        );
        properties.bit_depth = image.bit_depth();
    }

    Ok((image, properties))
}
