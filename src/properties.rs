//! Codestream-wide metadata reported by a decode.

use crate::error::J2kViewError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Depth of the materialized pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[num_enum(error_type(name = J2kViewError, constructor = BitDepth::unsupported))]
#[repr(u8)]
pub enum BitDepth {
    /// One 8-bit gray sample per pixel.
    Gray8 = 8,
    /// One 16-bit gray sample per pixel.
    Gray16 = 16,
    /// Packed ARGB, 8 bits per channel.
    Packed24 = 24,
}

impl BitDepth {
    fn unsupported(bits: u8) -> J2kViewError {
        J2kViewError::UnsupportedDepth {
            components: 0,
            precision: bits as u32,
        }
    }

    pub fn bits(self) -> u32 {
        u8::from(self) as u32
    }
}

/// Snapshot of what the engine reported for the last successful decode.
///
/// Replaced wholesale on every decode, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodestreamProperties {
    /// Width of the decoded output in pixels.
    pub width: u32,
    /// Height of the decoded output in pixels.
    pub height: u32,
    pub bit_depth: BitDepth,
    /// Number of tiles in the codestream (`tiles_across * tiles_down`).
    pub max_tiles: u32,
    /// Number of resolution levels; valid reductions are `0..max_reduction`.
    pub max_reduction: u32,
    /// Full-resolution image width on the reference grid.
    pub image_width: u32,
    /// Full-resolution image height on the reference grid.
    pub image_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub component_count: u32,
}

impl CodestreamProperties {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            max_tiles: self.max_tiles,
            max_reduction: self.max_reduction,
        }
    }
}

/// Tile and reduction limits used to validate requests. Zero means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub max_tiles: u32,
    pub max_reduction: u32,
}

impl Bounds {
    pub const UNKNOWN: Bounds = Bounds {
        max_tiles: 0,
        max_reduction: 0,
    };

    pub fn check_tile(&self, index: i64) -> Result<u32, J2kViewError> {
        let err = || J2kViewError::TileOutOfRange {
            index,
            max_tiles: self.max_tiles,
        };
        if index < 0 || (self.max_tiles > 0 && index >= self.max_tiles as i64) {
            return Err(err());
        }
        u32::try_from(index).map_err(|_| err())
    }

    pub fn check_reduction(&self, level: i64) -> Result<u32, J2kViewError> {
        let err = || J2kViewError::ReductionOutOfRange {
            level,
            max_reduction: self.max_reduction,
        };
        if level < 0 || (self.max_reduction > 0 && level >= self.max_reduction as i64) {
            return Err(err());
        }
        u32::try_from(level).map_err(|_| err())
    }
}
