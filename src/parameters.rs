//! Decode request state and the rules for switching between decode modes.
//!
//! A [`DecodeParameters`] value is never mutated in place. Every setter
//! validates its input and returns a new value, so the exclusivity between
//! area decoding and tile/reduction decoding holds for every value that can
//! be observed.

use crate::error::{J2kViewError, Result};
use crate::properties::Bounds;
use std::fmt;
use std::str::FromStr;

/// Pixel rectangle on the reference grid, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Area {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Area {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// The zero rectangle stands for "no area".
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl FromStr for Area {
    type Err = J2kViewError;

    fn from_str(s: &str) -> Result<Self> {
        let unusable = || J2kViewError::AreaUnusable(s.to_string());
        let values = s
            .trim()
            .split(',')
            .map(|t| t.trim().parse::<i32>().map_err(|_| unusable()))
            .collect::<Result<Vec<_>>>()?;
        match values[..] {
            [x0, y0, x1, y1] => Ok(Self::new(x0, y0, x1, y1)),
            _ => Err(unusable()),
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x0, self.y0, self.x1, self.y1)
    }
}

/// What the engine is asked to decode, resolved from [`DecodeParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRequest {
    Whole { reduction: u32 },
    Tile { index: u32, reduction: u32 },
    Area(Area),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeParameters {
    tile: Option<u32>,
    reduction: u32,
    area: Option<Area>,
    tile_override: bool,
    reduction_override: bool,
    area_override: bool,
}

impl DecodeParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile(&self) -> Option<u32> {
        self.tile
    }

    pub fn reduction(&self) -> u32 {
        self.reduction
    }

    pub fn area(&self) -> Option<Area> {
        self.area
    }

    pub fn tile_override(&self) -> bool {
        self.tile_override
    }

    pub fn reduction_override(&self) -> bool {
        self.reduction_override
    }

    pub fn area_override(&self) -> bool {
        self.area_override
    }

    /// Selects a tile. The current reduction is re-requested against it.
    pub fn with_tile(&self, index: i64, bounds: Bounds) -> Result<Self> {
        let index = bounds.check_tile(index)?;
        Ok(Self {
            tile: Some(index),
            reduction: self.reduction,
            area: None,
            tile_override: true,
            reduction_override: true,
            area_override: false,
        })
    }

    pub fn with_reduction(&self, level: i64, bounds: Bounds) -> Result<Self> {
        let level = bounds.check_reduction(level)?;
        Ok(Self {
            tile: self.tile,
            reduction: level,
            area: None,
            tile_override: true,
            reduction_override: true,
            area_override: false,
        })
    }

    /// Switches to area decoding. The rectangle is not checked against the
    /// image; out-of-range areas are the engine's to clamp or reject.
    pub fn with_area(&self, area: Area) -> Self {
        Self {
            tile: None,
            reduction: 0,
            area: Some(area),
            tile_override: false,
            reduction_override: false,
            area_override: true,
        }
    }

    /// Back to whole-image decoding at full resolution.
    pub fn reset(&self) -> Self {
        Self::default()
    }

    /// Drops a tile or reduction that `bounds` no longer admits, keeping the
    /// rest of the request.
    pub fn constrain(&self, bounds: Bounds) -> (Self, Option<J2kViewError>) {
        let mut next = *self;
        let mut error = None;
        if let Some(tile) = self.tile {
            if let Err(e) = bounds.check_tile(tile as i64) {
                next.tile = None;
                error = Some(e);
            }
        }
        if let Err(e) = bounds.check_reduction(self.reduction as i64) {
            next.reduction = 0;
            error.get_or_insert(e);
        }
        if next.tile.is_none() && next.reduction == 0 {
            next.tile_override = false;
            next.reduction_override = false;
        }
        (next, error)
    }

    pub fn request(&self) -> DecodeRequest {
        if self.area_override {
            return match self.area {
                Some(area) if !area.is_zero() => DecodeRequest::Area(area),
                _ => DecodeRequest::Whole { reduction: 0 },
            };
        }
        if self.tile_override && self.reduction_override {
            return match self.tile {
                Some(index) => DecodeRequest::Tile {
                    index,
                    reduction: self.reduction,
                },
                None => DecodeRequest::Whole {
                    reduction: self.reduction,
                },
            };
        }
        DecodeRequest::Whole { reduction: 0 }
    }
}
