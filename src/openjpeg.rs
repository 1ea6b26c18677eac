//! [`DecodeEngine`] backed by OpenJPEG through the `jpeg2k` crate.
//!
//! Tile decodes are issued as area decodes over the tile's rectangle, so a
//! tile always comes back at the reduction that was asked for. The
//! tile/reduction bounds come from this crate's own header reader, not from
//! OpenJPEG.

use crate::codestream::{self, CodestreamHeader};
use crate::components::{ComponentPlane, pack_components};
use crate::engine::{DecodeEngine, RawDecode};
use crate::error::{J2kViewError, Result};
use crate::parameters::{Area, DecodeParameters, DecodeRequest};
use crate::properties::BitDepth;
use crate::source::SourceHandle;

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenJpegEngine;

impl OpenJpegEngine {
    pub fn new() -> Self {
        Self
    }
}

fn to_decode_area(area: Area) -> Result<jpeg2k::DecodeArea> {
    let coord = |v: i32| {
        u32::try_from(v).map_err(|_| J2kViewError::AreaUnusable(area.to_string()))
    };
    if area.x1 <= area.x0 || area.y1 <= area.y0 {
        return Err(J2kViewError::AreaUnusable(area.to_string()));
    }
    Ok(jpeg2k::DecodeArea::new(
        coord(area.x0)?,
        coord(area.y0)?,
        coord(area.x1)?,
        coord(area.y1)?,
    ))
}

fn decode_parameters(header: &CodestreamHeader, request: DecodeRequest) -> Result<jpeg2k::DecodeParameters> {
    let check_reduction = |reduction: u32| {
        if reduction >= header.resolution_count() {
            return Err(J2kViewError::ReductionOutOfRange {
                level: reduction as i64,
                max_reduction: header.resolution_count(),
            });
        }
        Ok(reduction)
    };
    let params = jpeg2k::DecodeParameters::new();
    Ok(match request {
        DecodeRequest::Whole { reduction } => params.reduce(check_reduction(reduction)?),
        DecodeRequest::Tile { index, reduction } => params
            .reduce(check_reduction(reduction)?)
            .decode_area(Some(to_decode_area(header.tile_rect(index)?)?)),
        DecodeRequest::Area(area) => params.decode_area(Some(to_decode_area(area)?)),
    })
}

impl DecodeEngine for OpenJpegEngine {
    fn decode(&self, source: &SourceHandle, params: &DecodeParameters) -> Result<RawDecode> {
        let bytes = source.read_bytes()?;
        let header = codestream::read_header(&bytes)?;
        let request = params.request();
        let j2k_params = decode_parameters(&header, request)?;

        let image = jpeg2k::Image::from_bytes_with(&bytes[..], j2k_params)
            .map_err(|e| J2kViewError::Engine(e.to_string()))?;
        let planes: Vec<ComponentPlane> = image
            .components()
            .iter()
            .map(|c| ComponentPlane {
                width: c.width(),
                height: c.height(),
                precision: c.precision(),
                signed: c.is_signed(),
                data: c.data().to_vec(),
            })
            .collect();
        log::debug!(
            "openjpeg returned {} component(s) for {:?}",
            planes.len(),
            request
        );

        let mut raw = pack_components(&planes)?;
        let bit_depth = if raw.packed.is_some() {
            BitDepth::Packed24
        } else if raw.gray16.is_some() {
            BitDepth::Gray16
        } else {
            BitDepth::Gray8
        };
        let (width, height) = planes
            .first()
            .map(|p| (p.width, p.height))
            .unwrap_or_default();
        raw.properties = Some(header.properties(width, height, bit_depth));
        Ok(raw)
    }

    fn name(&self) -> &'static str {
        "openjpeg"
    }
}
