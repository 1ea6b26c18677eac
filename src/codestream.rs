//! JPEG 2000 main-header inspection.
//!
//! Reads the SIZ and COD segments of a raw codestream or of the `jp2c` box of
//! a JP2 file. This is all that is needed to know how many tiles and
//! resolution levels a source offers, and where each tile sits on the
//! reference grid. Tile-part data is never touched.

use crate::error::{J2kViewError, Result};
use crate::jp2;
use crate::marker_code::{MARKER_START_BYTE, MarkerCode};
use crate::parameters::Area;
use crate::properties::{BitDepth, CodestreamProperties};
use crate::stream_reader::CodestreamReader;

const CODESTREAM_MAGIC: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

/// Isot is a 16-bit field, so no codestream can address more tiles.
const MAX_TILE_COUNT: u32 = 65535;

/// Per-component SIZ information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentInfo {
    /// Bit depth (1..=38).
    pub depth: u8,
    pub is_signed: bool,
    /// Horizontal subsampling factor.
    pub dx: u8,
    /// Vertical subsampling factor.
    pub dy: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodingStyle {
    pub coding_style: u8,
    pub progression_order: u8,
    pub number_of_layers: u16,
    pub mct: u8,
    pub decomposition_levels: u8,
    pub codeblock_width_exp: u8,
    pub codeblock_height_exp: u8,
    pub transformation: u8,
}

#[derive(Debug, Clone, Default)]
pub struct CodestreamHeader {
    /// Right edge of the image area on the reference grid (Xsiz).
    pub x_siz: u32,
    /// Bottom edge of the image area on the reference grid (Ysiz).
    pub y_siz: u32,
    pub x_origin: u32,
    pub y_origin: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_x_origin: u32,
    pub tile_y_origin: u32,
    pub components: Vec<ComponentInfo>,
    pub cod: Option<CodingStyle>,
}

/// Cheap capability test: a raw codestream or a JP2 container.
pub fn probe_bytes(data: &[u8]) -> bool {
    data.starts_with(&CODESTREAM_MAGIC) || jp2::is_jp2(data)
}

/// Parses the main header of a raw codestream or JP2 file.
pub fn read_header(data: &[u8]) -> Result<CodestreamHeader> {
    let codestream = jp2::find_codestream(data)?.unwrap_or(data);
    HeaderParser::new(codestream).parse()
}

impl CodestreamHeader {
    pub fn width(&self) -> u32 {
        self.x_siz - self.x_origin
    }

    pub fn height(&self) -> u32 {
        self.y_siz - self.y_origin
    }

    pub fn tiles_across(&self) -> u32 {
        (self.x_siz - self.tile_x_origin).div_ceil(self.tile_width)
    }

    pub fn tiles_down(&self) -> u32 {
        (self.y_siz - self.tile_y_origin).div_ceil(self.tile_height)
    }

    pub fn tile_count(&self) -> u32 {
        self.tiles_across() * self.tiles_down()
    }

    /// Number of resolution levels, i.e. the exclusive upper bound on the
    /// reduction a decode may ask for.
    pub fn resolution_count(&self) -> u32 {
        self.cod
            .map(|c| c.decomposition_levels as u32 + 1)
            .unwrap_or(1)
    }

    /// The image area covered by tile `index`, clipped to the image.
    pub fn tile_rect(&self, index: u32) -> Result<Area> {
        if index >= self.tile_count() {
            return Err(J2kViewError::TileOutOfRange {
                index: index as i64,
                max_tiles: self.tile_count(),
            });
        }
        let p = index % self.tiles_across();
        let q = index / self.tiles_across();
        let x0 = (self.tile_x_origin + p * self.tile_width).max(self.x_origin);
        let y0 = (self.tile_y_origin + q * self.tile_height).max(self.y_origin);
        let x1 = (self.tile_x_origin as u64 + (p as u64 + 1) * self.tile_width as u64)
            .min(self.x_siz as u64) as u32;
        let y1 = (self.tile_y_origin as u64 + (q as u64 + 1) * self.tile_height as u64)
            .min(self.y_siz as u64) as u32;
        grid_area(x0, y0, x1, y1)
    }

    /// The image area itself.
    pub fn image_rect(&self) -> Result<Area> {
        grid_area(self.x_origin, self.y_origin, self.x_siz, self.y_siz)
    }

    /// Size of `rect` once `reduction` resolution levels are discarded.
    pub fn reduced_size(rect: Area, reduction: u32) -> (u32, u32) {
        let scale = 1i64 << reduction.min(31);
        let shrink = |a: i32, b: i32| {
            let lo = (a.max(0) as i64 + scale - 1) / scale;
            let hi = (b.max(0) as i64 + scale - 1) / scale;
            (hi - lo).max(0) as u32
        };
        (shrink(rect.x0, rect.x1), shrink(rect.y0, rect.y1))
    }

    /// Which pixel buffer a full decode of this codestream materializes into.
    pub fn output_depth(&self) -> Result<BitDepth> {
        let unsupported = |c: &ComponentInfo| J2kViewError::UnsupportedDepth {
            components: self.components.len(),
            precision: c.depth as u32,
        };
        let first = self
            .components
            .first()
            .ok_or(J2kViewError::InvalidCodestream("no components"))?;
        let alike = |n: usize| {
            self.components[..n]
                .iter()
                .all(|c| c.depth == first.depth && c.dx == first.dx && c.dy == first.dy)
        };
        // Luma plus two coarser, equally subsampled chroma components.
        let subsampled_chroma = match self.components.as_slice() {
            [y, cb, cr] => {
                (cb.depth, cb.dx, cb.dy) == (cr.depth, cr.dx, cr.dy)
                    && cb.depth == y.depth
                    && y.depth <= 31
                    && cb.dx >= y.dx
                    && cb.dy >= y.dy
            }
            _ => false,
        };
        match self.components.len() {
            n if n >= 3 && alike(3) => Ok(BitDepth::Packed24),
            3 if subsampled_chroma => Ok(BitDepth::Packed24),
            2 if alike(2) => Ok(BitDepth::Packed24),
            // Anything else decodes as its first component.
            _ if first.depth <= 8 => Ok(BitDepth::Gray8),
            _ if first.depth <= 16 => Ok(BitDepth::Gray16),
            _ => Err(unsupported(first)),
        }
    }

    /// Properties a decode of `width` x `height` pixels from this codestream reports.
    pub fn properties(&self, width: u32, height: u32, bit_depth: BitDepth) -> CodestreamProperties {
        CodestreamProperties {
            width,
            height,
            bit_depth,
            max_tiles: self.tile_count(),
            max_reduction: self.resolution_count(),
            image_width: self.width(),
            image_height: self.height(),
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            component_count: self.components.len() as u32,
        }
    }
}

/// Reference-grid corners as an [`Area`], which only holds `i32` coordinates.
fn grid_area(x0: u32, y0: u32, x1: u32, y1: u32) -> Result<Area> {
    let coord = |v: u32| {
        i32::try_from(v)
            .map_err(|_| J2kViewError::InvalidCodestream("reference grid coordinate beyond i32 range"))
    };
    Ok(Area::new(coord(x0)?, coord(y0)?, coord(x1)?, coord(y1)?))
}

struct HeaderParser<'a> {
    reader: CodestreamReader<'a>,
    header: CodestreamHeader,
    seen_siz: bool,
}

impl<'a> HeaderParser<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            reader: CodestreamReader::new(data),
            header: CodestreamHeader::default(),
            seen_siz: false,
        }
    }

    fn parse(mut self) -> Result<CodestreamHeader> {
        if self.reader.read_marker()? != MarkerCode::StartOfCodestream {
            return Err(J2kViewError::InvalidCodestream("expected SOC marker"));
        }

        loop {
            if self.reader.read_u8()? != MARKER_START_BYTE {
                return Err(J2kViewError::InvalidCodestream("marker start byte not found"));
            }
            let code = self.reader.read_u8()?;
            match MarkerCode::try_from(code) {
                Ok(MarkerCode::ImageAndTileSize) => self.parse_siz()?,
                Ok(MarkerCode::CodingStyleDefault) => self.parse_cod()?,
                Ok(MarkerCode::StartOfTile) | Ok(MarkerCode::EndOfCodestream) => break,
                Ok(marker) if marker.is_delimiter() => {
                    return Err(J2kViewError::InvalidCodestream("unexpected delimiter in main header"));
                }
                Ok(_) => self.reader.skip_segment()?,
                Err(_) => {
                    log::debug!("skipping unrecognised main-header marker 0xFF{:02X}", code);
                    self.reader.skip_segment()?;
                }
            }
        }

        if !self.seen_siz {
            return Err(J2kViewError::InvalidCodestream("missing SIZ segment"));
        }
        log::debug!(
            "codestream {}x{}, {} tile(s), {} resolution(s)",
            self.header.width(),
            self.header.height(),
            self.header.tile_count(),
            self.header.resolution_count()
        );
        Ok(self.header)
    }

    fn parse_siz(&mut self) -> Result<()> {
        let len = self.reader.read_u16()?;
        let _caps = self.reader.read_u16()?; // Rsiz
        let h = &mut self.header;
        h.x_siz = self.reader.read_u32()?;
        h.y_siz = self.reader.read_u32()?;
        h.x_origin = self.reader.read_u32()?;
        h.y_origin = self.reader.read_u32()?;
        h.tile_width = self.reader.read_u32()?;
        h.tile_height = self.reader.read_u32()?;
        h.tile_x_origin = self.reader.read_u32()?;
        h.tile_y_origin = self.reader.read_u32()?;

        let comps = self.reader.read_u16()?;
        if len as usize != 38 + 3 * comps as usize {
            return Err(J2kViewError::InvalidCodestream("SIZ length does not match component count"));
        }
        if comps == 0 {
            return Err(J2kViewError::InvalidCodestream("no components"));
        }
        if h.x_siz <= h.x_origin || h.y_siz <= h.y_origin {
            return Err(J2kViewError::InvalidCodestream("empty image area"));
        }
        if h.tile_width == 0 || h.tile_height == 0 {
            return Err(J2kViewError::InvalidCodestream("zero tile size"));
        }
        if h.tile_x_origin > h.x_origin || h.tile_y_origin > h.y_origin {
            return Err(J2kViewError::InvalidCodestream("tile origin past image origin"));
        }
        if !h
            .tiles_across()
            .checked_mul(h.tiles_down())
            .is_some_and(|n| n <= MAX_TILE_COUNT)
        {
            return Err(J2kViewError::InvalidCodestream("tile grid exceeds 65535 tiles"));
        }

        h.components.clear();
        for _ in 0..comps {
            let ssiz = self.reader.read_u8()?;
            let dx = self.reader.read_u8()?;
            let dy = self.reader.read_u8()?;
            if dx == 0 || dy == 0 {
                return Err(J2kViewError::InvalidCodestream("zero subsampling factor"));
            }
            h.components.push(ComponentInfo {
                depth: (ssiz & 0x7F) + 1,
                is_signed: (ssiz & 0x80) != 0,
                dx,
                dy,
            });
        }
        self.seen_siz = true;
        Ok(())
    }

    fn parse_cod(&mut self) -> Result<()> {
        let len = self.reader.read_u16()?;
        // Scod, SGcod (4) and the fixed part of SPcod (5) plus the length field.
        if len < 12 {
            return Err(J2kViewError::InvalidCodestream("COD segment too short"));
        }
        let cod = CodingStyle {
            coding_style: self.reader.read_u8()?,
            progression_order: self.reader.read_u8()?,
            number_of_layers: self.reader.read_u16()?,
            mct: self.reader.read_u8()?,
            decomposition_levels: self.reader.read_u8()?,
            codeblock_width_exp: self.reader.read_u8()?,
            codeblock_height_exp: self.reader.read_u8()?,
            transformation: {
                let _codeblock_style = self.reader.read_u8()?;
                self.reader.read_u8()?
            },
        };
        if cod.decomposition_levels > 32 {
            return Err(J2kViewError::InvalidCodestream("too many decomposition levels"));
        }
        // Precinct sizes, if any, are not needed here.
        self.reader.advance(len as usize - 12)?;
        self.header.cod = Some(cod);
        Ok(())
    }
}

pub fn progression_order_name(order: u8) -> &'static str {
    match order {
        0 => "LRCP",
        1 => "RLCP",
        2 => "RPCL",
        3 => "PCRL",
        4 => "CPRL",
        _ => "Unknown",
    }
}
