//! Turns decoded component planes into one of the three raw sample buffers.

use crate::engine::RawDecode;
use crate::error::{J2kViewError, Result};

/// One decoded component, as the wavelet decoder hands it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPlane {
    pub width: u32,
    pub height: u32,
    /// Bits per sample.
    pub precision: u32,
    pub signed: bool,
    pub data: Vec<i32>,
}

impl ComponentPlane {
    fn same_layout(&self, other: &ComponentPlane) -> bool {
        self.width == other.width && self.height == other.height && self.precision == other.precision
    }

    /// Offset that moves signed samples into the unsigned range.
    fn bias(&self) -> i32 {
        if self.signed && self.precision > 0 {
            1 << (self.precision.min(31) - 1)
        } else {
            0
        }
    }

    /// Samples scaled to 8 bits, rounding half up.
    fn samples_u8(&self) -> impl Iterator<Item = u8> + '_ {
        let bias = self.bias();
        let shift = self.precision.saturating_sub(8).min(31);
        self.data.iter().map(move |&v| {
            let mut pix = v.saturating_add(bias);
            if shift > 0 {
                pix = (pix >> shift) + ((pix >> (shift - 1)) & 1);
            }
            pix.clamp(0, 255) as u8
        })
    }
}

/// Converts luma plus two equally subsampled chroma planes (4:2:0, 4:2:2
/// and so on) into full-size R, G and B planes of the luma precision.
///
/// Chroma is replicated over its `dx` x `dy` block, then the sYCC matrix is
/// applied with chroma centred on `1 << (precision - 1)`. Returns `None` for
/// any other plane set.
fn sycc_to_rgb(planes: &[ComponentPlane]) -> Option<Vec<ComponentPlane>> {
    let [y, cb, cr] = planes else {
        return None;
    };
    let chroma_fits = cb.width > 0
        && cb.height > 0
        && cb.width <= y.width
        && cb.height <= y.height
        && (cb.width, cb.height) != (y.width, y.height);
    let precision_ok = cb.precision == y.precision && (1..=31).contains(&y.precision);
    if !chroma_fits || !precision_ok || !cb.same_layout(cr) {
        return None;
    }

    let (width, cw, ch) = (y.width as usize, cb.width as usize, cb.height as usize);
    let dx = width.div_ceil(cw);
    let dy = (y.height as usize).div_ceil(ch);
    let offset = 1i64 << (y.precision - 1);
    let upb = (1i64 << y.precision) - 1;

    let mut r = Vec::with_capacity(y.data.len());
    let mut g = Vec::with_capacity(y.data.len());
    let mut b = Vec::with_capacity(y.data.len());
    for (i, &luma) in y.data.iter().enumerate() {
        let c = (i / width / dy).min(ch - 1) * cw + (i % width / dx).min(cw - 1);
        let luma = luma as i64 + y.bias() as i64;
        let blue = (cb.data[c] as i64 + cb.bias() as i64 - offset) as f64;
        let red = (cr.data[c] as i64 + cr.bias() as i64 - offset) as f64;
        r.push((luma + (1.402 * red) as i64).clamp(0, upb) as i32);
        g.push((luma - (0.344 * blue + 0.714 * red) as i64).clamp(0, upb) as i32);
        b.push((luma + (1.772 * blue) as i64).clamp(0, upb) as i32);
    }

    let plane = |data: Vec<i32>| ComponentPlane {
        width: y.width,
        height: y.height,
        precision: y.precision,
        signed: false,
        data,
    };
    Some(vec![plane(r), plane(g), plane(b)])
}

/// Packs decoded planes the way the viewer expects them:
///
/// - three or more planes of equal size and precision become packed ARGB,
///   with the fourth plane (if exactly four) as alpha;
/// - luma with subsampled chroma is upsampled and converted to RGB first;
/// - two such planes become gray + alpha, also packed;
/// - a single plane becomes 8-bit gray up to 8 bits, 16-bit gray up to 16;
/// - anything else falls back to the first plane as gray.
///
/// The returned [`RawDecode`] has no properties attached.
pub fn pack_components(planes: &[ComponentPlane]) -> Result<RawDecode> {
    if planes.is_empty() {
        return Err(J2kViewError::UnsupportedDepth {
            components: 0,
            precision: 0,
        });
    }
    if let Some(bad) = planes.iter().find(|p| p.data.len() != p.width as usize * p.height as usize) {
        return Err(J2kViewError::BufferLengthMismatch {
            expected: bad.width as usize * bad.height as usize,
            actual: bad.data.len(),
            width: bad.width,
            height: bad.height,
        });
    }

    let converted = sycc_to_rgb(planes);
    if converted.is_some() {
        log::debug!(
            "upsampling {}x{} chroma to {}x{}",
            planes[1].width,
            planes[1].height,
            planes[0].width,
            planes[0].height
        );
    }
    let planes = converted.as_deref().unwrap_or(planes);
    let first = &planes[0];
    let expected = first.width as usize * first.height as usize;

    let rgb = planes.len() >= 3 && planes[1..3].iter().all(|p| p.same_layout(first));
    let gray_alpha = planes.len() == 2 && planes[1].same_layout(first);

    if rgb || gray_alpha {
        let (r, g, b): (Vec<u8>, Vec<u8>, Vec<u8>) = if rgb {
            (
                first.samples_u8().collect(),
                planes[1].samples_u8().collect(),
                planes[2].samples_u8().collect(),
            )
        } else {
            let grey: Vec<u8> = first.samples_u8().collect();
            (grey.clone(), grey.clone(), grey)
        };
        let alpha_plane = match planes.len() {
            2 => Some(&planes[1]),
            4 => Some(&planes[3]),
            _ => None,
        };
        let alpha: Vec<u8> = match alpha_plane {
            Some(a) if a.data.len() == expected => a.samples_u8().collect(),
            _ => vec![0xFF; expected],
        };
        let packed = (0..expected)
            .map(|i| {
                (alpha[i] as u32) << 24 | (r[i] as u32) << 16 | (g[i] as u32) << 8 | b[i] as u32
            })
            .collect();
        return Ok(RawDecode {
            packed: Some(packed),
            ..Default::default()
        });
    }

    if planes.len() > 1 {
        log::warn!(
            "{} components with mixed layout, using the first as gray",
            planes.len()
        );
    }

    let bias = first.bias();
    match first.precision {
        0..=8 => Ok(RawDecode {
            gray8: Some(
                first
                    .data
                    .iter()
                    .map(|&v| v.saturating_add(bias).clamp(0, 0xFF) as u8)
                    .collect(),
            ),
            ..Default::default()
        }),
        9..=16 => Ok(RawDecode {
            gray16: Some(
                first
                    .data
                    .iter()
                    .map(|&v| v.saturating_add(bias).clamp(0, 0xFFFF) as u16)
                    .collect(),
            ),
            ..Default::default()
        }),
        precision => Err(J2kViewError::UnsupportedDepth {
            components: planes.len(),
            precision,
        }),
    }
}
