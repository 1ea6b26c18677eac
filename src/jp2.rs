//! JP2 box walking (ISO/IEC 15444-1 Annex I), enough to locate the codestream.

use crate::error::{J2kViewError, Result};
use crate::stream_reader::CodestreamReader;

pub const JP2_SIGNATURE: &[u8; 12] = b"\x00\x00\x00\x0CjP  \r\n\x87\n";

const CODESTREAM_BOX: [u8; 4] = *b"jp2c";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jp2Box<'a> {
    pub box_type: [u8; 4],
    pub payload: &'a [u8],
}

/// Top-level boxes of a JP2 file, in order. Stops after the first error.
pub struct Jp2Boxes<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Jp2Boxes<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            failed: false,
        }
    }

    fn read_box(&mut self) -> Result<Jp2Box<'a>> {
        let rest = &self.data[self.offset..];
        let mut reader = CodestreamReader::new(rest);
        let declared = reader.read_u32()?;
        let mut box_type = [0u8; 4];
        for b in &mut box_type {
            *b = reader.read_u8()?;
        }
        let total = match declared {
            // XLBox follows the type.
            1 => ((reader.read_u32()? as u64) << 32) | reader.read_u32()? as u64,
            // Runs to the end of the file.
            0 => rest.len() as u64,
            n => n as u64,
        };
        let header = reader.position();
        let total = usize::try_from(total)
            .ok()
            .filter(|&t| t >= header && t <= rest.len())
            .ok_or(J2kViewError::InvalidCodestream("JP2 box length out of range"))?;

        self.offset += total;
        Ok(Jp2Box {
            box_type,
            payload: &rest[header..total],
        })
    }
}

impl<'a> Iterator for Jp2Boxes<'a> {
    type Item = Result<Jp2Box<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        // Fewer than 8 bytes cannot hold a box header; treat as padding.
        if self.failed || self.data.len() - self.offset < 8 {
            return None;
        }
        let next = self.read_box();
        self.failed = next.is_err();
        Some(next)
    }
}

pub fn is_jp2(data: &[u8]) -> bool {
    data.starts_with(JP2_SIGNATURE)
}

/// The payload of the first `jp2c` box, or `None` when `data` is not a JP2
/// container at all.
pub fn find_codestream(data: &[u8]) -> Result<Option<&[u8]>> {
    if !is_jp2(data) {
        return Ok(None);
    }
    for b in Jp2Boxes::new(data) {
        let b = b?;
        if b.box_type == CODESTREAM_BOX {
            return Ok(Some(b.payload));
        }
    }
    Err(J2kViewError::InvalidCodestream("JP2 container without jp2c box"))
}
