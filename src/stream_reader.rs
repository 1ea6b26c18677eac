use crate::error::{J2kViewError, Result};
use crate::marker_code::{MARKER_START_BYTE, MarkerCode};

/// Big-endian cursor over a codestream.
pub struct CodestreamReader<'a> {
    source: &'a [u8],
    position: usize,
}

impl<'a> CodestreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    pub fn remaining_data(&self) -> &'a [u8] {
        &self.source[self.position..]
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.position >= self.source.len() {
            return Err(J2kViewError::InvalidCodestream("unexpected end of data"));
        }
        let val = self.source[self.position];
        self.position += 1;
        Ok(val)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b1 = self.read_u8()? as u16;
        let b2 = self.read_u8()? as u16;
        Ok((b1 << 8) | b2)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b1 = self.read_u8()? as u32;
        let b2 = self.read_u8()? as u32;
        let b3 = self.read_u8()? as u32;
        let b4 = self.read_u8()? as u32;
        Ok((b1 << 24) | (b2 << 16) | (b3 << 8) | b4)
    }

    pub fn read_marker(&mut self) -> Result<MarkerCode> {
        if self.read_u8()? != MARKER_START_BYTE {
            return Err(J2kViewError::InvalidCodestream("marker start byte not found"));
        }
        MarkerCode::try_from(self.read_u8()?)
    }

    /// Skips `count` bytes. Fails instead of running past the end.
    pub fn advance(&mut self, count: usize) -> Result<()> {
        if count > self.source.len() - self.position {
            return Err(J2kViewError::InvalidCodestream("segment runs past end of data"));
        }
        self.position += count;
        Ok(())
    }

    /// Skips a marker segment whose length field has not been read yet.
    pub fn skip_segment(&mut self) -> Result<()> {
        let len = self.read_u16()?;
        if len < 2 {
            return Err(J2kViewError::InvalidCodestream("segment length below 2"));
        }
        self.advance((len - 2) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_reads() {
        let data = [0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF];
        let mut reader = CodestreamReader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_skip_segment_bounds() {
        // Length 6 claims 4 payload bytes but only 2 follow.
        let data = [0x00, 0x06, 0xAA, 0xBB];
        let mut reader = CodestreamReader::new(&data);
        assert!(reader.skip_segment().is_err());

        let data = [0x00, 0x04, 0xAA, 0xBB, 0xFF];
        let mut reader = CodestreamReader::new(&data);
        reader.skip_segment().unwrap();
        assert_eq!(reader.remaining_data(), &[0xFF]);
    }

    #[test]
    fn test_read_marker() {
        let data = [0xFF, 0x4F, 0x00, 0x51];
        let mut reader = CodestreamReader::new(&data);
        assert_eq!(reader.read_marker().unwrap(), MarkerCode::StartOfCodestream);
        assert!(reader.read_marker().is_err());
    }
}
