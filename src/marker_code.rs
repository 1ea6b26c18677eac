use crate::error::J2kViewError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const MARKER_START_BYTE: u8 = 0xFF;

/// Second byte of the JPEG 2000 codestream markers (ISO/IEC 15444-1 Annex A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[num_enum(error_type(name = J2kViewError, constructor = J2kViewError::UnknownMarker))]
#[repr(u8)]
pub enum MarkerCode {
    /// SOC: Start of codestream.
    StartOfCodestream = 0x4F,
    /// CAP: Extended capabilities (Part 15).
    Capability = 0x50,
    /// SIZ: Image and tile size.
    ImageAndTileSize = 0x51,
    /// COD: Coding style default.
    CodingStyleDefault = 0x52,
    /// COC: Coding style component.
    CodingStyleComponent = 0x53,
    /// TLM: Tile-part lengths.
    TilePartLengths = 0x55,
    /// PLM: Packet length, main header.
    PacketLengthMain = 0x57,
    /// PLT: Packet length, tile-part header.
    PacketLengthTile = 0x58,
    /// QCD: Quantization default.
    QuantizationDefault = 0x5C,
    /// QCC: Quantization component.
    QuantizationComponent = 0x5D,
    /// RGN: Region of interest.
    RegionOfInterest = 0x5E,
    /// POC: Progression order change.
    ProgressionOrderChange = 0x5F,
    /// PPM: Packed packet headers, main header.
    PackedPacketHeadersMain = 0x60,
    /// PPT: Packed packet headers, tile-part header.
    PackedPacketHeadersTile = 0x61,
    /// CRG: Component registration.
    ComponentRegistration = 0x63,
    /// COM: Comment.
    Comment = 0x64,
    /// SOT: Start of tile-part. Ends the main header.
    StartOfTile = 0x90,
    /// SOP: Start of packet.
    StartOfPacket = 0x91,
    /// EPH: End of packet header.
    EndOfPacketHeader = 0x92,
    /// SOD: Start of data.
    StartOfData = 0x93,
    /// EOC: End of codestream.
    EndOfCodestream = 0xD9,
}

impl MarkerCode {
    /// Markers that stand alone, without a length-prefixed segment.
    pub fn is_delimiter(self) -> bool {
        matches!(
            self,
            Self::StartOfCodestream
                | Self::StartOfData
                | Self::EndOfPacketHeader
                | Self::EndOfCodestream
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_marker_roundtrip() {
        let marker = MarkerCode::try_from(0x51).unwrap();
        assert_eq!(marker, MarkerCode::ImageAndTileSize);
        assert_eq!(u8::from(MarkerCode::StartOfTile), 0x90);
    }

    #[test]
    fn test_unknown_marker_is_error() {
        match MarkerCode::try_from(0x01) {
            Err(J2kViewError::UnknownMarker(0x01)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_delimiters() {
        assert!(MarkerCode::StartOfCodestream.is_delimiter());
        assert!(!MarkerCode::ImageAndTileSize.is_delimiter());
    }
}
