use thiserror::Error;

/// Error category, mirroring how a caller is expected to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input. Nothing was changed and nothing was decoded.
    Usability,
    /// Tile index or reduction level outside the known bounds.
    Bounds,
    /// The engine produced no usable pixels for this request.
    DecodeFailure,
    /// The source could not be read.
    Resource,
    /// The codestream header is malformed or unsupported.
    Codestream,
}

#[derive(Error, Debug)]
pub enum J2kViewError {
    #[error("Area \"{0}\" unusable: expected x0,y0,x1,y1")]
    AreaUnusable(String),
    #[error("Unsupported source URL scheme \"{0}\"")]
    UnsupportedUrl(String),
    #[error("No source selected")]
    NoSource,

    #[error("Tile {index} out of range (tiles: {max_tiles})")]
    TileOutOfRange { index: i64, max_tiles: u32 },
    #[error("Reduction {level} out of range (resolutions: {max_reduction})")]
    ReductionOutOfRange { level: i64, max_reduction: u32 },

    #[error("Decode produced no image")]
    NoImage,
    #[error("Decode produced more than one pixel buffer")]
    AmbiguousImage,
    #[error("Buffer holds {actual} samples, expected {expected} ({width}x{height})")]
    BufferLengthMismatch {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
    #[error("Unsupported bit depth: {components} component(s) at {precision} bits")]
    UnsupportedDepth { components: usize, precision: u32 },
    #[error("Decode engine failed: {0}")]
    Engine(String),
    #[error("No decode engine compiled in (enable the `openjpeg` feature)")]
    EngineUnavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid codestream: {0}")]
    InvalidCodestream(&'static str),
    #[error("Unknown marker 0xFF{0:02X}")]
    UnknownMarker(u8),
}

impl J2kViewError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AreaUnusable(_) | Self::UnsupportedUrl(_) | Self::NoSource => ErrorKind::Usability,
            Self::TileOutOfRange { .. } | Self::ReductionOutOfRange { .. } => ErrorKind::Bounds,
            Self::NoImage
            | Self::AmbiguousImage
            | Self::BufferLengthMismatch { .. }
            | Self::UnsupportedDepth { .. }
            | Self::Engine(_)
            | Self::EngineUnavailable => ErrorKind::DecodeFailure,
            Self::Io(_) => ErrorKind::Resource,
            Self::InvalidCodestream(_) | Self::UnknownMarker(_) => ErrorKind::Codestream,
        }
    }
}

pub type Result<T> = std::result::Result<T, J2kViewError>;
