//! The boundary to the wavelet decoder.
//!
//! An engine takes a source and a [`DecodeParameters`] value and returns raw
//! samples in up to three depth-tagged buffers, plus the codestream
//! properties it observed. Engines are expected to fill exactly one buffer;
//! [`crate::materialize`] checks that rather than trusting it.

use crate::codestream;
use crate::error::Result;
use crate::parameters::DecodeParameters;
use crate::properties::CodestreamProperties;
use crate::source::SourceHandle;
use std::sync::OnceLock;

/// Raw engine output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDecode {
    pub gray8: Option<Vec<u8>>,
    pub gray16: Option<Vec<u16>>,
    /// ARGB, one `u32` per pixel.
    pub packed: Option<Vec<u32>>,
    pub properties: Option<CodestreamProperties>,
}

impl RawDecode {
    pub fn populated(&self) -> usize {
        self.gray8.is_some() as usize + self.gray16.is_some() as usize + self.packed.is_some() as usize
    }
}

pub trait DecodeEngine {
    /// Decodes `source` according to `params`. Blocking; may read files.
    fn decode(&self, source: &SourceHandle, params: &DecodeParameters) -> Result<RawDecode>;

    /// Whether `source` looks decodable. Must not negotiate parameters.
    fn probe(&self, source: &SourceHandle) -> bool {
        source
            .read_bytes()
            .map(|bytes| codestream::probe_bytes(&bytes))
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str;
}

impl<E: DecodeEngine + ?Sized> DecodeEngine for &E {
    fn decode(&self, source: &SourceHandle, params: &DecodeParameters) -> Result<RawDecode> {
        (**self).decode(source, params)
    }

    fn probe(&self, source: &SourceHandle) -> bool {
        (**self).probe(source)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<E: DecodeEngine + ?Sized> DecodeEngine for Box<E> {
    fn decode(&self, source: &SourceHandle, params: &DecodeParameters) -> Result<RawDecode> {
        (**self).decode(source, params)
    }

    fn probe(&self, source: &SourceHandle) -> bool {
        (**self).probe(source)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

static INITIALIZED: OnceLock<&'static str> = OnceLock::new();

/// Process-wide engine setup. Runs at most once; later and concurrent calls
/// return the first caller's result.
pub fn ensure_initialized() -> &'static str {
    *INITIALIZED.get_or_init(|| {
        let backend = backend_name();
        log::info!("decode engine ready: {}", backend);
        backend
    })
}

#[cfg(feature = "openjpeg")]
fn backend_name() -> &'static str {
    "openjpeg"
}

#[cfg(not(feature = "openjpeg"))]
fn backend_name() -> &'static str {
    "none"
}

/// The engine compiled into this build, if any.
#[cfg(feature = "openjpeg")]
pub fn default_engine() -> Option<Box<dyn DecodeEngine + Send + Sync>> {
    ensure_initialized();
    Some(Box::new(crate::openjpeg::OpenJpegEngine::new()))
}

#[cfg(not(feature = "openjpeg"))]
pub fn default_engine() -> Option<Box<dyn DecodeEngine + Send + Sync>> {
    ensure_initialized();
    None
}
