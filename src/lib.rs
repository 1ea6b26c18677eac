//! JPEG 2000 decode-parameter negotiation for interactive viewers.
//!
//! A [`DecodeSession`] owns the current source, the requested tile,
//! reduction or area, and the tile/reduction bounds learned from the last
//! decode. The wavelet decoding itself is delegated to a [`DecodeEngine`].

pub mod codestream;
pub mod components;
pub mod engine;
pub mod error;
pub mod jp2;
pub mod marker_code;
pub mod materialize;
#[cfg(feature = "openjpeg")]
pub mod openjpeg;
pub mod parameters;
pub mod properties;
pub mod session;
pub mod source;
pub mod stream_reader;
pub mod tracker;

pub use engine::{DecodeEngine, RawDecode, default_engine, ensure_initialized};
pub use error::{ErrorKind, J2kViewError, Result};
pub use materialize::DecodedImage;
#[cfg(feature = "openjpeg")]
pub use openjpeg::OpenJpegEngine;
pub use parameters::{Area, DecodeParameters, DecodeRequest};
pub use properties::{BitDepth, Bounds, CodestreamProperties};
pub use session::{DecodeSession, SessionState};
pub use source::{SourceHandle, SourceId};
pub use tracker::{Observation, SourceIdentityTracker};
