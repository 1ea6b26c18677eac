//! A consumer's decode session: one source, one set of parameters, and the
//! codestream bounds learned from the last decode.
//!
//! ```text
//! Uninitialized --decode--> Ready --set_*--> Pending --decode--> Ready
//! ```
//!
//! Changing the source or calling [`DecodeSession::reload`] puts the
//! parameters back to their defaults and forgets the tile/reduction bounds,
//! but keeps the last properties until the next decode replaces them.

use crate::engine::DecodeEngine;
use crate::error::{ErrorKind, J2kViewError, Result};
use crate::materialize::{DecodedImage, materialize};
use crate::parameters::{Area, DecodeParameters};
use crate::properties::{Bounds, CodestreamProperties};
use crate::source::SourceHandle;
use crate::tracker::SourceIdentityTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing decoded yet.
    Uninitialized,
    /// The last decode reflects the current parameters.
    Ready,
    /// Parameters or source changed since the last decode.
    Pending,
}

pub struct DecodeSession<E> {
    engine: E,
    tracker: SourceIdentityTracker,
    source: Option<SourceHandle>,
    params: DecodeParameters,
    properties: Option<CodestreamProperties>,
    bounds: Bounds,
    force_reset: bool,
    /// A tile or reduction was accepted while its bound was unknown.
    unchecked: bool,
    state: SessionState,
}

impl<E: DecodeEngine> DecodeSession<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            tracker: SourceIdentityTracker::new(),
            source: None,
            params: DecodeParameters::default(),
            properties: None,
            bounds: Bounds::UNKNOWN,
            force_reset: false,
            unchecked: false,
            state: SessionState::Uninitialized,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn source(&self) -> Option<&SourceHandle> {
        self.source.as_ref()
    }

    pub fn parameters(&self) -> &DecodeParameters {
        &self.params
    }

    pub fn properties(&self) -> Option<&CodestreamProperties> {
        self.properties.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn width(&self) -> u32 {
        self.properties.as_ref().map_or(0, |p| p.width)
    }

    pub fn height(&self) -> u32 {
        self.properties.as_ref().map_or(0, |p| p.height)
    }

    pub fn bit_depth(&self) -> u32 {
        self.properties.as_ref().map_or(0, |p| p.bit_depth.bits())
    }

    /// Zero until the first decode of the current source.
    pub fn max_tiles(&self) -> u32 {
        self.bounds.max_tiles
    }

    /// Zero until the first decode of the current source.
    pub fn max_reduction(&self) -> u32 {
        self.bounds.max_reduction
    }

    pub fn probe(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| self.engine.probe(source))
    }

    pub fn set_source(&mut self, handle: SourceHandle) {
        self.source = Some(handle);
        self.observe_source();
    }

    /// Selects tile `index`, together with the current reduction.
    ///
    /// A negative index, or one past the known tile count, is dropped and
    /// nothing changes.
    pub fn set_tile(&mut self, index: i64) -> Result<()> {
        let next = self.params.with_tile(index, self.bounds).inspect_err(|e| {
            log::warn!("tile request dropped: {}", e);
        })?;
        log::debug!("tile {} requested", index);
        self.unchecked |= self.bounds.max_tiles == 0;
        self.update(next);
        Ok(())
    }

    /// Selects reduction `level`; 0 is full resolution.
    pub fn set_reduction(&mut self, level: i64) -> Result<()> {
        let next = self.params.with_reduction(level, self.bounds).inspect_err(|e| {
            log::warn!("reduction request dropped: {}", e);
        })?;
        log::debug!("reduction {} requested", level);
        self.unchecked |= self.bounds.max_reduction == 0;
        self.update(next);
        Ok(())
    }

    pub fn set_area(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        let area = Area::new(x0, y0, x1, y1);
        log::debug!("area {} requested", area);
        self.unchecked = false;
        self.update(self.params.with_area(area));
    }

    /// Parses `"x0,y0,x1,y1"`. Malformed text leaves the session untouched.
    pub fn set_area_str(&mut self, text: &str) -> Result<()> {
        let area: Area = text.parse().inspect_err(|e| {
            log::warn!("{}", e);
        })?;
        self.set_area(area.x0, area.y0, area.x1, area.y1);
        Ok(())
    }

    /// Back to the whole image at full resolution, re-learning the bounds on
    /// the next decode as if the source were opened for the first time.
    pub fn reload(&mut self) {
        self.force_reset = true;
        self.update(DecodeParameters::default());
        self.unchecked = false;
        if self.source.is_some() {
            self.observe_source();
        }
    }

    pub fn decode(&mut self) -> Result<DecodedImage> {
        self.observe_source();
        let source = self.source.as_ref().ok_or(J2kViewError::NoSource)?;
        let request = self.params.request();
        log::debug!("decoding {} as {:?}", source.describe(), request);

        let raw = match self.engine.decode(source, &self.params) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::Bounds && self.unchecked => {
                log::warn!("{}; falling back to the whole image", e);
                self.update(self.params.reset());
                self.unchecked = false;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let (image, properties) = materialize(raw)?;

        self.bounds = properties.bounds();
        log::info!(
            "decoded {}x{} at {} bits ({} tile(s), {} resolution(s))",
            properties.width,
            properties.height,
            properties.bit_depth.bits(),
            properties.max_tiles,
            properties.max_reduction
        );
        self.properties = Some(properties);

        let (constrained, invalid) = self.params.constrain(self.bounds);
        self.unchecked = false;
        if let Some(e) = invalid {
            log::warn!("{} for this source; request dropped", e);
            self.params = constrained;
            self.state = SessionState::Pending;
            return Err(e);
        }

        self.state = SessionState::Ready;
        Ok(image)
    }

    fn observe_source(&mut self) {
        let Some(source) = self.source.as_ref() else {
            return;
        };
        let observation = self.tracker.observe(source, self.force_reset);
        self.force_reset = false;
        if observation.requires_reset() {
            self.params = DecodeParameters::default();
            self.bounds = Bounds::UNKNOWN;
            self.unchecked = false;
            self.mark_pending();
        }
    }

    fn update(&mut self, next: DecodeParameters) {
        if next != self.params {
            self.params = next;
            self.mark_pending();
        }
    }

    fn mark_pending(&mut self) {
        if self.state == SessionState::Ready {
            self.state = SessionState::Pending;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RawDecode;
    use crate::properties::BitDepth;

    struct FlatEngine;

    impl DecodeEngine for FlatEngine {
        fn decode(&self, _: &SourceHandle, params: &DecodeParameters) -> Result<RawDecode> {
            let side = 8 >> params.reduction();
            Ok(RawDecode {
                gray8: Some(vec![0; side * side]),
                properties: Some(CodestreamProperties {
                    width: side as u32,
                    height: side as u32,
                    bit_depth: BitDepth::Gray8,
                    max_tiles: 4,
                    max_reduction: 3,
                    image_width: 8,
                    image_height: 8,
                    tile_width: 4,
                    tile_height: 4,
                    component_count: 1,
                }),
                ..Default::default()
            })
        }

        fn name(&self) -> &'static str {
            "flat"
        }
    }

    #[test]
    fn test_accessors_unknown_before_decode() {
        let session = DecodeSession::new(FlatEngine);
        assert_eq!(session.engine().name(), "flat");
        assert_eq!(session.width(), 0);
        assert_eq!(session.bit_depth(), 0);
        assert_eq!(session.max_tiles(), 0);
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_decode_without_source() {
        let mut session = DecodeSession::new(FlatEngine);
        assert!(matches!(session.decode(), Err(J2kViewError::NoSource)));
    }

    #[test]
    fn test_state_transitions() {
        let mut session = DecodeSession::new(FlatEngine);
        session.set_source(SourceHandle::from_bytes(vec![1u8]));
        session.decode().unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        session.set_reduction(1).unwrap();
        assert_eq!(session.state(), SessionState::Pending);
        let image = session.decode().unwrap();
        assert_eq!(image.len(), 16);
        assert_eq!(session.state(), SessionState::Ready);

        session.reload();
        assert_eq!(session.state(), SessionState::Pending);
        assert_eq!(session.max_tiles(), 0);
        assert_eq!(session.width(), 4);
    }
}
