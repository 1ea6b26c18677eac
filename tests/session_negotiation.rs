//! Decode session negotiation against a scripted engine.

use j2kview_rs::{
    Area, BitDepth, CodestreamProperties, DecodeEngine, DecodeParameters, DecodeRequest,
    DecodeSession, DecodedImage, ErrorKind, J2kViewError, RawDecode, SessionState, SourceHandle,
};
use std::cell::RefCell;
use std::collections::HashMap;

/// Geometry the scripted engine reports for one source.
#[derive(Clone, Copy)]
struct Profile {
    size: (u32, u32),
    tile: (u32, u32),
    max_tiles: u32,
    max_reduction: u32,
    bit_depth: BitDepth,
    /// Decode the whole image instead of failing on an unknown tile.
    lenient: bool,
}

const A: Profile = Profile {
    size: (512, 512),
    tile: (256, 256),
    max_tiles: 4,
    max_reduction: 6,
    bit_depth: BitDepth::Gray8,
    lenient: false,
};

const B: Profile = Profile {
    size: (100, 60),
    tile: (100, 60),
    max_tiles: 1,
    max_reduction: 3,
    bit_depth: BitDepth::Packed24,
    lenient: false,
};

/// Sources are told apart by their first byte.
struct ScriptedEngine {
    profiles: HashMap<u8, Profile>,
    calls: RefCell<Vec<DecodeRequest>>,
}

impl ScriptedEngine {
    fn new(profiles: &[(u8, Profile)]) -> Self {
        Self {
            profiles: profiles.iter().copied().collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<DecodeRequest> {
        self.calls.borrow().clone()
    }
}

fn shrink(v: u32, reduction: u32) -> u32 {
    v.div_ceil(1 << reduction)
}

impl DecodeEngine for ScriptedEngine {
    fn decode(&self, source: &SourceHandle, params: &DecodeParameters) -> j2kview_rs::Result<RawDecode> {
        let bytes = source.read_bytes()?;
        let profile = bytes
            .first()
            .and_then(|key| self.profiles.get(key))
            .copied()
            .ok_or(J2kViewError::InvalidCodestream("unknown test source"))?;
        let request = params.request();
        self.calls.borrow_mut().push(request);

        let reduction_ok = |r: u32| {
            if r >= profile.max_reduction {
                Err(J2kViewError::ReductionOutOfRange {
                    level: r as i64,
                    max_reduction: profile.max_reduction,
                })
            } else {
                Ok(r)
            }
        };
        let (width, height) = match request {
            DecodeRequest::Whole { reduction } => {
                let r = reduction_ok(reduction)?;
                (shrink(profile.size.0, r), shrink(profile.size.1, r))
            }
            DecodeRequest::Tile { index, reduction } => {
                let r = reduction_ok(reduction)?;
                if index < profile.max_tiles {
                    (shrink(profile.tile.0, r), shrink(profile.tile.1, r))
                } else if profile.lenient {
                    (shrink(profile.size.0, r), shrink(profile.size.1, r))
                } else {
                    return Err(J2kViewError::TileOutOfRange {
                        index: index as i64,
                        max_tiles: profile.max_tiles,
                    });
                }
            }
            DecodeRequest::Area(area) => (
                area.x1.saturating_sub(area.x0).max(0) as u32,
                area.y1.saturating_sub(area.y0).max(0) as u32,
            ),
        };

        let pixels = width as usize * height as usize;
        let mut raw = RawDecode::default();
        match profile.bit_depth {
            BitDepth::Gray8 => raw.gray8 = Some(vec![0x80; pixels]),
            BitDepth::Gray16 => raw.gray16 = Some(vec![0x800; pixels]),
            BitDepth::Packed24 => raw.packed = Some(vec![0xFF10_2030; pixels]),
        }
        raw.properties = Some(CodestreamProperties {
            width,
            height,
            bit_depth: profile.bit_depth,
            max_tiles: profile.max_tiles,
            max_reduction: profile.max_reduction,
            image_width: profile.size.0,
            image_height: profile.size.1,
            tile_width: profile.tile.0,
            tile_height: profile.tile.1,
            component_count: if profile.bit_depth == BitDepth::Packed24 { 3 } else { 1 },
        });
        Ok(raw)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn source(key: u8) -> SourceHandle {
    SourceHandle::from_bytes(vec![key, 0, 0, 0])
}

fn exclusive(p: &DecodeParameters) -> bool {
    !(p.area_override() && (p.tile_override() || p.reduction_override()))
}

#[test]
fn test_tile_scenario_with_known_bounds() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.decode().unwrap();
    assert_eq!(session.max_tiles(), 4);
    assert_eq!(session.max_reduction(), 6);
    let before = *session.parameters();

    let err = session.set_tile(5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bounds);
    assert_eq!(*session.parameters(), before);
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(engine.calls().len(), 1);

    session.set_tile(2).unwrap();
    let p = session.parameters();
    assert!(p.tile_override());
    assert!(p.reduction_override());
    assert!(!p.area_override());
    assert_eq!(engine.calls().len(), 1);

    let image = session.decode().unwrap();
    assert_eq!(image.len(), 256 * 256);
    assert_eq!(
        engine.calls().last(),
        Some(&DecodeRequest::Tile { index: 2, reduction: 0 })
    );
}

#[test]
fn test_negative_tile_never_mutates_or_decodes() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));

    // Bounds unknown.
    assert!(session.set_tile(-1).is_err());
    assert_eq!(*session.parameters(), DecodeParameters::default());

    session.decode().unwrap();
    session.set_reduction(2).unwrap();
    let before = *session.parameters();
    let err = session.set_tile(-3).unwrap_err();
    assert!(matches!(err, J2kViewError::TileOutOfRange { index: -3, .. }));
    assert_eq!(*session.parameters(), before);
    assert_eq!(engine.calls().len(), 1);
}

#[test]
fn test_area_then_tile_switches_modes() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.decode().unwrap();

    session.set_area(10, 10, 50, 50);
    assert!(session.parameters().area_override());
    assert!(!session.parameters().tile_override());
    let image = session.decode().unwrap();
    assert_eq!(image.len(), 40 * 40);
    assert_eq!((session.width(), session.height()), (40, 40));

    session.set_tile(1).unwrap();
    let p = session.parameters();
    assert!(!p.area_override());
    assert_eq!(p.area(), None);
    assert!(p.tile_override() && p.reduction_override());

    session.set_area_str("0,0,8,8").unwrap();
    assert!(exclusive(session.parameters()));
    assert_eq!(session.parameters().tile(), None);
    assert_eq!(session.parameters().reduction(), 0);
}

#[test]
fn test_bad_area_text_is_usability_error() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.decode().unwrap();
    session.set_tile(3).unwrap();
    session.decode().unwrap();
    let before = *session.parameters();

    for text in ["bad,input", "1,2,3", "1,2,3,4,5", "a,b,c,d"] {
        let err = session.set_area_str(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usability);
        assert_eq!(*session.parameters(), before);
    }
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(engine.calls().len(), 2);
}

#[test]
fn test_source_change_clears_overrides_and_bounds() {
    let engine = ScriptedEngine::new(&[(1, A), (2, B)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.decode().unwrap();
    session.set_tile(3).unwrap();
    session.set_reduction(2).unwrap();
    session.decode().unwrap();

    session.set_source(source(2));
    assert_eq!(session.max_tiles(), 0);
    assert_eq!(session.max_reduction(), 0);
    assert_eq!(*session.parameters(), DecodeParameters::default());
    // Properties from the previous source stay until the next decode.
    assert_eq!(session.width(), 64);
    assert_eq!(session.state(), SessionState::Pending);

    let image = session.decode().unwrap();
    assert!(matches!(image, DecodedImage::Packed(_)));
    assert_eq!(image.channel_masks(), Some([0xFF0000, 0xFF00, 0xFF, 0xFF000000]));
    assert_eq!(engine.calls().last(), Some(&DecodeRequest::Whole { reduction: 0 }));
    assert_eq!((session.width(), session.height()), (100, 60));
    assert_eq!(session.bit_depth(), 24);
    assert_eq!(session.max_tiles(), 1);
    assert_eq!(session.max_reduction(), 3);
}

#[test]
fn test_same_source_again_keeps_parameters() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.decode().unwrap();
    session.set_tile(1).unwrap();

    session.set_source(source(1));
    assert_eq!(session.parameters().tile(), Some(1));
    assert_eq!(session.max_tiles(), 4);
}

#[test]
fn test_reload_reproduces_first_decode() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.decode().unwrap();
    let first = session.properties().cloned();

    session.set_tile(2).unwrap();
    session.set_reduction(3).unwrap();
    session.decode().unwrap();
    assert_ne!(session.properties().cloned(), first);

    session.reload();
    assert_eq!(session.max_tiles(), 0);
    assert_eq!(*session.parameters(), DecodeParameters::default());
    session.decode().unwrap();
    assert_eq!(session.properties().cloned(), first);

    session.reload();
    session.decode().unwrap();
    assert_eq!(session.properties().cloned(), first);
}

#[test]
fn test_tile_accepted_before_first_decode() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.set_tile(3).unwrap();
    session.set_reduction(1).unwrap();

    let image = session.decode().unwrap();
    assert_eq!(image.len(), 128 * 128);
    assert_eq!(
        engine.calls(),
        vec![DecodeRequest::Tile { index: 3, reduction: 1 }]
    );
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn test_unknown_tile_rejected_by_engine_is_dropped() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.set_tile(9).unwrap();

    let err = session.decode().unwrap_err();
    assert!(matches!(err, J2kViewError::TileOutOfRange { index: 9, max_tiles: 4 }));
    assert_eq!(*session.parameters(), DecodeParameters::default());

    session.decode().unwrap();
    assert_eq!(engine.calls().last(), Some(&DecodeRequest::Whole { reduction: 0 }));
}

#[test]
fn test_unknown_tile_invalidated_after_decode() {
    let lenient = Profile { lenient: true, ..A };
    let engine = ScriptedEngine::new(&[(1, lenient)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.set_tile(7).unwrap();
    session.set_reduction(2).unwrap();

    let err = session.decode().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bounds);
    assert_eq!(session.max_tiles(), 4);
    assert_eq!(session.parameters().tile(), None);
    assert_eq!(session.parameters().reduction(), 2);
    assert_eq!(session.state(), SessionState::Pending);

    session.decode().unwrap();
    assert_eq!(engine.calls().last(), Some(&DecodeRequest::Whole { reduction: 2 }));
}

#[test]
fn test_engine_failure_leaves_parameters_for_retry() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(9));
    session.set_area(0, 0, 4, 4);
    let err = session.decode().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Codestream);
    assert_eq!(session.parameters().area(), Some(Area::new(0, 0, 4, 4)));
    assert_eq!(session.state(), SessionState::Uninitialized);

    session.set_source(SourceHandle::from_path("no/such/file.jp2"));
    session.set_tile(1).unwrap();
    let err = session.decode().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert_eq!(session.parameters().tile(), Some(1));
    assert!(engine.calls().is_empty());
}

#[test]
fn test_mutual_exclusion_over_mixed_calls() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.decode().unwrap();

    for step in 0i64..40 {
        match step % 5 {
            0 => {
                let _ = session.set_tile(step % 6 - 1);
            }
            1 => session.set_area(0, 0, step as i32, 16),
            2 => {
                let _ = session.set_reduction(step % 8);
            }
            3 => {
                let _ = session.set_area_str(if step % 2 == 0 { "1,1,9,9" } else { "nope" });
            }
            _ => session.reload(),
        }
        assert!(exclusive(session.parameters()), "step {}", step);
    }
}

#[test]
fn test_zero_area_decodes_whole_image() {
    let engine = ScriptedEngine::new(&[(1, A)]);
    let mut session = DecodeSession::new(&engine);
    session.set_source(source(1));
    session.set_area(0, 0, 0, 0);
    let image = session.decode().unwrap();
    assert_eq!(image.len(), 512 * 512);
    assert_eq!(engine.calls(), vec![DecodeRequest::Whole { reduction: 0 }]);
}
