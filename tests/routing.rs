//! Smoke test for the umbrella crate's public surface.

use std::sync::Arc;

use stagehand::prelude::*;

#[test]
fn test_route_through_prelude_types() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let engine = Engine::new(EngineConfig::default()).unwrap();

    let patch = Patch::new(Module::chain(vec![
        Module::single(Unit::Filter(Filter::Type {
            kinds: EventKinds::NOTE,
        })),
        Module::single(Unit::Transpose { offset: 12 }),
    ]));
    engine.add_scene(1, Scene::new(Arc::new(patch)));

    let out = engine.process_event(&MidiEvent::noteon(0, 0, 60, 100));
    assert_eq!(out, vec![MidiEvent::noteon(0, 0, 72, 100)]);

    // non-note events are dropped by the type filter
    let out = engine.process_event(&MidiEvent::ctrl(0, 0, 7, 64));
    assert!(out.is_empty());
}

#[test]
fn test_codec_reexport() {
    let ev = stagehand::codec::decode(&[0x90, 60, 100], 0, 0);
    assert_eq!(ev.kind, EventKind::NoteOn);

    let mut buf = [0u8; 3];
    assert_eq!(stagehand::codec::encode(&ev, &mut buf), 3);
    assert_eq!(buf, [0x90, 60, 100]);
}
