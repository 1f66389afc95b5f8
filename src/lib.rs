//! # Stagehand - live MIDI routing
//!
//! A scene-based MIDI router: incoming events run through a graph of
//! filter/modifier/generator units for the currently active scene, and the
//! results are emitted on one or more output ports. Scenes can be switched
//! live; held notes and sustain pedals are released through the scene that
//! originated them.
//!
//! This umbrella crate re-exports the two building blocks:
//! - **stagehand-midi** - the event type and wire codec
//! - **stagehand-engine** - buffers, units, patches, the engine, backends
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use stagehand::prelude::*;
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//!
//! // scene 1: everything to channel 2
//! let patch = Patch::new(Module::single(Unit::Channel { channel: 2 }));
//! engine.add_scene(1, Scene::new(Arc::new(patch)));
//!
//! let out = engine.process_event(&MidiEvent::noteon(0, 0, 60, 100));
//! assert_eq!(out[0].channel, 2);
//! ```

pub use stagehand_engine as engine;
pub use stagehand_midi as midi;

pub use stagehand_engine::{
    backend, units, Engine, EngineConfig, Error, Module, Patch, Result, Scene,
};
pub use stagehand_midi::{codec, EventKind, EventKinds, MidiEvent, SysExData};

/// The types most embedders need.
pub mod prelude {
    pub use stagehand_engine::units::{CallResult, Filter, TransformMode, Unit, UnitEx};
    pub use stagehand_engine::{Engine, EngineConfig, Module, Patch, Scene};
    pub use stagehand_midi::{sysex_data, EventKind, EventKinds, MidiEvent};
}
