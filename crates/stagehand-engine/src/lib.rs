//! The stagehand routing engine.
//!
//! Scenes of patch trees are applied to incoming MIDI events one at a time;
//! the engine tracks held notes and sustain pedals across scene switches,
//! keeps per-cycle allocations inside a fixed pool, and runs user callbacks
//! off the RT thread through a bounded lock-free queue.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stagehand_engine::{Engine, EngineConfig, Module, Patch, Scene};
//! use stagehand_engine::units::Unit;
//! use stagehand_midi::MidiEvent;
//!
//! let config = EngineConfig::default();
//! let engine = Engine::new(config).unwrap();
//!
//! let patch = Patch::new(Module::single(Unit::Channel { channel: 2 }));
//! engine.add_scene(1, Scene::new(Arc::new(patch)));
//!
//! let out = engine.process_event(&MidiEvent::noteon(0, 0, 60, 100));
//! assert_eq!(out[0].channel, 2);
//! ```

pub mod backend;
mod buffer;
mod caller;
mod config;
mod engine;
mod error;
mod patch;
mod pool;
pub mod units;

pub use buffer::{Cursor, EventBuffer, EventRange};
pub use config::{
    EngineConfig, ASYNC_CALLBACK_INTERVAL, ASYNC_JOIN_TIMEOUT, MAX_ASYNC_CALLS, MAX_EVENTS,
    MAX_SIMULTANEOUS_NOTES, MAX_SUSTAIN_PEDALS,
};
pub use engine::{Engine, EngineCtx, Scene, SceneSwitchCallback};
pub use error::{CallbackError, Error, Result};
pub use patch::{Module, Patch};
