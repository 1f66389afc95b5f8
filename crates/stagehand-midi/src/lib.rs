//! MIDI value types for the stagehand routing engine.
//!
//! This crate holds the event type every other part of the engine operates
//! on, plus the pure byte codec used by backends:
//!
//! - [`MidiEvent`] with kind-aware equality
//! - [`EventKinds`] bit sets for filter matching
//! - [`codec::decode`] / [`codec::encode`] for the standard wire format
//! - shared, immutable sysex payloads ([`SysExData`])

pub mod codec;
mod event;
mod sysex;

pub use event::{EventKind, EventKinds, MidiEvent};
pub use sysex::{sysex_data, SysExData};
