//! The event source/sink interface the engine drives, plus the registry of
//! built-in backends.
//!
//! Device-level backends (sequencer APIs, files) live outside the core;
//! anything implementing [`Backend`] can host the processing loop.

mod dummy;
mod queue;

pub use dummy::DummyBackend;
pub use queue::QueueBackend;

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use stagehand_midi::MidiEvent;

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Runs once on the processing thread before the first cycle.
pub type InitFn = Box<dyn FnOnce() + Send>;

/// The processing loop body. Depending on the backend it is called once
/// (and loops until `input_event` signals shutdown) or periodically.
pub type CycleFn = Box<dyn FnMut() + Send>;

/// Local port name mapped to regex patterns naming remote ports.
pub type PortConnectionMap = HashMap<String, Vec<String>>;

pub trait Backend: Send + Sync {
    /// Start MIDI processing. The backend either runs `cycle` on a thread
    /// it owns or calls it periodically from its own process context.
    fn start(&self, init: InitFn, cycle: CycleFn) -> Result<()>;

    /// Request shutdown; `input_event` returns `None` afterwards.
    fn stop(&self);

    /// Next event from input; blocks until one is available, `None` on
    /// shutdown.
    fn input_event(&self) -> Option<MidiEvent>;

    /// Queue one event for output. Callable from the RT thread and from
    /// the backend's own process context.
    fn output_event(&self, ev: &MidiEvent);

    /// Block until pending output has been delivered.
    fn finish(&self) {}

    fn num_out_ports(&self) -> usize;

    fn in_port_names(&self) -> Vec<String>;

    fn out_port_names(&self) -> Vec<String>;

    /// Connect local ports to remote ports matching the given patterns.
    fn connect_ports(
        &self,
        _in_connections: &PortConnectionMap,
        _out_connections: &PortConnectionMap,
    ) -> Result<()> {
        Ok(())
    }
}

/// Names accepted by [`create`].
pub fn available() -> &'static [&'static str] {
    &["dummy", "queue"]
}

/// Create a backend by registry name.
pub fn create(config: &EngineConfig) -> Result<Arc<dyn Backend>> {
    match config.backend.as_str() {
        "dummy" => Ok(DummyBackend::new(
            config.in_ports.clone(),
            config.out_ports.clone(),
        )),
        "queue" => Ok(QueueBackend::new(
            config.in_ports.clone(),
            config.out_ports.clone(),
        )),
        other => Err(Error::InvalidBackendName(other.to_string())),
    }
}

/// Resolve connection patterns against a set of port names. Invalid
/// patterns surface as [`Error::BadRegex`].
pub(crate) fn match_ports<'a>(
    patterns: &[String],
    candidates: &'a [String],
) -> Result<Vec<&'a str>> {
    let mut matched: Vec<&'a str> = Vec::new();
    for pattern in patterns {
        let re = Regex::new(pattern).map_err(|source| Error::BadRegex {
            pattern: pattern.clone(),
            source,
        })?;
        for name in candidates {
            if re.is_match(name) && !matched.contains(&name.as_str()) {
                matched.push(name);
            }
        }
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_unknown_backend() {
        let config = EngineConfig {
            backend: "alsa".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            create(&config),
            Err(Error::InvalidBackendName(name)) if name == "alsa"
        ));
    }

    #[test]
    fn test_create_by_name() {
        for name in available() {
            let config = EngineConfig {
                backend: name.to_string(),
                ..EngineConfig::default()
            };
            assert!(create(&config).is_ok());
        }
    }

    #[test]
    fn test_match_ports() {
        let candidates = vec![
            "synth:midi_in".to_string(),
            "synth:audio_in".to_string(),
            "sampler:midi_in".to_string(),
        ];
        let matched = match_ports(&[".*midi_in".to_string()], &candidates).unwrap();
        assert_eq!(matched, vec!["synth:midi_in", "sampler:midi_in"]);
    }

    #[test]
    fn test_match_ports_bad_regex() {
        let err = match_ports(&["[".to_string()], &[]).unwrap_err();
        assert!(matches!(err, Error::BadRegex { pattern, .. } if pattern == "["));
    }
}
