//! Engine configuration and resource caps.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Total number of events that can be held in the RT event buffer during one
/// process cycle without leaving the pool.
pub const MAX_EVENTS: usize = 1024;

/// Soft cap for notes remembered across scene switches (so note-offs can be
/// routed through the scene that saw the note-on). Exceeding it allocates,
/// which is not RT-safe.
pub const MAX_SIMULTANEOUS_NOTES: usize = 64;

/// Soft cap for sustain pedal states remembered across scene switches.
pub const MAX_SUSTAIN_PEDALS: usize = 4;

/// Depth of the deferred-call queue.
pub const MAX_ASYNC_CALLS: usize = 256;

/// Longest the deferred-call worker sleeps between queue checks.
pub const ASYNC_CALLBACK_INTERVAL: Duration = Duration::from_millis(50);

/// How long engine shutdown waits for the deferred-call worker to exit.
pub const ASYNC_JOIN_TIMEOUT: Duration = Duration::from_millis(3000);

/// Configuration for an engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Backend to create, by registry name.
    pub backend: String,
    /// Client name announced to the MIDI system.
    pub client_name: String,
    /// Input port names, in port-index order.
    pub in_ports: Vec<String>,
    /// Output port names, in port-index order.
    pub out_ports: Vec<String>,
    /// Report sanitize rejects and scene switches.
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: "queue".to_string(),
            client_name: "stagehand".to_string(),
            in_ports: vec!["in".to_string()],
            out_ports: vec!["out".to_string()],
            verbose: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.client_name.is_empty() {
            return Err(Error::InvalidConfig("client_name is empty".to_string()));
        }
        if self.in_ports.is_empty() || self.out_ports.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one input and one output port required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_ports_rejected() {
        let config = EngineConfig {
            out_ports: vec![],
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
