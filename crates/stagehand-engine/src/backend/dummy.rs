//! A backend with no I/O at all, for patch-only use of the engine.

use std::sync::Arc;

use stagehand_midi::MidiEvent;

use crate::backend::{Backend, CycleFn, InitFn};
use crate::error::Result;

pub struct DummyBackend {
    in_ports: Vec<String>,
    out_ports: Vec<String>,
}

impl DummyBackend {
    pub fn new(in_ports: Vec<String>, out_ports: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            in_ports,
            out_ports,
        })
    }
}

impl Backend for DummyBackend {
    fn start(&self, init: InitFn, mut cycle: CycleFn) -> Result<()> {
        init();
        // input_event reports shutdown right away, so this returns promptly
        cycle();
        Ok(())
    }

    fn stop(&self) {}

    fn input_event(&self) -> Option<MidiEvent> {
        None
    }

    fn output_event(&self, _ev: &MidiEvent) {}

    fn num_out_ports(&self) -> usize {
        self.out_ports.len()
    }

    fn in_port_names(&self) -> Vec<String> {
        self.in_ports.clone()
    }

    fn out_port_names(&self) -> Vec<String> {
        self.out_ports.clone()
    }
}
