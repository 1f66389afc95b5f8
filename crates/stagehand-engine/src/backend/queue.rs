//! An in-process backend fed through channels.
//!
//! Embedders (and the integration tests) push events into the input queue
//! from any thread; the backend runs the engine's cycle on a thread it
//! owns and collects output events for draining.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use stagehand_midi::MidiEvent;

use crate::backend::{match_ports, Backend, CycleFn, InitFn, PortConnectionMap};
use crate::error::Result;

pub struct QueueBackend {
    in_ports: Vec<String>,
    out_ports: Vec<String>,
    input_tx: Sender<MidiEvent>,
    input_rx: Receiver<MidiEvent>,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
    output: Mutex<Vec<MidiEvent>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueueBackend {
    pub fn new(in_ports: Vec<String>, out_ports: Vec<String>) -> Arc<Self> {
        let (input_tx, input_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);
        Arc::new(Self {
            in_ports,
            out_ports,
            input_tx,
            input_rx,
            shutdown_tx,
            shutdown_rx,
            output: Mutex::new(Vec::new()),
            worker: Mutex::new(None),
        })
    }

    /// Push one event into the input queue.
    pub fn feed(&self, ev: MidiEvent) {
        let _ = self.input_tx.send(ev);
    }

    /// A cloneable handle for feeding events from other threads.
    pub fn sender(&self) -> Sender<MidiEvent> {
        self.input_tx.clone()
    }

    /// Drain everything emitted so far, in emission order.
    pub fn take_output(&self) -> Vec<MidiEvent> {
        std::mem::take(&mut *self.output.lock())
    }

    /// Number of emitted events not yet drained.
    pub fn pending_output(&self) -> usize {
        self.output.lock().len()
    }
}

impl Backend for QueueBackend {
    fn start(&self, init: InitFn, mut cycle: CycleFn) -> Result<()> {
        init();

        let worker = thread::Builder::new()
            .name("stagehand-rt".to_string())
            .spawn(move || cycle())
            .expect("failed to spawn processing thread");
        *self.worker.lock() = Some(worker);

        Ok(())
    }

    fn stop(&self) {
        let _ = self.shutdown_tx.try_send(());
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }

    fn input_event(&self) -> Option<MidiEvent> {
        crossbeam_channel::select! {
            recv(self.input_rx) -> ev => ev.ok(),
            recv(self.shutdown_rx) -> _ => None,
        }
    }

    fn output_event(&self, ev: &MidiEvent) {
        self.output.lock().push(ev.clone());
    }

    fn num_out_ports(&self) -> usize {
        self.out_ports.len()
    }

    fn in_port_names(&self) -> Vec<String> {
        self.in_ports.clone()
    }

    fn out_port_names(&self) -> Vec<String> {
        self.out_ports.clone()
    }

    fn connect_ports(
        &self,
        in_connections: &PortConnectionMap,
        out_connections: &PortConnectionMap,
    ) -> Result<()> {
        // nothing to wire up in-process; validate the patterns so bad ones
        // are reported at setup time
        for (local, patterns) in in_connections.iter().chain(out_connections.iter()) {
            let matched = match_ports(patterns, &[])?;
            debug!(%local, matched = matched.len(), "port connections resolved");
        }
        Ok(())
    }
}
