//! Generators replace the current event with a synthetic one.

use stagehand_midi::{EventKind, MidiEvent, SysExData};

use crate::units::util::resolve_parameter;

/// Builds a fixed event, with any field optionally copied from the event
/// being replaced (see the `EVENT_ATTRIBUTE_*` sentinels). The frame of the
/// original event is preserved.
#[derive(Debug, Clone)]
pub struct Generator {
    pub kind: EventKind,
    pub port: i32,
    pub channel: i32,
    pub data1: i32,
    pub data2: i32,
}

impl Generator {
    pub fn new(kind: EventKind, port: i32, channel: i32, data1: i32, data2: i32) -> Self {
        Self {
            kind,
            port,
            channel,
            data1,
            data2,
        }
    }

    pub(crate) fn apply(&self, ev: &mut MidiEvent) {
        let new = MidiEvent {
            kind: self.kind,
            port: resolve_parameter(self.port, ev),
            channel: resolve_parameter(self.channel, ev),
            data1: resolve_parameter(self.data1, ev),
            data2: resolve_parameter(self.data2, ev),
            sysex: ev.sysex.clone(),
            frame: ev.frame,
        };
        *ev = new;
    }
}

pub(crate) fn sysex_generator(ev: &mut MidiEvent, port: i32, data: &SysExData) {
    ev.port = resolve_parameter(port, ev);
    ev.kind = EventKind::SysEx;
    ev.channel = 0;
    ev.data1 = 0;
    ev.data2 = 0;
    ev.sysex = Some(data.clone());
}
