//! The MIDI event value type used throughout the routing engine.

use bitflags::bitflags;

use crate::sysex::SysExData;

/// The kind of a single MIDI event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventKind {
    /// An event that failed to decode; has no wire form.
    #[default]
    None,
    NoteOn,
    NoteOff,
    Ctrl,
    Pitchbend,
    Aftertouch,
    PolyAftertouch,
    Program,
    SysEx,
    SyscmQframe,
    SyscmSongpos,
    SyscmSongsel,
    SyscmTunereq,
    SysrtClock,
    SysrtStart,
    SysrtContinue,
    SysrtStop,
    SysrtSensing,
    SysrtReset,
    /// Synthetic event used to trigger scene init/exit patches.
    Dummy,
}

bitflags! {
    /// Sets of event kinds, used by filters to declare what they handle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventKinds: u32 {
        const NOTEON            = 1 << 0;
        const NOTEOFF           = 1 << 1;
        const NOTE              = Self::NOTEON.bits() | Self::NOTEOFF.bits();
        const CTRL              = 1 << 2;
        const PITCHBEND         = 1 << 3;
        const AFTERTOUCH        = 1 << 4;
        const POLY_AFTERTOUCH   = 1 << 5;
        const PROGRAM           = 1 << 6;
        const SYSEX             = 1 << 7;
        const SYSCM_QFRAME      = 1 << 8;
        const SYSCM_SONGPOS     = 1 << 9;
        const SYSCM_SONGSEL     = 1 << 10;
        const SYSCM_TUNEREQ     = 1 << 11;
        const SYSCM             = Self::SYSCM_QFRAME.bits() | Self::SYSCM_SONGPOS.bits()
                                | Self::SYSCM_SONGSEL.bits() | Self::SYSCM_TUNEREQ.bits();
        const SYSRT_CLOCK       = 1 << 12;
        const SYSRT_START       = 1 << 13;
        const SYSRT_CONTINUE    = 1 << 14;
        const SYSRT_STOP        = 1 << 15;
        const SYSRT_SENSING     = 1 << 16;
        const SYSRT_RESET       = 1 << 17;
        const SYSRT             = Self::SYSRT_CLOCK.bits() | Self::SYSRT_START.bits()
                                | Self::SYSRT_CONTINUE.bits() | Self::SYSRT_STOP.bits()
                                | Self::SYSRT_SENSING.bits() | Self::SYSRT_RESET.bits();
        const SYSTEM            = Self::SYSEX.bits() | Self::SYSCM.bits() | Self::SYSRT.bits();
        const DUMMY             = 1 << 29;
        const ANY               = Self::NOTE.bits() | Self::CTRL.bits() | Self::PITCHBEND.bits()
                                | Self::AFTERTOUCH.bits() | Self::POLY_AFTERTOUCH.bits()
                                | Self::PROGRAM.bits() | Self::SYSTEM.bits() | Self::DUMMY.bits();
    }
}

impl EventKind {
    /// The bit this kind occupies in an [`EventKinds`] set.
    pub fn flag(self) -> EventKinds {
        match self {
            EventKind::None => EventKinds::empty(),
            EventKind::NoteOn => EventKinds::NOTEON,
            EventKind::NoteOff => EventKinds::NOTEOFF,
            EventKind::Ctrl => EventKinds::CTRL,
            EventKind::Pitchbend => EventKinds::PITCHBEND,
            EventKind::Aftertouch => EventKinds::AFTERTOUCH,
            EventKind::PolyAftertouch => EventKinds::POLY_AFTERTOUCH,
            EventKind::Program => EventKinds::PROGRAM,
            EventKind::SysEx => EventKinds::SYSEX,
            EventKind::SyscmQframe => EventKinds::SYSCM_QFRAME,
            EventKind::SyscmSongpos => EventKinds::SYSCM_SONGPOS,
            EventKind::SyscmSongsel => EventKinds::SYSCM_SONGSEL,
            EventKind::SyscmTunereq => EventKinds::SYSCM_TUNEREQ,
            EventKind::SysrtClock => EventKinds::SYSRT_CLOCK,
            EventKind::SysrtStart => EventKinds::SYSRT_START,
            EventKind::SysrtContinue => EventKinds::SYSRT_CONTINUE,
            EventKind::SysrtStop => EventKinds::SYSRT_STOP,
            EventKind::SysrtSensing => EventKinds::SYSRT_SENSING,
            EventKind::SysrtReset => EventKinds::SYSRT_RESET,
            EventKind::Dummy => EventKinds::DUMMY,
        }
    }
}

/// A single MIDI event.
///
/// `data1`/`data2` carry kind-specific payloads: note/velocity for note
/// events, param/value for controllers and poly aftertouch, the bend value
/// in `data2` for pitchbend, the program number in `data2`, and so on.
/// Intermediate processing may push the fields outside their wire ranges;
/// the sanitizer clamps or drops before output.
#[derive(Debug, Clone, Default)]
pub struct MidiEvent {
    pub kind: EventKind,
    /// Output port index; 0 for system common/real-time events.
    pub port: i32,
    /// Channel 0-15 for channel messages, 0 otherwise.
    pub channel: i32,
    pub data1: i32,
    pub data2: i32,
    /// Complete system-exclusive message, shared and immutable.
    pub sysex: Option<SysExData>,
    /// Monotonic timestamp supplied by the backend.
    pub frame: u64,
}

impl MidiEvent {
    fn channel_event(kind: EventKind, port: i32, channel: i32, data1: i32, data2: i32) -> Self {
        Self {
            kind,
            port,
            channel,
            data1,
            data2,
            ..Self::default()
        }
    }

    /// Create a note-on event.
    pub fn noteon(port: i32, channel: i32, note: i32, velocity: i32) -> Self {
        Self::channel_event(EventKind::NoteOn, port, channel, note, velocity)
    }

    /// Create a note-off event.
    pub fn noteoff(port: i32, channel: i32, note: i32, velocity: i32) -> Self {
        Self::channel_event(EventKind::NoteOff, port, channel, note, velocity)
    }

    /// Create a control change event.
    pub fn ctrl(port: i32, channel: i32, param: i32, value: i32) -> Self {
        Self::channel_event(EventKind::Ctrl, port, channel, param, value)
    }

    /// Create a pitchbend event; `value` is in [-8192, 8191].
    pub fn pitchbend(port: i32, channel: i32, value: i32) -> Self {
        Self::channel_event(EventKind::Pitchbend, port, channel, 0, value)
    }

    /// Create a channel aftertouch event.
    pub fn aftertouch(port: i32, channel: i32, value: i32) -> Self {
        Self::channel_event(EventKind::Aftertouch, port, channel, 0, value)
    }

    /// Create a polyphonic aftertouch event.
    pub fn poly_aftertouch(port: i32, channel: i32, note: i32, value: i32) -> Self {
        Self::channel_event(EventKind::PolyAftertouch, port, channel, note, value)
    }

    /// Create a program change event.
    pub fn program(port: i32, channel: i32, program: i32) -> Self {
        Self::channel_event(EventKind::Program, port, channel, 0, program)
    }

    /// Create a system-exclusive event owning a shared payload.
    pub fn sysex(port: i32, data: SysExData) -> Self {
        Self {
            kind: EventKind::SysEx,
            port,
            sysex: Some(data),
            ..Self::default()
        }
    }

    /// Create a system common or real-time event of the given kind.
    pub fn system(kind: EventKind, port: i32, data1: i32, data2: i32) -> Self {
        Self {
            kind,
            port,
            data1,
            data2,
            ..Self::default()
        }
    }

    /// Create the synthetic event that triggers scene init/exit patches.
    pub fn dummy() -> Self {
        Self {
            kind: EventKind::Dummy,
            ..Self::default()
        }
    }

    /// True if this event's kind is in the given set.
    #[inline]
    pub fn is(&self, kinds: EventKinds) -> bool {
        kinds.intersects(self.kind.flag())
    }

    #[inline]
    pub fn is_note(&self) -> bool {
        self.is(EventKinds::NOTE)
    }

    #[inline]
    pub fn is_system(&self) -> bool {
        self.is(EventKinds::SYSTEM)
    }

    /// Note number (note and poly aftertouch events).
    #[inline]
    pub fn note(&self) -> i32 {
        self.data1
    }

    /// Velocity (note events).
    #[inline]
    pub fn velocity(&self) -> i32 {
        self.data2
    }

    /// Controller number (controller events).
    #[inline]
    pub fn ctrl_param(&self) -> i32 {
        self.data1
    }

    /// Controller value (controller, pitchbend, aftertouch, program events).
    #[inline]
    pub fn ctrl_value(&self) -> i32 {
        self.data2
    }
}

// Which fields are meaningful depends on the kind; comparing the rest would
// make equal-looking events compare unequal (e.g. a clock tick after a
// channel modifier ran over it).
impl PartialEq for MidiEvent {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind {
            return false;
        }

        let channel = !self.is(EventKinds::SYSTEM | EventKinds::DUMMY);
        let data1 = self.is(
            EventKinds::NOTE
                | EventKinds::CTRL
                | EventKinds::POLY_AFTERTOUCH
                | EventKinds::SYSCM_QFRAME
                | EventKinds::SYSCM_SONGPOS
                | EventKinds::SYSCM_SONGSEL,
        );
        let data2 = self.is(
            EventKinds::NOTE
                | EventKinds::CTRL
                | EventKinds::PITCHBEND
                | EventKinds::AFTERTOUCH
                | EventKinds::POLY_AFTERTOUCH
                | EventKinds::PROGRAM
                | EventKinds::SYSCM_SONGPOS,
        );
        let sysex = self.kind == EventKind::SysEx;

        self.port == other.port
            && (!channel || self.channel == other.channel)
            && (!data1 || self.data1 == other.data1)
            && (!data2 || self.data2 == other.data2)
            && (!sysex || matches!((&self.sysex, &other.sysex), (Some(a), Some(b)) if a == b))
            && self.frame == other.frame
    }
}

impl Eq for MidiEvent {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysex::sysex_data;

    #[test]
    fn test_noteon() {
        let ev = MidiEvent::noteon(0, 2, 60, 100);
        assert_eq!(ev.kind, EventKind::NoteOn);
        assert!(ev.is_note());
        assert_eq!(ev.note(), 60);
        assert_eq!(ev.velocity(), 100);
    }

    #[test]
    fn test_kind_groups() {
        assert!(EventKinds::NOTE.contains(EventKind::NoteOff.flag()));
        assert!(EventKinds::SYSTEM.contains(EventKind::SysrtClock.flag()));
        assert!(EventKinds::SYSTEM.contains(EventKind::SyscmSongpos.flag()));
        assert!(!EventKinds::SYSTEM.contains(EventKinds::DUMMY));
        assert!(EventKinds::ANY.contains(EventKinds::DUMMY));
        assert!(!MidiEvent::default().is(EventKinds::ANY));
    }

    #[test]
    fn test_eq_same_kind() {
        let a = MidiEvent::noteon(0, 1, 60, 100);
        let b = MidiEvent::noteon(0, 1, 60, 100);
        let c = MidiEvent::noteon(0, 1, 60, 101);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_eq_different_kinds() {
        assert_ne!(
            MidiEvent::noteon(0, 0, 60, 0),
            MidiEvent::noteoff(0, 0, 60, 0)
        );
    }

    #[test]
    fn test_eq_ignores_channel_on_system_events() {
        let mut a = MidiEvent::system(EventKind::SysrtClock, 0, 0, 0);
        let mut b = a.clone();
        a.channel = 3;
        b.channel = 9;
        assert_eq!(a, b);
    }

    #[test]
    fn test_eq_ignores_second_slot_without_second_byte() {
        let mut a = MidiEvent::system(EventKind::SyscmQframe, 0, 5, 0);
        let mut b = a.clone();
        a.data2 = 1;
        b.data2 = 2;
        assert_eq!(a, b);
    }

    #[test]
    fn test_eq_sysex_compares_contents() {
        let a = MidiEvent::sysex(0, sysex_data(&[0xf0, 0x01, 0xf7]));
        let b = MidiEvent::sysex(0, sysex_data(&[0xf0, 0x01, 0xf7]));
        let c = MidiEvent::sysex(0, sysex_data(&[0xf0, 0x02, 0xf7]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_eq_includes_frame() {
        let mut a = MidiEvent::noteon(0, 0, 60, 100);
        let b = a.clone();
        a.frame = 7;
        assert_ne!(a, b);
    }
}
