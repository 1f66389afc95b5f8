//! Selector filters.
//!
//! Every filter declares the event kinds it handles and what happens to
//! events of other kinds (`pass_other`); for handled events it answers a
//! per-event predicate. `Inverted` negates either just the predicate or the
//! whole filter including the kind test.

use stagehand_midi::{EventKinds, MidiEvent, SysExData};

/// A keep/drop predicate over single events.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Matches events whose kind is in the set.
    Type { kinds: EventKinds },
    /// Matches events on one of the given ports.
    Port { ports: Vec<i32> },
    /// Matches channel events on one of the given channels.
    Channel { channels: Vec<i32> },
    /// Matches note events by range `[lower, upper)` (a zero bound is open)
    /// or, with both bounds zero, by membership in `notes`.
    Key {
        lower: i32,
        upper: i32,
        notes: Vec<i32>,
    },
    /// Matches note-ons with velocity in `[lower, upper)` (zero bounds open).
    Velocity { lower: i32, upper: i32 },
    /// Matches controller events for one of the given controllers.
    Ctrl { ctrls: Vec<i32> },
    /// Matches controller events with value in `[lower, upper)` (zero bounds
    /// open).
    CtrlValue { lower: i32, upper: i32 },
    /// Matches program changes to one of the given programs.
    Program { programs: Vec<i32> },
    /// Matches sysex events by full payload, or by prefix if `partial`.
    SysEx { data: SysExData, partial: bool },
    /// `negate`: invert the wrapped filter wholesale. Otherwise pass events
    /// the wrapped filter rejects, keeping its `pass_other` behavior for
    /// kinds it does not handle.
    Inverted { filter: Box<Filter>, negate: bool },
}

impl Filter {
    /// The kinds this filter's predicate applies to.
    pub fn handled(&self) -> EventKinds {
        match self {
            Filter::Type { .. } | Filter::Port { .. } | Filter::Inverted { .. } => EventKinds::ANY,
            Filter::Channel { .. } => EventKinds::ANY
                .difference(EventKinds::SYSTEM)
                .difference(EventKinds::DUMMY),
            Filter::Key { .. } => EventKinds::NOTE,
            Filter::Velocity { .. } => EventKinds::NOTEON,
            Filter::Ctrl { .. } | Filter::CtrlValue { .. } => EventKinds::CTRL,
            Filter::Program { .. } => EventKinds::PROGRAM,
            Filter::SysEx { .. } => EventKinds::SYSEX,
        }
    }

    /// What happens to events of kinds the filter does not handle.
    pub fn pass_other(&self) -> bool {
        match self {
            Filter::Key { .. } | Filter::Velocity { .. } => true,
            _ => false,
        }
    }

    /// The predicate for handled events.
    fn matches(&self, ev: &MidiEvent) -> bool {
        match self {
            Filter::Type { kinds } => ev.is(*kinds),
            Filter::Port { ports } => ports.contains(&ev.port),
            Filter::Channel { channels } => channels.contains(&ev.channel),
            Filter::Key {
                lower,
                upper,
                notes,
            } => {
                if *lower != 0 || *upper != 0 {
                    (ev.note() >= *lower || *lower == 0) && (ev.note() < *upper || *upper == 0)
                } else {
                    notes.contains(&ev.note())
                }
            }
            Filter::Velocity { lower, upper } => {
                (ev.velocity() >= *lower || *lower == 0)
                    && (ev.velocity() < *upper || *upper == 0)
            }
            Filter::Ctrl { ctrls } => ctrls.contains(&ev.ctrl_param()),
            Filter::CtrlValue { lower, upper } => {
                (ev.ctrl_value() >= *lower || *lower == 0)
                    && (ev.ctrl_value() < *upper || *upper == 0)
            }
            Filter::Program { programs } => programs.contains(&ev.ctrl_value()),
            Filter::SysEx { data, partial } => match ev.sysex.as_deref() {
                Some(payload) if *partial => payload.starts_with(data),
                Some(payload) => payload == &data[..],
                None => false,
            },
            Filter::Inverted { filter, negate } => {
                if *negate {
                    !filter.process(ev)
                } else if ev.is(filter.handled()) {
                    !filter.matches(ev)
                } else {
                    filter.pass_other()
                }
            }
        }
    }

    /// Keep/drop decision for any event.
    pub fn process(&self, ev: &MidiEvent) -> bool {
        if ev.is(self.handled()) {
            self.matches(ev)
        } else {
            self.pass_other()
        }
    }
}
