//! Processing units, the leaves of a patch tree.
//!
//! A [`Unit`] decides keep/drop for one event and may mutate it in place.
//! A [`UnitEx`] operates on the buffer at a cursor and may produce zero or
//! more events, consult engine state, or invoke user callbacks. Both are
//! closed sets of variants dispatched by tag.

mod call;
mod engine_ctl;
mod filter;
mod generator;
mod modifier;
mod util;

pub use call::{CallResult, Callback};
pub use filter::Filter;
pub use generator::Generator;
pub use modifier::VelocitySlope;
pub use util::{
    TransformMode, EVENT_ATTRIBUTE_CHANNEL, EVENT_ATTRIBUTE_DATA1, EVENT_ATTRIBUTE_DATA2,
    EVENT_ATTRIBUTE_PORT,
};

use stagehand_midi::{MidiEvent, SysExData};

use crate::buffer::{Cursor, EventBuffer, EventRange};
use crate::engine::EngineCtx;

/// A single-event unit: keep (possibly mutated) or drop.
#[derive(Clone)]
pub enum Unit {
    /// Keep or drop unconditionally.
    Pass(bool),
    /// Selector filters, see [`Filter`].
    Filter(Filter),
    /// Redirect to an output port.
    Port { port: i32 },
    /// Rewrite the channel of channel events.
    Channel { channel: i32 },
    /// Shift note events by semitones.
    Transpose { offset: i32 },
    /// Transform note-on velocities.
    Velocity { param: f32, mode: TransformMode },
    /// Velocity transform interpolated over the keyboard.
    VelocitySlope(VelocitySlope),
    /// Renumber a controller.
    CtrlMap { ctrl_in: i32, ctrl_out: i32 },
    /// Linearly remap a controller's value range.
    CtrlRange {
        ctrl: i32,
        min: i32,
        max: i32,
        in_min: i32,
        in_max: i32,
    },
    /// Transform a controller's value like a velocity curve.
    CtrlCurve {
        ctrl: i32,
        param: f32,
        mode: TransformMode,
    },
    /// Linearly remap pitchbend, scaling each half independently.
    PitchbendRange {
        min: i32,
        max: i32,
        in_min: i32,
        in_max: i32,
    },
    /// Replace the event with a synthetic one.
    Generator(Generator),
    /// Replace the event with a sysex message.
    SysExGenerator { port: i32, data: SysExData },
}

impl Unit {
    /// Process one event; `false` drops it.
    pub fn process(&self, ev: &mut MidiEvent) -> bool {
        match self {
            Unit::Pass(pass) => *pass,
            Unit::Filter(filter) => filter.process(ev),
            Unit::Port { port } => {
                modifier::port(ev, *port);
                true
            }
            Unit::Channel { channel } => {
                modifier::channel(ev, *channel);
                true
            }
            Unit::Transpose { offset } => {
                modifier::transpose(ev, *offset);
                true
            }
            Unit::Velocity { param, mode } => {
                modifier::velocity(ev, *param, *mode);
                true
            }
            Unit::VelocitySlope(slope) => {
                slope.apply(ev);
                true
            }
            Unit::CtrlMap { ctrl_in, ctrl_out } => {
                modifier::ctrl_map(ev, *ctrl_in, *ctrl_out);
                true
            }
            Unit::CtrlRange {
                ctrl,
                min,
                max,
                in_min,
                in_max,
            } => {
                modifier::ctrl_range(ev, *ctrl, *min, *max, *in_min, *in_max);
                true
            }
            Unit::CtrlCurve { ctrl, param, mode } => {
                modifier::ctrl_curve(ev, *ctrl, *param, *mode);
                true
            }
            Unit::PitchbendRange {
                min,
                max,
                in_min,
                in_max,
            } => {
                modifier::pitchbend_range(ev, *min, *max, *in_min, *in_max);
                true
            }
            Unit::Generator(generator) => {
                generator.apply(ev);
                true
            }
            Unit::SysExGenerator { port, data } => {
                generator::sysex_generator(ev, *port, data);
                true
            }
        }
    }
}

/// An extended unit: consumes the event at the cursor and returns the range
/// of events it produced.
#[derive(Clone)]
pub enum UnitEx {
    /// Validate and clamp; drop what cannot be fixed.
    Sanitize,
    /// Request a scene switch, absolute (`offset == 0`) or relative.
    SceneSwitch { target: i32, offset: i32 },
    /// Request a sub-scene switch, optionally wrapping relative moves.
    SubSceneSwitch {
        target: i32,
        offset: i32,
        wrap: bool,
    },
    /// Invoke a user callback, on the spot or via the deferred-call worker.
    Call {
        callback: Callback,
        is_async: bool,
        cont: bool,
    },
}

impl UnitEx {
    /// Process the event at `at`; the returned range covers the produced
    /// events and tells the caller where to resume.
    pub fn process(
        &self,
        buffer: &mut EventBuffer,
        at: Cursor,
        ctx: &mut EngineCtx<'_>,
    ) -> EventRange {
        match self {
            UnitEx::Sanitize => engine_ctl::sanitize(buffer, at, ctx),
            UnitEx::SceneSwitch { target, offset } => {
                engine_ctl::scene_switch(buffer, at, ctx, *target, *offset)
            }
            UnitEx::SubSceneSwitch {
                target,
                offset,
                wrap,
            } => engine_ctl::subscene_switch(buffer, at, ctx, *target, *offset, *wrap),
            UnitEx::Call {
                callback,
                is_async,
                cont,
            } => {
                if *is_async {
                    call::call_deferred(buffer, at, ctx, callback, *cont)
                } else {
                    call::call_now(buffer, at, callback)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass() {
        let mut ev = MidiEvent::noteon(0, 0, 60, 100);
        assert!(Unit::Pass(true).process(&mut ev));
        assert!(!Unit::Pass(false).process(&mut ev));
    }

    #[test]
    fn test_modifier_units_keep_events() {
        let mut ev = MidiEvent::noteon(0, 0, 60, 100);
        assert!(Unit::Port { port: 1 }.process(&mut ev));
        assert!(Unit::Channel { channel: 9 }.process(&mut ev));
        assert!(Unit::Transpose { offset: -12 }.process(&mut ev));
        assert_eq!(ev.port, 1);
        assert_eq!(ev.channel, 9);
        assert_eq!(ev.note(), 48);
    }
}
