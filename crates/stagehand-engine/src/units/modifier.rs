//! In-place event modifiers.

use stagehand_midi::{EventKind, EventKinds, MidiEvent};

use crate::units::util::{apply_transform, map_range, map_range_f, TransformMode};

pub(crate) fn port(ev: &mut MidiEvent, port: i32) {
    ev.port = port;
}

pub(crate) fn channel(ev: &mut MidiEvent, channel: i32) {
    // system events have no channel to rewrite
    if !ev.is(EventKinds::SYSTEM | EventKinds::DUMMY) {
        ev.channel = channel;
    }
}

pub(crate) fn transpose(ev: &mut MidiEvent, offset: i32) {
    if ev.is_note() {
        ev.data1 += offset;
    }
}

pub(crate) fn velocity(ev: &mut MidiEvent, param: f32, mode: TransformMode) {
    if ev.kind == EventKind::NoteOn && ev.velocity() > 0 {
        ev.data2 = apply_transform(ev.velocity(), param, mode);
    }
}

/// Velocity transform whose parameter is interpolated over a piecewise
/// linear function of the note number.
#[derive(Debug, Clone)]
pub struct VelocitySlope {
    notes: Vec<i32>,
    params: Vec<f32>,
    mode: TransformMode,
}

impl VelocitySlope {
    /// `notes` must be sorted ascending and have one entry per parameter,
    /// at least two of each.
    pub fn new(notes: Vec<i32>, params: Vec<f32>, mode: TransformMode) -> Self {
        debug_assert_eq!(notes.len(), params.len());
        debug_assert!(notes.len() > 1);
        debug_assert!(notes.windows(2).all(|w| w[0] <= w[1]));
        Self {
            notes,
            params,
            mode,
        }
    }

    pub(crate) fn apply(&self, ev: &mut MidiEvent) {
        if ev.kind == EventKind::NoteOn && ev.velocity() > 0 {
            let mut n = 0;
            while n < self.notes.len() - 2 && self.notes[n + 1] < ev.note() {
                n += 1;
            }
            let param = map_range_f(
                ev.note(),
                self.notes[n],
                self.notes[n + 1],
                self.params[n],
                self.params[n + 1],
            );
            ev.data2 = apply_transform(ev.velocity(), param, self.mode);
        }
    }
}

pub(crate) fn ctrl_map(ev: &mut MidiEvent, ctrl_in: i32, ctrl_out: i32) {
    if ev.kind == EventKind::Ctrl && ev.ctrl_param() == ctrl_in {
        ev.data1 = ctrl_out;
    }
}

pub(crate) fn ctrl_range(
    ev: &mut MidiEvent,
    ctrl: i32,
    min: i32,
    max: i32,
    in_min: i32,
    in_max: i32,
) {
    if ev.kind == EventKind::Ctrl && ev.ctrl_param() == ctrl {
        ev.data2 = map_range(ev.ctrl_value(), in_min, in_max, min, max);
    }
}

pub(crate) fn ctrl_curve(ev: &mut MidiEvent, ctrl: i32, param: f32, mode: TransformMode) {
    if ev.kind == EventKind::Ctrl && ev.ctrl_param() == ctrl {
        ev.data2 = apply_transform(ev.ctrl_value(), param, mode);
    }
}

pub(crate) fn pitchbend_range(
    ev: &mut MidiEvent,
    min: i32,
    max: i32,
    in_min: i32,
    in_max: i32,
) {
    if ev.kind == EventKind::Pitchbend {
        // up and down halves scale independently
        if ev.ctrl_value() >= 0 {
            ev.data2 = map_range(ev.ctrl_value(), 0, in_max, 0, max);
        } else {
            ev.data2 = map_range(ev.ctrl_value(), in_min, 0, min, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_midi::EventKind;

    #[test]
    fn test_channel_leaves_system_events_alone() {
        let mut ev = MidiEvent::noteon(0, 0, 60, 100);
        channel(&mut ev, 5);
        assert_eq!(ev.channel, 5);

        let mut sys = MidiEvent::system(EventKind::SysrtClock, 0, 0, 0);
        channel(&mut sys, 5);
        assert_eq!(sys.channel, 0);
    }

    #[test]
    fn test_transpose_only_notes() {
        let mut ev = MidiEvent::noteon(0, 0, 60, 100);
        transpose(&mut ev, 12);
        assert_eq!(ev.note(), 72);

        let mut cc = MidiEvent::ctrl(0, 0, 7, 100);
        transpose(&mut cc, 12);
        assert_eq!(cc.ctrl_param(), 7);
    }

    #[test]
    fn test_velocity_skips_noteoff() {
        let mut on = MidiEvent::noteon(0, 0, 60, 100);
        velocity(&mut on, 20.0, TransformMode::Offset);
        assert_eq!(on.velocity(), 120);

        let mut off = MidiEvent::noteoff(0, 0, 60, 100);
        velocity(&mut off, 20.0, TransformMode::Offset);
        assert_eq!(off.velocity(), 100);
    }

    #[test]
    fn test_velocity_slope_picks_segment() {
        let slope = VelocitySlope::new(
            vec![0, 64, 127],
            vec![0.0, 20.0, 0.0],
            TransformMode::Offset,
        );

        let mut mid = MidiEvent::noteon(0, 0, 64, 100);
        slope.apply(&mut mid);
        assert_eq!(mid.velocity(), 120);

        let mut low = MidiEvent::noteon(0, 0, 0, 100);
        slope.apply(&mut low);
        assert_eq!(low.velocity(), 100);

        let mut q = MidiEvent::noteon(0, 0, 32, 100);
        slope.apply(&mut q);
        assert_eq!(q.velocity(), 110);
    }

    #[test]
    fn test_ctrl_map_renumbers_matching_controller() {
        let mut ev = MidiEvent::ctrl(0, 0, 1, 64);
        ctrl_map(&mut ev, 1, 11);
        assert_eq!(ev.ctrl_param(), 11);

        let mut other = MidiEvent::ctrl(0, 0, 7, 64);
        ctrl_map(&mut other, 1, 11);
        assert_eq!(other.ctrl_param(), 7);
    }

    #[test]
    fn test_ctrl_range_remaps_and_clamps() {
        let mut ev = MidiEvent::ctrl(0, 0, 7, 64);
        ctrl_range(&mut ev, 7, 0, 100, 0, 127);
        assert_eq!(ev.ctrl_value(), 50);

        let mut low = MidiEvent::ctrl(0, 0, 7, 10);
        ctrl_range(&mut low, 7, 50, 100, 20, 120);
        assert_eq!(low.ctrl_value(), 50);
    }

    #[test]
    fn test_pitchbend_range_scales_halves() {
        let mut up = MidiEvent::pitchbend(0, 0, 8191);
        pitchbend_range(&mut up, -2048, 2048, -8192, 8191);
        assert_eq!(up.ctrl_value(), 2048);

        let mut down = MidiEvent::pitchbend(0, 0, -8192);
        pitchbend_range(&mut down, -2048, 2048, -8192, 8191);
        assert_eq!(down.ctrl_value(), -2048);

        let mut center = MidiEvent::pitchbend(0, 0, 0);
        pitchbend_range(&mut center, -2048, 2048, -8192, 8191);
        assert_eq!(center.ctrl_value(), 0);
    }
}
