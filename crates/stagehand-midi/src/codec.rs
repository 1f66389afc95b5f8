//! Conversion between wire-format MIDI bytes and [`MidiEvent`].
//!
//! Both directions are pure functions; backends call them from their own
//! process context with whatever buffer discipline their API imposes.

use crate::event::{EventKind, MidiEvent};
use crate::sysex::sysex_data;

/// Decode one complete MIDI message into an event.
///
/// Returns an event of kind [`EventKind::None`] for unknown status bytes or
/// truncated messages. A note-on with velocity 0 decodes as a note-off.
pub fn decode(data: &[u8], port: i32, frame: u64) -> MidiEvent {
    let mut ev = MidiEvent {
        port,
        frame,
        ..MidiEvent::default()
    };

    let Some(&status) = data.first() else {
        return ev;
    };

    if status & 0xf0 != 0xf0 {
        ev.channel = (status & 0x0f) as i32;

        match (status & 0xf0, data.len()) {
            (0x90, 3..) => {
                ev.kind = if data[2] != 0 {
                    EventKind::NoteOn
                } else {
                    EventKind::NoteOff
                };
                ev.data1 = data[1] as i32;
                ev.data2 = data[2] as i32;
            }
            (0x80, 3..) => {
                ev.kind = EventKind::NoteOff;
                ev.data1 = data[1] as i32;
                ev.data2 = data[2] as i32;
            }
            (0xa0, 3..) => {
                ev.kind = EventKind::PolyAftertouch;
                ev.data1 = data[1] as i32;
                ev.data2 = data[2] as i32;
            }
            (0xb0, 3..) => {
                ev.kind = EventKind::Ctrl;
                ev.data1 = data[1] as i32;
                ev.data2 = data[2] as i32;
            }
            (0xc0, 2..) => {
                ev.kind = EventKind::Program;
                ev.data2 = data[1] as i32;
            }
            (0xd0, 2..) => {
                ev.kind = EventKind::Aftertouch;
                ev.data2 = data[1] as i32;
            }
            (0xe0, 3..) => {
                ev.kind = EventKind::Pitchbend;
                ev.data2 = ((data[2] as i32) << 7 | data[1] as i32) - 8192;
            }
            _ => {}
        }
    } else {
        match (status, data.len()) {
            (0xf0, _) => {
                ev.kind = EventKind::SysEx;
                ev.sysex = Some(sysex_data(data));
            }
            (0xf1, 2..) => {
                ev.kind = EventKind::SyscmQframe;
                ev.data1 = data[1] as i32;
            }
            (0xf2, 3..) => {
                ev.kind = EventKind::SyscmSongpos;
                ev.data1 = data[1] as i32;
                ev.data2 = data[2] as i32;
            }
            (0xf3, 2..) => {
                ev.kind = EventKind::SyscmSongsel;
                ev.data1 = data[1] as i32;
            }
            (0xf6, _) => ev.kind = EventKind::SyscmTunereq,
            (0xf8, _) => ev.kind = EventKind::SysrtClock,
            (0xfa, _) => ev.kind = EventKind::SysrtStart,
            (0xfb, _) => ev.kind = EventKind::SysrtContinue,
            (0xfc, _) => ev.kind = EventKind::SysrtStop,
            (0xfe, _) => ev.kind = EventKind::SysrtSensing,
            (0xff, _) => ev.kind = EventKind::SysrtReset,
            _ => {}
        }
    }

    ev
}

/// Encode an event into wire bytes, returning the number of bytes written.
///
/// Returns 0 when the event has no wire representation (none/dummy kinds)
/// or when a sysex payload does not fit into `buf`.
pub fn encode(ev: &MidiEvent, buf: &mut [u8]) -> usize {
    let channel_status = |status: u8| status | (ev.channel as u8 & 0x0f);

    let bytes: &[u8] = match ev.kind {
        EventKind::NoteOn => &[
            channel_status(0x90),
            ev.data1 as u8 & 0x7f,
            ev.data2 as u8 & 0x7f,
        ],
        EventKind::NoteOff => &[
            channel_status(0x80),
            ev.data1 as u8 & 0x7f,
            ev.data2 as u8 & 0x7f,
        ],
        EventKind::Ctrl => &[
            channel_status(0xb0),
            ev.data1 as u8 & 0x7f,
            ev.data2 as u8 & 0x7f,
        ],
        EventKind::Pitchbend => {
            let bend = (ev.data2 + 8192).clamp(0, 16383) as u16;
            &[
                channel_status(0xe0),
                (bend & 0x7f) as u8,
                (bend >> 7) as u8,
            ]
        }
        EventKind::Aftertouch => &[channel_status(0xd0), ev.data2 as u8 & 0x7f],
        EventKind::PolyAftertouch => &[
            channel_status(0xa0),
            ev.data1 as u8 & 0x7f,
            ev.data2 as u8 & 0x7f,
        ],
        EventKind::Program => &[channel_status(0xc0), ev.data2 as u8 & 0x7f],
        EventKind::SysEx => {
            let Some(sysex) = ev.sysex.as_deref() else {
                return 0;
            };
            if sysex.len() > buf.len() {
                // too long for the backend's buffer, drop it
                return 0;
            }
            buf[..sysex.len()].copy_from_slice(sysex);
            return sysex.len();
        }
        EventKind::SyscmQframe => &[0xf1, ev.data1 as u8 & 0x7f],
        EventKind::SyscmSongpos => &[0xf2, ev.data1 as u8 & 0x7f, ev.data2 as u8 & 0x7f],
        EventKind::SyscmSongsel => &[0xf3, ev.data1 as u8 & 0x7f],
        EventKind::SyscmTunereq => &[0xf6],
        EventKind::SysrtClock => &[0xf8],
        EventKind::SysrtStart => &[0xfa],
        EventKind::SysrtContinue => &[0xfb],
        EventKind::SysrtStop => &[0xfc],
        EventKind::SysrtSensing => &[0xfe],
        EventKind::SysrtReset => &[0xff],
        EventKind::None | EventKind::Dummy => return 0,
    };

    if bytes.len() > buf.len() {
        return 0;
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(ev: &MidiEvent) -> MidiEvent {
        let mut buf = [0u8; 16];
        let len = encode(ev, &mut buf);
        assert!(len > 0);
        decode(&buf[..len], ev.port, ev.frame)
    }

    #[test]
    fn test_decode_noteon() {
        let ev = decode(&[0x92, 60, 100], 1, 42);
        assert_eq!(
            ev,
            MidiEvent {
                frame: 42,
                ..MidiEvent::noteon(1, 2, 60, 100)
            }
        );
    }

    #[test]
    fn test_decode_noteon_velocity_zero_is_noteoff() {
        let ev = decode(&[0x90, 60, 0], 0, 0);
        assert_eq!(ev.kind, EventKind::NoteOff);
        assert_eq!(ev.note(), 60);
    }

    #[test]
    fn test_decode_pitchbend_bias() {
        assert_eq!(decode(&[0xe0, 0x00, 0x40], 0, 0).ctrl_value(), 0);
        assert_eq!(decode(&[0xe0, 0x00, 0x00], 0, 0).ctrl_value(), -8192);
        assert_eq!(decode(&[0xe0, 0x7f, 0x7f], 0, 0).ctrl_value(), 8191);
    }

    #[test]
    fn test_decode_unknown_status() {
        assert_eq!(decode(&[0xf4], 0, 0).kind, EventKind::None);
        assert_eq!(decode(&[], 0, 0).kind, EventKind::None);
    }

    #[test]
    fn test_decode_truncated() {
        assert_eq!(decode(&[0x90, 60], 0, 0).kind, EventKind::None);
    }

    #[test]
    fn test_encode_program_single_data_byte() {
        let mut buf = [0u8; 16];
        let len = encode(&MidiEvent::program(0, 3, 17), &mut buf);
        assert_eq!(&buf[..len], &[0xc3, 17]);
    }

    #[test]
    fn test_encode_realtime() {
        let mut buf = [0u8; 16];
        let ev = MidiEvent::system(EventKind::SysrtClock, 0, 0, 0);
        assert_eq!(encode(&ev, &mut buf), 1);
        assert_eq!(buf[0], 0xf8);
    }

    #[test]
    fn test_encode_dummy_has_no_wire_form() {
        let mut buf = [0u8; 16];
        assert_eq!(encode(&MidiEvent::dummy(), &mut buf), 0);
    }

    #[test]
    fn test_sysex_roundtrip_exact() {
        let bytes = [0xf0, 0x7d, 0x01, 0x02, 0x03, 0xf7];
        let ev = decode(&bytes, 0, 0);
        assert_eq!(ev.kind, EventKind::SysEx);
        let mut buf = [0u8; 16];
        let len = encode(&ev, &mut buf);
        assert_eq!(&buf[..len], &bytes);
    }

    #[test]
    fn test_oversize_sysex_dropped() {
        let bytes = [0xf0, 1, 2, 3, 4, 5, 6, 0xf7];
        let ev = decode(&bytes, 0, 0);
        let mut buf = [0u8; 4];
        assert_eq!(encode(&ev, &mut buf), 0);
    }

    #[test]
    fn test_channel_message_roundtrips() {
        let events = [
            MidiEvent::noteon(2, 5, 64, 101),
            MidiEvent::noteoff(0, 15, 0, 0),
            MidiEvent::ctrl(1, 0, 64, 127),
            MidiEvent::pitchbend(0, 7, -1),
            MidiEvent::aftertouch(0, 3, 45),
            MidiEvent::poly_aftertouch(0, 3, 60, 45),
            MidiEvent::program(0, 9, 127),
            MidiEvent::system(EventKind::SyscmSongpos, 0, 0x12, 0x34),
        ];
        for ev in &events {
            assert_eq!(&roundtrip(ev), ev);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_event() -> impl Strategy<Value = MidiEvent> {
            (0..4i32, 0..16i32, 0..128i32, 0..128i32, any::<u64>()).prop_flat_map(
                |(port, channel, d1, d2, frame)| {
                    prop_oneof![
                        Just(MidiEvent::noteon(port, channel, d1, d2.max(1))),
                        Just(MidiEvent::noteoff(port, channel, d1, d2)),
                        Just(MidiEvent::ctrl(port, channel, d1, d2)),
                        Just(MidiEvent::pitchbend(port, channel, (d1 << 7 | d2) - 8192)),
                        Just(MidiEvent::aftertouch(port, channel, d2)),
                        Just(MidiEvent::poly_aftertouch(port, channel, d1, d2)),
                        Just(MidiEvent::program(port, channel, d2)),
                    ]
                    .prop_map(move |mut ev| {
                        ev.frame = frame;
                        ev
                    })
                },
            )
        }

        proptest! {
            #[test]
            fn roundtrip_preserves_valid_events(ev in arb_event()) {
                prop_assert_eq!(&roundtrip(&ev), &ev);
            }

            #[test]
            fn byte_roundtrip_is_exact(
                status in prop_oneof![Just(0x80u8), Just(0x90), Just(0xa0), Just(0xb0), Just(0xe0)],
                channel in 0u8..16,
                d1 in 0u8..128,
                d2 in 1u8..128,
            ) {
                let bytes = [status | channel, d1, d2];
                let ev = decode(&bytes, 0, 0);
                let mut buf = [0u8; 3];
                prop_assert_eq!(encode(&ev, &mut buf), 3);
                prop_assert_eq!(buf, bytes);
            }
        }
    }
}
