//! Shared helpers for unit parameter handling and value transforms.

use stagehand_midi::MidiEvent;

/// How a velocity or controller transform interprets its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// Add the parameter.
    Offset,
    /// Multiply by the parameter.
    Multiply,
    /// Replace with the parameter.
    Fixed,
    /// `y = 127 * (x/127)^(1/p)`.
    Gamma,
    /// `y = 127 * (e^(-p*x/127) - 1) / (e^(-p) - 1)`.
    Curve,
}

pub(crate) fn apply_transform(value: i32, param: f32, mode: TransformMode) -> i32 {
    match mode {
        TransformMode::Offset => value + param as i32,
        TransformMode::Multiply => (value as f32 * param) as i32,
        TransformMode::Fixed => param as i32,
        TransformMode::Gamma => {
            if value > 0 {
                let x = value as f32 / 127.0;
                let y = x.powf(1.0 / param);
                ((y * 127.0).round() as i32).max(1)
            } else {
                value
            }
        }
        TransformMode::Curve => {
            if value > 0 {
                if param != 0.0 {
                    let p = -param;
                    let a = (p * value as f32 / 127.0).exp() - 1.0;
                    let b = p.exp() - 1.0;
                    ((127.0 * a / b) as i32).max(1)
                } else {
                    value
                }
            } else {
                0
            }
        }
    }
}

/// Map `arg` from `[arg_lower, arg_upper]` to `[val_lower, val_upper]`,
/// clamping outside the input range.
pub(crate) fn map_range(
    arg: i32,
    arg_lower: i32,
    arg_upper: i32,
    val_lower: i32,
    val_upper: i32,
) -> i32 {
    if arg <= arg_lower {
        val_lower
    } else if arg >= arg_upper {
        val_upper
    } else {
        let dx = (arg_upper - arg_lower) as f32;
        let dy = (val_upper - val_lower) as f32;
        ((dy / dx) * (arg - arg_lower) as f32) as i32 + val_lower
    }
}

pub(crate) fn map_range_f(
    arg: i32,
    arg_lower: i32,
    arg_upper: i32,
    val_lower: f32,
    val_upper: f32,
) -> f32 {
    if arg <= arg_lower {
        val_lower
    } else if arg >= arg_upper {
        val_upper
    } else {
        let dx = (arg_upper - arg_lower) as f32;
        let dy = val_upper - val_lower;
        (dy / dx) * (arg - arg_lower) as f32 + val_lower
    }
}

/// Generator parameters may reference an attribute of the event being
/// replaced instead of carrying a literal value.
pub const EVENT_ATTRIBUTE_PORT: i32 = -1;
pub const EVENT_ATTRIBUTE_CHANNEL: i32 = -2;
pub const EVENT_ATTRIBUTE_DATA1: i32 = -3;
pub const EVENT_ATTRIBUTE_DATA2: i32 = -4;

/// Resolve a literal-or-attribute-reference parameter against an event.
pub(crate) fn resolve_parameter(value: i32, ev: &MidiEvent) -> i32 {
    match value {
        v if v >= 0 => v,
        EVENT_ATTRIBUTE_PORT => ev.port,
        EVENT_ATTRIBUTE_CHANNEL => ev.channel,
        EVENT_ATTRIBUTE_DATA1 => ev.data1,
        EVENT_ATTRIBUTE_DATA2 => ev.data2,
        _ => 0,
    }
}
