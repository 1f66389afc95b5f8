//! Shared ownership of system-exclusive payloads.
//!
//! Sysex messages are large and immutable once decoded; they travel through
//! the event buffers as cheap shared handles and are never copied by units
//! or the encoder.

use std::sync::Arc;

/// A complete sysex message (0xF0 ... 0xF7), shared and immutable.
pub type SysExData = Arc<[u8]>;

/// Wrap a byte slice in a shared sysex payload.
pub fn sysex_data(bytes: &[u8]) -> SysExData {
    Arc::from(bytes)
}
