//! User-callback invocation, synchronous and deferred.

use std::sync::Arc;

use tracing::error;

use stagehand_midi::MidiEvent;

use crate::buffer::{Cursor, EventBuffer, EventRange};
use crate::engine::EngineCtx;
use crate::error::CallbackError;
use crate::patch::{delete_event, keep_event};

/// What a synchronous callback wants done with the event it was given.
pub enum CallResult {
    /// Keep the event unchanged.
    Keep,
    /// Drop the event.
    Drop,
    /// Replace the event in place.
    Replace(MidiEvent),
    /// Replace the event with a sequence; empty drops, the first keeps the
    /// original's buffer position.
    ReplaceMany(Vec<MidiEvent>),
}

/// A user callback. Deferred invocations ignore the result.
pub type Callback = Arc<dyn Fn(&MidiEvent) -> Result<CallResult, CallbackError> + Send + Sync>;

pub(crate) fn call_now(buffer: &mut EventBuffer, at: Cursor, callback: &Callback) -> EventRange {
    match callback(buffer.get(at)) {
        Ok(CallResult::Keep) => keep_event(buffer, at),
        Ok(CallResult::Drop) => delete_event(buffer, at),
        Ok(CallResult::Replace(ev)) => {
            *buffer.get_mut(at) = ev;
            keep_event(buffer, at)
        }
        Ok(CallResult::ReplaceMany(events)) => {
            let mut events = events.into_iter();
            match events.next() {
                None => delete_event(buffer, at),
                Some(first) => {
                    *buffer.get_mut(at) = first;
                    let after = buffer.next(at);
                    for ev in events {
                        buffer.insert(after, ev);
                    }
                    EventRange::new(at, after)
                }
            }
        }
        Err(err) => {
            error!(%err, "synchronous callback failed, event dropped");
            delete_event(buffer, at)
        }
    }
}

pub(crate) fn call_deferred(
    buffer: &mut EventBuffer,
    at: Cursor,
    ctx: &mut EngineCtx<'_>,
    callback: &Callback,
    cont: bool,
) -> EventRange {
    let ev = buffer.get(at).clone();
    ctx.call_deferred(callback.clone(), ev);

    if cont {
        keep_event(buffer, at)
    } else {
        delete_event(buffer, at)
    }
}
