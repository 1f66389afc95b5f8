//! Patch trees: chains, forks, and unit wrappers.
//!
//! A module processes a range of events in place; on return the range
//! covers exactly the events it produced, contiguous in the buffer. Modules
//! never keep cursors across calls.

use std::sync::Arc;

use smallvec::SmallVec;

use stagehand_midi::MidiEvent;

use crate::buffer::{Cursor, EventBuffer, EventRange};
use crate::engine::EngineCtx;
use crate::units::{Unit, UnitEx};

/// A node of the patch tree. Modules are immutable once built and may be
/// shared between trees; they never reference their parents.
pub enum Module {
    /// Process through each child in turn.
    Chain(Vec<Arc<Module>>),
    /// Feed a copy of every event to each child, concatenating the outputs.
    Fork {
        modules: Vec<Arc<Module>>,
        remove_duplicates: bool,
    },
    /// A single-event unit.
    Single(Unit),
    /// An extended unit.
    Extended(UnitEx),
}

impl Module {
    pub fn chain(modules: Vec<Arc<Module>>) -> Arc<Module> {
        Arc::new(Module::Chain(modules))
    }

    pub fn fork(modules: Vec<Arc<Module>>, remove_duplicates: bool) -> Arc<Module> {
        Arc::new(Module::Fork {
            modules,
            remove_duplicates,
        })
    }

    pub fn single(unit: Unit) -> Arc<Module> {
        Arc::new(Module::Single(unit))
    }

    pub fn extended(unit: UnitEx) -> Arc<Module> {
        Arc::new(Module::Extended(unit))
    }

    pub fn process(
        &self,
        buffer: &mut EventBuffer,
        range: &mut EventRange,
        ctx: &mut EngineCtx<'_>,
    ) {
        match self {
            Module::Chain(modules) => process_chain(modules, buffer, range, ctx),
            Module::Fork {
                modules,
                remove_duplicates,
            } => process_fork(modules, *remove_duplicates, buffer, range, ctx),
            Module::Single(unit) => process_single(unit, buffer, range),
            Module::Extended(unit) => process_extended(unit, buffer, range, ctx),
        }
    }
}

fn process_chain(
    modules: &[Arc<Module>],
    buffer: &mut EventBuffer,
    range: &mut EventRange,
    ctx: &mut EngineCtx<'_>,
) {
    for module in modules {
        module.process(buffer, range, ctx);

        if range.is_empty() {
            // nothing left for the rest of the chain
            break;
        }
    }
}

fn process_fork(
    modules: &[Arc<Module>],
    remove_duplicates: bool,
    buffer: &mut EventBuffer,
    range: &mut EventRange,
    ctx: &mut EngineCtx<'_>,
) {
    // snapshot the incoming events, then remove them from the buffer
    let mut input: SmallVec<[MidiEvent; 16]> = SmallVec::new();
    let mut at = range.begin();
    while at != range.end() {
        input.push(buffer.get(at).clone());
        at = buffer.next(at);
    }
    let mut at = range.begin();
    while at != range.end() {
        at = buffer.erase(at);
    }

    // no events to return so far
    range.set_begin(range.end());

    for ev in &input {
        // events produced for this input event, across all siblings
        let mut ev_range = EventRange::empty_at(range.end());

        for module in modules {
            let inserted = buffer.insert(ev_range.end(), ev.clone());
            let mut proc_range = EventRange::single(buffer, inserted);
            module.process(buffer, &mut proc_range, ctx);

            if !proc_range.is_empty() && ev_range.is_empty() {
                // first output for this input event; anchor the ranges
                if range.is_empty() {
                    range.set_begin(proc_range.begin());
                }
                ev_range.set_begin(proc_range.begin());
            }

            if remove_duplicates {
                // earlier siblings' outputs for the same input event
                let mut window: SmallVec<[Cursor; 16]> = SmallVec::new();
                let mut at = ev_range.begin();
                while at != proc_range.begin() {
                    window.push(at);
                    at = buffer.next(at);
                }

                let mut at = proc_range.begin();
                while at != proc_range.end() {
                    let duplicate = window.iter().any(|&w| buffer.get(w) == buffer.get(at));
                    if duplicate {
                        at = buffer.erase(at);
                    } else {
                        at = buffer.next(at);
                    }
                }
            }
        }
    }
}

fn process_single(unit: &Unit, buffer: &mut EventBuffer, range: &mut EventRange) {
    let mut at = range.begin();
    while at != range.end() {
        if unit.process(buffer.get_mut(at)) {
            at = buffer.next(at);
        } else {
            if at == range.begin() {
                // erasing the first event; move the range with it
                range.advance_begin(buffer, 1);
            }
            at = buffer.erase(at);
        }
    }
}

fn process_extended(
    unit: &UnitEx,
    buffer: &mut EventBuffer,
    range: &mut EventRange,
    ctx: &mut EngineCtx<'_>,
) {
    let in_range = *range;
    range.set_begin(range.end());

    let mut at = in_range.begin();
    while at != in_range.end() {
        let produced = unit.process(buffer, at, ctx);

        if range.is_empty() && !produced.is_empty() {
            // the first event returned marks the start of the output range
            range.set_begin(produced.begin());
        }

        // processing resumes right after what the unit produced
        at = produced.end();
    }
}

/// A tree of modules applied to one event at a time.
pub struct Patch {
    root: Arc<Module>,
}

impl Patch {
    pub fn new(root: Arc<Module>) -> Self {
        Self { root }
    }

    /// Process a range of events in place.
    pub fn process(
        &self,
        buffer: &mut EventBuffer,
        range: &mut EventRange,
        ctx: &mut EngineCtx<'_>,
    ) {
        self.root.process(buffer, range, ctx);
    }

    /// Process every event currently in the buffer.
    pub fn process_all(&self, buffer: &mut EventBuffer, ctx: &mut EngineCtx<'_>) {
        let mut range = EventRange::new(buffer.begin(), buffer.end());
        self.process(buffer, &mut range, ctx);
    }
}

/// Leave the event at `at` in place; the single-event range covering it.
pub(crate) fn keep_event(buffer: &EventBuffer, at: Cursor) -> EventRange {
    EventRange::single(buffer, at)
}

/// Remove the event at `at`; the empty range where it was.
pub(crate) fn delete_event(buffer: &mut EventBuffer, at: Cursor) -> EventRange {
    let next = buffer.erase(at);
    EventRange::empty_at(next)
}
