//! Units that act on the engine rather than on event payloads.

use crate::buffer::{Cursor, EventBuffer, EventRange};
use crate::engine::EngineCtx;
use crate::patch::{delete_event, keep_event};
use crate::units::util::resolve_parameter;

pub(crate) fn sanitize(
    buffer: &mut EventBuffer,
    at: Cursor,
    ctx: &mut EngineCtx<'_>,
) -> EventRange {
    if ctx.sanitize_event(buffer.get_mut(at)) {
        keep_event(buffer, at)
    } else {
        delete_event(buffer, at)
    }
}

pub(crate) fn scene_switch(
    buffer: &mut EventBuffer,
    at: Cursor,
    ctx: &mut EngineCtx<'_>,
    target: i32,
    offset: i32,
) -> EventRange {
    if offset == 0 {
        let scene = resolve_parameter(target, buffer.get(at));
        ctx.request_switch(scene, -1);
    } else {
        // relative move; requests onto a gap in the scene numbering are
        // ignored rather than skipped over
        let scene = ctx.current_scene() + offset;
        if ctx.has_scene(scene) {
            ctx.request_switch(scene, -1);
        }
    }

    delete_event(buffer, at)
}

pub(crate) fn subscene_switch(
    buffer: &mut EventBuffer,
    at: Cursor,
    ctx: &mut EngineCtx<'_>,
    target: i32,
    offset: i32,
    wrap: bool,
) -> EventRange {
    if offset == 0 {
        let subscene = resolve_parameter(target, buffer.get(at));
        ctx.request_switch(-1, subscene);
    } else {
        let mut subscene = ctx.current_subscene() + offset;
        if wrap && ctx.num_subscenes() > 0 {
            subscene = subscene.rem_euclid(ctx.num_subscenes());
        }
        if ctx.has_subscene(subscene) {
            ctx.request_switch(-1, subscene);
        }
    }

    delete_event(buffer, at)
}
