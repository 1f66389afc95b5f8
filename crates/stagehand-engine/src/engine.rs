//! The routing engine: scenes, per-event patch selection, and the
//! processing cycle.
//!
//! All mutable engine state lives behind one process mutex; the RT cycle,
//! control-thread scene switches, `output_event` and the deferred-call wake
//! all serialize on it, so a scene switch can never interleave with event
//! processing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use stagehand_midi::{EventKind, MidiEvent};

use crate::backend::{self, Backend, CycleFn, InitFn, PortConnectionMap};
use crate::buffer::{EventBuffer, EventRange};
use crate::caller::{CallProducer, DeferredCaller};
use crate::config::{EngineConfig, MAX_SIMULTANEOUS_NOTES, MAX_SUSTAIN_PEDALS};
use crate::error::{Error, Result};
use crate::patch::{Module, Patch};
use crate::units::{Callback, UnitEx};

/// One sub-scene: the routing patch plus optional init/exit patches run on
/// activation and deactivation.
#[derive(Clone)]
pub struct Scene {
    pub patch: Arc<Patch>,
    pub init_patch: Option<Arc<Patch>>,
    pub exit_patch: Option<Arc<Patch>>,
}

impl Scene {
    pub fn new(patch: Arc<Patch>) -> Self {
        Self {
            patch,
            init_patch: None,
            exit_patch: None,
        }
    }
}

type SceneMap = BTreeMap<i32, Vec<Scene>>;
type EventKey = u64;

/// Invoked under the process mutex whenever a switch is applied and more
/// than one scene exists.
pub type SceneSwitchCallback = Box<dyn FnMut(i32, i32) + Send>;

fn note_key(ev: &MidiEvent) -> EventKey {
    (ev.port as u64 & 0xffff) | (ev.channel as u64 & 0xff) << 16 | (ev.data1 as u64 & 0xff) << 24
}

fn sustain_key(ev: &MidiEvent) -> EventKey {
    (ev.port as u64 & 0xffff) | (ev.channel as u64 & 0xff) << 16
}

pub(crate) struct SceneState {
    scenes: SceneMap,
    /// Never owns the patch; the scene map does.
    current_patch: Weak<Patch>,
    current_scene: i32,
    current_subscene: i32,
    new_scene: i32,
    new_subscene: i32,
    noteon_patches: HashMap<EventKey, Weak<Patch>>,
    sustain_patches: HashMap<EventKey, Weak<Patch>>,
}

impl SceneState {
    pub(crate) fn new() -> Self {
        Self {
            scenes: SceneMap::new(),
            current_patch: Weak::new(),
            current_scene: -1,
            current_subscene: -1,
            new_scene: -1,
            new_subscene: -1,
            noteon_patches: HashMap::with_capacity(MAX_SIMULTANEOUS_NOTES),
            sustain_patches: HashMap::with_capacity(MAX_SUSTAIN_PEDALS),
        }
    }

    fn num_subscenes(&self, scene: i32) -> i32 {
        self.scenes.get(&scene).map_or(0, |subs| subs.len() as i32)
    }
}

#[derive(Clone, Copy)]
pub(crate) struct ProcessEnv {
    pub num_out_ports: usize,
    pub verbose: bool,
}

/// Engine services available to extended units during processing.
///
/// Built fresh for every process call; units never hold on to it.
pub struct EngineCtx<'a> {
    scenes: &'a SceneMap,
    current_scene: i32,
    current_subscene: i32,
    new_scene: &'a mut i32,
    new_subscene: &'a mut i32,
    calls: &'a mut CallProducer,
    num_out_ports: usize,
    verbose: bool,
}

impl<'a> EngineCtx<'a> {
    pub(crate) fn new(
        state: &'a mut SceneState,
        calls: &'a mut CallProducer,
        env: ProcessEnv,
    ) -> Self {
        Self {
            current_scene: state.current_scene,
            current_subscene: state.current_subscene,
            scenes: &state.scenes,
            new_scene: &mut state.new_scene,
            new_subscene: &mut state.new_subscene,
            calls,
            num_out_ports: env.num_out_ports,
            verbose: env.verbose,
        }
    }

    pub fn current_scene(&self) -> i32 {
        self.current_scene
    }

    pub fn current_subscene(&self) -> i32 {
        self.current_subscene
    }

    pub fn has_scene(&self, scene: i32) -> bool {
        self.scenes.contains_key(&scene)
    }

    pub fn num_subscenes(&self) -> i32 {
        self.scenes
            .get(&self.current_scene)
            .map_or(0, |subs| subs.len() as i32)
    }

    pub fn has_subscene(&self, subscene: i32) -> bool {
        subscene >= 0 && self.num_subscenes() > subscene
    }

    /// Coalesce a switch request; -1 keeps the respective current value.
    pub fn request_switch(&mut self, scene: i32, subscene: i32) {
        if scene != -1 {
            *self.new_scene = scene;
        }
        if subscene != -1 {
            *self.new_subscene = subscene;
        }
    }

    /// Hand a callback invocation to the deferred-call worker.
    pub fn call_deferred(&mut self, callback: Callback, ev: MidiEvent) -> bool {
        self.calls.enqueue(callback, ev)
    }

    /// Validate and clamp an outbound event; `false` means drop it.
    pub fn sanitize_event(&self, ev: &mut MidiEvent) -> bool {
        if ev.port < 0 || ev.port >= self.num_out_ports as i32 {
            if self.verbose {
                warn!(port = ev.port, "invalid output port, event discarded");
            }
            return false;
        }

        if ev.channel < 0 || ev.channel > 15 {
            if self.verbose {
                warn!(channel = ev.channel, "invalid channel, event discarded");
            }
            return false;
        }

        match ev.kind {
            EventKind::NoteOn | EventKind::NoteOff => {
                if ev.note() < 0 || ev.note() > 127 {
                    if self.verbose {
                        warn!(note = ev.note(), "invalid note number, event discarded");
                    }
                    return false;
                }
                ev.data2 = ev.data2.clamp(0, 127);
                // a note-on clamped to silence is dropped, not converted
                if ev.kind == EventKind::NoteOn && ev.velocity() < 1 {
                    return false;
                }
                true
            }
            EventKind::Ctrl => {
                if ev.ctrl_param() < 0 || ev.ctrl_param() > 127 {
                    if self.verbose {
                        warn!(
                            param = ev.ctrl_param(),
                            "invalid controller number, event discarded"
                        );
                    }
                    return false;
                }
                ev.data2 = ev.data2.clamp(0, 127);
                true
            }
            EventKind::Pitchbend => {
                ev.data2 = ev.data2.clamp(-8192, 8191);
                true
            }
            EventKind::Aftertouch => {
                ev.data2 = ev.data2.clamp(0, 127);
                true
            }
            EventKind::PolyAftertouch => {
                ev.data1 = ev.data1.clamp(0, 127);
                ev.data2 = ev.data2.clamp(0, 127);
                true
            }
            EventKind::Program => {
                if ev.ctrl_value() < 0 || ev.ctrl_value() > 127 {
                    if self.verbose {
                        warn!(
                            program = ev.ctrl_value(),
                            "invalid program number, event discarded"
                        );
                    }
                    return false;
                }
                true
            }
            EventKind::SysEx => match ev.sysex.as_deref() {
                Some(payload)
                    if payload.len() >= 2
                        && payload.first() == Some(&0xf0)
                        && payload.last() == Some(&0xf7) =>
                {
                    true
                }
                _ => {
                    if self.verbose {
                        warn!("invalid sysex, event discarded");
                    }
                    false
                }
            },
            EventKind::SyscmQframe
            | EventKind::SyscmSongpos
            | EventKind::SyscmSongsel
            | EventKind::SyscmTunereq
            | EventKind::SysrtClock
            | EventKind::SysrtStart
            | EventKind::SysrtContinue
            | EventKind::SysrtStop
            | EventKind::SysrtSensing
            | EventKind::SysrtReset => true,
            EventKind::Dummy | EventKind::None => false,
        }
    }
}

struct Inner {
    state: SceneState,
    ctrl_patch: Option<Arc<Patch>>,
    pre_patch: Option<Arc<Patch>>,
    post_patch: Option<Arc<Patch>>,
    sanitize_patch: Patch,
    calls: CallProducer,
    rt_buffer: EventBuffer,
    scene_switch_cb: Option<SceneSwitchCallback>,
}

/// The MIDI routing engine.
pub struct Engine {
    // declared before backend so the worker is gone before the backend
    caller: DeferredCaller,
    backend: Arc<dyn Backend>,
    num_out_ports: usize,
    verbose: bool,
    inner: Mutex<Inner>,
    epoch: Instant,
}

impl Engine {
    /// Create an engine with a backend from the registry.
    pub fn new(config: EngineConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let backend = backend::create(&config)?;
        Ok(Self::with_backend(&config, backend))
    }

    /// Create an engine around an existing backend instance.
    pub fn with_backend(config: &EngineConfig, backend: Arc<dyn Backend>) -> Arc<Self> {
        let num_out_ports = backend.num_out_ports();

        Arc::new_cyclic(|weak: &Weak<Engine>| {
            let wake = {
                let weak = weak.clone();
                move || {
                    if let Some(engine) = weak.upgrade() {
                        engine.run_async();
                    }
                }
            };
            let (caller, calls) = DeferredCaller::spawn(wake);

            Engine {
                caller,
                backend,
                num_out_ports,
                verbose: config.verbose,
                inner: Mutex::new(Inner {
                    state: SceneState::new(),
                    ctrl_patch: None,
                    pre_patch: None,
                    post_patch: None,
                    sanitize_patch: Patch::new(Module::extended(UnitEx::Sanitize)),
                    calls,
                    rt_buffer: EventBuffer::rt(),
                    scene_switch_cb: None,
                }),
                epoch: Instant::now(),
            }
        })
    }

    /// Append a sub-scene to scene `id`.
    pub fn add_scene(&self, id: i32, scene: Scene) {
        self.inner
            .lock()
            .state
            .scenes
            .entry(id)
            .or_default()
            .push(scene);
    }

    /// Install the global patches applied around per-event routing.
    pub fn set_processing(
        &self,
        ctrl_patch: Option<Arc<Patch>>,
        pre_patch: Option<Arc<Patch>>,
        post_patch: Option<Arc<Patch>>,
    ) {
        let mut inner = self.inner.lock();
        inner.ctrl_patch = ctrl_patch;
        inner.pre_patch = pre_patch;
        inner.post_patch = post_patch;
    }

    pub fn set_scene_switch_callback(&self, callback: SceneSwitchCallback) {
        self.inner.lock().scene_switch_cb = Some(callback);
    }

    /// Hand the processing loop to the backend. `initial_scene == -1`
    /// selects the lowest scene id.
    pub fn start(self: &Arc<Self>, initial_scene: i32, initial_subscene: i32) -> Result<()> {
        if self.inner.lock().state.scenes.is_empty() {
            return Err(Error::NoScenes);
        }

        let this = Arc::clone(self);
        let init: InitFn = Box::new(move || this.run_init(initial_scene, initial_subscene));
        let this = Arc::clone(self);
        let cycle: CycleFn = Box::new(move || this.run_cycle());

        self.backend.start(init, cycle)
    }

    /// Ask the backend to break out of the processing loop.
    pub fn stop(&self) {
        self.backend.stop();
    }

    /// Connect the backend's ports to remote ports matching the given
    /// patterns. Invalid patterns fail the call; the engine keeps running.
    pub fn connect_ports(
        &self,
        in_connections: &PortConnectionMap,
        out_connections: &PortConnectionMap,
    ) -> Result<()> {
        self.backend.connect_ports(in_connections, out_connections)
    }

    /// Request a scene switch; either argument may be -1 to keep the
    /// current value. Applied at the end of the next processing step, or
    /// promptly via the deferred-call worker's wake if the RT thread is
    /// idle.
    pub fn switch_scene(&self, scene: i32, subscene: i32) {
        let mut inner = self.inner.lock();
        if scene != -1 {
            inner.state.new_scene = scene;
        }
        if subscene != -1 {
            inner.state.new_subscene = subscene;
        }
    }

    pub fn current_scene(&self) -> i32 {
        self.inner.lock().state.current_scene
    }

    pub fn current_subscene(&self) -> i32 {
        self.inner.lock().state.current_subscene
    }

    pub fn has_scene(&self, scene: i32) -> bool {
        self.inner.lock().state.scenes.contains_key(&scene)
    }

    pub fn num_subscenes(&self) -> i32 {
        let inner = self.inner.lock();
        inner.state.num_subscenes(inner.state.current_scene)
    }

    pub fn has_subscene(&self, subscene: i32) -> bool {
        subscene >= 0 && self.num_subscenes() > subscene
    }

    /// Scene ids in ascending order.
    pub fn scenes(&self) -> Vec<i32> {
        self.inner.lock().state.scenes.keys().copied().collect()
    }

    /// Send one event straight to the backend, bypassing the patch graph.
    pub fn output_event(&self, ev: &MidiEvent) {
        let _guard = self.inner.lock();
        self.backend.output_event(ev);
    }

    /// Run one event through the graph in a heap-backed buffer and return
    /// everything it produced. Test and scripting entry; does not touch the
    /// backend.
    pub fn process_event(&self, ev: &MidiEvent) -> Vec<MidiEvent> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        // before the first start, route through the lowest scene
        if inner.state.current_patch.upgrade().is_none() {
            if let Some((&id, subs)) = inner.state.scenes.iter().next() {
                inner.state.current_patch = Arc::downgrade(&subs[0].patch);
                inner.state.current_scene = id;
                inner.state.current_subscene = 0;
            }
        }

        let env = self.env();
        let mut buffer = EventBuffer::general();
        Self::process_one(inner, &mut buffer, env, ev);
        Self::process_scene_switch(inner, &mut buffer, env);
        buffer.iter().cloned().collect()
    }

    /// Monotonic seconds since engine construction.
    pub fn time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Number of deferred calls lost to queue overflow.
    pub fn dropped_calls(&self) -> u64 {
        self.caller.dropped_calls()
    }

    /// How often the RT buffer had to leave its pool.
    pub fn rt_fallbacks(&self) -> u64 {
        self.inner.lock().rt_buffer.fallback_count()
    }

    fn env(&self) -> ProcessEnv {
        ProcessEnv {
            num_out_ports: self.num_out_ports,
            verbose: self.verbose,
        }
    }

    fn run_init(&self, initial_scene: i32, initial_subscene: i32) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let initial = if initial_scene == -1 {
            inner.state.scenes.keys().next().copied().unwrap_or(-1)
        } else {
            initial_scene
        };

        inner.state.new_scene = initial;
        inner.state.new_subscene = initial_subscene;

        inner.rt_buffer.clear();
        let env = self.env();
        Self::process_scene_switch_rt(inner, env);
        for ev in inner.rt_buffer.iter() {
            self.backend.output_event(ev);
        }
    }

    fn run_cycle(&self) {
        while let Some(ev) = self.backend.input_event() {
            {
                let mut guard = self.inner.lock();
                let inner = &mut *guard;

                inner.rt_buffer.clear();
                let env = self.env();
                Self::process_one_rt(inner, env, &ev);
                Self::process_scene_switch_rt(inner, env);

                for out in inner.rt_buffer.iter() {
                    self.backend.output_event(out);
                }
            }
            self.backend.finish();
        }
    }

    /// Applies a pending scene switch while the RT thread sits in
    /// `input_event`; called from the deferred-call worker.
    fn run_async(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.state.new_scene == -1 && inner.state.new_subscene == -1 {
            return;
        }

        inner.rt_buffer.clear();
        let env = self.env();
        Self::process_scene_switch_rt(inner, env);
        for ev in inner.rt_buffer.iter() {
            self.backend.output_event(ev);
        }
    }

    fn process_one_rt(inner: &mut Inner, env: ProcessEnv, ev: &MidiEvent) {
        // split out the RT buffer so the rest of the state can form the ctx
        let Inner {
            state,
            ctrl_patch,
            pre_patch,
            post_patch,
            sanitize_patch,
            calls,
            rt_buffer,
            ..
        } = inner;
        Self::process_into(
            state,
            ctrl_patch.as_deref(),
            pre_patch.as_deref(),
            post_patch.as_deref(),
            sanitize_patch,
            calls,
            rt_buffer,
            env,
            ev,
        );
    }

    fn process_one(inner: &mut Inner, buffer: &mut EventBuffer, env: ProcessEnv, ev: &MidiEvent) {
        Self::process_into(
            &mut inner.state,
            inner.ctrl_patch.as_deref(),
            inner.pre_patch.as_deref(),
            inner.post_patch.as_deref(),
            &inner.sanitize_patch,
            &mut inner.calls,
            buffer,
            env,
            ev,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn process_into(
        state: &mut SceneState,
        ctrl_patch: Option<&Patch>,
        pre_patch: Option<&Patch>,
        post_patch: Option<&Patch>,
        sanitize_patch: &Patch,
        calls: &mut CallProducer,
        buffer: &mut EventBuffer,
        env: ProcessEnv,
        ev: &MidiEvent,
    ) {
        debug_assert!(buffer.is_empty());

        let Some(patch) = Self::matching_patch(state, ev) else {
            debug!("no active patch, event discarded");
            return;
        };

        let mut ctx = EngineCtx::new(state, calls, env);

        if let Some(ctrl) = ctrl_patch {
            // the ctrl patch sees its own copy; its output bypasses
            // pre/routing/post
            buffer.push_back(ev.clone());
            ctrl.process_all(buffer, &mut ctx);
        }

        let at = buffer.push_back(ev.clone());
        let mut range = EventRange::new(at, buffer.end());

        if let Some(pre) = pre_patch {
            pre.process(buffer, &mut range, &mut ctx);
        }
        patch.process(buffer, &mut range, &mut ctx);
        if let Some(post) = post_patch {
            post.process(buffer, &mut range, &mut ctx);
        }
        sanitize_patch.process(buffer, &mut range, &mut ctx);
    }

    /// Routing patch selection: note-offs and sustain releases go through
    /// the patch that saw the matching press, everything else through the
    /// current patch.
    fn matching_patch(state: &mut SceneState, ev: &MidiEvent) -> Option<Arc<Patch>> {
        let current = state.current_patch.upgrade();

        match ev.kind {
            EventKind::NoteOn => {
                state
                    .noteon_patches
                    .insert(note_key(ev), state.current_patch.clone());
                current
            }
            EventKind::NoteOff => match state.noteon_patches.remove(&note_key(ev)) {
                Some(stored) => stored.upgrade().or(current),
                None => current,
            },
            EventKind::Ctrl if ev.ctrl_param() == 64 && ev.ctrl_value() == 127 => {
                state
                    .sustain_patches
                    .insert(sustain_key(ev), state.current_patch.clone());
                current
            }
            EventKind::Ctrl if ev.ctrl_param() == 64 && ev.ctrl_value() == 0 => {
                match state.sustain_patches.remove(&sustain_key(ev)) {
                    Some(stored) => stored.upgrade().or(current),
                    None => current,
                }
            }
            _ => current,
        }
    }

    fn process_scene_switch_rt(inner: &mut Inner, env: ProcessEnv) {
        let Inner {
            state,
            post_patch,
            sanitize_patch,
            calls,
            rt_buffer,
            scene_switch_cb,
            ..
        } = inner;
        Self::apply_scene_switch(
            state,
            post_patch.as_deref(),
            sanitize_patch,
            calls,
            rt_buffer,
            env,
            scene_switch_cb,
        );
    }

    fn process_scene_switch(inner: &mut Inner, buffer: &mut EventBuffer, env: ProcessEnv) {
        Self::apply_scene_switch(
            &mut inner.state,
            inner.post_patch.as_deref(),
            &inner.sanitize_patch,
            &mut inner.calls,
            buffer,
            env,
            &mut inner.scene_switch_cb,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_scene_switch(
        state: &mut SceneState,
        post_patch: Option<&Patch>,
        sanitize_patch: &Patch,
        calls: &mut CallProducer,
        buffer: &mut EventBuffer,
        env: ProcessEnv,
        scene_switch_cb: &mut Option<SceneSwitchCallback>,
    ) {
        if state.new_scene == -1 && state.new_subscene == -1 {
            return;
        }

        if state.scenes.len() > 1 {
            if let Some(cb) = scene_switch_cb {
                cb(state.new_scene, state.new_subscene);
            }
        }

        // resolve the concrete target
        let scene = if state.new_scene != -1 {
            state.new_scene
        } else {
            state.current_scene
        };
        let subscene = if state.new_subscene != -1 {
            state.new_subscene
        } else {
            0
        };

        let target = if subscene >= 0 {
            state
                .scenes
                .get(&scene)
                .and_then(|subs| subs.get(subscene as usize))
                .cloned()
        } else {
            None
        };

        if let Some(target) = target {
            // only the sub-scene actually being left runs its exit patch;
            // coalesced intermediate requests get neither init nor exit
            let exit_patch = state
                .scenes
                .get(&state.current_scene)
                .and_then(|subs| subs.get(state.current_subscene as usize))
                .and_then(|sub| sub.exit_patch.clone());

            {
                let mut ctx = EngineCtx::new(state, calls, env);
                if let Some(exit) = &exit_patch {
                    Self::run_dummy_patch(exit, post_patch, sanitize_patch, buffer, &mut ctx);
                }
                if let Some(init) = &target.init_patch {
                    Self::run_dummy_patch(init, post_patch, sanitize_patch, buffer, &mut ctx);
                }
            }

            state.current_patch = Arc::downgrade(&target.patch);
            state.current_scene = scene;
            state.current_subscene = subscene;
            debug!(scene, subscene, "scene switched");
        }

        state.new_scene = -1;
        state.new_subscene = -1;
    }

    /// Feed a dummy event through an init/exit patch, then post-process and
    /// sanitize whatever it produced.
    fn run_dummy_patch(
        patch: &Patch,
        post_patch: Option<&Patch>,
        sanitize_patch: &Patch,
        buffer: &mut EventBuffer,
        ctx: &mut EngineCtx<'_>,
    ) {
        let at = buffer.push_back(MidiEvent::dummy());
        let mut range = EventRange::new(at, buffer.end());
        patch.process(buffer, &mut range, ctx);
        if let Some(post) = post_patch {
            post.process(buffer, &mut range, ctx);
        }
        sanitize_patch.process(buffer, &mut range, ctx);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.backend.stop();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Minimal engine state for driving modules outside a full engine.
    pub(crate) struct Harness {
        state: SceneState,
        calls: CallProducer,
        _caller: DeferredCaller,
    }

    impl Harness {
        pub(crate) fn new() -> Self {
            let (caller, calls) = DeferredCaller::spawn(|| {});
            Self {
                state: SceneState::new(),
                calls,
                _caller: caller,
            }
        }

        pub(crate) fn ctx(&mut self) -> EngineCtx<'_> {
            EngineCtx::new(
                &mut self.state,
                &mut self.calls,
                ProcessEnv {
                    num_out_ports: 2,
                    verbose: false,
                },
            )
        }
    }
}
