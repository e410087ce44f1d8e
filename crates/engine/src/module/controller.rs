use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::content::{
    ContentError, ContentKind, ContentParseError, ContentSource, ExitTarget, ModuleInfo,
    WalkableSurfaces,
};
use crate::render::{FrameGuard, RenderBackend};
use crate::resources::{ResourceError, ResourceScope, ResourceSystem};
use crate::script::{ScriptError, ScriptInvocation, ScriptLibrary, ScriptRunner, ScriptState};
use crate::world::{Area, GameObject, ObjectContainer, ObjectId, ObjectKind, Vec3};

use super::actions::{Action, DeferredActionQueue};
use super::config::{ModuleConfig, TexturePack};
use super::events::{Event, EventKind, EventQueue, Key};
use super::movement::{normalize_degrees, plan_step, MovementInput, MovementParams};
use super::transition::{AreaTransitionCoordinator, RelocateOutcome, TransitionError};

/// Upper bound on dice rolled by a single `roll` call.
pub const MAX_DICE_COUNT: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleState {
    Unloaded,
    Loaded,
    Running,
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("{kind} '{name}' not found")]
    ContentNotFound { kind: ContentKind, name: String },
    #[error("malformed content: {0}")]
    MalformedContent(#[source] ContentParseError),
    #[error("failed to read {path}: {source}")]
    ContentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("{operation} is not valid while the module is {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: ModuleState,
    },
    #[error("{operation} cannot be called while a script is running")]
    Reentrant { operation: &'static str },
    #[error("no PC attached")]
    NoPc,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Script(#[from] ScriptError),
}

impl From<ContentError> for ModuleError {
    fn from(error: ContentError) -> Self {
        match error {
            ContentError::NotFound { kind, name } => Self::ContentNotFound { kind, name },
            ContentError::Malformed(parse) => Self::MalformedContent(parse),
            ContentError::Io { path, source } => Self::ContentIo { path, source },
        }
    }
}

/// Where the PC should appear when a module is entered: the first object
/// with this tag (optionally of this kind) in any of the module's areas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLocation {
    pub tag: String,
    pub kind: Option<ObjectKind>,
}

impl EntryLocation {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: ObjectKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    ModuleChanged { module: String },
    Exited,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraState {
    pub target: Vec3,
    pub facing_degrees: f32,
    pub free: bool,
}

/// Serializable summary for hosts and tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleStatus {
    pub state: ModuleState,
    pub module: Option<String>,
    pub area: Option<String>,
    pub pc_position: Option<Vec3>,
    pub sim_time_ms: u64,
    pub pending_actions: usize,
    pub pending_events: usize,
    pub object_count: usize,
}

/// Collaborators the controller drives. Passed in explicitly so tests can
/// substitute every one of them.
pub struct ModuleServices {
    pub content: Box<dyn ContentSource>,
    pub resources: Arc<dyn ResourceSystem>,
    pub render: Arc<dyn RenderBackend>,
    pub scripts: Box<dyn ScriptRunner>,
}

struct LoadedModule {
    info: ModuleInfo,
    object: ObjectId,
    entry: Option<EntryLocation>,
    scope: ResourceScope,
}

struct PreparedModule {
    info: ModuleInfo,
    scripts: ScriptLibrary,
    scope: ResourceScope,
}

#[derive(Debug, Clone)]
struct PendingLoad {
    module: String,
    entry: Option<EntryLocation>,
}

/// Loads, runs and tears down one module at a time.
///
/// `Unloaded -> Loaded -> Running -> Unloaded`. Requests that would replace
/// the running module are recorded and applied at the end of the next
/// [`tick`](Self::tick), never while a script is executing.
pub struct ModuleController {
    content: Box<dyn ContentSource>,
    resources: Arc<dyn ResourceSystem>,
    render: Arc<dyn RenderBackend>,
    runner: Option<Box<dyn ScriptRunner>>,
    config: ModuleConfig,

    state: ModuleState,
    module: Option<LoadedModule>,
    texture_pack: Option<(TexturePack, ResourceScope)>,
    objects: ObjectContainer,
    areas: BTreeMap<ObjectId, Area>,
    pc: Option<ObjectId>,
    surfaces: Option<Arc<WalkableSurfaces>>,

    actions: DeferredActionQueue,
    events: EventQueue,
    sim_time_ms: u64,
    next_heartbeat_ms: Option<u64>,
    pending_load: Option<PendingLoad>,
    exit_requested: bool,

    movement: MovementInput,
    camera: CameraState,
    show_walkmesh: bool,
    dispatch_depth: u32,
    rng: fastrand::Rng,
}

impl ModuleController {
    pub fn new(services: ModuleServices, config: ModuleConfig) -> Self {
        Self {
            content: services.content,
            resources: services.resources,
            render: services.render,
            runner: Some(services.scripts),
            config,
            state: ModuleState::Unloaded,
            module: None,
            texture_pack: None,
            objects: ObjectContainer::default(),
            areas: BTreeMap::new(),
            pc: None,
            surfaces: None,
            actions: DeferredActionQueue::new(),
            events: EventQueue::new(),
            sim_time_ms: 0,
            next_heartbeat_ms: None,
            pending_load: None,
            exit_requested: false,
            movement: MovementInput::default(),
            camera: CameraState::default(),
            show_walkmesh: false,
            dispatch_depth: 0,
            rng: fastrand::Rng::new(),
        }
    }

    /// Loads `module`, or schedules it when another module is running.
    ///
    /// A scheduled load still validates the target's info record now, so a
    /// missing or malformed module is reported to the caller and the
    /// running module stays untouched.
    pub fn load(&mut self, module: &str, entry: Option<EntryLocation>) -> Result<(), ModuleError> {
        if self.state == ModuleState::Running || self.dispatch_depth > 0 {
            self.content.module_info(module).map_err(|err| {
                let err = ModuleError::from(err);
                warn!(module, error = %err, "module_load_rejected");
                err
            })?;
            info!(module, "module_load_scheduled");
            self.pending_load = Some(PendingLoad {
                module: module.to_string(),
                entry,
            });
            return Ok(());
        }

        let prepared = self.prepare(module).map_err(|err| {
            warn!(module, error = %err, "module_load_failed");
            err
        })?;
        self.unload_inner(false);
        self.install(prepared, entry);
        Ok(())
    }

    /// Attaches `pc` as the player character and returns its id.
    ///
    /// A previously attached PC is destroyed; the new one takes its place in
    /// the world when a module is running.
    pub fn use_pc(&mut self, pc: GameObject) -> ObjectId {
        let previous = self.pc.take().and_then(|id| self.objects.remove(id));
        if let Some(old) = previous.as_ref().filter(|old| old.visible || old.model_loaded) {
            let _frame = FrameGuard::lock(self.render.as_ref());
            if old.visible {
                self.render.hide(old.id);
            }
            if old.model_loaded {
                self.render.unload_model(old.id);
            }
        }

        let mut pc = pc;
        pc.visible = false;
        pc.model_loaded = false;
        pc.area = None;
        if let Some(old) = previous.as_ref().filter(|old| old.area.is_some()) {
            pc.area = old.area;
            pc.position = old.position;
            pc.orientation_degrees = old.orientation_degrees;
        }
        let id = self.objects.insert(pc);
        self.pc = Some(id);
        info!(pc = id.0, replaced = previous.is_some(), "pc_attached");

        let presented = self.presented_area_id();
        if let Some(object) = self.objects.get_mut(id) {
            if object.area.is_some() && object.area == presented {
                let _frame = FrameGuard::lock(self.render.as_ref());
                present_object(self.render.as_ref(), object);
            }
        }
        if self.state == ModuleState::Running {
            self.moved_pc();
        }
        id
    }

    /// Enters the loaded module: texture pack, areas, surface table, PC
    /// placement and the module's load/enter scripts.
    ///
    /// Failure of any step unloads whatever was loaded so far.
    pub fn enter(&mut self) -> Result<(), ModuleError> {
        self.ensure_not_dispatching("enter")?;
        self.ensure_state("enter", ModuleState::Loaded)?;
        if self.pc.is_none() {
            warn!("module_enter_without_pc");
            return Err(ModuleError::NoPc);
        }

        if let Err(err) = self.enter_inner() {
            error!(
                module = self.module_name().unwrap_or_default(),
                error = %err,
                "module_enter_failed"
            );
            self.unload_texture_pack();
            self.unload_inner(false);
            return Err(err);
        }

        let (module_object, scripts) = match self.module.as_ref() {
            Some(module) => (module.object, module.info.scripts.clone()),
            None => return Ok(()),
        };
        let pc = self.pc;
        for script in [scripts.on_module_load, scripts.on_client_enter]
            .into_iter()
            .flatten()
        {
            self.run_script_logged(&script, None, Some(module_object), pc);
        }
        Ok(())
    }

    /// Advances simulated time by `elapsed_ms` and runs one simulation step:
    /// events, due actions, PC movement, then any scheduled exit or module
    /// change.
    pub fn tick(&mut self, elapsed_ms: u64) -> Result<TickOutcome, ModuleError> {
        self.ensure_not_dispatching("tick")?;
        self.ensure_state("tick", ModuleState::Running)?;

        self.sim_time_ms = self.sim_time_ms.saturating_add(elapsed_ms);
        self.process_event_queue();
        self.schedule_heartbeat();
        self.process_actions();
        self.handle_movement(elapsed_ms as f32 / 1000.0);

        if self.exit_requested {
            self.pending_load = None;
            self.leave()?;
            return Ok(TickOutcome::Exited);
        }
        if let Some(pending) = self.pending_load.take() {
            return self.replace_running(pending);
        }
        Ok(TickOutcome::Continue)
    }

    /// Leaves the running module and releases everything it holds,
    /// including the PC and the texture pack.
    pub fn leave(&mut self) -> Result<(), ModuleError> {
        self.ensure_not_dispatching("leave")?;
        self.ensure_state("leave", ModuleState::Running)?;
        let module = self.module_name().unwrap_or_default().to_string();
        self.unload_inner(true);
        info!(module = %module, "module_left");
        Ok(())
    }

    /// Requests a leave at the next tick boundary.
    pub fn exit(&mut self) {
        debug!("module_exit_requested");
        self.exit_requested = true;
    }

    /// Tears down the current module. A partial unload keeps the PC and the
    /// texture pack for the next module.
    pub fn unload(&mut self, complete: bool) -> Result<(), ModuleError> {
        self.ensure_not_dispatching("unload")?;
        self.unload_inner(complete);
        Ok(())
    }

    /// Schedules `script` to run `delay_ms` of simulated time from now.
    ///
    /// A zero delay still waits for the next action pass.
    pub fn delay_script(
        &mut self,
        script: &str,
        state: ScriptState,
        owner: Option<ObjectId>,
        triggerer: Option<ObjectId>,
        delay_ms: u64,
    ) -> Result<(), ModuleError> {
        if self.state == ModuleState::Unloaded {
            return Err(self.invalid_transition("delay_script"));
        }
        let timestamp = self.sim_time_ms.saturating_add(delay_ms);
        debug!(script, delay_ms, timestamp, "script_delayed");
        self.actions
            .insert(Action::script(script, state, owner, triggerer, timestamp));
        Ok(())
    }

    /// Removes a placed object from the world. The PC, areas and the module
    /// itself cannot be destroyed this way.
    pub fn destroy_object(&mut self, id: ObjectId) -> bool {
        if Some(id) == self.pc || Some(id) == self.module_object_id() || self.areas.contains_key(&id) {
            return false;
        }
        let Some(mut object) = self.objects.remove(id) else {
            return false;
        };
        if object.visible || object.model_loaded {
            let _frame = FrameGuard::lock(self.render.as_ref());
            withdraw_object(self.render.as_ref(), &mut object);
        }
        debug!(object = id.0, tag = %object.tag, "object_destroyed");
        true
    }

    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Moves the PC within its current area.
    pub fn move_pc(&mut self, x: f32, y: f32, z: f32) -> Result<(), ModuleError> {
        let pc = self.pc.ok_or(ModuleError::NoPc)?;
        let area = self.objects.get(pc).and_then(|object| object.area);
        self.jump_to(pc, area, Vec3::new(x, y, z))?;
        Ok(())
    }

    /// Moves the PC to the object tagged `tag`. A different module is loaded
    /// at the next tick boundary with that object as its entry location.
    pub fn move_pc_to(
        &mut self,
        module: &str,
        tag: &str,
        kind: Option<ObjectKind>,
    ) -> Result<(), ModuleError> {
        let pc = self.pc.ok_or(ModuleError::NoPc)?;
        if self.module_name() != Some(module) {
            let mut entry = EntryLocation::tag(tag);
            entry.kind = kind;
            return self.load(module, Some(entry));
        }

        let target = self
            .objects
            .find_by_tag(tag, kind, 0)
            .filter(|id| *id != pc)
            .and_then(|id| self.objects.get(id))
            .filter(|object| object.area.is_some())
            .map(|object| (object.area, object.position, object.orientation_degrees))
            .ok_or_else(|| ModuleError::ContentNotFound {
                kind: ContentKind::Object,
                name: tag.to_string(),
            })?;
        let (area, position, orientation) = target;
        self.jump_to(pc, area, position)?;
        if let Some(object) = self.objects.get_mut(pc) {
            object.orientation_degrees = orientation;
        }
        self.moved_pc();
        Ok(())
    }

    /// Relocates `object`, then refreshes PC-dependent state when the PC is
    /// the one that moved.
    pub fn jump_to(
        &mut self,
        object: ObjectId,
        area: Option<ObjectId>,
        position: Vec3,
    ) -> Result<RelocateOutcome, ModuleError> {
        let outcome = AreaTransitionCoordinator::new(self.render.as_ref())
            .relocate(&mut self.objects, &self.areas, object, area, position)
            .map_err(|err| {
                warn!(object = object.0, error = %err, "relocate_failed");
                err
            })?;
        if Some(object) == self.pc {
            self.moved_pc();
        }
        Ok(outcome)
    }

    /// Re-syncs the camera and presented area with the PC's position.
    pub fn moved_pc(&mut self) {
        let Some(pc) = self.pc.and_then(|id| self.objects.get(id)) else {
            return;
        };
        let (pc_area, position, facing) = (pc.area, pc.position, pc.orientation_degrees);
        if !self.camera.free {
            self.camera.target = position;
            self.camera.facing_degrees = facing;
        }

        let presented = self.presented_area_id();
        if let Some(area) = pc_area.filter(|area| Some(*area) != presented) {
            self.present_area(presented, area);
        }
        debug!(x = position.x, y = position.y, z = position.z, "pc_moved");
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn module_info(&self) -> Option<&ModuleInfo> {
        self.module.as_ref().map(|module| &module.info)
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module.as_ref().map(|module| module.info.name.as_str())
    }

    pub fn module_object_id(&self) -> Option<ObjectId> {
        self.module.as_ref().map(|module| module.object)
    }

    /// The area the PC is in.
    pub fn current_area(&self) -> Option<&Area> {
        let area = self.pc.and_then(|id| self.objects.get(id))?.area?;
        self.areas.get(&area)
    }

    pub fn area(&self, id: ObjectId) -> Option<&Area> {
        self.areas.get(&id)
    }

    pub fn area_by_resref(&self, resref: &str) -> Option<&Area> {
        self.areas.values().find(|area| area.resref == resref)
    }

    pub fn areas(&self) -> impl Iterator<Item = &Area> {
        self.areas.values()
    }

    pub fn pc(&self) -> Option<&GameObject> {
        self.pc.and_then(|id| self.objects.get(id))
    }

    pub fn pc_id(&self) -> Option<ObjectId> {
        self.pc
    }

    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(id)
    }

    pub fn objects(&self) -> &ObjectContainer {
        &self.objects
    }

    pub fn find_object_by_tag(&self, tag: &str, kind: Option<ObjectKind>, nth: usize) -> Option<ObjectId> {
        self.objects.find_by_tag(tag, kind, nth)
    }

    pub fn walkable_surfaces(&self) -> Option<Arc<WalkableSurfaces>> {
        self.surfaces.clone()
    }

    pub fn texture_pack(&self) -> Option<TexturePack> {
        self.texture_pack.as_ref().map(|(pack, _)| *pack)
    }

    pub fn sim_time_ms(&self) -> u64 {
        self.sim_time_ms
    }

    pub fn pending_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn pending_module(&self) -> Option<&str> {
        self.pending_load.as_ref().map(|pending| pending.module.as_str())
    }

    pub fn is_exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn camera(&self) -> CameraState {
        self.camera
    }

    pub fn is_walkmesh_visible(&self) -> bool {
        self.show_walkmesh
    }

    pub fn status(&self) -> ModuleStatus {
        ModuleStatus {
            state: self.state,
            module: self.module_name().map(str::to_string),
            area: self.current_area().map(|area| area.resref.clone()),
            pc_position: self.pc().map(|pc| pc.position),
            sim_time_ms: self.sim_time_ms,
            pending_actions: self.actions.len(),
            pending_events: self.events.len(),
            object_count: self.objects.len(),
        }
    }

    pub fn seed_rng(&mut self, seed: u64) {
        self.rng.seed(seed);
    }

    /// Sum of `count` rolls in `min..=max`; a count below one rolls once
    /// and counts above `MAX_DICE_COUNT` are capped.
    pub fn roll(&mut self, min: i32, max: i32, count: i32) -> i32 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        (0..count.clamp(1, MAX_DICE_COUNT)).fold(0i32, |total, _| {
            total.saturating_add(self.rng.i32(low..=high))
        })
    }

    /// Uniform value in `0..n`, or zero when `n` is not positive.
    pub fn random_below(&mut self, n: i32) -> i32 {
        if n <= 0 {
            0
        } else {
            self.rng.i32(0..n)
        }
    }

    /// Runs `script` immediately and returns once it finished.
    pub fn run_script(
        &mut self,
        script: &str,
        state: Option<ScriptState>,
        owner: Option<ObjectId>,
        triggerer: Option<ObjectId>,
    ) -> Result<(), ModuleError> {
        let Some(mut runner) = self.runner.take() else {
            return Err(ScriptError::RunnerBusy.into());
        };
        let invocation = ScriptInvocation {
            script: script.to_string(),
            state,
            owner,
            triggerer,
        };
        self.dispatch_depth += 1;
        let result = runner.run(&invocation, self);
        self.dispatch_depth -= 1;
        self.runner = Some(runner);
        result.map_err(ModuleError::from)
    }

    fn run_script_logged(
        &mut self,
        script: &str,
        state: Option<ScriptState>,
        owner: Option<ObjectId>,
        triggerer: Option<ObjectId>,
    ) {
        if let Err(err) = self.run_script(script, state, owner, triggerer) {
            warn!(script, error = %err, "script_failed");
        }
    }

    fn prepare(&self, module: &str) -> Result<PreparedModule, ModuleError> {
        let sources = self.content.module_resources(module)?;
        let scope = ResourceScope::acquire(&self.resources, format!("module:{module}"), &sources)?;
        let info = self.content.module_info(module)?;
        let scripts = self.content.scripts(module)?;
        Ok(PreparedModule {
            info,
            scripts,
            scope,
        })
    }

    fn install(&mut self, prepared: PreparedModule, entry: Option<EntryLocation>) {
        let PreparedModule {
            info,
            scripts,
            scope,
        } = prepared;
        let object = self
            .objects
            .insert(GameObject::new(info.name.clone(), ObjectKind::Module));
        if let Some(runner) = self.runner.as_mut() {
            runner.module_loaded(&info.name, scripts);
        }
        info!(
            module = %info.name,
            display_name = %info.display_name,
            area_count = info.areas.len(),
            "module_loaded"
        );
        self.module = Some(LoadedModule {
            info,
            object,
            entry,
            scope,
        });
        self.state = ModuleState::Loaded;
    }

    fn enter_inner(&mut self) -> Result<(), ModuleError> {
        self.load_texture_pack()?;
        self.load_areas()?;
        self.surfaces = Some(Arc::new(self.content.surface_table()?));

        let (area, position, orientation) = self.resolve_entry_location()?;
        let pc = self.pc.ok_or(ModuleError::NoPc)?;
        if let Some(object) = self.objects.get_mut(pc) {
            object.area = Some(area);
            object.position = position;
            object.orientation_degrees = orientation;
        }

        self.state = ModuleState::Running;
        self.next_heartbeat_ms = self
            .heartbeat_script()
            .map(|_| self.sim_time_ms.saturating_add(self.config.heartbeat_interval_ms));
        self.moved_pc();

        info!(
            module = self.module_name().unwrap_or_default(),
            area = self.current_area().map(|area| area.resref.as_str()).unwrap_or_default(),
            object_count = self.objects.len(),
            "module_entered"
        );
        Ok(())
    }

    fn load_texture_pack(&mut self) -> Result<(), ModuleError> {
        let wanted = self.config.texture_pack;
        if self.texture_pack.as_ref().map(|(pack, _)| *pack) == Some(wanted) {
            debug!(pack = wanted.archive_name(), "texture_pack_kept");
            return Ok(());
        }
        self.unload_texture_pack();

        let sources = self.content.texture_pack(wanted.archive_name())?;
        let scope = ResourceScope::acquire(
            &self.resources,
            format!("textures:{}", wanted.archive_name()),
            &sources,
        )?;
        info!(pack = wanted.archive_name(), "texture_pack_loaded");
        self.texture_pack = Some((wanted, scope));
        Ok(())
    }

    fn unload_texture_pack(&mut self) {
        if let Some((pack, scope)) = self.texture_pack.take() {
            scope.release();
            debug!(pack = pack.archive_name(), "texture_pack_released");
        }
    }

    fn load_areas(&mut self) -> Result<(), ModuleError> {
        let Some(info) = self.module.as_ref().map(|module| module.info.clone()) else {
            return Err(self.invalid_transition("load_areas"));
        };
        for resref in &info.areas {
            let def = self.content.area(&info.name, resref)?;
            let area_id = self
                .objects
                .insert(GameObject::new(def.resref.clone(), ObjectKind::Area));
            for placed in &def.objects {
                let mut object = GameObject::new(placed.tag.clone(), placed.kind)
                    .with_position(placed.position)
                    .with_orientation(placed.orientation_degrees);
                object.model = placed.model.clone();
                object.area = Some(area_id);
                self.objects.insert(object);
            }
            debug!(area = %def.resref, object_count = def.objects.len(), "area_loaded");
            self.areas.insert(area_id, Area::from_def(area_id, &def));
        }
        Ok(())
    }

    fn resolve_entry_location(&self) -> Result<(ObjectId, Vec3, f32), ModuleError> {
        let module = self
            .module
            .as_ref()
            .ok_or_else(|| self.invalid_transition("enter"))?;

        if let Some(entry) = &module.entry {
            let found = self
                .objects
                .find_by_tag(&entry.tag, entry.kind, 0)
                .and_then(|id| self.objects.get(id))
                .and_then(|object| {
                    object
                        .area
                        .filter(|area| self.areas.contains_key(area))
                        .map(|area| (area, object.position, object.orientation_degrees))
                });
            if let Some(location) = found {
                return Ok(location);
            }
            warn!(tag = %entry.tag, "entry_object_not_found");
        }

        let info = &module.info;
        let area = self
            .area_by_resref(&info.entry_area)
            .ok_or_else(|| ModuleError::ContentNotFound {
                kind: ContentKind::Area,
                name: info.entry_area.clone(),
            })?;
        Ok((area.id, info.entry_position, info.entry_angle_degrees))
    }

    fn unload_inner(&mut self, complete: bool) {
        self.actions.clear();
        self.events.clear();
        self.pending_load = None;
        self.exit_requested = false;
        self.next_heartbeat_ms = None;
        self.movement = MovementInput::default();
        self.leave_areas();

        if complete {
            self.unload_texture_pack();
            if let Some(pc) = self.pc.take() {
                self.objects.remove(pc);
            }
            self.camera = CameraState::default();
        }

        self.surfaces = None;
        if let Some(module) = self.module.take() {
            if let Some(runner) = self.runner.as_mut() {
                runner.module_unloaded();
            }
            self.objects.remove(module.object);
            module.scope.release();
            info!(module = %module.info.name, complete, "module_unloaded");
        }
        self.state = ModuleState::Unloaded;
    }

    /// Withdraws everything from the presented area, then destroys every
    /// area and every object except the PC.
    fn leave_areas(&mut self) {
        if let Some(presented) = self.presented_area_id() {
            let _frame = FrameGuard::lock(self.render.as_ref());
            for id in self.objects.ids_in_area(presented) {
                if let Some(object) = self.objects.get_mut(id) {
                    withdraw_object(self.render.as_ref(), object);
                }
            }
            if let Some(area) = self.areas.get(&presented) {
                self.render.hide_area(area.id, &area.resref);
            }
        }

        let pc = self.pc;
        let module_object = self.module_object_id();
        if let Some(object) = pc.and_then(|id| self.objects.get_mut(id)) {
            object.area = None;
            object.visible = false;
            object.model_loaded = false;
        }
        self.objects
            .retain(|object| Some(object.id) == pc || Some(object.id) == module_object);
        self.areas.clear();
    }

    fn presented_area_id(&self) -> Option<ObjectId> {
        self.areas
            .values()
            .find(|area| area.is_presented())
            .map(|area| area.id)
    }

    /// Swaps the presented area, all under one frame lock.
    fn present_area(&mut self, previous: Option<ObjectId>, next: ObjectId) {
        let render = Arc::clone(&self.render);
        let _frame = FrameGuard::lock(render.as_ref());

        if let Some(previous) = previous {
            for id in self.objects.ids_in_area(previous) {
                if let Some(object) = self.objects.get_mut(id) {
                    withdraw_object(render.as_ref(), object);
                }
            }
            if let Some(area) = self.areas.get_mut(&previous) {
                render.hide_area(area.id, &area.resref);
                area.presented = false;
            }
        }

        if let Some(area) = self.areas.get_mut(&next) {
            render.show_area(area.id, &area.resref);
            area.presented = true;
            debug!(area = %area.resref, "area_presented");
        }
        for id in self.objects.ids_in_area(next) {
            if let Some(object) = self.objects.get_mut(id) {
                present_object(render.as_ref(), object);
            }
        }
    }

    fn replace_running(&mut self, pending: PendingLoad) -> Result<TickOutcome, ModuleError> {
        let PendingLoad { module, entry } = pending;
        let prepared = match self.prepare(&module) {
            Ok(prepared) => prepared,
            Err(err) => {
                error!(module = %module, error = %err, "module_change_failed");
                return Err(err);
            }
        };
        info!(
            from = self.module_name().unwrap_or_default(),
            to = %module,
            "module_change"
        );
        self.unload_inner(false);
        self.install(prepared, entry);
        self.enter()?;
        Ok(TickOutcome::ModuleChanged { module })
    }

    fn process_event_queue(&mut self) {
        for event in self.events.drain() {
            match event.kind {
                EventKind::Key { key, pressed } => {
                    if self.movement.apply_key(key, pressed) || !pressed {
                        continue;
                    }
                    match key {
                        Key::FreeCamera => {
                            self.camera.free = !self.camera.free;
                            debug!(free = self.camera.free, "camera_mode_changed");
                        }
                        Key::Walkmesh => {
                            self.show_walkmesh = !self.show_walkmesh;
                            debug!(visible = self.show_walkmesh, "walkmesh_toggled");
                        }
                        _ => {}
                    }
                }
                EventKind::ScriptTrigger {
                    script,
                    owner,
                    triggerer,
                } => {
                    let owner = self.resolve_reference(owner, "owner");
                    let triggerer = self.resolve_reference(triggerer, "triggerer");
                    self.run_script_logged(&script, None, owner, triggerer);
                }
                EventKind::Quit => self.exit(),
            }
        }
    }

    fn heartbeat_script(&self) -> Option<String> {
        if self.config.heartbeat_interval_ms == 0 {
            return None;
        }
        self.module_info()?.scripts.on_heartbeat.clone()
    }

    fn schedule_heartbeat(&mut self) {
        let Some(due) = self.next_heartbeat_ms.filter(|due| *due <= self.sim_time_ms) else {
            return;
        };
        let Some(script) = self.heartbeat_script() else {
            self.next_heartbeat_ms = None;
            return;
        };
        let interval = self.config.heartbeat_interval_ms;
        self.actions.insert(Action::script(
            script,
            ScriptState::default(),
            self.module_object_id(),
            None,
            due,
        ));
        let mut next = due.saturating_add(interval);
        if next <= self.sim_time_ms {
            debug!(skipped_until = self.sim_time_ms, "heartbeat_backlog_skipped");
            next = self.sim_time_ms.saturating_add(interval);
        }
        self.next_heartbeat_ms = Some(next);
    }

    fn process_actions(&mut self) {
        for action in self.actions.pop_ready(self.sim_time_ms) {
            let owner = self.resolve_reference(action.owner, "owner");
            let triggerer = self.resolve_reference(action.triggerer, "triggerer");
            self.run_script_logged(&action.script, Some(action.state), owner, triggerer);
        }
    }

    fn resolve_reference(&self, id: Option<ObjectId>, role: &'static str) -> Option<ObjectId> {
        let id = id?;
        if self.objects.contains(id) {
            Some(id)
        } else {
            debug!(object = id.0, role, "script_reference_gone");
            None
        }
    }

    fn handle_movement(&mut self, dt_seconds: f32) {
        if self.movement.is_idle() {
            return;
        }
        let Some(pc_id) = self.pc else {
            return;
        };
        let Some((area_id, position, facing)) = self
            .objects
            .get(pc_id)
            .and_then(|pc| pc.area.map(|area| (area, pc.position, pc.orientation_degrees)))
        else {
            return;
        };

        let params = MovementParams {
            walk_speed: self.config.walk_speed,
            run_speed: self.config.run_speed,
            turn_rate_degrees: self.config.turn_rate_degrees,
        };
        let step = plan_step(self.movement, facing, position, dt_seconds, params);
        if let Some(pc) = self.objects.get_mut(pc_id) {
            pc.orientation_degrees = normalize_degrees(step.facing_degrees);
        }

        let Some(target) = step.target else {
            self.moved_pc();
            return;
        };
        let (Some(area), Some(surfaces)) = (self.areas.get(&area_id), self.surfaces.as_ref()) else {
            return;
        };
        let Some(z) = area.walkable_elevation(target.x, target.y, surfaces) else {
            debug!(x = target.x, y = target.y, "movement_blocked");
            self.moved_pc();
            return;
        };
        let previous_exit = area.exit_at(position.x, position.y).cloned();
        let exit = area.exit_at(target.x, target.y).cloned();

        if let Err(err) = self.move_pc(target.x, target.y, z) {
            warn!(error = %err, "pc_move_failed");
            return;
        }
        if let Some(exit) = exit.filter(|exit| previous_exit.as_ref() != Some(exit)) {
            self.follow_exit(exit.target);
        }
    }

    fn follow_exit(&mut self, target: ExitTarget) {
        let result = match &target {
            ExitTarget::Area { resref, tag } => self.follow_area_exit(resref, tag),
            ExitTarget::Module { module, tag } => {
                self.load(module, tag.as_ref().map(EntryLocation::tag))
            }
        };
        if let Err(err) = result {
            warn!(exit = ?target, error = %err, "exit_failed");
        }
    }

    fn follow_area_exit(&mut self, resref: &str, tag: &str) -> Result<(), ModuleError> {
        let pc = self.pc.ok_or(ModuleError::NoPc)?;
        let area = self
            .area_by_resref(resref)
            .map(|area| area.id)
            .ok_or_else(|| ModuleError::ContentNotFound {
                kind: ContentKind::Area,
                name: resref.to_string(),
            })?;
        let (position, orientation) = self
            .objects
            .iter()
            .find(|object| object.area == Some(area) && object.tag == tag && object.id != pc)
            .map(|object| (object.position, object.orientation_degrees))
            .ok_or_else(|| ModuleError::ContentNotFound {
                kind: ContentKind::Object,
                name: tag.to_string(),
            })?;
        if let Some(object) = self.objects.get_mut(pc) {
            object.orientation_degrees = orientation;
        }
        self.jump_to(pc, Some(area), position)?;
        Ok(())
    }

    fn ensure_state(&self, operation: &'static str, required: ModuleState) -> Result<(), ModuleError> {
        if self.state == required {
            Ok(())
        } else {
            Err(self.invalid_transition(operation))
        }
    }

    fn ensure_not_dispatching(&self, operation: &'static str) -> Result<(), ModuleError> {
        if self.dispatch_depth > 0 {
            error!(operation, "module_call_from_script");
            return Err(ModuleError::Reentrant { operation });
        }
        Ok(())
    }

    fn invalid_transition(&self, operation: &'static str) -> ModuleError {
        error!(operation, state = ?self.state, "invalid_module_transition");
        ModuleError::InvalidTransition {
            operation,
            state: self.state,
        }
    }
}

fn withdraw_object(render: &dyn RenderBackend, object: &mut GameObject) {
    if object.visible {
        render.hide(object.id);
        object.visible = false;
    }
    if object.model_loaded {
        render.unload_model(object.id);
        object.model_loaded = false;
    }
}

fn present_object(render: &dyn RenderBackend, object: &mut GameObject) {
    if !object.kind.has_model() {
        return;
    }
    let Some(model) = object.model.as_deref() else {
        return;
    };
    if !object.model_loaded {
        render.load_model(object.id, model);
        object.model_loaded = true;
    }
    if !object.visible {
        render.show(object.id);
        object.visible = true;
    }
}
