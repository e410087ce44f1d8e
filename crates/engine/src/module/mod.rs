mod actions;
mod config;
mod controller;
mod events;
mod movement;
mod transition;

pub use actions::{Action, ActionKind, DeferredActionQueue};
pub use config::{
    ModuleConfig, TexturePack, DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_RUN_SPEED,
    DEFAULT_TURN_RATE_DEGREES, DEFAULT_WALK_SPEED,
};
pub use controller::{
    CameraState, EntryLocation, ModuleController, ModuleError, ModuleServices, ModuleState,
    ModuleStatus, TickOutcome, MAX_DICE_COUNT,
};
pub use events::{Event, EventKind, EventQueue, Key};
pub use movement::{forward_vector, plan_step, MovementInput, MovementParams, MovementStep};
pub use transition::{AreaTransitionCoordinator, RelocateOutcome, TransitionError};

