use super::events::Key;
use crate::world::Vec3;

/// Held movement keys of the PC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementInput {
    pub forward: bool,
    pub backward: bool,
    pub turn_left: bool,
    pub turn_right: bool,
    pub run: bool,
}

impl MovementInput {
    /// Returns false for keys that are not movement keys.
    pub fn apply_key(&mut self, key: Key, pressed: bool) -> bool {
        match key {
            Key::Forward => self.forward = pressed,
            Key::Backward => self.backward = pressed,
            Key::TurnLeft => self.turn_left = pressed,
            Key::TurnRight => self.turn_right = pressed,
            Key::Run => self.run = pressed,
            Key::FreeCamera | Key::Walkmesh => return false,
        }
        true
    }

    pub fn is_idle(&self) -> bool {
        self.forward == self.backward && self.turn_left == self.turn_right
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementParams {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub turn_rate_degrees: f32,
}

/// Result of one movement step. `target` is the desired ground position,
/// still unchecked against the walkmesh; `z` is carried over unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementStep {
    pub facing_degrees: f32,
    pub target: Option<Vec3>,
}

/// Unit vector the PC walks along when facing `degrees`.
pub fn forward_vector(degrees: f32) -> (f32, f32) {
    let radians = degrees.to_radians();
    (-radians.sin(), radians.cos())
}

pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped.is_finite() {
        wrapped
    } else {
        0.0
    }
}

pub fn plan_step(
    input: MovementInput,
    facing_degrees: f32,
    position: Vec3,
    dt_seconds: f32,
    params: MovementParams,
) -> MovementStep {
    let mut facing = facing_degrees;
    if input.turn_left != input.turn_right {
        let direction = if input.turn_left { 1.0 } else { -1.0 };
        facing = normalize_degrees(facing + direction * params.turn_rate_degrees * dt_seconds);
    }

    if input.forward == input.backward {
        return MovementStep {
            facing_degrees: facing,
            target: None,
        };
    }

    let speed = if input.run {
        params.run_speed
    } else {
        params.walk_speed
    };
    let sign = if input.forward { 1.0 } else { -1.0 };
    let (dx, dy) = forward_vector(facing);
    let distance = sign * speed * dt_seconds;
    MovementStep {
        facing_degrees: facing,
        target: Some(Vec3::new(
            position.x + dx * distance,
            position.y + dy * distance,
            position.z,
        )),
    }
}
