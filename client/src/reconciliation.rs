//! Client-side reconciliation of remote participants
//!
//! The server only sends sparse, discrete snapshots: a transform whenever a
//! peer moves, a health value when it changes, an attack event. This module
//! turns those into continuous presentation state:
//! - exponential position smoothing toward the latest authoritative target
//! - shortest-arc yaw interpolation across the ±π seam
//! - a walk-cycle phase driven by perceived speed
//! - timed attack and hit pulses
//! - hide-on-death and teleport-on-respawn
//!
//! Network handlers only ever write interpolation targets and event timers;
//! `tick` is the only place presentation state advances, so the render rate
//! and the network rate stay independent.

use log::debug;
use shared::{PlayerId, PublicPlayer, Transform, Vec3, EYE_HEIGHT};
use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

/// Exponential convergence rate toward the interpolation target, per second
pub const SMOOTHING_RATE: f32 = 10.0;
/// Perceived speed (units/s) above which the walk cycle advances
pub const WALK_SPEED_THRESHOLD: f32 = 0.15;
/// Walk-cycle phase advanced per unit of distance travelled
pub const WALK_CYCLE_RATE: f32 = 3.0;
/// How quickly the walk phase settles back to rest, per second
pub const WALK_PHASE_DECAY: f32 = 8.0;
pub const ATTACK_POSE_SECS: f32 = 0.4;
pub const HIT_FLASH_SECS: f32 = 0.45;

/// Converts a sender's eye-height position to the local avatar's foot origin
pub fn to_avatar_origin(position: Vec3) -> Vec3 {
    Vec3::new(position.x, position.y - EYE_HEIGHT, position.z)
}

/// Wraps an angle into (-π, π]
pub fn wrap_angle(angle: f32) -> f32 {
    let mut wrapped = angle % TAU;
    if wrapped > PI {
        wrapped -= TAU;
    } else if wrapped <= -PI {
        wrapped += TAU;
    }
    wrapped
}

/// Signed smallest rotation taking `from` to `to`
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

/// Presentation state for one remote participant
#[derive(Debug, Clone)]
pub struct RemoteEntityView {
    pub name: String,
    /// Most recent authoritative transform, in avatar-origin space
    pub last_target: Transform,
    /// What gets drawn this frame
    pub smoothed: Transform,
    pub walk_phase: f32,
    /// Perceived speed measured over the last tick
    pub speed: f32,
    pub attack_timer: f32,
    pub hit_timer: f32,
    pub health: i32,
    pub alive: bool,
}

impl RemoteEntityView {
    fn from_player(player: &PublicPlayer) -> Self {
        let transform = Transform::new(to_avatar_origin(player.position), player.rotation);
        Self {
            name: player.name.clone(),
            last_target: transform,
            smoothed: transform,
            walk_phase: 0.0,
            speed: 0.0,
            attack_timer: 0.0,
            hit_timer: 0.0,
            health: player.health,
            alive: player.alive,
        }
    }

    /// Places the view directly on `transform` with no glide
    fn snap_to(&mut self, transform: Transform) {
        self.last_target = transform;
        self.smoothed = transform;
        self.speed = 0.0;
        self.walk_phase = 0.0;
    }

    fn set_target(&mut self, position: Vec3, rotation: Vec3) {
        self.last_target = Transform::new(to_avatar_origin(position), rotation);
    }

    fn observe_health(&mut self, health: i32, alive: bool) {
        if health < self.health {
            self.hit_timer = HIT_FLASH_SECS;
        }
        self.health = health;
        self.alive = alive;
    }

    /// Advances presentation state by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        let blend = (1.0 - (-SMOOTHING_RATE * dt).exp()).min(1.0);
        let previous = self.smoothed.position;

        self.smoothed.position = previous.lerp(&self.last_target.position, blend);

        let yaw = self.smoothed.rotation.y;
        self.smoothed.rotation = Vec3::new(
            self.last_target.rotation.x,
            wrap_angle(yaw + shortest_arc(yaw, self.last_target.rotation.y) * blend),
            self.last_target.rotation.z,
        );

        self.speed = previous.distance(&self.smoothed.position) / dt;

        if self.alive && self.speed > WALK_SPEED_THRESHOLD {
            self.walk_phase = (self.walk_phase + self.speed * dt * WALK_CYCLE_RATE) % TAU;
        } else {
            self.walk_phase -= self.walk_phase * (WALK_PHASE_DECAY * dt).min(1.0);
        }

        self.attack_timer = (self.attack_timer - dt).max(0.0);
        self.hit_timer = (self.hit_timer - dt).max(0.0);
    }

    /// Dead participants are hidden, not removed
    pub fn is_visible(&self) -> bool {
        self.alive
    }

    /// Progress through the attack pose in [0, 1), or `None` when idle
    pub fn attack_progress(&self) -> Option<f32> {
        if self.attack_timer > 0.0 {
            Some(1.0 - self.attack_timer / ATTACK_POSE_SECS)
        } else {
            None
        }
    }

    /// Hit flash strength, 1.0 right after the hit and fading to 0.0
    pub fn hit_intensity(&self) -> f32 {
        self.hit_timer / HIT_FLASH_SECS
    }
}

/// One `RemoteEntityView` per remote participant
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    views: HashMap<PlayerId, RemoteEntityView>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self {
            views: HashMap::new(),
        }
    }

    /// Adds a participant from a snapshot, or resyncs an existing one.
    pub fn upsert(&mut self, player: &PublicPlayer) {
        match self.views.get_mut(&player.id) {
            Some(view) => {
                view.name = player.name.clone();
                view.set_target(player.position, player.rotation);
                view.observe_health(player.health, player.alive);
            }
            None => {
                self.views
                    .insert(player.id.clone(), RemoteEntityView::from_player(player));
            }
        }
    }

    pub fn remove(&mut self, id: &PlayerId) -> Option<RemoteEntityView> {
        self.views.remove(id)
    }

    pub fn clear(&mut self) {
        self.views.clear();
    }

    pub fn on_transform(&mut self, id: &PlayerId, position: Vec3, rotation: Vec3) {
        match self.views.get_mut(id) {
            Some(view) => view.set_target(position, rotation),
            None => debug!("Transform for unknown participant {}", id),
        }
    }

    pub fn on_attack(&mut self, attacker: &PlayerId) {
        if let Some(view) = self.views.get_mut(attacker) {
            view.attack_timer = ATTACK_POSE_SECS;
        }
    }

    pub fn on_health(&mut self, id: &PlayerId, health: i32, alive: bool) {
        if let Some(view) = self.views.get_mut(id) {
            view.observe_health(health, alive);
        }
    }

    /// Brings a respawned participant back with a teleport
    pub fn on_respawn(&mut self, player: &PublicPlayer) {
        match self.views.get_mut(&player.id) {
            Some(view) => {
                view.snap_to(Transform::new(
                    to_avatar_origin(player.position),
                    player.rotation,
                ));
                view.health = player.health;
                view.alive = player.alive;
                view.hit_timer = 0.0;
            }
            None => self.upsert(player),
        }
    }

    pub fn tick(&mut self, dt: f32) {
        for view in self.views.values_mut() {
            view.tick(dt);
        }
    }

    pub fn get(&self, id: &PlayerId) -> Option<&RemoteEntityView> {
        self.views.get(id)
    }

    pub fn smoothed_position(&self, id: &PlayerId) -> Option<Vec3> {
        self.views.get(id).map(|view| view.smoothed.position)
    }

    /// Current smoothed position of every remote participant
    pub fn positions(&self) -> impl Iterator<Item = (&PlayerId, Vec3)> + '_ {
        self.views
            .iter()
            .map(|(id, view)| (id, view.smoothed.position))
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
