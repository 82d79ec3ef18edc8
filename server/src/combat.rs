//! Melee combat: attack validation, cone/range hit test, damage and respawn.

use crate::room::Room;
use log::{debug, info};
use rand::Rng;
use shared::{
    PlayerId, ServerMessage, Transform, Vec3, ATTACK_COOLDOWN_MS, ATTACK_HALF_ANGLE_DEG,
    ATTACK_RANGE, EYE_HEIGHT, MAX_HEALTH, SPAWN_Z_MIN, SPAWN_Z_SPREAD,
};

const ATTACK_DAMAGE: i32 = 1;

// Slack on the cone boundary so a target sitting exactly on the 60 degree
// edge still counts after float rounding.
const CONE_EPSILON: f32 = 1e-5;

/// Whether a target at `target` is inside the attacker's reach
///
/// Works on the ground plane only. The target must be within
/// `ATTACK_RANGE` and inside the forward cone of half-angle
/// `ATTACK_HALF_ANGLE_DEG` (boundary inclusive). A target standing exactly on
/// the attacker's position is within reach regardless of facing.
pub fn in_attack_cone(attacker: &Transform, target: &Vec3) -> bool {
    let dx = target.x - attacker.position.x;
    let dz = target.z - attacker.position.z;
    let distance = (dx * dx + dz * dz).sqrt();

    if distance > ATTACK_RANGE {
        return false;
    }
    if distance <= f32::EPSILON {
        return true;
    }

    let yaw = attacker.yaw();
    let (fx, fz) = (yaw.sin(), yaw.cos());
    let cos_angle = (dx * fx + dz * fz) / distance;

    cos_angle >= ATTACK_HALF_ANGLE_DEG.to_radians().cos() - CONE_EPSILON
}

impl Room {
    /// Resolves an attack from `attacker_id` at wall-clock time `now_ms`
    ///
    /// Returns `None` when the attack is rejected (not ready, dead, or still
    /// cooling down), otherwise the ids of every participant that took damage.
    pub fn handle_attack(&mut self, attacker_id: &PlayerId, now_ms: u64) -> Option<Vec<PlayerId>> {
        let attacker_transform = {
            let attacker = self.participants.get_mut(attacker_id)?;
            if !attacker.is_active() {
                return None;
            }

            if let Some(last) = attacker.combat.last_attack_ms {
                if now_ms.saturating_sub(last) < ATTACK_COOLDOWN_MS {
                    debug!("Attack from {} rejected: cooling down", attacker_id);
                    return None;
                }
            }

            attacker.combat.last_attack_ms = Some(now_ms);
            attacker.transform
        };

        self.broadcast(
            ServerMessage::Attack {
                attacker: attacker_id.clone(),
            },
            None,
        );

        let hits: Vec<PlayerId> = self
            .participants
            .values()
            .filter(|p| p.id != *attacker_id && p.is_active())
            .filter(|p| in_attack_cone(&attacker_transform, &p.transform.position))
            .map(|p| p.id.clone())
            .collect();

        for target in &hits {
            self.apply_damage(target, ATTACK_DAMAGE);
        }

        Some(hits)
    }

    /// Subtracts `amount` health from `target_id`, flooring at zero
    ///
    /// The target dies exactly when health reaches zero. Damage against a
    /// participant that is already dead is ignored.
    pub fn apply_damage(&mut self, target_id: &PlayerId, amount: i32) {
        let (health, alive) = match self.participants.get_mut(target_id) {
            Some(target) if target.combat.alive => {
                target.combat.health = (target.combat.health - amount).max(0);
                if target.combat.health == 0 {
                    target.combat.alive = false;
                    info!("{} was defeated", target_id);
                }
                (target.combat.health, target.combat.alive)
            }
            _ => return,
        };

        self.broadcast(
            ServerMessage::HealthUpdate {
                id: target_id.clone(),
                health,
                alive,
            },
            None,
        );
    }

    /// Brings a dead participant back at a random point in the spawn band
    ///
    /// No-op while alive. Returns true when the respawn happened.
    pub fn handle_respawn<R: Rng>(&mut self, id: &PlayerId, rng: &mut R) -> bool {
        let (position, public) = match self.participants.get_mut(id) {
            Some(participant) if participant.ready && !participant.combat.alive => {
                let position = Vec3::new(
                    0.0,
                    EYE_HEIGHT,
                    rng.gen_range(SPAWN_Z_MIN..SPAWN_Z_MIN + SPAWN_Z_SPREAD),
                );
                participant.combat.health = MAX_HEALTH;
                participant.combat.alive = true;
                participant.transform = Transform::new(position, Vec3::ZERO);
                (position, participant.public())
            }
            _ => return false,
        };

        info!("{} respawned at ({:.2}, {:.2}, {:.2})", id, position.x, position.y, position.z);

        self.send_to(
            id,
            ServerMessage::Respawned {
                position,
                health: MAX_HEALTH,
            },
        );
        self.broadcast(ServerMessage::PlayerRespawned { player: public }, Some(id));
        true
    }
}
