use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

pub mod protocol;

pub use protocol::{ClientMessage, ProtocolError, PublicPlayer, ServerMessage, SignalKind};

pub const MAX_HEALTH: i32 = 6;
pub const ATTACK_COOLDOWN_MS: u64 = 600;
pub const ATTACK_RANGE: f32 = 2.2;
pub const ATTACK_HALF_ANGLE_DEG: f32 = 60.0;
/// Height senders report their transform at; also the spawn height.
pub const EYE_HEIGHT: f32 = 1.6;
pub const SPAWN_Z_MIN: f32 = 4.0;
pub const SPAWN_Z_SPREAD: f32 = 2.0;
pub const MAX_NAME_LEN: usize = 24;
pub const DEFAULT_NAME: &str = "Guest";

/// Opaque participant identity issued by the server.
///
/// Ordering is plain lexicographic string ordering, which peers rely on to
/// decide who initiates a voice call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// World-space vector, carried on the wire as `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "[f32; 3]", into = "[f32; 3]")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        (*other - *self).length()
    }

    /// Distance on the ground plane, ignoring the vertical component.
    pub fn horizontal_distance(&self, other: &Vec3) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn lerp(&self, target: &Vec3, alpha: f32) -> Vec3 {
        *self + (*target - *self) * alpha
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Rejected when a decoded vector has an infinite or NaN component
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("vector components must be finite")]
pub struct NonFiniteVector;

impl TryFrom<[f32; 3]> for Vec3 {
    type Error = NonFiniteVector;

    // Out-of-range JSON numbers such as 1e39 show up here as infinity.
    fn try_from(v: [f32; 3]) -> Result<Self, Self::Error> {
        if v.iter().all(|c| c.is_finite()) {
            Ok(Vec3::new(v[0], v[1], v[2]))
        } else {
            Err(NonFiniteVector)
        }
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Position and orientation of an avatar. Only `rotation.y` (yaw) carries meaning.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }

    pub fn yaw(&self) -> f32 {
        self.rotation.y
    }
}

/// Cleans a user supplied display name.
///
/// Control characters are stripped, surrounding whitespace trimmed and the
/// result cut to `MAX_NAME_LEN` characters. Empty names become `DEFAULT_NAME`.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let trimmed: String = cleaned.trim().chars().take(MAX_NAME_LEN).collect();
    let trimmed = trimmed.trim_end();

    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_sanitize_name_trims_whitespace() {
        assert_eq!(sanitize_name("  Alice  "), "Alice");
    }

    #[test]
    fn test_sanitize_name_defaults_when_empty() {
        assert_eq!(sanitize_name(""), DEFAULT_NAME);
        assert_eq!(sanitize_name("   \t "), DEFAULT_NAME);
        assert_eq!(sanitize_name("\u{7}\u{1b}"), DEFAULT_NAME);
    }

    #[test]
    fn test_sanitize_name_truncates_by_characters() {
        let long = "é".repeat(40);
        let name = sanitize_name(&long);
        assert_eq!(name.chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn test_sanitize_name_strips_control_characters() {
        assert_eq!(sanitize_name("Bo\nb"), "Bob");
    }

    #[test]
    fn test_vec3_serializes_as_array() {
        let v = Vec3::new(1.0, 1.6, -2.5);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[1.0,1.6,-2.5]");

        let back: Vec3 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_vec3_rejects_non_finite_components() {
        assert!(serde_json::from_str::<Vec3>("[1e39, 1.6, 5.0]").is_err());
        assert!(serde_json::from_str::<Vec3>("[0.0, -1e40, 0.0]").is_err());
        assert_eq!(Vec3::try_from([0.0, f32::NAN, 0.0]), Err(NonFiniteVector));
        assert_eq!(
            Vec3::try_from([1.0, 2.0, 3.0]),
            Ok(Vec3::new(1.0, 2.0, 3.0))
        );
    }

    #[test]
    fn test_horizontal_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 100.0, 4.0);
        assert_approx_eq!(a.horizontal_distance(&b), 5.0, 1e-5);
    }

    #[test]
    fn test_vec3_lerp() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(10.0, -2.0, 4.0);
        let mid = a.lerp(&b, 0.5);
        assert_approx_eq!(mid.x, 5.0, 1e-6);
        assert_approx_eq!(mid.y, -1.0, 1e-6);
        assert_approx_eq!(mid.z, 2.0, 1e-6);
    }

    #[test]
    fn test_player_id_ordering_is_lexicographic() {
        let a = PlayerId::new("a1");
        let b = PlayerId::new("b0");
        assert!(a < b);
        assert!(PlayerId::new("10") < PlayerId::new("9"));
    }

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let id = PlayerId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
