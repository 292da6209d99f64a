use bevy_math::Vec3;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HALF_WIDTH: f32 = 0.3;
pub const DEFAULT_HEIGHT: f32 = 1.8;

/// Which sides of the character touched geometry during the last move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionFlags {
    pub below: bool,
    pub sides: bool,
    pub above: bool,
}

impl CollisionFlags {
    pub const NONE: Self = Self {
        below: false,
        sides: false,
        above: false,
    };

    /// True when the only contact was sideways (touching a wall mid-air).
    pub fn sides_only(&self) -> bool {
        self.sides && !self.below && !self.above
    }
}

/// Outcome of a collision-resolved move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveResult {
    pub position: Vec3,
    pub flags: CollisionFlags,
    /// Average normal of the geometry touched sideways, zero when none.
    pub contact_normal: Vec3,
}

/// Bit set of scene layers a query is allowed to hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: Self = Self(u32::MAX);
    pub const NONE: Self = Self(0);

    pub fn contains(&self, layer: u32) -> bool {
        layer < 32 && self.0 & (1 << layer) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinecastHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Sweep-and-resolve movement for a character volume.
pub trait CharacterMover: Send + Sync + 'static {
    fn move_character(&self, from: Vec3, displacement: Vec3) -> MoveResult;
}

/// Line-of-sight queries against scene geometry.
pub trait SceneQuery: Send + Sync + 'static {
    fn linecast(&self, from: Vec3, to: Vec3, mask: LayerMask) -> Option<LinecastHit>;
}

/// Scene without any obstruction.
pub struct OpenSky;

impl SceneQuery for OpenSky {
    fn linecast(&self, _from: Vec3, _to: Vec3, _mask: LayerMask) -> Option<LinecastHit> {
        None
    }
}

/// Axis-aligned solid volume in a [`BoxWorld`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidBox {
    pub min: Vec3,
    pub max: Vec3,
    pub layer: u32,
}

impl SolidBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max, layer: 0 }
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }
}

/// Reference world: an optional infinite ground plane plus solid boxes.
///
/// The character is an axis-aligned box standing on its position: `half_width`
/// around it on X and Z, `height` above it on Y.
#[derive(Debug, Clone)]
pub struct BoxWorld {
    pub ground_height: Option<f32>,
    pub ground_layer: u32,
    pub boxes: Vec<SolidBox>,
    pub half_width: f32,
    pub height: f32,
}

impl Default for BoxWorld {
    fn default() -> Self {
        Self {
            ground_height: None,
            ground_layer: 0,
            boxes: Vec::new(),
            half_width: DEFAULT_HALF_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl BoxWorld {
    pub fn flat(ground_height: f32) -> Self {
        Self {
            ground_height: Some(ground_height),
            ..Default::default()
        }
    }

    pub fn with_box(mut self, solid: SolidBox) -> Self {
        self.boxes.push(solid);
        self
    }

    fn character_bounds(&self, pos: Vec3) -> (Vec3, Vec3) {
        (
            Vec3::new(pos.x - self.half_width, pos.y, pos.z - self.half_width),
            Vec3::new(pos.x + self.half_width, pos.y + self.height, pos.z + self.half_width),
        )
    }

    /// First box overlapping the character at `pos`. Touching faces do not count.
    fn overlapping(&self, pos: Vec3) -> Option<&SolidBox> {
        let (min, max) = self.character_bounds(pos);
        self.boxes.iter().find(|b| {
            min.x < b.max.x
                && max.x > b.min.x
                && min.y < b.max.y
                && max.y > b.min.y
                && min.z < b.max.z
                && max.z > b.min.z
        })
    }
}

impl CharacterMover for BoxWorld {
    fn move_character(&self, from: Vec3, displacement: Vec3) -> MoveResult {
        let mut pos = from;
        let mut flags = CollisionFlags::NONE;
        let mut side_normals = Vec3::ZERO;

        // X axis
        pos.x += displacement.x;
        if let Some(b) = self.overlapping(pos) {
            if displacement.x > 0.0 {
                pos.x = b.min.x - self.half_width;
                side_normals += Vec3::NEG_X;
            } else {
                pos.x = b.max.x + self.half_width;
                side_normals += Vec3::X;
            }
            flags.sides = true;
        }

        // Y axis
        pos.y += displacement.y;
        if let Some(b) = self.overlapping(pos) {
            if displacement.y > 0.0 {
                pos.y = b.min.y - self.height;
                flags.above = true;
            } else {
                pos.y = b.max.y;
                flags.below = true;
            }
        }
        if let Some(ground) = self.ground_height {
            if pos.y < ground {
                pos.y = ground;
                flags.below = true;
            }
        }

        // Z axis
        pos.z += displacement.z;
        if let Some(b) = self.overlapping(pos) {
            if displacement.z > 0.0 {
                pos.z = b.min.z - self.half_width;
                side_normals += Vec3::NEG_Z;
            } else {
                pos.z = b.max.z + self.half_width;
                side_normals += Vec3::Z;
            }
            flags.sides = true;
        }

        // Contacts made while moving upwards do not count as wall contacts.
        let contact_normal = if displacement.normalize_or_zero().y > 0.01 {
            Vec3::ZERO
        } else {
            side_normals.normalize_or_zero()
        };

        MoveResult {
            position: pos,
            flags,
            contact_normal,
        }
    }
}

impl SceneQuery for BoxWorld {
    fn linecast(&self, from: Vec3, to: Vec3, mask: LayerMask) -> Option<LinecastHit> {
        let delta = to - from;
        let length = delta.length();
        let mut nearest: Option<(f32, Vec3)> = None;

        if let Some(ground) = self.ground_height {
            if mask.contains(self.ground_layer) && from.y >= ground && to.y < ground {
                let t = (from.y - ground) / (from.y - to.y);
                nearest = Some((t, Vec3::Y));
            }
        }

        for solid in self.boxes.iter().filter(|b| mask.contains(b.layer)) {
            let Some((t, normal)) = segment_vs_box(from, delta, solid.min, solid.max) else {
                continue;
            };
            if nearest.is_none_or(|(best, _)| t < best) {
                nearest = Some((t, normal));
            }
        }

        nearest.map(|(t, normal)| LinecastHit {
            point: from + delta * t,
            normal,
            distance: length * t,
        })
    }
}

/// Slab test of the segment `from..from + delta` against a box.
/// Returns the entry parameter in `[0, 1]` and the entered face normal.
/// Segments starting inside the box do not hit it.
fn segment_vs_box(from: Vec3, delta: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_enter = 0.0_f32;
    let mut t_exit = 1.0_f32;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let origin = from[axis];
        let d = delta[axis];
        if d.abs() < 1e-8 {
            if origin < min[axis] || origin > max[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t0 = (min[axis] - origin) * inv;
        let mut t1 = (max[axis] - origin) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        if t0 > t_enter {
            t_enter = t0;
            normal = Vec3::ZERO;
            normal[axis] = -d.signum();
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    if normal == Vec3::ZERO {
        return None;
    }
    Some((t_enter, normal))
}
