use bevy_math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::animation::AnimationState;

/// Identifies a networked character across peers.
pub type EntityId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// Owner's pose at `timestamp` on the sender's network clock.
    Pose {
        entity_id: EntityId,
        timestamp: f64,
        position: Vec3,
        rotation: Quat,
    },
    /// Owner's current animation.
    Animation {
        entity_id: EntityId,
        state: AnimationState,
    },
    /// Owner left; peers drop its avatar.
    Despawn { entity_id: EntityId },
}

impl PeerMessage {
    pub fn entity_id(&self) -> EntityId {
        match self {
            PeerMessage::Pose { entity_id, .. }
            | PeerMessage::Animation { entity_id, .. }
            | PeerMessage::Despawn { entity_id } => *entity_id,
        }
    }
}
