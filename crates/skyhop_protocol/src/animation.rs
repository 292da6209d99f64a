//! Animation state chosen from the movement controller and mirrored to peers
//! as a one-byte code.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::movement::{MovementController, MovementEvent};

/// Animation clips a character can play. The discriminants are the wire codes
/// and must stay in this order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum AnimationState {
    Walk = 0,
    Run,
    Kick,
    Punch,
    Jump,
    JumpFall,
    #[default]
    Idle,
    GotBit,
    GotHit,
    WallJump,
    DeathFall,
    JetpackJump,
    LedgeFall,
    ButtStomp,
    JumpLand,
}

const ALL_STATES: [AnimationState; 15] = [
    AnimationState::Walk,
    AnimationState::Run,
    AnimationState::Kick,
    AnimationState::Punch,
    AnimationState::Jump,
    AnimationState::JumpFall,
    AnimationState::Idle,
    AnimationState::GotBit,
    AnimationState::GotHit,
    AnimationState::WallJump,
    AnimationState::DeathFall,
    AnimationState::JetpackJump,
    AnimationState::LedgeFall,
    AnimationState::ButtStomp,
    AnimationState::JumpLand,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownAnimationCode(pub u8);

impl fmt::Display for UnknownAnimationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown animation code {}", self.0)
    }
}

impl std::error::Error for UnknownAnimationCode {}

impl AnimationState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, UnknownAnimationCode> {
        ALL_STATES
            .get(code as usize)
            .copied()
            .ok_or(UnknownAnimationCode(code))
    }

    pub fn clip_name(self) -> &'static str {
        match self {
            AnimationState::Walk => "walk",
            AnimationState::Run => "run",
            AnimationState::Kick => "kick",
            AnimationState::Punch => "punch",
            AnimationState::Jump => "jump",
            AnimationState::JumpFall => "jumpfall",
            AnimationState::Idle => "idle",
            AnimationState::GotBit => "gotbit",
            AnimationState::GotHit => "gothit",
            AnimationState::WallJump => "walljump",
            AnimationState::DeathFall => "deathfall",
            AnimationState::JetpackJump => "jetpackjump",
            AnimationState::LedgeFall => "ledgefall",
            AnimationState::ButtStomp => "buttstomp",
            AnimationState::JumpLand => "jumpland",
        }
    }
}

impl From<AnimationState> for u8 {
    fn from(state: AnimationState) -> Self {
        state.code()
    }
}

impl TryFrom<u8> for AnimationState {
    type Error = UnknownAnimationCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

/// Speed below which the character counts as standing still.
const IDLE_SPEED: f32 = 0.1;

/// Continuous animation for the controller's current state.
pub fn select_animation(controller: &MovementController, now: f32) -> AnimationState {
    if controller.is_jumping() {
        return if controller.is_glide_flying() {
            AnimationState::JetpackJump
        } else if controller.has_reached_apex() {
            AnimationState::JumpFall
        } else {
            AnimationState::Jump
        };
    }

    if !controller.is_grounded_with_timeout(now) {
        return AnimationState::LedgeFall;
    }

    let speed = controller.speed();
    if speed > controller.config().walk_speed {
        AnimationState::Run
    } else if speed > IDLE_SPEED {
        AnimationState::Walk
    } else {
        AnimationState::Idle
    }
}

/// Animation played once in response to a movement event.
pub fn one_shot_for(event: MovementEvent) -> Option<AnimationState> {
    match event {
        MovementEvent::Landed => Some(AnimationState::JumpLand),
        MovementEvent::WallJumped => Some(AnimationState::WallJump),
        MovementEvent::Jumped | MovementEvent::ApexReached => None,
    }
}

/// Current animation plus the last one acted upon, for change detection on
/// both the owning and the mirroring side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimationSync {
    current: AnimationState,
    last: AnimationState,
}

impl AnimationSync {
    pub fn current(&self) -> AnimationState {
        self.current
    }

    /// Picks this tick's animation. A one-shot from this tick's events wins
    /// over the continuous selection.
    pub fn update(
        &mut self,
        controller: &MovementController,
        events: &[MovementEvent],
        now: f32,
    ) -> AnimationState {
        self.current = events
            .iter()
            .rev()
            .find_map(|event| one_shot_for(*event))
            .unwrap_or_else(|| select_animation(controller, now));
        self.current
    }

    /// Overrides the current animation, e.g. with a state received from a peer.
    pub fn set_current(&mut self, state: AnimationState) {
        self.current = state;
    }

    /// Returns the current animation once each time it changes.
    pub fn take_change(&mut self) -> Option<AnimationState> {
        if self.current == self.last {
            return None;
        }
        self.last = self.current;
        Some(self.current)
    }
}
