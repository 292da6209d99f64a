use serde::{Deserialize, Serialize};

use crate::collision::LayerMask;

/// Capacity of a remote avatar's pose buffer.
pub const POSE_BUFFER_CAPACITY: usize = 20;

/// Tuning for the local character controller.
///
/// Speeds are in meters/second, times in seconds, angles in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    pub walk_speed: f32,
    /// Used once the character has been walking for `trot_after_seconds`.
    pub trot_speed: f32,
    /// Used while the run modifier is held.
    pub run_speed: f32,
    pub trot_after_seconds: f32,
    pub in_air_control_acceleration: f32,
    /// Height reached when the jump button is tapped.
    pub jump_height: f32,
    /// Extra height gained by holding the jump button during the ascent.
    pub extra_jump_height: f32,
    pub gravity: f32,
    pub glide_gravity: f32,
    pub speed_smoothing: f32,
    /// Max turn rate of the move direction at speed (degrees/second).
    pub rotate_speed: f32,
    pub can_jump: bool,
    pub can_glide: bool,
    pub can_wall_jump: bool,
    /// Minimum time between two jumps.
    pub jump_repeat_time: f32,
    /// Half-width of the window around the first wall contact in which a
    /// jump press triggers a wall jump.
    pub wall_jump_timeout: f32,
    /// How long a jump press stays buffered before landing.
    pub jump_timeout: f32,
    pub grounded_timeout: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 3.0,
            trot_speed: 4.0,
            run_speed: 6.0,
            trot_after_seconds: 3.0,
            in_air_control_acceleration: 3.0,
            jump_height: 0.5,
            extra_jump_height: 2.5,
            gravity: 20.0,
            glide_gravity: 2.0,
            speed_smoothing: 10.0,
            rotate_speed: 500.0,
            can_jump: true,
            can_glide: true,
            can_wall_jump: false,
            jump_repeat_time: 0.05,
            wall_jump_timeout: 0.15,
            jump_timeout: 0.15,
            grounded_timeout: 0.25,
        }
    }
}

impl MovementConfig {
    /// Upward speed needed to reach `height` under this config's gravity.
    pub fn jump_speed(&self, height: f32) -> f32 {
        (2.0 * height * self.gravity).sqrt()
    }
}

/// Tuning for the spring follow camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Horizontal distance kept from the target center.
    pub distance: f32,
    /// Height above the target center.
    pub height: f32,
    pub smooth_lag: f32,
    pub max_speed: f32,
    pub snap_lag: f32,
    /// Viewport height (0 = bottom, 1 = top) the target's center may reach
    /// before the camera tilts to follow it.
    pub clamp_head_position_screen_space: f32,
    pub line_of_sight_mask: LayerMask,
    /// Snap mode ends once the yaw error is below this (degrees).
    pub snap_exit_angle: f32,
    /// While jumping, a higher target height is only accepted when it rises
    /// by more than this.
    pub jump_height_margin: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 4.0,
            height: 1.0,
            smooth_lag: 0.2,
            max_speed: 10.0,
            snap_lag: 0.3,
            clamp_head_position_screen_space: 0.75,
            line_of_sight_mask: LayerMask::ALL,
            snap_exit_angle: 3.0,
            jump_height_margin: 5.0,
        }
    }
}

/// Tuning for remote transform interpolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationConfig {
    /// How far behind the network clock remote avatars are rendered (seconds).
    pub interpolation_delay: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            interpolation_delay: 0.1,
        }
    }
}
