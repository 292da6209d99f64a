//! Spring follow camera.
//!
//! The camera keeps a fixed horizontal distance from the tracked target along
//! its current bearing, with separate springs for the horizontal plane and
//! height. A snap request swings it behind the target instead. Rotation keeps
//! the target centered horizontally but only tilts vertically once the target
//! climbs past a screen-space bound, so jump height stays readable.

use bevy_math::{Dir3, Quat, Ray3d, Vec2, Vec3};
use tracing::debug;

use crate::collision::{DEFAULT_HEIGHT, SceneQuery};
use crate::config::CameraConfig;
use crate::spring::{delta_angle, look_rotation, smooth_damp, smooth_damp_angle, yaw_of};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Maps viewport points to world rays for a camera pose.
///
/// Viewport coordinates run from `(0, 0)` bottom-left to `(1, 1)` top-right.
pub trait ViewportProjector {
    fn viewport_ray(&self, pose: &CameraPose, viewport: Vec2) -> Ray3d;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveProjector {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
}

impl Default for PerspectiveProjector {
    fn default() -> Self {
        Self {
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
        }
    }
}

impl ViewportProjector for PerspectiveProjector {
    fn viewport_ray(&self, pose: &CameraPose, viewport: Vec2) -> Ray3d {
        let ndc = viewport * 2.0 - Vec2::ONE;
        let half_height = (self.fov_y * 0.5).tan();
        let local = Vec3::new(ndc.x * half_height * self.aspect, ndc.y * half_height, -1.0);
        Ray3d {
            origin: pose.position,
            direction: Dir3::new(pose.rotation * local).unwrap_or(Dir3::NEG_Z),
        }
    }
}

/// Offset from the target's origin to the point the camera tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetBounds {
    pub center_offset: Vec3,
}

impl TargetBounds {
    /// Derives the offsets from a bounding box in the target's local space.
    pub fn from_local_aabb(min: Vec3, max: Vec3) -> Self {
        Self {
            center_offset: (min + max) * 0.5,
        }
    }
}

impl Default for TargetBounds {
    fn default() -> Self {
        Self::from_local_aabb(Vec3::ZERO, Vec3::new(0.0, DEFAULT_HEIGHT, 0.0))
    }
}

/// What the camera reads from the tracked target each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    pub position: Vec3,
    pub facing: Quat,
    pub is_jumping: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    /// Spring velocities. In snap mode x is the yaw channel and z the distance
    /// channel.
    pub velocity: Vec3,
    pub snapping: bool,
    pub target_height: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            snapping: false,
            target_height: f32::INFINITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FollowCamera {
    config: CameraConfig,
    state: CameraState,
    tracking: Option<TargetBounds>,
}

impl FollowCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            state: CameraState::default(),
            tracking: None,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn is_snapping(&self) -> bool {
        self.state.snapping
    }

    /// Starts tracking a target with the given bounds, or stops tracking.
    pub fn set_target(&mut self, bounds: Option<TargetBounds>) {
        self.tracking = bounds;
    }

    pub fn reset(&mut self) {
        self.state = CameraState::default();
    }

    /// Moves and rotates `pose` toward the target. Does nothing while no target
    /// is tracked.
    pub fn update(
        &mut self,
        pose: &mut CameraPose,
        target: Option<&TargetView>,
        snap_pressed: bool,
        dt: f32,
        scene: &dyn SceneQuery,
        projector: &dyn ViewportProjector,
    ) {
        let (Some(bounds), Some(target)) = (self.tracking, target) else {
            return;
        };

        let center = target.position + bounds.center_offset;
        self.update_target_height(center.y + self.config.height, target.is_jumping);

        if snap_pressed && !self.state.snapping {
            debug!("Camera snapping behind target");
            self.state.velocity = Vec3::ZERO;
            self.state.snapping = true;
        }

        if self.state.snapping {
            self.apply_snapping(pose, center, target.facing, dt, scene);
        } else {
            let goal = Vec3::new(center.x, self.state.target_height, center.z);
            self.apply_position_damping(pose, goal, target.facing, dt, scene);
        }

        pose.rotation = self.look_rotation(pose, center, projector);
    }

    /// While jumping, only accept a lower height or a jump past the margin so
    /// the camera does not bob along with every hop.
    fn update_target_height(&mut self, height: f32, is_jumping: bool) {
        if !is_jumping
            || height < self.state.target_height
            || height - self.state.target_height > self.config.jump_height_margin
        {
            self.state.target_height = height;
        }
    }

    fn apply_snapping(
        &mut self,
        pose: &mut CameraPose,
        center: Vec3,
        target_facing: Quat,
        dt: f32,
        scene: &dyn SceneQuery,
    ) {
        let mut offset = pose.position - center;
        offset.y = 0.0;

        let target_angle = yaw_of(target_facing);
        let angle = smooth_damp_angle(
            yaw_of(pose.rotation),
            target_angle,
            &mut self.state.velocity.x,
            self.config.snap_lag,
            f32::INFINITY,
            dt,
        );
        let distance = smooth_damp(
            offset.length(),
            self.config.distance,
            &mut self.state.velocity.z,
            self.config.snap_lag,
            f32::INFINITY,
            dt,
        );

        let mut position = center + Quat::from_rotation_y(angle) * Vec3::Z * distance;
        position.y = smooth_damp(
            pose.position.y,
            center.y + self.config.height,
            &mut self.state.velocity.y,
            self.config.smooth_lag,
            self.config.max_speed,
            dt,
        );

        pose.position = self.adjust_line_of_sight(position, center, scene);

        if delta_angle(angle, target_angle).abs() < self.config.snap_exit_angle.to_radians() {
            debug!("Camera snap finished at yaw {:.1}", angle.to_degrees());
            self.state.snapping = false;
            self.state.velocity = Vec3::ZERO;
        }
    }

    fn apply_position_damping(
        &mut self,
        pose: &mut CameraPose,
        goal: Vec3,
        target_facing: Quat,
        dt: f32,
        scene: &dyn SceneQuery,
    ) {
        let mut offset = pose.position - goal;
        offset.y = 0.0;
        // Standing exactly above the target: fall back to behind it.
        let bearing = match offset.try_normalize() {
            Some(bearing) => bearing,
            None => Quat::from_rotation_y(yaw_of(target_facing)) * Vec3::Z,
        };
        let desired = goal + bearing * self.config.distance;

        let lag = self.config.smooth_lag;
        let max_speed = self.config.max_speed;
        let velocity = &mut self.state.velocity;
        let position = Vec3::new(
            smooth_damp(pose.position.x, desired.x, &mut velocity.x, lag, max_speed, dt),
            smooth_damp(pose.position.y, goal.y, &mut velocity.y, lag, max_speed, dt),
            smooth_damp(pose.position.z, desired.z, &mut velocity.z, lag, max_speed, dt),
        );
        // The springs are bounded per axis; the combined step is bounded too.
        let step = (position - pose.position).clamp_length_max(max_speed * dt);
        let position = pose.position + step;

        pose.position = self.adjust_line_of_sight(position, goal, scene);
    }

    fn adjust_line_of_sight(&mut self, position: Vec3, from: Vec3, scene: &dyn SceneQuery) -> Vec3 {
        match scene.linecast(from, position, self.config.line_of_sight_mask) {
            Some(hit) => {
                self.state.velocity = Vec3::ZERO;
                hit.point
            }
            None => position,
        }
    }

    fn look_rotation(
        &self,
        pose: &CameraPose,
        center: Vec3,
        projector: &dyn ViewportProjector,
    ) -> Quat {
        let to_center = center - pose.position;
        let yaw = look_rotation(Vec3::new(to_center.x, 0.0, to_center.z));
        let pitch = look_rotation(
            Vec3::NEG_Z * self.config.distance + Vec3::NEG_Y * self.config.height,
        );
        let rotation = yaw * pitch;

        let probe = CameraPose {
            position: pose.position,
            rotation,
        };
        let center_ray = projector.viewport_ray(&probe, Vec2::new(0.5, 0.5));
        let top_ray = projector.viewport_ray(
            &probe,
            Vec2::new(0.5, self.config.clamp_head_position_screen_space),
        );
        let center_point = center_ray.get_point(self.config.distance);
        let top_point = top_ray.get_point(self.config.distance);
        let center_to_top = center_ray.direction.angle_between(*top_ray.direction);

        let span = center_point.y - top_point.y;
        if span.abs() < 1e-6 {
            return rotation;
        }
        let height_to_angle = center_to_top / span;
        let extra = height_to_angle * (center_point.y - center.y);
        if extra < center_to_top {
            return rotation;
        }
        // The target is above the clamp line: tilt up until it sits on it.
        rotation * Quat::from_rotation_x(extra - center_to_top)
    }
}
