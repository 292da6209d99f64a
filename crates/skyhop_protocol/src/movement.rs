//! Platformer character movement.
//!
//! A [`MovementController`] turns one tick of [`MovementInput`] into a
//! collision-resolved move. Horizontal and vertical motion are tracked as
//! separate scalars: the horizontal direction survives standing still so the
//! idle facing stays stable, and the vertical speed runs a small gravity state
//! machine (glide, extra-hold jump power, grounded downforce, free fall).

use bevy_math::{Quat, Vec3};

use crate::collision::{CharacterMover, CollisionFlags};
use crate::config::MovementConfig;
use crate::spring::{look_rotation, rotate_towards};

/// Timestamp meaning "never happened".
const NEVER: f32 = -1.0;
/// Reset value of the buffered jump press, far enough in the past that it can
/// never fall inside a jump or wall-jump window.
const NO_JUMP_PRESS: f32 = -10.0;
/// Horizontal motion below this does not turn an airborne character.
const FACING_EPSILON: f32 = 0.001;
/// Fraction of gravity pushing a grounded character into the floor so the
/// next sweep still reports ground contact.
const GROUNDED_DOWNFORCE: f32 = 0.2;

/// One tick of player intent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementInput {
    /// Strafe axis in `[-1, 1]`, positive to the camera's right.
    pub horizontal: f32,
    /// Forward axis in `[-1, 1]`, positive away from the camera.
    pub vertical: f32,
    pub jump_held: bool,
    /// Jump went down this tick.
    pub jump_pressed: bool,
    pub run: bool,
}

/// Notifications raised during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementEvent {
    Jumped,
    WallJumped,
    ApexReached,
    Landed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovementState {
    pub position: Vec3,
    pub facing: Quat,
    /// Last non-zero horizontal intent, always unit length or zero.
    pub move_direction: Vec3,
    pub horizontal_speed: f32,
    pub vertical_speed: f32,
    /// Flags returned by the last move. Grounded is derived from these only.
    pub collision_flags: CollisionFlags,
    pub wall_contact_normal: Vec3,
    pub jumping: bool,
    pub reached_apex: bool,
    pub last_jump_time: f32,
    pub last_jump_button_time: f32,
    pub jump_start_height: f32,
    /// First wall contact during the current jump.
    pub wall_touch_time: f32,
    /// Lateral drift accumulated while airborne.
    pub in_air_velocity: Vec3,
    pub walk_time_start: f32,
    pub last_grounded_time: f32,
    pub jump_held: bool,
    pub moving: bool,
    pub moving_back: bool,
}

impl MovementState {
    pub fn new(position: Vec3, facing: Quat) -> Self {
        Self {
            position,
            facing,
            move_direction: Vec3::ZERO,
            horizontal_speed: 0.0,
            vertical_speed: 0.0,
            collision_flags: CollisionFlags::NONE,
            wall_contact_normal: Vec3::ZERO,
            jumping: false,
            reached_apex: false,
            last_jump_time: NEVER,
            last_jump_button_time: NO_JUMP_PRESS,
            jump_start_height: position.y,
            wall_touch_time: NEVER,
            in_air_velocity: Vec3::ZERO,
            walk_time_start: 0.0,
            last_grounded_time: 0.0,
            jump_held: false,
            moving: false,
            moving_back: false,
        }
    }

    pub fn is_grounded(&self) -> bool {
        self.collision_flags.below
    }
}

impl Default for MovementState {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }
}

#[derive(Debug, Clone)]
pub struct MovementController {
    config: MovementConfig,
    state: MovementState,
}

impl MovementController {
    pub fn new(config: MovementConfig, position: Vec3, facing: Quat) -> Self {
        Self {
            config,
            state: MovementState::new(position, facing),
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    pub fn facing(&self) -> Quat {
        self.state.facing
    }

    pub fn is_grounded(&self) -> bool {
        self.state.is_grounded()
    }

    pub fn is_jumping(&self) -> bool {
        self.state.jumping
    }

    pub fn has_reached_apex(&self) -> bool {
        self.state.reached_apex
    }

    pub fn speed(&self) -> f32 {
        self.state.horizontal_speed
    }

    pub fn direction(&self) -> Vec3 {
        self.state.move_direction
    }

    pub fn is_moving(&self) -> bool {
        self.state.moving
    }

    pub fn is_moving_backwards(&self) -> bool {
        self.state.moving_back
    }

    /// Falling with the jump button held, using the reduced glide gravity.
    pub fn is_glide_flying(&self) -> bool {
        self.config.can_glide
            && self.state.vertical_speed <= 0.0
            && self.state.jump_held
            && !self.is_grounded()
    }

    /// Grounded at some point during the last `grounded_timeout` seconds.
    pub fn is_grounded_with_timeout(&self, now: f32) -> bool {
        self.state.last_grounded_time + self.config.grounded_timeout > now
    }

    /// Puts the character back at `position` with all movement state cleared.
    pub fn respawn(&mut self, position: Vec3, facing: Quat) {
        self.state = MovementState::new(position, facing);
    }

    /// Launches a jump regardless of ground contact (jump pads, scripted
    /// bounces). `lateral_velocity` replaces the airborne drift when given.
    pub fn force_jump(&mut self, height: f32, lateral_velocity: Option<Vec3>, now: f32) {
        self.state.vertical_speed = self.config.jump_speed(height);
        if let Some(velocity) = lateral_velocity {
            self.state.in_air_velocity = velocity;
        }
        self.state.collision_flags = CollisionFlags::NONE;
        self.did_jump(now);
    }

    /// Advances the character by one tick.
    ///
    /// `camera_forward` orients the input axes; only its horizontal part is
    /// used. `now` is a monotonic clock in seconds used for the jump buffer,
    /// wall-jump window and trot timer.
    pub fn tick(
        &mut self,
        input: &MovementInput,
        camera_forward: Vec3,
        dt: f32,
        now: f32,
        mover: &dyn CharacterMover,
    ) -> Vec<MovementEvent> {
        let mut events = Vec::new();

        if input.jump_pressed {
            self.state.last_jump_button_time = now;
        }
        self.state.jump_held = input.jump_held;

        self.update_smoothed_direction(input, camera_forward, dt, now);
        self.apply_gravity(dt, &mut events);
        if self.config.can_wall_jump {
            self.apply_wall_jump(now, &mut events);
        }
        self.apply_jumping(now, &mut events);

        let movement = (self.state.move_direction * self.state.horizontal_speed
            + Vec3::new(0.0, self.state.vertical_speed, 0.0)
            + self.state.in_air_velocity)
            * dt;

        let result = mover.move_character(self.state.position, movement);
        self.state.position = result.position;
        self.state.collision_flags = result.flags;
        self.state.wall_contact_normal = result.contact_normal;

        if self.is_grounded() && self.state.move_direction != Vec3::ZERO {
            self.state.facing = look_rotation(self.state.move_direction);
        } else {
            let xz_move = Vec3::new(movement.x, 0.0, movement.z);
            if xz_move.length() > FACING_EPSILON {
                self.state.facing = look_rotation(xz_move);
            }
        }

        if self.is_grounded() {
            self.state.last_grounded_time = now;
            self.state.in_air_velocity = Vec3::ZERO;
            if self.state.jumping {
                self.state.jumping = false;
                self.state.reached_apex = false;
                events.push(MovementEvent::Landed);
            }
        }

        events
    }

    fn update_smoothed_direction(
        &mut self,
        input: &MovementInput,
        camera_forward: Vec3,
        dt: f32,
        now: f32,
    ) {
        let forward = Vec3::new(camera_forward.x, 0.0, camera_forward.z).normalize_or_zero();
        let right = forward.cross(Vec3::Y);

        self.state.moving_back = input.vertical < -0.2;
        self.state.moving = input.horizontal.abs() > 0.1 || input.vertical.abs() > 0.1;

        let target_direction = input.horizontal * right + input.vertical * forward;

        if !self.is_grounded() {
            if self.state.moving {
                self.state.in_air_velocity += target_direction.normalize_or_zero()
                    * self.config.in_air_control_acceleration
                    * dt;
            }
            return;
        }

        if target_direction != Vec3::ZERO {
            // Nearly stopped: turn instantly. At speed: turn at a capped rate.
            if self.state.horizontal_speed < self.config.walk_speed * 0.9 {
                self.state.move_direction = target_direction.normalize_or_zero();
            } else {
                self.state.move_direction = rotate_towards(
                    self.state.move_direction,
                    target_direction,
                    self.config.rotate_speed.to_radians() * dt,
                )
                .normalize_or_zero();
            }
        }

        // Analog input scales speed but diagonals never beat a single axis.
        let intent = target_direction.length().min(1.0);
        let tier = if input.run {
            self.config.run_speed
        } else if now - self.config.trot_after_seconds > self.state.walk_time_start {
            self.config.trot_speed
        } else {
            self.config.walk_speed
        };
        let target_speed = intent * tier;

        let smoothing = (self.config.speed_smoothing * dt).clamp(0.0, 1.0);
        self.state.horizontal_speed += (target_speed - self.state.horizontal_speed) * smoothing;

        if self.state.horizontal_speed < self.config.walk_speed * 0.3 {
            self.state.walk_time_start = now;
        }
    }

    fn apply_gravity(&mut self, dt: f32, events: &mut Vec<MovementEvent>) {
        let extra_power_jump = self.state.jumping
            && self.state.vertical_speed > 0.0
            && self.state.jump_held
            && self.state.position.y < self.state.jump_start_height + self.config.extra_jump_height;

        if self.is_glide_flying() {
            self.state.vertical_speed -= self.config.glide_gravity * dt;
        } else if extra_power_jump {
            // Holding jump during the ascent suspends gravity up to the cap.
        } else if self.is_grounded() {
            self.state.vertical_speed = -self.config.gravity * GROUNDED_DOWNFORCE;
        } else {
            self.state.vertical_speed -= self.config.gravity * dt;
        }

        if self.state.jumping && !self.state.reached_apex && self.state.vertical_speed <= 0.0 {
            self.state.reached_apex = true;
            events.push(MovementEvent::ApexReached);
        }
    }

    fn apply_wall_jump(&mut self, now: f32, events: &mut Vec<MovementEvent>) {
        if !self.state.jumping {
            return;
        }

        if self.state.collision_flags.sides_only() && self.state.wall_touch_time < 0.0 {
            self.state.wall_touch_time = now;
        }
        if self.state.wall_touch_time < 0.0 {
            return;
        }

        // The press may land shortly before or shortly after the first contact.
        let window = self.config.wall_jump_timeout;
        let press = self.state.last_jump_button_time;
        let touch = self.state.wall_touch_time;
        if press <= touch - window || press >= touch + window {
            return;
        }

        if self.state.last_jump_time + self.config.jump_repeat_time > now {
            return;
        }

        let mut normal = self.state.wall_contact_normal;
        normal.y = 0.0;
        if normal.length_squared() > 1e-8 {
            self.state.move_direction = normal.normalize();
            self.state.horizontal_speed = (self.state.horizontal_speed * 1.5)
                .clamp(self.config.trot_speed, self.config.run_speed);
        } else {
            self.state.horizontal_speed = 0.0;
        }

        self.state.vertical_speed = self.config.jump_speed(self.config.jump_height);
        self.did_jump(now);
        events.push(MovementEvent::WallJumped);
    }

    fn apply_jumping(&mut self, now: f32, events: &mut Vec<MovementEvent>) {
        if self.state.last_jump_time + self.config.jump_repeat_time > now {
            return;
        }

        // Presses are buffered so jumping slightly before landing still works.
        if self.is_grounded()
            && self.config.can_jump
            && now < self.state.last_jump_button_time + self.config.jump_timeout
        {
            self.state.vertical_speed = self.config.jump_speed(self.config.jump_height);
            self.did_jump(now);
            events.push(MovementEvent::Jumped);
        }
    }

    fn did_jump(&mut self, now: f32) {
        self.state.jumping = true;
        self.state.reached_apex = false;
        self.state.last_jump_time = now;
        self.state.jump_start_height = self.state.position.y;
        self.state.wall_touch_time = NEVER;
        self.state.last_jump_button_time = NO_JUMP_PRESS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{BoxWorld, MoveResult, SolidBox};

    const DT: f32 = 1.0 / 60.0;

    struct Sim {
        controller: MovementController,
        world: BoxWorld,
        now: f32,
    }

    impl Sim {
        fn new(config: MovementConfig, world: BoxWorld) -> Self {
            Self {
                controller: MovementController::new(config, Vec3::ZERO, Quat::IDENTITY),
                world,
                now: 0.0,
            }
        }

        fn flat() -> Self {
            Self::new(MovementConfig::default(), BoxWorld::flat(0.0))
        }

        fn step(&mut self, input: MovementInput) -> Vec<MovementEvent> {
            self.step_facing(input, Vec3::NEG_Z)
        }

        fn step_facing(&mut self, input: MovementInput, camera_forward: Vec3) -> Vec<MovementEvent> {
            self.now += DT;
            self.controller
                .tick(&input, camera_forward, DT, self.now, &self.world)
        }

        fn settle(&mut self) {
            for _ in 0..10 {
                self.step(MovementInput::default());
            }
            assert!(self.controller.is_grounded());
        }
    }

    fn forward() -> MovementInput {
        MovementInput {
            vertical: 1.0,
            ..Default::default()
        }
    }

    fn tap_jump() -> MovementInput {
        MovementInput {
            jump_held: true,
            jump_pressed: true,
            ..Default::default()
        }
    }

    #[test]
    fn grounded_comes_from_the_move_result() {
        let mut sim = Sim::flat();
        assert!(!sim.controller.is_grounded());
        sim.step(MovementInput::default());
        assert!(sim.controller.is_grounded());
        assert_eq!(sim.controller.position().y, 0.0);
        // Once grounded, gravity is replaced by a constant downforce.
        sim.step(MovementInput::default());
        assert_eq!(
            sim.controller.state().vertical_speed,
            -sim.controller.config().gravity * GROUNDED_DOWNFORCE
        );
    }

    #[test]
    fn speed_converges_monotonically_to_run_speed() {
        let mut sim = Sim::flat();
        sim.settle();

        let input = MovementInput {
            vertical: 1.0,
            run: true,
            ..Default::default()
        };
        let run_speed = sim.controller.config().run_speed;
        let mut last = sim.controller.speed();
        for _ in 0..300 {
            sim.step(input);
            let speed = sim.controller.speed();
            assert!(speed >= last - 1e-6, "speed dropped from {last} to {speed}");
            assert!(speed <= run_speed + 1e-4);
            last = speed;
        }
        assert!((last - run_speed).abs() < 1e-3);
        assert!((sim.controller.direction() - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn walking_turns_into_trot_after_threshold() {
        let mut sim = Sim::flat();
        sim.settle();

        let config = sim.controller.config().clone();
        for _ in 0..60 {
            sim.step(forward());
            assert!(sim.controller.speed() <= config.walk_speed + 1e-4);
        }
        for _ in 0..360 {
            let speed_before = sim.controller.speed();
            sim.step(forward());
            assert!(sim.controller.speed() >= speed_before - 1e-6);
        }
        assert!((sim.controller.speed() - config.trot_speed).abs() < 1e-3);
    }

    #[test]
    fn direction_persists_when_input_stops() {
        let mut sim = Sim::flat();
        sim.settle();
        let right = MovementInput {
            horizontal: 1.0,
            ..Default::default()
        };
        for _ in 0..30 {
            sim.step(right);
        }
        for _ in 0..120 {
            sim.step(MovementInput::default());
        }
        assert!((sim.controller.direction() - Vec3::X).length() < 1e-6);
        assert!(sim.controller.speed() < 0.01);
        // Facing stays on the last move direction while idle.
        assert!((sim.controller.facing() * Vec3::NEG_Z - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn turning_at_speed_is_rate_limited() {
        let mut sim = Sim::flat();
        sim.settle();
        let run_forward = MovementInput {
            vertical: 1.0,
            run: true,
            ..Default::default()
        };
        for _ in 0..120 {
            sim.step(run_forward);
        }
        let back = MovementInput {
            vertical: -1.0,
            run: true,
            ..Default::default()
        };
        sim.step(back);
        let turned = sim.controller.direction().angle_between(Vec3::NEG_Z);
        let max_turn = sim.controller.config().rotate_speed.to_radians() * DT;
        assert!(turned <= max_turn + 1e-4);
        assert!(turned > 0.0);
        assert!(sim.controller.is_moving());
        assert!(sim.controller.is_moving_backwards());

        sim.step(MovementInput::default());
        assert!(!sim.controller.is_moving());
        assert!(!sim.controller.is_moving_backwards());
    }

    #[test]
    fn jump_apex_fires_once_and_landing_clears_state() {
        let mut sim = Sim::flat();
        sim.settle();

        let events = sim.step(tap_jump());
        assert_eq!(events, vec![MovementEvent::Jumped]);
        assert!(sim.controller.is_jumping());
        let expected = sim.controller.config().jump_speed(sim.controller.config().jump_height);
        assert_eq!(sim.controller.state().vertical_speed, expected);

        let mut apex_count = 0;
        let mut landed = false;
        for _ in 0..240 {
            let speed_before = sim.controller.state().vertical_speed;
            let events = sim.step(MovementInput::default());
            if events.contains(&MovementEvent::ApexReached) {
                apex_count += 1;
                assert!(speed_before > 0.0);
                assert!(sim.controller.state().vertical_speed <= 0.0);
            }
            if events.contains(&MovementEvent::Landed) {
                landed = true;
                assert!(!sim.controller.is_jumping());
                assert_eq!(sim.controller.state().in_air_velocity, Vec3::ZERO);
                break;
            }
        }
        assert_eq!(apex_count, 1);
        assert!(landed);
    }

    #[test]
    fn buffered_press_jumps_on_landing() {
        let mut sim = Sim::flat();
        sim.controller.respawn(Vec3::new(0.0, 0.1, 0.0), Quat::IDENTITY);
        // Airborne: the press is remembered and fires once ground is reached.
        let events = sim.step(MovementInput {
            jump_pressed: true,
            ..Default::default()
        });
        assert!(events.is_empty());
        let pressed_at = sim.now;

        let mut was_grounded = false;
        let mut jumped_at = None;
        for _ in 0..20 {
            let events = sim.step(MovementInput::default());
            if events.contains(&MovementEvent::Jumped) {
                assert!(was_grounded);
                jumped_at = Some(sim.now);
                break;
            }
            was_grounded = sim.controller.is_grounded();
        }
        let jumped_at = jumped_at.expect("buffered press should jump");
        assert!(jumped_at - pressed_at < sim.controller.config().jump_timeout);
    }

    #[test]
    fn stale_press_does_not_jump() {
        let mut sim = Sim::flat();
        sim.controller.respawn(Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY);
        sim.step(tap_jump());
        for _ in 0..120 {
            let events = sim.step(MovementInput::default());
            assert!(!events.contains(&MovementEvent::Jumped));
        }
        assert!(sim.controller.is_grounded());
    }

    #[test]
    fn holding_jump_reaches_higher() {
        fn peak(hold: bool) -> f32 {
            let mut sim = Sim::flat();
            sim.settle();
            sim.step(tap_jump());
            let mut peak: f32 = 0.0;
            for _ in 0..400 {
                sim.step(MovementInput {
                    jump_held: hold,
                    ..Default::default()
                });
                peak = peak.max(sim.controller.position().y);
                if sim.controller.is_grounded() {
                    break;
                }
            }
            peak
        }

        let tapped = peak(false);
        let held = peak(true);
        let config = MovementConfig::default();
        assert!(tapped < config.jump_height + 0.1);
        assert!(held > config.extra_jump_height);
    }

    #[test]
    fn gliding_slows_the_fall() {
        let mut sim = Sim::flat();
        sim.controller.respawn(Vec3::new(0.0, 20.0, 0.0), Quat::IDENTITY);
        let hold = MovementInput {
            jump_held: true,
            ..Default::default()
        };
        for _ in 0..60 {
            sim.step(hold);
            assert!(sim.controller.is_glide_flying());
        }
        let glide = MovementConfig::default().glide_gravity;
        assert!(sim.controller.state().vertical_speed > -glide * 1.01);

        let mut no_glide = Sim::new(
            MovementConfig {
                can_glide: false,
                ..Default::default()
            },
            BoxWorld::flat(0.0),
        );
        no_glide.controller.respawn(Vec3::new(0.0, 20.0, 0.0), Quat::IDENTITY);
        for _ in 0..60 {
            no_glide.step(hold);
        }
        assert!(!no_glide.controller.is_glide_flying());
        assert!(no_glide.controller.position().y < sim.controller.position().y);
    }

    #[test]
    fn airborne_drift_accumulates_then_resets_on_landing() {
        let mut sim = Sim::flat();
        sim.controller.respawn(Vec3::new(0.0, 10.0, 0.0), Quat::IDENTITY);
        for _ in 0..30 {
            sim.step(forward());
        }
        let drift = sim.controller.state().in_air_velocity;
        let accel = MovementConfig::default().in_air_control_acceleration;
        assert!((drift.length() - accel * DT * 30.0).abs() < 1e-4);
        assert!(drift.z < 0.0);

        for _ in 0..200 {
            sim.step(MovementInput::default());
            if sim.controller.is_grounded() {
                break;
            }
        }
        assert!(sim.controller.is_grounded());
        assert_eq!(sim.controller.state().in_air_velocity, Vec3::ZERO);
    }

    #[test]
    fn force_jump_launches_with_lateral_velocity() {
        let mut sim = Sim::flat();
        sim.settle();
        sim.controller
            .force_jump(3.0, Some(Vec3::new(2.0, 0.0, 0.0)), sim.now);
        assert!(sim.controller.is_jumping());
        assert!(!sim.controller.is_grounded());
        assert_eq!(sim.controller.state().in_air_velocity, Vec3::new(2.0, 0.0, 0.0));
        let expected = sim.controller.config().jump_speed(3.0);
        assert_eq!(sim.controller.state().vertical_speed, expected);

        sim.step(MovementInput::default());
        assert!(sim.controller.position().x > 0.0);
        assert!(sim.controller.position().y > 0.0);
        // Airborne facing follows the drift.
        assert!((sim.controller.facing() * Vec3::NEG_Z - Vec3::X).length() < 1e-4);
    }

    fn wall_jump_sim() -> Sim {
        let config = MovementConfig {
            can_wall_jump: true,
            ..Default::default()
        };
        let world = BoxWorld::flat(0.0).with_box(SolidBox::new(
            Vec3::new(1.0, 0.0, -10.0),
            Vec3::new(2.0, 20.0, 10.0),
        ));
        let mut sim = Sim::new(config, world);
        sim.settle();
        sim
    }

    /// Drops the character from a height while drifting into the wall, so the
    /// contact happens on the way down.
    fn fall_into_wall(sim: &mut Sim) {
        sim.controller.respawn(Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY);
        sim.controller
            .force_jump(0.0, Some(Vec3::new(5.0, 0.0, 0.0)), sim.now);
        for _ in 0..30 {
            sim.step(MovementInput::default());
            if sim.controller.state().collision_flags.sides_only() {
                return;
            }
        }
        panic!("never reached the wall");
    }

    #[test]
    fn wall_jump_pushes_off_the_wall() {
        let mut sim = wall_jump_sim();
        fall_into_wall(&mut sim);
        assert_eq!(sim.controller.state().wall_contact_normal, Vec3::NEG_X);

        let events = sim.step(tap_jump());
        assert_eq!(events, vec![MovementEvent::WallJumped]);
        let config = sim.controller.config().clone();
        assert_eq!(sim.controller.direction(), Vec3::NEG_X);
        assert_eq!(sim.controller.speed(), config.trot_speed);
        assert_eq!(
            sim.controller.state().vertical_speed,
            config.jump_speed(config.jump_height)
        );
        assert!(sim.controller.is_jumping());

        // The repeat guard blocks an immediate second wall jump.
        let events = sim.step(tap_jump());
        assert!(!events.contains(&MovementEvent::WallJumped));
    }

    #[test]
    fn wall_jump_needs_a_press_near_contact() {
        let mut sim = wall_jump_sim();
        fall_into_wall(&mut sim);
        // Wait past the window, then press.
        for _ in 0..20 {
            sim.step(MovementInput::default());
        }
        let events = sim.step(tap_jump());
        assert!(!events.contains(&MovementEvent::WallJumped));
    }

    #[test]
    fn wall_jump_press_may_precede_contact() {
        let mut sim = wall_jump_sim();
        sim.controller.respawn(Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY);
        sim.controller
            .force_jump(0.0, Some(Vec3::new(5.0, 0.0, 0.0)), sim.now);

        let mut pressed = false;
        let mut wall_jumped = false;
        for _ in 0..30 {
            let input = if !pressed && sim.controller.position().x > 0.5 {
                // Still short of the wall when the button goes down.
                assert!(!sim.controller.state().collision_flags.sides_only());
                pressed = true;
                tap_jump()
            } else {
                MovementInput::default()
            };
            if sim.step(input).contains(&MovementEvent::WallJumped) {
                wall_jumped = true;
                break;
            }
        }
        assert!(pressed);
        assert!(wall_jumped);
        assert_eq!(sim.controller.direction(), Vec3::NEG_X);
    }

    struct SideContactNoNormal;

    impl CharacterMover for SideContactNoNormal {
        fn move_character(&self, from: Vec3, displacement: Vec3) -> MoveResult {
            MoveResult {
                position: from + Vec3::new(0.0, displacement.y, 0.0),
                flags: CollisionFlags {
                    sides: true,
                    ..CollisionFlags::NONE
                },
                contact_normal: Vec3::ZERO,
            }
        }
    }

    #[test]
    fn wall_jump_without_normal_is_vertical_only() {
        let config = MovementConfig {
            can_wall_jump: true,
            ..Default::default()
        };
        let mut controller = MovementController::new(config, Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY);
        controller.force_jump(1.0, None, 0.0);
        controller.tick(&MovementInput::default(), Vec3::NEG_Z, DT, 0.1, &SideContactNoNormal);
        let events = controller.tick(&tap_jump(), Vec3::NEG_Z, DT, 0.12, &SideContactNoNormal);
        assert_eq!(events, vec![MovementEvent::WallJumped]);
        assert_eq!(controller.speed(), 0.0);
        assert!(controller.state().vertical_speed > 0.0);
    }

    #[test]
    fn grounded_timeout_lingers_after_leaving_ground() {
        let mut sim = Sim::flat();
        sim.settle();
        sim.step(tap_jump());
        assert!(!sim.controller.is_grounded());
        assert!(sim.controller.is_grounded_with_timeout(sim.now));
        assert!(!sim.controller.is_grounded_with_timeout(sim.now + 1.0));
    }
}
