use bevy::prelude::*;
use skyhop_protocol::movement::{MovementController, MovementEvent, MovementInput};
use skyhop_protocol::protocol::EntityId;

use crate::animation::AnimationSyncState;
use crate::camera::{FollowCam, TrackingBounds};
use crate::events::{ApexReachedEvent, JumpedEvent, LandedEvent, WallJumpedEvent};
use crate::network::NetworkId;
use crate::{CharacterMoverRes, ControllerSettings};

/// Input gathered for the current frame.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlayerInput {
    pub movement: MovementInput,
    /// Snap the camera behind the player (edge).
    pub snap_pressed: bool,
}

#[derive(Component)]
pub struct LocalPlayer;

/// Locally simulated character.
#[derive(Component)]
pub struct CharacterMotor {
    pub controller: MovementController,
    /// Events raised by the last tick.
    pub last_events: Vec<MovementEvent>,
}

impl CharacterMotor {
    pub fn new(controller: MovementController) -> Self {
        Self {
            controller,
            last_events: Vec::new(),
        }
    }
}

/// Put a character back at a spawn point.
#[derive(Event)]
pub struct RespawnRequest {
    pub entity: Entity,
    pub position: Vec3,
    pub facing: Quat,
}

/// Launch a character as if it stepped on a jump pad.
#[derive(Event)]
pub struct ForceJumpRequest {
    pub entity: Entity,
    pub height: f32,
    pub lateral_velocity: Option<Vec3>,
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlayerSet {
    Input,
    Move,
}

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlayerInput>()
            .add_event::<RespawnRequest>()
            .add_event::<ForceJumpRequest>()
            .configure_sets(Update, (PlayerSet::Input, PlayerSet::Move).chain())
            .add_systems(
                Update,
                keyboard_input
                    .in_set(PlayerSet::Input)
                    .run_if(resource_exists::<ButtonInput<KeyCode>>),
            )
            .add_systems(
                Update,
                (apply_respawns, apply_force_jumps, move_player)
                    .chain()
                    .in_set(PlayerSet::Move)
                    .run_if(resource_exists::<CharacterMoverRes>),
            );
    }
}

/// Spawns the locally controlled character.
pub fn spawn_local_player(
    commands: &mut Commands,
    settings: &ControllerSettings,
    network_id: EntityId,
    position: Vec3,
) -> Entity {
    let controller = MovementController::new(settings.movement.clone(), position, Quat::IDENTITY);
    commands
        .spawn((
            LocalPlayer,
            NetworkId(network_id),
            CharacterMotor::new(controller),
            AnimationSyncState::default(),
            TrackingBounds::default(),
            Transform::from_translation(position),
        ))
        .id()
}

fn axis(keys: &ButtonInput<KeyCode>, positive: [KeyCode; 2], negative: [KeyCode; 2]) -> f32 {
    let mut value = 0.0;
    if keys.any_pressed(positive) {
        value += 1.0;
    }
    if keys.any_pressed(negative) {
        value -= 1.0;
    }
    value
}

pub fn keyboard_input(keys: Res<ButtonInput<KeyCode>>, mut input: ResMut<PlayerInput>) {
    input.movement = MovementInput {
        horizontal: axis(
            &keys,
            [KeyCode::KeyD, KeyCode::ArrowRight],
            [KeyCode::KeyA, KeyCode::ArrowLeft],
        ),
        vertical: axis(
            &keys,
            [KeyCode::KeyW, KeyCode::ArrowUp],
            [KeyCode::KeyS, KeyCode::ArrowDown],
        ),
        jump_held: keys.pressed(KeyCode::Space),
        jump_pressed: keys.just_pressed(KeyCode::Space),
        run: keys.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]),
    };
    input.snap_pressed = keys.just_pressed(KeyCode::AltLeft);
}

fn apply_respawns(
    mut requests: EventReader<RespawnRequest>,
    mut players: Query<(&mut CharacterMotor, &mut Transform)>,
    mut cameras: Query<&mut FollowCam>,
) {
    for request in requests.read() {
        let Ok((mut motor, mut transform)) = players.get_mut(request.entity) else {
            continue;
        };
        motor.controller.respawn(request.position, request.facing);
        motor.last_events.clear();
        transform.translation = request.position;
        transform.rotation = request.facing;

        for mut cam in &mut cameras {
            if cam.target == Some(request.entity) {
                cam.camera.reset();
            }
        }
        info!(
            "Respawned at ({:.1}, {:.1}, {:.1})",
            request.position.x, request.position.y, request.position.z
        );
    }
}

fn apply_force_jumps(
    time: Res<Time>,
    mut requests: EventReader<ForceJumpRequest>,
    mut players: Query<&mut CharacterMotor>,
) {
    let now = time.elapsed_secs();
    for request in requests.read() {
        if let Ok(mut motor) = players.get_mut(request.entity) {
            motor
                .controller
                .force_jump(request.height, request.lateral_velocity, now);
        }
    }
}

/// Advances every local character by one frame and publishes its events.
#[allow(clippy::too_many_arguments)]
pub fn move_player(
    time: Res<Time>,
    input: Res<PlayerInput>,
    mover: Res<CharacterMoverRes>,
    cameras: Query<&Transform, (With<FollowCam>, Without<LocalPlayer>)>,
    mut players: Query<(Entity, &mut CharacterMotor, &mut Transform), With<LocalPlayer>>,
    mut ev_jumped: EventWriter<JumpedEvent>,
    mut ev_wall_jumped: EventWriter<WallJumpedEvent>,
    mut ev_apex: EventWriter<ApexReachedEvent>,
    mut ev_landed: EventWriter<LandedEvent>,
) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }
    let now = time.elapsed_secs();
    let camera_forward = cameras
        .iter()
        .next()
        .map(|transform| *transform.forward())
        .unwrap_or(Vec3::NEG_Z);

    for (entity, mut motor, mut transform) in &mut players {
        let events = motor
            .controller
            .tick(&input.movement, camera_forward, dt, now, mover.0.as_ref());

        let controller = &motor.controller;
        transform.translation = controller.position();
        transform.rotation = controller.facing();

        for event in &events {
            match event {
                MovementEvent::Jumped => {
                    ev_jumped.send(JumpedEvent {
                        entity,
                        position: controller.position(),
                    });
                }
                MovementEvent::WallJumped => {
                    ev_wall_jumped.send(WallJumpedEvent {
                        entity,
                        position: controller.position(),
                        direction: controller.direction(),
                    });
                }
                MovementEvent::ApexReached => {
                    ev_apex.send(ApexReachedEvent {
                        entity,
                        height: controller.position().y,
                    });
                }
                MovementEvent::Landed => {
                    ev_landed.send(LandedEvent {
                        entity,
                        position: controller.position(),
                    });
                }
            }
        }
        motor.last_events = events;
    }
}
