use std::time::Duration;

use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use clap::Parser;
use skyhop_macros::skyhop_plugin;

use skyhop_client::camera::{FollowCam, spawn_follow_camera};
use skyhop_client::events;
use skyhop_client::network::RemoteAvatar;
use skyhop_client::player::{
    CharacterMotor, LocalPlayer, PlayerInput, PlayerSet, spawn_local_player,
};
use skyhop_client::{ClientPlugin, ControllerSettings};
use skyhop_protocol::collision::{BoxWorld, SolidBox};
use skyhop_protocol::movement::MovementInput;
use skyhop_protocol::protocol::{EntityId, PeerMessage};
use skyhop_protocol::transport::{LocalPeerTransport, PeerTransport, create_local_link};

/// Network id of the local character.
const LOCAL_ID: EntityId = 1;
/// Added to echoed ids so the mirror is a distinct avatar.
const MIRROR_ID_OFFSET: EntityId = 1000;
/// Sideways offset of the mirrored avatar.
const MIRROR_OFFSET: Vec3 = Vec3::new(2.0, 0.0, 0.0);
/// Frame at which the camera switches over to the mirrored avatar.
const FOLLOW_MIRROR_TICK: u32 = 450;

#[derive(Parser)]
#[command(name = "skyhop")]
#[command(about = "Skyhop headless platformer controller sandbox")]
struct Args {
    /// Number of simulated frames
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Simulated frames per second
    #[arg(long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Enable wall jumping and jump at the wall
    #[arg(long)]
    wall_jump: bool,

    /// Disable gliding while the jump button is held
    #[arg(long)]
    no_glide: bool,

    /// Render delay of mirrored avatars in milliseconds
    #[arg(long, default_value_t = 100)]
    interpolation_delay_ms: u64,

    /// Pose broadcasts per second
    #[arg(long, default_value_t = 15.0)]
    send_rate: f32,
}

struct LogPlugin;

#[skyhop_plugin]
impl LogPlugin {
    #[Event::Jumped]
    fn on_jumped(&self, event: &events::JumpedEvent) {
        info!(
            "Jumped at ({:.2}, {:.2}, {:.2})",
            event.position.x, event.position.y, event.position.z
        );
    }

    #[Event::WallJumped]
    fn on_wall_jumped(&self, event: &events::WallJumpedEvent) {
        info!(
            "Wall jump at ({:.2}, {:.2}, {:.2}) towards ({:.2}, {:.2})",
            event.position.x, event.position.y, event.position.z, event.direction.x, event.direction.z
        );
    }

    #[Event::ApexReached]
    fn on_apex(&self, event: &events::ApexReachedEvent) {
        info!("Apex reached at height {:.2}", event.height);
    }

    #[Event::Landed]
    fn on_landed(&self, event: &events::LandedEvent) {
        info!(
            "Landed at ({:.2}, {:.2}, {:.2})",
            event.position.x, event.position.y, event.position.z
        );
    }

    #[Event::AnimationChanged]
    fn on_animation(&self, event: &events::AnimationChangedEvent) {
        let owner = if event.remote { "mirror" } else { "player" };
        info!("{} plays {}", owner, event.state.clip_name());
    }

    #[Event::RemoteAvatarJoin]
    fn on_join(&self, event: &events::RemoteAvatarJoinEvent) {
        info!(
            "Avatar {} joined at ({:.2}, {:.2}, {:.2})",
            event.entity_id, event.position.x, event.position.y, event.position.z
        );
    }
}

/// Far end of the peer link. Sends back every message it receives as a
/// second, offset character.
#[derive(Resource)]
struct EchoPeer(LocalPeerTransport);

#[derive(Resource)]
struct Script {
    tick: u32,
    ticks: u32,
    wall_jump: bool,
}

fn main() {
    let args = Args::parse();

    let mut settings = ControllerSettings {
        send_rate: args.send_rate,
        ..Default::default()
    };
    settings.movement.can_glide = !args.no_glide;
    settings.movement.can_wall_jump = args.wall_jump;
    settings.interpolation.interpolation_delay = args.interpolation_delay_ms as f64 / 1000.0;

    // Floor with a wall ahead of the spawn point.
    let world = BoxWorld::flat(0.0).with_box(SolidBox::new(
        Vec3::new(-4.0, 0.0, -14.0),
        Vec3::new(4.0, 6.0, -13.0),
    ));

    let (client_transport, echo_transport) = create_local_link();
    let frame = Duration::from_secs_f64(1.0 / args.tick_rate.max(1.0));

    App::new()
        .add_plugins(MinimalPlugins)
        .add_plugins(bevy::log::LogPlugin::default())
        .insert_resource(TimeUpdateStrategy::ManualDuration(frame))
        .add_plugins(
            ClientPlugin::new(Box::new(world.clone()))
                .with_scene(Box::new(world))
                .with_transport(Box::new(client_transport))
                .with_settings(settings)
                .with_plugin(LogPlugin),
        )
        .insert_resource(EchoPeer(echo_transport))
        .insert_resource(Script {
            tick: 0,
            ticks: args.ticks,
            wall_jump: args.wall_jump,
        })
        .add_systems(Startup, setup_scene)
        .add_systems(
            Update,
            (follow_mirror, scripted_input).chain().in_set(PlayerSet::Input),
        )
        .add_systems(Update, (echo_peer, finish).chain().after(PlayerSet::Move))
        .run();
}

fn setup_scene(mut commands: Commands, settings: Res<ControllerSettings>) {
    let player = spawn_local_player(&mut commands, &settings, LOCAL_ID, Vec3::ZERO);
    spawn_follow_camera(
        &mut commands,
        settings.camera.clone(),
        player,
        Vec3::new(0.0, 2.0, 4.0),
    );
}

/// Input for a frame of the demo run: stand, walk to the wall, sprint, jump
/// and glide, then snap the camera.
fn script_frame(tick: u32, wall_jump: bool) -> (MovementInput, bool) {
    let forward = |run: bool| MovementInput {
        vertical: 1.0,
        run,
        ..Default::default()
    };
    let input = match tick {
        0..30 => MovementInput::default(),
        30..150 => forward(false),
        150..200 => forward(true),
        200 => MovementInput {
            jump_pressed: true,
            jump_held: true,
            ..forward(true)
        },
        201..260 => MovementInput {
            jump_held: true,
            ..forward(true)
        },
        // Second press while pressed against the wall.
        260 if wall_jump => MovementInput {
            jump_pressed: true,
            jump_held: true,
            ..forward(false)
        },
        260..320 => MovementInput {
            horizontal: 1.0,
            ..Default::default()
        },
        _ => MovementInput::default(),
    };
    (input, tick == 330)
}

fn scripted_input(mut script: ResMut<Script>, mut input: ResMut<PlayerInput>) {
    let (movement, snap_pressed) = script_frame(script.tick, script.wall_jump);
    input.movement = movement;
    input.snap_pressed = snap_pressed;
    script.tick += 1;
}

fn follow_mirror(
    script: Res<Script>,
    avatars: Query<Entity, With<RemoteAvatar>>,
    mut cameras: Query<&mut FollowCam>,
) {
    if script.tick != FOLLOW_MIRROR_TICK {
        return;
    }
    let Some(mirror) = avatars.iter().next() else {
        warn!("No mirrored avatar to follow");
        return;
    };
    for mut cam in &mut cameras {
        cam.set_target(Some(mirror));
    }
}

fn echo_peer(peer: Res<EchoPeer>) {
    for msg in peer.0.receive() {
        let echoed = match msg {
            PeerMessage::Pose {
                entity_id,
                timestamp,
                position,
                rotation,
            } => PeerMessage::Pose {
                entity_id: entity_id + MIRROR_ID_OFFSET,
                timestamp,
                position: position + MIRROR_OFFSET,
                rotation,
            },
            PeerMessage::Animation { entity_id, state } => PeerMessage::Animation {
                entity_id: entity_id + MIRROR_ID_OFFSET,
                state,
            },
            PeerMessage::Despawn { entity_id } => PeerMessage::Despawn {
                entity_id: entity_id + MIRROR_ID_OFFSET,
            },
        };
        peer.0.send(echoed);
    }
}

fn finish(
    script: Res<Script>,
    players: Query<(&Transform, &CharacterMotor), With<LocalPlayer>>,
    avatars: Query<(&RemoteAvatar, &Transform)>,
    cameras: Query<&Transform, With<FollowCam>>,
    mut exit: EventWriter<AppExit>,
) {
    if script.tick < script.ticks {
        return;
    }

    for (transform, motor) in &players {
        info!(
            "Player ends at {:.2} (grounded: {}, moving: {})",
            transform.translation,
            motor.controller.is_grounded(),
            motor.controller.is_moving()
        );
    }
    for (avatar, transform) in &avatars {
        info!("Avatar {} ends at {:.2}", avatar.id, transform.translation);
    }
    for transform in &cameras {
        info!(
            "Camera ends at {:.2} looking {:.2}",
            transform.translation,
            *transform.forward()
        );
    }
    exit.send(AppExit::Success);
}
