use std::collections::HashMap;

use bevy::prelude::*;
use skyhop_protocol::animation::AnimationSync;
use skyhop_protocol::interpolation::RemoteTransformInterpolator;
use skyhop_protocol::protocol::{EntityId, PeerMessage};

use crate::animation::{AnimationSyncState, apply_remote_animation, select_local_animation};
use crate::events::{RemoteAvatarJoinEvent, RemoteAvatarLeaveEvent};
use crate::player::{LocalPlayer, PlayerSet};
use crate::{ControllerSettings, PeerTransportRes};

/// Network-synchronized clock. Peers agree on `offset` out of band; in
/// process it stays zero.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct NetworkClock {
    pub offset: f64,
}

impl NetworkClock {
    pub fn now(&self, time: &Time) -> f64 {
        time.elapsed_secs_f64() + self.offset
    }
}

/// Identity of a character on the wire.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(pub EntityId);

/// Character owned by a peer, driven by received samples.
#[derive(Component)]
pub struct RemoteAvatar {
    pub id: EntityId,
}

#[derive(Component)]
pub struct RemoteInterpolation(pub RemoteTransformInterpolator);

/// Remote avatars by network id.
#[derive(Resource, Default)]
pub struct RemoteAvatars {
    pub entities: HashMap<EntityId, Entity>,
}

#[derive(Resource)]
struct SendTimer(Timer);

pub struct NetworkPlugin {
    send_rate: f32,
}

impl NetworkPlugin {
    pub fn new(send_rate: f32) -> Self {
        Self { send_rate }
    }
}

impl Plugin for NetworkPlugin {
    fn build(&self, app: &mut App) {
        let period = 1.0 / self.send_rate.max(f32::EPSILON);
        app.init_resource::<NetworkClock>()
            .init_resource::<RemoteAvatars>()
            .insert_resource(SendTimer(Timer::from_seconds(period, TimerMode::Repeating)))
            .add_systems(
                Update,
                (
                    broadcast_local_state
                        .after(PlayerSet::Move)
                        .after(select_local_animation),
                    receive_peer_messages.before(apply_remote_animation),
                )
                    .run_if(resource_exists::<PeerTransportRes>),
            )
            .add_systems(
                Update,
                interpolate_remote_transforms.after(receive_peer_messages),
            );
    }
}

/// Sends every local character's pose and animation at the configured rate.
pub fn broadcast_local_state(
    time: Res<Time>,
    clock: Res<NetworkClock>,
    mut timer: ResMut<SendTimer>,
    transport: Res<PeerTransportRes>,
    players: Query<(&NetworkId, &Transform, Option<&AnimationSyncState>), With<LocalPlayer>>,
) {
    if !timer.0.tick(time.delta()).just_finished() {
        return;
    }
    let timestamp = clock.now(&time);

    for (id, transform, animation) in &players {
        transport.0.send(PeerMessage::Pose {
            entity_id: id.0,
            timestamp,
            position: transform.translation,
            rotation: transform.rotation,
        });
        if let Some(animation) = animation {
            transport.0.send(PeerMessage::Animation {
                entity_id: id.0,
                state: animation.0.current(),
            });
        }
    }
}

/// Applies received messages, spawning an avatar for each new peer id.
#[allow(clippy::too_many_arguments)]
pub fn receive_peer_messages(
    mut commands: Commands,
    transport: Res<PeerTransportRes>,
    settings: Res<ControllerSettings>,
    mut avatars: ResMut<RemoteAvatars>,
    local_ids: Query<&NetworkId, With<LocalPlayer>>,
    mut remotes: Query<(&mut RemoteInterpolation, &mut AnimationSyncState), With<RemoteAvatar>>,
    mut ev_join: EventWriter<RemoteAvatarJoinEvent>,
    mut ev_leave: EventWriter<RemoteAvatarLeaveEvent>,
) {
    let messages = transport.0.receive();
    if messages.is_empty() {
        return;
    }

    // Avatars first seen this frame; their entities do not exist yet.
    let mut joining: HashMap<EntityId, (RemoteTransformInterpolator, AnimationSync, Vec3)> =
        HashMap::new();

    for msg in messages {
        let entity_id = msg.entity_id();
        // Don't mirror ourselves
        if local_ids.iter().any(|id| id.0 == entity_id) {
            continue;
        }

        match msg {
            PeerMessage::Pose {
                entity_id,
                timestamp,
                position,
                rotation,
            } => {
                if let Some(&entity) = avatars.entities.get(&entity_id) {
                    if let Ok((mut interpolation, _)) = remotes.get_mut(entity) {
                        interpolation.0.ingest(timestamp, position, rotation);
                    }
                } else {
                    let (interpolator, _, _) = joining.entry(entity_id).or_insert_with(|| {
                        (
                            RemoteTransformInterpolator::new(settings.interpolation.clone()),
                            AnimationSync::default(),
                            position,
                        )
                    });
                    interpolator.ingest(timestamp, position, rotation);
                }
            }

            PeerMessage::Animation { entity_id, state } => {
                if let Some(&entity) = avatars.entities.get(&entity_id) {
                    if let Ok((_, mut sync)) = remotes.get_mut(entity) {
                        sync.0.set_current(state);
                    }
                } else if let Some((_, sync, _)) = joining.get_mut(&entity_id) {
                    sync.set_current(state);
                } else {
                    debug!("Animation for unknown avatar {}", entity_id);
                }
            }

            PeerMessage::Despawn { entity_id } => {
                joining.remove(&entity_id);
                if let Some(entity) = avatars.entities.remove(&entity_id) {
                    commands.entity(entity).despawn_recursive();
                    info!("Remote avatar {} left", entity_id);
                    ev_leave.send(RemoteAvatarLeaveEvent { entity_id });
                }
            }
        }
    }

    for (entity_id, (interpolator, animation, position)) in joining {
        let entity = commands
            .spawn((
                RemoteAvatar { id: entity_id },
                NetworkId(entity_id),
                RemoteInterpolation(interpolator),
                AnimationSyncState(animation),
                Transform::from_translation(position),
            ))
            .id();
        avatars.entities.insert(entity_id, entity);
        info!("Remote avatar {} joined", entity_id);
        ev_join.send(RemoteAvatarJoinEvent {
            entity_id,
            entity,
            position,
        });
    }
}

/// Places remote avatars at their interpolated pose for this frame.
pub fn interpolate_remote_transforms(
    time: Res<Time>,
    clock: Res<NetworkClock>,
    mut remotes: Query<(&RemoteInterpolation, &mut Transform), With<RemoteAvatar>>,
) {
    let network_now = clock.now(&time);
    for (interpolation, mut transform) in &mut remotes {
        if let Some((position, rotation)) = interpolation.0.current_pose(network_now) {
            transform.translation = position;
            transform.rotation = rotation;
        }
    }
}
