use bevy::prelude::*;
use skyhop_protocol::animation::AnimationSync;

use crate::events::AnimationChangedEvent;
use crate::network::RemoteAvatar;
use crate::player::{CharacterMotor, LocalPlayer, move_player};

/// Animation state of a character, local or mirrored.
#[derive(Component, Debug, Default)]
pub struct AnimationSyncState(pub AnimationSync);

pub struct AnimationPlugin;

impl Plugin for AnimationPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                select_local_animation.after(move_player),
                apply_remote_animation,
            ),
        );
    }
}

pub fn select_local_animation(
    time: Res<Time>,
    mut players: Query<(Entity, &CharacterMotor, &mut AnimationSyncState), With<LocalPlayer>>,
    mut ev_changed: EventWriter<AnimationChangedEvent>,
) {
    let now = time.elapsed_secs();
    for (entity, motor, mut sync) in &mut players {
        sync.0.update(&motor.controller, &motor.last_events, now);
        if let Some(state) = sync.0.take_change() {
            ev_changed.send(AnimationChangedEvent {
                entity,
                state,
                remote: false,
            });
        }
    }
}

/// Fires a change event when a peer's animation state differs from the last
/// one applied.
pub fn apply_remote_animation(
    mut avatars: Query<(Entity, &mut AnimationSyncState), With<RemoteAvatar>>,
    mut ev_changed: EventWriter<AnimationChangedEvent>,
) {
    for (entity, mut sync) in &mut avatars {
        if let Some(state) = sync.0.take_change() {
            debug!("Remote avatar {:?} plays {}", entity, state.clip_name());
            ev_changed.send(AnimationChangedEvent {
                entity,
                state,
                remote: true,
            });
        }
    }
}
