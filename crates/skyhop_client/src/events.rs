use bevy::prelude::*;
use skyhop_protocol::animation::AnimationState;
use skyhop_protocol::protocol::EntityId;

// --- Events ---

#[derive(Event)]
pub struct JumpedEvent {
    pub entity: Entity,
    pub position: Vec3,
}

#[derive(Event)]
pub struct WallJumpedEvent {
    pub entity: Entity,
    pub position: Vec3,
    /// Direction pushed off the wall.
    pub direction: Vec3,
}

#[derive(Event)]
pub struct ApexReachedEvent {
    pub entity: Entity,
    pub height: f32,
}

#[derive(Event)]
pub struct LandedEvent {
    pub entity: Entity,
    pub position: Vec3,
}

#[derive(Event)]
pub struct AnimationChangedEvent {
    pub entity: Entity,
    pub state: AnimationState,
    /// Mirrored from a peer rather than selected locally.
    pub remote: bool,
}

#[derive(Event)]
pub struct RemoteAvatarJoinEvent {
    pub entity_id: EntityId,
    pub entity: Entity,
    pub position: Vec3,
}

#[derive(Event)]
pub struct RemoteAvatarLeaveEvent {
    pub entity_id: EntityId,
}

// --- Plugin trait ---

#[allow(unused_variables)]
pub trait SkyhopPlugin: Send + Sync + 'static {
    fn on_jumped(&self, event: &JumpedEvent) {}
    fn on_wall_jumped(&self, event: &WallJumpedEvent) {}
    fn on_apex_reached(&self, event: &ApexReachedEvent) {}
    fn on_landed(&self, event: &LandedEvent) {}
    fn on_animation_changed(&self, event: &AnimationChangedEvent) {}
    fn on_remote_avatar_join(&self, event: &RemoteAvatarJoinEvent) {}
    fn on_remote_avatar_leave(&self, event: &RemoteAvatarLeaveEvent) {}
}

// --- Registry ---

#[derive(Resource)]
struct PluginRegistry {
    plugins: Vec<Box<dyn SkyhopPlugin>>,
}

// --- Dispatch systems ---

fn dispatch_jumped(mut reader: EventReader<JumpedEvent>, registry: Res<PluginRegistry>) {
    for event in reader.read() {
        for plugin in &registry.plugins {
            plugin.on_jumped(event);
        }
    }
}

fn dispatch_wall_jumped(mut reader: EventReader<WallJumpedEvent>, registry: Res<PluginRegistry>) {
    for event in reader.read() {
        for plugin in &registry.plugins {
            plugin.on_wall_jumped(event);
        }
    }
}

fn dispatch_apex_reached(
    mut reader: EventReader<ApexReachedEvent>,
    registry: Res<PluginRegistry>,
) {
    for event in reader.read() {
        for plugin in &registry.plugins {
            plugin.on_apex_reached(event);
        }
    }
}

fn dispatch_landed(mut reader: EventReader<LandedEvent>, registry: Res<PluginRegistry>) {
    for event in reader.read() {
        for plugin in &registry.plugins {
            plugin.on_landed(event);
        }
    }
}

fn dispatch_animation_changed(
    mut reader: EventReader<AnimationChangedEvent>,
    registry: Res<PluginRegistry>,
) {
    for event in reader.read() {
        for plugin in &registry.plugins {
            plugin.on_animation_changed(event);
        }
    }
}

fn dispatch_remote_avatar_join(
    mut reader: EventReader<RemoteAvatarJoinEvent>,
    registry: Res<PluginRegistry>,
) {
    for event in reader.read() {
        for plugin in &registry.plugins {
            plugin.on_remote_avatar_join(event);
        }
    }
}

fn dispatch_remote_avatar_leave(
    mut reader: EventReader<RemoteAvatarLeaveEvent>,
    registry: Res<PluginRegistry>,
) {
    for event in reader.read() {
        for plugin in &registry.plugins {
            plugin.on_remote_avatar_leave(event);
        }
    }
}

// --- Plugin ---

#[derive(Default)]
pub struct EventsPlugin {
    plugins: std::sync::Mutex<Vec<Box<dyn SkyhopPlugin>>>,
}

impl EventsPlugin {
    pub fn new_with(plugins: Vec<Box<dyn SkyhopPlugin>>) -> Self {
        Self {
            plugins: std::sync::Mutex::new(plugins),
        }
    }
}

impl Plugin for EventsPlugin {
    fn build(&self, app: &mut App) {
        let plugins = self
            .plugins
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
            .collect();

        app.add_event::<JumpedEvent>()
            .add_event::<WallJumpedEvent>()
            .add_event::<ApexReachedEvent>()
            .add_event::<LandedEvent>()
            .add_event::<AnimationChangedEvent>()
            .add_event::<RemoteAvatarJoinEvent>()
            .add_event::<RemoteAvatarLeaveEvent>()
            .insert_resource(PluginRegistry { plugins })
            .add_systems(
                PostUpdate,
                (
                    dispatch_jumped,
                    dispatch_wall_jumped,
                    dispatch_apex_reached,
                    dispatch_landed,
                    dispatch_animation_changed,
                    dispatch_remote_avatar_join,
                    dispatch_remote_avatar_leave,
                ),
            );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountLandings(Arc<AtomicUsize>);

    impl SkyhopPlugin for CountLandings {
        fn on_landed(&self, _event: &LandedEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn registered_plugins_observe_events() {
        let landings = Arc::new(AtomicUsize::new(0));
        let mut app = App::new();
        app.add_plugins(EventsPlugin::new_with(vec![Box::new(CountLandings(
            landings.clone(),
        ))]));

        let entity = app.world_mut().spawn_empty().id();
        app.world_mut().send_event(LandedEvent {
            entity,
            position: Vec3::ZERO,
        });
        app.world_mut().send_event(JumpedEvent {
            entity,
            position: Vec3::ZERO,
        });
        app.update();

        assert_eq!(landings.load(Ordering::SeqCst), 1);
    }
}
