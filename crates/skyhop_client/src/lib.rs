pub mod animation;
pub mod camera;
pub mod events;
pub mod network;
pub mod player;

use std::sync::{Mutex, PoisonError};

use bevy::prelude::*;
use skyhop_protocol::collision::{CharacterMover, SceneQuery};
use skyhop_protocol::config::{CameraConfig, InterpolationConfig, MovementConfig};
use skyhop_protocol::transport::PeerTransport;

use events::EventsPlugin;

/// Bevy Resource wrapping the collision-resolving move service.
#[derive(Resource)]
pub struct CharacterMoverRes(pub Box<dyn CharacterMover>);

/// Bevy Resource wrapping the line-of-sight query service.
#[derive(Resource)]
pub struct SceneQueryRes(pub Box<dyn SceneQuery>);

/// Bevy Resource wrapping a boxed PeerTransport.
#[derive(Resource)]
pub struct PeerTransportRes(pub Box<dyn PeerTransport>);

/// Tuning shared by the client systems.
#[derive(Resource, Debug, Clone)]
pub struct ControllerSettings {
    pub movement: MovementConfig,
    pub camera: CameraConfig,
    pub interpolation: InterpolationConfig,
    /// Pose broadcasts per second.
    pub send_rate: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            movement: MovementConfig::default(),
            camera: CameraConfig::default(),
            interpolation: InterpolationConfig::default(),
            send_rate: 15.0,
        }
    }
}

/// The client plugin composes the controller, camera, animation and
/// networking systems around the injected services.
pub struct ClientPlugin {
    mover: Mutex<Option<Box<dyn CharacterMover>>>,
    scene: Mutex<Option<Box<dyn SceneQuery>>>,
    transport: Mutex<Option<Box<dyn PeerTransport>>>,
    settings: ControllerSettings,
    event_plugins: Mutex<Vec<Box<dyn events::SkyhopPlugin>>>,
}

impl ClientPlugin {
    pub fn new(mover: Box<dyn CharacterMover>) -> Self {
        Self {
            mover: Mutex::new(Some(mover)),
            scene: Mutex::new(None),
            transport: Mutex::new(None),
            settings: ControllerSettings::default(),
            event_plugins: Mutex::new(Vec::new()),
        }
    }

    /// Scene used for camera line-of-sight. Without one the camera never
    /// collides.
    pub fn with_scene(self, scene: Box<dyn SceneQuery>) -> Self {
        *self.scene.lock().unwrap_or_else(PoisonError::into_inner) = Some(scene);
        self
    }

    /// Enables pose and animation exchange with peers.
    pub fn with_transport(self, transport: Box<dyn PeerTransport>) -> Self {
        *self.transport.lock().unwrap_or_else(PoisonError::into_inner) = Some(transport);
        self
    }

    pub fn with_settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_plugin(self, plugin: impl events::SkyhopPlugin) -> Self {
        self.event_plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(plugin));
        self
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

impl Plugin for ClientPlugin {
    fn build(&self, app: &mut App) {
        match take(&self.mover) {
            Some(mover) => {
                app.insert_resource(CharacterMoverRes(mover));
            }
            None => warn!("ClientPlugin character mover already taken"),
        }
        if let Some(scene) = take(&self.scene) {
            app.insert_resource(SceneQueryRes(scene));
        }
        if let Some(transport) = take(&self.transport) {
            app.insert_resource(PeerTransportRes(transport));
        }

        let event_plugins = self
            .event_plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        app.insert_resource(self.settings.clone())
            .add_plugins(EventsPlugin::new_with(event_plugins))
            .add_plugins(player::PlayerPlugin)
            .add_plugins(camera::CameraPlugin)
            .add_plugins(animation::AnimationPlugin)
            .add_plugins(network::NetworkPlugin::new(self.settings.send_rate));
    }
}
