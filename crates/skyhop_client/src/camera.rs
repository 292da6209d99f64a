use bevy::prelude::*;
use skyhop_protocol::camera::{
    CameraPose, FollowCamera, PerspectiveProjector, TargetBounds, TargetView,
};
use skyhop_protocol::collision::{DEFAULT_HALF_WIDTH, DEFAULT_HEIGHT, OpenSky, SceneQuery};
use skyhop_protocol::config::CameraConfig;

use crate::SceneQueryRes;
use crate::player::{CharacterMotor, PlayerInput, PlayerSet};

/// Spring camera following one target entity.
#[derive(Component)]
pub struct FollowCam {
    pub camera: FollowCamera,
    pub target: Option<Entity>,
    tracked: Option<Entity>,
}

impl FollowCam {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            camera: FollowCamera::new(config),
            target: None,
            tracked: None,
        }
    }

    pub fn with_target(mut self, target: Entity) -> Self {
        self.target = Some(target);
        self
    }

    /// Switches to a new target. Tracking offsets are re-derived from its
    /// [`TrackingBounds`] on the next frame.
    pub fn set_target(&mut self, target: Option<Entity>) {
        self.target = target;
    }
}

/// Local-space box the camera frames on a target.
#[derive(Component, Debug, Clone, Copy)]
pub struct TrackingBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for TrackingBounds {
    fn default() -> Self {
        Self {
            min: Vec3::new(-DEFAULT_HALF_WIDTH, 0.0, -DEFAULT_HALF_WIDTH),
            max: Vec3::new(DEFAULT_HALF_WIDTH, DEFAULT_HEIGHT, DEFAULT_HALF_WIDTH),
        }
    }
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (retarget_cameras, follow_camera)
                .chain()
                .after(PlayerSet::Move),
        );
    }
}

pub fn spawn_follow_camera(
    commands: &mut Commands,
    config: CameraConfig,
    target: Entity,
    position: Vec3,
) -> Entity {
    commands
        .spawn((
            FollowCam::new(config).with_target(target),
            Transform::from_translation(position),
            Projection::Perspective(PerspectiveProjection::default()),
        ))
        .id()
}

fn retarget_cameras(mut cameras: Query<&mut FollowCam>, bounds: Query<Option<&TrackingBounds>>) {
    for mut cam in &mut cameras {
        if cam.tracked == cam.target {
            continue;
        }
        let cam = &mut *cam;
        let tracking = cam.target.and_then(|entity| bounds.get(entity).ok()).map(|b| {
            b.map(|b| TargetBounds::from_local_aabb(b.min, b.max))
                .unwrap_or_default()
        });
        cam.camera.set_target(tracking);
        cam.tracked = cam.target;
        match cam.target {
            Some(entity) => info!("Camera now following {:?}", entity),
            None => info!("Camera target cleared"),
        }
    }
}

fn projector_for(projection: Option<&Projection>) -> PerspectiveProjector {
    match projection {
        Some(Projection::Perspective(perspective)) => PerspectiveProjector {
            fov_y: perspective.fov,
            aspect: perspective.aspect_ratio,
        },
        _ => PerspectiveProjector::default(),
    }
}

pub fn follow_camera(
    time: Res<Time>,
    input: Res<PlayerInput>,
    scene: Option<Res<SceneQueryRes>>,
    targets: Query<(&Transform, Option<&CharacterMotor>), Without<FollowCam>>,
    mut cameras: Query<(&mut FollowCam, &mut Transform, Option<&Projection>)>,
) {
    let dt = time.delta_secs();
    let scene: &dyn SceneQuery = match &scene {
        Some(scene) => scene.0.as_ref(),
        None => &OpenSky,
    };

    for (mut cam, mut transform, projection) in &mut cameras {
        let view = cam
            .target
            .and_then(|entity| targets.get(entity).ok())
            .map(|(target, motor)| TargetView {
                position: target.translation,
                facing: target.rotation,
                is_jumping: motor.is_some_and(|motor| motor.controller.is_jumping()),
            });

        let mut pose = CameraPose {
            position: transform.translation,
            rotation: transform.rotation,
        };
        cam.camera.update(
            &mut pose,
            view.as_ref(),
            input.snap_pressed,
            dt,
            scene,
            &projector_for(projection),
        );
        transform.translation = pose.position;
        transform.rotation = pose.rotation;
    }
}
