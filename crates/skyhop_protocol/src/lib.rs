//! Engine-independent core of the skyhop character controller.
//!
//! Everything here is plain data plus per-tick functions. Collision, scene
//! queries and camera projection are injected through the traits in
//! [`collision`], so the same code runs inside the bevy client, the headless
//! sandbox and unit tests.

pub mod animation;
pub mod camera;
pub mod collision;
pub mod config;
pub mod interpolation;
pub mod movement;
pub mod protocol;
pub mod spring;
pub mod transport;
