//! Render-time reconstruction of remote avatar poses.
//!
//! Samples arrive from the network at irregular intervals. They are kept
//! newest-first in a fixed ring and the pose is rebuilt at a render time
//! lagging the network clock by a fixed delay, so there is normally a sample
//! on each side of it. When the stream stalls the newest sample is held.

use bevy_math::{Quat, Vec3};
use tracing::warn;

use crate::config::{InterpolationConfig, POSE_BUFFER_CAPACITY};

/// Windows shorter than this are treated as a single instant.
const MIN_WINDOW: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub timestamp: f64,
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for PoseSample {
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Fixed-capacity ring of pose samples, indexed newest-first.
///
/// Insertion order is authoritative: a sample older than the current newest is
/// still stored at index 0.
#[derive(Debug, Clone)]
pub struct InterpolationBuffer {
    slots: [PoseSample; POSE_BUFFER_CAPACITY],
    head: usize,
    len: usize,
}

impl Default for InterpolationBuffer {
    fn default() -> Self {
        Self {
            slots: [PoseSample::default(); POSE_BUFFER_CAPACITY],
            head: 0,
            len: 0,
        }
    }
}

impl InterpolationBuffer {
    pub fn capacity(&self) -> usize {
        POSE_BUFFER_CAPACITY
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sample `index` slots back from the newest.
    pub fn get(&self, index: usize) -> Option<&PoseSample> {
        if index >= self.len {
            return None;
        }
        Some(&self.slots[(self.head + index) % POSE_BUFFER_CAPACITY])
    }

    pub fn newest(&self) -> Option<&PoseSample> {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoseSample> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Inserts `sample` as the newest, evicting the oldest when full.
    /// Returns false when it is older than the previous newest sample.
    pub fn push(&mut self, sample: PoseSample) -> bool {
        let in_order = self
            .newest()
            .is_none_or(|newest| sample.timestamp >= newest.timestamp);

        self.head = (self.head + POSE_BUFFER_CAPACITY - 1) % POSE_BUFFER_CAPACITY;
        self.slots[self.head] = sample;
        self.len = (self.len + 1).min(POSE_BUFFER_CAPACITY);
        in_order
    }

    /// True when timestamps never increase from newest to oldest.
    pub fn is_consistent(&self) -> bool {
        let mut previous: Option<f64> = None;
        for sample in self.iter() {
            if previous.is_some_and(|newer| sample.timestamp > newer) {
                return false;
            }
            previous = Some(sample.timestamp);
        }
        true
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoteTransformInterpolator {
    config: InterpolationConfig,
    buffer: InterpolationBuffer,
}

impl RemoteTransformInterpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            buffer: InterpolationBuffer::default(),
        }
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    pub fn buffer(&self) -> &InterpolationBuffer {
        &self.buffer
    }

    /// Stores a received sample. Out-of-order samples are logged and kept.
    pub fn ingest(&mut self, timestamp: f64, position: Vec3, rotation: Quat) -> bool {
        let previous = self.buffer.newest().map(|sample| sample.timestamp);
        let in_order = self.buffer.push(PoseSample {
            timestamp,
            position,
            rotation,
        });
        if !in_order {
            warn!(
                "Pose sample at {:.4}s arrived after {:.4}s, buffer is out of order",
                timestamp,
                previous.unwrap_or_default()
            );
        }
        in_order
    }

    /// Pose at `network_now - interpolation_delay`, or `None` before the first
    /// sample.
    pub fn current_pose(&self, network_now: f64) -> Option<(Vec3, Quat)> {
        let newest = self.buffer.newest()?;
        let render_time = network_now - self.config.interpolation_delay;

        // Starved: nothing newer than the render time, hold the last pose.
        if newest.timestamp <= render_time {
            return Some((newest.position, newest.rotation));
        }

        let last = self.buffer.len() - 1;
        let lhs_index = (0..self.buffer.len())
            .find(|&i| {
                self.buffer
                    .get(i)
                    .is_some_and(|sample| sample.timestamp <= render_time)
            })
            .unwrap_or(last);
        let lhs = self.buffer.get(lhs_index)?;
        let rhs = self.buffer.get(lhs_index.saturating_sub(1))?;

        let window = rhs.timestamp - lhs.timestamp;
        let t = if window > MIN_WINDOW {
            ((render_time - lhs.timestamp) / window).clamp(0.0, 1.0)
        } else {
            0.0
        };

        if t <= 0.0 {
            return Some((lhs.position, lhs.rotation));
        }
        if t >= 1.0 {
            return Some((rhs.position, rhs.rotation));
        }
        let t = t as f32;
        Some((
            lhs.position.lerp(rhs.position, t),
            lhs.rotation.slerp(rhs.rotation, t),
        ))
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
