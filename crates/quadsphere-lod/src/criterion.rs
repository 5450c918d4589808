//! Distance/depth subdivision criterion with an optional merge hysteresis band.

use glam::DVec3;
use quadsphere_config::LodConfig;
use quadsphere_cubesphere::PatchParams;

/// Split/merge decisions for one tick, built from a single configuration
/// snapshot so every node in the tick sees the same limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubdivisionCriterion {
    max_depth: u32,
    max_distance: f64,
    merge_distance: f64,
    radius: f64,
    origin: DVec3,
}

impl SubdivisionCriterion {
    /// Build from a settings snapshot for a sphere centred at `origin`.
    pub fn new(settings: &LodConfig, origin: DVec3) -> Self {
        Self {
            max_depth: settings.max_depth,
            max_distance: settings.max_distance,
            merge_distance: settings.max_distance * settings.merge_hysteresis,
            radius: settings.sphere_radius,
            origin,
        }
    }

    /// Whether a node at `depth`, `distance` from the observer, should have children.
    ///
    /// `max_depth` is the deepest node that may exist, so a node splits only
    /// while `depth < max_depth`. Distance equal to the limit still splits.
    pub fn can_recurse(&self, depth: u32, distance: f64) -> bool {
        depth < self.max_depth && distance <= self.max_distance
    }

    /// Whether a split node should collapse back into a single patch.
    ///
    /// Without hysteresis this is exactly `!can_recurse`.
    pub fn should_merge(&self, depth: u32, distance: f64) -> bool {
        depth >= self.max_depth || distance > self.merge_distance
    }

    /// World-space centre of a patch on the sphere surface.
    pub fn patch_center(&self, params: &PatchParams) -> DVec3 {
        self.origin + self.radius * params.center_direction()
    }

    /// Distance from `observer` to the world-space patch centre.
    pub fn distance_to(&self, params: &PatchParams, observer: DVec3) -> f64 {
        self.patch_center(params).distance(observer)
    }
}
