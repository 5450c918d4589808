//! The seam between the quadtree and whatever draws its patches.

use std::collections::HashMap;

use quadsphere_cubesphere::PatchMesh;

use crate::{LodError, NodeId};

/// Receives patch meshes and visibility changes from the quadtree.
///
/// The quadtree calls these only from the update thread. `upload` creates a
/// hidden drawable; `set_visible` toggles it; `release` frees it when the
/// node is destroyed.
pub trait RenderHost {
    /// Build a hidden drawable for `node`.
    fn upload(&mut self, node: NodeId, mesh: &PatchMesh) -> Result<(), LodError>;

    /// Show or hide a previously uploaded drawable.
    fn set_visible(&mut self, node: NodeId, visible: bool);

    /// Free the drawable of a destroyed node.
    fn release(&mut self, node: NodeId);
}

/// What a [`HeadlessHost`] keeps per uploaded patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResidentPatch {
    pub vertices: usize,
    pub triangles: usize,
    pub visible: bool,
}

/// In-memory render host for tests and the headless demo.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    patches: HashMap<NodeId, ResidentPatch>,
    failures_remaining: usize,
    uploads: u64,
    releases: u64,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` uploads fail.
    pub fn fail_next_uploads(&mut self, count: usize) {
        self.failures_remaining = count;
    }

    pub fn patch(&self, node: NodeId) -> Option<&ResidentPatch> {
        self.patches.get(&node)
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        self.patches.get(&node).is_some_and(|p| p.visible)
    }

    /// Handles of every visible patch.
    pub fn visible(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.patches
            .iter()
            .filter(|(_, p)| p.visible)
            .map(|(&id, _)| id)
    }

    pub fn visible_count(&self) -> usize {
        self.patches.values().filter(|p| p.visible).count()
    }

    /// Patches uploaded and not yet released.
    pub fn resident_count(&self) -> usize {
        self.patches.len()
    }

    /// Triangles across all visible patches.
    pub fn visible_triangles(&self) -> usize {
        self.patches
            .values()
            .filter(|p| p.visible)
            .map(|p| p.triangles)
            .sum()
    }

    /// Successful uploads since creation.
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    pub fn release_count(&self) -> u64 {
        self.releases
    }
}

impl RenderHost for HeadlessHost {
    fn upload(&mut self, node: NodeId, mesh: &PatchMesh) -> Result<(), LodError> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(LodError::Upload {
                node,
                reason: "injected failure".to_string(),
            });
        }
        self.patches.insert(
            node,
            ResidentPatch {
                vertices: mesh.vertices.len(),
                triangles: mesh.triangle_count(),
                visible: false,
            },
        );
        self.uploads += 1;
        Ok(())
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(patch) = self.patches.get_mut(&node) {
            patch.visible = visible;
        }
    }

    fn release(&mut self, node: NodeId) {
        if self.patches.remove(&node).is_some() {
            self.releases += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeArena;
    use quadsphere_cubesphere::{CubeFace, PatchParams, PatchResolution, generate_patch};

    fn mesh() -> PatchMesh {
        generate_patch(&PatchParams::root(
            CubeFace::PosZ,
            PatchResolution::new(3).unwrap(),
        ))
    }

    #[test]
    fn test_upload_is_hidden_until_shown() {
        let mut arena = NodeArena::new();
        let id = arena.insert(());
        let mut host = HeadlessHost::new();

        host.upload(id, &mesh()).unwrap();
        assert_eq!(host.resident_count(), 1);
        assert!(!host.is_visible(id));

        host.set_visible(id, true);
        assert!(host.is_visible(id));
        assert_eq!(host.visible_triangles(), 8);
        assert_eq!(host.patch(id).unwrap().vertices, 9);

        host.release(id);
        assert_eq!(host.resident_count(), 0);
        assert_eq!(host.release_count(), 1);
    }

    #[test]
    fn test_injected_failures() {
        let mut arena = NodeArena::new();
        let a = arena.insert(());
        let b = arena.insert(());
        let mut host = HeadlessHost::new();
        host.fail_next_uploads(1);

        assert!(matches!(host.upload(a, &mesh()), Err(LodError::Upload { node, .. }) if node == a));
        host.upload(b, &mesh()).unwrap();
        assert_eq!(host.upload_count(), 1);
        assert!(host.patch(a).is_none());
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let mut arena = NodeArena::new();
        let id = arena.insert(());
        let mut host = HeadlessHost::new();
        host.set_visible(id, true);
        host.release(id);
        assert_eq!(host.visible_count(), 0);
        assert_eq!(host.release_count(), 0);
    }
}
