//! One quadtree node and its lifecycle states.

use quadsphere_cubesphere::{CubeFace, PatchMesh, PatchParams};

use crate::NodeId;

/// Lifecycle of a node, from first tick to drawn (or replaced by children).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Created, no generation requested yet.
    Initial,
    /// Mesh request queued or running on the worker.
    Generating,
    /// Mesh received, not yet handed to the render host.
    Ready,
    /// Uploaded and hidden, waiting for its parent (or the sphere) to show it.
    Waiting,
    /// Visible leaf.
    Active,
    /// Children exist and are still being prepared; this node stays visible.
    Splitting,
    /// Children are visible; this node is hidden.
    Split,
}

impl NodeState {
    /// States a node passes through on its way to `Active` or `Split`.
    pub fn is_settling(self) -> bool {
        !matches!(self, NodeState::Active | NodeState::Split)
    }

    /// States whose children exist.
    pub fn has_children(self) -> bool {
        matches!(self, NodeState::Splitting | NodeState::Split)
    }
}

/// A patch of one cube face at some depth.
#[derive(Debug)]
pub struct LodNode {
    pub(crate) state: NodeState,
    pub(crate) face: CubeFace,
    pub(crate) params: PatchParams,
    pub(crate) depth: u32,
    pub(crate) children: Option<[NodeId; 4]>,
    pub(crate) payload: Option<PatchMesh>,
    pub(crate) visible: bool,
    pub(crate) uploaded: bool,
    pub(crate) is_updating: bool,
    /// Tick of the last state change; `None` before the first one.
    pub(crate) last_transition: Option<u64>,
}

impl LodNode {
    pub(crate) fn new(face: CubeFace, params: PatchParams, depth: u32) -> Self {
        Self {
            state: NodeState::Initial,
            face,
            params,
            depth,
            children: None,
            payload: None,
            visible: false,
            uploaded: false,
            is_updating: true,
            last_transition: None,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn face(&self) -> CubeFace {
        self.face
    }

    pub fn params(&self) -> &PatchParams {
        &self.params
    }

    /// Depth below the face root (root = 0).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Children in `Quadrant::ALL` order.
    pub fn children(&self) -> Option<[NodeId; 4]> {
        self.children
    }

    /// Generated geometry, once the worker result has been drained.
    pub fn payload(&self) -> Option<&PatchMesh> {
        self.payload.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether this node or its subtree changed or is still settling.
    pub fn is_updating(&self) -> bool {
        self.is_updating
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub(crate) fn transitioned_in(&self, tick: u64) -> bool {
        self.last_transition == Some(tick)
    }

    pub(crate) fn transition(&mut self, state: NodeState, tick: u64) {
        tracing::trace!(from = ?self.state, to = ?state, depth = self.depth, "node transition");
        self.state = state;
        self.last_transition = Some(tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadsphere_cubesphere::PatchResolution;

    #[test]
    fn test_new_node_is_initial_and_hidden() {
        let params = PatchParams::root(CubeFace::NegX, PatchResolution::MIN);
        let node = LodNode::new(CubeFace::NegX, params, 0);
        assert_eq!(node.state(), NodeState::Initial);
        assert!(!node.is_visible());
        assert!(node.is_leaf());
        assert!(node.payload().is_none());
        assert!(node.is_updating());
    }

    #[test]
    fn test_transition_records_tick() {
        let params = PatchParams::root(CubeFace::PosX, PatchResolution::MIN);
        let mut node = LodNode::new(CubeFace::PosX, params, 0);
        assert!(!node.transitioned_in(0));
        node.transition(NodeState::Generating, 3);
        assert!(node.transitioned_in(3));
        assert!(!node.transitioned_in(4));
    }

    #[test]
    fn test_settling_states() {
        let settling = [
            NodeState::Initial,
            NodeState::Generating,
            NodeState::Ready,
            NodeState::Waiting,
            NodeState::Splitting,
        ];
        for state in settling {
            assert!(state.is_settling(), "{state:?}");
        }
        assert!(!NodeState::Active.is_settling());
        assert!(!NodeState::Split.is_settling());
        assert!(NodeState::Splitting.has_children());
        assert!(!NodeState::Waiting.has_children());
    }
}
