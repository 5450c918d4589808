//! Node storage and the per-tick state machine.
//!
//! Every node advances at most one state per tick, parents before children,
//! so a node never becomes visible before its replacement is uploaded and a
//! node never disappears before its replacement is visible.

use glam::DVec3;
use quadsphere_cubesphere::{CubeFace, PatchParams, PatchResolution, Quadrant};

use crate::worker::{MeshWorker, PatchRequest};
use crate::{LodError, LodNode, NodeArena, NodeId, NodeState, RenderHost, SubdivisionCriterion};

/// Counters for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// State changes across all nodes, drained results included.
    pub transitions: u32,
    /// Generation requests handed to the worker.
    pub submissions: u32,
    pub uploads: u32,
    /// Uploads the render host rejected; those nodes stay `Ready`.
    pub upload_failures: u32,
    pub splits: u32,
    pub merges: u32,
    /// Worker results whose node was destroyed or no longer generating.
    pub stale_results: u32,
    /// Whether any face is still changing.
    pub is_updating: bool,
}

/// Everything a node needs during one tick.
pub struct TickContext<'a> {
    pub criterion: SubdivisionCriterion,
    pub observer: DVec3,
    /// Resolution given to requests submitted this tick.
    pub resolution: PatchResolution,
    pub host: &'a mut dyn RenderHost,
    pub report: TickReport,
}

/// All nodes of one sphere plus the worker that meshes them.
pub struct LodTree {
    nodes: NodeArena<LodNode>,
    worker: MeshWorker,
    tick: u64,
}

impl std::fmt::Debug for LodTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LodTree")
            .field("nodes", &self.nodes.len())
            .field("tick", &self.tick)
            .field("worker", &self.worker)
            .finish()
    }
}

impl LodTree {
    pub fn new(worker: MeshWorker) -> Self {
        Self {
            nodes: NodeArena::new(),
            worker,
            tick: 0,
        }
    }

    /// Create a hidden, depth-0 node covering a whole face.
    pub fn insert_root(&mut self, face: CubeFace, resolution: PatchResolution) -> NodeId {
        let id = self
            .nodes
            .insert(LodNode::new(face, PatchParams::root(face, resolution), 0));
        tracing::debug!(node = %id, ?face, "root created");
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&LodNode> {
        self.nodes.get(id)
    }

    /// Live nodes, hidden ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ticks started so far.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn worker(&self) -> &MeshWorker {
        &self.worker
    }

    pub(crate) fn worker_mut(&mut self) -> &mut MeshWorker {
        &mut self.worker
    }

    /// Handles of every visible node.
    pub fn visible_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, node)| node.visible)
            .map(|(id, _)| id)
    }

    /// Start a new tick and move finished meshes into their nodes.
    pub fn begin_tick(&mut self, report: &mut TickReport) {
        self.tick += 1;
        let tick = self.tick;
        for result in self.worker.drain_results() {
            match self.nodes.get_mut(result.node) {
                Some(node) if node.state == NodeState::Generating => {
                    node.payload = Some(result.mesh);
                    node.transition(NodeState::Ready, tick);
                    report.transitions += 1;
                }
                _ => {
                    tracing::trace!(node = %result.node, "stale patch result dropped");
                    report.stale_results += 1;
                }
            }
        }
    }

    /// Advance `id` by at most one state, then its children.
    ///
    /// Returns whether the node or anything below it is still changing.
    pub fn tick_subtree(&mut self, id: NodeId, ctx: &mut TickContext<'_>) -> Result<bool, LodError> {
        self.step(id, ctx)?;

        let mut subtree_updating = false;
        if let Some(children) = self.node(id).and_then(LodNode::children) {
            for child in children {
                subtree_updating |= self.tick_subtree(child, ctx)?;
            }
        }

        let tick = self.tick;
        let node = self.nodes.get_mut(id).ok_or(LodError::UnknownNode(id))?;
        let changed = node.transitioned_in(tick) && node.state != NodeState::Active;
        node.is_updating = node.state.is_settling() || changed || subtree_updating;
        Ok(node.is_updating)
    }

    /// Show a `Waiting` node. Any other state, or a node that already
    /// changed this tick, is left alone.
    pub fn activate(&mut self, id: NodeId, ctx: &mut TickContext<'_>) -> bool {
        let tick = self.tick;
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if node.state != NodeState::Waiting || node.transitioned_in(tick) {
            return false;
        }
        node.visible = true;
        ctx.host.set_visible(id, true);
        node.transition(NodeState::Active, tick);
        ctx.report.transitions += 1;
        true
    }

    /// Remove `id` and everything below it, releasing uploaded drawables.
    ///
    /// Returns the number of nodes removed.
    pub fn destroy_subtree(&mut self, id: NodeId, host: &mut dyn RenderHost) -> usize {
        let mut stack = vec![id];
        let mut removed = 0;
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.remove(id) else {
                continue;
            };
            if let Some(children) = node.children {
                stack.extend(children);
            }
            if node.state == NodeState::Generating {
                self.worker.cancel(id);
            }
            if node.uploaded {
                host.release(id);
            }
            removed += 1;
        }
        removed
    }

    fn step(&mut self, id: NodeId, ctx: &mut TickContext<'_>) -> Result<(), LodError> {
        let node = self.nodes.get(id).ok_or(LodError::UnknownNode(id))?;
        if node.transitioned_in(self.tick) {
            return Ok(());
        }
        match node.state {
            NodeState::Initial => self.schedule(id, ctx),
            NodeState::Ready => self.upload(id, ctx),
            NodeState::Active => self.try_split(id, ctx),
            NodeState::Splitting => self.try_finish_split(id, ctx),
            NodeState::Split => self.try_merge(id, ctx),
            NodeState::Generating | NodeState::Waiting => Ok(()),
        }
    }

    fn schedule(&mut self, id: NodeId, ctx: &mut TickContext<'_>) -> Result<(), LodError> {
        let tick = self.tick;
        let node = self.nodes.get_mut(id).ok_or(LodError::UnknownNode(id))?;
        let params = PatchParams {
            resolution: ctx.resolution,
            ..node.params
        };
        if let Err(err) = self.worker.submit(PatchRequest { node: id, params }) {
            tracing::error!(node = %id, error = %err, "patch request rejected");
            return Err(err);
        }
        node.params = params;
        node.transition(NodeState::Generating, tick);
        ctx.report.submissions += 1;
        ctx.report.transitions += 1;
        Ok(())
    }

    fn upload(&mut self, id: NodeId, ctx: &mut TickContext<'_>) -> Result<(), LodError> {
        let tick = self.tick;
        let node = self.nodes.get_mut(id).ok_or(LodError::UnknownNode(id))?;
        let mesh = node.payload.as_ref().ok_or(LodError::MissingPayload(id))?;
        match ctx.host.upload(id, mesh) {
            Ok(()) => {
                node.uploaded = true;
                node.transition(NodeState::Waiting, tick);
                ctx.report.uploads += 1;
                ctx.report.transitions += 1;
            }
            Err(err) => {
                tracing::warn!(node = %id, error = %err, "patch upload failed");
                ctx.report.upload_failures += 1;
            }
        }
        Ok(())
    }

    fn try_split(&mut self, id: NodeId, ctx: &mut TickContext<'_>) -> Result<(), LodError> {
        let node = self.nodes.get(id).ok_or(LodError::UnknownNode(id))?;
        let distance = ctx.criterion.distance_to(&node.params, ctx.observer);
        if !ctx.criterion.can_recurse(node.depth, distance) {
            return Ok(());
        }

        let (face, params, depth) = (node.face, node.params, node.depth);
        let children = Quadrant::ALL
            .map(|quadrant| self.nodes.insert(LodNode::new(face, params.child(quadrant), depth + 1)));

        let tick = self.tick;
        let node = self.nodes.get_mut(id).ok_or(LodError::UnknownNode(id))?;
        node.children = Some(children);
        node.transition(NodeState::Splitting, tick);
        ctx.report.splits += 1;
        ctx.report.transitions += 1;
        tracing::debug!(node = %id, depth, distance, "split");
        Ok(())
    }

    fn try_finish_split(&mut self, id: NodeId, ctx: &mut TickContext<'_>) -> Result<(), LodError> {
        let tick = self.tick;
        let children = self.children_of(id)?;
        let all_waiting = children.iter().all(|&child| {
            self.nodes
                .get(child)
                .is_some_and(|c| c.state == NodeState::Waiting && !c.transitioned_in(tick))
        });
        if !all_waiting {
            return Ok(());
        }

        for child in children {
            self.activate(child, ctx);
        }
        let node = self.nodes.get_mut(id).ok_or(LodError::UnknownNode(id))?;
        node.visible = false;
        ctx.host.set_visible(id, false);
        node.transition(NodeState::Split, tick);
        ctx.report.transitions += 1;
        Ok(())
    }

    fn try_merge(&mut self, id: NodeId, ctx: &mut TickContext<'_>) -> Result<(), LodError> {
        let node = self.nodes.get(id).ok_or(LodError::UnknownNode(id))?;
        let distance = ctx.criterion.distance_to(&node.params, ctx.observer);
        if !ctx.criterion.should_merge(node.depth, distance) {
            return Ok(());
        }
        let depth = node.depth;
        let children = self.children_of(id)?;
        let all_active = children.iter().all(|&child| {
            self.nodes
                .get(child)
                .is_some_and(|c| c.state == NodeState::Active)
        });
        if !all_active {
            return Ok(());
        }

        let tick = self.tick;
        let node = self.nodes.get_mut(id).ok_or(LodError::UnknownNode(id))?;
        node.children = None;
        node.visible = true;
        ctx.host.set_visible(id, true);
        node.transition(NodeState::Active, tick);
        for child in children {
            self.destroy_subtree(child, &mut *ctx.host);
        }
        ctx.report.merges += 1;
        ctx.report.transitions += 1;
        tracing::debug!(node = %id, depth, distance, "merge");
        Ok(())
    }

    fn children_of(&self, id: NodeId) -> Result<[NodeId; 4], LodError> {
        let node = self.nodes.get(id).ok_or(LodError::UnknownNode(id))?;
        node.children
            .ok_or(LodError::MissingChildren(id, node.state))
    }
}
