//! LOD engine error types.

use quadsphere_config::ConfigError;
use quadsphere_cubesphere::GeometryError;

use crate::{NodeId, NodeState};

/// Errors raised by the quadtree, the mesh worker, or a render host.
#[derive(Debug, thiserror::Error)]
pub enum LodError {
    /// A node was submitted while an earlier request for it is still queued
    /// or in flight.
    #[error("node {0} already has a pending generation request")]
    AlreadyPending(NodeId),

    /// The mesh worker no longer accepts requests.
    #[error("mesh worker has shut down")]
    WorkerShutDown,

    /// The OS refused to start the worker thread.
    #[error("failed to spawn mesh worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The handle does not refer to a live node.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A node reached `Ready` without generated geometry.
    #[error("node {0} is ready without a payload")]
    MissingPayload(NodeId),

    /// A node in a split state has no children.
    #[error("node {0} is {1:?} without children")]
    MissingChildren(NodeId, NodeState),

    /// The render host could not build a drawable for a patch.
    #[error("render host rejected patch {node}: {reason}")]
    Upload { node: NodeId, reason: String },

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
