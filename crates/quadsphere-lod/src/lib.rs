//! Level-of-detail cube sphere: six face quadtrees that split and merge
//! around an observer, with patch meshes generated on a background worker.
//!
//! [`CubeSphere`] is the entry point. Nodes live in a generational arena and
//! advance through [`NodeState`] one step per tick; drawables are handed to a
//! [`RenderHost`].

mod arena;
mod criterion;
mod error;
mod host;
mod node;
mod quadtree;
mod sphere;
mod worker;

pub use arena::{NodeArena, NodeId};
pub use criterion::SubdivisionCriterion;
pub use error::LodError;
pub use host::{HeadlessHost, RenderHost, ResidentPatch};
pub use node::{LodNode, NodeState};
pub use quadtree::{LodTree, TickContext, TickReport};
pub use sphere::CubeSphere;
pub use worker::{MeshWorker, PatchRequest, PatchResult, WORKER_THREAD_NAME};
