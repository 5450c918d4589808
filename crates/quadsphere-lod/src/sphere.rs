//! The six face roots of one sphere and the per-tick driver.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use glam::DVec3;
use quadsphere_config::{LiveConfig, WorkerConfig};
use quadsphere_cubesphere::{CubeFace, PatchResolution};

use crate::worker::MeshWorker;
use crate::{
    LodError, LodNode, LodTree, NodeId, NodeState, RenderHost, SubdivisionCriterion, TickContext,
    TickReport,
};

/// A second set of roots being built at a new mesh resolution.
#[derive(Clone, Copy, Debug)]
struct Rebuild {
    roots: [NodeId; 6],
    resolution: PatchResolution,
}

/// A level-of-detail cube sphere: six face quadtrees sharing one mesh worker.
///
/// Drive it with [`tick`](Self::tick) once per frame and finish with
/// [`shutdown`](Self::shutdown). Settings are read from the shared
/// [`LiveConfig`] at the start of every tick.
///
/// ```no_run
/// use std::sync::Arc;
/// use glam::DVec3;
/// use quadsphere_config::{LiveConfig, LodConfig, WorkerConfig};
/// use quadsphere_lod::{CubeSphere, HeadlessHost};
///
/// let config = Arc::new(LiveConfig::from_config(&LodConfig::default())?);
/// let mut sphere = CubeSphere::initialize(config, &WorkerConfig::default())?;
/// let mut host = HeadlessHost::new();
/// for _ in 0..100 {
///     sphere.tick(DVec3::new(0.0, 0.0, 2.0), &mut host)?;
/// }
/// sphere.shutdown(&mut host);
/// # Ok::<(), quadsphere_lod::LodError>(())
/// ```
#[derive(Debug)]
pub struct CubeSphere {
    tree: LodTree,
    roots: [NodeId; 6],
    resolution: PatchResolution,
    rebuild: Option<Rebuild>,
    config: Arc<LiveConfig>,
    resolution_rx: Receiver<u32>,
    observer: DVec3,
    origin: DVec3,
    shut_down: bool,
}

impl CubeSphere {
    /// Start the mesh worker and create the six face roots.
    pub fn initialize(config: Arc<LiveConfig>, worker: &WorkerConfig) -> Result<Self, LodError> {
        let worker = MeshWorker::spawn(worker.poll_interval()?)?;
        Self::with_worker(config, worker)
    }

    pub(crate) fn with_worker(config: Arc<LiveConfig>, worker: MeshWorker) -> Result<Self, LodError> {
        let settings = config.snapshot();
        let resolution = PatchResolution::new(settings.mesh_resolution)?;
        let resolution_rx = config.subscribe_resolution();

        let mut tree = LodTree::new(worker);
        let roots = CubeFace::ALL.map(|face| tree.insert_root(face, resolution));

        tracing::info!(
            max_depth = settings.max_depth,
            max_distance = settings.max_distance,
            mesh_resolution = settings.mesh_resolution,
            "cube sphere initialized"
        );

        Ok(Self {
            tree,
            roots,
            resolution,
            rebuild: None,
            config,
            resolution_rx,
            observer: DVec3::ZERO,
            origin: DVec3::ZERO,
            shut_down: false,
        })
    }

    /// Advance every face by one tick.
    ///
    /// Finished meshes are moved into their nodes, then each face root and
    /// its subtree step once, then roots that are uploaded are shown.
    pub fn tick(&mut self, observer: DVec3, host: &mut dyn RenderHost) -> Result<TickReport, LodError> {
        if self.shut_down {
            return Err(LodError::WorkerShutDown);
        }
        self.observer = observer;

        let settings = self.config.snapshot();
        let mut ctx = TickContext {
            criterion: SubdivisionCriterion::new(&settings, self.origin),
            observer,
            resolution: PatchResolution::new(settings.mesh_resolution)?,
            host,
            report: TickReport::default(),
        };

        self.tree.begin_tick(&mut ctx.report);
        self.track_resolution(&mut ctx);

        let mut updating = false;
        for root in self.roots {
            updating |= self.tree.tick_subtree(root, &mut ctx)?;
        }
        if let Some(rebuild) = self.rebuild {
            for root in rebuild.roots {
                self.tree.tick_subtree(root, &mut ctx)?;
            }
            updating = true;
        }
        for root in self.roots {
            self.tree.activate(root, &mut ctx);
        }

        ctx.report.is_updating = updating;
        tracing::trace!(tick = self.tree.current_tick(), report = ?ctx.report, "tick");
        Ok(ctx.report)
    }

    /// Destroy every face, releasing drawables on `host`, then stop the worker.
    ///
    /// Ticking afterwards fails with [`LodError::WorkerShutDown`]. Calling
    /// it again is a no-op.
    pub fn shutdown(&mut self, host: &mut dyn RenderHost) {
        if self.shut_down {
            return;
        }
        let mut removed = 0;
        for root in self.roots {
            removed += self.tree.destroy_subtree(root, host);
        }
        if let Some(rebuild) = self.rebuild.take() {
            for root in rebuild.roots {
                removed += self.tree.destroy_subtree(root, host);
            }
        }
        self.tree.worker_mut().shutdown();
        self.shut_down = true;
        tracing::info!(removed, "cube sphere shut down");
    }

    /// Start, restart or cancel a rebuild when the configured resolution
    /// differs from the one being shown or built, and swap in a finished
    /// rebuild.
    ///
    /// The decision compares against the tick's snapshot every tick, so a
    /// change published after the snapshot was taken is picked up on the
    /// next tick even though its notification was already drained.
    fn track_resolution(&mut self, ctx: &mut TickContext<'_>) {
        for resolution in self.resolution_rx.try_iter() {
            tracing::debug!(resolution, "mesh resolution change received");
        }
        let target = ctx.resolution;
        let building = self.rebuild.map_or(self.resolution, |r| r.resolution);
        if target != building {
            self.retarget(target, ctx);
        }

        let Some(rebuild) = self.rebuild else {
            return;
        };
        let ready = rebuild.roots.iter().all(|&root| {
            self.tree
                .node(root)
                .is_some_and(|node| node.state() == NodeState::Waiting)
        });
        if !ready {
            return;
        }

        let mut removed = 0;
        for root in self.roots {
            removed += self.tree.destroy_subtree(root, &mut *ctx.host);
        }
        for root in rebuild.roots {
            self.tree.activate(root, ctx);
        }
        self.roots = rebuild.roots;
        self.resolution = rebuild.resolution;
        self.rebuild = None;
        tracing::info!(
            resolution = rebuild.resolution.get(),
            removed,
            "faces swapped to new mesh resolution"
        );
    }

    fn retarget(&mut self, target: PatchResolution, ctx: &mut TickContext<'_>) {
        if let Some(stale) = self.rebuild.take() {
            for root in stale.roots {
                self.tree.destroy_subtree(root, &mut *ctx.host);
            }
        }
        if target == self.resolution {
            return;
        }
        let roots = CubeFace::ALL.map(|face| self.tree.insert_root(face, target));
        self.rebuild = Some(Rebuild {
            roots,
            resolution: target,
        });
        tracing::info!(
            from = self.resolution.get(),
            to = target.get(),
            "rebuilding faces at new mesh resolution"
        );
    }

    /// Root node of `face`.
    pub fn root(&self, face: CubeFace) -> NodeId {
        self.roots[face.index()]
    }

    pub fn node(&self, id: NodeId) -> Option<&LodNode> {
        self.tree.node(id)
    }

    /// Every visible node, across all faces.
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        self.tree.visible_nodes().collect()
    }

    /// Live nodes, hidden and rebuilding ones included.
    pub fn node_count(&self) -> usize {
        self.tree.len()
    }

    /// Whether any face changed during the last tick or is still settling.
    pub fn is_updating(&self) -> bool {
        self.rebuild.is_some()
            || self
                .roots
                .iter()
                .any(|&root| self.tree.node(root).is_none_or(LodNode::is_updating))
    }

    /// Whether a resolution rebuild is in progress.
    pub fn is_rebuilding(&self) -> bool {
        self.rebuild.is_some()
    }

    /// Mesh resolution of the visible faces.
    pub fn resolution(&self) -> PatchResolution {
        self.resolution
    }

    /// Observer position from the last tick.
    pub fn observer(&self) -> DVec3 {
        self.observer
    }

    /// Sphere centre in world space.
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    pub fn set_origin(&mut self, origin: DVec3) {
        self.origin = origin;
    }

    pub fn config(&self) -> &Arc<LiveConfig> {
        &self.config
    }

    pub fn pending_requests(&self) -> usize {
        self.tree.worker().pending_count()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    #[cfg(test)]
    pub(crate) fn tree(&self) -> &LodTree {
        &self.tree
    }
}

impl Drop for CubeSphere {
    fn drop(&mut self) {
        if !self.shut_down {
            self.tree.worker_mut().shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessHost;
    use quadsphere_config::LodConfig;
    use std::time::{Duration, Instant};

    fn live(max_depth: u32, max_distance: f64) -> Arc<LiveConfig> {
        Arc::new(
            LiveConfig::from_config(&LodConfig {
                max_depth,
                max_distance,
                mesh_resolution: 3,
                ..LodConfig::default()
            })
            .unwrap(),
        )
    }

    fn inline_sphere(config: Arc<LiveConfig>) -> CubeSphere {
        CubeSphere::with_worker(config, MeshWorker::inline()).unwrap()
    }

    /// Tick, then let the inline worker finish everything queued.
    fn step(sphere: &mut CubeSphere, observer: DVec3, host: &mut HeadlessHost) -> TickReport {
        let report = sphere.tick(observer, host).unwrap();
        sphere.tree().worker().run_pending();
        report
    }

    fn settle(sphere: &mut CubeSphere, observer: DVec3, host: &mut HeadlessHost) {
        for _ in 0..64 {
            let report = step(sphere, observer, host);
            if report.transitions == 0 && !report.is_updating && sphere.pending_requests() == 0 {
                return;
            }
        }
        panic!("sphere did not settle");
    }

    /// Visible nodes on each root-to-leaf path.
    fn visible_on_paths(sphere: &CubeSphere, id: NodeId, above: usize, out: &mut Vec<usize>) {
        let node = sphere.node(id).unwrap();
        let here = above + usize::from(node.is_visible());
        match node.children() {
            Some(children) => {
                for child in children {
                    visible_on_paths(sphere, child, here, out);
                }
            }
            None => out.push(here),
        }
    }

    fn assert_one_visible_per_path(sphere: &CubeSphere) {
        for face in CubeFace::ALL {
            let mut counts = Vec::new();
            visible_on_paths(sphere, sphere.root(face), 0, &mut counts);
            assert!(
                counts.iter().all(|&c| c == 1),
                "{face:?}: visible nodes per path {counts:?}"
            );
        }
    }

    #[test]
    fn test_initialize_creates_six_hidden_roots() {
        let sphere = inline_sphere(live(3, 1.0));
        assert_eq!(sphere.node_count(), 6);
        for face in CubeFace::ALL {
            let root = sphere.node(sphere.root(face)).unwrap();
            assert_eq!(root.state(), NodeState::Initial);
            assert_eq!(root.face(), face);
            assert_eq!(root.depth(), 0);
            assert_eq!(root.params().side_length, 2.0);
        }
        assert!(sphere.visible_nodes().is_empty());
    }

    #[test]
    fn test_max_depth_zero_never_splits() {
        let mut sphere = inline_sphere(live(0, f64::MAX));
        let mut host = HeadlessHost::new();
        for _ in 0..20 {
            let report = step(&mut sphere, DVec3::new(0.0, 0.0, 1.0), &mut host);
            assert_eq!(report.splits, 0);
        }
        assert_eq!(sphere.node_count(), 6);
        assert_eq!(host.visible_count(), 6);
        for face in CubeFace::ALL {
            assert_eq!(sphere.node(sphere.root(face)).unwrap().state(), NodeState::Active);
        }
    }

    #[test]
    fn test_far_observer_merges_back() {
        let config = live(2, 1.0);
        let mut sphere = inline_sphere(Arc::clone(&config));
        let mut host = HeadlessHost::new();
        let near = DVec3::new(0.0, 1.05, 0.0);
        settle(&mut sphere, near, &mut host);
        assert!(sphere.node_count() > 6);
        assert_one_visible_per_path(&sphere);

        config.set_max_distance(0.0).unwrap();
        let far = DVec3::new(0.0, 1000.0, 0.0);
        settle(&mut sphere, far, &mut host);
        assert_eq!(sphere.node_count(), 6);
        assert_eq!(host.visible_count(), 6);
        assert_eq!(host.resident_count(), 6);
        assert_eq!(sphere.observer(), far);
    }

    #[test]
    fn test_one_visible_node_per_path_when_quiescent() {
        let mut sphere = inline_sphere(live(3, 1.2));
        let mut host = HeadlessHost::new();
        let observers = [
            DVec3::new(1.1, 0.0, 0.0),
            DVec3::new(0.6, 0.6, 0.6),
            DVec3::new(0.0, -1.3, 0.2),
        ];
        for observer in observers {
            settle(&mut sphere, observer, &mut host);
            assert_one_visible_per_path(&sphere);
            let mut visible = sphere.visible_nodes();
            let mut hosted: Vec<_> = host.visible().collect();
            visible.sort();
            hosted.sort();
            assert_eq!(visible, hosted);
        }
    }

    #[test]
    fn test_no_face_is_ever_blank_after_first_activation() {
        let config = live(3, 1.5);
        let mut sphere = inline_sphere(Arc::clone(&config));
        let mut host = HeadlessHost::new();
        let observer = DVec3::new(0.0, 0.0, 1.2);
        settle(&mut sphere, observer, &mut host);

        for tick in 0..40 {
            if tick == 5 {
                config.set_mesh_resolution(5).unwrap();
            }
            let angle = tick as f64 * 0.2;
            let observer = DVec3::new(angle.sin() * 1.2, 0.0, angle.cos() * 1.2);
            step(&mut sphere, observer, &mut host);
            for face in CubeFace::ALL {
                let mut counts = Vec::new();
                visible_on_paths(&sphere, sphere.root(face), 0, &mut counts);
                assert!(counts.iter().all(|&c| c >= 1), "{face:?} blank at tick {tick}");
            }
        }
    }

    #[test]
    fn test_resolution_change_swaps_roots() {
        let config = live(0, 0.0);
        let mut sphere = inline_sphere(Arc::clone(&config));
        let mut host = HeadlessHost::new();
        let observer = DVec3::new(0.0, 0.0, 3.0);
        settle(&mut sphere, observer, &mut host);
        let old_roots: Vec<_> = CubeFace::ALL.iter().map(|&f| sphere.root(f)).collect();

        config.set_mesh_resolution(4).unwrap();
        let mut swapped = false;
        for _ in 0..10 {
            step(&mut sphere, observer, &mut host);
            // Six patches on screen every tick.
            assert_eq!(host.visible_count(), 6);
            if !sphere.is_rebuilding() {
                swapped = true;
                break;
            }
            assert_eq!(sphere.node_count(), 12);
        }
        assert!(swapped);
        assert_eq!(sphere.resolution().get(), 4);
        for (face, old) in CubeFace::ALL.iter().zip(old_roots) {
            let root = sphere.root(*face);
            assert_ne!(root, old);
            assert!(sphere.node(old).is_none());
            let node = sphere.node(root).unwrap();
            assert_eq!(node.state(), NodeState::Active);
            assert_eq!(node.payload().unwrap().vertices.len(), 16);
        }
        assert_eq!(host.resident_count(), 6);
    }

    #[test]
    fn test_resolution_change_back_cancels_rebuild() {
        let config = live(0, 0.0);
        let mut sphere = inline_sphere(Arc::clone(&config));
        let mut host = HeadlessHost::new();
        let observer = DVec3::new(0.0, 0.0, 3.0);
        settle(&mut sphere, observer, &mut host);

        config.set_mesh_resolution(4).unwrap();
        sphere.tick(observer, &mut host).unwrap();
        assert!(sphere.is_rebuilding());
        config.set_mesh_resolution(3).unwrap();
        let report = sphere.tick(observer, &mut host).unwrap();
        assert!(!sphere.is_rebuilding());
        assert_eq!(sphere.node_count(), 6);

        // The cancelled roots' requests are withdrawn, not generated.
        assert_eq!(sphere.pending_requests(), 0);
        assert_eq!(sphere.tree().worker().run_pending(), 0);
        let report_after = sphere.tick(observer, &mut host).unwrap();
        assert_eq!(report.stale_results + report_after.stale_results, 0);
    }

    #[test]
    fn test_resolution_change_after_snapshot_is_not_lost() {
        let config = live(0, 0.0);
        let mut sphere = inline_sphere(Arc::clone(&config));
        let mut host = HeadlessHost::new();
        let observer = DVec3::new(0.0, 0.0, 3.0);
        settle(&mut sphere, observer, &mut host);

        // The setter lands between the snapshot and the channel drain.
        let settings = config.snapshot();
        config.set_mesh_resolution(5).unwrap();
        {
            let mut ctx = TickContext {
                criterion: SubdivisionCriterion::new(&settings, sphere.origin()),
                observer,
                resolution: PatchResolution::new(settings.mesh_resolution).unwrap(),
                host: &mut host,
                report: TickReport::default(),
            };
            sphere.tree.begin_tick(&mut ctx.report);
            sphere.track_resolution(&mut ctx);
            assert!(!sphere.is_rebuilding());
        }

        for _ in 0..30 {
            step(&mut sphere, observer, &mut host);
        }
        assert_eq!(sphere.resolution().get(), 5);
        assert!(!sphere.is_rebuilding());
        for face in CubeFace::ALL {
            let node = sphere.node(sphere.root(face)).unwrap();
            assert_eq!(node.payload().unwrap().vertices.len(), 25);
        }
        assert_eq!(host.visible_count(), 6);
    }

    #[test]
    fn test_oversized_resolution_leaves_ticking_intact() {
        let config = live(0, 0.0);
        let mut sphere = inline_sphere(Arc::clone(&config));
        let mut host = HeadlessHost::new();
        let observer = DVec3::new(0.0, 0.0, 3.0);
        settle(&mut sphere, observer, &mut host);

        assert!(config.set_mesh_resolution(70_000).is_err());
        let report = step(&mut sphere, observer, &mut host);
        assert!(!report.is_updating);
        assert!(!sphere.is_rebuilding());
        assert_eq!(sphere.resolution().get(), 3);
    }

    #[test]
    fn test_upload_failure_is_reported() {
        let mut sphere = inline_sphere(live(0, 0.0));
        let mut host = HeadlessHost::new();
        host.fail_next_uploads(1);
        let observer = DVec3::new(0.0, 0.0, 3.0);
        let mut failures = 0;
        for _ in 0..4 {
            failures += step(&mut sphere, observer, &mut host).upload_failures;
        }
        assert_eq!(failures, 1);
        settle(&mut sphere, observer, &mut host);
        assert_eq!(host.visible_count(), 6);
    }

    #[test]
    fn test_shutdown_releases_and_rejects_ticks() {
        let mut sphere = inline_sphere(live(1, 10.0));
        let mut host = HeadlessHost::new();
        settle(&mut sphere, DVec3::new(0.0, 0.0, 1.1), &mut host);
        assert!(host.resident_count() > 0);

        sphere.shutdown(&mut host);
        assert_eq!(host.resident_count(), 0);
        assert_eq!(sphere.node_count(), 0);
        assert!(sphere.is_shut_down());
        assert!(matches!(
            sphere.tick(DVec3::ZERO, &mut host),
            Err(LodError::WorkerShutDown)
        ));
        sphere.shutdown(&mut host);
    }

    #[test]
    fn test_threaded_worker_end_to_end() {
        let config = live(2, 1.0);
        let worker = WorkerConfig {
            poll_interval_ms: 5,
        };
        let mut sphere = CubeSphere::initialize(config, &worker).unwrap();
        let mut host = HeadlessHost::new();
        let observer = DVec3::new(0.0, 0.0, 1.05);

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let report = sphere.tick(observer, &mut host).unwrap();
            if report.transitions == 0 && !report.is_updating && sphere.pending_requests() == 0 {
                break;
            }
            assert!(Instant::now() < deadline, "sphere did not settle");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(sphere.node_count() > 6);
        assert_one_visible_per_path(&sphere);
        sphere.shutdown(&mut host);
        assert_eq!(host.resident_count(), 0);
    }

    #[test]
    fn test_origin_offsets_distance() {
        let mut sphere = inline_sphere(live(1, 0.5));
        sphere.set_origin(DVec3::new(100.0, 0.0, 0.0));
        let mut host = HeadlessHost::new();
        // Close to +Z of a sphere at the origin, far from the offset sphere.
        settle(&mut sphere, DVec3::new(0.0, 0.0, 1.0), &mut host);
        assert_eq!(sphere.node_count(), 6);
        settle(&mut sphere, DVec3::new(100.0, 0.0, 1.0), &mut host);
        assert!(sphere.node_count() > 6);
    }
}
