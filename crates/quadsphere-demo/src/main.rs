//! Headless demo: an observer orbits a level-of-detail cube sphere while the
//! faces split and merge around it.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p quadsphere-demo -- --ticks 1200 --max-depth 5`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::DVec3;
use quadsphere_config::{CliArgs, Config, LiveConfig};
use quadsphere_cubesphere::CubeFace;
use quadsphere_lod::{CubeSphere, HeadlessHost, LodError, TickReport};
use tracing::{debug, error, info};

/// Command-line arguments for the demo.
#[derive(Parser, Debug)]
#[command(name = "quadsphere-demo", about = "Drive a LOD cube sphere with an orbiting observer")]
struct DemoArgs {
    #[command(flatten)]
    config: CliArgs,

    /// Number of ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Fixed timestep in seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    timestep: f64,

    /// Orbit radius as a multiple of the sphere radius.
    #[arg(long, default_value_t = 1.2)]
    orbit_radius: f64,

    /// Seconds per orbit.
    #[arg(long, default_value_t = 10.0)]
    orbit_period: f64,

    /// Orbit inclination in degrees.
    #[arg(long, default_value_t = 23.5)]
    inclination: f64,

    /// Sleep for the timestep after every tick.
    #[arg(long)]
    realtime: bool,

    /// Tick at which to switch to `--new-resolution`.
    #[arg(long, requires = "new_resolution")]
    resolution_change_at: Option<u64>,

    /// Mesh resolution applied at `--resolution-change-at`.
    #[arg(long)]
    new_resolution: Option<u32>,
}

/// Observer on an inclined circular orbit around `center`.
#[derive(Clone, Copy, Debug)]
struct Orbit {
    center: DVec3,
    radius: f64,
    period: f64,
    inclination: f64,
}

impl Orbit {
    fn position(&self, time: f64) -> DVec3 {
        let angle = std::f64::consts::TAU * time / self.period;
        let flat = DVec3::new(angle.cos(), 0.0, angle.sin()) * self.radius;
        let (sin_i, cos_i) = self.inclination.sin_cos();
        self.center + DVec3::new(flat.x, flat.z * sin_i, flat.z * cos_i)
    }
}

/// Totals over a run.
#[derive(Debug, Default)]
struct Totals {
    splits: u64,
    merges: u64,
    uploads: u64,
    upload_failures: u64,
    stale_results: u64,
    peak_nodes: usize,
    settled_ticks: u64,
}

impl Totals {
    fn add(&mut self, report: &TickReport, nodes: usize) {
        self.splits += u64::from(report.splits);
        self.merges += u64::from(report.merges);
        self.uploads += u64::from(report.uploads);
        self.upload_failures += u64::from(report.upload_failures);
        self.stale_results += u64::from(report.stale_results);
        self.peak_nodes = self.peak_nodes.max(nodes);
        if !report.is_updating {
            self.settled_ticks += 1;
        }
    }
}

fn config_dir(args: &CliArgs) -> PathBuf {
    args.config.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quadsphere")
    })
}

fn run(args: &DemoArgs, config: &Config) -> Result<(), LodError> {
    let live = Arc::new(LiveConfig::from_config(&config.lod)?);
    live.on_resolution_changed(|resolution| info!(resolution, "mesh resolution changed"));

    let mut sphere = CubeSphere::initialize(Arc::clone(&live), &config.worker)?;
    let mut host = HeadlessHost::new();
    let orbit = Orbit {
        center: sphere.origin(),
        radius: args.orbit_radius * config.lod.sphere_radius,
        period: args.orbit_period,
        inclination: args.inclination.to_radians(),
    };

    let started = Instant::now();
    let mut totals = Totals::default();
    for tick in 0..args.ticks {
        if Some(tick) == args.resolution_change_at
            && let Some(resolution) = args.new_resolution
        {
            live.set_mesh_resolution(resolution)?;
        }

        let observer = orbit.position(tick as f64 * args.timestep);
        let report = sphere.tick(observer, &mut host)?;
        totals.add(&report, sphere.node_count());
        debug!(
            tick,
            nodes = sphere.node_count(),
            visible = host.visible_count(),
            pending = sphere.pending_requests(),
            splits = report.splits,
            merges = report.merges,
            uploads = report.uploads,
            updating = report.is_updating,
            "tick"
        );

        if args.realtime {
            std::thread::sleep(Duration::from_secs_f64(args.timestep));
        }
    }

    for face in CubeFace::ALL {
        let root = sphere.root(face);
        if let Some(node) = sphere.node(root) {
            debug!(?face, state = ?node.state(), "face root");
        }
    }
    info!(
        ticks = args.ticks,
        elapsed_ms = started.elapsed().as_millis() as u64,
        splits = totals.splits,
        merges = totals.merges,
        uploads = totals.uploads,
        upload_failures = totals.upload_failures,
        stale_results = totals.stale_results,
        peak_nodes = totals.peak_nodes,
        settled_ticks = totals.settled_ticks,
        visible = host.visible_count(),
        visible_triangles = host.visible_triangles(),
        "run complete"
    );

    sphere.shutdown(&mut host);
    Ok(())
}

fn main() -> ExitCode {
    let args = DemoArgs::parse();

    // Resolve config directory
    let config_dir = config_dir(&args.config);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args.config);

    let log_dir = config_dir.join("logs");
    quadsphere_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(config_dir = %config_dir.display(), "quadsphere demo starting");

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("demo failed: {e}");
            ExitCode::FAILURE
        }
    }
}
