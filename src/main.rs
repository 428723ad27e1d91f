use bevy::app::ScheduleRunnerPlugin;
use bevy::math::DVec3;
use bevy::prelude::*;

use portal_zones::portal::{
    compute_preview, ActiveWorld, ColumnLoaded, ColumnPos, DimensionId, Facing, PortalBounds, PortalRegistry,
    PortalScanner, PortalZonesPlugin, SparseWorld, WorldAccess, WorldChanged, ZoneConfig, ZoneDraw, ZonePartition,
    ZoneRenderer, ZoneRendererSlot, ZoneViewer,
};
use portal_zones::portal::zones::PartitionPhase;
use portal_zones::portal::types::PortalId;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const MAX_FRAMES: u32 = 5_000;
const OVERWORLD_PORTALS: usize = 6;
const NETHER_PORTALS: usize = 2;

fn setup_file_logging() -> Option<String> {
    let log_dir = PathBuf::from("logs");
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create logs directory: {}", e);
        return None;
    }

    // Keep only the most recent runs
    cleanup_old_logs(&log_dir, 25);

    let now = chrono::Local::now();
    let log_filename = format!("portal_zones_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(Rotation::NEVER, &log_dir, &log_filename);
    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bevy_ecs=info,bevy_app=info,portal_zones=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Some(log_path_str)
}

fn cleanup_old_logs(log_dir: &PathBuf, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("portal_zones") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Oldest first
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

// ============================================================================
// Synthetic worlds
// ============================================================================

/// Random 2×3 portal frames with the columns around each one loaded.
fn generate_world(rng: &mut StdRng, dimension: DimensionId, count: usize, spread: i32) -> (SparseWorld, Vec<PortalBounds>) {
    let mut world = SparseWorld::new(dimension).with_vertical_bounds(0, 127);
    let mut portals = Vec::with_capacity(count);
    for _ in 0..count {
        let x = rng.random_range(-spread..=spread);
        let y = rng.random_range(40..=90);
        let z = rng.random_range(-spread..=spread);
        let bounds = if rng.random_bool(0.5) {
            PortalBounds::new(x, y, z, x + 1, y + 2, z)
        } else {
            PortalBounds::new(x, y, z, x, y + 2, z + 1)
        };
        world.fill_markers(bounds);
        let (min, max) = (bounds.min_cell().column(), bounds.max_cell().column());
        world.load_columns(ColumnPos::new(min.x - 1, min.z - 1), ColumnPos::new(max.x + 1, max.z + 1));
        portals.push(bounds);
    }
    (world, portals)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AnnounceOverworld,
    ScanOverworld,
    ScanNether,
    Partition,
}

#[derive(Resource)]
struct Harness {
    stage: Stage,
    frame: u32,
    stage_frames: u32,
    overworld_columns: Vec<ColumnPos>,
    nether: Option<SparseWorld>,
    nether_portals: Vec<PortalBounds>,
}

/// Logs what the renderer would draw.
struct LoggingRenderer;

impl ZoneRenderer for LoggingRenderer {
    fn submit(&mut self, draw: &ZoneDraw<'_>) -> bool {
        info!(
            "Zone #{} {} ({}): {} boundary cells, color {:08X}",
            draw.index,
            draw.label,
            draw.portal_id,
            draw.cells.len(),
            draw.draw_color().0
        );
        true
    }

    fn release(&mut self, portal: PortalId) {
        debug!("Released zone of {}", portal);
    }
}

fn announce_columns(loaded: impl IntoIterator<Item = ColumnPos>, columns: &mut MessageWriter<ColumnLoaded>) -> usize {
    let mut count = 0;
    for column in loaded {
        columns.write(ColumnLoaded(column));
        count += 1;
    }
    count
}

#[allow(clippy::too_many_arguments)]
fn drive_harness(
    mut harness: ResMut<Harness>,
    mut active: ResMut<ActiveWorld>,
    mut registry: ResMut<PortalRegistry>,
    scanner: Res<PortalScanner>,
    partition: Res<ZonePartition>,
    config: Res<ZoneConfig>,
    mut viewer: ResMut<ZoneViewer>,
    mut columns: MessageWriter<ColumnLoaded>,
    mut world_changes: MessageWriter<WorldChanged>,
    mut exit: MessageWriter<AppExit>,
) {
    harness.frame += 1;
    harness.stage_frames += 1;
    if harness.frame > MAX_FRAMES {
        warn!("Harness gave up after {} frames in {:?}", MAX_FRAMES, harness.stage);
        exit.write(AppExit::error());
        return;
    }

    match harness.stage {
        Stage::AnnounceOverworld => {
            let columns_to_announce = std::mem::take(&mut harness.overworld_columns);
            let count = announce_columns(columns_to_announce, &mut columns);
            info!("Announced {} loaded columns in {:?}", count, active.dimension());
            harness.stage = Stage::ScanOverworld;
            harness.stage_frames = 0;
        }
        Stage::ScanOverworld => {
            if harness.stage_frames < 2 || scanner.pending() > 0 {
                return;
            }
            info!("Overworld scan complete: {} portals tracked", registry.len());

            let Some(nether) = harness.nether.take() else {
                exit.write(AppExit::error());
                return;
            };
            let previous = active.dimension().cloned();
            let current = nether.dimension().clone();
            let count = announce_columns(nether.loaded_columns(), &mut columns);
            active.world = Some(Box::new(nether));
            world_changes.write(WorldChanged { previous, current: Some(current.clone()) });
            info!("Switched to {} ({} columns)", current, count);

            registry.settings_mut().show_zone_borders = true;
            harness.stage = Stage::ScanNether;
            harness.stage_frames = 0;
        }
        Stage::ScanNether => {
            if harness.stage_frames < 2 || scanner.pending() > 0 {
                return;
            }
            info!("Nether scan complete: {} portals tracked", registry.len());
            if let Some(first) = harness.nether_portals.first() {
                let centre = first.min_cell();
                viewer.position = DVec3::new(centre.x as f64, centre.y as f64, centre.z as f64);
            }
            harness.stage = Stage::Partition;
            harness.stage_frames = 0;
        }
        Stage::Partition => {
            if harness.stage_frames < 2 || partition.phase() != PartitionPhase::Clean {
                return;
            }
            info!(
                "Partition clean after {} frames: {} candidates, {} work groups",
                harness.stage_frames,
                partition.candidate_count(),
                partition.work_groups().len()
            );
            for cache in partition.caches() {
                let cells = partition.boundary_cells(cache.index).map_or(0, |c| c.len());
                info!(
                    "  {} influence={:?} cells={} in_range={}",
                    cache.label, cache.influence, cells, cache.in_range
                );
            }

            if let Some(world) = active.get() {
                let preview = compute_preview(
                    &registry,
                    &config.links,
                    world.dimension(),
                    viewer.position,
                    Facing::North,
                    world.world_border(),
                    config.border_epsilon,
                );
                match preview {
                    Some(preview) => info!(
                        "Placement at {:?}: {} linked, destination {:?}, two-way {}",
                        preview.placement,
                        preview.linked.len(),
                        preview.destination,
                        preview.two_way
                    ),
                    None => info!("No link preview in {}", world.dimension()),
                }
            }
            exit.write(AppExit::Success);
        }
    }
}

fn main() {
    let log_file = setup_file_logging();
    if let Some(log_file) = &log_file {
        println!("Portal zones harness - logging to {}", log_file);
    }

    let seed = std::env::args().nth(1).and_then(|s| s.parse::<u64>().ok()).unwrap_or(7);
    let mut rng = StdRng::seed_from_u64(seed);
    let (overworld, overworld_portals) = generate_world(&mut rng, DimensionId::overworld(), OVERWORLD_PORTALS, 400);
    let (nether, nether_portals) = generate_world(&mut rng, DimensionId::nether(), NETHER_PORTALS, 50);
    info!(
        "Seed {}: {} overworld portals, {} nether portals",
        seed,
        overworld_portals.len(),
        nether_portals.len()
    );

    let overworld_columns: Vec<ColumnPos> = overworld.loaded_columns().collect();

    let config = ZoneConfig {
        scans_per_tick: 16,
        groups_per_frame: 2,
        ..ZoneConfig::default()
    };

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / 60.0))))
        .insert_resource(config)
        .insert_resource(ActiveWorld::new(overworld, "harness"))
        .insert_resource(ZoneRendererSlot::new(LoggingRenderer))
        .insert_resource(Harness {
            stage: Stage::AnnounceOverworld,
            frame: 0,
            stage_frames: 0,
            overworld_columns,
            nether: Some(nether),
            nether_portals,
        })
        .add_plugins(PortalZonesPlugin)
        .add_systems(Update, drive_harness.before(portal_zones::portal::PortalZoneSet::Lifecycle))
        .run();
}
