//! Bevy systems driving the registry, scanner and partition engine.

use bevy::prelude::*;

use super::config::ZoneConfig;
use super::events::{BlockChanged, ColumnLoaded, WorldChanged};
use super::registry::{PortalRegistry, PortalStore};
use super::scanner::PortalScanner;
use super::world::ActiveWorld;
use super::zones::{ZonePartition, ZoneRendererSlot, ZoneViewer};

// ============================================================================
// Startup
// ============================================================================

/// Creates the registry, scanner and partition from the loaded config.
///
/// Runs after [`super::config::load_zone_config`]. If the host already
/// installed a world, its registry is loaded right away.
pub fn setup_portal_resources(mut commands: Commands, config: Res<ZoneConfig>, active: Res<ActiveWorld>) {
    let mut registry = PortalRegistry::new().with_removal_policy(config.remove_without_world);
    let mut partition = ZonePartition::from_config(&config);
    partition.attach(&mut registry);

    if active.get().is_some() {
        registry.set_store(Some(PortalStore::new(config.storage_path(&active.save_name))));
        registry.load();
    }

    info!(
        "Portal zones ready: {} links, {} scans/tick, {} groups/frame",
        config.links.len(),
        config.scans_per_tick,
        config.groups_per_frame
    );

    commands.insert_resource(PortalScanner::from_config(&config));
    commands.insert_resource(partition);
    commands.insert_resource(registry);
}

/// Applies the configured scanner tick rate to the fixed timestep.
pub fn apply_tick_rate(mut fixed_time: ResMut<Time<Fixed>>, config: Res<ZoneConfig>) {
    fixed_time.set_timestep_hz(config.tick_rate);
    info!("Portal scanner tick rate {} Hz", config.tick_rate);
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Saves, clears or loads the registry as the host enters and leaves worlds.
pub fn handle_world_changes(
    mut events: MessageReader<WorldChanged>,
    config: Res<ZoneConfig>,
    active: Res<ActiveWorld>,
    mut registry: ResMut<PortalRegistry>,
    mut scanner: ResMut<PortalScanner>,
    mut partition: ResMut<ZonePartition>,
) {
    for event in events.read() {
        match (&event.previous, &event.current) {
            (Some(previous), None) => {
                info!("Left {}: saving {} portals", previous, registry.len());
                registry.save();
                registry.clear();
                registry.set_store(None);
                scanner.reset();
                partition.reset();
            }
            (None, Some(current)) => {
                let path = config.storage_path(&active.save_name);
                info!("Joined {} (store {})", current, path.display());
                registry.set_store(Some(PortalStore::new(path)));
                scanner.reset();
                registry.load();
            }
            (Some(previous), Some(current)) => {
                debug!("Dimension change {} -> {}", previous, current);
                scanner.reset();
            }
            (None, None) => {}
        }
    }
}

/// Writes pending registry changes when the app shuts down.
pub fn save_on_exit(mut exits: MessageReader<AppExit>, registry: Option<ResMut<PortalRegistry>>) {
    if exits.read().next().is_none() {
        return;
    }
    if let Some(mut registry) = registry {
        if registry.save() {
            info!("Saved {} portals on exit", registry.len());
        }
    }
}

// ============================================================================
// Detection
// ============================================================================

pub fn queue_loaded_columns(
    mut events: MessageReader<ColumnLoaded>,
    registry: Res<PortalRegistry>,
    mut scanner: ResMut<PortalScanner>,
) {
    for ColumnLoaded(column) in events.read() {
        scanner.on_column_loaded(*column, &registry);
    }
}

pub fn queue_block_changes(
    mut events: MessageReader<BlockChanged>,
    active: Res<ActiveWorld>,
    registry: Res<PortalRegistry>,
    mut scanner: ResMut<PortalScanner>,
) {
    let Some(dimension) = active.dimension().cloned() else {
        events.clear();
        return;
    };
    for event in events.read() {
        scanner.on_block_changed(&dimension, event.cell, event.is_marker, &registry);
    }
}

/// Scans the next queued columns. Runs on the fixed tick.
pub fn run_portal_scanner(
    active: Res<ActiveWorld>,
    mut registry: ResMut<PortalRegistry>,
    mut scanner: ResMut<PortalScanner>,
) {
    if scanner.pending() == 0 {
        return;
    }
    let report = scanner.tick(active.get(), &mut registry);
    if report.added + report.moved + report.removed > 0 {
        debug!(
            "Scanned {} columns: {} detections, +{} ~{} -{}",
            report.columns_scanned, report.detections, report.added, report.moved, report.removed
        );
    }
}

// ============================================================================
// Partition & rendering
// ============================================================================

pub fn update_zone_partition(
    registry: Res<PortalRegistry>,
    active: Res<ActiveWorld>,
    viewer: Option<Res<ZoneViewer>>,
    mut partition: ResMut<ZonePartition>,
) {
    partition.update(&registry, active.get(), viewer.as_deref());
}

/// Hands dirty zone geometry to the installed renderer, if any.
pub fn submit_zone_geometry(
    registry: Res<PortalRegistry>,
    mut slot: ResMut<ZoneRendererSlot>,
    mut partition: ResMut<ZonePartition>,
) {
    let Some(renderer) = slot.0.as_deref_mut() else {
        return;
    };
    let submitted = partition.render_pass(renderer, registry.settings().render_style());
    if submitted > 0 {
        debug!("Submitted {} zone meshes", submitted);
    }
}
