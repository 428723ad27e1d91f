//! Portal zone tracking.
//!
//! This module is organized into:
//! - **bounds / types / world**: value types and the world-access seam
//! - **registry**: discovered portals, settings and persistence
//! - **scanner**: column queue and marker flood fill
//! - **zones**: nearest-portal partition of the linked dimension
//! - **link**: link preview for a portal about to be built
//! - **systems**: Bevy systems wiring the above together

use bevy::prelude::*;

pub mod bounds;
pub mod config;
pub mod events;
pub mod fixed_math;
pub mod link;
pub mod registry;
pub mod scanner;
pub mod settings;
pub mod systems;
pub mod types;
pub mod world;
pub mod zones;

pub use bounds::{CellPos, ColumnPos, PortalBounds, COLUMN_SIZE};
pub use config::{DimensionLink, ZoneConfig};
pub use events::{BlockChanged, ColumnLoaded, WorldChanged};
pub use link::{compute_placement, compute_preview, find_destination, find_linked_portals, Facing, LinkPreview};
pub use registry::{Detection, PortalEntry, PortalRegistry, PortalStore, RegistryChange};
pub use scanner::PortalScanner;
pub use settings::{RenderStyle, ZoneSettings};
pub use types::{Argb, DimensionId, PortalId};
pub use world::{ActiveWorld, SparseWorld, VerticalBounds, WorldAccess, WorldBorder};
pub use zones::{ZoneDraw, ZonePartition, ZoneRenderer, ZoneRendererSlot, ZoneViewer};

/// Per-frame ordering of the portal systems in `Update`.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum PortalZoneSet {
    Lifecycle,  // World join/leave, load and save
    Detection,  // Queueing columns from host messages
    Partition,  // Budgeted zone processing
    Render,     // Handing dirty geometry to the renderer
}

/// Wires registry, scanner and partition engine into an app.
///
/// Hosts insert [`ActiveWorld`], [`ZoneViewer`] and [`ZoneRendererSlot`] as
/// they become available and report world activity through the
/// [`WorldChanged`], [`ColumnLoaded`] and [`BlockChanged`] messages.
pub struct PortalZonesPlugin;

impl Plugin for PortalZonesPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Time<Fixed>>();
        app.init_resource::<ActiveWorld>();
        app.init_resource::<ZoneViewer>();
        app.init_resource::<ZoneRendererSlot>();

        app.add_message::<WorldChanged>();
        app.add_message::<ColumnLoaded>();
        app.add_message::<BlockChanged>();

        app.configure_sets(Update, (
            PortalZoneSet::Lifecycle,
            PortalZoneSet::Detection,
            PortalZoneSet::Partition,
            PortalZoneSet::Render,
        ).chain());

        app.add_systems(Startup, (
            config::load_zone_config,
            (systems::setup_portal_resources, systems::apply_tick_rate),
        ).chain());

        app.add_systems(Update, (
            systems::handle_world_changes.in_set(PortalZoneSet::Lifecycle),
            systems::queue_loaded_columns.in_set(PortalZoneSet::Detection),
            systems::queue_block_changes.in_set(PortalZoneSet::Detection),
            systems::update_zone_partition.in_set(PortalZoneSet::Partition),
            systems::submit_zone_geometry.in_set(PortalZoneSet::Render),
        ));

        app.add_systems(FixedUpdate, systems::run_portal_scanner);
        app.add_systems(Last, systems::save_on_exit);
    }
}
