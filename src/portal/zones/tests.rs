use super::*;
use crate::portal::bounds::PortalBounds;
use crate::portal::registry::Detection;
use crate::portal::bounds::ColumnPos;
use crate::portal::types::Argb;
use crate::portal::world::{SparseWorld, WorldBorder};

#[derive(Default)]
struct RecordingRenderer {
    submitted: Vec<(PortalId, usize, RenderStyle)>,
    released: Vec<PortalId>,
    refuse: bool,
}

impl ZoneRenderer for RecordingRenderer {
    fn submit(&mut self, draw: &ZoneDraw<'_>) -> bool {
        if self.refuse {
            return false;
        }
        self.submitted.push((draw.portal_id, draw.cells.len(), draw.style));
        true
    }

    fn release(&mut self, portal: PortalId) {
        self.released.push(portal);
    }
}

fn config(scale: f64, radius: i32) -> ZoneConfig {
    ZoneConfig {
        links: vec![DimensionLink::new(DimensionId::overworld(), DimensionId::nether(), scale, radius)],
        ..Default::default()
    }
}

fn world() -> SparseWorld {
    SparseWorld::new(DimensionId::overworld()).with_vertical_bounds(0, 7)
}

/// Registry with the given nether portals and zone borders switched on.
fn registry_with(portals: &[PortalBounds]) -> PortalRegistry {
    let mut registry = PortalRegistry::new().with_removal_policy(false);
    for bounds in portals {
        registry.update_from_detections(&DimensionId::nether(), ColumnPos::new(0, 0), &[Detection::new(*bounds)], None);
    }
    assert_eq!(registry.len(), portals.len(), "test portals must not intersect");
    registry.settings_mut().show_zone_borders = true;
    registry
}

fn engine(config: &ZoneConfig, registry: &mut PortalRegistry) -> ZonePartition {
    let mut partition = ZonePartition::from_config(config);
    partition.attach(registry);
    partition
}

fn run_until_clean(partition: &mut ZonePartition, registry: &PortalRegistry, world: &SparseWorld) -> usize {
    for frame in 1..=256 {
        partition.update(registry, Some(world), None);
        if partition.phase() == PartitionPhase::Clean {
            return frame;
        }
    }
    panic!("partition never finished");
}

fn snapshot(partition: &ZonePartition, registry: &PortalRegistry) -> Vec<(PortalId, Vec<CellPos>)> {
    registry
        .list()
        .iter()
        .map(|entry| {
            let mut cells: Vec<CellPos> =
                partition.boundary_cells_for(entry.id()).map(|s| s.iter().copied().collect()).unwrap_or_default();
            cells.sort();
            (entry.id(), cells)
        })
        .collect()
}

/// Recomputes every boundary set cell by cell with `owner_at`.
fn brute_force(partition: &ZonePartition) -> FxHashMap<PortalId, FxHashSet<CellPos>> {
    let context = partition.context().expect("context");
    let mut expected: FxHashMap<PortalId, FxHashSet<CellPos>> = FxHashMap::default();
    let Some(area) = context.influences.iter().flatten().copied().reduce(|a, b| a.union(&b)) else {
        return expected;
    };
    for cell in area.cells() {
        let Some(owner) = partition.owner_at(cell) else {
            continue;
        };
        if cell.neighbors().iter().any(|n| partition.owner_at(*n) != Some(owner)) {
            expected.entry(owner).or_default().insert(cell);
        }
    }
    expected
}

fn assert_matches_brute_force(scale: f64, radius: i32, portals: &[PortalBounds]) {
    let mut registry = registry_with(portals);
    let mut partition = engine(&config(scale, radius), &mut registry);
    let world = world();
    run_until_clean(&mut partition, &registry, &world);

    let expected = brute_force(&partition);
    for entry in registry.list() {
        let actual = partition.boundary_cells_for(entry.id()).cloned().unwrap_or_default();
        let wanted = expected.get(&entry.id()).cloned().unwrap_or_default();
        assert_eq!(actual, wanted, "scale {} radius {} portal {:?}", scale, radius, entry.bounds());
    }
}

// ----------------------------------------------------------------------------
// Geometry
// ----------------------------------------------------------------------------

#[test]
fn test_isolated_portal_boundary_shell() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    run_until_clean(&mut partition, &registry, &world());

    let cells = partition.boundary_cells(0).expect("cells");
    // Footprint x -4..=5, z -4..=4: 34 rim columns of 8 cells, 56 inner columns of 2.
    assert_eq!(cells.len(), 34 * 8 + 56 * 2);
    assert!(cells.contains(&CellPos::new(-4, 3, 0)));
    assert!(cells.contains(&CellPos::new(5, 6, 4)));
    assert!(cells.contains(&CellPos::new(0, 0, 0)));
    assert!(cells.contains(&CellPos::new(0, 7, 0)));
    assert!(!cells.contains(&CellPos::new(0, 3, 0)));
    assert!(!cells.contains(&CellPos::new(6, 3, 0)));
}

#[test]
fn test_overlapping_portals_form_one_group() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0), PortalBounds::new(6, 2, 0, 7, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    partition.update(&registry, Some(&world()), None);

    assert_eq!(partition.work_groups().len(), 1);
    assert_eq!(partition.work_groups()[0].members.as_slice(), &[0, 1]);
    assert_eq!(partition.phase(), PartitionPhase::Clean);
}

#[test]
fn test_boundaries_match_brute_force() {
    assert_matches_brute_force(1.0, 4, &[PortalBounds::new(0, 2, 0, 1, 4, 0), PortalBounds::new(6, 1, 2, 7, 3, 2)]);
    assert_matches_brute_force(0.5, 2, &[PortalBounds::new(0, 2, 0, 1, 4, 0), PortalBounds::new(3, 5, 1, 3, 6, 2)]);
    assert_matches_brute_force(2.0, 6, &[PortalBounds::new(-3, 0, -3, -2, 2, -3), PortalBounds::new(8, 4, 8, 9, 6, 8)]);
}

#[test]
fn test_group_cells_are_keyed_by_candidate_index() {
    let portals = [
        PortalBounds::new(-40, 2, 0, -39, 4, 0),
        PortalBounds::new(0, 2, 0, 1, 4, 0),
        PortalBounds::new(6, 2, 0, 7, 4, 0),
    ];
    let mut registry = registry_with(&portals);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    run_until_clean(&mut partition, &registry, &world());

    assert!(partition.work_groups().iter().any(|g| g.members.as_slice() == &[1, 2]));
    assert!(partition.boundary_cells(1).is_some_and(|c| c.contains(&CellPos::new(0, 0, 0))));
    assert!(partition.boundary_cells(2).is_some_and(|c| c.contains(&CellPos::new(7, 7, 0))));
    assert_matches_brute_force(1.0, 4, &portals);
}

#[test]
fn test_random_layouts_match_brute_force() {
    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..6 {
        let mut portals: Vec<PortalBounds> = Vec::new();
        while portals.len() < 4 {
            let x = rng.i32(-12..12);
            let y = rng.i32(0..6);
            let z = rng.i32(-12..12);
            let bounds = PortalBounds::new(x, y, z, x + rng.i32(0..2), y + rng.i32(0..2), z);
            if portals.iter().all(|p| !p.intersects(&bounds)) {
                portals.push(bounds);
            }
        }
        assert_matches_brute_force(1.0, 3, &portals);
    }
}

#[test]
fn test_cells_have_at_most_one_owner() {
    let mut registry = registry_with(&[
        PortalBounds::new(0, 2, 0, 1, 4, 0),
        PortalBounds::new(5, 2, 1, 6, 4, 1),
        PortalBounds::new(2, 5, 6, 2, 6, 7),
    ]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    run_until_clean(&mut partition, &registry, &world());

    let mut seen: FxHashMap<CellPos, PortalId> = FxHashMap::default();
    for entry in registry.list() {
        for cell in partition.boundary_cells_for(entry.id()).into_iter().flatten() {
            assert_eq!(partition.owner_at(*cell), Some(entry.id()));
            assert!(seen.insert(*cell, entry.id()).is_none(), "{:?} owned twice", cell);
        }
    }
    assert!(!seen.is_empty());
}

#[test]
fn test_rebuild_is_idempotent() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0), PortalBounds::new(5, 2, 1, 6, 4, 1)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    let world = world();
    run_until_clean(&mut partition, &registry, &world);
    let first = snapshot(&partition, &registry);

    partition.invalidation().mark(RegistryChange::Geometry);
    run_until_clean(&mut partition, &registry, &world);

    assert_eq!(snapshot(&partition, &registry), first);
}

#[test]
fn test_cells_outside_vertical_bounds_are_unowned() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    run_until_clean(&mut partition, &registry, &world());

    assert!(partition.owner_at(CellPos::new(0, 7, 0)).is_some());
    assert!(partition.owner_at(CellPos::new(0, 8, 0)).is_none());
    assert!(partition.owner_at(CellPos::new(0, -1, 0)).is_none());
}

// ----------------------------------------------------------------------------
// Nearest rule
// ----------------------------------------------------------------------------

fn candidate(bounds: PortalBounds) -> Candidate {
    Candidate::new(PortalId::new_v4(), bounds, Argb::FALLBACK, "")
}

#[test]
fn test_tie_prefers_lower_anchor_then_lower_index() {
    let high = candidate(PortalBounds::new(-1, 10, 0, -1, 12, 0));
    let low = candidate(PortalBounds::new(1, 6, 0, 1, 8, 0));
    let dest = CellPos::new(0, 8, 0);
    assert_eq!(high.distance_sq(dest), low.distance_sq(dest));

    let candidates = vec![high.clone(), low.clone()];
    for _ in 0..3 {
        assert_eq!(nearest_candidate(&candidates, [0, 1], dest, 16), Some(1));
        assert_eq!(nearest_candidate(&candidates, [1, 0], dest, 16), Some(1));
    }

    let twins = vec![candidate(PortalBounds::new(-1, 8, 0, -1, 9, 0)), candidate(PortalBounds::new(1, 8, 0, 1, 9, 0))];
    assert_eq!(nearest_candidate(&twins, [1, 0], dest, 16), Some(0));
}

#[test]
fn test_search_square_beats_raw_proximity() {
    // Three cells away horizontally but level with the point: distance 9.
    let near_but_excluded = candidate(PortalBounds::new(3, 8, 0, 3, 10, 0));
    // Straight above, ten cells up: distance 100.
    let far_but_inside = candidate(PortalBounds::new(0, 18, 0, 0, 20, 0));
    let candidates = vec![near_but_excluded, far_but_inside];
    let dest = CellPos::new(0, 8, 0);

    assert_eq!(nearest_candidate(&candidates, 0..2, dest, 2), Some(1));
    assert_eq!(nearest_candidate(&candidates, 0..2, dest, 3), Some(0));
    assert_eq!(nearest_candidate(&candidates, [0], dest, 2), None);
}

#[test]
fn test_influence_box_is_exact_preimage() {
    let border = WorldBorder::default();
    for &(scale, radius) in &[(0.125, 16), (8.0, 128), (1.0, 4), (0.5, 3), (3.0, 5)] {
        let transform = CellTransform::new(scale, border, 1.0e-5);
        for &(min, max) in &[(0i64, 1i64), (-37, -35), (101, 104)] {
            let (dest_min, dest_max) = (min - radius, max + radius);
            let (lo, hi) = transform.preimage(dest_min, dest_max).expect("preimage");
            for x in (lo - 20)..=(hi + 20) {
                let dest = transform.dest_x(x) as i64;
                let mapped_inside = dest >= dest_min && dest <= dest_max;
                assert_eq!(mapped_inside, x >= lo && x <= hi, "scale {} x {}", scale, x);
            }
        }
    }
}

#[test]
fn test_transform_clamps_to_border() {
    let border = WorldBorder { west: -100.0, east: 100.0, north: -50.0, south: 50.0 };
    let transform = CellTransform::new(8.0, border, 1.0e-5);
    assert_eq!(transform.dest_x(0), 4);
    assert_eq!(transform.dest_x(-1), -4);
    assert_eq!(transform.dest_x(50), 99);
    assert_eq!(transform.dest_x(-50), -100);
    assert_eq!(transform.dest_z(20), 49);
    assert_eq!(transform.apply(CellPos::new(1, 70, 1)), CellPos::new(12, 70, 12));
}

// ----------------------------------------------------------------------------
// Invalidation
// ----------------------------------------------------------------------------

#[test]
fn test_render_lines_toggle_is_style_only() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    let world = world();
    let mut renderer = RecordingRenderer::default();
    run_until_clean(&mut partition, &registry, &world);
    partition.render_pass(&mut renderer, registry.settings().render_style());
    let before = snapshot(&partition, &registry);
    assert!(!partition.cache(0).unwrap().is_dirty());

    registry.settings_mut().toggle_render_lines();
    partition.update(&registry, Some(&world), None);

    let cache = partition.cache(0).unwrap();
    assert_eq!(partition.phase(), PartitionPhase::Clean);
    assert_eq!(partition.pending_groups(), 0);
    assert!(cache.style_dirty);
    assert!(!cache.geometry_dirty);
    assert_eq!(snapshot(&partition, &registry), before);

    assert_eq!(partition.render_pass(&mut renderer, registry.settings().render_style()), 1);
    assert!(renderer.submitted.last().unwrap().2.lines);
}

#[test]
fn test_color_change_is_render_only() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    let world = world();
    run_until_clean(&mut partition, &registry, &world);
    partition.render_pass(&mut RecordingRenderer::default(), RenderStyle::default());

    let id = registry.list()[0].id();
    registry.set_color(id, Argb(0xFF12_3456));
    registry.set_alias(id, "Spawn");
    partition.update(&registry, Some(&world), None);

    let cache = partition.cache(0).unwrap();
    assert_eq!(cache.color, Argb(0xFF12_3456));
    assert_eq!(cache.label, "Spawn");
    assert!(cache.style_dirty);
    assert!(!cache.geometry_dirty);
    assert_eq!(partition.pending_groups(), 0);
}

#[test]
fn test_stale_cells_stay_until_their_group_is_processed() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0), PortalBounds::new(40, 2, 0, 41, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    let world = world();
    run_until_clean(&mut partition, &registry, &world);
    let second = registry.list()[1].id();
    let old_cells = partition.boundary_cells_for(second).cloned().unwrap();

    registry.set_bounds(second, PortalBounds::new(40, 2, 3, 41, 4, 3));
    partition.update(&registry, Some(&world), None);

    assert_eq!(partition.pending_groups(), 1);
    assert_eq!(partition.boundary_cells_for(second), Some(&old_cells));

    partition.update(&registry, Some(&world), None);
    let new_cells = partition.boundary_cells_for(second).unwrap();
    assert!(new_cells.contains(&CellPos::new(36, 3, 7)));
    assert!(!old_cells.contains(&CellPos::new(36, 3, 7)));
}

#[test]
fn test_removed_portal_is_dropped_and_released() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0), PortalBounds::new(40, 2, 0, 41, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    let world = world();
    let mut renderer = RecordingRenderer::default();
    run_until_clean(&mut partition, &registry, &world);
    partition.render_pass(&mut renderer, RenderStyle::default());

    let gone = registry.list()[0].id();
    registry.remove(gone);
    partition.update(&registry, Some(&world), None);
    partition.render_pass(&mut renderer, RenderStyle::default());

    assert_eq!(partition.candidate_count(), 1);
    assert!(partition.boundary_cells_for(gone).is_none());
    assert_eq!(renderer.released, vec![gone]);
}

#[test]
fn test_hiding_borders_resets_and_releases() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    let world = world();
    let mut renderer = RecordingRenderer::default();
    run_until_clean(&mut partition, &registry, &world);
    assert!(partition.has_data());

    registry.settings_mut().show_zone_borders = false;
    partition.update(&registry, Some(&world), None);
    partition.render_pass(&mut renderer, RenderStyle::default());

    assert_eq!(partition.phase(), PartitionPhase::Inactive);
    assert!(!partition.has_data());
    assert_eq!(renderer.released.len(), 1);

    registry.settings_mut().show_zone_borders = true;
    run_until_clean(&mut partition, &registry, &world);
    assert!(partition.has_data());
}

#[test]
fn test_unsupported_dimension_and_missing_world_are_inactive() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);

    let end = SparseWorld::new(DimensionId::new("minecraft:the_end"));
    partition.update(&registry, Some(&end), None);
    assert_eq!(partition.phase(), PartitionPhase::Inactive);

    partition.update(&registry, None, None);
    assert_eq!(partition.phase(), PartitionPhase::Inactive);
    assert!(!partition.has_data());
}

#[test]
fn test_empty_registry_has_no_work() {
    let mut registry = registry_with(&[]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    partition.update(&registry, Some(&world()), None);

    assert_eq!(partition.phase(), PartitionPhase::Clean);
    assert_eq!(partition.candidate_count(), 0);
    assert_eq!(partition.pending_groups(), 0);
    assert!(!partition.has_data());
}

#[test]
fn test_budget_limits_groups_per_update() {
    let portals: Vec<PortalBounds> = (0..5).map(|i| PortalBounds::new(i * 40, 2, 0, i * 40 + 1, 4, 0)).collect();
    let mut registry = registry_with(&portals);
    let mut partition = engine(&config(1.0, 4), &mut registry);

    assert_eq!(run_until_clean(&mut partition, &registry, &world()), 5);

    let mut fast = engine(&ZoneConfig { groups_per_frame: 2, ..config(1.0, 4) }, &mut registry);
    assert_eq!(run_until_clean(&mut fast, &registry, &world()), 3);
}

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

#[test]
fn test_range_culling_keeps_cells() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    let world = world();
    let mut renderer = RecordingRenderer::default();
    let far = ZoneViewer::new(bevy::math::DVec3::new(10_000.0, 64.0, 0.0), 2);
    run_until_clean(&mut partition, &registry, &world);
    partition.update(&registry, Some(&world), Some(&far));

    assert!(!partition.cache(0).unwrap().in_range);
    assert_eq!(partition.render_pass(&mut renderer, RenderStyle::default()), 0);
    assert!(partition.has_data());

    // 2 chunks * 16 * 2.0 = 64 cells of range; the footprint ends at x = 5.
    let near = ZoneViewer::new(bevy::math::DVec3::new(69.0, 64.0, 0.0), 2);
    partition.update(&registry, Some(&world), Some(&near));
    assert!(partition.cache(0).unwrap().in_range);
    assert_eq!(partition.render_pass(&mut renderer, RenderStyle::default()), 1);
}

#[test]
fn test_refused_submit_is_retried() {
    let mut registry = registry_with(&[PortalBounds::new(0, 2, 0, 1, 4, 0)]);
    let mut partition = engine(&config(1.0, 4), &mut registry);
    run_until_clean(&mut partition, &registry, &world());

    let mut renderer = RecordingRenderer { refuse: true, ..Default::default() };
    assert_eq!(partition.render_pass(&mut renderer, RenderStyle::default()), 0);
    assert!(partition.cache(0).unwrap().geometry_dirty);

    renderer.refuse = false;
    assert_eq!(partition.render_pass(&mut renderer, RenderStyle::default()), 1);
    assert_eq!(partition.render_pass(&mut renderer, RenderStyle::default()), 0);
    assert_eq!(renderer.submitted.len(), 1);
}
