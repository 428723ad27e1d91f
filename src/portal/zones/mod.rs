//! Zone partition engine.
//!
//! Partitions the volume around the viewer's dimension into the regions owned
//! by each portal of the linked dimension, keeping only the boundary cells of
//! each region. Work is split into groups of mutually overlapping portals and
//! a fixed number of groups is processed per call to [`ZonePartition::update`],
//! so a large registry never stalls a frame. Results of groups not yet
//! reprocessed stay valid and renderable in the meantime.

pub mod cache;
pub mod context;
pub mod groups;
pub mod process;

pub use cache::{PortalRenderCache, ZoneDraw, ZoneRenderer, ZoneRendererSlot, ZoneViewer};
pub use context::{nearest_candidate, Candidate, CellTransform, PartitionContext};
pub use groups::{build_work_groups, WorkGroup};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bevy::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use super::bounds::CellPos;
use super::config::{DimensionLink, ZoneConfig};
use super::registry::{ListenerId, PortalRegistry, RegistryChange};
use super::settings::{RenderStyle, ZoneSettings};
use super::types::{DimensionId, PortalId};
use super::world::WorldAccess;
use crate::profile_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PartitionPhase {
    /// Borders hidden, no world, or no link for the world's dimension.
    #[default]
    Inactive,
    ContextDirty,
    GroupsPending,
    Clean,
}

/// Flags raised by the registry listener and consumed by the next update.
#[derive(Debug, Default)]
pub struct Invalidation {
    geometry: AtomicBool,
    render: AtomicBool,
}

impl Invalidation {
    pub fn mark(&self, change: RegistryChange) {
        match change {
            RegistryChange::Geometry => self.geometry.store(true, Ordering::Release),
            RegistryChange::RenderOnly => self.render.store(true, Ordering::Release),
        }
    }

    fn take(&self) -> (bool, bool) {
        (self.geometry.swap(false, Ordering::AcqRel), self.render.swap(false, Ordering::AcqRel))
    }
}

#[derive(Resource)]
pub struct ZonePartition {
    phase: PartitionPhase,
    context: Option<PartitionContext>,
    groups: Vec<WorkGroup>,
    next_group: usize,
    cells: FxHashMap<PortalId, FxHashSet<CellPos>>,
    caches: Vec<PortalRenderCache>,
    pending_releases: Vec<PortalId>,
    invalidation: Arc<Invalidation>,
    listener: Option<ListenerId>,
    last_settings: ZoneSettings,
    last_dimension: Option<DimensionId>,
    links: Vec<DimensionLink>,
    groups_per_frame: usize,
    border_epsilon: f64,
    render_range_multiplier: f64,
    frame: u64,
}

impl Default for ZonePartition {
    fn default() -> Self {
        Self::from_config(&ZoneConfig::default())
    }
}

impl ZonePartition {
    pub fn from_config(config: &ZoneConfig) -> Self {
        Self {
            phase: PartitionPhase::Inactive,
            context: None,
            groups: Vec::new(),
            next_group: 0,
            cells: FxHashMap::default(),
            caches: Vec::new(),
            pending_releases: Vec::new(),
            invalidation: Arc::new(Invalidation::default()),
            listener: None,
            last_settings: ZoneSettings::default(),
            last_dimension: None,
            links: config.links.clone(),
            groups_per_frame: config.groups_per_frame.max(1),
            border_epsilon: config.border_epsilon,
            render_range_multiplier: config.render_range_multiplier,
            frame: 0,
        }
    }

    /// Subscribes to registry changes. Calling it again replaces the old subscription.
    pub fn attach(&mut self, registry: &mut PortalRegistry) {
        self.detach(registry);
        let invalidation = self.invalidation.clone();
        self.listener = Some(registry.subscribe(move |change| invalidation.mark(change)));
        self.invalidation.mark(RegistryChange::Geometry);
    }

    pub fn detach(&mut self, registry: &mut PortalRegistry) {
        if let Some(id) = self.listener.take() {
            registry.unsubscribe(id);
        }
    }

    pub fn invalidation(&self) -> Arc<Invalidation> {
        self.invalidation.clone()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn phase(&self) -> PartitionPhase {
        self.phase
    }

    pub fn context(&self) -> Option<&PartitionContext> {
        self.context.as_ref()
    }

    pub fn candidate_count(&self) -> usize {
        self.context.as_ref().map_or(0, PartitionContext::len)
    }

    pub fn pending_groups(&self) -> usize {
        self.groups.len().saturating_sub(self.next_group)
    }

    pub fn work_groups(&self) -> &[WorkGroup] {
        &self.groups
    }

    pub fn has_data(&self) -> bool {
        self.cells.values().any(|cells| !cells.is_empty())
    }

    pub fn boundary_cells(&self, index: usize) -> Option<&FxHashSet<CellPos>> {
        let id = self.caches.get(index)?.portal_id;
        self.cells.get(&id)
    }

    pub fn boundary_cells_for(&self, id: PortalId) -> Option<&FxHashSet<CellPos>> {
        self.cells.get(&id)
    }

    pub fn cache(&self, index: usize) -> Option<&PortalRenderCache> {
        self.caches.get(index)
    }

    pub fn caches(&self) -> &[PortalRenderCache] {
        &self.caches
    }

    /// Owner of a source cell under the current context.
    pub fn owner_at(&self, cell: CellPos) -> Option<PortalId> {
        let context = self.context.as_ref()?;
        context.owner_at(cell).map(|index| context.candidates[index].id)
    }

    fn link_from(&self, dimension: &DimensionId) -> Option<&DimensionLink> {
        self.links.iter().find(|link| &link.from == dimension)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Advances the partition by one frame's budget.
    pub fn update(&mut self, registry: &PortalRegistry, world: Option<&dyn WorldAccess>, viewer: Option<&ZoneViewer>) {
        self.frame += 1;
        let settings = *registry.settings();
        let (geometry_changed, render_changed) = self.invalidation.take();

        let active = world
            .filter(|_| settings.show_zone_borders)
            .and_then(|world| self.link_from(world.dimension()).cloned().map(|link| (world, link)));
        let Some((world, link)) = active else {
            if self.phase != PartitionPhase::Inactive {
                info!(
                    "Zone borders inactive (show={}, world={})",
                    settings.show_zone_borders,
                    world.map_or_else(|| "<none>".to_string(), |w| w.dimension().to_string())
                );
                self.reset();
            }
            self.last_settings = settings;
            return;
        };

        if self.phase == PartitionPhase::Inactive {
            info!("Zone borders active in {} (linked to {})", link.from, link.to);
            self.phase = PartitionPhase::ContextDirty;
        }
        if geometry_changed {
            self.phase = PartitionPhase::ContextDirty;
        }

        self.apply_style_changes(&settings);
        if render_changed && self.phase != PartitionPhase::ContextDirty {
            self.refresh_render_data(registry);
        }

        let dimension_changed = self.last_dimension.as_ref() != Some(world.dimension());
        if self.phase == PartitionPhase::ContextDirty || dimension_changed {
            self.rebuild(registry, world, &link);
        }

        self.process_groups();
        self.update_culling(viewer);
        self.last_settings = settings;
    }

    fn apply_style_changes(&mut self, settings: &ZoneSettings) {
        let last = self.last_settings;
        if settings.render_lines != last.render_lines
            || settings.render_through != last.render_through
            || settings.render_letters != last.render_letters
        {
            debug!("Zone render style changed: {:?}", settings.render_style());
            self.mark_all_style_dirty();
        }
    }

    fn mark_all_style_dirty(&mut self) {
        for cache in &mut self.caches {
            cache.style_dirty = true;
        }
    }

    /// Picks up colour and label edits without touching cell sets.
    fn refresh_render_data(&mut self, registry: &PortalRegistry) {
        let Some(context) = self.context.as_mut() else {
            return;
        };
        for (candidate, cache) in context.candidates.iter_mut().zip(self.caches.iter_mut()) {
            let Some(entry) = registry.get(candidate.id) else {
                continue;
            };
            let label = entry.label();
            if entry.color() != cache.color || label != cache.label {
                candidate.color = entry.color();
                candidate.label = label.clone();
                cache.color = entry.color();
                cache.label = label;
                cache.style_dirty = true;
            }
        }
    }

    fn rebuild(&mut self, registry: &PortalRegistry, world: &dyn WorldAccess, link: &DimensionLink) {
        let context = PartitionContext::build(registry, world, link, self.border_epsilon);

        let present: FxHashSet<PortalId> = context.candidates.iter().map(|c| c.id).collect();
        let releases = &mut self.pending_releases;
        self.cells.retain(|id, _| {
            let keep = present.contains(id);
            if !keep {
                releases.push(*id);
            }
            keep
        });

        self.caches = context
            .candidates
            .iter()
            .enumerate()
            .map(|(index, c)| PortalRenderCache::new(index, c.id, c.color, c.label.clone(), context.influences[index]))
            .collect();
        self.groups = build_work_groups(&context.influences);
        self.next_group = 0;
        self.phase = if self.groups.is_empty() { PartitionPhase::Clean } else { PartitionPhase::GroupsPending };
        self.last_dimension = Some(context.source.clone());

        info!(
            "Zone partition rebuilt for {}: {} portals in {}, {} work groups",
            context.source,
            context.len(),
            context.target,
            self.groups.len()
        );
        self.context = Some(context);
    }

    fn process_groups(&mut self) {
        let Some(context) = self.context.as_ref() else {
            return;
        };
        let start = std::time::Instant::now();
        let mut processed = 0;

        while processed < self.groups_per_frame && self.next_group < self.groups.len() {
            let group = &self.groups[self.next_group];
            if group.is_isolated() {
                let index = group.members[0];
                let cells = process::process_isolated(context, index);
                Self::store_cells(&mut self.cells, &mut self.caches, context, index, cells);
            } else {
                let mut by_owner = process::process_group(context, group);
                for &index in &group.members {
                    let cells = by_owner.remove(&index).unwrap_or_default();
                    Self::store_cells(&mut self.cells, &mut self.caches, context, index, cells);
                }
            }
            self.next_group += 1;
            processed += 1;
        }

        if self.next_group >= self.groups.len() && self.phase == PartitionPhase::GroupsPending {
            self.phase = PartitionPhase::Clean;
            debug!("Zone partition complete: {} portals with cells", self.cells.len());
        }
        if processed > 0 {
            let duration = start.elapsed();
            if duration.as_millis() > 50 {
                warn!("[ZONES] {} work groups took {:?} ({} pending)", processed, duration, self.pending_groups());
            }
            profile_log!(self.frame, "[ZONES] {} groups in {:?}, {} pending", processed, duration, self.pending_groups());
        }
    }

    /// Replaces one candidate's cell set and flags its cache.
    fn store_cells(
        cells: &mut FxHashMap<PortalId, FxHashSet<CellPos>>,
        caches: &mut [PortalRenderCache],
        context: &PartitionContext,
        index: usize,
        result: FxHashSet<CellPos>,
    ) {
        let id = context.candidates[index].id;
        if result.is_empty() {
            cells.remove(&id);
        } else {
            cells.insert(id, result);
        }
        if let Some(cache) = caches.get_mut(index) {
            cache.geometry_dirty = true;
        }
    }

    fn update_culling(&mut self, viewer: Option<&ZoneViewer>) {
        let Some(viewer) = viewer else {
            for cache in &mut self.caches {
                cache.in_range = true;
            }
            return;
        };
        let max_range = viewer.max_range(self.render_range_multiplier);
        let max_range_sq = max_range * max_range;
        for cache in &mut self.caches {
            cache.in_range = cache.is_in_range(viewer.position.x, viewer.position.z, max_range_sq);
        }
    }

    /// Drops all derived state. Cell sets are handed to the renderer for release.
    pub fn reset(&mut self) {
        self.pending_releases.extend(self.cells.drain().map(|(id, _)| id));
        self.context = None;
        self.groups.clear();
        self.next_group = 0;
        self.caches.clear();
        self.last_dimension = None;
        self.phase = PartitionPhase::Inactive;
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Sends dirty in-range caches to `renderer`. Returns how many were accepted.
    pub fn render_pass(&mut self, renderer: &mut dyn ZoneRenderer, style: RenderStyle) -> usize {
        for id in self.pending_releases.drain(..) {
            renderer.release(id);
        }

        let mut accepted = 0;
        for cache in &mut self.caches {
            if !cache.needs_submit() {
                continue;
            }
            match self.cells.get(&cache.portal_id).filter(|cells| !cells.is_empty()) {
                None => {
                    if cache.ready {
                        renderer.release(cache.portal_id);
                    }
                    cache.ready = false;
                    // Nothing to draw until the next geometry change.
                    cache.geometry_dirty = false;
                    cache.style_dirty = false;
                }
                Some(cells) => {
                    let draw = ZoneDraw {
                        portal_id: cache.portal_id,
                        index: cache.index,
                        cells,
                        color: cache.color,
                        label: &cache.label,
                        style,
                    };
                    if renderer.submit(&draw) {
                        cache.ready = true;
                        cache.geometry_dirty = false;
                        cache.style_dirty = false;
                        accepted += 1;
                    }
                }
            }
        }
        accepted
    }
}

#[cfg(test)]
mod tests;
