//! Authoritative list of discovered portals.
//!
//! The registry owns every [`PortalEntry`] and the persisted [`ZoneSettings`].
//! Detections from the scanner are matched against existing entries by box
//! intersection; listeners are notified synchronously after each mutation.

pub mod colors;
pub mod entry;
pub mod store;

pub use entry::PortalEntry;
pub use store::{PortalStore, RegistryDocument, StoreError};

use bevy::prelude::*;
use rustc_hash::FxHashSet;

use super::bounds::{CellPos, ColumnPos, PortalBounds};
use super::settings::ZoneSettings;
use super::types::{Argb, DimensionId, PortalId};
use super::world::WorldAccess;

/// A connected group of marker blocks found by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub bounds: PortalBounds,
}

impl Detection {
    pub fn new(bounds: PortalBounds) -> Self {
        Self { bounds }
    }
}

/// What [`PortalRegistry::update_from_detections`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionOutcome {
    pub added: Vec<PortalId>,
    pub moved: Vec<PortalId>,
    pub removed: Vec<PortalId>,
}

impl DetectionOutcome {
    pub fn changed(&self) -> bool {
        !(self.added.is_empty() && self.moved.is_empty() && self.removed.is_empty())
    }
}

/// Kind of change a listener is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryChange {
    /// Entries were added, removed, moved, or the whole list was replaced.
    Geometry,
    /// Only labels or colours changed.
    RenderOnly,
}

pub type RegistryListener = Box<dyn Fn(RegistryChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Resource)]
pub struct PortalRegistry {
    entries: Vec<PortalEntry>,
    settings: ZoneSettings,
    listeners: Vec<(ListenerId, RegistryListener)>,
    next_listener: u64,
    dirty: bool,
    store: Option<PortalStore>,
    remove_without_world: bool,
}

impl Default for PortalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            settings: ZoneSettings::default(),
            listeners: Vec::new(),
            next_listener: 0,
            dirty: false,
            store: None,
            remove_without_world: true,
        }
    }

    /// Whether unmatched portals are dropped when no world is available to probe.
    pub fn with_removal_policy(mut self, remove_without_world: bool) -> Self {
        self.remove_without_world = remove_without_world;
        self
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Entries in insertion order.
    pub fn list(&self) -> &[PortalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: PortalId) -> Option<&PortalEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn entries_in<'a>(&'a self, dimension: &'a DimensionId) -> impl Iterator<Item = &'a PortalEntry> + 'a {
        self.entries.iter().filter(move |e| e.dimension() == dimension)
    }

    /// First entry in `dimension` whose bounds intersect `bounds`.
    pub fn find_matching(&self, dimension: &DimensionId, bounds: &PortalBounds) -> Option<&PortalEntry> {
        self.position_matching(dimension, bounds).map(|i| &self.entries[i])
    }

    fn position_matching(&self, dimension: &DimensionId, bounds: &PortalBounds) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.dimension() == dimension && e.bounds().intersects(bounds))
    }

    pub fn intersects_tracked_portal(&self, dimension: &DimensionId, cell: CellPos) -> bool {
        self.entries_in(dimension).any(|e| e.bounds().contains(cell))
    }

    pub fn settings(&self) -> &ZoneSettings {
        &self.settings
    }

    /// Mutable settings; marks the document dirty.
    pub fn settings_mut(&mut self) -> &mut ZoneSettings {
        self.dirty = true;
        &mut self.settings
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ------------------------------------------------------------------
    // Detection merge
    // ------------------------------------------------------------------

    /// Merges one column's scan results into the registry.
    ///
    /// Each detection updates the first intersecting entry or creates a new
    /// one. Entries of `dimension` overlapping `column` that no detection
    /// matched are removed when the presence probe finds no marker left in
    /// their box. Without a world the configured removal policy decides.
    pub fn update_from_detections(
        &mut self,
        dimension: &DimensionId,
        column: ColumnPos,
        detections: &[Detection],
        world: Option<&dyn WorldAccess>,
    ) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();
        let mut matched: FxHashSet<PortalId> = FxHashSet::default();

        for detection in detections {
            let bounds = detection.bounds;
            match self.position_matching(dimension, &bounds) {
                Some(index) => {
                    let entry = &mut self.entries[index];
                    if entry.bounds() != bounds {
                        debug!("Portal {} moved {:?} -> {:?}", entry.short_id(), entry.bounds(), bounds);
                        entry.set_bounds(bounds);
                        outcome.moved.push(entry.id());
                    }
                    matched.insert(entry.id());
                }
                None => {
                    let entry = PortalEntry::new(
                        PortalId::new_v4(),
                        dimension.clone(),
                        bounds,
                        String::new(),
                        colors::default_color(&bounds),
                    );
                    info!("Discovered portal {} in {} at {}", entry.short_id(), dimension, entry.display_coords());
                    matched.insert(entry.id());
                    outcome.added.push(entry.id());
                    self.entries.push(entry);
                }
            }
        }

        let remove_without_world = self.remove_without_world;
        self.entries.retain(|entry| {
            if entry.dimension() != dimension || !entry.bounds().intersects_column(column) || matched.contains(&entry.id()) {
                return true;
            }
            let still_present = match world {
                Some(world) => portal_exists_in_bounds(world, &entry.bounds()),
                None => !remove_without_world,
            };
            if !still_present {
                info!("Portal {} in {} at {} is gone", entry.short_id(), dimension, entry.display_coords());
                outcome.removed.push(entry.id());
            }
            still_present
        });

        if outcome.changed() {
            self.dirty = true;
            self.notify(RegistryChange::Geometry);
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    pub fn set_alias(&mut self, id: PortalId, alias: impl Into<String>) -> bool {
        let alias = alias.into();
        let Some(entry) = self.entries.iter_mut().find(|e| e.id() == id) else {
            return false;
        };
        entry.set_alias(alias);
        self.dirty = true;
        self.notify(RegistryChange::RenderOnly);
        true
    }

    pub fn set_color(&mut self, id: PortalId, color: Argb) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id() == id) else {
            return false;
        };
        entry.set_color(color);
        self.dirty = true;
        self.notify(RegistryChange::RenderOnly);
        true
    }

    pub fn set_bounds(&mut self, id: PortalId, bounds: PortalBounds) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id() == id) else {
            return false;
        };
        if entry.bounds() == bounds {
            return true;
        }
        entry.set_bounds(bounds);
        self.dirty = true;
        self.notify(RegistryChange::Geometry);
        true
    }

    pub fn remove(&mut self, id: PortalId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id() != id);
        if self.entries.len() == before {
            return false;
        }
        self.dirty = true;
        self.notify(RegistryChange::Geometry);
        true
    }

    /// Drops every entry and resets settings. Nothing is written.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.settings.reset();
        self.dirty = false;
        self.notify(RegistryChange::Geometry);
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self, listener: impl Fn(RegistryChange) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&self, change: RegistryChange) {
        for (_, listener) in &self.listeners {
            listener(change);
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn set_store(&mut self, store: Option<PortalStore>) {
        self.store = store;
    }

    pub fn store(&self) -> Option<&PortalStore> {
        self.store.as_ref()
    }

    /// Replaces entries and settings with the stored document. A failed read
    /// leaves an empty registry.
    pub fn load_from(&mut self, store: &PortalStore) {
        match store.load() {
            Ok(document) => {
                info!("Loaded {} portals from {}", document.entries.len(), store.path().display());
                self.entries = document.entries;
                self.settings = document.settings;
            }
            Err(e) => {
                warn!("Failed to load portals from {}: {}", store.path().display(), e);
                self.entries.clear();
                self.settings.reset();
            }
        }
        self.dirty = false;
        self.notify(RegistryChange::Geometry);
    }

    /// Writes the document if anything changed since the last load or save.
    /// Returns whether a write happened.
    pub fn save_to(&mut self, store: &PortalStore) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }
        store.save(&self.settings, &self.entries)?;
        self.dirty = false;
        debug!("Saved {} portals to {}", self.entries.len(), store.path().display());
        Ok(true)
    }

    /// [`Self::load_from`] the attached store; without one the registry is emptied.
    pub fn load(&mut self) {
        match self.store.clone() {
            Some(store) => self.load_from(&store),
            None => {
                self.entries.clear();
                self.settings.reset();
                self.dirty = false;
                self.notify(RegistryChange::Geometry);
            }
        }
    }

    /// [`Self::save_to`] the attached store, logging failures.
    pub fn save(&mut self) -> bool {
        let Some(store) = self.store.clone() else {
            return false;
        };
        match self.save_to(&store) {
            Ok(written) => written,
            Err(e) => {
                error!("Failed to save portals: {}", e);
                false
            }
        }
    }
}

/// True if any cell of `bounds` is a marker or cannot be checked.
fn portal_exists_in_bounds(world: &dyn WorldAccess, bounds: &PortalBounds) -> bool {
    bounds.cells().any(|cell| world.marker_if_loaded(cell).unwrap_or(true))
}
