//! JSON persistence of the portal registry.
//!
//! Loading is lenient per record: a malformed record is skipped, a missing field
//! takes its default, and only a document that is not JSON at all is an error.

use serde_json::{json, Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::entry::PortalEntry;
use crate::portal::bounds::PortalBounds;
use crate::portal::settings::ZoneSettings;
use crate::portal::types::{Argb, DimensionId, PortalId};

pub const DOCUMENT_VERSION: u32 = 2;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contents of one stored registry file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryDocument {
    pub version: u32,
    pub settings: ZoneSettings,
    pub entries: Vec<PortalEntry>,
}

/// Parses a stored document, skipping records that cannot be used.
pub fn parse_document(text: &str) -> Result<RegistryDocument, StoreError> {
    let root: Value = serde_json::from_str(text)?;
    let mut document = RegistryDocument::default();

    let Some(root) = root.as_object() else {
        return Ok(document);
    };

    document.version = int_or(root, "version", 0).clamp(0, u32::MAX as i64) as u32;

    if let Some(settings) = root.get("zone_settings").and_then(Value::as_object) {
        document.settings = settings_from_json(settings);
    }

    if let Some(portals) = root.get("portals").and_then(Value::as_array) {
        for record in portals {
            match record.as_object().and_then(entry_from_json) {
                Some(entry) => document.entries.push(entry),
                None => bevy::log::debug!("Skipping malformed portal record: {}", record),
            }
        }
    }

    Ok(document)
}

/// Renders the current registry state in the stored format.
pub fn render_document(settings: &ZoneSettings, entries: &[PortalEntry]) -> Result<String, StoreError> {
    let portals: Vec<Value> = entries.iter().map(entry_to_json).collect();
    let root = json!({
        "version": DOCUMENT_VERSION,
        "zone_settings": serde_json::to_value(settings)?,
        "portals": portals,
    });
    Ok(serde_json::to_string_pretty(&root)?)
}

fn entry_to_json(entry: &PortalEntry) -> Value {
    let bounds = entry.bounds();
    json!({
        "id": entry.id().to_string(),
        "dimension": entry.dimension().as_str(),
        "min_x": bounds.min_x(),
        "min_y": bounds.min_y(),
        "min_z": bounds.min_z(),
        "max_x": bounds.max_x(),
        "max_y": bounds.max_y(),
        "max_z": bounds.max_z(),
        "alias": entry.alias(),
        "color": entry.color().to_signed(),
    })
}

fn entry_from_json(obj: &Map<String, Value>) -> Option<PortalEntry> {
    let id = str_or(obj, "id", "");
    let dimension = str_or(obj, "dimension", "");
    if id.is_empty() || dimension.is_empty() {
        return None;
    }
    let id = PortalId::parse_str(id).ok()?;

    let coord = |key: &str| int_or(obj, key, 0).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    let bounds = PortalBounds::new(
        coord("min_x"),
        coord("min_y"),
        coord("min_z"),
        coord("max_x"),
        coord("max_y"),
        coord("max_z"),
    );
    let alias = str_or(obj, "alias", "").to_string();
    let color = Argb::from_persisted(int_or(obj, "color", Argb::FALLBACK.0 as i64));

    Some(PortalEntry::new(id, DimensionId::new(dimension), bounds, alias, color))
}

fn settings_from_json(obj: &Map<String, Value>) -> ZoneSettings {
    let defaults = ZoneSettings::default();
    ZoneSettings {
        show_zone_borders: bool_or(obj, "show_zone_borders", defaults.show_zone_borders),
        render_lines: bool_or(obj, "render_lines", defaults.render_lines),
        render_through: bool_or(obj, "render_through", defaults.render_through),
        render_letters: bool_or(obj, "render_letters", defaults.render_letters),
        portal_scanning_disabled: bool_or(obj, "portal_scanning_disabled", defaults.portal_scanning_disabled),
    }
}

fn str_or<'a>(obj: &'a Map<String, Value>, key: &str, default: &'a str) -> &'a str {
    obj.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn int_or(obj: &Map<String, Value>, key: &str, default: i64) -> i64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

fn bool_or(obj: &Map<String, Value>, key: &str, default: bool) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// File-backed store for one world's registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalStore {
    path: PathBuf,
}

impl PortalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty document, not an error.
    pub fn load(&self) -> Result<RegistryDocument, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RegistryDocument::default()),
            Err(source) => return Err(StoreError::Io { path: self.path.clone(), source }),
        };
        parse_document(&text)
    }

    /// Writes to a temporary sibling file, then renames it over the target.
    pub fn save(&self, settings: &ZoneSettings, entries: &[PortalEntry]) -> Result<(), StoreError> {
        let text = render_document(settings, entries)?;
        let io_err = |source: io::Error| StoreError::Io { path: self.path.clone(), source };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, text).map_err(io_err)?;
        fs::rename(&temp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}
