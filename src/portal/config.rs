use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::types::DimensionId;

pub const ZONE_CONFIG_PATH: &str = "assets/portal_zones.ron";

/// One direction of the two-way link between coordinate spaces.
///
/// Cells of `from` map into `to` by multiplying x/z by `scale`; portals in `to`
/// are only considered within `search_radius` cells (x/z) of the mapped point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionLink {
    pub from: DimensionId,
    pub to: DimensionId,
    pub scale: f64,
    pub search_radius: i32,
}

impl DimensionLink {
    pub fn new(from: DimensionId, to: DimensionId, scale: f64, search_radius: i32) -> Self {
        Self { from, to, scale, search_radius }
    }

    fn is_valid(&self) -> bool {
        self.scale.is_finite() && self.scale > 0.0 && self.search_radius >= 0 && !self.from.is_empty() && !self.to.is_empty()
    }
}

/// Static configuration loaded once at startup. Changing the links or budgets
/// mid-session only takes effect after the next partition rebuild.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    // Scheduling
    pub tick_rate: f64,
    pub scans_per_tick: usize,
    pub vertical_stride: usize,
    pub groups_per_frame: usize,

    // Partition
    pub links: Vec<DimensionLink>,
    pub border_epsilon: f64,
    pub render_range_multiplier: f64,

    // Persistence
    pub storage_dir: String,
    pub default_save_name: String,
    pub remove_without_world: bool,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20.0,
            scans_per_tick: 1,
            vertical_stride: 1,
            groups_per_frame: 1,
            links: vec![
                DimensionLink::new(DimensionId::overworld(), DimensionId::nether(), 1.0 / 8.0, 16),
                DimensionLink::new(DimensionId::nether(), DimensionId::overworld(), 8.0, 128),
            ],
            border_epsilon: 1.0e-5,
            render_range_multiplier: 2.0,
            storage_dir: "portal_zones".to_string(),
            default_save_name: "portal_zones_default".to_string(),
            remove_without_world: true,
        }
    }
}

impl ZoneConfig {
    /// Link used when the viewer stands in `dimension`.
    pub fn link_from(&self, dimension: &DimensionId) -> Option<&DimensionLink> {
        self.links.iter().find(|link| &link.from == dimension)
    }

    /// Link whose cells map *into* `dimension`.
    pub fn link_into(&self, dimension: &DimensionId) -> Option<&DimensionLink> {
        self.links.iter().find(|link| &link.to == dimension)
    }

    /// Clamps budgets to at least one unit of work and drops unusable links.
    pub fn sanitized(mut self) -> Self {
        if self.scans_per_tick == 0 {
            warn!("scans_per_tick was 0, using 1");
            self.scans_per_tick = 1;
        }
        if self.vertical_stride == 0 {
            warn!("vertical_stride was 0, using 1");
            self.vertical_stride = 1;
        }
        if self.groups_per_frame == 0 {
            warn!("groups_per_frame was 0, using 1");
            self.groups_per_frame = 1;
        }
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            warn!("tick_rate {} is not usable, using 20", self.tick_rate);
            self.tick_rate = 20.0;
        }
        if !(self.border_epsilon.is_finite() && self.border_epsilon >= 0.0) {
            self.border_epsilon = 1.0e-5;
        }
        self.links.retain(|link| {
            let valid = link.is_valid();
            if !valid {
                warn!("Ignoring invalid dimension link {} -> {} (scale {}, radius {})", link.from, link.to, link.scale, link.search_radius);
            }
            valid
        });
        self
    }

    /// `<storage_dir>/<sanitised save name>.json`
    pub fn storage_path(&self, save_name: &str) -> PathBuf {
        let mut file_name: String = save_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        if file_name.trim_matches(|c| c == '_' || c == '.').is_empty() {
            file_name = self.default_save_name.clone();
        }
        Path::new(&self.storage_dir).join(format!("{}.json", file_name))
    }
}

/// Reads a config file, falling back to defaults when it is missing or invalid.
pub fn read_zone_config(path: impl AsRef<Path>) -> ZoneConfig {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => match ron::from_str::<ZoneConfig>(&contents) {
            Ok(config) => {
                info!("Loaded zone config from {}", path.display());
                config.sanitized()
            }
            Err(e) => {
                error!("Failed to parse zone config: {}", e);
                error!("Using default ZoneConfig");
                ZoneConfig::default()
            }
        },
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            error!("Using default ZoneConfig");
            ZoneConfig::default()
        }
    }
}

/// Startup system. A config inserted by the host before startup wins.
pub fn load_zone_config(mut commands: Commands, existing: Option<Res<ZoneConfig>>) {
    if existing.is_some() {
        debug!("ZoneConfig provided by host, skipping {}", ZONE_CONFIG_PATH);
        return;
    }
    commands.insert_resource(read_zone_config(ZONE_CONFIG_PATH));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_links_are_reciprocal() {
        let config = ZoneConfig::default();
        let overworld = config.link_from(&DimensionId::overworld()).unwrap();
        let nether = config.link_from(&DimensionId::nether()).unwrap();
        assert_eq!(overworld.to, DimensionId::nether());
        assert_eq!(overworld.search_radius, 16);
        assert_eq!(nether.scale, 8.0);
        assert_eq!(nether.search_radius, 128);
        assert_eq!(overworld.scale * nether.scale, 1.0);
        assert_eq!(config.link_into(&DimensionId::nether()), Some(overworld));
        assert!(config.link_from(&DimensionId::new("minecraft:the_end")).is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(groups_per_frame: 4, remove_without_world: false)").unwrap();

        let config = read_zone_config(file.path());
        assert_eq!(config.groups_per_frame, 4);
        assert!(!config.remove_without_world);
        assert_eq!(config.scans_per_tick, 1);
        assert_eq!(config.links.len(), 2);
    }

    #[test]
    fn test_unreadable_file_falls_back_to_defaults() {
        let config = read_zone_config("definitely/not/here.ron");
        assert_eq!(config.groups_per_frame, 1);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(groups_per_frame: \"many\"").unwrap();
        let config = read_zone_config(file.path());
        assert_eq!(config.groups_per_frame, 1);
    }

    #[test]
    fn test_sanitized_drops_bad_links_and_zero_budgets() {
        let config = ZoneConfig {
            scans_per_tick: 0,
            groups_per_frame: 0,
            links: vec![
                DimensionLink::new(DimensionId::overworld(), DimensionId::nether(), 0.0, 16),
                DimensionLink::new(DimensionId::nether(), DimensionId::overworld(), 8.0, 128),
            ],
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.scans_per_tick, 1);
        assert_eq!(config.groups_per_frame, 1);
        assert_eq!(config.links.len(), 1);
    }

    #[test]
    fn test_storage_path_sanitises_world_name() {
        let config = ZoneConfig { storage_dir: "data".to_string(), ..Default::default() };
        assert_eq!(config.storage_path("play.example.net:25565"), Path::new("data").join("play.example.net_25565.json"));
        assert_eq!(config.storage_path(""), Path::new("data").join("portal_zones_default.json"));
    }
}
