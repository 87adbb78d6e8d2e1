use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vox_core::{Coordinates, EngineConfig, PlaceCategory};

use crate::state::ensure_vox_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub profile: ProfileSection,
    /// Named places ("home", "work") that speech can refer to.
    pub places: Vec<SavedPlace>,
    /// Stand-in for a places API: what a category search near you returns.
    pub nearby: Vec<NearbyPlace>,
    pub location: LocationSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileSection {
    pub timezone: String,
}

impl Default for ProfileSection {
    fn default() -> Self {
        Self {
            timezone: "Africa/Addis_Ababa".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedPlace {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NearbyPlace {
    pub category: PlaceCategory,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Simulated device position and permission state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocationSection {
    pub current: Option<Coordinates>,
    pub permission: bool,
    pub background_permission: bool,
}

impl Default for LocationSection {
    fn default() -> Self {
        Self {
            current: None,
            permission: true,
            background_permission: true,
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        vox_core::time::parse_tz(&self.profile.timezone)
    }

    pub fn upsert_place(&mut self, name: &str, at: Coordinates) {
        let name = name.trim().to_lowercase();
        self.places.retain(|p| p.name != name);
        self.places.push(SavedPlace {
            name,
            latitude: at.latitude,
            longitude: at.longitude,
        });
        self.places.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_vox_home()?.join("config.toml"))
}

pub fn read_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn load_config() -> Result<Config> {
    read_config(&config_path()?)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[engine]
max_geofences = 20

[profile]
timezone = "America/Chicago"

[[places]]
name = "home"
latitude = 9.01
longitude = 38.76

[[nearby]]
category = "PHARMACY"
name = "Kenema Pharmacy"
latitude = 9.02
longitude = 38.75
"#,
        )
        .unwrap();

        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.engine.max_geofences, 20);
        assert_eq!(cfg.engine.geofence_retry_attempts, 3);
        assert_eq!(cfg.timezone().unwrap(), chrono_tz::America::Chicago);
        assert_eq!(cfg.places[0].name, "home");
        assert_eq!(cfg.nearby[0].category, PlaceCategory::Pharmacy);
        assert!(cfg.location.permission);
        assert_eq!(cfg.location.current, None);
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = read_config(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let mut cfg = Config::default();
        cfg.upsert_place("Work", Coordinates::new(9.02, 38.75));
        let s = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_upsert_place_replaces_by_name() {
        let mut cfg = Config::default();
        cfg.upsert_place("Home", Coordinates::new(9.0, 38.0));
        cfg.upsert_place("home", Coordinates::new(9.5, 38.5));
        assert_eq!(cfg.places.len(), 1);
        assert_eq!(cfg.places[0].latitude, 9.5);
    }
}
