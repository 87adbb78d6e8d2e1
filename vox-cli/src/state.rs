use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use vox_engine::memory::StoreSnapshot;

/// `$VOX_HOME`, or `~/.vox`.
pub fn vox_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("VOX_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".vox"))
}

pub fn ensure_vox_home() -> Result<PathBuf> {
    let dir = vox_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn state_path() -> Result<PathBuf> {
    Ok(ensure_vox_home()?.join("state.json"))
}

/// A missing file is an empty store.
pub fn read_snapshot(path: &Path) -> Result<StoreSnapshot> {
    if !path.exists() {
        return Ok(StoreSnapshot::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

/// Write to a sibling temp file, then rename over the old state.
pub fn write_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
