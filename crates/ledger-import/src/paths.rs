//! Status file locations and atomic writes.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// `.bulk_import_status.<import_id>.json`
pub fn status_file_name(import_id: &str) -> String {
    format!(".bulk_import_status.{}.json", import_id)
}

pub fn status_path(dir: &Path, import_id: &str) -> PathBuf {
    dir.join(status_file_name(import_id))
}

/// Sibling temp path: `dir/.name.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name.trim_start_matches('.')))
}

/// Replace `path` with `contents` via a temp file in the same directory, so
/// readers see either the old or the new file.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    let tmp = temp_path(path);
    std::fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| anyhow!("Failed to move {} into place at {}: {}", tmp.display(), path.display(), e))
}

pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("Failed to serialize JSON")?;
    atomic_write(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path(Path::new("/d/.bulk_import_status.x.json")),
            PathBuf::from("/d/.bulk_import_status.x.json.tmp")
        );
        assert_eq!(temp_path(Path::new("state.json")), PathBuf::from(".state.json.tmp"));
    }

    #[test]
    fn test_status_path() {
        let path = status_path(Path::new("/var/imports"), "import_42");
        assert_eq!(path, PathBuf::from("/var/imports/.bulk_import_status.import_42.json"));
    }

    #[test]
    fn test_atomic_write_replaces_and_cleans_up() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested").join("state.json");

        atomic_write_json_pretty(&path, &serde_json::json!({"a": 1}))?;
        atomic_write_json_pretty(&path, &serde_json::json!({"a": 2}))?;

        let text = std::fs::read_to_string(&path)?;
        assert!(text.contains('\n'));
        assert_eq!(serde_json::from_str::<serde_json::Value>(&text)?["a"], 2);

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }
}
