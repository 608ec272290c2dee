use crate::config::{LEGACY_BACKUP_FILE_NAME, STATE_FILE_NAME};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::storage::legacy::try_migrate_legacy_data;
use chrono::Local;
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Load state from the local JSON document.
///
/// A missing file yields `Ok(None)`. Content that is neither the current
/// format nor the legacy format is `CorruptState`.
pub fn load_local(data_dir: &Path) -> AppResult<Option<AppState>> {
    let path = data_dir.join(STATE_FILE_NAME);

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AppError::corrupt_state(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    // Try to parse as current format first
    let parse_error = match serde_json::from_str::<AppState>(&content) {
        Ok(state) => return Ok(Some(state)),
        Err(e) => e,
    };

    // Try migration from legacy format
    let backup_path = data_dir.join(LEGACY_BACKUP_FILE_NAME);
    if let Some(migrated) = try_migrate_legacy_data(&content, Some(&backup_path)) {
        save_local(data_dir, &migrated)?;
        return Ok(Some(migrated));
    }

    Err(AppError::corrupt_state(format!(
        "{}: {}",
        path.display(),
        parse_error
    )))
}

/// Migrate a legacy document living outside the data dir, if there is one.
pub fn import_legacy_file(data_dir: &Path, legacy_path: &Path) -> Option<AppState> {
    let content = fs::read_to_string(legacy_path).ok()?;
    let backup_path = data_dir.join(LEGACY_BACKUP_FILE_NAME);
    let migrated = try_migrate_legacy_data(&content, Some(&backup_path))?;

    if let Err(e) = save_local(data_dir, &migrated) {
        warn!("Migrated legacy data but could not save it yet: {}", e);
    }
    info!("Imported legacy data from {}", legacy_path.display());
    Some(migrated)
}

/// Save state atomically: write a sibling temp file, sync it, then rename over
/// the current document.
pub fn save_local(data_dir: &Path, data: &AppState) -> AppResult<()> {
    fs::create_dir_all(data_dir).map_err(|e| {
        AppError::persistence(format!("cannot create {}: {}", data_dir.display(), e))
    })?;

    let path = data_dir.join(STATE_FILE_NAME);
    let tmp_path = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(data)
        .map_err(|e| AppError::persistence(format!("cannot serialize state: {}", e)))?;

    let mut file = fs::File::create(&tmp_path).map_err(|e| {
        AppError::persistence(format!("cannot create {}: {}", tmp_path.display(), e))
    })?;
    file.write_all(content.as_bytes())
        .map_err(|e| AppError::persistence(format!("cannot write temp file: {}", e)))?;
    file.sync_all()
        .map_err(|e| AppError::persistence(format!("cannot sync temp file: {}", e)))?;
    drop(file);

    fs::rename(&tmp_path, &path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        AppError::persistence(format!(
            "cannot rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        ))
    })
}

/// Move an unreadable document aside so the next save does not destroy it.
pub fn quarantine(data_dir: &Path) -> AppResult<PathBuf> {
    let path = data_dir.join(STATE_FILE_NAME);
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let mut backup = data_dir.join(format!("reminders.corrupt-{}.json", stamp));
    let mut n = 1;
    while backup.exists() {
        backup = data_dir.join(format!("reminders.corrupt-{}-{}.json", stamp, n));
        n += 1;
    }
    fs::rename(&path, &backup)?;
    Ok(backup)
}
