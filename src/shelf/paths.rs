use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ShelfPaths {
    pub shelf_home: PathBuf,
    pub storage_dir: PathBuf,
    pub views_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl ShelfPaths {
    /// Layout rooted at `root`, with every location at its default position.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let shelf_home = root.into();
        let storage_dir = shelf_home.join("mailbox");
        Self {
            views_dir: storage_dir.join("home"),
            ledger_file: storage_dir.join(".uid_track"),
            logs_dir: shelf_home.join("logs"),
            storage_dir,
            shelf_home,
        }
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

pub fn resolve_paths() -> Result<ShelfPaths> {
    let shelf_home = match env_path("MAILSHELF_HOME") {
        Some(path) => path,
        None => required_home_dir()?.join("mailshelf"),
    };
    let defaults = ShelfPaths::under(shelf_home);

    let storage_dir = env_path("MAILSHELF_STORAGE_DIR").unwrap_or(defaults.storage_dir);
    let views_dir = env_path("MAILSHELF_VIEWS_DIR").unwrap_or_else(|| storage_dir.join("home"));
    let ledger_file =
        env_path("MAILSHELF_LEDGER_FILE").unwrap_or_else(|| storage_dir.join(".uid_track"));
    let logs_dir = env_path("MAILSHELF_LOGS_DIR").unwrap_or(defaults.logs_dir);

    Ok(ShelfPaths {
        shelf_home: defaults.shelf_home,
        storage_dir,
        views_dir,
        ledger_file,
        logs_dir,
    })
}
