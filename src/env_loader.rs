use std::env;
use std::path::PathBuf;

/// `.env` locations in load order: the working directory first, then the
/// shelf home (or `$HOME`) under `mailshelf/`.
fn dotenv_candidates(shelf_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(".env")];
    if let Some(base) = shelf_home.filter(|p| !p.as_os_str().is_empty()).or(home_dir) {
        candidates.push(base.join("mailshelf").join(".env"));
    }
    candidates
}

/// Load the first `.env` that exists. Variables already set in the process
/// environment win over file entries.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenv_candidates(env::var_os("MAILSHELF_HOME").map(PathBuf::from), dirs::home_dir())
        .into_iter()
        .filter(|path| path.is_file())
        .find(|path| dotenvy::from_path(path).is_ok())
}
