use std::collections::BTreeSet;
use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const ENV_PREFIX: &str = "MAILSHELF_";

/// Tags that share the prefix but name no variable.
const NOT_VARIABLES: &[&str] = &["MAILSHELF_WARN"];

fn source_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
    }
    Ok(files)
}

/// Every `MAILSHELF_*` word in `source`. A word is a run of uppercase
/// letters, digits and underscores.
fn prefixed_words(source: &str) -> impl Iterator<Item = &str> {
    source
        .split(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
        .filter(|word| word.len() > ENV_PREFIX.len() && word.starts_with(ENV_PREFIX))
}

fn render_allowlist(keys: &BTreeSet<String>) -> String {
    let mut out = String::from("pub const GENERATED_ENV_ALLOWLIST: &[&str] = &[\n");
    for key in keys {
        out.push_str(&format!("    {key:?},\n"));
    }
    out.push_str("];\n");
    out
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut keys = BTreeSet::new();
    for file in source_files(Path::new("src"))? {
        let source = fs::read_to_string(&file)?;
        keys.extend(
            prefixed_words(&source)
                .filter(|word| !NOT_VARIABLES.contains(word))
                .map(str::to_string),
        );
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    fs::write(out_dir.join("env_allowlist.rs"), render_allowlist(&keys))?;

    let built_at = SystemTime::now().duration_since(UNIX_EPOCH)?;
    println!(
        "cargo:rustc-env=BUILD_UUID={:x}-{:x}",
        built_at.as_secs(),
        built_at.subsec_nanos()
    );
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
    Ok(())
}
