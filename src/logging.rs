use std::io::Write;

const FILTER_ENV: &str = "MAILSHELF_LOG";

/// Stderr logger filtered by `MAILSHELF_LOG` (`info` when unset). Stdout is
/// kept for command reports.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().filter_or(FILTER_ENV, default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| writeln!(buf, "[*] {}: {}", record.level(), record.args()))
        .target(env_logger::Target::Stderr)
        .try_init();
}
