/*
 * Logging Module
 *
 * Installs the `env_logger` backend behind the `log` facade. `RUST_LOG`
 * still wins when set; otherwise the level follows the verbose flag.
 */

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Initializes the global logger.
///
/// `verbose` lowers the default level from info to debug, which surfaces
/// panic transitions, path attachment and spawn summaries.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let env = Env::default().default_filter_or(level.to_string());
    let mut builder = Builder::from_env(env);
    builder.format_timestamp_millis();

    // A second call (tests, embedding hosts) keeps the first logger
    let _ = builder.try_init();
}
