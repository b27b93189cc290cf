//! Logging setup for the CLI.
//!
//! Logs go to stderr so that prompts and reports on stdout stay clean.

use tracing_subscriber::{filter::LevelFilter, fmt};

/// Maps the number of `-v` flags to a level.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Installs the global subscriber. Later calls keep the first one.
pub fn init(verbosity: u8) {
    let subscriber = fmt()
        .with_max_level(level_for_verbosity(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already set; keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for_verbosity(0), LevelFilter::WARN);
        assert_eq!(level_for_verbosity(1), LevelFilter::INFO);
        assert_eq!(level_for_verbosity(5), LevelFilter::DEBUG);
    }
}
