//! Logging bootstrap

use crate::{Result, StationError};
use tracing::Level;

/// Install a `fmt` subscriber filtering at `level`
///
/// A subscriber that is already installed is kept.
pub fn init_logging(level: &str) -> Result<()> {
    let level = parse_level(level)?;
    if tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}

pub fn parse_level(level: &str) -> Result<Level> {
    level.parse::<Level>().map_err(|_| StationError::Config {
        msg: format!("unknown log level '{}'", level),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("WARN").unwrap(), Level::WARN);
        assert!(matches!(parse_level("loud"), Err(StationError::Config { .. })));
    }

    #[test]
    fn test_init_twice() {
        assert!(init_logging("info").is_ok());
        assert!(init_logging("trace").is_ok());
        assert!(init_logging("verbose").is_err());
    }
}
