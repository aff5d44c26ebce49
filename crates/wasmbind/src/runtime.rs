//! Process-wide queries and the global logging sink.

use std::path::Path;

use crate::error::BindingResult;

/// Version of the linked engine.
#[must_use]
pub fn version() -> &'static str {
    extism::extism_version().trim_end_matches('\0')
}

/// Version of this binding crate.
#[must_use]
pub fn binding_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Name of the engine plugins run on.
#[must_use]
pub fn engine_name() -> &'static str {
    "extism"
}

/// Send engine and binding logs at `level` or above to `path`.
///
/// `"stdout"` and `"stderr"` select the standard streams. The sink is shared
/// by every plugin in the process and can be installed once.
///
/// # Errors
///
/// Fails if a sink is already installed, the level does not parse, or the
/// file cannot be opened.
pub fn set_log_file(path: impl AsRef<Path>, level: &str) -> BindingResult<()> {
    wasmbind_telemetry::set_log_file(path, level)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_version_is_semver() {
        let v = version();
        assert!(!v.contains('\0'));
        let parts: Vec<_> = v.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.parse::<u64>().is_ok()));
    }

    #[test]
    fn binding_version_is_crate_version() {
        assert_eq!(binding_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn engine_is_extism() {
        assert_eq!(engine_name(), "extism");
    }
}
