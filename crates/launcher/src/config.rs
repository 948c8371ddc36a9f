//! Run-time knobs for a boot and the optional layout override file.

use std::fs;
use std::path::Path;

use types::BootLayout;

use crate::LaunchError;

/// Enough for the default delay loop with a wide margin.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Instruction budget before a run is cut off.
    pub max_steps: u64,
    /// Value presented in `mhartid`.
    pub hart_id: u64,
    /// Copy console bytes to stdout as they are written.
    pub echo_console: bool,
    /// Per-instruction CPU logging.
    pub verbose: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            hart_id: 0,
            echo_console: false,
            verbose: false,
        }
    }
}

impl LaunchConfig {
    pub fn with_hart_id(mut self, hart_id: u64) -> Self {
        self.hart_id = hart_id;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Reads a JSON layout and validates it before anything is built from it.
pub fn read_layout(path: &Path) -> Result<BootLayout, LaunchError> {
    let text = fs::read_to_string(path).map_err(|e| LaunchError::io(path, e))?;
    let layout: BootLayout = serde_json::from_str(&text).map_err(|source| LaunchError::LayoutFile {
        path: path.to_path_buf(),
        source,
    })?;
    layout.validate()?;
    log::info!("using layout from {}", path.display());
    Ok(layout)
}

/// The default layout, or the one in `path` when given.
pub fn layout_or_default(path: Option<&Path>) -> Result<BootLayout, LaunchError> {
    match path {
        Some(path) => read_layout(path),
        None => Ok(BootLayout::DEFAULT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::LayoutError;

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("bootchain-config-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn defaults() {
        let config = LaunchConfig::default();
        assert_eq!(config.max_steps, 1_000_000);
        assert_eq!(config.hart_id, 0);
        assert!(!config.echo_console);
    }

    #[test]
    fn layout_file_round_trips() {
        let mut layout = BootLayout::DEFAULT;
        layout.delay_iterations = 32;
        let path = scratch("ok");
        fs::write(&path, serde_json::to_string_pretty(&layout).unwrap()).unwrap();
        let read = read_layout(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(read, layout);
    }

    #[test]
    fn layout_file_is_validated() {
        let mut layout = BootLayout::DEFAULT;
        layout.delay_iterations = 0;
        let path = scratch("zero-delay");
        fs::write(&path, serde_json::to_string(&layout).unwrap()).unwrap();
        let err = read_layout(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(matches!(err, LaunchError::Layout(LayoutError::ZeroDelay)));
    }

    #[test]
    fn malformed_layout_file_is_reported() {
        let path = scratch("garbage");
        fs::write(&path, "{ not json").unwrap();
        let err = read_layout(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(matches!(err, LaunchError::LayoutFile { .. }));
    }
}
