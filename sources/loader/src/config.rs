use std::{path::PathBuf, time::Duration};

use bytes::Bytes;

/// Everything needed to build the standard three tier hierarchy.
///
/// Paths are taken already split; separator handling belongs to the caller.
#[derive(Debug, Clone, Default)]
pub struct HierarchyConfig {
    pub bootstrap_entries: Vec<(String, Bytes)>,
    pub platform_path: Vec<PathBuf>,
    pub application_path: Vec<PathBuf>,
    pub locate_timeout: Option<Duration>,
}

impl HierarchyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bootstrap_entry(&mut self, name: impl Into<String>, bytes: impl Into<Bytes>) -> &mut Self {
        self.bootstrap_entries.push((name.into(), bytes.into()));
        self
    }

    pub fn add_platform_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.platform_path.push(path.into());
        self
    }

    pub fn add_application_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.application_path.push(path.into());
        self
    }

    pub fn with_locate_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.locate_timeout = Some(timeout);
        self
    }
}
