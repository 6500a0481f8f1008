use std::path::{Path, PathBuf};

/// Environment variable overriding the store root.
pub const CONFIG_DIR_ENV: &str = "JOBMATCH_CONFIG_DIR";

/// Directory below `$HOME` used when nothing else is configured.
pub const DEFAULT_DIR_NAME: &str = ".jobmatch";

/// Where cluster subsystem graphs live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root: PathBuf,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Config { root: root.into() }
    }

    /// Resolves the root from, in order: the explicit directory, `JOBMATCH_CONFIG_DIR`, and
    /// `$HOME/.jobmatch`. Falls back to `./.jobmatch` when `HOME` is unset.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        Self::resolve_with(explicit, std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from), std::env::var_os("HOME").map(PathBuf::from))
    }

    fn resolve_with(explicit: Option<&Path>, from_env: Option<PathBuf>, home: Option<PathBuf>) -> Self {
        let root = match (explicit, from_env, home) {
            (Some(dir), _, _) => dir.to_path_buf(),
            (None, Some(dir), _) => dir,
            (None, None, Some(home)) => home.join(DEFAULT_DIR_NAME),
            (None, None, None) => PathBuf::from(DEFAULT_DIR_NAME),
        };
        log::debug!("Using store root {}", root.display());
        Config { root }
    }

    /// `<root>/clusters`, one directory per cluster.
    pub fn clusters_root(&self) -> PathBuf {
        self.root.join("clusters")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_order() {
        let explicit = PathBuf::from("/opt/store");
        let env = Some(PathBuf::from("/env/store"));
        let home = Some(PathBuf::from("/home/user"));

        assert_eq!(Config::resolve_with(Some(&explicit), env.clone(), home.clone()).root, explicit);
        assert_eq!(Config::resolve_with(None, env.clone(), home.clone()).root, PathBuf::from("/env/store"));
        assert_eq!(Config::resolve_with(None, None, home).root, PathBuf::from("/home/user/.jobmatch"));
        assert_eq!(Config::new("/x").clusters_root(), PathBuf::from("/x/clusters"));
    }
}
