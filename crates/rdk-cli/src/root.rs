use std::path::{Path, PathBuf};

/// Resolve the working directory that holds `.rdk/` and the rules.
///
/// Priority:
/// 1. `--root` flag / `RDK_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.rdk/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_rdk_root(&cwd).unwrap_or(cwd)
}

fn find_rdk_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(rdk_core::paths::RDK_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn finds_rdk_dir_above_start() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".rdk")).unwrap();
        let subdir = dir.path().join("my-rule/lib");
        std::fs::create_dir_all(&subdir).unwrap();
        assert_eq!(find_rdk_root(&subdir).as_deref(), Some(dir.path()));
    }

    #[test]
    fn no_rdk_dir_means_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_rdk_root(dir.path()), None);
    }
}
