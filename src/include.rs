//! Include resolution (spec §4.10): quoted vs angle-bracket search order.

use std::path::{Path, PathBuf};

/// `path` (user search dirs, for `<...>`) and `temp_path` (directories of
/// currently-open files, for `"..."`), per spec §3 "Include path state".
#[derive(Debug, Default, Clone)]
pub struct IncludePaths {
    pub path: Vec<PathBuf>,
    pub temp_path: Vec<PathBuf>,
}

impl IncludePaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_path(&mut self, dir: impl Into<PathBuf>) {
        self.path.push(dir.into());
    }

    /// Resolves `name` using the search order for angle (`<...>`) or quoted
    /// (`"..."`) includes, reading and returning the first hit.
    pub fn resolve(&self, name: &str, angle: bool) -> Option<(PathBuf, String)> {
        let dirs: Vec<&Path> = if angle {
            self.path
                .iter()
                .map(PathBuf::as_path)
                .chain(std::iter::once(Path::new(".")))
                .chain(self.temp_path.iter().map(PathBuf::as_path))
                .collect()
        } else {
            self.temp_path
                .iter()
                .map(PathBuf::as_path)
                .chain(std::iter::once(Path::new(".")))
                .chain(self.path.iter().map(PathBuf::as_path))
                .collect()
        };
        for dir in dirs {
            let candidate = dir.join(name);
            if let Ok(contents) = std::fs::read_to_string(&candidate) {
                return Some((candidate, contents));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_search_prefers_temp_path_over_user_path() {
        let dir = std::env::temp_dir().join(format!("cpp99_inc_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("h.h"), "from_temp").unwrap();

        let mut paths = IncludePaths::new();
        paths.temp_path.push(dir.clone());
        let (_, contents) = paths.resolve("h.h", false).unwrap();
        assert_eq!(contents, "from_temp");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_resolves_to_none() {
        let paths = IncludePaths::new();
        assert!(paths.resolve("definitely_missing.h", true).is_none());
    }
}
