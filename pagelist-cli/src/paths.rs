//! Where the CLI keeps its record cache and logs.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use directories::ProjectDirs;

const LOG_NAME: &str = "pagelist";

/// Archived logs kept by [`AppDirs::rotate_logs`] at startup.
pub const KEPT_LOGS: usize = 10;

/// Resolved data and log directories.
#[derive(Debug, Clone)]
pub struct AppDirs {
    data: PathBuf,
    logs: PathBuf,
}

impl AppDirs {
    /// The platform locations: XDG data/cache dirs on Linux, `Library` on
    /// macOS, `AppData` on Windows. `None` without a home directory.
    pub fn discover() -> Option<Self> {
        let dirs = ProjectDirs::from("org", "pagelist", "pagelist")?;
        Some(Self {
            data: dirs.data_dir().to_path_buf(),
            logs: dirs.cache_dir().join("logs"),
        })
    }

    /// Both directories under `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            data: root.join("data"),
            logs: root.join("logs"),
        }
    }

    /// SQLite file backing the record cache.
    pub fn record_db(&self) -> PathBuf {
        self.data.join("records.db")
    }

    /// Log file of the running process.
    pub fn log_file(&self) -> PathBuf {
        self.logs.join(format!("{}.log", LOG_NAME))
    }

    /// Archives the previous run's log under a timestamped name and prunes
    /// all but the newest `keep` archives.
    pub fn rotate_logs(&self, keep: usize) -> io::Result<()> {
        fs::create_dir_all(&self.logs)?;

        let current = self.log_file();
        if current.exists() {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
            fs::rename(&current, self.logs.join(format!("{}-{}.log", LOG_NAME, stamp)))?;
        }

        // Stamps sort lexically, oldest first.
        let mut archived: Vec<PathBuf> = fs::read_dir(&self.logs)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&format!("{}-", LOG_NAME)) && name.ends_with(".log"))
            })
            .collect();
        archived.sort();

        let excess = archived.len().saturating_sub(keep);
        for path in archived.into_iter().take(excess) {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archives(dirs: &AppDirs) -> usize {
        fs::read_dir(&dirs.logs)
            .unwrap()
            .filter(|e| {
                let name = e.as_ref().unwrap().file_name();
                name.to_string_lossy().starts_with("pagelist-")
            })
            .count()
    }

    #[test]
    fn test_rotation_keeps_newest_archives() {
        let root = tempfile::tempdir().unwrap();
        let dirs = AppDirs::under(root.path());

        // First run: nothing to archive yet.
        dirs.rotate_logs(2).unwrap();
        assert_eq!(archives(&dirs), 0);

        for run in 0..4 {
            fs::write(dirs.log_file(), format!("run {}", run)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
            dirs.rotate_logs(2).unwrap();
            assert!(!dirs.log_file().exists());
        }
        assert_eq!(archives(&dirs), 2);

        let mut kept: Vec<String> = fs::read_dir(&dirs.logs)
            .unwrap()
            .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
            .collect();
        kept.sort();
        assert_eq!(kept, vec!["run 2", "run 3"]);
    }

    #[test]
    fn test_unusable_log_dir_is_reported() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("logs"), "not a directory").unwrap();

        let dirs = AppDirs::under(root.path());
        assert!(dirs.rotate_logs(KEPT_LOGS).is_err());
    }

    #[test]
    fn test_layout() {
        let dirs = AppDirs::under(Path::new("/tmp/pl"));
        assert_eq!(dirs.record_db(), Path::new("/tmp/pl/data/records.db"));
        assert_eq!(dirs.log_file(), Path::new("/tmp/pl/logs/pagelist.log"));
    }
}
