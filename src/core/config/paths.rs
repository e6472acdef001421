use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::settings::PathSettings;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_dir: PathBuf,
    pub data_dir: PathBuf,
    pub db_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Self {
        Self::with_base_dir(discover_base_dir())
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        AppPaths {
            data_dir: base_dir.join("data"),
            db_dir: base_dir.join("chroma_db"),
            log_dir: base_dir.join("logs"),
            base_dir,
        }
    }

    /// Applies configured directories. Relative paths resolve against `base_dir`.
    pub fn apply_overrides(&mut self, overrides: &PathSettings) {
        if let Some(dir) = &overrides.data_dir {
            self.data_dir = resolve_against(&self.base_dir, dir);
        }
        if let Some(dir) = &overrides.db_dir {
            self.db_dir = resolve_against(&self.base_dir, dir);
        }
        if let Some(dir) = &overrides.log_dir {
            self.log_dir = resolve_against(&self.base_dir, dir);
        }
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [&self.data_dir, &self.db_dir, &self.log_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn knowledge_db_path(&self) -> PathBuf {
        self.db_dir.join("knowledge.db")
    }
}

fn discover_base_dir() -> PathBuf {
    if let Ok(root) = env::var("RESEARCH_HOME") {
        if !root.trim().is_empty() {
            return PathBuf::from(root);
        }
    }

    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn resolve_against(base: &Path, candidate: &Path) -> PathBuf {
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}
