//! Hand-history file discovery and reading.
//!
//! The scanner walks an input file or directory, keeps export files by
//! extension and splits each one into raw hand records.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::parser::split_hands;

/// Configuration for file scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["xml", "txt"])
    pub extensions: Vec<String>,
    /// Directory or file names to skip
    pub excludes: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: u64,
    /// Draw a progress bar while reading
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string(), "txt".to_string()],
            excludes: Vec::new(),
            max_file_size: 64 * 1024 * 1024,
            show_progress: false,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_file_size: config.max_file_size,
            show_progress: false,
        }
    }
}

/// A hand-history file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Raw records read from every scanned file, in file order.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub files_read: usize,
    pub files_failed: usize,
    pub records: Vec<String>,
}

/// Scanner rooted at a file or directory.
pub struct HandScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl HandScanner {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// List matching files, sorted by path.
    ///
    /// A root that is itself a file is returned as-is, whatever its extension.
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        if !self.root.exists() {
            bail!("Input path does not exist: {}", self.root.display());
        }

        if self.root.is_file() {
            let size = fs::metadata(&self.root)
                .with_context(|| format!("Failed to stat {}", self.root.display()))?
                .len();
            return Ok(vec![ScannedFile {
                path: self.root.clone(),
                size,
            }]);
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !self.is_excluded(&entry.file_name().to_string_lossy())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Cannot read entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    debug!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if size > self.config.max_file_size {
                warn!(
                    "Skipping {} ({} bytes exceeds limit)",
                    entry.path().display(),
                    size
                );
                continue;
            }

            files.push(ScannedFile {
                path: entry.into_path(),
                size,
            });
        }

        Ok(files)
    }

    /// Read every matching file and split it into hand records.
    ///
    /// Unreadable files are logged and counted, not fatal.
    pub fn read_records(&self) -> Result<ScanOutput> {
        let files = self.scan()?;
        let progress = self.progress_bar(files.len() as u64);
        let mut output = ScanOutput::default();

        for file in &files {
            if let Some(pb) = &progress {
                pb.set_message(file_label(&file.path));
            }

            match fs::read_to_string(&file.path) {
                Ok(content) => {
                    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
                    let hands = split_hands(content);
                    debug!("{}: {} hand records", file.path.display(), hands.len());
                    output.records.extend(hands);
                    output.files_read += 1;
                }
                Err(e) => {
                    warn!("Failed to read {}: {}", file.path.display(), e);
                    output.files_failed += 1;
                }
            }

            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Ok(output)
    }

    /// Check if a file has one of the configured extensions.
    pub fn matches(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config
            .extensions
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(ext))
    }

    /// Hidden entries and explicit excludes.
    fn is_excluded(&self, name: &str) -> bool {
        name.starts_with('.') || self.config.excludes.iter().any(|pattern| name == pattern)
    }

    fn progress_bar(&self, len: u64) -> Option<ProgressBar> {
        if !self.config.show_progress || len == 0 {
            return None;
        }

        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        Some(pb)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SESSION: &str = include_str!("../../fixtures/hands/session.xml");

    const SINGLE: &str = r#"<root><general><bigblind>€0,10</bigblind></general>
<game gamecode="9100000001"><general><startdate>2024-03-06 18:00:00</startdate>
<players><player name="a" seat="1" bet="€0,10" chips="€10" win="€0,15"/>
<player name="b" seat="2" bet="€0,05" chips="€10" win="€0"/></players></general></game></root>"#;

    fn layout() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("march")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::create_dir_all(root.join("archive")).unwrap();

        fs::write(root.join("session.xml"), SESSION).unwrap();
        fs::write(root.join("march/single.TXT"), format!("\u{feff}{SINGLE}")).unwrap();
        fs::write(root.join(".cache/stale.xml"), SESSION).unwrap();
        fs::write(root.join("archive/old.xml"), SESSION).unwrap();
        fs::write(root.join("notes.md"), "not a hand").unwrap();
        dir
    }

    fn scanner(root: &Path) -> HandScanner {
        let config = ScanConfig {
            excludes: vec!["archive".to_string()],
            ..ScanConfig::default()
        };
        HandScanner::new(root.to_path_buf(), config)
    }

    #[test]
    fn test_scan_skips_hidden_excluded_and_foreign_files() {
        let dir = layout();
        let files = scanner(dir.path()).scan().unwrap();

        let names: Vec<String> = files.iter().map(|f| file_label(&f.path)).collect();
        assert_eq!(names, vec!["single.TXT", "session.xml"]);
        assert!(files.iter().all(|f| f.size > 0));
    }

    #[test]
    fn test_read_records_splits_hands() {
        let dir = layout();
        let output = scanner(dir.path()).read_records().unwrap();

        assert_eq!(output.files_read, 2);
        assert_eq!(output.files_failed, 0);
        assert_eq!(output.records.len(), 4);
        assert!(output.records.iter().any(|r| r.contains("9100000001")));
        assert!(output.records.iter().all(|r| !r.starts_with('\u{feff}')));
    }

    #[test]
    fn test_single_file_root() {
        let dir = layout();
        let output = scanner(&dir.path().join("session.xml")).read_records().unwrap();
        assert_eq!(output.files_read, 1);
        assert_eq!(output.records.len(), 3);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(scanner(&dir.path().join("nope")).scan().is_err());
    }

    #[test]
    fn test_size_limit() {
        let dir = layout();
        let config = ScanConfig {
            max_file_size: 16,
            ..ScanConfig::default()
        };
        let files = HandScanner::new(dir.path().to_path_buf(), config).scan().unwrap();
        assert!(files.is_empty());
    }
}
