use crate::error::Result;
use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const RUN_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const RUN_ID_LEN: usize = 8;
const CREATE_ATTEMPTS: usize = 5;

pub const SEARCH_RESULTS_DIR: &str = "search_results";
pub const PLAN_FILE: &str = "plan.json";
pub const PLANNER_LOG_FILE: &str = "planner_log.md";
pub const SUMMARY_FILE: &str = "research_summary.txt";
pub const REPORT_FILE: &str = "research_report.md";

pub fn generate_run_id(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| RUN_ID_CHARSET[rng.random_range(0..RUN_ID_CHARSET.len())] as char)
        .collect()
}

/// The folder holding every artifact of one research run: `<data>/<date>/<run_id>`.
#[derive(Debug, Clone)]
pub struct RunDir {
    path: PathBuf,
    run_id: String,
}

impl RunDir {
    pub fn create(data_dir: &Path, date: NaiveDate) -> Result<Self> {
        let date_dir = data_dir.join(date.format("%Y-%m-%d").to_string());
        std::fs::create_dir_all(&date_dir)?;

        let mut attempt = 0;
        loop {
            let run_id = generate_run_id(RUN_ID_LEN);
            let path = date_dir.join(&run_id);
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "created run directory");
                    return Ok(Self { path, run_id });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists && attempt + 1 < CREATE_ATTEMPTS => {
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn create_today(data_dir: &Path) -> Result<Self> {
        Self::create(data_dir, chrono::Local::now().date_naive())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn search_results_dir(&self) -> Result<PathBuf> {
        let dir = self.path.join(SEARCH_RESULTS_DIR);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Pretty printed with a two space indent; non-ascii text is kept as is.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(path.to_path_buf())
}

pub fn save_text(text: &str, path: &Path) -> Result<PathBuf> {
    std::fs::write(path, text)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_charset() {
        for _ in 0..50 {
            let id = generate_run_id(RUN_ID_LEN);
            assert_eq!(id.len(), 8);
            assert!(
                id.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            );
        }
    }

    #[test]
    fn test_run_dir_layout() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        let first = RunDir::create(tmp.path(), date)?;
        let second = RunDir::create(tmp.path(), date)?;

        assert_eq!(first.path(), tmp.path().join("2025-03-14").join(first.run_id()));
        assert!(first.path().is_dir());
        assert_ne!(first.run_id(), second.run_id());

        let results = first.search_results_dir()?;
        assert!(results.ends_with("search_results"));
        assert!(results.is_dir());
        Ok(())
    }

    #[test]
    fn test_save_json_keeps_unicode() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = save_json(
            &serde_json::json!({ "query": "Künstliche Intelligenz" }),
            &tmp.path().join("plan.json"),
        )?;

        let written = std::fs::read_to_string(path)?;
        assert_eq!(written, "{\n  \"query\": \"Künstliche Intelligenz\"\n}");
        Ok(())
    }
}
