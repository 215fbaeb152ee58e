//! Core RunStore implementation

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Unique identifier for a run
pub type RunId = String;

const META_FILE: &str = "run.json";
const MESSAGES_FILE: &str = "messages.jsonl";
const EVALS_DIR: &str = "evals";

/// Metadata kept alongside every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    /// Run identifier
    pub run_id: RunId,
    /// When the run directory was first written
    pub created_at: DateTime<Utc>,
    /// When anything in the run was last written
    pub updated_at: DateTime<Utc>,
    /// Highest iteration with stored eval results
    pub last_iteration: Option<u32>,
}

/// The main run store
pub struct RunStore {
    /// Base path for storage
    base_path: PathBuf,
}

impl RunStore {
    /// Open or create a run store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;
        debug!(?base_path, "Opened run store");
        Ok(Self { base_path })
    }

    /// Generate a fresh, time-ordered run id
    pub fn new_run_id() -> RunId {
        Uuid::now_v7().to_string()
    }

    /// Base path of this store
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_path.join(run_id)
    }

    fn iteration_path(&self, run_id: &str, iteration: u32) -> PathBuf {
        self.run_path(run_id)
            .join(EVALS_DIR)
            .join(format!("iteration-{:04}.json", iteration))
    }

    /// Store a value for `(run_id, iteration)`, replacing any previous value
    pub fn put_iteration<T: Serialize + ?Sized>(&self, run_id: &str, iteration: u32, value: &T) -> Result<()> {
        let path = self.iteration_path(run_id, iteration);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create evals directory")?;
        }

        let json = serde_json::to_string_pretty(value).context("Failed to serialize iteration results")?;
        fs::write(&path, json).context(format!("Failed to write {}", path.display()))?;

        self.touch(run_id, Some(iteration))?;
        debug!(run_id, iteration, "Stored iteration results");
        Ok(())
    }

    /// Load the value stored for `(run_id, iteration)`
    pub fn get_iteration<T: DeserializeOwned>(&self, run_id: &str, iteration: u32) -> Result<Option<T>> {
        let path = self.iteration_path(run_id, iteration);
        if !path.exists() {
            debug!(run_id, iteration, "No stored iteration results");
            return Ok(None);
        }

        let content = fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content).context(format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    /// List the iterations that have stored results for a run, ascending
    pub fn list_iterations(&self, run_id: &str) -> Result<Vec<u32>> {
        let dir = self.run_path(run_id).join(EVALS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut iterations = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str()
                && let Some(num) = name.strip_prefix("iteration-").and_then(|s| s.strip_suffix(".json"))
                && let Ok(n) = num.parse::<u32>()
            {
                iterations.push(n);
            }
        }
        iterations.sort_unstable();
        Ok(iterations)
    }

    /// Replace the stored message history of a run
    pub fn put_messages<T: Serialize>(&self, run_id: &str, messages: &[T]) -> Result<()> {
        let run_path = self.run_path(run_id);
        fs::create_dir_all(&run_path).context("Failed to create run directory")?;

        let path = run_path.join(MESSAGES_FILE);
        let mut file = fs::File::create(&path).context(format!("Failed to create {}", path.display()))?;
        for message in messages {
            let line = serde_json::to_string(message).context("Failed to serialize message")?;
            writeln!(file, "{}", line)?;
        }

        self.touch(run_id, None)?;
        info!(run_id, count = messages.len(), "Stored message history");
        Ok(())
    }

    /// Load the stored message history of a run
    pub fn get_messages<T: DeserializeOwned>(&self, run_id: &str) -> Result<Option<Vec<T>>> {
        let path = self.run_path(run_id).join(MESSAGES_FILE);
        if !path.exists() {
            debug!(run_id, "No stored message history");
            return Ok(None);
        }

        let file = fs::File::open(&path)?;
        let reader = BufReader::new(file);
        let mut messages = Vec::new();

        for (num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let message = serde_json::from_str(&line).context(format!("Invalid message on line {}", num + 1))?;
            messages.push(message);
        }

        Ok(Some(messages))
    }

    /// Load run metadata
    pub fn meta(&self, run_id: &str) -> Result<Option<RunMeta>> {
        let path = self.run_path(run_id).join(META_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let meta = serde_json::from_str(&content).context("Failed to parse run metadata")?;
        Ok(Some(meta))
    }

    /// List all runs, most recently updated first
    pub fn list_runs(&self) -> Result<Vec<RunMeta>> {
        let mut runs = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if entry.path().is_dir()
                && let Some(name) = entry.file_name().to_str()
                && let Some(meta) = self.meta(name)?
            {
                runs.push(meta);
            }
        }

        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(runs)
    }

    fn touch(&self, run_id: &str, iteration: Option<u32>) -> Result<()> {
        let now = Utc::now();
        let mut meta = self.meta(run_id)?.unwrap_or_else(|| RunMeta {
            run_id: run_id.to_string(),
            created_at: now,
            updated_at: now,
            last_iteration: None,
        });

        meta.updated_at = now;
        if let Some(iteration) = iteration {
            meta.last_iteration = Some(meta.last_iteration.map_or(iteration, |last| last.max(iteration)));
        }

        let path = self.run_path(run_id).join(META_FILE);
        fs::write(&path, serde_json::to_string_pretty(&meta)?).context("Failed to write run metadata")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        score: f64,
    }

    #[test]
    fn test_put_and_get_iteration() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::open(temp.path()).unwrap();
        let run_id = RunStore::new_run_id();

        let value = vec![Sample {
            name: "eval-a".to_string(),
            score: 0.5,
        }];
        store.put_iteration(&run_id, 3, &value).unwrap();

        let back: Option<Vec<Sample>> = store.get_iteration(&run_id, 3).unwrap();
        assert_eq!(back, Some(value));

        let missing: Option<Vec<Sample>> = store.get_iteration(&run_id, 4).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_list_iterations_sorted() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::open(temp.path()).unwrap();

        store.put_iteration("run", 2, &1).unwrap();
        store.put_iteration("run", 0, &1).unwrap();
        store.put_iteration("run", 10, &1).unwrap();

        assert_eq!(store.list_iterations("run").unwrap(), vec![0, 2, 10]);
        assert_eq!(store.meta("run").unwrap().unwrap().last_iteration, Some(10));
    }

    #[test]
    fn test_messages_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::open(temp.path()).unwrap();

        let messages = vec!["first".to_string(), "second\nwith newline".to_string()];
        store.put_messages("run-1", &messages).unwrap();

        let back: Vec<String> = store.get_messages("run-1").unwrap().unwrap();
        assert_eq!(back, messages);

        let none: Option<Vec<String>> = store.get_messages("run-2").unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_list_runs() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::open(temp.path()).unwrap();

        store.put_messages("run-a", &["hello"]).unwrap();
        store.put_iteration("run-b", 0, &"x").unwrap();

        let runs: Vec<String> = store.list_runs().unwrap().into_iter().map(|m| m.run_id).collect();
        assert_eq!(runs.len(), 2);
        assert!(runs.contains(&"run-a".to_string()));
        assert!(runs.contains(&"run-b".to_string()));
    }
}
