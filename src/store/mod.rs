//! Name-keyed JSON document stores for saved requests and environments.
//!
//! Each store is a single pretty-printed JSON object mapping names to
//! records. Every write rewrites the whole file; the last writer wins.

use std::{
    fs,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Serialize};

use crate::model::{Environment, Request};

pub const REQUESTS_FILE: &str = "api-calls.json";
pub const ENVIRONMENTS_FILE: &str = "environments.json";

/// A record stored under its own name.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Request {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for Environment {
    fn key(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

pub type RequestStore = JsonStore<Request>;
pub type EnvironmentStore = JsonStore<Environment>;

impl RequestStore {
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(REQUESTS_FILE))
    }

    pub fn in_group(&self, group: &str) -> Result<Vec<Request>> {
        Ok(self
            .load_all()?
            .into_values()
            .filter(|request| request.group.as_deref() == Some(group))
            .collect())
    }
}

impl EnvironmentStore {
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ENVIRONMENTS_FILE))
    }
}

impl<T> JsonStore<T>
where
    T: Keyed + Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records by name. A missing file is an empty store.
    pub fn load_all(&self) -> Result<IndexMap<String, T>> {
        if !self.path.exists() {
            return Ok(IndexMap::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading store {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(IndexMap::new());
        }

        let records: Option<IndexMap<String, T>> = serde_json::from_str(&contents)
            .with_context(|| format!("parsing store {}", self.path.display()))?;
        Ok(records.unwrap_or_default())
    }

    pub fn load(&self, name: &str) -> Result<Option<T>> {
        Ok(self.load_all()?.shift_remove(name))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.load_all()?.contains_key(name))
    }

    /// Inserts or replaces the record stored under its name.
    pub fn save(&self, record: &T) -> Result<()>
    where
        T: Clone,
    {
        let mut records = self.load_all()?;
        records.insert(record.key().to_string(), record.clone());
        self.write_all(&records)
    }

    /// Removes `name`, returning whether it was present.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut records = self.load_all()?;
        if records.shift_remove(name).is_none() {
            return Ok(false);
        }
        self.write_all(&records)?;
        Ok(true)
    }

    fn write_all(&self, records: &IndexMap<String, T>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating data directory {}", dir.display()))?;
        }

        let json = serde_json::to_string_pretty(records)
            .with_context(|| format!("serializing store {}", self.path.display()))?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing store {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "store saved");
        Ok(())
    }
}
