//! Two-level contract cache enabling modular verification.
//!
//! Level one is an in-process map from procedure name to [`Contract`];
//! level two is one JSON file per procedure, named
//! `<source-stem>_<procname>.json` and stored next to the source file.
//! A lookup consults the map first, falls back to the file, and populates
//! the map; an insert updates both levels. After a successful
//! verification the on-disk contract is canonical: the map and the file
//! agree for every procedure name.

use crate::contract::{Contract, ContractError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cache lookup/update failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no verified contract for '{name}' (looked for {})", path.display())]
    NotFound { name: String, path: PathBuf },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// In-process contract cache backed by per-procedure JSON files.
#[derive(Debug)]
pub struct ContractCache {
    source: PathBuf,
    entries: HashMap<String, Contract>,
}

/// Compute the contract file path for `name`: next to the source file,
/// `<stem>_<name>.json`, with a `.go` suffix stripped from the stem.
#[must_use]
pub fn contract_path(source: &Path, name: &str) -> PathBuf {
    let stem = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("src");
    let stem = stem.strip_suffix(".go").unwrap_or(stem);
    let file = format!("{stem}_{name}.json");
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(file),
        _ => PathBuf::from(file),
    }
}

impl ContractCache {
    /// Create an empty cache for contracts belonging to `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            entries: HashMap::new(),
        }
    }

    /// The on-disk path for a procedure's contract.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        contract_path(&self.source, name)
    }

    /// Look up a contract: memory first, then the contract file (which
    /// populates the map).
    ///
    /// # Errors
    /// [`CacheError::NotFound`] when neither level has the contract;
    /// [`CacheError::Contract`] on unreadable or invalid files.
    pub fn get(&mut self, name: &str) -> Result<&Contract, CacheError> {
        if !self.entries.contains_key(name) {
            let path = self.path_for(name);
            let contract = match Contract::load(&path) {
                Ok(c) => c,
                Err(ContractError::Read { ref source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    return Err(CacheError::NotFound {
                        name: name.to_string(),
                        path,
                    });
                }
                Err(e) => return Err(e.into()),
            };
            self.entries.insert(name.to_string(), contract);
        }
        Ok(&self.entries[name])
    }

    /// Store a freshly verified contract in both levels.
    ///
    /// # Errors
    /// Fails when the contract file cannot be written; the in-memory map
    /// is only updated after the file write succeeds, keeping the two
    /// levels in agreement.
    pub fn insert(&mut self, contract: Contract) -> Result<(), CacheError> {
        let path = self.path_for(&contract.name);
        contract.save(&path)?;
        self.entries.insert(contract.name.clone(), contract);
        Ok(())
    }
}
