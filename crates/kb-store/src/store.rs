//! File-backed store
//!
//! The [`Store`] holds a stack of environments, base first and current last.
//! Named sandboxes are pushed with [`Store::activate`]; transactions push an
//! environment of their own and are popped by commit or abort. Every write
//! lands in the current environment. Reads fall back to ancestors according
//! to each environment's [`ReadMissPolicy`].

use crate::environment::{Area, Environment, EnvironmentConfig, ReadMissPolicy, CONFIG_FILE, ENVS_DIR};
use crate::error::StoreError;
use crate::foreign_key::{ForeignKeyError, ForeignKeyLink, ForeignKeyRegistry, REGISTRY_FILE};
use crate::handle::{is_path_safe, ManifestHandle, ManifestIdentity};
use crate::manifest::Manifest;
use crate::transaction::{new_transaction_id, EventKind, TransactionFrame, TXN_PREFIX};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Name of the environment at the store root
pub const BASE_ENVIRONMENT: &str = "base";

/// Manifest store with nested environments and transactions
#[derive(Debug)]
pub struct Store {
    chain: Vec<Environment>,
    transactions: Vec<TransactionFrame>,
}

impl Store {
    /// Open (creating if needed) a store rooted at `root`
    ///
    /// # Errors
    /// Returns error if the area directories cannot be created
    pub fn open(root: impl Into<PathBuf>, config: EnvironmentConfig) -> Result<Self, StoreError> {
        let root = root.into();
        create_areas(&root)?;
        tracing::debug!("Opened store at {}", root.display());
        Ok(Self {
            chain: vec![Environment::new(BASE_ENVIRONMENT, None, root, config)],
            transactions: Vec::new(),
        })
    }

    /// Current environment
    #[must_use]
    pub fn current(&self) -> &Environment {
        // The base environment is never popped
        &self.chain[self.chain.len() - 1]
    }

    /// Base environment
    #[must_use]
    pub fn base(&self) -> &Environment {
        &self.chain[0]
    }

    /// Names of the active environments, base first
    #[must_use]
    pub fn environment_path(&self) -> Vec<&str> {
        self.chain.iter().map(Environment::name).collect()
    }

    /// True while a transaction is active
    #[inline]
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        !self.transactions.is_empty()
    }

    /// Number of nested transactions
    #[inline]
    #[must_use]
    pub fn transaction_depth(&self) -> usize {
        self.transactions.len()
    }

    /// Id of the innermost transaction
    #[must_use]
    pub fn transaction_id(&self) -> Option<&str> {
        self.transactions.last().map(|f| f.id.as_str())
    }

    // ---------------------------------------------------------------------
    // Environments
    // ---------------------------------------------------------------------

    /// Create a named sandbox under the current environment
    ///
    /// # Errors
    /// Fails inside a transaction, for unusable or taken names, or on I/O errors
    pub fn create_environment(
        &mut self,
        name: &str,
        config: EnvironmentConfig,
    ) -> Result<(), StoreError> {
        self.ensure_no_transaction("create an environment")?;
        check_environment_name(name)?;
        let root = self.current().child_root(name);
        if root.exists() {
            return Err(StoreError::EnvironmentExists {
                name: name.to_string(),
            });
        }
        create_areas(&root)?;
        let config_path = root.join(CONFIG_FILE);
        let text = serde_yaml::to_string(&config).map_err(|source| StoreError::Yaml {
            path: config_path.clone(),
            source,
        })?;
        fs::write(&config_path, text).map_err(|e| StoreError::fs(config_path, e))?;
        tracing::info!("Created environment '{}' under '{}'", name, self.current().name());
        Ok(())
    }

    /// Make child environment `name` current
    ///
    /// # Errors
    /// Fails inside a transaction or if the environment does not exist
    pub fn activate(&mut self, name: &str) -> Result<(), StoreError> {
        self.ensure_no_transaction("activate an environment")?;
        check_environment_name(name)?;
        let parent = self.current();
        let root = parent.child_root(name);
        if !root.is_dir() {
            return Err(StoreError::EnvironmentNotFound {
                name: name.to_string(),
                parent: parent.name().to_string(),
            });
        }
        let config_path = root.join(CONFIG_FILE);
        let config = match fs::read_to_string(&config_path) {
            Ok(text) => serde_yaml::from_str(&text).map_err(|source| StoreError::Yaml {
                path: config_path,
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EnvironmentConfig::default(),
            Err(e) => return Err(StoreError::fs(config_path, e)),
        };
        let env = Environment::new(name, Some(parent.name().to_string()), root, config);
        tracing::info!("Activated environment '{}'", name);
        self.chain.push(env);
        Ok(())
    }

    /// Return to the parent of the current environment
    ///
    /// # Errors
    /// Fails inside a transaction or at the base environment
    pub fn deactivate(&mut self) -> Result<(), StoreError> {
        self.ensure_no_transaction("deactivate an environment")?;
        if self.chain.len() == 1 {
            return Err(StoreError::AtBaseEnvironment);
        }
        if let Some(env) = self.chain.pop() {
            tracing::info!("Deactivated environment '{}'", env.name());
        }
        Ok(())
    }

    /// Delete child environment `name` and everything in it
    ///
    /// # Errors
    /// Fails inside a transaction or if the environment does not exist
    pub fn remove_environment(&mut self, name: &str) -> Result<(), StoreError> {
        self.ensure_no_transaction("remove an environment")?;
        check_environment_name(name)?;
        let root = self.current().child_root(name);
        if !root.is_dir() {
            return Err(StoreError::EnvironmentNotFound {
                name: name.to_string(),
                parent: self.current().name().to_string(),
            });
        }
        fs::remove_dir_all(&root).map_err(|e| StoreError::fs(root, e))?;
        tracing::info!("Removed environment '{}'", name);
        Ok(())
    }

    /// Named sandboxes under the current environment
    ///
    /// # Errors
    /// Returns error if the directory cannot be read
    pub fn environments(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.current().root().join(ENVS_DIR);
        let mut names: Vec<String> = read_dir_names(&dir)?
            .into_iter()
            .filter(|n| !n.starts_with(TXN_PREFIX))
            .collect();
        names.sort();
        Ok(names)
    }

    // ---------------------------------------------------------------------
    // Transactions
    // ---------------------------------------------------------------------

    /// Begin a (possibly nested) transaction; returns its id
    ///
    /// # Errors
    /// Returns error if the transaction environment cannot be created
    pub fn begin_transaction(&mut self) -> Result<String, StoreError> {
        let id = new_transaction_id();
        let parent = self.current().name().to_string();
        let root = self.current().child_root(&id);
        create_areas(&root)?;

        let config = EnvironmentConfig {
            read_misses: ReadMissPolicy::FailoverToParent,
        };
        self.chain
            .push(Environment::new(id.clone(), Some(parent.clone()), root, config));
        self.transactions.push(TransactionFrame::new(id.clone(), parent));
        tracing::info!("Began transaction {} (depth {})", id, self.transactions.len());
        Ok(id)
    }

    /// Commit the innermost transaction into its parent
    ///
    /// Every tracked change is replayed onto the parent environment. If the
    /// parent is itself a transaction, the changes are recorded there too.
    /// The transaction stays active, and abortable, until replay succeeds.
    ///
    /// # Errors
    /// - [`StoreError::NoActiveTransaction`] without a transaction
    /// - [`StoreError::TransactionStackCorrupted`] if the stack is inconsistent
    /// - I/O errors during replay
    pub fn commit_transaction(&mut self) -> Result<(), StoreError> {
        self.check_transaction_stack()?;
        let n = self.chain.len();
        let env = &self.chain[n - 1];
        let parent = &self.chain[n - 2];
        let frame = &self.transactions[self.transactions.len() - 1];

        for event in &frame.events {
            let src = env.path(event.area, &event.rel_path);
            let dst = parent.path(event.area, &event.rel_path);
            match event.kind {
                EventKind::Write => {
                    // Absent when a later event deleted it
                    if src.is_file() {
                        copy_file(event.area, &src, &dst)?;
                    }
                }
                EventKind::Delete => remove_file_if_exists(event.area, &dst)?,
            }
        }
        remove_dir_if_exists(env.root())?;

        let events = frame.events.clone();
        let id = frame.id.clone();
        self.chain.pop();
        self.transactions.pop();
        if let Some(outer) = self.transactions.last_mut() {
            for event in &events {
                outer.record(event.area, event.rel_path.clone(), event.kind);
            }
        }
        tracing::info!(
            "Committed transaction {} ({} changes) into '{}'",
            id,
            events.len(),
            self.current().name()
        );
        Ok(())
    }

    /// Discard the innermost transaction
    ///
    /// # Errors
    /// - [`StoreError::NoActiveTransaction`] without a transaction
    /// - I/O errors while deleting the transaction environment
    pub fn abort_transaction(&mut self) -> Result<(), StoreError> {
        self.check_transaction_stack()?;
        remove_dir_if_exists(self.current().root())?;
        self.chain.pop();
        if let Some(frame) = self.transactions.pop() {
            tracing::info!(
                "Aborted transaction {} ({} changes discarded)",
                frame.id,
                frame.events.len()
            );
        }
        Ok(())
    }

    fn check_transaction_stack(&self) -> Result<(), StoreError> {
        let frame = self
            .transactions
            .last()
            .ok_or(StoreError::NoActiveTransaction)?;
        let n = self.chain.len();
        if n < 2 || self.chain[n - 1].name() != frame.id {
            return Err(StoreError::TransactionStackCorrupted {
                detail: format!(
                    "current environment '{}' is not transaction '{}'",
                    self.current().name(),
                    frame.id
                ),
            });
        }
        if self.chain[n - 2].name() != frame.parent {
            return Err(StoreError::TransactionStackCorrupted {
                detail: format!(
                    "transaction '{}' began in '{}' but its parent is now '{}'",
                    frame.id,
                    frame.parent,
                    self.chain[n - 2].name()
                ),
            });
        }
        Ok(())
    }

    fn ensure_no_transaction(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.in_transaction() {
            Err(StoreError::TransactionActive { operation })
        } else {
            Ok(())
        }
    }

    // ---------------------------------------------------------------------
    // Area I/O
    // ---------------------------------------------------------------------

    /// Write a file into the current environment
    ///
    /// # Errors
    /// Returns error for unusable paths or on I/O failure
    pub fn write(
        &mut self,
        area: Area,
        rel: impl AsRef<Path>,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        let rel = check_rel(rel.as_ref())?;
        let path = self.current().path(area, &rel);
        write_file(area, &path, bytes)?;
        if let Some(frame) = self.transactions.last_mut() {
            frame.record(area, rel, EventKind::Write);
        }
        Ok(())
    }

    /// Read a file, failing over to ancestors per their read-miss policy
    ///
    /// A file found in an ancestor is copied into the current environment.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no consulted environment has the file
    pub fn read(&mut self, area: Area, rel: impl AsRef<Path>) -> Result<Vec<u8>, StoreError> {
        let rel = check_rel(rel.as_ref())?;
        let top = self.chain.len() - 1;
        let Some((idx, path)) = self.locate(area, &rel) else {
            return Err(StoreError::NotFound { area, path: rel });
        };
        let bytes = fs::read(&path).map_err(|e| StoreError::io(area, path.clone(), e))?;
        if idx != top {
            let local = self.current().path(area, &rel);
            write_file(area, &local, &bytes)?;
            tracing::debug!(
                "Copied {} down from '{}' into '{}'",
                rel.display(),
                self.chain[idx].name(),
                self.current().name()
            );
        }
        Ok(bytes)
    }

    /// Read a UTF-8 file
    ///
    /// # Errors
    /// As [`Store::read`], plus invalid UTF-8
    pub fn read_to_string(
        &mut self,
        area: Area,
        rel: impl AsRef<Path>,
    ) -> Result<String, StoreError> {
        let rel = rel.as_ref();
        let bytes = self.read(area, rel)?;
        String::from_utf8(bytes).map_err(|e| StoreError::Io {
            path: rel.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }

    /// Delete a file
    ///
    /// Inside a transaction the deletion hides the file from the whole
    /// transaction view and is replayed on commit. Outside a transaction
    /// only files of the current environment can be deleted.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if there is nothing to delete
    pub fn delete(&mut self, area: Area, rel: impl AsRef<Path>) -> Result<(), StoreError> {
        let rel = check_rel(rel.as_ref())?;
        let local = self.current().path(area, &rel);
        let visible = self.locate(area, &rel).is_some();
        if local.is_file() {
            fs::remove_file(&local).map_err(|e| StoreError::io(area, local, e))?;
        } else if !visible || !self.in_transaction() {
            return Err(StoreError::NotFound { area, path: rel });
        }
        if let Some(frame) = self.transactions.last_mut() {
            frame.record(area, rel, EventKind::Delete);
        }
        Ok(())
    }

    /// True if the file is visible from the current environment
    #[must_use]
    pub fn exists(&self, area: Area, rel: impl AsRef<Path>) -> bool {
        check_rel(rel.as_ref())
            .ok()
            .and_then(|rel| self.locate(area, &rel))
            .is_some()
    }

    /// Entries of a directory, unioned across the environments a read
    /// would consult
    ///
    /// # Errors
    /// Returns error for unusable paths or unreadable directories
    pub fn list(&self, area: Area, rel_dir: impl AsRef<Path>) -> Result<Vec<String>, StoreError> {
        let rel_dir = check_rel_dir(rel_dir.as_ref())?;
        let mut names = BTreeSet::new();
        for idx in self.consulted(self.chain.len() - 1) {
            names.extend(read_dir_names(&self.chain[idx].path(area, &rel_dir))?);
        }
        Ok(names
            .into_iter()
            .filter(|n| self.locate(area, &rel_dir.join(n)).is_some())
            .collect())
    }

    /// Environments a read starting at `idx` consults, nearest first
    fn consulted(&self, idx: usize) -> Vec<usize> {
        let mut out = vec![idx];
        let mut i = idx;
        while i > 0 && self.chain[i].config().read_misses == ReadMissPolicy::FailoverToParent {
            i -= 1;
            out.push(i);
        }
        out
    }

    fn frame_of(&self, idx: usize) -> Option<&TransactionFrame> {
        let first = self.chain.len() - self.transactions.len();
        idx.checked_sub(first).and_then(|i| self.transactions.get(i))
    }

    /// Nearest environment holding `rel`, honoring deletions
    fn locate(&self, area: Area, rel: &Path) -> Option<(usize, PathBuf)> {
        for idx in self.consulted(self.chain.len() - 1) {
            let path = self.chain[idx].path(area, rel);
            if path.exists() {
                return Some((idx, path));
            }
            if self.frame_of(idx).is_some_and(|f| f.is_deleted(area, rel)) {
                return None;
            }
        }
        None
    }

    // ---------------------------------------------------------------------
    // Manifests
    // ---------------------------------------------------------------------

    /// Persisted versions of a document, ascending
    ///
    /// # Errors
    /// Returns error for invalid identities or unreadable directories
    pub fn versions(&self, identity: &ManifestIdentity) -> Result<Vec<u32>, StoreError> {
        identity.validate()?;
        let mut versions: Vec<u32> = self
            .list(Area::Manifests, identity.rel_dir())?
            .iter()
            .filter_map(|n| identity.parse_version(n))
            .collect();
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }

    /// Latest persisted version of a document
    ///
    /// # Errors
    /// As [`Store::versions`]
    pub fn latest_version(&self, identity: &ManifestIdentity) -> Result<Option<u32>, StoreError> {
        Ok(self.versions(identity)?.last().copied())
    }

    /// Persist a new version of a document
    ///
    /// Checks run before anything is written: the version must directly
    /// follow the latest one (or be 1 for a new document), and the new
    /// version must keep every UID still referenced by other documents.
    ///
    /// # Errors
    /// - [`StoreError::MissingPriorVersion`], [`StoreError::VersionGap`] or
    ///   [`StoreError::VersionConflict`] for out-of-sequence versions
    /// - [`StoreError::ForeignKey`] if live references would be orphaned
    pub fn persist_manifest(&mut self, manifest: &Manifest) -> Result<ManifestHandle, StoreError> {
        let handle = manifest.handle();
        handle.identity.validate()?;
        if handle.version == 0 {
            return Err(StoreError::InvalidIdentity {
                component: "version",
                value: "0".to_string(),
            });
        }
        check_sequence(&handle, self.latest_version(&handle.identity)?)?;

        let uids = manifest.uids()?;
        let registry = self.foreign_keys()?;
        let mut persisted = BTreeMap::new();
        for referencing in registry.referencing_identities(&handle.identity) {
            if let Some(latest) = self.latest_version(&referencing)? {
                persisted.insert(referencing, latest);
            }
        }
        registry.check_constraints(&handle, &uids, &persisted)?;

        let rel = handle.rel_path();
        let text = manifest.to_yaml().map_err(|source| StoreError::Yaml {
            path: rel.clone(),
            source,
        })?;
        self.write(Area::Manifests, &rel, text.as_bytes())?;
        tracing::info!("Persisted {} in '{}'", handle, self.current().name());
        Ok(handle)
    }

    /// Read one version of a document
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the version does not exist
    pub fn retrieve_manifest(&mut self, handle: &ManifestHandle) -> Result<Manifest, StoreError> {
        handle.identity.validate()?;
        let rel = handle.rel_path();
        let bytes = self.read(Area::Manifests, &rel)?;
        let manifest: Manifest =
            serde_yaml::from_slice(&bytes).map_err(|source| StoreError::Yaml {
                path: rel.clone(),
                source,
            })?;
        if manifest.handle() != *handle {
            return Err(StoreError::ManifestMismatch {
                path: rel,
                expected: handle.to_string(),
                found: manifest.handle().to_string(),
            });
        }
        Ok(manifest)
    }

    /// Latest version of a document, if any
    ///
    /// # Errors
    /// As [`Store::retrieve_manifest`]
    pub fn latest_manifest(
        &mut self,
        identity: &ManifestIdentity,
    ) -> Result<Option<Manifest>, StoreError> {
        match self.latest_version(identity)? {
            Some(version) => self.retrieve_manifest(&identity.at_version(version)).map(Some),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Foreign keys
    // ---------------------------------------------------------------------

    /// Registry visible from the current environment
    ///
    /// # Errors
    /// Returns error if the registry file is unreadable
    pub fn foreign_keys(&mut self) -> Result<ForeignKeyRegistry, StoreError> {
        match self.read(Area::System, REGISTRY_FILE) {
            Ok(bytes) => serde_yaml::from_slice(&bytes).map_err(|source| StoreError::Yaml {
                path: PathBuf::from(REGISTRY_FILE),
                source,
            }),
            Err(e) if e.is_not_found() => Ok(ForeignKeyRegistry::new()),
            Err(e) => Err(e),
        }
    }

    /// Validate and record a foreign-key link
    ///
    /// The referencing version must be persisted, and the referenced UIDs
    /// must exist in the latest version of the referenced document.
    ///
    /// # Errors
    /// - [`StoreError::NotFound`] for missing documents
    /// - [`StoreError::ForeignKey`] for stale or dangling references
    pub fn register_foreign_key(&mut self, link: ForeignKeyLink) -> Result<(), StoreError> {
        let referencing_rel = link.referencing.rel_path();
        if !self.exists(Area::Manifests, &referencing_rel) {
            return Err(StoreError::NotFound {
                area: Area::Manifests,
                path: referencing_rel,
            });
        }

        let latest = self
            .latest_version(&link.referenced.identity)?
            .ok_or_else(|| StoreError::NotFound {
                area: Area::Manifests,
                path: link.referenced.rel_path(),
            })?;
        if link.referenced.version != latest {
            return Err(ForeignKeyError::StaleReference {
                referencing: link.referencing.to_string(),
                referenced: link.referenced.identity.to_string(),
                latest,
            }
            .into());
        }

        let target = self.retrieve_manifest(&link.referenced)?.uids()?;
        let missing: Vec<String> = link
            .uids
            .difference(&target)
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ForeignKeyError::DanglingReference {
                referencing: link.referencing.to_string(),
                referenced: link.referenced.to_string(),
                missing,
            }
            .into());
        }

        let mut registry = self.foreign_keys()?;
        tracing::debug!(
            "Registering link {} ({}) -> {}",
            link.referencing,
            link.path,
            link.referenced
        );
        registry.register(link);
        let text = serde_yaml::to_string(&registry).map_err(|source| StoreError::Yaml {
            path: PathBuf::from(REGISTRY_FILE),
            source,
        })?;
        self.write(Area::System, REGISTRY_FILE, text.as_bytes())
    }
}

fn check_sequence(handle: &ManifestHandle, latest: Option<u32>) -> Result<(), StoreError> {
    let version = handle.version;
    match latest {
        None if version == 1 => Ok(()),
        None => Err(StoreError::MissingPriorVersion {
            handle: handle.to_string(),
            version,
        }),
        Some(latest) if version == latest + 1 => Ok(()),
        Some(latest) if version <= latest => Err(StoreError::VersionConflict {
            handle: handle.to_string(),
            latest,
        }),
        Some(latest) => Err(StoreError::VersionGap {
            handle: handle.to_string(),
            latest,
        }),
    }
}

fn check_environment_name(name: &str) -> Result<(), StoreError> {
    if is_path_safe(name) && !name.starts_with(TXN_PREFIX) && name != ENVS_DIR {
        Ok(())
    } else {
        Err(StoreError::InvalidEnvironmentName {
            name: name.to_string(),
        })
    }
}

/// Relative file path with only normal components
fn check_rel(rel: &Path) -> Result<PathBuf, StoreError> {
    let rel = check_rel_dir(rel)?;
    if rel.as_os_str().is_empty() {
        return Err(StoreError::InvalidIdentity {
            component: "path",
            value: String::new(),
        });
    }
    Ok(rel)
}

/// Relative directory path; empty means the area root
fn check_rel_dir(rel: &Path) -> Result<PathBuf, StoreError> {
    let mut out = PathBuf::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(StoreError::InvalidIdentity {
                    component: "path",
                    value: rel.display().to_string(),
                })
            }
        }
    }
    Ok(out)
}

fn create_areas(root: &Path) -> Result<(), StoreError> {
    for area in Area::ALL {
        let dir = root.join(area.dir_name());
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(area, dir, e))?;
    }
    Ok(())
}

fn write_file(area: Area, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(area, dir.to_path_buf(), e))?;
    }
    fs::write(path, bytes).map_err(|e| StoreError::io(area, path.to_path_buf(), e))
}

fn copy_file(area: Area, src: &Path, dst: &Path) -> Result<(), StoreError> {
    if let Some(dir) = dst.parent() {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(area, dir.to_path_buf(), e))?;
    }
    fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| StoreError::io(area, dst.to_path_buf(), e))
}

fn remove_file_if_exists(area: Area, path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(StoreError::io(area, path.to_path_buf(), e))
        }
        _ => Ok(()),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(StoreError::fs(path.to_path_buf(), e))
        }
        _ => Ok(()),
    }
}

fn read_dir_names(dir: &Path) -> Result<Vec<String>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::fs(dir.to_path_buf(), e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::fs(dir.to_path_buf(), e))?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path(), EnvironmentConfig::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_areas() {
        let (dir, _store) = store();
        for area in Area::ALL {
            assert!(dir.path().join(area.dir_name()).is_dir());
        }
    }

    #[test]
    fn sequence_rules() {
        let h = |v| ManifestHandle::new("n", "d", "K", v);
        assert!(check_sequence(&h(1), None).is_ok());
        assert!(matches!(
            check_sequence(&h(2), None),
            Err(StoreError::MissingPriorVersion { .. })
        ));
        assert!(check_sequence(&h(3), Some(2)).is_ok());
        assert!(matches!(
            check_sequence(&h(2), Some(2)),
            Err(StoreError::VersionConflict { .. })
        ));
        assert!(matches!(
            check_sequence(&h(1), Some(2)),
            Err(StoreError::VersionConflict { .. })
        ));
        assert!(matches!(
            check_sequence(&h(4), Some(2)),
            Err(StoreError::VersionGap { .. })
        ));
    }

    #[test]
    fn rel_paths_must_stay_inside_the_area() {
        assert!(check_rel(Path::new("a/b.yaml")).is_ok());
        assert!(check_rel(Path::new("../b.yaml")).is_err());
        assert!(check_rel(Path::new("/etc/passwd")).is_err());
        assert!(check_rel(Path::new("")).is_err());
        assert_eq!(check_rel_dir(Path::new("")).unwrap(), PathBuf::new());
    }

    #[test]
    fn commit_without_transaction_fails() {
        let (_dir, mut store) = store();
        assert!(matches!(
            store.commit_transaction(),
            Err(StoreError::NoActiveTransaction)
        ));
        assert!(matches!(
            store.abort_transaction(),
            Err(StoreError::NoActiveTransaction)
        ));
    }

    #[test]
    fn transaction_environment_lives_under_envs() {
        let (dir, mut store) = store();
        let id = store.begin_transaction().unwrap();
        assert_eq!(store.current().name(), id);
        assert_eq!(store.current().parent(), Some(BASE_ENVIRONMENT));
        assert!(dir.path().join(ENVS_DIR).join(&id).join("manifests").is_dir());
        store.abort_transaction().unwrap();
        assert!(!dir.path().join(ENVS_DIR).join(&id).exists());
        assert_eq!(store.current().name(), BASE_ENVIRONMENT);
    }

    #[test]
    fn environment_management_is_blocked_in_transactions() {
        let (_dir, mut store) = store();
        store.begin_transaction().unwrap();
        assert!(matches!(
            store.create_environment("sandbox", EnvironmentConfig::default()),
            Err(StoreError::TransactionActive { .. })
        ));
        assert!(matches!(
            store.deactivate(),
            Err(StoreError::TransactionActive { .. })
        ));
    }

    #[test]
    fn environment_names_are_checked() {
        let (_dir, mut store) = store();
        for bad in ["", "a/b", "txn-1", "..", ENVS_DIR] {
            assert!(
                matches!(
                    store.create_environment(bad, EnvironmentConfig::default()),
                    Err(StoreError::InvalidEnvironmentName { .. })
                ),
                "{bad}"
            );
        }
    }
}
