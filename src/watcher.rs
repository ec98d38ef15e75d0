//! Watched module set
//!
//! The resolved, deduplicated filesystem roots of the "clients" and "others"
//! groups. Built once when instrumentation is enabled and shared read-only
//! by the attributor for the rest of the session.

use crate::config::WatchConfig;
use crate::locator::{self, LocateError, ModuleLocator, WatchedRoot};
use std::path::Path;
use thiserror::Error;

/// Configuration errors that abort enabling instrumentation
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Unresolved watched module: {0}")]
    UnresolvedModule(#[from] LocateError),
}

/// Absolute directory roots of the watched modules, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchedModuleSet {
    clients: Vec<WatchedRoot>,
    others: Vec<WatchedRoot>,
}

impl WatchedModuleSet {
    /// Resolve the configured module names
    ///
    /// Fails on the first name the locator cannot resolve. A root already
    /// present in the clients group is not repeated in others.
    pub fn resolve(config: &WatchConfig, locator: &dyn ModuleLocator) -> Result<Self, WatchError> {
        let clients = locator::resolve(locator, &config.clients)?;
        let others = locator::resolve(locator, &config.others)?
            .into_iter()
            .filter(|other| !clients.iter().any(|client| client.path == other.path))
            .collect();

        Ok(Self { clients, others })
    }

    /// Build directly from already-resolved roots
    pub fn from_roots(clients: Vec<WatchedRoot>, others: Vec<WatchedRoot>) -> Self {
        Self { clients, others }
    }

    pub fn clients(&self) -> &[WatchedRoot] {
        &self.clients
    }

    pub fn others(&self) -> &[WatchedRoot] {
        &self.others
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty() && self.others.is_empty()
    }

    pub fn verify_clients_path(&self, path: &Path) -> bool {
        locator::path_in_set(path, &self.clients)
    }

    pub fn verify_others_path(&self, path: &Path) -> bool {
        locator::path_in_set(path, &self.others)
    }

    /// True iff `path` lies under any watched root (clients ∪ others)
    pub fn verify_path(&self, path: &Path) -> bool {
        self.verify_clients_path(path) || self.verify_others_path(path)
    }

    /// First client root matched by `files`
    ///
    /// Files are tried in the order given; for each file the client roots
    /// are tried in declaration order.
    pub fn detect_client_used<'a, I, P>(&self, files: I) -> Option<&WatchedRoot>
    where
        I: IntoIterator<Item = &'a P>,
        P: AsRef<Path> + ?Sized + 'a,
    {
        files.into_iter().find_map(|file| {
            self.clients
                .iter()
                .find(|client| file.as_ref().starts_with(&client.path))
        })
    }
}
