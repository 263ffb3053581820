//! Registry of activated instance clients, keyed by instance id.
//!
//! Backed by a sharded [`DashMap`]: register, unregister and lookup can run
//! concurrently from any thread, a lookup observes either the state before or
//! after a concurrent mutation of the same key, and mutations of different
//! keys never interfere. The map itself is allocated on first registration.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::{debug, error};

use crate::crypto::CredentialResolver;
use crate::errors::ConfigError;

use super::instance::{ClientHandle, InstanceConfig};

/// Scheme of transport URIs addressing an instance, `demandware://<instanceId>`
pub const DWRE_SCHEME: &str = "demandware://";

#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: OnceLock<DashMap<String, Arc<ClientHandle>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates every configuration and registers the ones that succeed.
    /// A failing configuration blocks only its own instance.
    pub fn activate_all(
        configs: impl IntoIterator<Item = InstanceConfig>,
        credentials: &CredentialResolver,
    ) -> (Self, Vec<ConfigError>) {
        let registry = Self::new();
        let mut failures = Vec::new();

        for config in configs {
            match ClientHandle::activate(config, credentials) {
                Ok(handle) => {
                    registry.register(Arc::new(handle));
                }
                Err(e) => {
                    error!("Failed to activate instance: {}", e);
                    failures.push(e);
                }
            }
        }

        (registry, failures)
    }

    fn clients(&self) -> &DashMap<String, Arc<ClientHandle>> {
        self.clients.get_or_init(DashMap::new)
    }

    /// Adds `handle`, replacing any handle registered under the same instance id
    pub fn register(&self, handle: Arc<ClientHandle>) -> Option<Arc<ClientHandle>> {
        let instance_id = handle.instance_id().to_string();
        debug!("Register client for instance {}", instance_id);
        self.clients().insert(instance_id, handle)
    }

    /// Removes the handle registered under `handle`'s instance id, if any
    pub fn unregister(&self, handle: &ClientHandle) -> Option<Arc<ClientHandle>> {
        self.unregister_id(handle.instance_id())
    }

    pub fn unregister_id(&self, instance_id: &str) -> Option<Arc<ClientHandle>> {
        let clients = self.clients.get()?;
        let removed = clients.remove(instance_id).map(|(_, handle)| handle);
        if removed.is_some() {
            debug!("Unregistered client for instance {}", instance_id);
        }
        removed
    }

    /// Finds the client of an instance; path separators in the id are ignored
    pub fn lookup(&self, instance_id: &str) -> Option<Arc<ClientHandle>> {
        let normalized = instance_id.replace('/', "");
        let found = self
            .clients
            .get()
            .and_then(|clients| clients.get(&normalized).map(|entry| Arc::clone(entry.value())));

        if found.is_none() {
            error!("Client not found for instanceId [{}]", instance_id);
        }
        found
    }

    /// Finds the client addressed by a `demandware://<instanceId>` transport URI
    pub fn lookup_transport_uri(&self, transport_uri: &str) -> Option<Arc<ClientHandle>> {
        self.lookup(instance_id_from_uri(transport_uri))
    }

    /// Sorted ids of all registered instances
    pub fn instance_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .clients
            .get()
            .map(|clients| clients.iter().map(|entry| entry.key().clone()).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.get().map_or(0, DashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strips the transport scheme; values without it are taken as plain ids
pub fn instance_id_from_uri(transport_uri: &str) -> &str {
    transport_uri.strip_prefix(DWRE_SCHEME).unwrap_or(transport_uri)
}
