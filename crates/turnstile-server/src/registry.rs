//! Connection registry.
//!
//! Owns every [`Connection`] in a generation-checked arena and tracks which
//! of them are registered, i.e. accepted and reachable by sessions and
//! broadcasts. A connection is created unregistered when its accept is
//! posted, registered once the socket is attached, and removed by teardown.
//!
//! Registered ids are kept ordered so frame processing visits connections in
//! a stable order from tick to tick.

use std::{collections::BTreeSet, sync::Arc};

use turnstile_core::{Arena, ConnectionId};

use crate::connection::Connection;

/// Arena of connections plus the set of registered ones.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Every live connection, registered or still waiting on its accept
    connections: Arena<Arc<Connection>>,
    /// Connections that completed accept and are reachable
    registered: BTreeSet<ConnectionId>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a connection for a posted accept.
    pub fn create(&mut self) -> Arc<Connection> {
        let (_, conn) = self.connections.insert_with(|id| Arc::new(Connection::new(id)));
        Arc::clone(conn)
    }

    /// Register an accepted connection.
    ///
    /// Returns `false` if the connection is unknown or already registered.
    pub fn add(&mut self, id: ConnectionId) -> bool {
        self.connections.contains(id) && self.registered.insert(id)
    }

    /// Unregister a connection and drop it from the arena.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.registered.remove(&id);
        self.connections.remove(id)
    }

    /// Look up any live connection.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(id).cloned()
    }

    /// Check if a connection is registered.
    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.registered.contains(&id)
    }

    /// Number of registered connections.
    pub fn size(&self) -> usize {
        self.registered.len()
    }

    /// Number of live connections, registered or not.
    pub fn live(&self) -> usize {
        self.connections.len()
    }

    /// Registered connections in id order.
    pub fn registered(&self) -> impl Iterator<Item = &Arc<Connection>> + '_ {
        self.registered.iter().filter_map(|&id| self.connections.get(id))
    }

    /// Every live connection, registered or not.
    pub fn all(&self) -> Vec<Arc<Connection>> {
        self.connections.iter().map(|(_, conn)| Arc::clone(conn)).collect()
    }

    /// Empty the registry, returning whatever was still in it.
    pub fn drain(&mut self) -> Vec<Arc<Connection>> {
        self.registered.clear();
        self.connections.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_connections_start_unregistered() {
        let mut registry = ConnectionRegistry::new();
        let conn = registry.create();

        assert!(!registry.is_registered(conn.id()));
        assert_eq!(registry.size(), 0);
        assert_eq!(registry.live(), 1);
    }

    #[test]
    fn add_and_remove() {
        let mut registry = ConnectionRegistry::new();
        let conn = registry.create();

        assert!(registry.add(conn.id()));
        assert!(!registry.add(conn.id()), "double registration");
        assert_eq!(registry.size(), 1);

        assert!(registry.remove(conn.id()).is_some());
        assert!(!registry.is_registered(conn.id()));
        assert_eq!(registry.size(), 0);
        assert_eq!(registry.live(), 0);
    }

    #[test]
    fn stale_ids_are_rejected() {
        let mut registry = ConnectionRegistry::new();
        let old = registry.create().id();
        registry.remove(old);

        let new = registry.create().id();
        assert_eq!(new.index(), old.index());
        assert!(!registry.add(old));
        assert!(registry.get(old).is_none());
        assert!(registry.add(new));
    }

    #[test]
    fn registered_iterates_in_id_order() {
        let mut registry = ConnectionRegistry::new();
        let ids: Vec<_> = (0..4).map(|_| registry.create().id()).collect();
        for id in ids.iter().rev() {
            registry.add(*id);
        }

        let seen: Vec<_> = registry.registered().map(|conn| conn.id()).collect();
        assert_eq!(seen, ids);
    }

    #[test]
    fn drain_empties_everything() {
        let mut registry = ConnectionRegistry::new();
        let a = registry.create();
        registry.create();
        registry.add(a.id());

        assert_eq!(registry.drain().len(), 2);
        assert_eq!(registry.size(), 0);
        assert_eq!(registry.live(), 0);
    }
}
