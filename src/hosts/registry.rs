use super::host::{Host, HostId};
use crate::session::Credential;

/// Ordered collection of hosts keyed by stable id.
///
/// Ids come from a monotonic counter; removing a host never frees or
/// compacts ids.
#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: Vec<Host>,
    next_id: HostId,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host and return its id.
    pub fn add(
        &mut self,
        address: impl Into<String>,
        username: impl Into<String>,
        credential: Credential,
    ) -> HostId {
        let id = self.next_id;
        self.next_id += 1;
        self.hosts.push(Host::new(id, address, username, credential));
        id
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn first(&self) -> Option<&Host> {
        self.hosts.first()
    }

    pub fn get(&self, id: HostId) -> Option<&Host> {
        self.hosts.iter().find(|h| h.id == id)
    }

    pub fn get_mut(&mut self, id: HostId) -> Option<&mut Host> {
        self.hosts.iter_mut().find(|h| h.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Host> {
        self.hosts.iter_mut()
    }

    /// Remove a host, handing it back so the caller can close its session.
    pub fn remove(&mut self, id: HostId) -> Option<Host> {
        let index = self.hosts.iter().position(|h| h.id == id)?;
        Some(self.hosts.remove(index))
    }

    /// Remove every host matching `predicate`, preserving the order of the rest.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Host>
    where
        F: FnMut(&Host) -> bool,
    {
        let (removed, kept): (Vec<Host>, Vec<Host>) = std::mem::take(&mut self.hosts)
            .into_iter()
            .partition(|h| predicate(h));
        self.hosts = kept;
        removed
    }

    /// Returns `(connected, disconnected)`.
    pub fn counts(&self) -> (usize, usize) {
        let connected = self.hosts.iter().filter(|h| h.is_connected()).count();
        (connected, self.hosts.len() - connected)
    }

    pub async fn disconnect_all(&mut self) {
        for host in self.hosts.iter_mut() {
            host.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSession;

    fn registry(addresses: &[&str]) -> HostRegistry {
        let mut registry = HostRegistry::new();
        for address in addresses {
            registry.add(*address, "root", Credential::new("pw"));
        }
        registry
    }

    #[test]
    fn test_ids_follow_registration_order() {
        let registry = registry(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let ids: Vec<_> = registry.iter().map(|h| (h.id, h.address.as_str())).collect();
        assert_eq!(ids, vec![(0, "10.0.0.1"), (1, "10.0.0.2"), (2, "10.0.0.3")]);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = registry(&["a", "b"]);
        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());

        let id = registry.add("c", "root", Credential::new("pw"));
        assert_eq!(id, 2);
        assert!(registry.get(1).is_none());
        assert_eq!(registry.get(2).unwrap().address, "c");
    }

    #[test]
    fn test_remove_where_keeps_order() {
        let mut registry = registry(&["a", "b", "c", "d"]);
        registry
            .get_mut(1)
            .unwrap()
            .attach_session(FakeSession::healthy().into_session());
        registry
            .get_mut(3)
            .unwrap()
            .attach_session(FakeSession::healthy().into_session());

        let removed = registry.remove_where(|h| !h.is_connected());

        let removed: Vec<_> = removed.iter().map(|h| h.id).collect();
        let kept: Vec<_> = registry.iter().map(|h| h.id).collect();
        assert_eq!(removed, vec![0, 2]);
        assert_eq!(kept, vec![1, 3]);
        assert_eq!(registry.counts(), (2, 0));
    }

    #[tokio::test]
    async fn test_disconnect_all() {
        let mut registry = registry(&["a", "b"]);
        for host in registry.iter_mut() {
            host.attach_session(FakeSession::healthy().into_session());
        }
        assert_eq!(registry.counts(), (2, 0));

        registry.disconnect_all().await;
        assert_eq!(registry.counts(), (0, 2));
        assert_eq!(registry.len(), 2);
    }
}
