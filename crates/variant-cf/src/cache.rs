//! TTL-bounded name cache
//!
//! Space and organization records change rarely, so lookups are cached for
//! twelve hours. Expired entries are dropped lazily on access, with a full
//! sweep once the sweep interval has elapsed.

use crate::client::CloudController;
use crate::{CfResult, Organization, Space};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// How long a cached name record stays valid
pub const NAME_CACHE_TTL: Duration = Duration::from_secs(720 * 60);

/// How often expired entries are swept out wholesale
pub const NAME_CACHE_SWEEP: Duration = Duration::from_secs(1440 * 60);

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A small TTL-indexed map. Not internally synchronized; callers wrap it in
/// a lock.
pub struct TtlCache<V> {
    entries: HashMap<String, Entry<V>>,
    ttl: Duration,
    sweep_interval: Duration,
    last_sweep: Instant,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            sweep_interval,
            last_sweep: Instant::now(),
        }
    }

    /// Look up a key, dropping it when expired. Runs the periodic sweep
    /// first when it is due.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.maybe_sweep();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn maybe_sweep(&mut self) {
        if self.last_sweep.elapsed() < self.sweep_interval {
            return;
        }
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
        self.last_sweep = Instant::now();
    }
}

/// Read-through resolver for space and organization display names.
pub struct NameResolver {
    spaces: Mutex<TtlCache<Space>>,
    orgs: Mutex<TtlCache<Organization>>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self {
            spaces: Mutex::new(TtlCache::new(NAME_CACHE_TTL, NAME_CACHE_SWEEP)),
            orgs: Mutex::new(TtlCache::new(NAME_CACHE_TTL, NAME_CACHE_SWEEP)),
        }
    }

    /// Resolve `(org_name, space_name)` for a space GUID, populating the
    /// caches from the control plane on miss.
    pub async fn org_and_space_names(
        &self,
        client: &dyn CloudController,
        space_guid: &str,
    ) -> CfResult<(String, String)> {
        let cached_space = self.spaces.lock().await.get(space_guid);
        let space = match cached_space {
            Some(space) => space,
            None => {
                debug!(space_guid, "name cache miss, fetching space");
                let space = client.space(space_guid).await?;
                self.spaces.lock().await.insert(space_guid, space.clone());
                space
            }
        };

        let cached_org = self.orgs.lock().await.get(&space.organization_guid);
        let org = match cached_org {
            Some(org) => org,
            None => {
                debug!(org_guid = %space.organization_guid, "name cache miss, fetching org");
                let org = client.organization(&space.organization_guid).await?;
                self.orgs
                    .lock()
                    .await
                    .insert(space.organization_guid.clone(), org.clone());
                org
            }
        };

        Ok((org.name, space.name))
    }
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new()
    }
}
