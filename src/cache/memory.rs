//! In-process [`CacheStore`] on top of `DashMap`.
//!
//! Expiry is lazy: an expired entry is treated as absent and removed the next
//! time its key is touched. Keys that are never touched again (redelivery
//! markers, abandoned locks) go on [`MemoryStore::purge_expired`]. Time comes
//! from `tokio::time`, so tests can pause and advance the clock.

use super::{CacheError, CacheOp, CacheStore};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum Entry {
    Value {
        value: String,
        expires_at: Option<Instant>,
    },
    Set(HashSet<String>),
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self, Entry::Value { expires_at: Some(at), .. } if *at <= now)
    }
}

/// Process-local cache store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    /// Single operations take it shared, `exec` batches take it exclusive.
    batch_gate: RwLock<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn get_value(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                return match entry.value() {
                    Entry::Value { value, .. } => Ok(Some(value.clone())),
                    Entry::Set(_) => Err(CacheError::WrongType(key.to_string())),
                };
            }
        };
        if expired {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
        }
        Ok(None)
    }

    fn set_value(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), Entry::Value { value, expires_at });
    }

    fn add_member(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(Entry::Set(HashSet::from([member.to_string()])));
                    return Ok(true);
                }
                match occupied.get_mut() {
                    Entry::Set(members) => Ok(members.insert(member.to_string())),
                    Entry::Value { .. } => Err(CacheError::WrongType(key.to_string())),
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::Set(HashSet::from([member.to_string()])));
                Ok(true)
            }
        }
    }

    fn remove_member(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let removed = match self.entries.get_mut(key) {
            None => return Ok(false),
            Some(mut entry) => match entry.value_mut() {
                Entry::Set(members) => members.remove(member),
                Entry::Value { .. } => return Err(CacheError::WrongType(key.to_string())),
            },
        };
        // Empty sets do not exist.
        self.entries
            .remove_if(key, |_, e| matches!(e, Entry::Set(members) if members.is_empty()));
        Ok(removed)
    }

    fn apply(&self, op: CacheOp) -> Result<(), CacheError> {
        match op {
            CacheOp::Set { key, value } => self.set_value(&key, value, None),
            CacheOp::Del { key } => {
                self.entries.remove(&key);
            }
            CacheOp::SAdd { key, member } => {
                self.add_member(&key, &member)?;
            }
            CacheOp::SRem { key, member } => {
                self.remove_member(&key, &member)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let _gate = self.batch_gate.read();
        self.get_value(key)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let _gate = self.batch_gate.read();
        self.set_value(key, value, ttl);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError> {
        let _gate = self.batch_gate.read();
        let now = Instant::now();
        let entry = Entry::Value {
            value,
            expires_at: Some(now + ttl),
        };
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(entry);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(true)
            }
        }
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        let _gate = self.batch_gate.read();
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let _gate = self.batch_gate.read();
        let now = Instant::now();
        Ok(self
            .entries
            .remove_if(key, |_, e| {
                !e.is_expired(now) && matches!(e, Entry::Value { value, .. } if value == expected)
            })
            .is_some())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let _gate = self.batch_gate.read();
        self.add_member(key, member)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let _gate = self.batch_gate.read();
        self.remove_member(key, member)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let _gate = self.batch_gate.read();
        match self.entries.get(key) {
            None => Ok(Vec::new()),
            Some(entry) => match entry.value() {
                Entry::Set(members) => Ok(members.iter().cloned().collect()),
                Entry::Value { .. } => Err(CacheError::WrongType(key.to_string())),
            },
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let _gate = self.batch_gate.read();
        match self.entries.get(key) {
            None => Ok(false),
            Some(entry) => match entry.value() {
                Entry::Set(members) => Ok(members.contains(member)),
                Entry::Value { .. } => Err(CacheError::WrongType(key.to_string())),
            },
        }
    }

    async fn exec(&self, ops: Vec<CacheOp>) -> Result<(), CacheError> {
        let _gate = self.batch_gate.write();
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let _gate = self.batch_gate.write();
        self.entries.clear();
        Ok(())
    }
}
