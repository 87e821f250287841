//! Conversation state kept in the cache, reconciled against the directory.

use super::{CacheError, CacheOp, CacheStore, codec, keys};
use crate::db::{Database, Participant};
use crate::state::{ConversationStatus, derive_status};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Room being assembled by an admin, one field per dialogue step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDraft {
    pub code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Typed view over the cache store.
#[derive(Clone)]
pub struct StateCache {
    store: Arc<dyn CacheStore>,
    db: Database,
}

impl StateCache {
    pub fn new(store: Arc<dyn CacheStore>, db: Database) -> Self {
        Self { store, db }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Current status of `user_id`.
    ///
    /// `scope` selects the room-scoped slot when the transport binds the
    /// conversation to a room. A miss is answered from the directory and the
    /// derived status is written back.
    ///
    /// A value that does not decode is reported once as
    /// [`CacheError::UnknownStatus`] and dropped, so the next read rebuilds it.
    pub async fn status(
        &self,
        user_id: &str,
        scope: Option<&str>,
    ) -> Result<ConversationStatus, CacheError> {
        let key = keys::user_status(scope, user_id);
        if let Some(raw) = self.store.get(&key).await? {
            return match codec::decode(&raw) {
                Ok(status) => Ok(status),
                Err(_) => {
                    warn!(user_id = %user_id, raw = %raw, "Dropping undecodable status");
                    self.store.del(&key).await?;
                    Err(CacheError::UnknownStatus(raw))
                }
            };
        }

        let status = self.reconcile_status(user_id, scope).await?;
        info!(user_id = %user_id, status = %status, "Status rebuilt from directory");
        self.set_status(user_id, scope, &status).await?;
        Ok(status)
    }

    async fn reconcile_status(
        &self,
        user_id: &str,
        scope: Option<&str>,
    ) -> Result<ConversationStatus, CacheError> {
        let participant = match scope {
            Some(room_id) => self.db.participants().find(room_id, user_id).await?,
            None => self.db.participants().find_latest_for_user(user_id).await?,
        };

        Ok(participant
            .as_ref()
            .map(derive_status)
            .unwrap_or(ConversationStatus::Free))
    }

    pub async fn set_status(
        &self,
        user_id: &str,
        scope: Option<&str>,
        status: &ConversationStatus,
    ) -> Result<(), CacheError> {
        debug!(user_id = %user_id, status = %status, "Status set");
        self.store
            .set(&keys::user_status(scope, user_id), codec::encode(status)?, None)
            .await
    }

    // ========================================================================
    // Room membership
    // ========================================================================

    /// Put the participant into its room's active set together with its snapshot.
    pub async fn add_user_to_room(&self, participant: &Participant) -> Result<(), CacheError> {
        let room_id = &participant.room_id;
        let user_id = &participant.user_id;
        self.store
            .exec(vec![
                CacheOp::SAdd {
                    key: keys::room_active_users(room_id),
                    member: user_id.clone(),
                },
                CacheOp::Set {
                    key: keys::participant_data(room_id, user_id),
                    value: codec::encode(participant)?,
                },
            ])
            .await?;
        crate::metrics::set_active_members(room_id, self.active_user_ids(room_id).await?.len());
        Ok(())
    }

    /// Take the user out of the room's active set and drop its snapshot.
    pub async fn remove_user_from_room(&self, room_id: &str, user_id: &str) -> Result<(), CacheError> {
        self.store
            .exec(vec![
                CacheOp::SRem {
                    key: keys::room_active_users(room_id),
                    member: user_id.to_string(),
                },
                CacheOp::Del {
                    key: keys::participant_data(room_id, user_id),
                },
            ])
            .await?;
        crate::metrics::set_active_members(room_id, self.active_user_ids(room_id).await?.len());
        Ok(())
    }

    pub async fn is_user_active_in_room(&self, user_id: &str, room_id: &str) -> Result<bool, CacheError> {
        self.store
            .sismember(&keys::room_active_users(room_id), user_id)
            .await
    }

    /// Ids in the room's active set. Never consults the directory.
    pub async fn active_user_ids(&self, room_id: &str) -> Result<Vec<String>, CacheError> {
        self.store.smembers(&keys::room_active_users(room_id)).await
    }

    /// Snapshot of an active participant.
    ///
    /// Falls back to the directory on a miss; an active row repopulates the
    /// snapshot (and the active set, if it was missing too). Inactive or
    /// unknown participants yield `None`.
    pub async fn participant(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, CacheError> {
        if let Some(raw) = self
            .store
            .get(&keys::participant_data(room_id, user_id))
            .await?
        {
            return Ok(Some(codec::decode(&raw)?));
        }

        let Some(participant) = self.db.participants().find(room_id, user_id).await? else {
            return Ok(None);
        };
        if !participant.is_active {
            return Ok(None);
        }

        if self.is_user_active_in_room(user_id, room_id).await? {
            self.store
                .set(
                    &keys::participant_data(room_id, user_id),
                    codec::encode(&participant)?,
                    None,
                )
                .await?;
        } else {
            self.add_user_to_room(&participant).await?;
        }
        debug!(room_id = %room_id, user_id = %user_id, "Participant snapshot restored");
        Ok(Some(participant))
    }

    /// Rebuild a room's active set and snapshots from the directory.
    pub async fn warm_room(&self, room_id: &str) -> Result<usize, CacheError> {
        let active = self.db.participants().list_active(room_id).await?;
        for participant in &active {
            self.add_user_to_room(participant).await?;
        }
        Ok(active.len())
    }

    // ========================================================================
    // Intent redelivery
    // ========================================================================

    /// Claim `message_id` from `user_id` for handling.
    ///
    /// Returns `false` when the same message was claimed within `window`.
    pub async fn claim_intent(
        &self,
        user_id: &str,
        message_id: &str,
        window: Duration,
    ) -> Result<bool, CacheError> {
        self.store
            .set_nx(&keys::intent_seen(user_id, message_id), "1".to_string(), window)
            .await
    }

    /// Forget a claim so a later redelivery is handled again.
    pub async fn release_intent(&self, user_id: &str, message_id: &str) -> Result<(), CacheError> {
        self.store.del(&keys::intent_seen(user_id, message_id)).await?;
        Ok(())
    }

    // ========================================================================
    // Room drafts
    // ========================================================================

    pub async fn draft(&self, user_id: &str) -> Result<Option<RoomDraft>, CacheError> {
        match self.store.get(&keys::room_draft(user_id)).await? {
            Some(raw) => Ok(Some(codec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_draft(&self, user_id: &str, draft: &RoomDraft) -> Result<(), CacheError> {
        self.store
            .set(&keys::room_draft(user_id), codec::encode(draft)?, None)
            .await
    }

    pub async fn clear_draft(&self, user_id: &str) -> Result<(), CacheError> {
        self.store.del(&keys::room_draft(user_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::db::NewRoom;

    async fn setup() -> (StateCache, Database, String) {
        let db = Database::new(":memory:").await.unwrap();
        let room = db
            .rooms()
            .create(&NewRoom {
                code: "ABC123".into(),
                title: "Test".into(),
                description: None,
            })
            .await
            .unwrap();
        let cache = StateCache::new(Arc::new(MemoryStore::new()), db.clone());
        (cache, db, room.id)
    }

    #[tokio::test]
    async fn status_miss_without_history_is_free_and_cached() {
        let (cache, _db, _room) = setup().await;
        assert_eq!(cache.status("u1", None).await.unwrap(), ConversationStatus::Free);
        assert!(
            cache
                .store()
                .get(&keys::user_status(None, "u1"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn status_is_rebuilt_after_eviction() {
        let (cache, db, room_id) = setup().await;
        db.participants().activate(&room_id, "u1", "alice").await.unwrap();
        db.rooms().add_participant("ABC123", "u2").await.unwrap();

        cache.store().flush().await.unwrap();

        assert_eq!(
            cache.status("u1", None).await.unwrap(),
            ConversationStatus::Participant {
                room_id: room_id.clone()
            }
        );
        assert_eq!(
            cache.status("u2", Some(&room_id)).await.unwrap(),
            ConversationStatus::InputUsername {
                room_id: room_id.clone()
            }
        );

        db.participants().deactivate(&room_id, "u1").await.unwrap();
        cache.store().flush().await.unwrap();
        assert_eq!(cache.status("u1", Some(&room_id)).await.unwrap(), ConversationStatus::Free);
    }

    #[tokio::test]
    async fn garbage_status_is_reported_once_then_rebuilt() {
        let (cache, db, room_id) = setup().await;
        db.participants().activate(&room_id, "u1", "alice").await.unwrap();
        let key = keys::user_status(None, "u1");
        cache
            .store()
            .set(&key, "{\"status\":\"LEGACY\"}".into(), None)
            .await
            .unwrap();

        assert!(matches!(
            cache.status("u1", None).await,
            Err(CacheError::UnknownStatus(raw)) if raw.contains("LEGACY")
        ));
        assert_eq!(cache.store().get(&key).await.unwrap(), None);

        assert_eq!(
            cache.status("u1", None).await.unwrap(),
            ConversationStatus::Participant { room_id }
        );
    }

    #[tokio::test]
    async fn membership_and_snapshot_move_together() {
        let (cache, db, room_id) = setup().await;
        let p = db.participants().activate(&room_id, "u1", "alice").await.unwrap();

        cache.add_user_to_room(&p).await.unwrap();
        assert!(cache.is_user_active_in_room("u1", &room_id).await.unwrap());
        assert_eq!(cache.participant(&room_id, "u1").await.unwrap(), Some(p));

        cache.remove_user_from_room(&room_id, "u1").await.unwrap();
        assert!(cache.active_user_ids(&room_id).await.unwrap().is_empty());
        assert!(
            cache
                .store()
                .get(&keys::participant_data(&room_id, "u1"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn snapshot_miss_repopulates_from_directory() {
        let (cache, db, room_id) = setup().await;
        db.participants().activate(&room_id, "u1", "alice").await.unwrap();

        let p = cache.participant(&room_id, "u1").await.unwrap().unwrap();
        assert_eq!(p.username.as_deref(), Some("alice"));
        assert_eq!(cache.active_user_ids(&room_id).await.unwrap(), vec!["u1".to_string()]);

        db.rooms().add_participant("ABC123", "u2").await.unwrap();
        assert!(cache.participant(&room_id, "u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn draft_lifecycle() {
        let (cache, _db, _room) = setup().await;
        assert!(cache.draft("admin").await.unwrap().is_none());

        let draft = RoomDraft {
            code: Some("NEW".into()),
            ..Default::default()
        };
        cache.set_draft("admin", &draft).await.unwrap();
        assert_eq!(cache.draft("admin").await.unwrap(), Some(draft));

        cache.clear_draft("admin").await.unwrap();
        assert!(cache.draft("admin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn intent_claim_is_single_use_until_released() {
        let (cache, _db, _room) = setup().await;
        let window = Duration::from_secs(60);
        assert!(cache.claim_intent("u1", "m1", window).await.unwrap());
        assert!(!cache.claim_intent("u1", "m1", window).await.unwrap());
        assert!(cache.claim_intent("u2", "m1", window).await.unwrap());

        cache.release_intent("u1", "m1").await.unwrap();
        assert!(cache.claim_intent("u1", "m1", window).await.unwrap());
    }
}
