use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::password::{hash_password, verify_password};
use super::{DirectoryError, UserDirectory};
use crate::auth::Identity;

#[derive(Debug, Clone)]
struct StoredUser {
    identity: Identity,
    password_hash: String,
}

/// Process-local directory keyed by username.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    users: Arc<DashMap<String, StoredUser>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn verify(&self, username: &str, password: &str) -> Result<Option<Identity>, DirectoryError> {
        let Some(user) = self.users.get(username) else {
            return Ok(None);
        };
        if verify_password(password, &user.password_hash) {
            Ok(Some(user.identity.clone()))
        } else {
            Ok(None)
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.identity.id == id)
            .map(|entry| entry.identity.clone()))
    }

    async fn register(&self, username: &str, password: &str, scope: &str) -> Result<Identity, DirectoryError> {
        let password_hash = hash_password(password)?;
        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(DirectoryError::UsernameTaken),
            Entry::Vacant(slot) => {
                let identity = Identity {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    username: username.to_string(),
                    scope: scope.to_string(),
                    is_active: true,
                };
                slot.insert(StoredUser {
                    identity: identity.clone(),
                    password_hash,
                });
                Ok(identity)
            }
        }
    }

    async fn set_active(&self, username: &str, active: bool) -> Result<(), DirectoryError> {
        let mut user = self.users.get_mut(username).ok_or(DirectoryError::UnknownUser)?;
        user.identity.is_active = active;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Identity>, DirectoryError> {
        let mut users: Vec<Identity> = self.users.iter().map(|e| e.identity.clone()).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_verify() {
        let dir = MemoryDirectory::new();
        let created = dir.register("alice", "secret1", "admin").await.unwrap();
        assert_eq!(created.id, 1);
        assert!(created.is_active);

        let found = dir.verify("alice", "secret1").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(dir.verify("alice", "wrong!!").await.unwrap().is_none());
        assert!(dir.verify("bob", "secret1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let dir = MemoryDirectory::new();
        dir.register("alice", "secret1", "user").await.unwrap();
        let err = dir.register("alice", "other12", "user").await.unwrap_err();
        assert!(matches!(err, DirectoryError::UsernameTaken));
    }

    #[tokio::test]
    async fn test_deactivate_is_visible_by_id() {
        let dir = MemoryDirectory::new();
        let alice = dir.register("alice", "secret1", "user").await.unwrap();
        dir.set_active("alice", false).await.unwrap();

        let found = dir.find_by_id(alice.id).await.unwrap().unwrap();
        assert!(!found.is_active);
        assert!(matches!(
            dir.set_active("nobody", false).await,
            Err(DirectoryError::UnknownUser)
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_by_id() {
        let dir = MemoryDirectory::new();
        dir.register("b", "secret1", "user").await.unwrap();
        dir.register("a", "secret1", "user").await.unwrap();
        let ids: Vec<i64> = dir.list().await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
