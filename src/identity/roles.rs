use super::IDENTITY_NAMESPACE;
use crate::error::{DbError, Result};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `(name, get, set, del, namespace)` — a role grants its three flags only
/// within its bound namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub get: bool,
    pub set: bool,
    pub del: bool,
    pub namespace: String,
}

impl Role {
    pub fn permits(&self, namespace: &str, get: bool, set: bool, del: bool) -> bool {
        self.namespace == namespace
            && (!get || self.get)
            && (!set || self.set)
            && (!del || self.del)
    }
}

pub struct RoleStorage {
    storage: Arc<Storage>,
}

impl RoleStorage {
    pub fn new(storage: Arc<Storage>) -> RoleStorage {
        RoleStorage { storage }
    }

    fn entity_key(name: &str) -> String {
        format!("role:{name}")
    }

    const INDEX_KEY: &'static str = "roles:index";

    pub async fn save(&self, role: Role) -> Result<()> {
        if self.storage.get(IDENTITY_NAMESPACE, &Self::entity_key(&role.name)).is_ok() {
            return Err(DbError::RoleAlreadyExists(role.name));
        }
        self.save_raw(role).await
    }

    /// Overwrites unconditionally, used by bootstrap and replicated applies.
    pub async fn save_raw(&self, role: Role) -> Result<()> {
        let encoded = serde_json::to_string(&role).map_err(|e| DbError::Internal(e.to_string()))?;
        self.storage
            .set(IDENTITY_NAMESPACE, &Self::entity_key(&role.name), &encoded, 0)
            .await?;
        self.append_index(&role.name).await
    }

    async fn append_index(&self, name: &str) -> Result<()> {
        let mut names = self.list().await.unwrap_or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
            let encoded = serde_json::to_string(&names).map_err(|e| DbError::Internal(e.to_string()))?;
            self.storage.set(IDENTITY_NAMESPACE, Self::INDEX_KEY, &encoded, 0).await?;
        }
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Role> {
        let raw = self
            .storage
            .get(IDENTITY_NAMESPACE, &Self::entity_key(name))
            .map_err(|_| DbError::RoleNotFound(name.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| DbError::Internal(e.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        match self.storage.get(IDENTITY_NAMESPACE, Self::INDEX_KEY) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| DbError::Internal(e.to_string())),
            Err(_) => Ok(Vec::new()),
        }
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.get(name).await?;
        self.storage.del(IDENTITY_NAMESPACE, &Self::entity_key(name)).await?;
        let mut names = self.list().await?;
        names.retain(|n| n != name);
        let encoded = serde_json::to_string(&names).map_err(|e| DbError::Internal(e.to_string()))?;
        self.storage.set(IDENTITY_NAMESPACE, Self::INDEX_KEY, &encoded, 0).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::storage::ReplicaRole;

    fn test_storage() -> Arc<Storage> {
        Storage::new(Arc::new(Engine::new(1)), None, ReplicaRole::None)
    }

    #[tokio::test]
    async fn save_get_list_round_trip() {
        let roles = RoleStorage::new(test_storage());
        roles
            .save(Role {
                name: "reader".to_string(),
                get: true,
                set: false,
                del: false,
                namespace: "app".to_string(),
            })
            .await
            .unwrap();
        let fetched = roles.get("reader").await.unwrap();
        assert!(fetched.permits("app", true, false, false));
        assert!(!fetched.permits("app", false, true, false));
        assert_eq!(roles.list().await.unwrap(), vec!["reader".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_save_rejected() {
        let roles = RoleStorage::new(test_storage());
        let role = Role {
            name: "reader".to_string(),
            get: true,
            set: false,
            del: false,
            namespace: "app".to_string(),
        };
        roles.save(role.clone()).await.unwrap();
        assert!(matches!(roles.save(role).await, Err(DbError::RoleAlreadyExists(_))));
    }
}
