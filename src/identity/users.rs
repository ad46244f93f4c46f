use super::roles::Role;
use super::IDENTITY_NAMESPACE;
use crate::error::{DbError, Result};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `(username, password, roles, current-role-snapshot)`. The snapshot is a
/// copy, not a reference, of the role last selected by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password: String,
    pub roles: Vec<String>,
    pub current_role: Option<Role>,
}

pub struct UserStorage {
    storage: Arc<Storage>,
}

impl UserStorage {
    pub fn new(storage: Arc<Storage>) -> UserStorage {
        UserStorage { storage }
    }

    fn entity_key(name: &str) -> String {
        format!("user:{name}")
    }

    const INDEX_KEY: &'static str = "users:index";

    pub async fn save(&self, user: User) -> Result<()> {
        if self.storage.get(IDENTITY_NAMESPACE, &Self::entity_key(&user.username)).is_ok() {
            return Err(DbError::UserAlreadyExists(user.username));
        }
        self.save_raw(user).await
    }

    pub async fn save_raw(&self, user: User) -> Result<()> {
        let encoded = serde_json::to_string(&user).map_err(|e| DbError::Internal(e.to_string()))?;
        self.storage
            .set(IDENTITY_NAMESPACE, &Self::entity_key(&user.username), &encoded, 0)
            .await?;
        let mut names = self.list().await.unwrap_or_default();
        if !names.iter().any(|n| n == &user.username) {
            names.push(user.username.clone());
            let encoded = serde_json::to_string(&names).map_err(|e| DbError::Internal(e.to_string()))?;
            self.storage.set(IDENTITY_NAMESPACE, Self::INDEX_KEY, &encoded, 0).await?;
        }
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<User> {
        let raw = self
            .storage
            .get(IDENTITY_NAMESPACE, &Self::entity_key(name))
            .map_err(|_| DbError::UserNotFound(name.to_string()))?;
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

    /// Assigns a role to a user, adding it to their role list and making it
    /// the new current-role snapshot (mirrors an explicit `ASSIGN ROLE`).
    pub async fn assign_role(&self, username: &str, role: Role) -> Result<()> {
        let mut user = self.get(username).await?;
        if !user.roles.iter().any(|r| r == &role.name) {
            user.roles.push(role.name.clone());
        }
        user.current_role = Some(role);
        self.save_raw(user).await
    }

    /// Removes a role from a user's role list (`DIVEST ROLE`). If the
    /// divested role was the current snapshot, it is cleared.
    pub async fn divest_role(&self, username: &str, role_name: &str) -> Result<()> {
        let mut user = self.get(username).await?;
        user.roles.retain(|r| r != role_name);
        if user.current_role.as_ref().map(|r| r.name.as_str()) == Some(role_name) {
            user.current_role = None;
        }
        self.save_raw(user).await
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
    async fn assign_and_divest_role() {
        let users = UserStorage::new(test_storage());
        users
            .save(User {
                username: "u1".to_string(),
                password: "p1".to_string(),
                roles: vec![],
                current_role: None,
            })
            .await
            .unwrap();
        let role = Role {
            name: "reader".to_string(),
            get: true,
            set: false,
            del: false,
            namespace: "app".to_string(),
        };
        users.assign_role("u1", role.clone()).await.unwrap();
        let user = users.get("u1").await.unwrap();
        assert_eq!(user.current_role, Some(role));
        assert_eq!(user.roles, vec!["reader".to_string()]);

        users.divest_role("u1", "reader").await.unwrap();
        let user = users.get("u1").await.unwrap();
        assert!(user.current_role.is_none());
        assert!(user.roles.is_empty());
    }
}
