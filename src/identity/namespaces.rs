use super::IDENTITY_NAMESPACE;
use crate::error::{DbError, Result};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
}

pub struct NamespaceStorage {
    storage: Arc<Storage>,
}

impl NamespaceStorage {
    pub fn new(storage: Arc<Storage>) -> NamespaceStorage {
        NamespaceStorage { storage }
    }

    fn entity_key(name: &str) -> String {
        format!("ns:meta:{name}")
    }

    const INDEX_KEY: &'static str = "namespaces:index";

    pub async fn save(&self, name: &str) -> Result<()> {
        if self.storage.get(IDENTITY_NAMESPACE, &Self::entity_key(name)).is_ok() {
            return Err(DbError::NamespaceAlreadyExists(name.to_string()));
        }
        self.append_if_absent(name).await
    }

    /// Idempotent append used by bootstrap, where "already exists" is fine.
    pub async fn append_if_absent(&self, name: &str) -> Result<()> {
        let encoded = serde_json::to_string(&Namespace { name: name.to_string() })
            .map_err(|e| DbError::Internal(e.to_string()))?;
        self.storage.set(IDENTITY_NAMESPACE, &Self::entity_key(name), &encoded, 0).await?;
        let mut names = self.list().await.unwrap_or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
            let encoded = serde_json::to_string(&names).map_err(|e| DbError::Internal(e.to_string()))?;
            self.storage.set(IDENTITY_NAMESPACE, Self::INDEX_KEY, &encoded, 0).await?;
        }
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Namespace> {
        let raw = self
            .storage
            .get(IDENTITY_NAMESPACE, &Self::entity_key(name))
            .map_err(|_| DbError::NamespaceNotFound(name.to_string()))?;
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
