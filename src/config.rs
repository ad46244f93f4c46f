//! Typed configuration consumed by `main`. Loading a file from disk is the
//! caller's job; this module only defines the shape and sane defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub partition_num: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { partition_num: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub address: String,
    pub max_connections: usize,
    pub max_message_size: usize,
    pub idle_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            address: "127.0.0.1:6380".to_string(),
            max_connections: 1024,
            max_message_size: 4096,
            idle_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalConfig {
    pub data_dir: String,
    pub max_segment_size: u64,
    pub flushing_batch_size: usize,
    pub flushing_batch_timeout_ms: u64,
    pub compression: String,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            data_dir: "./data/wal".to_string(),
            max_segment_size: 64 * 1024 * 1024,
            flushing_batch_size: 100,
            flushing_batch_timeout_ms: 20,
            compression: String::new(),
        }
    }
}

impl WalConfig {
    pub fn to_runtime(&self) -> crate::wal::WalConfig {
        crate::wal::WalConfig {
            data_dir: self.data_dir.clone(),
            max_segment_size: self.max_segment_size,
            flushing_batch_size: self.flushing_batch_size,
            flushing_batch_timeout: Duration::from_millis(self.flushing_batch_timeout_ms),
            compression: if self.compression == "gzip" {
                crate::wal::Compression::Gzip
            } else {
                crate::wal::Compression::None
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaType {
    None,
    Master,
    Slave,
}

impl Default for ReplicaType {
    fn default() -> Self {
        ReplicaType::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub replica_type: ReplicaType,
    pub master_address: String,
    pub sync_interval_secs: u64,
    pub max_replicas: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        ReplicationConfig {
            replica_type: ReplicaType::None,
            master_address: "127.0.0.1:6381".to_string(),
            sync_interval_secs: 2,
            max_replicas: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub period_secs: u64,
    pub batch_size: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        CleanupConfig {
            period_secs: 30,
            batch_size: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    pub username: String,
    pub password: String,
}

impl Default for RootConfig {
    fn default() -> Self {
        RootConfig {
            username: "root".to_string(),
            password: "root".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultRole {
    pub name: String,
    pub get: bool,
    pub set: bool,
    pub del: bool,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub network: NetworkConfig,
    pub wal: WalConfig,
    pub replication: ReplicationConfig,
    pub cleanup: CleanupConfig,
    pub root: RootConfig,
    pub default_users: Vec<DefaultUser>,
    pub default_roles: Vec<DefaultRole>,
    pub default_namespaces: Vec<String>,
}

impl Config {
    /// Parses an already-read configuration file's contents (JSON).
    /// Reading the file itself is the caller's responsibility.
    pub fn from_str(raw: &str) -> crate::error::Result<Config> {
        serde_json::from_str(raw).map_err(|e| crate::error::DbError::Internal(e.to_string()))
    }
}
