//! # NamespaceDB Server
//!
//! Loads configuration, seeds identity defaults, and starts the TCP
//! server (plus the replication master/slave loop, if configured).

use namespacedb::config::{Config, ReplicaType};
use namespacedb::database::Database;
use namespacedb::engine::Engine;
use namespacedb::identity::Identity;
use namespacedb::network::{Server, ServerConfig};
use namespacedb::replication::{Master, Slave};
use namespacedb::session::SessionManager;
use namespacedb::storage::{ReplicaRole, Storage};
use namespacedb::wal::Wal;
use namespacedb::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match config_path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Config::from_str(&raw)?
        }
        None => Config::default(),
    };

    info!(address = %config.network.address, "starting namespacedb-server");

    let engine = Arc::new(Engine::new(config.engine.partition_num));

    let replica_role = match config.replication.replica_type {
        ReplicaType::None => ReplicaRole::None,
        ReplicaType::Master => ReplicaRole::Master,
        ReplicaType::Slave => ReplicaRole::Slave,
    };

    let wal = Wal::open(config.wal.to_runtime())?;
    let storage = Storage::new(engine, Some(wal.clone()), replica_role);

    info!("replaying write-ahead log");
    wal.recover(|op, args| storage.apply_replicated(op, args))?;
    wal.clone().start();

    let identity = Identity::new(storage.clone());
    identity
        .bootstrap(
            &config.root.username,
            &config.root.password,
            &config
                .default_users
                .iter()
                .map(|u| (u.username.clone(), u.password.clone(), u.roles.clone()))
                .collect::<Vec<_>>(),
            &config
                .default_roles
                .iter()
                .map(|r| (r.name.clone(), r.get, r.set, r.del, r.namespace.clone()))
                .collect::<Vec<_>>(),
            &config.default_namespaces,
        )
        .await?;
    drop(identity);

    if config.cleanup.period_secs > 0 {
        storage
            .clone()
            .spawn_cleanup_sweeper(Duration::from_secs(config.cleanup.period_secs), config.cleanup.batch_size);
    }

    match config.replication.replica_type {
        ReplicaType::Master => {
            let master = Master::new(wal.storage().clone(), config.replication.max_replicas);
            let master_address = config.replication.master_address.clone();
            tokio::spawn(async move {
                if let Err(e) = master.serve(&master_address).await {
                    tracing::error!(error = %e, "replication master exited");
                }
            });
        }
        ReplicaType::Slave => {
            let slave = Slave::new(
                config.replication.master_address.clone(),
                wal.storage().clone(),
                storage.clone(),
                Duration::from_secs(config.replication.sync_interval_secs),
            )?;
            slave.spawn();
        }
        ReplicaType::None => {}
    }

    let idle_timeout = Duration::from_secs(config.network.idle_timeout_secs);
    let sessions = SessionManager::new();
    let db = Arc::new(Database::new(storage, sessions, config.root.username.clone(), idle_timeout));

    let server = Server::new(
        db,
        ServerConfig {
            address: config.network.address,
            max_connections: config.network.max_connections,
            max_message_size: config.network.max_message_size,
            idle_timeout,
        },
    );
    server.run().await
}
