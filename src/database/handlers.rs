use super::Database;
use crate::compute::ParsedCommand;
use crate::engine::now_unix;
use crate::error::{DbError, Result};
use crate::identity::Role;
use crate::session::Session;
use parking_lot::RwLock;
use std::sync::Arc;

/// Commands that require the session's authenticated user to be the root
/// identity. Grouped with §4.5's administrative/introspection list, plus
/// the role-management commands that sit in the same trust tier.
const ADMIN_COMMANDS: &[&str] = &[
    "CREATE USER",
    "DELETE USER",
    "CREATE ROLE",
    "DELETE ROLE",
    "CREATE NAMESPACE",
    "DELETE NAMESPACE",
    "ASSIGN ROLE",
    "DIVEST ROLE",
    "GET USER",
    "GET ROLE",
    "USERS",
    "ROLES",
    "NAMESPACES",
    "SESSIONS",
    "STAT",
];

pub async fn dispatch(
    db: &Database,
    session: &Arc<RwLock<Session>>,
    command: &ParsedCommand,
) -> Result<String> {
    if ADMIN_COMMANDS.contains(&command.name.as_str()) {
        let is_root = session.read().username.as_deref() == Some(db.root_username.as_str());
        if !is_root {
            return Err(DbError::PermissionDenied);
        }
    }

    match command.name.as_str() {
        "AUTH" => auth(db, session, command).await,
        "SET" => set(db, session, command).await,
        "GET" => get(db, session, command),
        "DEL" => del(db, session, command).await,
        "WATCH" => watch(db, session, command).await,
        "SET NS" => setns(db, session, command).await,
        "CREATE USER" => create_user(db, command).await,
        "CREATE ROLE" => create_role(db, command).await,
        "CREATE NAMESPACE" => create_namespace(db, command).await,
        "DELETE USER" => delete_user(db, command).await,
        "DELETE ROLE" => delete_role(db, command).await,
        "DELETE NAMESPACE" => delete_namespace(db, command).await,
        "ASSIGN ROLE" => assign_role(db, command).await,
        "DIVEST ROLE" => divest_role(db, command).await,
        "GET USER" => get_user(db, command).await,
        "GET ROLE" => get_role(db, command).await,
        "USERS" => list_users(db).await,
        "ROLES" => list_roles(db).await,
        "NAMESPACES" => list_namespaces(db).await,
        "SESSIONS" => Ok(db.sessions.list_ids().join(",")),
        "ME" => me(session),
        "STAT" => stat(db),
        "HELP" => Ok(help_text()),
        other => Err(DbError::ParseError(format!("unhandled command: {other}"))),
    }
}

fn resolve_namespace(session: &Arc<RwLock<Session>>, command: &ParsedCommand) -> String {
    if let Some(ns) = command.args.named.get("NS") {
        return ns.clone();
    }
    session.read().namespace.clone()
}

/// Parses a duration string (`"30s"`, `"5m"`, `"1h"`, or a bare integer of
/// seconds) into an absolute unix-seconds expiry, or `0` for no TTL.
fn parse_ttl(raw: Option<&String>) -> Result<u64> {
    let Some(raw) = raw else { return Ok(0) };
    let (digits, unit) = raw
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| raw.split_at(i))
        .unwrap_or((raw.as_str(), ""));
    let value: u64 = digits
        .parse()
        .map_err(|_| DbError::ParseError(format!("invalid TTL: {raw}")))?;
    let secs = match unit {
        "" | "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        other => return Err(DbError::ParseError(format!("invalid TTL unit: {other}"))),
    };
    Ok(now_unix() + secs)
}

fn check_permission(session: &Arc<RwLock<Session>>, namespace: &str, get: bool, set: bool, del: bool) -> Result<()> {
    let guard = session.read();
    match &guard.current_role {
        Some(role) if role.permits(namespace, get, set, del) => Ok(()),
        _ => Err(DbError::PermissionDenied),
    }
}

async fn auth(db: &Database, session: &Arc<RwLock<Session>>, command: &ParsedCommand) -> Result<String> {
    let username = &command.args.positional[0];
    let password = &command.args.positional[1];

    let user = db
        .identity
        .users
        .get(username)
        .await
        .map_err(|_| DbError::AuthenticationFailed)?;
    if &user.password != password {
        return Err(DbError::AuthenticationFailed);
    }

    let mut guard = session.write();
    guard.username = Some(username.clone());
    guard.current_role = user.current_role;
    Ok("authentication successful".to_string())
}

async fn set(db: &Database, session: &Arc<RwLock<Session>>, command: &ParsedCommand) -> Result<String> {
    let key = &command.args.positional[0];
    let value = &command.args.positional[1];
    let namespace = resolve_namespace(session, command);
    check_permission(session, &namespace, false, true, false)?;
    let ttl = parse_ttl(command.args.named.get("TTL"))?;
    db.storage.set(&namespace, key, value, ttl).await?;
    Ok(String::new())
}

fn get(db: &Database, session: &Arc<RwLock<Session>>, command: &ParsedCommand) -> Result<String> {
    let key = &command.args.positional[0];
    let namespace = resolve_namespace(session, command);
    check_permission(session, &namespace, true, false, false)?;
    db.storage.get(&namespace, key)
}

async fn del(db: &Database, session: &Arc<RwLock<Session>>, command: &ParsedCommand) -> Result<String> {
    let key = &command.args.positional[0];
    let namespace = resolve_namespace(session, command);
    check_permission(session, &namespace, false, false, true)?;
    db.storage.del(&namespace, key).await?;
    Ok(String::new())
}

async fn watch(db: &Database, session: &Arc<RwLock<Session>>, command: &ParsedCommand) -> Result<String> {
    let key = &command.args.positional[0];
    let namespace = resolve_namespace(session, command);
    check_permission(session, &namespace, true, false, false)?;
    let watcher = db.storage.watch(&namespace, key);
    // Bounded by the connection's idle deadline rather than `pending()`:
    // an unbounded wait here would hold the session and its connection
    // semaphore permit forever once a client issues `WATCH` and goes away.
    let value = watcher.wait_for_next(tokio::time::sleep(db.watch_deadline)).await;
    Ok(value)
}

async fn setns(db: &Database, session: &Arc<RwLock<Session>>, command: &ParsedCommand) -> Result<String> {
    let namespace = &command.args.positional[0];
    db.identity
        .namespaces
        .get(namespace)
        .await
        .map_err(|_| DbError::NamespaceNotFound(namespace.clone()))?;
    session.write().namespace = namespace.clone();
    Ok(String::new())
}

async fn create_user(db: &Database, command: &ParsedCommand) -> Result<String> {
    let username = command.args.positional[0].clone();
    let password = command.args.positional[1].clone();
    db.identity
        .users
        .save(crate::identity::User {
            username,
            password,
            roles: Vec::new(),
            current_role: None,
        })
        .await?;
    Ok(String::new())
}

/// Parses a permission token made only of `r`/`w`/`d` characters (in any
/// combination, any order). Empty or containing any other character is
/// rejected rather than silently producing an all-`false` role.
fn parse_perms(raw: &str) -> Result<(bool, bool, bool)> {
    if raw.is_empty() || !raw.chars().all(|c| matches!(c, 'r' | 'w' | 'd')) {
        return Err(DbError::InvalidPerms(raw.to_string()));
    }
    Ok((raw.contains('r'), raw.contains('w'), raw.contains('d')))
}

async fn create_role(db: &Database, command: &ParsedCommand) -> Result<String> {
    let name = command.args.positional[0].clone();
    let (get, set, del) = parse_perms(&command.args.positional[1])?;
    let namespace = command.args.positional[2].clone();
    db.identity.roles.save(Role { name, get, set, del, namespace }).await?;
    Ok(String::new())
}

async fn create_namespace(db: &Database, command: &ParsedCommand) -> Result<String> {
    db.identity.namespaces.save(&command.args.positional[0]).await?;
    Ok(String::new())
}

async fn delete_user(db: &Database, command: &ParsedCommand) -> Result<String> {
    db.identity.users.delete(&command.args.positional[0]).await?;
    Ok(String::new())
}

async fn delete_role(db: &Database, command: &ParsedCommand) -> Result<String> {
    db.identity.roles.delete(&command.args.positional[0]).await?;
    Ok(String::new())
}

async fn delete_namespace(db: &Database, command: &ParsedCommand) -> Result<String> {
    db.identity.namespaces.delete(&command.args.positional[0]).await?;
    Ok(String::new())
}

async fn assign_role(db: &Database, command: &ParsedCommand) -> Result<String> {
    let username = &command.args.positional[0];
    let role_name = &command.args.positional[1];
    let role = db.identity.roles.get(role_name).await?;
    db.identity.users.assign_role(username, role).await?;
    Ok(String::new())
}

async fn divest_role(db: &Database, command: &ParsedCommand) -> Result<String> {
    let username = &command.args.positional[0];
    let role_name = &command.args.positional[1];
    db.identity.users.divest_role(username, role_name).await?;
    Ok(String::new())
}

async fn get_user(db: &Database, command: &ParsedCommand) -> Result<String> {
    let user = db.identity.users.get(&command.args.positional[0]).await?;
    Ok(format!("{} roles={}", user.username, user.roles.join("|")))
}

async fn get_role(db: &Database, command: &ParsedCommand) -> Result<String> {
    let role = db.identity.roles.get(&command.args.positional[0]).await?;
    Ok(format!(
        "{} get={} set={} del={} ns={}",
        role.name, role.get, role.set, role.del, role.namespace
    ))
}

async fn list_users(db: &Database) -> Result<String> {
    Ok(db.identity.users.list().await?.join(","))
}

async fn list_roles(db: &Database) -> Result<String> {
    Ok(db.identity.roles.list().await?.join(","))
}

async fn list_namespaces(db: &Database) -> Result<String> {
    Ok(db.identity.namespaces.list().await?.join(","))
}

fn me(session: &Arc<RwLock<Session>>) -> Result<String> {
    let guard = session.read();
    let username = guard.username.clone().unwrap_or_default();
    Ok(format!("{} ns={}", username, guard.namespace))
}

fn stat(db: &Database) -> Result<String> {
    use std::sync::atomic::Ordering;
    let stats = &db.storage.stats;
    Ok(format!(
        "sets={} gets={} dels={} expired_cleanups={}",
        stats.sets.load(Ordering::Relaxed),
        stats.gets.load(Ordering::Relaxed),
        stats.dels.load(Ordering::Relaxed),
        stats.expired_cleanups.load(Ordering::Relaxed),
    ))
}

fn help_text() -> String {
    crate::compute::COMMANDS
        .iter()
        .map(|(tokens, _)| tokens.join(" "))
        .collect::<Vec<_>>()
        .join(", ")
}
