//! Users, roles and namespaces persisted via the storage façade.

mod namespaces;
mod roles;
mod users;

pub use namespaces::{Namespace, NamespaceStorage};
pub use roles::{Role, RoleStorage};
pub use users::{User, UserStorage};

use crate::storage::Storage;
use std::sync::Arc;

/// The namespace all identity records themselves live in, kept distinct
/// from user data namespaces.
pub const IDENTITY_NAMESPACE: &str = "__identity__";

/// Groups the three identity stores behind one handle.
pub struct Identity {
    pub users: UserStorage,
    pub roles: RoleStorage,
    pub namespaces: NamespaceStorage,
}

impl Identity {
    pub fn new(storage: Arc<Storage>) -> Identity {
        Identity {
            users: UserStorage::new(storage.clone()),
            roles: RoleStorage::new(storage.clone()),
            namespaces: NamespaceStorage::new(storage),
        }
    }

    /// Seeds the built-in `root`/`default` roles, the `default` namespace,
    /// the root user, and any additional defaults from configuration.
    pub async fn bootstrap(
        &self,
        root_username: &str,
        root_password: &str,
        default_users: &[(String, String, Vec<String>)],
        default_roles: &[(String, bool, bool, bool, String)],
        default_namespaces: &[String],
    ) -> crate::error::Result<()> {
        self.namespaces.append_if_absent("default").await?;
        for ns in default_namespaces {
            self.namespaces.append_if_absent(ns).await?;
        }

        for builtin in [("root", true, true, true, "default"), ("default", true, true, true, "default")] {
            let (name, get, set, del, ns) = builtin;
            if self.roles.get(name).await.is_err() {
                self.roles
                    .save(Role {
                        name: name.to_string(),
                        get,
                        set,
                        del,
                        namespace: ns.to_string(),
                    })
                    .await?;
            }
        }
        for (name, get, set, del, ns) in default_roles {
            if self.roles.get(name).await.is_err() {
                self.roles
                    .save(Role {
                        name: name.clone(),
                        get: *get,
                        set: *set,
                        del: *del,
                        namespace: ns.clone(),
                    })
                    .await?;
            }
        }

        if self.users.get(root_username).await.is_err() {
            self.users
                .save(User {
                    username: root_username.to_string(),
                    password: root_password.to_string(),
                    roles: vec!["root".to_string()],
                    current_role: Some(Role {
                        name: "root".to_string(),
                        get: true,
                        set: true,
                        del: true,
                        namespace: "default".to_string(),
                    }),
                })
                .await?;
        }
        for (username, password, roles) in default_users {
            if self.users.get(username).await.is_err() {
                self.users
                    .save(User {
                        username: username.clone(),
                        password: password.clone(),
                        roles: roles.clone(),
                        current_role: None,
                    })
                    .await?;
            }
        }
        Ok(())
    }
}
