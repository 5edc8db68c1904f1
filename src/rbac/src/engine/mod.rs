//! RBAC engine
//!
//! Orchestrates entity creation, hierarchy mutation and the authorization
//! queries built on the breadth-first traversal.
//!
//! ```text
//! caller → Rbac ─┬─ naming / entity validation
//!                ├─ Storage (add / remove / grant / revoke / lookups)
//!                └─ traverse(visitor) → can / can_any / can_all / has_role / get_scope
//! ```

pub mod traverse;

pub use traverse::Visit;

use crate::config::{GrantMap, PermissionMap, RbacConfig};
use crate::entity::{EngineId, Entity, Node, Permission, Role};
use crate::error::{RbacError, Result};
use crate::matrix::PermissionMatrix;
use crate::naming;
use crate::storage::{EngineBinding, MemoryStorage, Storage};

use futures::future::try_join_all;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Whether a call chain may touch the protected super role
///
/// Only [`Rbac::init`], [`Rbac::create`] with `Elevated` and
/// [`Rbac::delete_all`] run elevated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Privilege {
    #[default]
    Standard,
    Elevated,
}

/// Entities produced by a bulk operation, keyed by name
#[derive(Debug, Clone, Default, Serialize)]
pub struct RbacSnapshot {
    pub roles: IndexMap<String, Role>,
    pub permissions: IndexMap<String, Permission>,
}

impl RbacSnapshot {
    pub fn role_names(&self) -> Vec<&str> {
        self.roles.keys().map(String::as_str).collect()
    }

    pub fn permission_names(&self) -> Vec<&str> {
        self.permissions.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.permissions.is_empty()
    }
}

/// Role hierarchy engine bound to one storage backend
pub struct Rbac {
    /// Identity stamped on every entity this engine creates
    id: EngineId,

    /// Delimiter, super role and initial policy
    config: RbacConfig,

    /// Bound storage backend
    storage: Arc<dyn Storage>,
}

impl Rbac {
    /// Create an engine and bind `storage` to it
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an invalid configuration, `FailedPrecondition`
    /// if the storage is already bound to another engine.
    pub fn new(config: RbacConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        config.validate()?;

        let id = EngineId::new();
        storage.bind(EngineBinding::new(id, config.delimiter.clone()))?;

        info!(
            "Rbac engine {} initialized with delimiter='{}', super_role='{}'",
            id, config.delimiter, config.super_role
        );

        Ok(Self {
            id,
            config,
            storage,
        })
    }

    /// Engine backed by a fresh [`MemoryStorage`]
    pub fn with_config(config: RbacConfig) -> Result<Self> {
        Self::new(config, Arc::new(MemoryStorage::new()))
    }

    /// Engine with default configuration and in-memory storage
    pub fn in_memory() -> Result<Self> {
        Self::with_config(RbacConfig::default())
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn config(&self) -> &RbacConfig {
        &self.config
    }

    pub fn delimiter(&self) -> &str {
        &self.config.delimiter
    }

    pub fn super_role(&self) -> &str {
        &self.config.super_role
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Apply the configured roles, permissions and grants in privileged mode
    pub async fn init(&self) -> Result<RbacSnapshot> {
        info!(
            "Initializing {} roles, {} resources, {} grant lists",
            self.config.roles.len(),
            self.config.permissions.len(),
            self.config.grants.len()
        );

        self.create(
            &self.config.roles,
            &self.config.permissions,
            Some(&self.config.grants),
            Privilege::Elevated,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a role and, if `persist`, add it to storage
    pub async fn create_role(&self, name: &str, persist: bool) -> Result<Role> {
        self.create_role_with(name, persist, Privilege::Standard).await
    }

    /// Create several roles; storage calls run concurrently
    pub async fn create_roles<S>(&self, names: &[S], persist: bool) -> Result<IndexMap<String, Role>>
    where
        S: AsRef<str> + Sync,
    {
        self.create_roles_with(names, persist, Privilege::Standard)
            .await
    }

    /// Create a permission and, if `persist`, add it to storage
    pub async fn create_permission(
        &self,
        action: &str,
        resource: &str,
        persist: bool,
    ) -> Result<Permission> {
        let permission = Permission::new(self.id, action, resource, self.delimiter())?;
        if persist {
            self.add(&permission).await?;
        }

        Ok(permission)
    }

    /// Create every (action, resource) permission of a resource → actions map
    pub async fn create_permissions(
        &self,
        resources: &PermissionMap,
        persist: bool,
    ) -> Result<IndexMap<String, Permission>> {
        let mut permissions = IndexMap::new();

        for (resource, actions) in resources {
            for action in actions {
                let permission = self.create_permission(action, resource, persist).await?;
                permissions.insert(permission.name().to_string(), permission);
            }
        }

        Ok(permissions)
    }

    /// Create roles, permissions and optionally grants in one step
    ///
    /// Progress made before a failure is kept.
    pub async fn create<S>(
        &self,
        roles: &[S],
        permissions: &PermissionMap,
        grants: Option<&GrantMap>,
        privilege: Privilege,
    ) -> Result<RbacSnapshot>
    where
        S: AsRef<str> + Sync,
    {
        let (permissions, roles) = futures::try_join!(
            self.create_permissions(permissions, true),
            self.create_roles_with(roles, true, privilege),
        )?;

        if let Some(grants) = grants {
            self.grants_with(grants, privilege).await?;
        }

        Ok(RbacSnapshot { roles, permissions })
    }

    async fn create_role_with(&self, name: &str, persist: bool, privilege: Privilege) -> Result<Role> {
        let role = Role::new(self.id, name, self.delimiter())?;
        if persist {
            self.add_with(&role, privilege).await?;
        }

        Ok(role)
    }

    async fn create_roles_with<S>(
        &self,
        names: &[S],
        persist: bool,
        privilege: Privilege,
    ) -> Result<IndexMap<String, Role>>
    where
        S: AsRef<str> + Sync,
    {
        let roles = try_join_all(
            names
                .iter()
                .map(|name| self.create_role_with(name.as_ref(), persist, privilege)),
        )
        .await?;

        Ok(roles
            .into_iter()
            .map(|role| (role.name().to_string(), role))
            .collect())
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Register a role or permission with storage
    pub async fn add<T: Entity + ?Sized>(&self, item: &T) -> Result<bool> {
        self.add_with(item, Privilege::Standard).await
    }

    async fn add_with<T: Entity + ?Sized>(&self, item: &T, privilege: Privilege) -> Result<bool> {
        self.check_owner(item)?;
        self.check_protected(item.name(), privilege)?;

        self.storage.add(&item.to_node()).await
    }

    /// Grant `child` (role or permission) to `role`
    pub async fn grant<C: Entity + ?Sized>(&self, role: &Role, child: &C) -> Result<bool> {
        self.grant_with(role, child, Privilege::Standard).await
    }

    async fn grant_with<C: Entity + ?Sized>(
        &self,
        role: &Role,
        child: &C,
        privilege: Privilege,
    ) -> Result<bool> {
        self.check_owner(role)?;
        self.check_owner(child)?;
        self.check_protected(child.name(), privilege)?;

        if role.name() == child.name() {
            return Err(RbacError::Conflict(format!(
                "You can not grant yourself {}",
                role.name()
            )));
        }

        self.storage.grant(role, &child.to_node()).await
    }

    /// Grant by names; both must exist
    pub async fn grant_by_name(&self, role: &str, child: &str) -> Result<bool> {
        self.grant_by_name_with(role, child, Privilege::Standard)
            .await
    }

    async fn grant_by_name_with(&self, role: &str, child: &str, privilege: Privilege) -> Result<bool> {
        let (role, child) = self.resolve_edge(role, child).await?;
        self.grant_with(&role, &child, privilege).await
    }

    /// Apply `grant_by_name` for every (role, child) pair; stops at the first failure
    pub async fn grants(&self, grants: &GrantMap) -> Result<IndexMap<String, Vec<bool>>> {
        self.grants_with(grants, Privilege::Standard).await
    }

    async fn grants_with(
        &self,
        grants: &GrantMap,
        privilege: Privilege,
    ) -> Result<IndexMap<String, Vec<bool>>> {
        let mut results = IndexMap::with_capacity(grants.len());

        for (role, children) in grants {
            let mut written = Vec::with_capacity(children.len());
            for child in children {
                written.push(self.grant_by_name_with(role, child, privilege).await?);
            }
            results.insert(role.clone(), written);
        }

        Ok(results)
    }

    /// Revoke `child` from `role`
    pub async fn revoke<C: Entity + ?Sized>(&self, role: &Role, child: &C) -> Result<bool> {
        self.check_owner(role)?;
        self.check_owner(child)?;
        self.check_protected(role.name(), Privilege::Standard)?;
        self.check_protected(child.name(), Privilege::Standard)?;

        self.storage.revoke(role, &child.to_node()).await
    }

    /// Revoke by names; both must exist
    pub async fn revoke_by_name(&self, role: &str, child: &str) -> Result<bool> {
        let (role, child) = self.resolve_edge(role, child).await?;
        self.revoke(&role, &child).await
    }

    /// Remove a role or permission and every edge pointing at it
    pub async fn remove<T: Entity + ?Sized>(&self, item: &T) -> Result<bool> {
        self.remove_with(item, Privilege::Standard).await
    }

    async fn remove_with<T: Entity + ?Sized>(&self, item: &T, privilege: Privilege) -> Result<bool> {
        self.check_owner(item)?;
        self.check_protected(item.name(), privilege)?;

        self.storage.remove(&item.to_node()).await
    }

    /// Remove the entity stored under `name`
    pub async fn remove_by_name(&self, name: &str) -> Result<bool> {
        let item = self
            .get(name)
            .await?
            .ok_or_else(|| RbacError::NotFound(format!("Item '{name}' does not exist")))?;

        self.remove(&item).await
    }

    /// Remove every permission, then every role
    ///
    /// Runs elevated: the super role is removed as well.
    pub async fn delete_all(&self) -> Result<RbacSnapshot> {
        for permission in self.get_permissions().await? {
            self.remove_with(&permission, Privilege::Elevated).await?;
            debug!("permission {} deleted", permission.name());
        }

        for role in self.get_roles().await? {
            self.remove_with(&role, Privilege::Elevated).await?;
            debug!("role {} deleted", role.name());
        }

        Ok(RbacSnapshot::default())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Role or permission stored under `name`
    pub async fn get(&self, name: &str) -> Result<Option<Node>> {
        self.storage.get(name).await
    }

    pub async fn get_role(&self, name: &str) -> Result<Option<Role>> {
        self.storage.get_role(name).await
    }

    pub async fn get_roles(&self) -> Result<Vec<Role>> {
        self.storage.get_roles().await
    }

    pub async fn get_permission(&self, action: &str, resource: &str) -> Result<Option<Permission>> {
        self.storage.get_permission(action, resource).await
    }

    /// Permission stored under an encoded grant name
    pub async fn get_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let decoded = naming::decode(name, self.delimiter())?;
        self.get_permission(&decoded.action, &decoded.resource)
            .await
    }

    pub async fn get_permissions(&self) -> Result<Vec<Permission>> {
        self.storage.get_permissions().await
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.storage.exists(name).await
    }

    pub async fn exists_role(&self, name: &str) -> Result<bool> {
        self.storage.exists_role(name).await
    }

    pub async fn exists_permission(&self, action: &str, resource: &str) -> Result<bool> {
        self.storage.exists_permission(action, resource).await
    }

    /// Action × resource table of every stored permission
    pub async fn permission_matrix(&self) -> Result<PermissionMatrix> {
        let permissions = self.get_permissions().await?;
        Ok(PermissionMatrix::from_permissions(&permissions))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Walk the hierarchy below `role` with a caller-supplied visitor
    pub async fn traverse<T, F>(&self, role: &str, visitor: F) -> Result<Option<T>>
    where
        F: FnMut(&Node) -> Visit<T>,
    {
        traverse::traverse(self.storage.as_ref(), role, visitor).await
    }

    /// True if `role` reaches the permission (action, resource)
    pub async fn can(&self, role: &str, action: &str, resource: &str) -> Result<bool> {
        let found = self
            .traverse(role, |node| match node {
                Node::Permission(permission) if permission.can(action, resource) => Visit::Stop(()),
                _ => Visit::Continue,
            })
            .await?;

        debug!("can {} {} {}: {}", role, action, resource, found.is_some());
        Ok(found.is_some())
    }

    /// True if `role` reaches any of the given permissions
    pub async fn can_any<A, R>(&self, role: &str, permissions: &[(A, R)]) -> Result<bool>
    where
        A: AsRef<str> + Sync,
        R: AsRef<str> + Sync,
    {
        let names = naming::permission_names(permissions, self.delimiter())?;
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();

        let found = self
            .traverse(role, |node| match node {
                Node::Permission(permission) if wanted.contains(permission.name()) => {
                    Visit::Stop(())
                }
                _ => Visit::Continue,
            })
            .await?;

        Ok(found.is_some())
    }

    /// True if `role` reaches every distinct permission given
    pub async fn can_all<A, R>(&self, role: &str, permissions: &[(A, R)]) -> Result<bool>
    where
        A: AsRef<str> + Sync,
        R: AsRef<str> + Sync,
    {
        let names = naming::permission_names(permissions, self.delimiter())?;
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        if wanted.is_empty() {
            return Ok(true);
        }

        let mut found: HashSet<String> = HashSet::with_capacity(wanted.len());
        self.traverse(role, |node| {
            if let Node::Permission(permission) = node {
                let name = permission.name();
                if wanted.contains(name)
                    && found.insert(name.to_string())
                    && found.len() == wanted.len()
                {
                    return Visit::Stop(());
                }
            }
            Visit::Continue
        })
        .await?;

        Ok(found.len() == wanted.len())
    }

    /// True if `role` is `candidate` or inherits it through any grant chain
    pub async fn has_role(&self, role: &str, candidate: &str) -> Result<bool> {
        if role == candidate {
            return Ok(true);
        }

        let found = self
            .traverse(role, |node| match node {
                Node::Role(inherited) if inherited.name() == candidate => Visit::Stop(()),
                _ => Visit::Continue,
            })
            .await?;

        Ok(found.is_some())
    }

    /// Distinct permission names reachable from `role`, in first-visited order
    pub async fn get_scope(&self, role: &str) -> Result<Vec<String>> {
        let mut scope: IndexSet<String> = IndexSet::new();

        self.traverse::<(), _>(role, |node| {
            if let Node::Permission(permission) = node {
                if !scope.contains(permission.name()) {
                    scope.insert(permission.name().to_string());
                }
            }
            Visit::Continue
        })
        .await?;

        Ok(scope.into_iter().collect())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn check_owner<T: Entity + ?Sized>(&self, item: &T) -> Result<()> {
        if item.owner() != self.id {
            return Err(RbacError::InvalidArgument(format!(
                "Item {} is associated to another RBAC instance",
                item.name()
            )));
        }
        Ok(())
    }

    fn check_protected(&self, name: &str, privilege: Privilege) -> Result<()> {
        if name == self.config.super_role && privilege == Privilege::Standard {
            return Err(RbacError::Forbidden(format!(
                "Role '{name}' can only be changed in privileged mode"
            )));
        }
        Ok(())
    }

    async fn resolve_edge(&self, role: &str, child: &str) -> Result<(Role, Node)> {
        let (role_node, child_node) = futures::try_join!(self.get(role), self.get(child))?;

        let role_node = role_node
            .ok_or_else(|| RbacError::NotFound(format!("Base role '{role}' does not exist")))?;
        let child_node = child_node.ok_or_else(|| {
            RbacError::NotFound(format!("Item '{child}' is missing for grant or revoke"))
        })?;

        let role = role_node
            .into_role()
            .ok_or_else(|| RbacError::InvalidArgument(format!("'{role}' is not a role")))?;

        Ok((role, child_node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_engine_creation() {
        let rbac = Rbac::in_memory().unwrap();
        assert_eq!(rbac.delimiter(), "_");
        assert_eq!(rbac.super_role(), "superadmin");
    }

    #[tokio::test]
    async fn test_storage_bound_once() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let _first = Rbac::new(RbacConfig::default(), storage.clone()).unwrap();

        let err = Rbac::new(RbacConfig::default(), storage).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn test_empty_delimiter_rejected() {
        let config = RbacConfig {
            delimiter: String::new(),
            ..Default::default()
        };
        let err = Rbac::with_config(config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_create_role_without_persist() {
        let rbac = Rbac::in_memory().unwrap();
        let role = rbac.create_role("draft", false).await.unwrap();

        assert_eq!(role.name(), "draft");
        assert!(!rbac.exists_role("draft").await.unwrap());

        rbac.add(&role).await.unwrap();
        assert!(rbac.exists_role("draft").await.unwrap());
    }

    #[tokio::test]
    async fn test_super_role_guard() {
        let rbac = Rbac::in_memory().unwrap();

        let err = rbac.create_role("superadmin", true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let role = rbac
            .create_role_with("superadmin", true, Privilege::Elevated)
            .await
            .unwrap();
        assert!(rbac.exists_role("superadmin").await.unwrap());

        let err = rbac.remove(&role).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_foreign_entity_rejected() {
        let first = Rbac::in_memory().unwrap();
        let second = Rbac::in_memory().unwrap();

        let role = first.create_role("admin", false).await.unwrap();
        let err = second.add(&role).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_scope_first_seen_order() {
        let rbac = Rbac::in_memory().unwrap();
        let admin = rbac.create_role("admin", true).await.unwrap();
        let user = rbac.create_role("user", true).await.unwrap();
        let read = rbac.create_permission("read", "page", true).await.unwrap();
        let write = rbac.create_permission("write", "page", true).await.unwrap();

        rbac.grant(&admin, &write).await.unwrap();
        rbac.grant(&admin, &user).await.unwrap();
        rbac.grant(&user, &read).await.unwrap();
        rbac.grant(&user, &write).await.unwrap();

        assert_eq!(
            rbac.get_scope("admin").await.unwrap(),
            vec!["write_page", "read_page"]
        );
    }
}
