//! Roles, permissions and the node type shared by the role graph
//!
//! Entities are immutable value objects. They carry the [`EngineId`] of the
//! engine that created them but hold no hierarchy state: edges live in
//! storage only.

use crate::engine::Rbac;
use crate::error::{RbacError, Result};
use crate::naming::{self, Decoded};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Identity of one engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId(Uuid);

impl EngineId {
    /// Fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EngineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discriminant of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Role,
    Permission,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role => write!(f, "Role"),
            Self::Permission => write!(f, "Permission"),
        }
    }
}

/// Behavior shared by roles and permissions
#[async_trait]
pub trait Entity: Send + Sync {
    /// Role name or encoded grant name
    fn name(&self) -> &str;

    /// Engine that created this entity
    fn owner(&self) -> EngineId;

    /// Tagged copy of this entity
    fn to_node(&self) -> Node;

    /// Register this entity with its engine
    async fn add(&self, rbac: &Rbac) -> Result<bool> {
        rbac.add(self).await
    }

    /// Remove this entity (and every edge pointing at it) from its engine
    async fn remove(&self, rbac: &Rbac) -> Result<bool> {
        rbac.remove(self).await
    }
}

/// A named principal category
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    name: String,

    #[serde(skip)]
    owner: EngineId,
}

impl Role {
    /// Create a role owned by `owner`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the name is empty or contains the delimiter or
    /// whitespace.
    pub(crate) fn new(owner: EngineId, name: impl Into<String>, delimiter: &str) -> Result<Self> {
        let name = name.into();
        if !naming::is_valid_name(&name, delimiter) {
            return Err(RbacError::InvalidArgument(format!(
                "Role has no valid name: '{name}'"
            )));
        }

        Ok(Self { name, owner })
    }

    /// Grant a role or permission to this role
    pub async fn grant<C: Entity + ?Sized>(&self, rbac: &Rbac, child: &C) -> Result<bool> {
        rbac.grant(self, child).await
    }

    /// Revoke a role or permission from this role
    pub async fn revoke<C: Entity + ?Sized>(&self, rbac: &Rbac, child: &C) -> Result<bool> {
        rbac.revoke(self, child).await
    }

    /// True if this role reaches the permission (action, resource)
    pub async fn can(&self, rbac: &Rbac, action: &str, resource: &str) -> Result<bool> {
        rbac.can(&self.name, action, resource).await
    }

    /// True if this role reaches any of the given permissions
    pub async fn can_any<A, R>(&self, rbac: &Rbac, permissions: &[(A, R)]) -> Result<bool>
    where
        A: AsRef<str> + Sync,
        R: AsRef<str> + Sync,
    {
        rbac.can_any(&self.name, permissions).await
    }

    /// True if this role reaches all of the given permissions
    pub async fn can_all<A, R>(&self, rbac: &Rbac, permissions: &[(A, R)]) -> Result<bool>
    where
        A: AsRef<str> + Sync,
        R: AsRef<str> + Sync,
    {
        rbac.can_all(&self.name, permissions).await
    }

    /// True if this role is, or inherits, `candidate`
    pub async fn has_role(&self, rbac: &Rbac, candidate: &str) -> Result<bool> {
        rbac.has_role(&self.name, candidate).await
    }

    /// Names of every permission reachable from this role
    pub async fn get_scope(&self, rbac: &Rbac) -> Result<Vec<String>> {
        rbac.get_scope(&self.name).await
    }
}

impl Entity for Role {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> EngineId {
        self.owner
    }

    fn to_node(&self) -> Node {
        Node::Role(self.clone())
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Role {}

impl Hash for Role {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// The capability "perform `action` on `resource`"
#[derive(Debug, Clone, Serialize)]
pub struct Permission {
    name: String,
    action: String,
    resource: String,

    #[serde(skip)]
    owner: EngineId,
}

impl Permission {
    /// Create a permission owned by `owner`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if action or resource is empty or not a valid name.
    pub(crate) fn new(
        owner: EngineId,
        action: impl Into<String>,
        resource: impl Into<String>,
        delimiter: &str,
    ) -> Result<Self> {
        let action = action.into();
        let resource = resource.into();

        if action.is_empty() || resource.is_empty() {
            return Err(RbacError::InvalidArgument(
                "One of parameters is undefined".to_string(),
            ));
        }

        if !naming::is_valid_name(&action, delimiter) || !naming::is_valid_name(&resource, delimiter)
        {
            return Err(RbacError::InvalidArgument(format!(
                "Action or resource has no valid name: '{action}', '{resource}'"
            )));
        }

        let name = naming::encode(&action, &resource, delimiter)?;

        Ok(Self {
            name,
            action,
            resource,
            owner,
        })
    }

    /// Rebuild a permission from its persisted grant name
    pub(crate) fn from_name(owner: EngineId, name: &str, delimiter: &str) -> Result<Self> {
        let Decoded { action, resource } = naming::decode(name, delimiter)?;
        Self::new(owner, action, resource, delimiter)
    }

    /// Action component
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Resource component
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// True iff both components match exactly
    pub fn can(&self, action: &str, resource: &str) -> bool {
        self.action == action && self.resource == resource
    }
}

impl Entity for Permission {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> EngineId {
        self.owner
    }

    fn to_node(&self) -> Node {
        Node::Permission(self.clone())
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Permission {}

impl Hash for Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A node of the role graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Role(Role),
    Permission(Permission),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Role(_) => NodeKind::Role,
            Self::Permission(_) => NodeKind::Permission,
        }
    }

    pub fn as_role(&self) -> Option<&Role> {
        match self {
            Self::Role(role) => Some(role),
            Self::Permission(_) => None,
        }
    }

    pub fn as_permission(&self) -> Option<&Permission> {
        match self {
            Self::Permission(permission) => Some(permission),
            Self::Role(_) => None,
        }
    }

    pub fn into_role(self) -> Option<Role> {
        match self {
            Self::Role(role) => Some(role),
            Self::Permission(_) => None,
        }
    }

    pub fn into_permission(self) -> Option<Permission> {
        match self {
            Self::Permission(permission) => Some(permission),
            Self::Role(_) => None,
        }
    }
}

impl Entity for Node {
    fn name(&self) -> &str {
        match self {
            Self::Role(role) => role.name(),
            Self::Permission(permission) => permission.name(),
        }
    }

    fn owner(&self) -> EngineId {
        match self {
            Self::Role(role) => role.owner(),
            Self::Permission(permission) => permission.owner(),
        }
    }

    fn to_node(&self) -> Node {
        self.clone()
    }
}

impl From<Role> for Node {
    fn from(role: Role) -> Self {
        Self::Role(role)
    }
}

impl From<Permission> for Node {
    fn from(permission: Permission) -> Self {
        Self::Permission(permission)
    }
}
