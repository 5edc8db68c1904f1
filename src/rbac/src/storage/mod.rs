//! Storage contract for the role graph
//!
//! The engine never touches hierarchy state directly. Every backend
//! implements [`Storage`] in full and is bound to exactly one engine through
//! an [`EngineBinding`], which carries what a backend needs to rebuild
//! entities from persisted [`Record`]s.

use crate::entity::{EngineId, Entity, Node, NodeKind, Permission, Role};
use crate::error::{RbacError, Result};
use crate::naming;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod memory;
#[cfg(feature = "sled")]
pub mod sled_store;

pub use memory::MemoryStorage;
#[cfg(feature = "sled")]
pub use sled_store::{SledStorage, SledStorageConfig};

/// One-time association between a storage instance and an engine
///
/// Only the engine creates bindings, so entities rebuilt through one always
/// carry the id of the engine that bound the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineBinding {
    engine_id: EngineId,
    delimiter: String,
}

impl EngineBinding {
    pub(crate) fn new(engine_id: EngineId, delimiter: impl Into<String>) -> Self {
        Self {
            engine_id,
            delimiter: delimiter.into(),
        }
    }

    pub fn engine_id(&self) -> EngineId {
        self.engine_id
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Rebuild a role owned by the bound engine
    pub fn role(&self, name: &str) -> Result<Role> {
        Role::new(self.engine_id, name, &self.delimiter)
    }

    /// Rebuild a permission owned by the bound engine from its grant name
    pub fn permission(&self, name: &str) -> Result<Permission> {
        Permission::from_name(self.engine_id, name, &self.delimiter)
    }

    /// Rebuild the entity described by a persisted record
    pub fn node_from_record(&self, record: &Record) -> Result<Node> {
        match record.kind {
            NodeKind::Role => self.role(&record.name).map(Node::Role),
            NodeKind::Permission => self.permission(&record.name).map(Node::Permission),
        }
    }
}

/// Unit each persistent backend stores per entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: NodeKind,

    pub name: String,

    /// Direct children; present for roles only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grants: Option<Vec<String>>,
}

impl Record {
    /// Fresh record for a node with no edges
    pub fn for_node(node: &Node) -> Self {
        let grants = match node.kind() {
            NodeKind::Role => Some(Vec::new()),
            NodeKind::Permission => None,
        };

        Self {
            kind: node.kind(),
            name: node.name().to_string(),
            grants,
        }
    }
}

/// Storage backend trait
///
/// Lookups of absent names return `Ok(None)`; mutations referencing absent
/// names fail.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Attach this storage to an engine
    ///
    /// # Errors
    ///
    /// `FailedPrecondition` if the storage is already bound.
    fn bind(&self, binding: EngineBinding) -> Result<()>;

    /// Binding set by [`Storage::bind`]
    fn binding(&self) -> Result<&EngineBinding>;

    /// Store a role or permission; `Conflict` if the name is present
    async fn add(&self, item: &Node) -> Result<bool>;

    /// Delete an entity and strip its name from every grant list
    async fn remove(&self, item: &Node) -> Result<bool>;

    /// Add the edge `role -> child`
    ///
    /// Rejects self-grants with `Conflict` and absent names with `NotFound`.
    /// Granting an existing edge again is a no-op.
    async fn grant(&self, role: &Role, child: &Node) -> Result<bool>;

    /// Drop the edge `role -> child`; `NotFound` if it does not exist
    async fn revoke(&self, role: &Role, child: &Node) -> Result<bool>;

    /// Entity stored under `name`
    async fn get(&self, name: &str) -> Result<Option<Node>>;

    /// All stored roles
    async fn get_roles(&self) -> Result<Vec<Role>>;

    /// All stored permissions
    async fn get_permissions(&self) -> Result<Vec<Permission>>;

    /// Direct children of `role`, in grant order
    async fn get_grants(&self, role: &str) -> Result<Vec<Node>>;

    async fn get_role(&self, name: &str) -> Result<Option<Role>> {
        Ok(self.get(name).await?.and_then(Node::into_role))
    }

    async fn get_permission(&self, action: &str, resource: &str) -> Result<Option<Permission>> {
        let name = naming::encode(action, resource, self.binding()?.delimiter())?;
        Ok(self.get(&name).await?.and_then(Node::into_permission))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.get(name).await?.is_some())
    }

    async fn exists_role(&self, name: &str) -> Result<bool> {
        Ok(self.get_role(name).await?.is_some())
    }

    async fn exists_permission(&self, action: &str, resource: &str) -> Result<bool> {
        Ok(self.get_permission(action, resource).await?.is_some())
    }
}

/// Shared `bind` logic for backends holding their binding in a `OnceLock`
pub(crate) fn bind_once(
    slot: &std::sync::OnceLock<EngineBinding>,
    binding: EngineBinding,
) -> Result<()> {
    slot.set(binding).map_err(|_| {
        RbacError::FailedPrecondition(
            "Storage is already in use with another instance of RBAC".to_string(),
        )
    })
}

pub(crate) fn bound(slot: &std::sync::OnceLock<EngineBinding>) -> Result<&EngineBinding> {
    slot.get()
        .ok_or_else(|| RbacError::FailedPrecondition("RBAC instance not set".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_shape() {
        let binding = EngineBinding::new(EngineId::new(), "_");
        let role = Node::Role(binding.role("admin").unwrap());
        let permission = Node::Permission(binding.permission("create_page").unwrap());

        let role_json = serde_json::to_value(Record::for_node(&role)).unwrap();
        assert_eq!(
            role_json,
            serde_json::json!({ "type": "Role", "name": "admin", "grants": [] })
        );

        let permission_json = serde_json::to_value(Record::for_node(&permission)).unwrap();
        assert_eq!(
            permission_json,
            serde_json::json!({ "type": "Permission", "name": "create_page" })
        );
    }

    #[test]
    fn test_node_from_record() {
        let binding = EngineBinding::new(EngineId::new(), "_");
        let record: Record =
            serde_json::from_str(r#"{ "type": "Permission", "name": "delete_user" }"#).unwrap();

        let node = binding.node_from_record(&record).unwrap();
        let permission = node.as_permission().unwrap();
        assert_eq!(permission.action(), "delete");
        assert_eq!(permission.resource(), "user");
        assert_eq!(permission.owner(), binding.engine_id());
    }

    #[test]
    fn test_bind_once() {
        let slot = std::sync::OnceLock::new();
        assert!(bound(&slot).is_err());

        bind_once(&slot, EngineBinding::new(EngineId::new(), "_")).unwrap();
        assert!(bound(&slot).is_ok());

        let err = bind_once(&slot, EngineBinding::new(EngineId::new(), "_")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FailedPrecondition);
    }
}
