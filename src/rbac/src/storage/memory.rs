//! In-memory storage backend

use super::{bind_once, bound, EngineBinding, Storage};
use crate::entity::{Entity, Node, Permission, Role};
use crate::error::{RbacError, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct Item {
    node: Node,
    grants: Vec<String>,
}

/// Insertion-ordered map of entities and their grant lists
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<IndexMap<String, Item>>,
    binding: OnceLock<EngineBinding>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn bind(&self, binding: EngineBinding) -> Result<()> {
        bind_once(&self.binding, binding)
    }

    fn binding(&self) -> Result<&EngineBinding> {
        bound(&self.binding)
    }

    async fn add(&self, item: &Node) -> Result<bool> {
        let mut items = self.items.write().await;
        let name = item.name();

        if items.contains_key(name) {
            return Err(RbacError::Conflict(format!("Item {name} already exists")));
        }

        items.insert(
            name.to_string(),
            Item {
                node: item.clone(),
                grants: Vec::new(),
            },
        );

        debug!("add {} {}", item.kind(), name);
        Ok(true)
    }

    async fn remove(&self, item: &Node) -> Result<bool> {
        let mut items = self.items.write().await;
        let name = item.name();

        if items.shift_remove(name).is_none() {
            return Err(RbacError::NotFound(format!(
                "Item {name} is not presented in storage"
            )));
        }

        for entry in items.values_mut() {
            entry.grants.retain(|grant| grant != name);
        }

        debug!("remove {} rule and his child", name);
        Ok(true)
    }

    async fn grant(&self, role: &Role, child: &Node) -> Result<bool> {
        let mut items = self.items.write().await;
        let name = role.name();
        let child_name = child.name();

        if name == child_name {
            return Err(RbacError::Conflict(format!("You can not grant yourself {name}")));
        }

        if !items.contains_key(child_name) {
            return Err(RbacError::NotFound(format!("Base {child_name} does not exist")));
        }

        let entry = items
            .get_mut(name)
            .ok_or_else(|| RbacError::NotFound(format!("Role {name} does not exist")))?;

        if !entry.grants.iter().any(|grant| grant == child_name) {
            entry.grants.push(child_name.to_string());
        }

        debug!("grant {} to {}", child_name, name);
        Ok(true)
    }

    async fn revoke(&self, role: &Role, child: &Node) -> Result<bool> {
        let mut items = self.items.write().await;
        let name = role.name();
        let child_name = child.name();

        if !items.contains_key(child_name) {
            return Err(RbacError::NotFound(format!("Base {child_name} does not exist")));
        }

        let entry = items
            .get_mut(name)
            .ok_or_else(|| RbacError::NotFound(format!("Role {name} does not exist")))?;

        let position = entry
            .grants
            .iter()
            .position(|grant| grant == child_name)
            .ok_or_else(|| {
                RbacError::NotFound(format!("Item {child_name} is not associated to {name}"))
            })?;
        entry.grants.remove(position);

        debug!("revoke {} from {}", child_name, name);
        Ok(true)
    }

    async fn get(&self, name: &str) -> Result<Option<Node>> {
        let items = self.items.read().await;
        Ok(items.get(name).map(|item| item.node.clone()))
    }

    async fn get_roles(&self) -> Result<Vec<Role>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter_map(|item| item.node.as_role().cloned())
            .collect())
    }

    async fn get_permissions(&self) -> Result<Vec<Permission>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter_map(|item| item.node.as_permission().cloned())
            .collect())
    }

    async fn get_grants(&self, role: &str) -> Result<Vec<Node>> {
        let items = self.items.read().await;
        let Some(entry) = items.get(role) else {
            return Ok(Vec::new());
        };

        Ok(entry
            .grants
            .iter()
            .filter_map(|grant| items.get(grant).map(|item| item.node.clone()))
            .collect())
    }
}
