//! Persistent storage backend on sled
//!
//! Every entity is one JSON-encoded [`Record`] keyed by its name in a single
//! tree. Listings follow sled's key order.
//!
//! Mutations rewrite whole role records, so they run one at a time under
//! `writes`; reads go straight to the tree.

use super::{bind_once, bound, EngineBinding, Record, Storage};
use crate::entity::{Entity, Node, NodeKind, Permission, Role};
use crate::error::{RbacError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

const ITEMS_TREE: &str = "rbac_items";

/// sled backend configuration
#[derive(Debug, Clone)]
pub struct SledStorageConfig {
    /// Database directory
    pub path: PathBuf,

    /// Remove the database when the handle is dropped
    pub temporary: bool,

    /// Flush after every mutation
    pub flush_on_write: bool,
}

impl Default for SledStorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/rbac"),
            temporary: false,
            flush_on_write: true,
        }
    }
}

/// Role graph persisted in an embedded sled database
pub struct SledStorage {
    db: sled::Db,
    items: sled::Tree,
    config: SledStorageConfig,
    binding: OnceLock<EngineBinding>,

    /// Serializes read-modify-write of role records
    writes: Mutex<()>,
}

impl SledStorage {
    /// Open or create the database at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(SledStorageConfig {
            path: path.into(),
            ..Default::default()
        })
    }

    /// Open with custom configuration
    pub fn open_with_config(config: SledStorageConfig) -> Result<Self> {
        let db = sled::Config::new()
            .path(&config.path)
            .temporary(config.temporary)
            .open()?;
        let items = db.open_tree(ITEMS_TREE)?;

        info!("Opened sled RBAC storage at {}", config.path.display());

        Ok(Self {
            db,
            items,
            config,
            binding: OnceLock::new(),
            writes: Mutex::new(()),
        })
    }

    fn load(&self, name: &str) -> Result<Option<Record>> {
        match self.items.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn store(&self, record: &Record) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        self.items.insert(record.name.as_bytes(), bytes)?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        if self.config.flush_on_write {
            self.db.flush_async().await?;
        }
        Ok(())
    }

    fn records(&self) -> Result<Vec<Record>> {
        self.items
            .iter()
            .values()
            .map(|value| {
                let bytes = value?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .collect()
    }

    fn role_record(&self, name: &str) -> Result<Record> {
        match self.load(name)? {
            Some(record) if record.kind == NodeKind::Role => Ok(record),
            Some(_) => Err(RbacError::InvalidArgument(format!("{name} is not a role"))),
            None => Err(RbacError::NotFound(format!("Role {name} does not exist"))),
        }
    }
}

#[async_trait]
impl Storage for SledStorage {
    fn bind(&self, binding: EngineBinding) -> Result<()> {
        bind_once(&self.binding, binding)
    }

    fn binding(&self) -> Result<&EngineBinding> {
        bound(&self.binding)
    }

    async fn add(&self, item: &Node) -> Result<bool> {
        let name = item.name();
        let bytes = serde_json::to_vec(&Record::for_node(item))?;

        let _guard = self.writes.lock().await;
        self.items
            .compare_and_swap(name.as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| RbacError::Conflict(format!("Item {name} already exists")))?;
        self.flush().await?;

        debug!("add {} {}", item.kind(), name);
        Ok(true)
    }

    async fn remove(&self, item: &Node) -> Result<bool> {
        let name = item.name();

        let _guard = self.writes.lock().await;
        if self.load(name)?.is_none() {
            return Err(RbacError::NotFound(format!(
                "Item {name} is not presented in storage"
            )));
        }

        let mut batch = sled::Batch::default();
        for mut record in self.records()? {
            let Some(grants) = record.grants.as_mut() else {
                continue;
            };
            if grants.iter().any(|grant| grant == name) {
                grants.retain(|grant| grant != name);
                batch.insert(record.name.as_bytes(), serde_json::to_vec(&record)?);
            }
        }
        batch.remove(name.as_bytes());

        self.items.apply_batch(batch)?;
        self.flush().await?;

        debug!("remove {} rule and his child", name);
        Ok(true)
    }

    async fn grant(&self, role: &Role, child: &Node) -> Result<bool> {
        let name = role.name();
        let child_name = child.name();

        if name == child_name {
            return Err(RbacError::Conflict(format!("You can not grant yourself {name}")));
        }

        let _guard = self.writes.lock().await;
        if self.load(child_name)?.is_none() {
            return Err(RbacError::NotFound(format!("Base {child_name} does not exist")));
        }

        let mut record = self.role_record(name)?;
        let grants = record.grants.get_or_insert_with(Vec::new);
        if !grants.iter().any(|grant| grant == child_name) {
            grants.push(child_name.to_string());
            self.store(&record)?;
            self.flush().await?;
        }

        debug!("grant rule '{}' to role '{}'", child_name, name);
        Ok(true)
    }

    async fn revoke(&self, role: &Role, child: &Node) -> Result<bool> {
        let name = role.name();
        let child_name = child.name();

        let _guard = self.writes.lock().await;
        if self.load(child_name)?.is_none() {
            return Err(RbacError::NotFound(format!("Base {child_name} does not exist")));
        }

        let mut record = self.role_record(name)?;
        let grants = record.grants.get_or_insert_with(Vec::new);
        let position = grants
            .iter()
            .position(|grant| grant == child_name)
            .ok_or_else(|| {
                RbacError::NotFound(format!("Item {child_name} is not associated to {name}"))
            })?;
        grants.remove(position);
        self.store(&record)?;
        self.flush().await?;

        debug!("revoke {} from {}", child_name, name);
        Ok(true)
    }

    async fn get(&self, name: &str) -> Result<Option<Node>> {
        match self.load(name)? {
            Some(record) => Ok(Some(self.binding()?.node_from_record(&record)?)),
            None => Ok(None),
        }
    }

    async fn get_roles(&self) -> Result<Vec<Role>> {
        let binding = self.binding()?;
        self.records()?
            .iter()
            .filter(|record| record.kind == NodeKind::Role)
            .map(|record| binding.role(&record.name))
            .collect()
    }

    async fn get_permissions(&self) -> Result<Vec<Permission>> {
        let binding = self.binding()?;
        self.records()?
            .iter()
            .filter(|record| record.kind == NodeKind::Permission)
            .map(|record| binding.permission(&record.name))
            .collect()
    }

    async fn get_grants(&self, role: &str) -> Result<Vec<Node>> {
        let Some(grants) = self.load(role)?.and_then(|record| record.grants) else {
            return Ok(Vec::new());
        };

        let binding = self.binding()?;
        let mut nodes = Vec::with_capacity(grants.len());
        for grant in &grants {
            if let Some(record) = self.load(grant)? {
                nodes.push(binding.node_from_record(&record)?);
            }
        }

        Ok(nodes)
    }
}
