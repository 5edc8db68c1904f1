//! # CretoAI RBAC Engine
//!
//! Hierarchical role-based access control over a pluggable storage backend.
//!
//! ## Features
//!
//! - **Role hierarchy** as a directed graph: roles inherit roles and permissions
//! - **Cycle-safe queries** (`can`, `can_any`, `can_all`, `has_role`, `get_scope`)
//!   built on one breadth-first traversal
//! - **Async-first design** using Tokio runtime
//! - **Pluggable storage** through the [`Storage`] trait, with in-memory and
//!   sled backends
//! - **Protected super role** that only changes in privileged mode
//!
//! ## Example
//!
//! ```rust
//! use cretoai_rbac::{Rbac, RbacConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rbac = Rbac::with_config(RbacConfig::default_policy())?;
//!     rbac.init().await?;
//!
//!     assert!(rbac.can("admin", "read", "client").await?);
//!     assert!(!rbac.can("user", "block", "client").await?);
//!     assert!(rbac.has_role("superadmin", "user").await?);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod matrix;
pub mod naming;
pub mod storage;

// Re-export commonly used types
pub use config::{
    parse_grants, parse_permissions, GrantMap, IntegrityIssue, IntegrityIssueKind,
    PermissionMap, RbacConfig,
};
pub use engine::{Privilege, Rbac, RbacSnapshot, Visit};
pub use entity::{EngineId, Entity, Node, NodeKind, Permission, Role};
pub use error::{ErrorKind, RbacError, Result};
pub use matrix::{MatrixRow, PermissionMatrix};
pub use storage::{EngineBinding, MemoryStorage, Record, Storage};
#[cfg(feature = "sled")]
pub use storage::{SledStorage, SledStorageConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
