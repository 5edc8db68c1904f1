//! Action × resource view of a permission set

use crate::entity::{Entity, Permission};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// One resource row; each action maps to the grant name, or `None` if absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixRow {
    pub resource: String,
    pub cells: IndexMap<String, Option<String>>,
}

/// Permissions tabulated by resource (rows) and action (columns)
///
/// Axes keep the order in which actions and resources first appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionMatrix {
    pub actions: Vec<String>,
    pub resources: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl PermissionMatrix {
    pub fn from_permissions(permissions: &[Permission]) -> Self {
        let mut actions = IndexSet::new();
        let mut resources = IndexSet::new();
        let mut names: IndexMap<(&str, &str), &str> = IndexMap::new();

        for permission in permissions {
            actions.insert(permission.action().to_string());
            resources.insert(permission.resource().to_string());
            names.insert(
                (permission.action(), permission.resource()),
                permission.name(),
            );
        }

        let rows = resources
            .iter()
            .map(|resource| MatrixRow {
                resource: resource.clone(),
                cells: actions
                    .iter()
                    .map(|action| {
                        let name = names
                            .get(&(action.as_str(), resource.as_str()))
                            .map(|name| name.to_string());
                        (action.clone(), name)
                    })
                    .collect(),
            })
            .collect();

        Self {
            actions: actions.into_iter().collect(),
            resources: resources.into_iter().collect(),
            rows,
        }
    }

    /// Grant name at (resource, action), if that permission exists
    pub fn get(&self, resource: &str, action: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.resource == resource)
            .and_then(|row| row.cells.get(action))
            .and_then(|cell| cell.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
