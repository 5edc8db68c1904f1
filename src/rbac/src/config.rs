//! Engine configuration loading and validation

use crate::error::{RbacError, Result};
use crate::naming::{self, DEFAULT_DELIMITER};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Resource → actions declared for it, in declaration order
pub type PermissionMap = IndexMap<String, Vec<String>>;

/// Role → names of its direct children (roles or encoded permissions)
pub type GrantMap = IndexMap<String, Vec<String>>;

/// Engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RbacConfig {
    /// Separator between action and resource in grant names
    pub delimiter: String,

    /// Role that can only be changed in privileged mode
    pub super_role: String,

    /// Roles created by `init`
    pub roles: Vec<String>,

    /// Permissions created by `init`
    pub permissions: PermissionMap,

    /// Grants applied by `init`
    pub grants: GrantMap,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            super_role: default_super_role(),
            roles: Vec::new(),
            permissions: PermissionMap::new(),
            grants: GrantMap::new(),
        }
    }
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_super_role() -> String {
    "superadmin".to_string()
}

impl RbacConfig {
    /// Load configuration from a `.toml` or `.json` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            Some("json") => Self::from_json_str(&contents),
            _ => Err(RbacError::Config(format!(
                "Unsupported configuration format: {}",
                path.display()
            ))),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| RbacError::Config(format!("Failed to parse TOML configuration: {e}")))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| RbacError::Config(format!("Failed to parse JSON configuration: {e}")))
    }

    /// Policy shipped as the library default: a four-level chain
    /// `superadmin → admin → manager → user`
    pub fn default_policy() -> Self {
        let roles = ["superadmin", "admin", "manager", "user"];

        let permissions: [(&str, &[&str]); 4] = [
            ("client", &["read", "create", "update", "block"]),
            ("admin", &["read", "create"]),
            ("role", &["read", "create", "update", "delete"]),
            ("permission", &["read", "create", "update", "delete"]),
        ];

        let grants: [(&str, &[&str]); 4] = [
            ("user", &["read_client", "read_admin"]),
            ("manager", &["create_client", "update_client", "user"]),
            ("admin", &["block_client", "create_admin", "manager"]),
            (
                "superadmin",
                &[
                    "create_role",
                    "read_role",
                    "update_role",
                    "delete_role",
                    "create_permission",
                    "read_permission",
                    "update_permission",
                    "delete_permission",
                    "admin",
                ],
            ),
        ];

        Self {
            roles: roles.iter().map(|role| role.to_string()).collect(),
            permissions: to_map(&permissions),
            grants: to_map(&grants),
            ..Default::default()
        }
    }

    /// Validate names and the delimiter
    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(RbacError::InvalidArgument(
                "Delimiter must not be empty".to_string(),
            ));
        }

        if !naming::is_valid_name(&self.super_role, &self.delimiter) {
            return Err(RbacError::InvalidArgument(format!(
                "Super role has no valid name: '{}'",
                self.super_role
            )));
        }

        for role in &self.roles {
            if !naming::is_valid_name(role, &self.delimiter) {
                return Err(RbacError::InvalidArgument(format!(
                    "Role has no valid name: '{role}'"
                )));
            }
        }

        for (resource, actions) in &self.permissions {
            if !naming::is_valid_name(resource, &self.delimiter) {
                return Err(RbacError::InvalidArgument(format!(
                    "Resource has no valid name: '{resource}'"
                )));
            }
            if let Some(action) = actions
                .iter()
                .find(|action| !naming::is_valid_name(action, &self.delimiter))
            {
                return Err(RbacError::InvalidArgument(format!(
                    "Action has no valid name: '{action}' on '{resource}'"
                )));
            }
        }

        Ok(())
    }

    /// Check that every configured grant refers to a declared role or permission
    ///
    /// All problems are collected before failing with `RbacError::Integrity`.
    pub fn check_integrity(&self) -> Result<()> {
        let mut issues = Vec::new();

        for (role, children) in &self.grants {
            if !self.roles.contains(role) {
                issues.push(IntegrityIssue::new(role, role, IntegrityIssueKind::UnknownRole));
            }

            for child in children {
                if self.roles.contains(child) {
                    continue;
                }

                let Ok(decoded) = naming::decode(child, &self.delimiter) else {
                    issues.push(IntegrityIssue::new(role, child, IntegrityIssueKind::MalformedGrant));
                    continue;
                };

                match self.permissions.get(&decoded.resource) {
                    None => issues.push(IntegrityIssue::new(
                        role,
                        child,
                        IntegrityIssueKind::UnknownResource,
                    )),
                    Some(actions) if !actions.contains(&decoded.action) => issues.push(
                        IntegrityIssue::new(role, child, IntegrityIssueKind::UnknownAction),
                    ),
                    Some(_) => {}
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(RbacError::Integrity(issues))
        }
    }
}

fn to_map(entries: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(key, values)| {
            (
                key.to_string(),
                values.iter().map(|value| value.to_string()).collect(),
            )
        })
        .collect()
}

/// Parse a role → children mapping from untyped JSON
///
/// Anything other than an object of string arrays is `InvalidArgument`.
pub fn parse_grants(value: serde_json::Value) -> Result<GrantMap> {
    parse_string_lists(value, "grants")
}

/// Parse a resource → actions mapping from untyped JSON
pub fn parse_permissions(value: serde_json::Value) -> Result<PermissionMap> {
    parse_string_lists(value, "permissions")
}

fn parse_string_lists(value: serde_json::Value, what: &str) -> Result<IndexMap<String, Vec<String>>> {
    serde_json::from_value(value).map_err(|e| {
        RbacError::InvalidArgument(format!("Expected an object of string arrays for {what}: {e}"))
    })
}

/// Category of a configuration integrity problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrityIssueKind {
    /// Grant list belongs to a role that is not declared
    UnknownRole,
    /// Child is neither a role nor a decodable permission name
    MalformedGrant,
    /// Permission on a resource that is not declared
    UnknownResource,
    /// Action not declared for the resource
    UnknownAction,
}

/// One integrity problem found in the configured grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub role: String,
    pub grant: String,
    pub kind: IntegrityIssueKind,
}

impl IntegrityIssue {
    fn new(role: &str, grant: &str, kind: IntegrityIssueKind) -> Self {
        Self {
            role: role.to_string(),
            grant: grant.to_string(),
            kind,
        }
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.kind {
            IntegrityIssueKind::UnknownRole => "role is not declared",
            IntegrityIssueKind::MalformedGrant => "not a role or permission name",
            IntegrityIssueKind::UnknownResource => "resource is not declared",
            IntegrityIssueKind::UnknownAction => "action is not declared for resource",
        };
        write!(f, "{} -> {}: {}", self.role, self.grant, reason)
    }
}
