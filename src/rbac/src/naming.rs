//! Grant name codec
//!
//! A permission is identified by a single string built from its action and
//! resource joined with the engine's delimiter, e.g. `create_page` for
//! action `create` on resource `page` with the default `_` delimiter.
//! Role names and the two permission components share one validity rule:
//! non-empty, no delimiter character, no whitespace.

use crate::error::{RbacError, Result};
use serde::{Deserialize, Serialize};

/// Default grant delimiter
pub const DEFAULT_DELIMITER: &str = "_";

/// Action and resource recovered from a grant name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decoded {
    pub action: String,
    pub resource: String,
}

/// Build the grant name for `action` on `resource`
///
/// # Errors
///
/// `InvalidArgument` if the delimiter, action or resource is empty.
pub fn encode(action: &str, resource: &str, delimiter: &str) -> Result<String> {
    if delimiter.is_empty() {
        return Err(RbacError::InvalidArgument(
            "Delimiter is not defined".to_string(),
        ));
    }

    if action.is_empty() {
        return Err(RbacError::InvalidArgument("Action is not defined".to_string()));
    }

    if resource.is_empty() {
        return Err(RbacError::InvalidArgument(
            "Resource is not defined".to_string(),
        ));
    }

    Ok(format!("{action}{delimiter}{resource}"))
}

/// Split a grant name at the first occurrence of `delimiter`
///
/// # Errors
///
/// `InvalidArgument` if the delimiter or name is empty, or the name does not
/// contain the delimiter.
pub fn decode(name: &str, delimiter: &str) -> Result<Decoded> {
    if delimiter.is_empty() {
        return Err(RbacError::InvalidArgument(
            "Delimiter is required".to_string(),
        ));
    }

    if name.is_empty() {
        return Err(RbacError::InvalidArgument("Name is required".to_string()));
    }

    let (action, resource) = name.split_once(delimiter).ok_or_else(|| {
        RbacError::InvalidArgument(format!(
            "Wrong permission name '{name}': delimiter '{delimiter}' not found"
        ))
    })?;

    Ok(Decoded {
        action: action.to_string(),
        resource: resource.to_string(),
    })
}

/// True iff `name` is non-empty and holds no delimiter character and no whitespace
pub fn is_valid_name(name: &str, delimiter: &str) -> bool {
    if delimiter.is_empty() || name.is_empty() {
        return false;
    }

    !name
        .chars()
        .any(|c| c.is_whitespace() || delimiter.contains(c))
}

/// Encode every (action, resource) pair into its grant name
pub fn permission_names<A, R>(pairs: &[(A, R)], delimiter: &str) -> Result<Vec<String>>
where
    A: AsRef<str>,
    R: AsRef<str>,
{
    if delimiter.is_empty() {
        return Err(RbacError::InvalidArgument(
            "Delimiter is not defined".to_string(),
        ));
    }

    pairs
        .iter()
        .map(|(action, resource)| encode(action.as_ref(), resource.as_ref(), delimiter))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_encode_default_delimiter() {
        assert_eq!(encode("create", "page", "_").unwrap(), "create_page");
    }

    #[test]
    fn test_encode_rejects_empty_parts() {
        assert_eq!(
            encode("create", "page", "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            encode("", "page", "_").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            encode("create", "", "_").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_decode_permission() {
        let decoded = decode("create_page", "_").unwrap();
        assert_eq!(decoded.action, "create");
        assert_eq!(decoded.resource, "page");
    }

    #[test]
    fn test_decode_multi_char_delimiter() {
        let decoded = decode("read::invoice", "::").unwrap();
        assert_eq!(decoded.action, "read");
        assert_eq!(decoded.resource, "invoice");
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode("create_page", "").is_err());
        assert!(decode("", "_").is_err());

        let err = decode("createpage", "_").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("admin", "_"));
        assert!(is_valid_name("read-only", "_"));
        assert!(!is_valid_name("", "_"));
        assert!(!is_valid_name("super_admin", "_"));
        assert!(!is_valid_name("super admin", "_"));
        assert!(!is_valid_name("tab\tbed", "_"));
        assert!(!is_valid_name("admin", ""));
        assert!(is_valid_name("super_admin", ":"));
    }

    #[test]
    fn test_permission_names() {
        let names = permission_names(&[("create", "page"), ("delete", "user")], "_").unwrap();
        assert_eq!(names, vec!["create_page", "delete_user"]);

        assert!(permission_names(&[("create", "page")], "").is_err());
    }

    proptest! {
        #[test]
        fn test_encode_decode_round_trip(
            action in "[a-zA-Z0-9-]{1,12}",
            resource in "[a-zA-Z0-9-]{1,12}",
            delimiter in "(_|:|\\.|::|#)"
        ) {
            let name = encode(&action, &resource, &delimiter).unwrap();
            let decoded = decode(&name, &delimiter).unwrap();
            prop_assert_eq!(decoded.action, action);
            prop_assert_eq!(decoded.resource, resource);
        }

        #[test]
        fn test_empty_delimiter_always_rejected(
            action in "\\PC{0,8}",
            resource in "\\PC{0,8}"
        ) {
            let err = encode(&action, &resource, "").unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }
}
