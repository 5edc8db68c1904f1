//! Breadth-first walk of the role graph
//!
//! Every read query is a visitor over this walk. Each role is expanded at
//! most once (one `get_grants` call), which keeps cyclic grants finite.
//! Children are handed to the visitor every time they appear as an edge.

use crate::entity::{Entity, Node};
use crate::error::Result;
use crate::storage::Storage;
use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// Visitor decision for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit<T> {
    /// Keep walking
    Continue,
    /// Halt and return this value
    Stop(T),
}

/// Walk the graph below `start`, feeding every child node to `visitor`
///
/// Returns `Some(value)` as soon as the visitor stops, `None` when the queue
/// runs dry. Storage errors abort the walk unchanged.
pub(crate) async fn traverse<T, F>(storage: &dyn Storage, start: &str, mut visitor: F) -> Result<Option<T>>
where
    F: FnMut(&Node) -> Visit<T>,
{
    let mut queue = VecDeque::from([start.to_string()]);
    let mut seen = HashSet::from([start.to_string()]);

    while let Some(role) = queue.pop_front() {
        let children = storage.get_grants(&role).await?;
        trace!("expand {} ({} children, {} queued)", role, children.len(), queue.len());

        for child in &children {
            if let Node::Role(inherited) = child {
                if seen.insert(inherited.name().to_string()) {
                    queue.push_back(inherited.name().to_string());
                }
            }

            if let Visit::Stop(value) = visitor(child) {
                return Ok(Some(value));
            }
        }
    }

    Ok(None)
}
