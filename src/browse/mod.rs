//! Hierarchical menu navigation over Roon's browse/load protocol.
//!
//! `browse` enters a node (or activates it, for action nodes) and `load`
//! pages through the children of the list it produced. Item keys are only
//! valid inside the session that returned them, and the session key itself
//! may be rotated by the Core between calls, so every step threads the most
//! recent [`BrowseContext`] forward.

pub mod discover;
pub mod execute;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use tracing::debug;

use crate::error::NavResult;

pub use discover::{ActionDiscoverer, MAX_DEPTH};
pub use execute::ActionExecutor;
pub use search::{infer_result_type, SearchSession, MAX_RESULTS_PER_CATEGORY};

/// Children requested when a browse doesn't report a list size.
pub const DEFAULT_LOAD_COUNT: usize = 50;

/// Which menu tree a session navigates. Every traversal runs in Roon's
/// search hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hierarchy {
    Search,
}

impl Hierarchy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
        }
    }
}

/// Scope of one traversal: hierarchy, session key and target zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseContext {
    pub hierarchy: Hierarchy,
    pub session_key: String,
    pub zone_id: String,
}

impl BrowseContext {
    pub fn search(session_key: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            hierarchy: Hierarchy::Search,
            session_key: session_key.into(),
            zone_id: zone_id.into(),
        }
    }

    /// Context to use after a browse that may have rotated the session key.
    pub fn adopt(&self, rotated: Option<&str>) -> Self {
        match rotated {
            Some(key) if !key.is_empty() && key != self.session_key => {
                debug!(from = %self.session_key, to = %key, "session key rotated");
                Self {
                    session_key: key.to_string(),
                    ..self.clone()
                }
            }
            _ => self.clone(),
        }
    }
}

/// Server-supplied classification of a menu node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Hint {
    #[default]
    Item,
    List,
    Header,
    Action,
    ActionList,
}

impl Hint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::List => "list",
            Self::Header => "header",
            Self::Action => "action",
            Self::ActionList => "action_list",
        }
    }
}

/// One child returned by `load`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuNode {
    pub item_key: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub hint: Hint,
    pub image_key: Option<String>,
}

/// Arguments of a `browse` call beyond the context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseRequest {
    pub item_key: Option<String>,
    pub input: Option<String>,
}

impl BrowseRequest {
    pub fn item(item_key: impl Into<String>) -> Self {
        Self {
            item_key: Some(item_key.into()),
            input: None,
        }
    }

    pub fn input(query: impl Into<String>) -> Self {
        Self {
            item_key: None,
            input: Some(query.into()),
        }
    }
}

/// Arguments of a `load` call beyond the context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadRequest {
    pub item_key: Option<String>,
    pub offset: usize,
    pub count: usize,
}

impl LoadRequest {
    pub fn page(item_key: Option<&str>, offset: usize, count: usize) -> Self {
        Self {
            item_key: item_key.map(str::to_string),
            offset,
            count,
        }
    }
}

/// The list a `browse` call landed on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseList {
    /// Number of children, when the Core reported a list
    pub count: Option<usize>,
    /// Session key to use from here on, if the Core reported one
    pub session_key: Option<String>,
}

/// The two-call remote tree protocol.
///
/// Implementations do not retry; a rejected call is a `NavError::Remote`.
#[async_trait]
pub trait BrowseLoadClient: Send + Sync {
    /// Whether a Core is paired and its browse service available
    async fn is_connected(&self) -> bool;

    async fn browse(&self, ctx: &BrowseContext, req: BrowseRequest) -> NavResult<BrowseList>;

    async fn load(&self, ctx: &BrowseContext, req: LoadRequest) -> NavResult<Vec<MenuNode>>;
}

/// Browse into `item_key` and load its children.
///
/// Returns the context carrying the possibly rotated session key, which the
/// caller must use for anything below this node.
pub(crate) async fn open_node(
    client: &dyn BrowseLoadClient,
    ctx: &BrowseContext,
    item_key: &str,
) -> NavResult<(BrowseContext, Vec<MenuNode>)> {
    let list = client.browse(ctx, BrowseRequest::item(item_key)).await?;
    let ctx = ctx.adopt(list.session_key.as_deref());

    let count = list
        .count
        .filter(|c| *c > 0)
        .unwrap_or(DEFAULT_LOAD_COUNT);
    let children = client
        .load(&ctx, LoadRequest::page(Some(item_key), 0, count))
        .await?;

    Ok((ctx, children))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adopt_keeps_context_without_rotation() {
        let ctx = BrowseContext::search("search_1", "zone-1");
        assert_eq!(ctx.adopt(None), ctx);
        assert_eq!(ctx.adopt(Some("")), ctx);
        assert_eq!(ctx.adopt(Some("search_1")), ctx);
    }

    #[test]
    fn test_adopt_takes_rotated_key() {
        let ctx = BrowseContext::search("search_1", "zone-1");
        let rotated = ctx.adopt(Some("search_1b"));
        assert_eq!(rotated.session_key, "search_1b");
        assert_eq!(rotated.zone_id, "zone-1");
        assert_eq!(rotated.hierarchy, Hierarchy::Search);
    }
}
