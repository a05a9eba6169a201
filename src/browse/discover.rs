//! Collects the actions reachable below a menu node.
//!
//! Roon never marks a node as "the action menu"; the walk relies on hints
//! and on the shape of the tree instead. Tracks expose their actions one
//! level down, albums and artists wrap them in an extra list or header.

use futures::future::{BoxFuture, FutureExt};
use roonpipe_wire::Action;
use tracing::{debug, warn};

use super::{open_node, BrowseContext, BrowseLoadClient, Hint};

/// Deepest level the walk descends to. Anything below yields nothing.
pub const MAX_DEPTH: usize = 5;

pub struct ActionDiscoverer<'a> {
    client: &'a dyn BrowseLoadClient,
}

impl<'a> ActionDiscoverer<'a> {
    pub fn new(client: &'a dyn BrowseLoadClient) -> Self {
        Self { client }
    }

    /// Actions offered for `item_key`, in menu order.
    ///
    /// Remote failures are not propagated: a node that can't be walked
    /// simply has no actions.
    pub async fn discover(&self, ctx: &BrowseContext, item_key: &str) -> Vec<Action> {
        self.discover_at(ctx.clone(), item_key.to_string(), 0).await
    }

    fn discover_at(
        &self,
        ctx: BrowseContext,
        item_key: String,
        depth: usize,
    ) -> BoxFuture<'_, Vec<Action>> {
        async move {
            if depth > MAX_DEPTH {
                debug!(item_key = %item_key, "action discovery depth exhausted");
                return Vec::new();
            }

            let (ctx, children) = match open_node(self.client, &ctx, &item_key).await {
                Ok(opened) => opened,
                Err(e) => {
                    warn!(item_key = %item_key, depth, "action discovery failed: {}", e);
                    return Vec::new();
                }
            };
            debug!(
                item_key = %item_key,
                session_key = %ctx.session_key,
                depth,
                children = children.len(),
                "discovering actions"
            );

            let only_child = children.len() == 1;
            let mut actions = Vec::new();

            for child in &children {
                match child.hint {
                    Hint::Action => actions.push(Action::new(child.title.clone())),
                    Hint::ActionList | Hint::Header => {
                        let Some(key) = child.item_key.clone() else {
                            continue;
                        };
                        actions.extend(self.discover_at(ctx.clone(), key, depth + 1).await);

                        // An album lists its own actions first, then one action list per track
                        if depth == 1 && child.hint == Hint::ActionList && !actions.is_empty() {
                            break;
                        }
                    }
                    Hint::List if depth == 0 && only_child => {
                        let Some(key) = child.item_key.clone() else {
                            continue;
                        };
                        actions.extend(self.discover_at(ctx.clone(), key, depth + 1).await);
                    }
                    _ => {}
                }
            }

            actions
        }
        .boxed()
    }
}
