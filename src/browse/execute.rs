//! Runs an action on a previously returned search result.

use futures::future::{BoxFuture, FutureExt};
use roonpipe_wire::PlayRequest;
use tracing::{debug, info};

use super::{
    open_node, ActionDiscoverer, BrowseContext, BrowseLoadClient, BrowseRequest, Hint,
    LoadRequest, MAX_DEPTH,
};
use crate::error::{NavError, NavResult};

pub struct ActionExecutor<'a> {
    client: &'a dyn BrowseLoadClient,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(client: &'a dyn BrowseLoadClient) -> Self {
        Self { client }
    }

    /// Re-locate the result by category and position, then activate the
    /// action titled `req.action_title` on it.
    ///
    /// `req.item_key` is never browsed: keys handed out during the search may
    /// no longer resolve to the same item.
    pub async fn execute(&self, zone_id: &str, req: &PlayRequest) -> NavResult<()> {
        debug!(
            item_key = %req.item_key,
            category_key = %req.category_key,
            index = req.item_index,
            action = %req.action_title,
            "executing action"
        );
        let ctx = BrowseContext::search(req.session_key.clone(), zone_id);

        let list = self
            .client
            .browse(&ctx, BrowseRequest::item(req.category_key.clone()))
            .await?;
        let ctx = ctx.adopt(list.session_key.as_deref());

        let items = self
            .client
            .load(
                &ctx,
                LoadRequest::page(Some(&req.category_key), req.item_index, 1),
            )
            .await?;
        let item_key = items
            .into_iter()
            .next()
            .and_then(|item| item.item_key)
            .ok_or_else(|| {
                NavError::not_found(format!("Item not found at index {}", req.item_index))
            })?;
        debug!(item_key = %item_key, "refreshed item key");

        let available = ActionDiscoverer::new(self.client)
            .discover(&ctx, &item_key)
            .await;
        if !available.iter().any(|a| a.title == req.action_title) {
            return Err(NavError::not_found(format!(
                "Action \"{}\" not available",
                req.action_title
            )));
        }

        if self
            .activate(ctx, item_key, &req.action_title, 0)
            .await?
        {
            info!(action = %req.action_title, "action executed");
            Ok(())
        } else {
            Err(NavError::not_found(format!(
                "Could not find action \"{}\" to execute",
                req.action_title
            )))
        }
    }

    /// Walk below `item_key` and browse into the first action named `title`.
    fn activate<'b>(
        &'b self,
        ctx: BrowseContext,
        item_key: String,
        title: &'b str,
        depth: usize,
    ) -> BoxFuture<'b, NavResult<bool>> {
        async move {
            if depth > MAX_DEPTH {
                return Ok(false);
            }

            let (ctx, children) = open_node(self.client, &ctx, &item_key).await?;
            let only_child = children.len() == 1;

            for child in &children {
                let Some(key) = child.item_key.clone() else {
                    continue;
                };

                match child.hint {
                    Hint::Action if child.title == title => {
                        debug!(item_key = %key, session_key = %ctx.session_key, "activating action");
                        self.client.browse(&ctx, BrowseRequest::item(key)).await?;
                        return Ok(true);
                    }
                    Hint::ActionList => {
                        if self.activate(ctx.clone(), key, title, depth + 1).await? {
                            return Ok(true);
                        }
                        if depth == 1 {
                            break;
                        }
                    }
                    Hint::List if only_child => {
                        if self.activate(ctx.clone(), key, title, depth + 1).await? {
                            return Ok(true);
                        }
                    }
                    _ => {}
                }
            }

            Ok(false)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browse::testing::{action, menu, Call, FakeTree};
    use crate::browse::MenuNode;

    fn play(action_title: &str) -> PlayRequest {
        PlayRequest {
            item_key: "stale-key".to_string(),
            session_key: "search_1".to_string(),
            category_key: "albums".to_string(),
            item_index: 1,
            action_title: action_title.to_string(),
        }
    }

    fn album_tree() -> FakeTree {
        FakeTree::new()
            .node(
                "albums",
                vec![
                    menu("album-0", "Let It Be", Hint::List),
                    menu("album-1", "Abbey Road", Hint::List),
                ],
            )
            .node("album-1", vec![menu("album-1-list", "Abbey Road", Hint::List)])
            .node(
                "album-1-list",
                vec![
                    menu("album-1-actions", "Play Album", Hint::ActionList),
                    menu("track-1", "Come Together", Hint::ActionList),
                ],
            )
            .node(
                "album-1-actions",
                vec![action("play-now", "Play Now"), action("queue", "Queue")],
            )
            .node("track-1", vec![action("track-play", "Play From Here")])
    }

    #[tokio::test]
    async fn test_reloads_item_by_index_and_activates_action() {
        let tree = album_tree();
        ActionExecutor::new(&tree)
            .execute("zone-1", &play("Queue"))
            .await
            .unwrap();

        let calls = tree.calls();
        assert_eq!(
            calls[1],
            Call::Load {
                session_key: "search_1".to_string(),
                item_key: Some("albums".to_string()),
                offset: 1,
                count: 1,
            }
        );

        let browsed = tree.browsed_keys();
        assert!(!browsed.contains(&"stale-key".to_string()));
        assert_eq!(browsed.last().map(String::as_str), Some("queue"));
        assert!(!browsed.contains(&"play-now".to_string()));
    }

    #[tokio::test]
    async fn test_missing_item_at_index() {
        let tree = album_tree();
        let mut req = play("Play Now");
        req.item_index = 7;

        let err = ActionExecutor::new(&tree)
            .execute("zone-1", &req)
            .await
            .unwrap_err();
        assert_eq!(err, NavError::not_found("Item not found at index 7"));
    }

    #[tokio::test]
    async fn test_unavailable_action() {
        let tree = album_tree();
        let err = ActionExecutor::new(&tree)
            .execute("zone-1", &play("Start Radio"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Action \"Start Radio\" not available");
    }

    #[tokio::test]
    async fn test_category_failure_propagates() {
        let tree = album_tree().fail("albums");
        let err = ActionExecutor::new(&tree)
            .execute("zone-1", &play("Play Now"))
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::Remote(_)));
    }

    #[tokio::test]
    async fn test_rotated_key_reaches_activation() {
        let tree = album_tree().rotate("album-1", "search_1b");
        ActionExecutor::new(&tree)
            .execute("zone-1", &play("Play Now"))
            .await
            .unwrap();

        let last = tree.calls().pop().unwrap();
        assert_eq!(
            last,
            Call::Browse {
                session_key: "search_1b".to_string(),
                item_key: Some("play-now".to_string()),
                input: None,
            }
        );
    }

    /// `albums` whose second entry is `key`, with `nodes` below it
    fn tree_with(key: &str, nodes: Vec<(&str, Vec<MenuNode>)>) -> FakeTree {
        let tree = FakeTree::new().node(
            "albums",
            vec![
                menu("album-0", "Let It Be", Hint::List),
                menu(key, "Abbey Road", Hint::List),
            ],
        );
        nodes
            .into_iter()
            .fold(tree, |tree, (key, children)| tree.node(key, children))
    }

    fn count(browsed: &[String], key: &str) -> usize {
        browsed.iter().filter(|k| k.as_str() == key).count()
    }

    fn cannot_execute(title: &str) -> NavError {
        NavError::not_found(format!("Could not find action \"{}\" to execute", title))
    }

    #[tokio::test]
    async fn test_header_is_not_followed_on_activation() {
        let tree = tree_with(
            "item",
            vec![
                ("item", vec![menu("hdr", "Radio", Hint::Header)]),
                ("hdr", vec![action("radio", "Start Radio")]),
            ],
        );

        let err = ActionExecutor::new(&tree)
            .execute("zone-1", &play("Start Radio"))
            .await
            .unwrap_err();
        assert_eq!(err, cannot_execute("Start Radio"));

        let browsed = tree.browsed_keys();
        assert_eq!(count(&browsed, "hdr"), 1);
        assert_eq!(count(&browsed, "radio"), 0);
    }

    #[tokio::test]
    async fn test_cyclic_tree_stops_at_max_depth() {
        let tree = tree_with(
            "loop",
            vec![
                (
                    "loop",
                    vec![
                        menu("hdr", "Actions", Hint::Header),
                        menu("loop", "More", Hint::ActionList),
                    ],
                ),
                ("hdr", vec![action("radio", "Start Radio")]),
            ],
        );

        let err = ActionExecutor::new(&tree)
            .execute("zone-1", &play("Start Radio"))
            .await
            .unwrap_err();
        assert_eq!(err, cannot_execute("Start Radio"));

        // Discovery and activation each open it at depths 0 through MAX_DEPTH
        assert_eq!(count(&tree.browsed_keys(), "loop"), 2 * (MAX_DEPTH + 1));
    }

    #[tokio::test]
    async fn test_activation_stops_after_first_action_list_at_depth_one() {
        let tree = tree_with(
            "album",
            vec![
                ("album", vec![menu("album-list", "Abbey Road", Hint::List)]),
                (
                    "album-list",
                    vec![
                        menu("album-actions", "Play Album", Hint::ActionList),
                        menu("track-1", "Come Together", Hint::ActionList),
                    ],
                ),
                ("album-actions", vec![menu("credits", "Credits", Hint::Item)]),
                ("track-1", vec![action("track-radio", "Start Radio")]),
            ],
        );

        let err = ActionExecutor::new(&tree)
            .execute("zone-1", &play("Start Radio"))
            .await
            .unwrap_err();
        assert_eq!(err, cannot_execute("Start Radio"));

        // Only discovery reaches the track's action list
        let browsed = tree.browsed_keys();
        assert_eq!(count(&browsed, "track-1"), 1);
        assert_eq!(count(&browsed, "track-radio"), 0);
    }
}
