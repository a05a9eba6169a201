//! Free-text search over the Roon search hierarchy.

use std::time::{SystemTime, UNIX_EPOCH};

use roonpipe_wire::{Action, ResultType, SearchResult};
use tracing::{debug, info};

use super::{
    ActionDiscoverer, BrowseContext, BrowseLoadClient, BrowseRequest, LoadRequest, MenuNode,
    DEFAULT_LOAD_COUNT,
};
use crate::error::NavResult;
use crate::images::ImageResolver;

/// Items kept from each category unless configured otherwise.
pub const MAX_RESULTS_PER_CATEGORY: usize = 5;

/// Category title fragments, checked in order against the lowercased title.
///
/// These match the English category names Roon uses today ("Artists",
/// "Albums", "Tracks", ...). Anything else is treated as a track.
const TYPE_RULES: &[(&str, ResultType)] = &[
    ("artist", ResultType::Artist),
    ("album", ResultType::Album),
    ("composer", ResultType::Composer),
    ("playlist", ResultType::Playlist),
    ("track", ResultType::Track),
    ("work", ResultType::Work),
];

pub fn infer_result_type(category_title: &str) -> ResultType {
    let title = category_title.to_lowercase();
    TYPE_RULES
        .iter()
        .find(|(fragment, _)| title.contains(*fragment))
        .map(|(_, kind)| *kind)
        .unwrap_or_default()
}

/// One search call against one zone.
pub struct SearchSession<'a> {
    client: &'a dyn BrowseLoadClient,
    images: &'a dyn ImageResolver,
    zone_id: String,
    max_per_category: usize,
}

impl<'a> SearchSession<'a> {
    pub fn new(
        client: &'a dyn BrowseLoadClient,
        images: &'a dyn ImageResolver,
        zone_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            images,
            zone_id: zone_id.into(),
            max_per_category: MAX_RESULTS_PER_CATEGORY,
        }
    }

    pub fn with_max_per_category(mut self, max: usize) -> Self {
        self.max_per_category = max;
        self
    }

    /// Results in category order, then item order inside each category.
    ///
    /// Category-level failures abort the search; failures while collecting
    /// one item's actions or artwork only leave that item without them.
    pub async fn search(&self, query: &str) -> NavResult<Vec<SearchResult>> {
        let ctx = BrowseContext::search(mint_session_key(), self.zone_id.clone());
        info!(query = %query, session_key = %ctx.session_key, "searching");

        let list = self.client.browse(&ctx, BrowseRequest::input(query)).await?;
        let ctx = ctx.adopt(list.session_key.as_deref());

        let count = list.count.unwrap_or(DEFAULT_LOAD_COUNT);
        let categories = if count == 0 {
            Vec::new()
        } else {
            self.client
                .load(&ctx, LoadRequest::page(None, 0, count))
                .await?
        };

        let discoverer = ActionDiscoverer::new(self.client);
        let mut results = Vec::new();
        let mut image_keys = Vec::new();

        for category in &categories {
            let Some(category_key) = category.item_key.as_deref() else {
                continue;
            };
            if category.title.is_empty() {
                continue;
            }

            let result_type = infer_result_type(&category.title);
            let (cat_ctx, items) = self.load_category(&ctx, category_key).await?;
            debug!(
                category = %category.title,
                kind = %result_type,
                items = items.len(),
                "loaded category"
            );

            for (index, item) in items.into_iter().enumerate() {
                let actions = match item.item_key.as_deref() {
                    Some(key) => discoverer.discover(&cat_ctx, key).await,
                    None => Vec::new(),
                };
                if let Some(image_key) = &item.image_key {
                    image_keys.push(image_key.clone());
                }
                results.push((
                    item.image_key.clone(),
                    build_result(item, result_type, &cat_ctx, category_key, index, actions),
                ));
            }
        }

        let images = self.images.resolve_many(image_keys).await;
        let results: Vec<SearchResult> = results
            .into_iter()
            .map(|(image_key, mut result)| {
                result.image = image_key
                    .and_then(|key| images.get(&key))
                    .map(|path| path.to_string_lossy().into_owned());
                result
            })
            .collect();

        info!(query = %query, results = results.len(), "search finished");
        Ok(results)
    }

    /// Browse into a category and load its first items.
    async fn load_category(
        &self,
        ctx: &BrowseContext,
        category_key: &str,
    ) -> NavResult<(BrowseContext, Vec<MenuNode>)> {
        let list = self
            .client
            .browse(ctx, BrowseRequest::item(category_key))
            .await?;
        let ctx = ctx.adopt(list.session_key.as_deref());

        let count = list
            .count
            .unwrap_or(self.max_per_category)
            .min(self.max_per_category);
        if count == 0 {
            return Ok((ctx, Vec::new()));
        }

        let items = self
            .client
            .load(&ctx, LoadRequest::page(Some(category_key), 0, count))
            .await?;
        Ok((ctx, items))
    }
}

fn build_result(
    item: MenuNode,
    result_type: ResultType,
    ctx: &BrowseContext,
    category_key: &str,
    index: usize,
    actions: Vec<Action>,
) -> SearchResult {
    let title = if item.title.is_empty() {
        format!("Unknown {}", result_type.label())
    } else {
        item.title
    };
    // "Artist, Other Artist" -> "Artist"
    let subtitle = item
        .subtitle
        .as_deref()
        .and_then(|s| s.split(", ").next())
        .unwrap_or_default()
        .to_string();

    SearchResult {
        title,
        subtitle,
        item_key: item.item_key.unwrap_or_default(),
        image: None,
        hint: Some(item.hint.as_str().to_string()),
        session_key: ctx.session_key.clone(),
        result_type,
        category_key: category_key.to_string(),
        index,
        actions,
    }
}

fn mint_session_key() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("search_{}", millis)
}
