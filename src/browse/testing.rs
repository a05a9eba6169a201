//! Scripted in-memory menu tree for exercising the navigation engine.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BrowseContext, BrowseList, BrowseLoadClient, BrowseRequest, Hint, LoadRequest, MenuNode};
use crate::error::{NavError, NavResult};

/// A recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Browse {
        session_key: String,
        item_key: Option<String>,
        input: Option<String>,
    },
    Load {
        session_key: String,
        item_key: Option<String>,
        offset: usize,
        count: usize,
    },
}

pub fn menu(key: &str, title: &str, hint: Hint) -> MenuNode {
    MenuNode {
        item_key: Some(key.to_string()),
        title: title.to_string(),
        subtitle: None,
        hint,
        image_key: None,
    }
}

pub fn action(key: &str, title: &str) -> MenuNode {
    menu(key, title, Hint::Action)
}

/// Menu tree keyed by item key. The list reached by a search browse (input,
/// no item key) is the root.
#[derive(Default)]
pub struct FakeTree {
    root: Vec<MenuNode>,
    nodes: HashMap<String, Vec<MenuNode>>,
    rotations: HashMap<String, String>,
    failing: HashSet<String>,
    disconnected: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, children: Vec<MenuNode>) -> Self {
        self.root = children;
        self
    }

    pub fn node(mut self, key: &str, children: Vec<MenuNode>) -> Self {
        self.nodes.insert(key.to_string(), children);
        self
    }

    /// Browsing into `key` reports `session_key` as the new session.
    pub fn rotate(mut self, key: &str, session_key: &str) -> Self {
        self.rotations
            .insert(key.to_string(), session_key.to_string());
        self
    }

    /// Browsing into `key` fails.
    pub fn fail(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.disconnected = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Item keys browsed into, in order
    pub fn browsed_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Browse { item_key, .. } => item_key,
                Call::Load { .. } => None,
            })
            .collect()
    }

    fn children(&self, item_key: Option<&str>) -> &[MenuNode] {
        match item_key {
            None => &self.root,
            Some(key) => self.nodes.get(key).map(Vec::as_slice).unwrap_or(&[]),
        }
    }
}

#[async_trait]
impl BrowseLoadClient for FakeTree {
    async fn is_connected(&self) -> bool {
        !self.disconnected
    }

    async fn browse(&self, ctx: &BrowseContext, req: BrowseRequest) -> NavResult<BrowseList> {
        self.calls.lock().unwrap().push(Call::Browse {
            session_key: ctx.session_key.clone(),
            item_key: req.item_key.clone(),
            input: req.input.clone(),
        });

        if let Some(key) = req.item_key.as_deref() {
            if self.failing.contains(key) {
                return Err(NavError::remote(format!("InvalidItemKey {}", key)));
            }
        }

        Ok(BrowseList {
            count: Some(self.children(req.item_key.as_deref()).len()),
            session_key: req
                .item_key
                .as_deref()
                .and_then(|key| self.rotations.get(key).cloned()),
        })
    }

    async fn load(&self, ctx: &BrowseContext, req: LoadRequest) -> NavResult<Vec<MenuNode>> {
        self.calls.lock().unwrap().push(Call::Load {
            session_key: ctx.session_key.clone(),
            item_key: req.item_key.clone(),
            offset: req.offset,
            count: req.count,
        });

        let children = self.children(req.item_key.as_deref());
        Ok(children
            .iter()
            .skip(req.offset)
            .take(req.count)
            .cloned()
            .collect())
    }
}
