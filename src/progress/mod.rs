//! Progress reporting for research runs
//!
//! Progress is a set of named status lines kept in first-insertion order. Each
//! line can be rewritten, marked done, and finally the whole display is ended.

use async_trait::async_trait;
use serde::Serialize;

pub mod console;

pub use console::ConsolePrinter;

/// One status line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressItem {
    pub id: String,
    pub content: String,
    pub is_done: bool,
    pub hide_checkmark: bool,
}

/// Ordered registry of status lines
#[derive(Debug, Clone, Default)]
pub struct ProgressBoard {
    items: Vec<ProgressItem>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the line with this id; returns false if nothing changed
    pub fn upsert(&mut self, id: &str, content: &str, is_done: bool, hide_checkmark: bool) -> bool {
        let item = ProgressItem {
            id: id.to_string(),
            content: content.to_string(),
            is_done,
            hide_checkmark,
        };

        match self.items.iter_mut().find(|existing| existing.id == id) {
            Some(existing) if *existing == item => false,
            Some(existing) => {
                *existing = item;
                true
            }
            None => {
                self.items.push(item);
                true
            }
        }
    }

    /// Mark an existing line done; unknown ids are ignored
    pub fn mark_done(&mut self, id: &str) -> Option<&ProgressItem> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.is_done = true;
        Some(item)
    }

    pub fn get(&self, id: &str) -> Option<&ProgressItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[ProgressItem] {
        &self.items
    }
}

#[async_trait]
pub trait Progress: Send + Sync {
    async fn update_item(&self, id: &str, content: &str, is_done: bool, hide_checkmark: bool);
    async fn mark_item_done(&self, id: &str);
    async fn end(&self);
}

pub struct NoOpProgress;

#[async_trait]
impl Progress for NoOpProgress {
    async fn update_item(&self, _id: &str, _content: &str, _is_done: bool, _hide_checkmark: bool) {
    }
    async fn mark_item_done(&self, _id: &str) {}
    async fn end(&self) {}
}
