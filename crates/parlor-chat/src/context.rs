//! Context pool: deduplicated attachment-derived items for one conversation.

use chrono::Utc;
use uuid::Uuid;

use parlor_core::types::ContextItemType;

use crate::error::ChatError;
use crate::types::{ContextAddOutcome, ContextItem};

/// Append-ordered pool of context items, unique by URL.
#[derive(Debug, Default)]
pub struct ContextPool {
    items: Vec<ContextItem>,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item unless its URL is already present.
    ///
    /// A duplicate URL creates nothing and returns the existing item.
    pub fn add_item(
        &mut self,
        url: &str,
        name: &str,
        item_type: ContextItemType,
    ) -> ContextAddOutcome {
        if let Some(existing) = self.items.iter().find(|i| i.url == url) {
            tracing::debug!(url, "Context item already present");
            return ContextAddOutcome::Duplicate(existing.clone());
        }

        let item = ContextItem {
            id: Uuid::new_v4(),
            url: url.to_string(),
            name: name.to_string(),
            item_type,
            added_at: Utc::now(),
        };
        self.items.push(item.clone());
        ContextAddOutcome::Added(item)
    }

    /// Remove an item by id.
    pub fn remove_item(&mut self, id: Uuid) -> Result<ContextItem, ChatError> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(ChatError::ContextItemNotFound(id))?;
        Ok(self.items.remove(pos))
    }

    /// Drop every item, returning them in append order.
    pub fn clear(&mut self) -> Vec<ContextItem> {
        std::mem::take(&mut self.items)
    }

    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item() {
        let mut pool = ContextPool::new();
        let outcome = pool.add_item("blob:p/1", "leaf.png", ContextItemType::Image);
        assert!(!outcome.is_duplicate());
        assert_eq!(outcome.item().name, "leaf.png");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_duplicate_url_is_noop() {
        let mut pool = ContextPool::new();
        let first = pool.add_item("blob:p/1", "leaf.png", ContextItemType::Image);
        let second = pool.add_item("blob:p/1", "renamed.png", ContextItemType::Document);
        assert!(second.is_duplicate());
        assert_eq!(second.item().id, first.item().id);
        assert_eq!(second.item().name, "leaf.png");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_same_name_different_url_is_distinct() {
        let mut pool = ContextPool::new();
        pool.add_item("blob:p/1", "scan.pdf", ContextItemType::Document);
        pool.add_item("blob:p/2", "scan.pdf", ContextItemType::Document);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_append_order_preserved() {
        let mut pool = ContextPool::new();
        for i in 0..5 {
            pool.add_item(&format!("blob:p/{}", i), "f", ContextItemType::Document);
        }
        let urls: Vec<&str> = pool.items().iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["blob:p/0", "blob:p/1", "blob:p/2", "blob:p/3", "blob:p/4"]);
    }

    #[test]
    fn test_remove_item() {
        let mut pool = ContextPool::new();
        let id = pool.add_item("blob:p/1", "a", ContextItemType::Image).item().id;
        let removed = pool.remove_item(id).unwrap();
        assert_eq!(removed.url, "blob:p/1");
        assert!(pool.is_empty());
        // URL may be re-added once removed
        assert!(!pool.add_item("blob:p/1", "a", ContextItemType::Image).is_duplicate());
    }

    #[test]
    fn test_remove_unknown_item() {
        let mut pool = ContextPool::new();
        let missing = Uuid::new_v4();
        assert_eq!(
            pool.remove_item(missing).unwrap_err(),
            ChatError::ContextItemNotFound(missing)
        );
    }

    #[test]
    fn test_clear() {
        let mut pool = ContextPool::new();
        pool.add_item("blob:p/1", "a", ContextItemType::Image);
        pool.add_item("blob:p/2", "b", ContextItemType::Document);
        let removed = pool.clear();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].name, "a");
        assert!(pool.is_empty());
        assert!(matches!(
            pool.add_item("blob:p/1", "a", ContextItemType::Image),
            ContextAddOutcome::Added(_)
        ));
    }
}
