//! Page-scoped row selection.

use std::fmt::Debug;
use std::hash::Hash;

use helmsman_api_models::{Item, ResourceId};

/// Rows that can be selected by a stable key.
pub trait Keyed {
    /// Identity used for membership checks.
    type Key: Clone + Eq + Hash + Debug;

    /// Stable identity of the row.
    fn key(&self) -> Self::Key;
}

impl Keyed for Item {
    type Key = ResourceId;

    fn key(&self) -> ResourceId {
        self.id
    }
}

/// Selected subset of the visible rows.
///
/// Replacing the visible rows does not purge selections that point at rows no
/// longer shown; callers clear them explicitly (typically after a delete).
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<T> {
    items: Vec<T>,
    selected: Vec<T>,
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: Vec::new(),
        }
    }
}

impl<T: Keyed + Clone> Selection<T> {
    /// Track selection over `items`.
    #[must_use]
    pub const fn new(items: Vec<T>) -> Self {
        Self {
            items,
            selected: Vec::new(),
        }
    }

    /// Swap in a new page of rows.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
    }

    /// Rows currently visible.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Selected rows in selection order.
    #[must_use]
    pub fn selected(&self) -> &[T] {
        &self.selected
    }

    /// Keys of the selected rows in selection order.
    #[must_use]
    pub fn selected_keys(&self) -> Vec<T::Key> {
        self.selected.iter().map(Keyed::key).collect()
    }

    /// Whether `item` is selected.
    #[must_use]
    pub fn is_selected(&self, item: &T) -> bool {
        let key = item.key();
        self.selected.iter().any(|entry| entry.key() == key)
    }

    /// True iff there is at least one visible row and every one is selected.
    #[must_use]
    pub fn is_all_selected(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| self.is_selected(item))
    }

    /// Toggle membership of `item`.
    pub fn handle_select(&mut self, item: &T) {
        let key = item.key();
        if let Some(position) = self.selected.iter().position(|entry| entry.key() == key) {
            self.selected.remove(position);
        } else {
            self.selected.push(item.clone());
        }
    }

    /// Select every visible row, or clear the selection.
    pub fn select_all(&mut self, select: bool) {
        if select {
            self.selected = self.items.clone();
        } else {
            self.selected.clear();
        }
    }

    /// Drop every selection.
    pub fn clear_selected(&mut self) {
        self.selected.clear();
    }

    /// Replace the selection wholesale.
    pub fn set_selected(&mut self, selected: Vec<T>) {
        self.selected = selected;
    }
}
