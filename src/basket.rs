//! Basket construction: one basket per customer per calendar month

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ndarray::Array2;
use tracing::info;

use crate::data::Event;

/// A service under a specific category, rendered `serviceId_categoryId`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_event(event: &Event) -> Self {
        Self(format!("{}_{}", event.service_id, event.category_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A customer's purchases within one month, rendered `userId_YYYY-MM`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BasketKey(String);

impl BasketKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_event(event: &Event) -> Self {
        Self(format!("{}_{}", event.user_id, event.year_month()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The customer part of the key
    pub fn user_id(&self) -> &str {
        self.0.rsplit_once('_').map_or(self.0.as_str(), |(user, _)| user)
    }
}

impl fmt::Display for BasketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BasketKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Binary basket-by-item occurrence table
///
/// Rows are baskets and columns are items, both in sorted key order. A cell
/// is 1 when the item was bought at least once in the basket, else 0.
#[derive(Debug, Clone)]
pub struct OccurrenceMatrix {
    basket_keys: Vec<BasketKey>,
    item_keys: Vec<ItemKey>,
    cells: Array2<u8>,
}

impl OccurrenceMatrix {
    /// Build a matrix from baskets given as item lists; duplicates collapse.
    pub fn from_baskets<B, I, T>(baskets: B) -> Self
    where
        B: IntoIterator<Item = (BasketKey, I)>,
        I: IntoIterator<Item = T>,
        T: Into<ItemKey>,
    {
        let mut grouped: BTreeMap<BasketKey, BTreeSet<ItemKey>> = BTreeMap::new();
        for (basket, items) in baskets {
            grouped.entry(basket).or_default().extend(items.into_iter().map(Into::into));
        }
        Self::from_grouped(grouped)
    }

    fn from_grouped(grouped: BTreeMap<BasketKey, BTreeSet<ItemKey>>) -> Self {
        let item_keys: Vec<ItemKey> =
            grouped.values().flatten().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let column_of: BTreeMap<&ItemKey, usize> =
            item_keys.iter().enumerate().map(|(i, key)| (key, i)).collect();

        let mut cells = Array2::<u8>::zeros((grouped.len(), item_keys.len()));
        for (row, items) in grouped.values().enumerate() {
            for item in items {
                cells[[row, column_of[item]]] = 1;
            }
        }

        Self { basket_keys: grouped.into_keys().collect(), item_keys, cells }
    }

    pub fn basket_keys(&self) -> &[BasketKey] {
        &self.basket_keys
    }

    pub fn item_keys(&self) -> &[ItemKey] {
        &self.item_keys
    }

    /// The 0/1 cell table, baskets by items
    pub fn cells(&self) -> &Array2<u8> {
        &self.cells
    }

    pub fn n_baskets(&self) -> usize {
        self.basket_keys.len()
    }

    pub fn n_items(&self) -> usize {
        self.item_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basket_keys.is_empty()
    }

    pub fn basket_index(&self, basket: &BasketKey) -> Option<usize> {
        self.basket_keys.binary_search(basket).ok()
    }

    pub fn item_index(&self, item: &ItemKey) -> Option<usize> {
        self.item_keys.binary_search(item).ok()
    }

    pub fn contains(&self, basket: &BasketKey, item: &ItemKey) -> bool {
        match (self.basket_index(basket), self.item_index(item)) {
            (Some(row), Some(column)) => self.cells[[row, column]] == 1,
            _ => false,
        }
    }

    /// Items present in a basket, in key order
    pub fn basket_items(&self, basket: &BasketKey) -> Vec<&ItemKey> {
        let Some(row) = self.basket_index(basket) else {
            return Vec::new();
        };

        self.cells
            .row(row)
            .iter()
            .zip(&self.item_keys)
            .filter(|(&cell, _)| cell == 1)
            .map(|(_, item)| item)
            .collect()
    }

    /// All baskets belonging to one customer, oldest month first
    pub fn baskets_for_user(&self, user_id: &str) -> Vec<&BasketKey> {
        self.basket_keys.iter().filter(|key| key.user_id() == user_id).collect()
    }

    /// Fraction of baskets that contain `item`
    pub fn item_frequency(&self, item: &ItemKey) -> f64 {
        match self.item_index(item) {
            Some(column) if !self.is_empty() => {
                let count: usize = self.cells.column(column).iter().map(|&c| c as usize).sum();
                count as f64 / self.n_baskets() as f64
            }
            _ => 0.0,
        }
    }

    /// Fraction of cells that are set
    pub fn density(&self) -> f64 {
        let total = self.cells.len();
        if total == 0 {
            return 0.0;
        }
        let filled: usize = self.cells.iter().map(|&c| c as usize).sum();
        filled as f64 / total as f64
    }
}

/// Bucket events into monthly baskets and collapse repeats to presence flags
pub fn build_occurrence_matrix(events: &[Event]) -> OccurrenceMatrix {
    let mut grouped: BTreeMap<BasketKey, BTreeSet<ItemKey>> = BTreeMap::new();
    for event in events {
        grouped.entry(BasketKey::from_event(event)).or_default().insert(ItemKey::from_event(event));
    }

    let matrix = OccurrenceMatrix::from_grouped(grouped);
    info!(
        events = events.len(),
        baskets = matrix.n_baskets(),
        items = matrix.n_items(),
        "built occurrence matrix"
    );
    matrix
}
