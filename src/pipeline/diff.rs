//! Diff calculation against the "last seen" state.
//!
//! Each probed item is compared with the signature recorded for its product.
//! An item is new when the product has no entry yet or the signature changed.
//! Entries for products missing from this run are carried over untouched.

use std::collections::HashMap;

use crate::models::UpdateItem;
use crate::storage::StateMap;

/// Outcome of comparing one run's items with the previous state.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Every item processed, in input order
    pub all_items: Vec<UpdateItem>,
    /// Items whose signature differs from the recorded one
    pub new_items: Vec<UpdateItem>,
    /// Previous state with this run's signatures applied
    pub state: StateMap,
}

impl DiffResult {
    /// Check if there are any new items.
    pub fn has_changes(&self) -> bool {
        !self.new_items.is_empty()
    }
}

/// Classify `items` against `previous`.
///
/// Items are applied in order and the comparison uses the state as updated so
/// far, so when one product name appears twice the later item wins the state
/// entry, and an identical repeat is not reported twice.
pub fn calculate_diff(items: Vec<UpdateItem>, previous: &StateMap) -> DiffResult {
    let mut state = previous.clone();
    let mut new_items = Vec::new();
    let mut seen_this_run: HashMap<String, String> = HashMap::new();

    for item in &items {
        let signature = item.signature();

        if let Some(earlier) = seen_this_run.get(&item.product) {
            if *earlier != signature {
                log::warn!(
                    "Product name '{}' probed twice with different updates; keeping the later one ({})",
                    item.product,
                    item.substance
                );
            }
        }

        if state.get(&item.product) != Some(&signature) {
            new_items.push(item.clone());
            state.insert(item.product.clone(), signature.clone());
        }
        seen_this_run.insert(item.product.clone(), signature);
    }

    DiffResult {
        all_items: items,
        new_items,
        state,
    }
}
