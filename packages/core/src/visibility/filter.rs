//! Visibility Cascade Filter
//!
//! Two passes over a flat item list, no parent lookups:
//!
//! 1. mark every item whose own rule hides it at `as_of`, or whose linked
//!    resource did not resolve and which has no fallback URL
//! 2. sweep the items of each tree in `range_start` order, carrying the end
//!    of the innermost open hidden range; anything starting before that end
//!    lies inside a hidden item and is dropped with it

use super::resolver::{ResourceRef, Resolutions};
use crate::models::MenuItem;
use chrono::{DateTime, Utc};

/// Whether an item hides itself at `as_of`, ignoring its ancestors
pub fn self_hidden(item: &MenuItem, as_of: DateTime<Utc>, resolutions: &Resolutions) -> bool {
    if item.visibility.self_hidden(as_of) {
        return true;
    }
    match ResourceRef::of(item) {
        Some(reference) => {
            let has_fallback = item.link.as_ref().and_then(|l| l.literal_url()).is_some();
            !has_fallback && !resolutions.is_available(&reference)
        }
        None => false,
    }
}

/// Keep only the items that are effectively visible at `as_of`
///
/// Items may come from several trees. The output is in pre-order per tree,
/// so a nested view rebuilt from it keeps the original shape.
pub fn filter(
    mut items: Vec<MenuItem>,
    as_of: DateTime<Utc>,
    resolutions: &Resolutions,
) -> Vec<MenuItem> {
    let hidden_self: Vec<bool> = items
        .iter()
        .map(|item| self_hidden(item, as_of, resolutions))
        .collect();

    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        items[a]
            .tree_id
            .cmp(&items[b].tree_id)
            .then(items[a].range_start.cmp(&items[b].range_start))
    });

    let mut keep = vec![false; items.len()];
    let mut current_tree: Option<&str> = None;
    let mut cover_end = i64::MIN;
    for &index in &order {
        let item = &items[index];
        if current_tree != Some(item.tree_id.as_str()) {
            current_tree = Some(item.tree_id.as_str());
            cover_end = i64::MIN;
        }

        if item.range_start < cover_end {
            continue;
        }
        if hidden_self[index] {
            cover_end = item.range_end;
        } else {
            keep[index] = true;
        }
    }

    let mut slots: Vec<Option<MenuItem>> = items.drain(..).map(Some).collect();
    order
        .into_iter()
        .filter(|&index| keep[index])
        .filter_map(|index| slots[index].take())
        .collect()
}
