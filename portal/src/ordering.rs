//! Drag-and-drop reordering of sibling lists.
//!
//! A drop event names the dragged item (`active`) and the item it was dropped on (`over`). The
//! dragged item takes the target's position and everything in between shifts by one. Persisting the
//! result rewrites `order_index` to the item's position in the new sequence, so a list of N items
//! always ends up numbered `0..N`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Body of every reorder endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReorderRequest {
    #[schema(value_type = String, format = "uuid")]
    pub active_id: Uuid,
    /// Absent when the item was dropped outside the list
    #[schema(value_type = Option<String>, format = "uuid")]
    pub over_id: Option<Uuid>,
}

/// Remove the element at `from` and insert it at `to`.
///
/// Out-of-range indices leave the list untouched.
pub fn array_move<T>(mut list: Vec<T>, from: usize, to: usize) -> Vec<T> {
    if from >= list.len() || to >= list.len() {
        return list;
    }
    let item = list.remove(from);
    list.insert(to, item);
    list
}

/// Compute the new sequence after dropping `active` onto `over`.
///
/// Returns `None` when nothing moves: no drop target, a drop onto itself, or an id that is not in
/// the list.
pub fn reorder<T: PartialEq + Copy>(ids: &[T], active: T, over: Option<T>) -> Option<Vec<T>> {
    let over = over?;
    if active == over {
        return None;
    }

    let from = ids.iter().position(|id| *id == active)?;
    let to = ids.iter().position(|id| *id == over)?;

    Some(array_move(ids.to_vec(), from, to))
}

/// `(id, order_index)` assignments for a sequence.
pub fn indexed<T: Copy>(ids: &[T]) -> Vec<(T, i32)> {
    ids.iter().enumerate().map(|(position, id)| (*id, position as i32)).collect()
}
