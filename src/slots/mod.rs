//! Virtualized slot model: maps an ordered row list onto a fixed number of
//! display slots with stable slot identity.
//!
//! A slot is a fixed display position, not a record: its `key` and `index`
//! never change once created, only the occupying row does. Reuse happens on
//! two levels — when nothing moved the entire previous slot array is returned
//! by reference, and when some rows moved the untouched slots keep their
//! previous `Arc`. Both levels let a renderer diff by pointer.

use std::sync::Arc;

use crate::core::config::SLOT_HARD_CAP;
use crate::window::record::StreamRecord;

/// One fixed display cell.
#[derive(Debug, Clone)]
pub struct RowSlot<R> {
    /// Stable slot key, `"slot-<index>"`.
    pub key: String,
    /// Stable slot position.
    pub index: usize,
    /// Id of the occupying record, if any.
    pub id: Option<String>,
    /// The occupying record, if any.
    pub row: Option<Arc<R>>,
}

/// Shared slot array; compare with pointer equality to skip renders.
pub type SlotSet<R> = Arc<[Arc<RowSlot<R>>]>;

/// Project `rows` onto `slot_count` fixed slots (capped at 50), reusing
/// `previous` wholesale when every slot is unchanged and per-slot otherwise.
#[must_use]
pub fn project<R: StreamRecord>(
    rows: &[Arc<R>],
    slot_count: usize,
    previous: Option<&SlotSet<R>>,
) -> SlotSet<R> {
    let count = slot_count.min(SLOT_HARD_CAP);

    if let Some(prev) = previous
        && prev.len() == count
        && prev
            .iter()
            .enumerate()
            .all(|(i, slot)| slot_matches(slot, rows.get(i)))
    {
        return prev.clone();
    }

    let slots: Vec<Arc<RowSlot<R>>> = (0..count)
        .map(|i| {
            let row = rows.get(i);
            if let Some(prev_slot) = previous.and_then(|prev| prev.get(i))
                && slot_matches(prev_slot, row)
            {
                return Arc::clone(prev_slot);
            }
            Arc::new(RowSlot {
                key: format!("slot-{i}"),
                index: i,
                id: row.map(|r| r.id().to_string()),
                row: row.map(Arc::clone),
            })
        })
        .collect();
    slots.into()
}

fn slot_matches<R: StreamRecord>(slot: &RowSlot<R>, row: Option<&Arc<R>>) -> bool {
    match (&slot.row, row) {
        (Some(held), Some(new)) => {
            Arc::ptr_eq(held, new) && slot.id.as_deref() == Some(new.id())
        }
        (None, None) => slot.id.is_none(),
        _ => false,
    }
}

/// Records occupying slots, in slot order, with empty slots dropped.
#[must_use]
pub fn extract_rows<R>(slots: &SlotSet<R>) -> Vec<Arc<R>> {
    slots
        .iter()
        .filter_map(|slot| slot.row.as_ref().map(Arc::clone))
        .collect()
}

/// Absolute scrolled position of `selected_id`: `visible_offset` plus the
/// row's index within `rows`, or `None` when the id is absent.
#[must_use]
pub fn resolve_selection_index<R: StreamRecord>(
    rows: &[Arc<R>],
    selected_id: Option<&str>,
    visible_offset: usize,
) -> Option<usize> {
    let selected = selected_id?;
    if selected.is_empty() {
        return None;
    }
    rows.iter()
        .position(|row| row.id() == selected)
        .map(|index| visible_offset + index)
}
