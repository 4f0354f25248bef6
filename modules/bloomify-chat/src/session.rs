//! Slot merge policy shared by every session store implementation.

use bloomify_common::{SlotUpdate, Slots};

/// Fold one turn's extraction into the persisted slots.
///
/// A field the turn mentions replaces the previous value; anything else
/// carries forward. An empty color list counts as "not mentioned".
pub fn merge_slots(prev: &Slots, update: &SlotUpdate) -> Slots {
    let colors = update
        .colors
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| prev.colors.clone().filter(|c| !c.is_empty()));

    Slots {
        occasion: update.occasion.or(prev.occasion),
        budget: positive_budget(update.budget).or(positive_budget(prev.budget)),
        colors,
    }
}

/// Accept only finite, strictly positive budgets.
pub fn positive_budget(budget: Option<f64>) -> Option<f64> {
    budget.filter(|b| b.is_finite() && *b > 0.0)
}
