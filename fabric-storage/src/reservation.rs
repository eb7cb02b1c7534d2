//! The Reservation Overlay (spec §2 RO, §3 "Reservation entry", §4.5).

use rustc_hash::FxHashMap;

use crate::item::ItemKind;
use crate::index::PriorTotal;

/// Per-kind signed reservation counter. Positive values earmark
/// physical items for an accepted craft; negative values promise a
/// future output not yet produced (spec §3).
#[derive(Debug, Default)]
pub struct ReservationOverlay {
    reserved: FxHashMap<ItemKind, i64>,
    changes: FxHashMap<ItemKind, PriorTotal>,
}

impl ReservationOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reserved(&self, kind: &ItemKind) -> i64 {
        self.reserved.get(kind).copied().unwrap_or(0)
    }

    /// `available = max(0, total - max(0, reserved))` (spec §3).
    #[must_use]
    pub fn available(&self, kind: &ItemKind, total: u32) -> u32 {
        let clamped_reserved = self.reserved(kind).max(0);
        (i64::from(total) - clamped_reserved).max(0) as u32
    }

    fn touch(&mut self, kind: &ItemKind) {
        let prior = self.reserved(kind);
        self.changes
            .entry(kind.clone())
            .or_insert(PriorTotal(prior.max(0) as u32));
    }

    /// `setReserved(kind, amount)` (spec §4.5).
    pub fn set_reserved(&mut self, kind: &ItemKind, amount: i64) {
        self.touch(kind);
        if amount == 0 {
            self.reserved.remove(kind);
        } else {
            self.reserved.insert(kind.clone(), amount);
        }
    }

    /// `changeReserved(kind, delta)` (spec §4.5).
    pub fn change_reserved(&mut self, kind: &ItemKind, delta: i64) {
        self.touch(kind);
        let updated = self.reserved(kind) + delta;
        if updated == 0 {
            self.reserved.remove(kind);
        } else {
            self.reserved.insert(kind.clone(), updated);
        }
    }

    pub fn drain_changes(&mut self) -> Vec<(ItemKind, PriorTotal)> {
        self.changes.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind() -> ItemKind {
        ItemKind::new("minecraft", "coal", 0, false, None)
    }

    #[test]
    fn available_clamps_negative_promise_reservations_to_zero() {
        let mut ro = ReservationOverlay::new();
        let k = kind();
        ro.set_reserved(&k, -4); // a promise of 4 not-yet-produced items
        assert_eq!(ro.available(&k, 10), 10);
    }

    #[test]
    fn available_subtracts_positive_reservation() {
        let mut ro = ReservationOverlay::new();
        let k = kind();
        ro.change_reserved(&k, 4);
        assert_eq!(ro.available(&k, 10), 6);
        ro.change_reserved(&k, -4);
        assert_eq!(ro.available(&k, 10), 10);
    }

    #[test]
    fn available_never_negative_when_reservation_exceeds_total() {
        let mut ro = ReservationOverlay::new();
        let k = kind();
        ro.set_reserved(&k, 20);
        assert_eq!(ro.available(&k, 10), 0);
    }
}
