//! The Craft Ticket state machine (spec §3 "Craft ticket", §4.8): one
//! user craft request's plan, its activation-time bookkeeping, and the
//! worker tasks currently pipelined against it.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use fabric_recipes::{RecipeCatalog, RecipeId};
use fabric_storage::{InventoryId, ItemKind};
use fabric_utils::{IdCounter, TaskId, TicketId};

use crate::solver::Plan;
use crate::worker_pool::WorkerAddr;

/// A pending ticket not yet `start`ed is discarded after this long
/// with no activation (spec §3 "Lifecycle").
pub const PENDING_EXPIRY: Duration = Duration::from_secs(10);

/// A storage extract in flight longer than this is a fatal timeout
/// for the owning ticket (SPEC_FULL §5).
pub const STORAGE_EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Pending,
    Active,
    Done,
    Cancelled,
}

/// Per-plan-entry bookkeeping (spec §3 `recipeStatus[]`).
#[derive(Debug, Clone, Default)]
pub struct RecipeStatus {
    pub dirty: bool,
    pub available_batches: u32,
    pub max_last_time: Option<Instant>,
}

/// `storedItems` entry: what the ticket has produced or pulled in for
/// one kind since activation, and which plan entries should be
/// re-examined (marked dirty) when it changes.
#[derive(Debug, Clone, Default)]
pub struct StoredItem {
    pub count: u32,
    pub last_produced_time: Option<Instant>,
    pub dependents: Vec<usize>,
}

/// One in-flight worker task (spec §3 `craftingTasks` entry).
#[derive(Debug, Clone)]
pub struct CraftingTask {
    pub staging: InventoryId,
    pub batches: u32,
    pub recipe: RecipeId,
    pub workers: Vec<WorkerAddr>,
}

/// One user craft request, from `check_recipe` preview through
/// completion, cancellation, or pending expiry.
pub struct CraftTicket {
    pub id: TicketId,
    pub status: TicketStatus,
    pub created_at: Instant,
    pub plan: Plan,

    /// Net inputs the plan needs overall (spec §3 `requiredItems`):
    /// the plan's own `net_input`, fixed at creation time.
    pub required_items: FxHashMap<ItemKind, u32>,

    pub stored_items: FxHashMap<ItemKind, StoredItem>,
    pub recipe_status: Vec<RecipeStatus>,
    /// Batches of each plan entry not yet claimed by a dispatched task
    /// (spec §4.8 step 2 "Update ticket's batches-remaining").
    pub batches_remaining: Vec<u32>,
    pub recipe_start_index: usize,
    pub supply_indices: FxHashMap<InventoryId, bool>,
    pub crafting_tasks: FxHashMap<TaskId, CraftingTask>,
    task_counter: IdCounter,

    /// Set while a storage extract request for this ticket is in
    /// flight (spec §4.8 step 1's gate), with the time it was issued
    /// so a stuck extract can be recognized as a fatal timeout.
    pub extract_in_flight_since: Option<Instant>,

    /// Workers dispatched this cycle, awaiting the in-flight extract's
    /// completion before they receive `start_craft` (spec §4.8 step 1).
    pub pending_workers: Vec<(WorkerAddr, TaskId)>,
}

impl CraftTicket {
    #[must_use]
    pub fn new(id: TicketId, plan: Plan, catalog: &RecipeCatalog, now: Instant) -> Self {
        let required_items = plan.net_input.clone();
        let recipe_status = vec![RecipeStatus::default(); plan.recipes.len()];
        let batches_remaining = plan.batches.clone();

        let mut stored_items: FxHashMap<ItemKind, StoredItem> = FxHashMap::default();
        for (idx, recipe_id) in plan.recipes.iter().enumerate() {
            let recipe = catalog.recipe(*recipe_id).expect("plan only holds catalog recipe ids");
            for (kind, _) in recipe.inputs.net_inputs() {
                stored_items.entry(kind).or_default().dependents.push(idx);
            }
        }

        Self {
            id,
            status: TicketStatus::Pending,
            created_at: now,
            plan,
            required_items,
            stored_items,
            recipe_status,
            batches_remaining,
            recipe_start_index: 0,
            supply_indices: FxHashMap::default(),
            crafting_tasks: FxHashMap::default(),
            task_counter: IdCounter::new(),
            extract_in_flight_since: None,
            pending_workers: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_pending_expired(&self, now: Instant) -> bool {
        self.status == TicketStatus::Pending && now.duration_since(self.created_at) >= PENDING_EXPIRY
    }

    /// `pending` → `active` on `start` (spec §4.8).
    pub fn activate(&mut self) {
        self.status = TicketStatus::Active;
        for status in &mut self.recipe_status {
            status.dirty = true;
        }
    }

    pub fn cancel(&mut self) {
        self.status = TicketStatus::Cancelled;
    }

    #[must_use]
    pub fn is_extract_timed_out(&self, now: Instant) -> bool {
        match self.extract_in_flight_since {
            Some(since) => now.duration_since(since) >= STORAGE_EXTRACT_TIMEOUT,
            None => false,
        }
    }

    pub fn next_task_id(&self) -> TaskId {
        TaskId(self.task_counter.next())
    }

    /// Recomputes one plan entry's `available` and `maxLastTime` from
    /// `stored_items` (spec §4.8 step 2 "if dirty, recompute").
    pub fn refresh_recipe_status(&mut self, idx: usize, catalog: &RecipeCatalog) {
        let recipe_id = self.plan.recipes[idx];
        let recipe = catalog.recipe(recipe_id).expect("plan only holds catalog recipe ids");
        let mut available = u32::MAX;
        let mut max_last_time = None;
        for (kind, per_batch) in recipe.inputs.net_inputs() {
            if per_batch == 0 {
                continue;
            }
            let stored = self.stored_items.get(&kind);
            let count = stored.map_or(0, |s| s.count);
            available = available.min(count / per_batch);
            if let Some(t) = stored.and_then(|s| s.last_produced_time) {
                max_last_time = Some(max_last_time.map_or(t, |m: Instant| m.max(t)));
            }
        }
        if available == u32::MAX {
            available = 0;
        }
        let status = &mut self.recipe_status[idx];
        status.available_batches = available;
        status.max_last_time = max_last_time;
        status.dirty = false;
    }

    /// Worker completion (spec §4.8 "Worker completion"): records a
    /// recipe's output into `stored_items` and marks every dependent
    /// plan entry dirty.
    pub fn record_output(&mut self, kind: ItemKind, count: u32, now: Instant) {
        let entry = self.stored_items.entry(kind).or_default();
        entry.count += count;
        entry.last_produced_time = Some(now);
        for &dep in &entry.dependents {
            self.recipe_status[dep].dirty = true;
        }
    }

    /// Deducts a locally-tracked stored amount (spec §4.8 step 2
    /// "deduct the reservations in the ticket's local `storedItems`"),
    /// used when batches are committed to dispatched tasks.
    pub fn deduct_stored(&mut self, kind: &ItemKind, count: u32) {
        if let Some(entry) = self.stored_items.get_mut(kind) {
            entry.count = entry.count.saturating_sub(count);
        }
    }

    /// Spec §4.8 step 3: "If the first plan entry's remaining batches
    /// is zero and it is at `recipeStartIndex`, advance the cursor
    /// past the exhausted entries." An entry is exhausted once its
    /// recipe's total plan batches have all been dispatched as tasks
    /// or already produced — the caller tracks per-entry "remaining"
    /// and calls this once that hits zero at the cursor.
    pub fn advance_cursor_if_exhausted(&mut self, is_exhausted: impl Fn(usize) -> bool) {
        while self.recipe_start_index < self.plan.recipes.len() && is_exhausted(self.recipe_start_index) {
            self.recipe_start_index += 1;
        }
    }

    /// Spec §4.8 step 4 terminal check.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.recipe_start_index >= self.plan.recipes.len()
            && self.crafting_tasks.is_empty()
            && self.supply_indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_recipes::RecipeCatalog;

    fn catalog() -> RecipeCatalog {
        let text = r#"
planks_station:
4 minecraft:planks#0 "Planks" 64
with
1 minecraft:log#0
"#;
        RecipeCatalog::load("recipes.cfg", text).unwrap()
    }

    fn plan(catalog: &RecipeCatalog) -> Plan {
        let recipe_id = catalog.recipes_for(&ItemKind::new("minecraft", "planks", 0, false, None))[0];
        Plan {
            recipes: vec![recipe_id],
            batches: vec![1],
            net_input: {
                let mut m = FxHashMap::default();
                m.insert(ItemKind::new("minecraft", "log", 0, false, None), 1);
                m
            },
            net_output: FxHashMap::default(),
        }
    }

    #[test]
    fn new_ticket_starts_pending_and_expires_after_ten_seconds() {
        let catalog = catalog();
        let now = Instant::now();
        let ticket = CraftTicket::new(TicketId(1), plan(&catalog), &catalog, now);
        assert_eq!(ticket.status, TicketStatus::Pending);
        assert!(!ticket.is_pending_expired(now));
        assert!(ticket.is_pending_expired(now + PENDING_EXPIRY));
    }

    #[test]
    fn activation_marks_every_recipe_status_dirty() {
        let catalog = catalog();
        let mut ticket = CraftTicket::new(TicketId(1), plan(&catalog), &catalog, Instant::now());
        ticket.activate();
        assert_eq!(ticket.status, TicketStatus::Active);
        assert!(ticket.recipe_status[0].dirty);
    }

    #[test]
    fn recording_output_marks_dependent_entries_dirty() {
        let catalog = catalog();
        let mut ticket = CraftTicket::new(TicketId(1), plan(&catalog), &catalog, Instant::now());
        ticket.activate();
        ticket.recipe_status[0].dirty = false;
        ticket.record_output(ItemKind::new("minecraft", "log", 0, false, None), 4, Instant::now());
        assert!(ticket.recipe_status[0].dirty);
    }

    #[test]
    fn refreshing_status_floors_available_batches_by_the_scarcest_input() {
        let catalog = catalog();
        let mut ticket = CraftTicket::new(TicketId(1), plan(&catalog), &catalog, Instant::now());
        ticket.activate();
        ticket.record_output(ItemKind::new("minecraft", "log", 0, false, None), 5, Instant::now());
        ticket.refresh_recipe_status(0, &catalog);
        assert_eq!(ticket.recipe_status[0].available_batches, 5);
        assert!(!ticket.recipe_status[0].dirty);
    }

    #[test]
    fn terminal_requires_cursor_past_end_and_no_outstanding_work() {
        let catalog = catalog();
        let mut ticket = CraftTicket::new(TicketId(1), plan(&catalog), &catalog, Instant::now());
        assert!(!ticket.is_terminal());
        ticket.recipe_start_index = 1;
        assert!(ticket.is_terminal());
    }
}
