//! `Dispatcher::tick` (spec §4.8): the four numbered steps that
//! advance one active ticket by one pass. Everything the dispatcher
//! sends across the radio bus — worker task setup, `start_craft`,
//! storage extract/flush requests — goes through the [`Bus`] seam
//! rather than a concrete transport, since the transport itself lives
//! in `fabric-protocol` and the owning server binary.

use std::time::Instant;

use rustc_hash::FxHashMap;

use fabric_recipes::{RecipeCatalog, RecipeId, RecipeInputs};
use fabric_storage::InventoryId;
use fabric_utils::{TaskId, TicketId};

use crate::staging::{StagingAllocator, StagingUsage};
use crate::ticket::{CraftTicket, CraftingTask};
use crate::worker_pool::{WorkerAddr, WorkerPool};

/// The Crafting Server's coordination boundary with workers and with
/// the Storage Server (spec §1 "its coordination protocol with the
/// storage engine").
pub trait Bus {
    /// Hands a worker a task's parameters without yet telling it to
    /// start (spec §4.8 step 2 "dispatch the task"). The worker is
    /// marked `pending` until the matching storage extract completes.
    fn dispatch_task(&mut self, worker: &WorkerAddr, ticket: TicketId, task: TaskId, staging: InventoryId, recipe: RecipeId, batches: u32);

    /// Tells a `pending` worker to begin (spec §4.8 step 1, on extract
    /// completion).
    fn start_craft(&mut self, worker: &WorkerAddr, ticket: TicketId, task: TaskId);

    /// Requests storage move the ticket's currently-needed inputs into
    /// `staging` (spec §4.8 step 2 "Ask storage to extract...").
    fn request_extract(&mut self, ticket: TicketId, staging: InventoryId, supply_indices: &FxHashMap<InventoryId, bool>);

    /// Spec §4.8 step 4: flushes one supply staging inventory back to
    /// storage so it can be released.
    fn flush_supply(&mut self, inv: InventoryId);
}

fn needs_workers(recipe_inputs: &RecipeInputs) -> bool {
    matches!(recipe_inputs, RecipeInputs::Craft(_))
}

/// Runs one dispatcher pass over `ticket`. `extract_just_completed`
/// reports whether the extract request recorded in
/// `ticket.extract_in_flight_since` has finished since the last tick.
#[tracing::instrument(level = "trace", skip(ticket, catalog, workers, staging, bus))]
pub fn tick(
    ticket: &mut CraftTicket,
    catalog: &RecipeCatalog,
    workers: &mut WorkerPool,
    staging: &mut StagingAllocator,
    bus: &mut impl Bus,
    extract_just_completed: bool,
    now: Instant,
) {
    // Step 1.
    if ticket.extract_in_flight_since.is_some() {
        if !extract_just_completed {
            return;
        }
        ticket.extract_in_flight_since = None;
        for (worker, task) in ticket.pending_workers.drain(..) {
            bus.start_craft(&worker, ticket.id, task);
            workers.mark_busy(&worker);
        }
    }

    // Step 2.
    for idx in ticket.recipe_start_index..ticket.plan.recipes.len() {
        if ticket.batches_remaining[idx] == 0 {
            continue;
        }
        if ticket.recipe_status[idx].dirty {
            ticket.refresh_recipe_status(idx, catalog);
        }
        if ticket.recipe_status[idx].available_batches == 0 {
            continue;
        }

        let recipe_id = ticket.plan.recipes[idx];
        let recipe = catalog.recipe(recipe_id).expect("plan only holds catalog recipe ids");
        let craft_recipe = needs_workers(&recipe.inputs);

        let Some(staging_inv) = staging.allocate(ticket.id, StagingUsage::Output, craft_recipe, |inv| bus.flush_supply(inv)) else {
            continue;
        };

        let candidate_workers = workers.free_workers_adjacent_to(staging_inv);
        if candidate_workers.is_empty() {
            staging.release(staging_inv);
            continue;
        }

        let to_assign = ticket.recipe_status[idx].available_batches.min(ticket.batches_remaining[idx]);
        if to_assign == 0 {
            staging.release(staging_inv);
            continue;
        }

        let n_workers = candidate_workers.len() as u32;
        let base_share = to_assign / n_workers;
        let mut remainder = to_assign % n_workers;
        let mut assigned_total = 0u32;

        for worker in &candidate_workers {
            let share = if remainder > 0 {
                remainder -= 1;
                base_share + 1
            } else {
                base_share
            };
            if share == 0 {
                continue;
            }
            let task_id = ticket.next_task_id();
            bus.dispatch_task(worker, ticket.id, task_id, staging_inv, recipe_id, share);
            workers.reserve(worker);
            ticket.pending_workers.push((worker.clone(), task_id));
            ticket.crafting_tasks.insert(
                task_id,
                CraftingTask {
                    staging: staging_inv,
                    batches: share,
                    recipe: recipe_id,
                    workers: vec![worker.clone()],
                },
            );
            assigned_total += share;
        }

        ticket.batches_remaining[idx] -= assigned_total;
        ticket.recipe_status[idx].available_batches -= assigned_total;

        for (kind, per_batch) in recipe.inputs.net_inputs() {
            ticket.deduct_stored(&kind, per_batch * assigned_total);
        }

        bus.request_extract(ticket.id, staging_inv, &ticket.supply_indices);
        ticket.extract_in_flight_since = Some(now);
        for dirty in ticket.supply_indices.values_mut() {
            *dirty = false;
        }
        // At most one storage extract in flight at a time (spec §4.8);
        // later plan entries wait for the next tick.
        break;
    }

    // Step 3.
    let remaining = ticket.batches_remaining.clone();
    ticket.advance_cursor_if_exhausted(|i| remaining[i] == 0);

    // Step 4.
    if ticket.is_terminal() {
        return;
    }
    if let Some((&inv, _)) = ticket.supply_indices.iter().next() {
        bus.flush_supply(inv);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Plan;
    use fabric_recipes::RecipeCatalog;
    use fabric_storage::{InventoryRole, ItemKind};

    struct RecordingBus {
        dispatched: Vec<(WorkerAddr, TaskId)>,
        started: Vec<(WorkerAddr, TaskId)>,
        extract_requests: Vec<InventoryId>,
        flushes: Vec<InventoryId>,
    }

    impl RecordingBus {
        fn new() -> Self {
            Self { dispatched: Vec::new(), started: Vec::new(), extract_requests: Vec::new(), flushes: Vec::new() }
        }
    }

    impl Bus for RecordingBus {
        fn dispatch_task(&mut self, worker: &WorkerAddr, _ticket: TicketId, task: TaskId, _staging: InventoryId, _recipe: RecipeId, _batches: u32) {
            self.dispatched.push((worker.clone(), task));
        }
        fn start_craft(&mut self, worker: &WorkerAddr, _ticket: TicketId, task: TaskId) {
            self.started.push((worker.clone(), task));
        }
        fn request_extract(&mut self, _ticket: TicketId, staging: InventoryId, _supply_indices: &FxHashMap<InventoryId, bool>) {
            self.extract_requests.push(staging);
        }
        fn flush_supply(&mut self, inv: InventoryId) {
            self.flushes.push(inv);
        }
    }

    fn catalog() -> RecipeCatalog {
        let text = r#"
planks_station:
4 minecraft:planks#0 "Planks" 64
with
1 minecraft:log#0
"#;
        RecipeCatalog::load("recipes.cfg", text).unwrap()
    }

    fn inv(i: u32) -> InventoryId {
        InventoryId::new(InventoryRole::Drone, i)
    }

    fn plan(catalog: &RecipeCatalog) -> Plan {
        let recipe_id = catalog.recipes_for(&ItemKind::new("minecraft", "planks", 0, false, None))[0];
        Plan {
            recipes: vec![recipe_id],
            batches: vec![1],
            net_input: FxHashMap::default(),
            net_output: FxHashMap::default(),
        }
    }

    #[test]
    fn dispatches_to_a_free_adjacent_worker_and_requests_extract() {
        let catalog = catalog();
        let mut ticket = CraftTicket::new(TicketId(1), plan(&catalog), &catalog, Instant::now());
        ticket.activate();
        ticket.record_output(ItemKind::new("minecraft", "log", 0, false, None), 4, Instant::now());

        let mut workers = WorkerPool::new();
        workers.register(WorkerAddr("bot-1".into()), [inv(0)]);
        let mut staging = StagingAllocator::new(vec![inv(0)]);
        let mut bus = RecordingBus::new();

        dispatcher_tick(&mut ticket, &catalog, &mut workers, &mut staging, &mut bus);

        assert_eq!(bus.dispatched.len(), 1);
        assert_eq!(bus.extract_requests, vec![inv(0)]);
        assert_eq!(workers.state(&WorkerAddr("bot-1".into())), Some(crate::worker_pool::WorkerState::Pending));
        assert!(ticket.extract_in_flight_since.is_some());
    }

    #[test]
    fn extract_completion_starts_the_craft_and_frees_the_gate() {
        let catalog = catalog();
        let mut ticket = CraftTicket::new(TicketId(1), plan(&catalog), &catalog, Instant::now());
        ticket.activate();
        ticket.record_output(ItemKind::new("minecraft", "log", 0, false, None), 4, Instant::now());

        let mut workers = WorkerPool::new();
        workers.register(WorkerAddr("bot-1".into()), [inv(0)]);
        let mut staging = StagingAllocator::new(vec![inv(0)]);
        let mut bus = RecordingBus::new();

        dispatcher_tick(&mut ticket, &catalog, &mut workers, &mut staging, &mut bus);
        tick(&mut ticket, &catalog, &mut workers, &mut staging, &mut bus, true, Instant::now());

        assert_eq!(bus.started.len(), 1);
        assert_eq!(workers.state(&WorkerAddr("bot-1".into())), Some(crate::worker_pool::WorkerState::Busy));
        assert!(ticket.extract_in_flight_since.is_none());
    }

    fn dispatcher_tick(ticket: &mut CraftTicket, catalog: &RecipeCatalog, workers: &mut WorkerPool, staging: &mut StagingAllocator, bus: &mut RecordingBus) {
        tick(ticket, catalog, workers, staging, bus, false, Instant::now());
    }

    fn two_recipe_catalog() -> RecipeCatalog {
        let text = r#"
planks_station:
4 minecraft:planks#0 "Planks" 64
with
1 minecraft:log#0

stick_station:
4 minecraft:stick#0 "Stick" 64
with
2 minecraft:planks#0
"#;
        RecipeCatalog::load("recipes.cfg", text).unwrap()
    }

    #[test]
    fn only_one_extract_is_requested_per_tick() {
        let catalog = two_recipe_catalog();
        let planks_id = catalog.recipes_for(&ItemKind::new("minecraft", "planks", 0, false, None))[0];
        let stick_id = catalog.recipes_for(&ItemKind::new("minecraft", "stick", 0, false, None))[0];
        let plan = Plan {
            recipes: vec![planks_id, stick_id],
            batches: vec![1, 1],
            net_input: FxHashMap::default(),
            net_output: FxHashMap::default(),
        };
        let mut ticket = CraftTicket::new(TicketId(1), plan, &catalog, Instant::now());
        ticket.activate();
        // Both recipes have everything they need on hand, so step 2
        // would be able to dispatch both entries in the same pass if
        // nothing stopped it after the first.
        ticket.record_output(ItemKind::new("minecraft", "log", 0, false, None), 4, Instant::now());
        ticket.record_output(ItemKind::new("minecraft", "planks", 0, false, None), 8, Instant::now());

        // Two distinct, independently-free workers so that without the
        // fix both plan entries would find a worker and both would
        // reach `request_extract` in this same tick.
        let mut workers = WorkerPool::new();
        workers.register(WorkerAddr("bot-1".into()), [inv(0)]);
        workers.register(WorkerAddr("bot-2".into()), [inv(1)]);
        let mut staging = StagingAllocator::new(vec![inv(0), inv(1)]);
        let mut bus = RecordingBus::new();

        dispatcher_tick(&mut ticket, &catalog, &mut workers, &mut staging, &mut bus);

        assert_eq!(bus.extract_requests.len(), 1);
        assert!(ticket.extract_in_flight_since.is_some());
    }
}
