//! Packet handling and the per-tick dispatcher drive for the Crafting
//! Server. Mirrors `storage-server::server::Server`'s shape — one
//! state object, `handle` turning one inbound [`Message`] into zero or
//! more addressed outbound ones — generalized with a `tick_all` pass
//! that drives [`fabric_crafting::dispatcher::tick`] over every active
//! ticket, since this server's work isn't purely request/reply.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use rustc_hash::FxHashMap;

use fabric_crafting::dispatcher::{self, Bus};
use fabric_crafting::solver::{self, SolverPriority};
use fabric_crafting::{CraftTicket, StagingAllocator, TicketStatus, WorkerAddr, WorkerPool};
use fabric_protocol::{DroneOp, Message, RecipeListing, RecipeProgress};
use fabric_recipes::RecipeCatalog;
use fabric_storage::{DiffEntry, InventoryId, ItemKind};
use fabric_utils::{IdCounter, TaskId, TicketId};

/// Records everything one [`dispatcher::tick`] pass wants sent, since
/// [`Bus`] methods are synchronous but the actual transport is async.
/// `storage_peer` is fixed per server; worker addresses are recovered
/// from [`WorkerAddr`]'s opaque string by parsing it as a socket
/// address — this repo's only notion of "where a worker lives".
struct BusQueue {
    storage_peer: SocketAddr,
    outgoing: Vec<(SocketAddr, Message)>,
    dispatched: Vec<(WorkerAddr, TaskId)>,
    extract_requested: bool,
    flushed: Vec<InventoryId>,
}

impl BusQueue {
    fn new(storage_peer: SocketAddr) -> Self {
        Self { storage_peer, outgoing: Vec::new(), dispatched: Vec::new(), extract_requested: false, flushed: Vec::new() }
    }
}

impl Bus for BusQueue {
    fn dispatch_task(
        &mut self,
        worker: &WorkerAddr,
        ticket: TicketId,
        task: TaskId,
        staging: InventoryId,
        recipe: fabric_recipes::RecipeId,
        batches: u32,
    ) {
        if let Ok(addr) = worker.0.parse::<SocketAddr>() {
            self.outgoing.push((
                addr,
                Message::RobotPrepareCraft { ticket, task, staging_index: staging.index, recipe_index: recipe.0, batches },
            ));
            self.dispatched.push((worker.clone(), task));
        } else {
            tracing::warn!(worker = %worker.0, "worker address does not parse as a socket address");
        }
    }

    fn start_craft(&mut self, worker: &WorkerAddr, ticket: TicketId, task: TaskId) {
        if let Ok(addr) = worker.0.parse::<SocketAddr>() {
            self.outgoing.push((addr, Message::RobotStartCraft { ticket, task }));
        }
    }

    /// Asks storage to pull this ticket's still-outstanding reserved
    /// inputs into `staging`. The dispatcher's `Bus::request_extract`
    /// carries no item list (the per-recipe amounts already being
    /// deducted from `ticket.stored_items` at the call site aren't
    /// passed through the trait), so this sends an empty `extract`
    /// list with the ticket id set — the Storage Server is expected to
    /// look up the ticket's own reservation ledger rather than being
    /// told the amounts twice.
    fn request_extract(&mut self, ticket: TicketId, staging: InventoryId, supply_indices: &FxHashMap<InventoryId, bool>) {
        self.outgoing.push((
            self.storage_peer,
            Message::StorDroneExtract {
                drone_index: staging.index,
                ticket: Some(ticket),
                extract: Vec::new(),
                supply_indices: supply_indices.iter().map(|(inv, dirty)| (inv.index, *dirty)).collect(),
            },
        ));
        self.extract_requested = true;
    }

    fn flush_supply(&mut self, inv: InventoryId) {
        self.outgoing.push((self.storage_peer, Message::StorDroneInsert { drone_index: inv.index, ticket: None }));
        self.flushed.push(inv);
    }
}

pub struct Server {
    catalog: RecipeCatalog,
    workers: WorkerPool,
    staging: StagingAllocator,
    storage_peer: SocketAddr,

    tickets: FxHashMap<TicketId, CraftTicket>,
    ticket_counter: IdCounter,

    /// Storage's last-known per-kind availability, mirrored from
    /// `stor_item_list`/`stor_item_diff`/`stor_drone_item_diff`
    /// broadcasts this server listens to passively on the bus.
    item_totals: FxHashMap<ItemKind, u32>,

    /// Worker -> (ticket, task) it is currently busy with, so an
    /// incoming `robot_error` (which carries no ticket of its own,
    /// per spec §6's packet table) can still be attributed to a
    /// ticket by looking up the sender's address.
    busy_worker_ticket: FxHashMap<WorkerAddr, (TicketId, TaskId)>,

    /// FIFO of tickets with an extract request outstanding. Neither
    /// `stor_drone_extract` nor its `stor_drone_item_diff` reply
    /// carries a correlation id, so completions are matched to
    /// requests in the order they were issued — correct as long as at
    /// most one extract is in flight per ticket, which the dispatcher
    /// already enforces via `extract_in_flight_since`.
    extract_order: VecDeque<TicketId>,
    extract_completed: FxHashMap<TicketId, bool>,

    /// FIFO of (ticket, staging inventory) flushes requested via
    /// `flush_supply`, resolved on the matching `stor_drone_item_diff`
    /// (op=insert) so `supply_indices` can finally be cleared — the
    /// dispatcher's own step 4 only issues the flush, it never removes
    /// the entry, since it has no notion of the flush completing.
    flush_order: VecDeque<(TicketId, InventoryId)>,

    /// Most recent address that spoke to this server as "the
    /// interface" (any `craft_*` request). Used to target
    /// `craft_recipe_error` notifications raised outside a direct
    /// request/reply, e.g. on `robot_error`. Out-of-scope per spec §1
    /// is a real multi-subscriber bus; this is the single-peer
    /// stand-in, tracked dynamically since the interface has no fixed
    /// configured address here the way the storage peer does.
    last_interface: Option<SocketAddr>,
}

impl Server {
    #[must_use]
    pub fn new(catalog: RecipeCatalog, workers: WorkerPool, drones: Vec<InventoryId>, storage_peer: SocketAddr) -> Self {
        Self {
            catalog,
            workers,
            staging: StagingAllocator::new(drones),
            storage_peer,
            tickets: FxHashMap::default(),
            ticket_counter: IdCounter::new(),
            item_totals: FxHashMap::default(),
            busy_worker_ticket: FxHashMap::default(),
            extract_order: VecDeque::new(),
            extract_completed: FxHashMap::default(),
            flush_order: VecDeque::new(),
            last_interface: None,
        }
    }

    fn recipe_snapshot(&self) -> Vec<RecipeListing> {
        self.catalog
            .recipes()
            .iter()
            .map(|r| {
                let out = r.primary_output();
                RecipeListing { kind: out.kind.clone(), max_stack_size: out.max_stack, label: out.label.clone() }
            })
            .collect()
    }

    fn progress_for(&self, plan: &solver::Plan) -> Vec<RecipeProgress> {
        let mut kinds: Vec<ItemKind> = plan.net_input.keys().chain(plan.net_output.keys()).cloned().collect();
        kinds.sort_by_key(ItemKind::canonical_key);
        kinds.dedup();
        kinds
            .into_iter()
            .map(|kind| RecipeProgress {
                required: plan.net_input.get(&kind).copied().unwrap_or(0),
                produced: plan.net_output.get(&kind).copied().unwrap_or(0),
                have: self.item_totals.get(&kind).copied().unwrap_or(0),
                kind,
            })
            .collect()
    }

    fn cancel_ticket(&mut self, id: TicketId) -> Option<CraftTicket> {
        let ticket = self.tickets.remove(&id)?;
        for task in ticket.crafting_tasks.values() {
            for worker in &task.workers {
                self.workers.release(worker);
            }
        }
        self.busy_worker_ticket.retain(|_, (t, _)| *t != id);
        self.staging.release_all_for(id);
        Some(ticket)
    }

    /// Dispatches one inbound frame, returning addressed outbound
    /// frames (worker-directed sends parse the worker's opaque address
    /// as a socket address; everything else targets `from` or the
    /// configured storage peer).
    #[tracing::instrument(level = "debug", skip(self, msg))]
    pub fn handle(&mut self, msg: Message, from: SocketAddr) -> Vec<(SocketAddr, Message)> {
        match msg {
            Message::CraftDiscover => {
                self.last_interface = Some(from);
                vec![(from, Message::CraftStarted), (from, Message::CraftRecipeList(self.recipe_snapshot()))]
            }
            Message::CraftCheckRecipe { kind, amount } => {
                self.last_interface = Some(from);
                let (status, plan) = solver::solve(&self.catalog, &self.item_totals, &kind, amount, SolverPriority::default());
                let progress = self.progress_for(&plan);
                let ticket = match status {
                    solver::SolveStatus::Ok => {
                        let id = TicketId(self.ticket_counter.next());
                        let ticket = CraftTicket::new(id, plan, &self.catalog, Instant::now());
                        self.tickets.insert(id, ticket);
                        Some(id)
                    }
                    solver::SolveStatus::Missing | solver::SolveStatus::Error => None,
                };
                vec![(from, Message::CraftRecipeConfirm { ticket, progress })]
            }
            Message::CraftRecipeStart { ticket: id } => {
                self.last_interface = Some(from);
                let Some(ticket) = self.tickets.get_mut(&id) else {
                    return vec![(from, Message::CraftRecipeError { stage: "start".into(), message: format!("unknown ticket {id}") })];
                };
                if ticket.status != TicketStatus::Pending {
                    return vec![(from, Message::CraftRecipeError { stage: "start".into(), message: format!("{id} is not pending") })];
                }
                ticket.activate();
                let required_items = ticket.required_items.iter().map(|(k, n)| (k.clone(), *n)).collect();
                vec![
                    (self.storage_peer, Message::StorRecipeReserve { ticket: id, required_items }),
                    (from, Message::CraftStarted),
                ]
            }
            Message::CraftRecipeCancel { ticket: id } => {
                self.last_interface = Some(from);
                if self.cancel_ticket(id).is_some() {
                    vec![(self.storage_peer, Message::StorRecipeCancel { ticket: id })]
                } else {
                    Vec::new()
                }
            }
            Message::RobotFinishedCraft { ticket: id, task } => self.handle_worker_finished(id, task, from),
            Message::RobotError { kind, message } => self.handle_worker_error(&kind, &message, from),

            Message::StorItemList(items) => {
                self.item_totals = items.into_iter().map(|i| (i.kind, i.available)).collect();
                Vec::new()
            }
            Message::StorItemDiff(diff) => {
                self.apply_diff(&diff);
                Vec::new()
            }
            Message::StorDroneItemDiff { op, diff, .. } => {
                self.apply_diff(&diff);
                match op {
                    DroneOp::Extract => {
                        if let Some(id) = self.extract_order.pop_front() {
                            self.extract_completed.insert(id, true);
                        }
                    }
                    DroneOp::Insert => {
                        if let Some((id, inv)) = self.flush_order.pop_front() {
                            if let Some(ticket) = self.tickets.get_mut(&id) {
                                ticket.supply_indices.remove(&inv);
                            }
                        }
                    }
                }
                Vec::new()
            }
            Message::StorStarted => {
                tracing::info!("storage server is up");
                Vec::new()
            }
            other => {
                tracing::warn!(?other, "crafting server has no handler for this message");
                Vec::new()
            }
        }
    }

    fn apply_diff(&mut self, diff: &[DiffEntry]) {
        for entry in diff {
            match entry {
                DiffEntry::Updated { kind, available, .. } => {
                    self.item_totals.insert(kind.clone(), *available);
                }
                DiffEntry::Removed { kind } => {
                    self.item_totals.remove(kind);
                }
            }
        }
    }

    fn handle_worker_finished(&mut self, id: TicketId, task_id: TaskId, from: SocketAddr) -> Vec<(SocketAddr, Message)> {
        let addr = WorkerAddr(from.to_string());
        self.workers.release(&addr);
        self.busy_worker_ticket.remove(&addr);

        let Some(ticket) = self.tickets.get_mut(&id) else { return Vec::new() };
        let Some(task) = ticket.crafting_tasks.get_mut(&task_id) else { return Vec::new() };
        task.workers.retain(|w| *w != addr);
        if !task.workers.is_empty() {
            return Vec::new();
        }

        let staging = task.staging;
        let batches = task.batches;
        let recipe_id = task.recipe;
        ticket.crafting_tasks.remove(&task_id);

        if let Some(recipe) = self.catalog.recipe(recipe_id) {
            let now = Instant::now();
            for output in &recipe.outputs {
                ticket.record_output(output.kind.clone(), output.count * batches, now);
            }
        }
        self.staging.mark_input(staging, id);
        ticket.supply_indices.insert(staging, true);
        Vec::new()
    }

    fn handle_worker_error(&mut self, kind: &str, message: &str, from: SocketAddr) -> Vec<(SocketAddr, Message)> {
        let addr = WorkerAddr(from.to_string());
        let Some((ticket_id, _)) = self.busy_worker_ticket.remove(&addr) else {
            tracing::warn!(worker = %from, kind, message, "robot_error from a worker with no tracked ticket");
            return Vec::new();
        };
        self.cancel_ticket(ticket_id);
        let notify = self.last_interface.unwrap_or(self.storage_peer);
        vec![
            (self.storage_peer, Message::StorRecipeCancel { ticket: ticket_id }),
            (notify, Message::CraftRecipeError { stage: kind.to_string(), message: message.to_string() }),
        ]
    }

    /// Expires stale pending tickets and drives the dispatcher over
    /// every active ticket once.
    pub fn tick_all(&mut self, now: Instant) -> Vec<(SocketAddr, Message)> {
        self.tickets.retain(|_, t| !t.is_pending_expired(now));

        let active: Vec<TicketId> = self.tickets.iter().filter(|(_, t)| t.status == TicketStatus::Active).map(|(id, _)| *id).collect();

        let mut out = Vec::new();
        let mut finished = Vec::new();
        for id in active {
            let extract_just_completed = self.extract_completed.remove(&id).unwrap_or(false);
            let mut bus = BusQueue::new(self.storage_peer);
            let Some(ticket) = self.tickets.get_mut(&id) else { continue };
            dispatcher::tick(ticket, &self.catalog, &mut self.workers, &mut self.staging, &mut bus, extract_just_completed, now);
            let is_terminal = ticket.is_terminal();

            for (worker, task) in bus.dispatched.drain(..) {
                self.busy_worker_ticket.insert(worker, (id, task));
            }
            if bus.extract_requested {
                self.extract_order.push_back(id);
            }
            for inv in bus.flushed.drain(..) {
                self.flush_order.push_back((id, inv));
            }
            out.extend(bus.outgoing.drain(..));

            if is_terminal {
                finished.push(id);
            }
        }

        for id in finished {
            self.tickets.remove(&id);
            tracing::info!(%id, "ticket completed");
        }

        out
    }
}
