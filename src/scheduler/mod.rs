//! Parallel scavenging.
//!
//! The thread that requested the collection scans the roots and the dirty cards into a shared
//! injector queue, then a fixed group of [`GCWorker`]s drains it, stealing from each other.
//! The group is joined before the collector moves on, so no phase starts until every worker of
//! the previous one has finished. Each worker copies into its own GC buffer and fills the unused
//! end of it when the group is done.

mod worker;

pub use worker::GCWorker;

use crate::heap::Heap;
use crate::plan::scavenger::{Evacuation, ScavengeResult};
use crate::policy::BeltId;
use crate::util::alloc::BufferSizing;
use crate::util::{Address, ObjectReference};
use crate::vm::{RootsWorkFactory, Scanning, VMBinding};
use crossbeam::deque::{Injector, Stealer, Worker};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Root slots are handed out in batches of at most this many.
const ROOT_BATCH_SIZE: usize = 256;

/// A unit of evacuation work.
#[derive(Debug)]
pub enum Task<SL> {
    /// Forward the referents of root slots.
    Roots(Vec<SL>),
    /// Scan the slots of a dirty card, if no other worker has claimed it.
    Card {
        belt: BeltId,
        index: usize,
        range: Range<Address>,
    },
    /// Scan a freshly copied object.
    Object(ObjectReference),
}

/// State shared by the workers of one evacuation.
pub struct WorkerGroup<'a, VM: VMBinding> {
    heap: &'a Heap<VM>,
    evacuation: &'a Evacuation,
    sizing: &'a BufferSizing,
    injector: Injector<Task<VM::VMSlot>>,
    /// Tasks queued or running. The evacuation is complete when this drops to zero.
    pending: AtomicUsize,
    /// Set when a worker panics, so the others stop instead of waiting for its tasks.
    aborted: AtomicBool,
}

impl<'a, VM: VMBinding> WorkerGroup<'a, VM> {
    pub fn new(heap: &'a Heap<VM>, evacuation: &'a Evacuation, sizing: &'a BufferSizing) -> Self {
        WorkerGroup {
            heap,
            evacuation,
            sizing,
            injector: Injector::new(),
            pending: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
        }
    }

    pub fn heap(&self) -> &'a Heap<VM> {
        self.heap
    }

    pub fn evacuation(&self) -> &'a Evacuation {
        self.evacuation
    }

    pub fn sizing(&self) -> &'a BufferSizing {
        self.sizing
    }

    pub fn add(&self, task: Task<VM::VMSlot>) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.injector.push(task);
    }

    pub fn add_local(&self, local: &Worker<Task<VM::VMSlot>>, task: Task<VM::VMSlot>) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        local.push(task);
    }

    pub(crate) fn finish_task(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn is_done(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0 || self.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn steal_batch_and_pop(
        &self,
        dest: &Worker<Task<VM::VMSlot>>,
    ) -> crossbeam::deque::Steal<Task<VM::VMSlot>> {
        self.injector.steal_batch_and_pop(dest)
    }

    /// Queue root and card tasks, then run `threads` workers until every reachable donor object
    /// has been copied and scanned.
    pub fn run(self, threads: usize) -> ScavengeResult<VM::VMSlot> {
        VM::VMScanning::scan_roots(&mut RootsToTasks(&self));

        let belts = self.heap.belts();
        for (belt, range) in self.evacuation.cards.iter() {
            belts
                .card_region()
                .for_each_dirty_card(range.clone(), |index, card| {
                    self.add(Task::Card {
                        belt: *belt,
                        index,
                        range: card,
                    })
                });
        }
        debug!(
            "Starting {} scavenging workers with {} initial tasks",
            threads,
            self.pending.load(Ordering::SeqCst)
        );

        let workers: Vec<Worker<Task<VM::VMSlot>>> =
            (0..threads).map(|_| Worker::new_lifo()).collect();
        let stealers: Vec<Stealer<Task<VM::VMSlot>>> =
            workers.iter().map(Worker::stealer).collect();

        let group = &self;
        let stealers = &stealers;
        let outcomes = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = workers
                .into_iter()
                .enumerate()
                .map(|(ordinal, local)| {
                    s.spawn(move |_| GCWorker::new(ordinal, group, local, stealers).run())
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic));

        let mut result = ScavengeResult::default();
        for outcome in outcomes {
            match outcome {
                Ok(worker_result) => result.merge(worker_result),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        debug_assert_eq!(self.pending.load(Ordering::SeqCst), 0);
        result
    }
}

/// Turns each batch of root slots into [`Task::Roots`] packets.
struct RootsToTasks<'g, 'a, VM: VMBinding>(&'g WorkerGroup<'a, VM>);

impl<VM: VMBinding> RootsWorkFactory<VM::VMSlot> for RootsToTasks<'_, '_, VM> {
    fn create_process_roots_work(&mut self, slots: Vec<VM::VMSlot>) {
        for batch in slots.chunks(ROOT_BATCH_SIZE) {
            self.0.add(Task::Roots(batch.to_vec()));
        }
    }
}
