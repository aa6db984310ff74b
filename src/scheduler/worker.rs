use super::{Task, WorkerGroup};
use crate::plan::scavenger::{Evacuator, ScavengeResult};
use crate::util::ObjectReference;
use crate::vm::VMBinding;
use crossbeam::deque::{Steal, Stealer, Worker};
use crossbeam::utils::Backoff;

/// A scavenging worker. Owns a local deque and an [`Evacuator`], and lives for one evacuation.
pub struct GCWorker<'g, 'a, VM: VMBinding> {
    pub ordinal: usize,
    group: &'g WorkerGroup<'a, VM>,
    local: Worker<Task<VM::VMSlot>>,
    stealers: &'g [Stealer<Task<VM::VMSlot>>],
    evacuator: Evacuator<'a, VM>,
    tasks_done: usize,
}

/// Marks the group as aborted if the worker unwinds.
struct AbortOnPanic<'g, 'a, VM: VMBinding>(&'g WorkerGroup<'a, VM>);

impl<VM: VMBinding> Drop for AbortOnPanic<'_, '_, VM> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort();
        }
    }
}

impl<'g, 'a, VM: VMBinding> GCWorker<'g, 'a, VM> {
    pub fn new(
        ordinal: usize,
        group: &'g WorkerGroup<'a, VM>,
        local: Worker<Task<VM::VMSlot>>,
        stealers: &'g [Stealer<Task<VM::VMSlot>>],
    ) -> Self {
        GCWorker {
            ordinal,
            group,
            local,
            stealers,
            evacuator: Evacuator::new(group.heap(), group.evacuation(), group.sizing()),
            tasks_done: 0,
        }
    }

    /// Local queue first, then the injector, then the other workers.
    fn find_task(&self) -> Option<Task<VM::VMSlot>> {
        self.local.pop().or_else(|| {
            std::iter::repeat_with(|| {
                self.group
                    .steal_batch_and_pop(&self.local)
                    .or_else(|| self.stealers.iter().map(Stealer::steal).collect::<Steal<_>>())
            })
            .find(|steal| !steal.is_retry())
            .and_then(Steal::success)
        })
    }

    fn do_task(&mut self, task: Task<VM::VMSlot>) {
        let group = self.group;
        let local = &self.local;
        let push_copy = |object: ObjectReference| group.add_local(local, Task::Object(object));
        match task {
            Task::Roots(slots) => {
                for slot in slots {
                    if let Some(object) = self.evacuator.process_slot(slot) {
                        push_copy(object);
                    }
                }
            }
            Task::Card { belt, index, range } => {
                if group.heap().belts().side_table().try_claim(index) {
                    self.evacuator.scan_card(belt, range, push_copy);
                }
            }
            Task::Object(object) => self.evacuator.scan_object(object, push_copy),
        }
    }

    pub fn run(mut self) -> ScavengeResult<VM::VMSlot> {
        let _abort_on_panic = AbortOnPanic(self.group);
        let backoff = Backoff::new();
        loop {
            if let Some(task) = self.find_task() {
                self.do_task(task);
                self.group.finish_task();
                self.tasks_done += 1;
                backoff.reset();
            } else if self.group.is_done() {
                break;
            } else {
                backoff.snooze();
            }
        }
        trace!("Worker {} finished {} tasks", self.ordinal, self.tasks_done);
        self.evacuator.into_result()
    }
}
