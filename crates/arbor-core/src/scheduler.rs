//! Deferred-work queues of the reconciler.
//!
//! Three queues, flushed at distinct points of a pass:
//! * component updates, deduplicated per instance and cancelable;
//! * pre jobs, flushed before a parent re-renders so child prop updates
//!   land first;
//! * post jobs, flushed after the tree is committed (mounted/updated
//!   hooks, ref bindings parked behind suspense).
//!
//! The scheduler is owned by its renderer and passed where needed; there
//! is no process-global queue.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::component::ComponentInstance;
use crate::error::{ErrorSink, ErrorSource, RenderError};
use crate::host::HostOps;

/// Job run before re-rendering, outside any host access.
pub type PreJob = Box<dyn FnOnce() -> Result<(), RenderError>>;

/// Job run after commit, with host access.
pub type PostJob = Box<dyn FnOnce(&mut dyn HostOps) -> Result<(), RenderError>>;

struct QueuedUpdate {
    uid: u64,
    instance: Weak<ComponentInstance>,
    /// Canceled entries stay in the queue but are skipped on flush. A
    /// re-queue after cancelation submits a fresh entry.
    canceled: Cell<bool>,
}

#[derive(Default)]
pub struct Scheduler {
    updates: RefCell<Vec<QueuedUpdate>>,
    pre_jobs: RefCell<Vec<PreJob>>,
    post_jobs: RefCell<Vec<PostJob>>,
}

impl Scheduler {
    pub fn new() -> Rc<Scheduler> {
        Rc::new(Scheduler::default())
    }

    /// Queues a re-render for `instance`. A live entry for the same
    /// instance absorbs the request.
    pub fn queue_update(&self, instance: &Rc<ComponentInstance>) {
        let uid = instance.uid;
        let mut updates = self.updates.borrow_mut();
        if updates
            .iter()
            .any(|entry| entry.uid == uid && !entry.canceled.get())
        {
            return;
        }
        updates.push(QueuedUpdate {
            uid,
            instance: Rc::downgrade(instance),
            canceled: Cell::new(false),
        });
    }

    /// Cancels any queued update for `uid`. Used when the parent is about
    /// to push new props into the child directly.
    pub fn invalidate(&self, uid: u64) {
        for entry in self.updates.borrow_mut().iter() {
            if entry.uid == uid {
                entry.canceled.set(true);
            }
        }
    }

    pub fn has_pending_updates(&self) -> bool {
        self.updates
            .borrow()
            .iter()
            .any(|entry| !entry.canceled.get())
    }

    /// Drains due updates in creation order, so parents render before
    /// their children.
    pub fn take_due(&self) -> Vec<Rc<ComponentInstance>> {
        let mut drained: Vec<QueuedUpdate> = self.updates.borrow_mut().drain(..).collect();
        drained.sort_by_key(|entry| entry.uid);
        drained
            .into_iter()
            .filter(|entry| !entry.canceled.get())
            .filter_map(|entry| entry.instance.upgrade())
            .filter(|instance| !instance.is_unmounted.get())
            .collect()
    }

    pub fn queue_pre(&self, job: PreJob) {
        self.pre_jobs.borrow_mut().push(job);
    }

    /// Runs pre jobs until none remain; jobs may enqueue further jobs.
    pub fn flush_pre(&self, sink: &ErrorSink) {
        loop {
            let jobs: Vec<PreJob> = self.pre_jobs.borrow_mut().drain(..).collect();
            if jobs.is_empty() {
                break;
            }
            for job in jobs {
                sink.guard(ErrorSource::SchedulerJob, job);
            }
        }
    }

    pub fn queue_post(&self, job: PostJob) {
        self.post_jobs.borrow_mut().push(job);
    }

    /// Runs post jobs until none remain; jobs may enqueue further jobs.
    pub fn flush_post(&self, host: &mut dyn HostOps, sink: &ErrorSink) {
        loop {
            let jobs: Vec<PostJob> = self.post_jobs.borrow_mut().drain(..).collect();
            if jobs.is_empty() {
                break;
            }
            for job in jobs {
                sink.guard(ErrorSource::SchedulerJob, || job(host));
            }
        }
    }
}
