//! The deferred-execution facility promises run their continuations on.
//!
//! A promise never runs a continuation inline. Everything goes through a
//! [`Schedule`] implementation, which only has to queue the task and return.
//! [`EventLoop`](crate::EventLoop) is the implementation this crate ships;
//! hosts with their own microtask queue implement the trait themselves.
use std::fmt;
use std::rc::Rc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Queues tasks to run on a later turn.
///
/// Tasks scheduled from the same turn must run in the order they were
/// scheduled, and `schedule` must not run `task` before returning.
pub trait Schedule {
    fn schedule(&self, task: Task);
}

/// Shared handle to a [`Schedule`] implementation.
///
/// Every promise carries one and hands it down to the promises derived
/// from it.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<dyn Schedule>,
}

impl Scheduler {
    pub fn new<S: Schedule + 'static>(schedule: S) -> Self {
        Self {
            inner: Rc::new(schedule),
        }
    }

    pub fn from_rc(inner: Rc<dyn Schedule>) -> Self {
        Self { inner }
    }

    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.inner.schedule(Box::new(task))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Schedule, Scheduler, Task};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder {
        tasks: Rc<RefCell<Vec<Task>>>,
    }

    impl Schedule for Recorder {
        fn schedule(&self, task: Task) {
            self.tasks.borrow_mut().push(task);
        }
    }

    #[test]
    fn test_schedule_defers_the_task() {
        let recorder = Recorder::default();
        let scheduler = Scheduler::new(recorder.clone());
        let ran = Rc::new(RefCell::new(Vec::new()));

        for n in 0..3 {
            let ran = ran.clone();
            scheduler.schedule(move || ran.borrow_mut().push(n));
        }
        assert!(ran.borrow().is_empty());

        let tasks: Vec<Task> = recorder.tasks.borrow_mut().drain(..).collect();
        for task in tasks {
            task();
        }
        assert_eq!(*ran.borrow(), vec![0, 1, 2]);
    }
}
