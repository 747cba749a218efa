//! A single-threaded event loop with a microtask queue and virtual-time
//! timers.
use crate::scheduler::{Schedule, Scheduler, Task};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

struct Timer {
    id: u64,
    fire_at: u64,
    task: Task,
}

struct LoopState {
    // Polled in order, drained fully before any timer fires
    microtasks: RefCell<VecDeque<Task>>,

    timers: RefCell<Vec<Timer>>,

    // Virtual time in milliseconds
    now: Cell<u64>,

    next_timer_id: Cell<u64>,
}

impl Schedule for LoopState {
    fn schedule(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
    }
}

impl LoopState {
    fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let mut lock = self.microtasks.borrow_mut();

            match lock.pop_front() {
                Some(task) => {
                    // The task might queue more tasks
                    drop(lock);
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    fn pop_next_timer(&self) -> Option<Timer> {
        let mut timers = self.timers.borrow_mut();
        let index = timers
            .iter()
            .enumerate()
            .min_by_key(|(_, timer)| (timer.fire_at, timer.id))
            .map(|(index, _)| index)?;
        Some(timers.remove(index))
    }
}

/// The deferred-execution facility promises are tested and driven with.
///
/// Nothing runs until the loop is driven with [`run_until_idle`] or
/// [`run`]. Timers use virtual time, so a delay of ten seconds costs
/// nothing.
///
/// # Examples
///
/// ```
/// use promise_aplus::{EventLoop, Promise, Resolution};
///
/// let event_loop = EventLoop::new();
/// let promise = Promise::<i32, promise_aplus::Error>::resolved(
///     &event_loop.scheduler(),
///     Resolution::Value(20),
/// );
/// let doubled = promise.then(|v| Ok(Resolution::Value(v * 2)));
/// assert!(doubled.is_pending());
///
/// event_loop.run_until_idle();
/// assert_eq!(doubled.value(), Some(40));
/// ```
///
/// [`run_until_idle`]: EventLoop::run_until_idle
/// [`run`]: EventLoop::run
#[derive(Clone)]
pub struct EventLoop {
    state: Rc<LoopState>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            state: Rc::new(LoopState {
                microtasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(Vec::new()),
                now: Cell::new(0),
                next_timer_id: Cell::new(0),
            }),
        }
    }

    /// A scheduler that queues onto this loop's microtask queue.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::from_rc(self.state.clone())
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.state.now.get()
    }

    /// Number of queued microtasks plus armed timers.
    pub fn pending_tasks(&self) -> usize {
        self.state.microtasks.borrow().len() + self.state.timers.borrow().len()
    }

    pub fn queue_microtask<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.state.schedule(Box::new(task));
    }

    /// Arms a timer firing `delay` virtual milliseconds from now. Timers with
    /// the same deadline fire in the order they were set.
    pub fn set_timeout<F>(&self, delay: u64, task: F)
    where
        F: FnOnce() + 'static,
    {
        let id = self.state.next_timer_id.get();
        self.state.next_timer_id.set(id + 1);
        self.state.timers.borrow_mut().push(Timer {
            id,
            fire_at: self.now() + delay,
            task: Box::new(task),
        });
    }

    /// Runs microtasks until the queue is empty, including the ones queued
    /// along the way. Timers are left alone. Returns how many tasks ran.
    pub fn run_until_idle(&self) -> usize {
        self.state.run_microtasks()
    }

    /// Runs until there is no work left at all, jumping virtual time forward
    /// to each timer's deadline. Returns how many tasks ran.
    pub fn run(&self) -> usize {
        let mut ran = self.state.run_microtasks();
        while let Some(timer) = self.state.pop_next_timer() {
            if timer.fire_at > self.now() {
                self.state.now.set(timer.fire_at);
            }
            (timer.task)();
            ran += 1 + self.state.run_microtasks();
        }
        ran
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now())
            .field("microtasks", &self.state.microtasks.borrow().len())
            .field("timers", &self.state.timers.borrow().len())
            .finish()
    }
}
