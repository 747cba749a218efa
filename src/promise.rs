use crate::resolve::{resolve_promise, Resolution, Resolver};
use crate::scheduler::Scheduler;
use crate::Error;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

type Reaction<A> = Box<dyn FnOnce(A) + 'static>;

enum State<T, E> {
    Pending {
        on_fulfilled: Vec<Reaction<T>>,
        on_rejected: Vec<Reaction<E>>,
    },
    Fulfilled(T),
    Rejected(E),
}

/// Where a promise is in its life. Leaves `Pending` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

struct Inner<T, E> {
    state: RefCell<State<T, E>>,
    scheduler: Scheduler,
}

/// A write-once cell for a value of type `T` or a rejection reason of type
/// `E`, observed through continuations.
///
/// Continuations never run in the turn they are attached in. They are handed
/// to the promise's [`Scheduler`] once the promise has settled, in the order
/// they were attached.
///
/// # Examples
///
/// ```
/// use promise_aplus::{EventLoop, Promise, Resolution};
///
/// let event_loop = EventLoop::new();
/// let promise: Promise<&str, promise_aplus::Error> =
///     Promise::new(&event_loop.scheduler(), |resolver| {
///         resolver.resolve(Resolution::Value("🍓"));
///         Ok(())
///     });
/// let length = promise.then(|s| Ok(Resolution::Value(s.len())));
///
/// event_loop.run_until_idle();
/// assert_eq!(length.value(), Some(4));
/// ```
pub struct Promise<T, E> {
    inner: Rc<Inner<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Promise<T, E> {
    pub(crate) fn pending(scheduler: Scheduler) -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(State::Pending {
                    on_fulfilled: Vec::new(),
                    on_rejected: Vec::new(),
                }),
                scheduler,
            }),
        }
    }

    pub fn state(&self) -> PromiseState {
        match *self.inner.state.borrow() {
            State::Pending { .. } => PromiseState::Pending,
            State::Fulfilled(_) => PromiseState::Fulfilled,
            State::Rejected(_) => PromiseState::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Whether both handles point at the same promise.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// The fulfillment value, once there is one.
    pub fn value(&self) -> Option<T> {
        match &*self.inner.state.borrow() {
            State::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The rejection reason, once there is one.
    pub fn reason(&self) -> Option<E> {
        match &*self.inner.state.borrow() {
            State::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    fn outcome(&self) -> Option<Result<T, E>> {
        match &*self.inner.state.borrow() {
            State::Pending { .. } => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Settles with `value` and schedules the queued fulfillment reactions.
    /// No-op unless pending.
    pub(crate) fn fulfill(&self, value: T) {
        let stored = value.clone();
        let reactions = {
            let mut state = self.inner.state.borrow_mut();
            if !matches!(*state, State::Pending { .. }) {
                return;
            }
            match std::mem::replace(&mut *state, State::Fulfilled(stored)) {
                State::Pending { on_fulfilled, .. } => on_fulfilled,
                _ => return,
            }
        };
        for reaction in reactions {
            let value = value.clone();
            self.inner.scheduler.schedule(move || reaction(value));
        }
    }

    /// Settles with `reason` and schedules the queued rejection reactions.
    /// No-op unless pending.
    pub(crate) fn reject(&self, reason: E) {
        let stored = reason.clone();
        let reactions = {
            let mut state = self.inner.state.borrow_mut();
            if !matches!(*state, State::Pending { .. }) {
                return;
            }
            match std::mem::replace(&mut *state, State::Rejected(stored)) {
                State::Pending { on_rejected, .. } => on_rejected,
                _ => return,
            }
        };
        for reaction in reactions {
            let reason = reason.clone();
            self.inner.scheduler.schedule(move || reaction(reason));
        }
    }

    /// Registers one reaction per branch. Whichever branch matches the
    /// settlement runs on a later turn; the other is dropped.
    pub(crate) fn react<F, R>(&self, on_fulfilled: F, on_rejected: R)
    where
        F: FnOnce(T) + 'static,
        R: FnOnce(E) + 'static,
    {
        {
            let mut state = self.inner.state.borrow_mut();
            if let State::Pending {
                on_fulfilled: fulfilled_queue,
                on_rejected: rejected_queue,
            } = &mut *state
            {
                fulfilled_queue.push(Box::new(on_fulfilled));
                rejected_queue.push(Box::new(on_rejected));
                return;
            }
        }
        // Values are cloned under a shared borrow only
        match self.outcome() {
            Some(Ok(value)) => self.inner.scheduler.schedule(move || on_fulfilled(value)),
            Some(Err(reason)) => self.inner.scheduler.schedule(move || on_rejected(reason)),
            None => {}
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Creates a promise and runs `producer` on it right away.
    ///
    /// An `Err` returned by the producer rejects the promise, unless the
    /// producer already used its resolver.
    pub fn new<P>(scheduler: &Scheduler, producer: P) -> Self
    where
        P: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let promise = Self::pending(scheduler.clone());
        let resolver = Resolver::new(promise.clone());
        if let Err(reason) = producer(resolver.clone()) {
            resolver.reject(reason);
        }
        promise
    }

    /// A promise resolved with `resolution`. A promise is returned as is.
    pub fn resolved(scheduler: &Scheduler, resolution: Resolution<T, E>) -> Self {
        match resolution {
            Resolution::Promise(promise) => promise,
            resolution => {
                let promise = Self::pending(scheduler.clone());
                resolve_promise(&promise, resolution);
                promise
            }
        }
    }

    pub fn rejected(scheduler: &Scheduler, reason: E) -> Self {
        let promise = Self::pending(scheduler.clone());
        promise.reject(reason);
        promise
    }

    /// Settles a derived promise with what its continuation returned.
    fn complete(&self, outcome: Result<Resolution<T, E>, E>) {
        match outcome {
            Ok(resolution) => resolve_promise(self, resolution),
            Err(reason) => self.reject(reason),
        }
    }

    /// Attaches both continuations and returns the promise they settle.
    ///
    /// An `Ok` from the continuation that runs resolves the returned promise
    /// (following promises and thenables), an `Err` rejects it.
    pub fn then_with<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
        R: FnOnce(E) -> Result<Resolution<U, E>, E> + 'static,
    {
        let derived = Promise::pending(self.inner.scheduler.clone());
        let (fulfilled, rejected) = (derived.clone(), derived.clone());
        self.react(
            move |value| fulfilled.complete(on_fulfilled(value)),
            move |reason| rejected.complete(on_rejected(reason)),
        );
        derived
    }

    /// Like [`then_with`](Promise::then_with), passing rejections through
    /// unchanged.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
    {
        self.then_with(on_fulfilled, Err)
    }

    /// Like [`then_with`](Promise::then_with), passing values through
    /// unchanged.
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T, E>
    where
        R: FnOnce(E) -> Result<Resolution<T, E>, E> + 'static,
    {
        self.then_with(|value| Ok(Resolution::Value(value)), on_rejected)
    }

    /// Runs `on_finally` whichever way this promise settles and passes the
    /// outcome through, unless `on_finally` fails; then its reason wins.
    pub fn finally<F>(&self, on_finally: F) -> Promise<T, E>
    where
        F: FnOnce() -> Result<(), E> + 'static,
    {
        let on_finally = Rc::new(Cell::new(Some(on_finally)));
        let on_reject = on_finally.clone();
        self.then_with(
            move |value| {
                run_once(&*on_finally)?;
                Ok(Resolution::Value(value))
            },
            move |reason| {
                run_once(&*on_reject)?;
                Err(reason)
            },
        )
    }
}

fn run_once<F, E>(cell: &Cell<Option<F>>) -> Result<(), E>
where
    F: FnOnce() -> Result<(), E>,
{
    match cell.take() {
        Some(on_finally) => on_finally(),
        None => Ok(()),
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish()
    }
}

/// A promise together with the capability to settle it from outside.
///
/// # Examples
///
/// ```
/// use promise_aplus::{Deferred, EventLoop, Resolution};
///
/// let event_loop = EventLoop::new();
/// let deferred = Deferred::<String, promise_aplus::Error>::new(&event_loop.scheduler());
/// let greeting = deferred.promise().then(|s| Ok(Resolution::Value(format!("{s}!"))));
///
/// deferred.resolve(Resolution::Value("Hi".into()));
/// event_loop.run_until_idle();
/// assert_eq!(greeting.value().as_deref(), Some("Hi!"));
/// ```
pub struct Deferred<T, E> {
    promise: Promise<T, E>,
    resolver: Resolver<T, E>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    pub fn new(scheduler: &Scheduler) -> Self {
        let promise = Promise::pending(scheduler.clone());
        let resolver = Resolver::new(promise.clone());
        Self { promise, resolver }
    }

    pub fn promise(&self) -> &Promise<T, E> {
        &self.promise
    }

    pub fn resolver(&self) -> &Resolver<T, E> {
        &self.resolver
    }

    pub fn resolve(&self, resolution: Resolution<T, E>) {
        self.resolver.resolve(resolution)
    }

    pub fn reject(&self, reason: E) {
        self.resolver.reject(reason)
    }

    pub fn into_parts(self) -> (Promise<T, E>, Resolver<T, E>) {
        (self.promise, self.resolver)
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("promise", &self.promise)
            .finish_non_exhaustive()
    }
}

/// Awaits a promise from async Rust.
///
/// Only completes if whatever drives the promise's scheduler keeps running.
pub struct Waiter<T, E> {
    promise: Promise<T, E>,
    waker: Option<Rc<RefCell<Option<Waker>>>>,
}

fn wake(slot: &RefCell<Option<Waker>>) {
    if let Some(waker) = slot.borrow_mut().take() {
        waker.wake()
    }
}

impl<T, E> Future for Waiter<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.promise.outcome() {
            return Poll::Ready(outcome);
        }
        match &this.waker {
            Some(slot) => *slot.borrow_mut() = Some(cx.waker().clone()),
            None => {
                let slot = Rc::new(RefCell::new(Some(cx.waker().clone())));
                let (fulfilled, rejected) = (slot.clone(), slot.clone());
                this.promise
                    .react(move |_| wake(&fulfilled), move |_| wake(&rejected));
                this.waker = Some(slot);
            }
        }
        Poll::Pending
    }
}

impl<T, E> IntoFuture for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = Waiter<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Waiter {
            promise: self,
            waker: None,
        }
    }
}
