//! The resolution procedure: turning whatever a continuation produced into
//! the outcome of a promise.
use crate::promise::Promise;
use crate::Error;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Something other than a [`Promise`] that can report an outcome later.
///
/// This is how promises from other implementations take part in chaining.
/// `subscribe` hands the outcome to `resolver`, now or on a later turn.
/// Only the first call on `resolver` counts, so an implementation that
/// reports twice, or fails after reporting, cannot corrupt the promise
/// waiting on it. Returning `Err` rejects with that reason unless the
/// resolver was already used.
pub trait Thenable<T, E> {
    fn subscribe(&self, resolver: Resolver<T, E>) -> Result<(), E>;
}

/// What a promise can be resolved with.
pub enum Resolution<T, E> {
    /// A plain value. Fulfills right away.
    Value(T),
    /// Another promise of this crate. Adopts its outcome.
    Promise(Promise<T, E>),
    /// A foreign future. Subscribed to on a later turn.
    Thenable(Rc<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    pub fn thenable<Th>(thenable: Th) -> Self
    where
        Th: Thenable<T, E> + 'static,
    {
        Resolution::Thenable(Rc::new(thenable))
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// The capability to settle one promise, usable once.
///
/// Clones share the same latch: whichever clone is called first decides,
/// every later call is ignored.
pub struct Resolver<T, E> {
    promise: Promise<T, E>,
    latch: Rc<Cell<bool>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            latch: self.latch.clone(),
        }
    }
}

impl<T, E> Resolver<T, E> {
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Self {
            promise,
            latch: Rc::new(Cell::new(false)),
        }
    }

    /// Whether this resolver (or a clone of it) has been used.
    pub fn is_spent(&self) -> bool {
        self.latch.get()
    }

    fn claim(&self) -> bool {
        !self.latch.replace(true)
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    pub fn resolve(&self, resolution: Resolution<T, E>) {
        if self.claim() {
            resolve_promise(&self.promise, resolution);
        }
    }

    pub fn reject(&self, reason: E) {
        if self.claim() {
            self.promise.reject(reason);
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.promise)
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Feeds `resolution` into `promise`.
///
/// A promise resolved with itself is rejected with
/// [`Error::ChainingCycle`]. Promises and thenables are followed until a
/// plain value or a rejection comes out.
pub(crate) fn resolve_promise<T, E>(promise: &Promise<T, E>, resolution: Resolution<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    match resolution {
        Resolution::Value(value) => promise.fulfill(value),
        Resolution::Promise(inner) if inner.ptr_eq(promise) => {
            promise.reject(Error::ChainingCycle.into())
        }
        Resolution::Promise(inner) => {
            let (fulfilled, rejected) = (promise.clone(), promise.clone());
            inner.react(
                move |value| fulfilled.fulfill(value),
                move |reason| rejected.reject(reason),
            );
        }
        Resolution::Thenable(thenable) => {
            let resolver = Resolver::new(promise.clone());
            promise.scheduler().schedule(move || {
                if let Err(reason) = thenable.subscribe(resolver.clone()) {
                    resolver.reject(reason);
                }
            });
        }
    }
}

impl<T, E> Thenable<T, E> for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    fn subscribe(&self, resolver: Resolver<T, E>) -> Result<(), E> {
        if self.ptr_eq(&resolver.promise) {
            return Err(Error::ChainingCycle.into());
        }
        let rejecter = resolver.clone();
        self.react(
            move |value| resolver.resolve(Resolution::Value(value)),
            move |reason| rejecter.reject(reason),
        );
        Ok(())
    }
}
