//! Promises/A+ deferred values for rust.
//!
//! A [`Promise`] starts pending and settles exactly once, to a value or to a
//! rejection reason. Continuations attached with [`then`](Promise::then),
//! [`catch`](Promise::catch) and [`finally`](Promise::finally) always run on
//! a later turn of the promise's [`Scheduler`], whether they were attached
//! before or after the promise settled.
//!
//! The crate does not run anything by itself. A [`Schedule`] implementation
//! supplies the turns; [`EventLoop`] is a single-threaded one with
//! virtual-time timers.
//!
//! Other future implementations take part through [`Thenable`], and
//! [`combinators`] fan many promises in to one. A promise can also be
//! `.await`ed, see [`Waiter`].
//!
//! # Examples
//!
//! ```
//! use promise_aplus::{EventLoop, Promise, Resolution};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum Reason {
//!     Cycle,
//!     Io(String),
//! }
//!
//! impl From<promise_aplus::Error> for Reason {
//!     fn from(_: promise_aplus::Error) -> Self {
//!         Reason::Cycle
//!     }
//! }
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//! let read: Promise<String, Reason> = Promise::new(&scheduler, |resolver| {
//!     resolver.reject(Reason::Io("disk on fire".into()));
//!     Ok(())
//! });
//! let fallback = read.catch(|_| Ok(Resolution::Value("default".to_string())));
//!
//! event_loop.run_until_idle();
//! assert_eq!(fallback.value().as_deref(), Some("default"));
//! ```
pub mod combinators;
mod event_loop;
mod promise;
mod resolve;
mod scheduler;

pub use combinators::{AggregateError, Settlement};
pub use event_loop::EventLoop;
pub use promise::{Deferred, Promise, PromiseState, Waiter};
pub use resolve::{Resolution, Resolver, Thenable};
pub use scheduler::{Schedule, Scheduler, Task};

/// Failures raised by the promise machinery itself. Rejection reason types
/// take these in through `From<Error>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("chaining cycle detected for promise")]
    ChainingCycle,
}
