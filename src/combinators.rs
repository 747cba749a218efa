//! Fan-in over many promises: [`all`], [`race`], [`any`] and [`all_settled`].
//!
//! Every input is a [`Resolution`], so plain values can be mixed with
//! promises and thenables; plain values count as already fulfilled.
use crate::promise::Promise;
use crate::resolve::Resolution;
use crate::scheduler::Scheduler;
use crate::Error;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// How one input of [`all_settled`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Settlement<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settlement::Fulfilled(_))
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settlement::Fulfilled(value) => Ok(value),
            Settlement::Rejected(reason) => Err(reason),
        }
    }
}

/// Rejection reason of [`any`] when no input fulfilled. `reasons` is in
/// input order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("all promises were rejected")]
pub struct AggregateError<E> {
    pub reasons: Vec<E>,
}

fn promises<T, E, I>(scheduler: &Scheduler, inputs: I) -> Vec<Promise<T, E>>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    inputs
        .into_iter()
        .map(|input| Promise::resolved(scheduler, input))
        .collect()
}

/// Counts down the inputs still outstanding. Yields the collected slots once
/// the last one reports.
struct Countdown<A> {
    slots: RefCell<Vec<Option<A>>>,
    remaining: Cell<usize>,
}

impl<A> Countdown<A> {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new((0..len).map(|_| None).collect()),
            remaining: Cell::new(len),
        })
    }

    fn report(&self, index: usize, item: A) -> Option<Vec<A>> {
        let mut slots = self.slots.borrow_mut();
        if slots[index].is_some() {
            return None;
        }
        slots[index] = Some(item);
        self.remaining.set(self.remaining.get() - 1);
        if self.remaining.get() > 0 {
            return None;
        }
        Some(slots.drain(..).flatten().collect())
    }
}

/// Fulfills with every input's value, in input order, once all have
/// fulfilled. Rejects with the first rejection.
///
/// # Examples
///
/// ```
/// use promise_aplus::{combinators, EventLoop, Promise, Resolution};
///
/// let event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
/// let later: Promise<i32, promise_aplus::Error> =
///     Promise::resolved(&scheduler, Resolution::Value(2));
/// let both = combinators::all(&scheduler, vec![Resolution::Value(1), later.into()]);
///
/// event_loop.run_until_idle();
/// assert_eq!(both.value(), Some(vec![1, 2]));
/// ```
pub fn all<T, E, I>(scheduler: &Scheduler, inputs: I) -> Promise<Vec<T>, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let inputs = promises(scheduler, inputs);
    let aggregate = Promise::pending(scheduler.clone());
    if inputs.is_empty() {
        aggregate.fulfill(Vec::new());
        return aggregate;
    }

    let countdown = Countdown::new(inputs.len());
    for (index, input) in inputs.into_iter().enumerate() {
        let (countdown, fulfilled, rejected) =
            (countdown.clone(), aggregate.clone(), aggregate.clone());
        input.react(
            move |value| {
                if let Some(values) = countdown.report(index, value) {
                    fulfilled.fulfill(values);
                }
            },
            move |reason| rejected.reject(reason),
        );
    }
    aggregate
}

/// Settles like whichever input settles first. Never settles for an empty
/// input.
pub fn race<T, E, I>(scheduler: &Scheduler, inputs: I) -> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let aggregate = Promise::pending(scheduler.clone());
    for input in promises(scheduler, inputs) {
        let (fulfilled, rejected) = (aggregate.clone(), aggregate.clone());
        input.react(
            move |value| fulfilled.fulfill(value),
            move |reason| rejected.reject(reason),
        );
    }
    aggregate
}

/// Fulfills once every input has settled, with one [`Settlement`] per input
/// in input order. Never rejects.
pub fn all_settled<T, E, I>(scheduler: &Scheduler, inputs: I) -> Promise<Vec<Settlement<T, E>>, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let inputs = promises(scheduler, inputs);
    let aggregate = Promise::pending(scheduler.clone());
    if inputs.is_empty() {
        aggregate.fulfill(Vec::new());
        return aggregate;
    }

    let countdown = Countdown::new(inputs.len());
    for (index, input) in inputs.into_iter().enumerate() {
        let (on_value, on_reason) = (countdown.clone(), countdown.clone());
        let (fulfilled, also_fulfilled) = (aggregate.clone(), aggregate.clone());
        input.react(
            move |value| {
                if let Some(settled) = on_value.report(index, Settlement::Fulfilled(value)) {
                    fulfilled.fulfill(settled);
                }
            },
            move |reason| {
                if let Some(settled) = on_reason.report(index, Settlement::Rejected(reason)) {
                    also_fulfilled.fulfill(settled);
                }
            },
        );
    }
    aggregate
}

/// Fulfills with the first input to fulfill. Rejects with an
/// [`AggregateError`] of every reason, in input order, only when all inputs
/// rejected; an empty input therefore rejects right away.
pub fn any<T, E, I>(scheduler: &Scheduler, inputs: I) -> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + From<AggregateError<E>> + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let inputs = promises(scheduler, inputs);
    let aggregate = Promise::pending(scheduler.clone());
    if inputs.is_empty() {
        aggregate.reject(AggregateError { reasons: Vec::new() }.into());
        return aggregate;
    }

    let countdown = Countdown::new(inputs.len());
    for (index, input) in inputs.into_iter().enumerate() {
        let (countdown, fulfilled, rejected) =
            (countdown.clone(), aggregate.clone(), aggregate.clone());
        input.react(
            move |value| fulfilled.fulfill(value),
            move |reason| {
                if let Some(reasons) = countdown.report(index, reason) {
                    rejected.reject(AggregateError { reasons }.into());
                }
            },
        );
    }
    aggregate
}

#[cfg(test)]
mod tests {
    use super::{all, all_settled, any, race, AggregateError, Settlement};
    use crate::{Deferred, Error, EventLoop, Promise, Resolution};

    #[derive(Debug, Clone, PartialEq)]
    enum Reason {
        Msg(&'static str),
        Cycle,
        Aggregate(Vec<Reason>),
    }

    impl From<Error> for Reason {
        fn from(err: Error) -> Self {
            match err {
                Error::ChainingCycle => Reason::Cycle,
            }
        }
    }

    impl From<AggregateError<Reason>> for Reason {
        fn from(err: AggregateError<Reason>) -> Self {
            Reason::Aggregate(err.reasons)
        }
    }

    type Input = Resolution<i32, Reason>;

    #[test]
    fn test_all_preserves_input_order() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let slow = Deferred::<i32, Reason>::new(&scheduler);
        let fast = Deferred::<i32, Reason>::new(&scheduler);
        let joined = all(
            &scheduler,
            vec![slow.promise().clone().into(), fast.promise().clone().into(), Input::Value(3)],
        );
        fast.resolve(Resolution::Value(2));
        event_loop.run_until_idle();
        assert!(joined.is_pending());

        slow.resolve(Resolution::Value(1));
        event_loop.run_until_idle();
        assert_eq!(joined.value(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_all_empty_fulfills_immediately() {
        let event_loop = EventLoop::new();
        let joined = all(&event_loop.scheduler(), Vec::<Input>::new());
        assert_eq!(joined.value(), Some(vec![]));
    }

    #[test]
    fn test_all_rejects_with_first_reason() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let joined = all(
            &scheduler,
            vec![
                Input::Value(1),
                Input::Promise(Promise::rejected(&scheduler, Reason::Msg("e"))),
                Input::Value(2),
            ],
        );
        event_loop.run_until_idle();
        assert_eq!(joined.reason(), Some(Reason::Msg("e")));
    }

    #[test]
    fn test_race_takes_the_first_to_settle() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let first = Deferred::<i32, Reason>::new(&scheduler);
        let second = Deferred::<i32, Reason>::new(&scheduler);
        let winner = race(
            &scheduler,
            vec![first.promise().clone().into(), second.promise().clone().into()],
        );
        second.reject(Reason::Msg("second"));
        first.resolve(Resolution::Value(1));
        event_loop.run_until_idle();
        assert_eq!(winner.reason(), Some(Reason::Msg("second")));
    }

    #[test]
    fn test_race_empty_stays_pending() {
        let event_loop = EventLoop::new();
        let winner = race(&event_loop.scheduler(), Vec::<Input>::new());
        event_loop.run();
        assert!(winner.is_pending());
    }

    #[test]
    fn test_all_settled_records_every_outcome() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let settled = all_settled(
            &scheduler,
            vec![Input::Value(1), Input::Promise(Promise::rejected(&scheduler, Reason::Msg("x")))],
        );
        event_loop.run_until_idle();
        assert_eq!(
            settled.value(),
            Some(vec![
                Settlement::Fulfilled(1),
                Settlement::Rejected(Reason::Msg("x")),
            ])
        );
    }

    #[test]
    fn test_any_takes_the_first_fulfillment() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let first = any(
            &scheduler,
            vec![Input::Promise(Promise::rejected(&scheduler, Reason::Msg("a"))), Input::Value(2)],
        );
        event_loop.run_until_idle();
        assert_eq!(first.value(), Some(2));
    }

    #[test]
    fn test_any_aggregates_reasons_in_input_order() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let late = Deferred::<i32, Reason>::new(&scheduler);
        let none = any(
            &scheduler,
            vec![late.promise().clone().into(), Input::Promise(Promise::rejected(&scheduler, Reason::Msg("b")))],
        );
        event_loop.run_until_idle();
        assert!(none.is_pending());

        late.reject(Reason::Msg("a"));
        event_loop.run_until_idle();
        assert_eq!(
            none.reason(),
            Some(Reason::Aggregate(vec![Reason::Msg("a"), Reason::Msg("b")]))
        );
    }

    #[test]
    fn test_any_empty_rejects_immediately() {
        let event_loop = EventLoop::new();
        let none = any(&event_loop.scheduler(), Vec::<Input>::new());
        assert_eq!(none.reason(), Some(Reason::Aggregate(vec![])));
    }

    #[test]
    fn test_aggregate_error_display() {
        let err = AggregateError {
            reasons: vec![Reason::Msg("a"), Reason::Msg("b")],
        };
        assert_eq!(err.to_string(), "all promises were rejected");
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }
}
