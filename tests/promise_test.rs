#[cfg(test)]
mod tests {
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;
    use promise_aplus::{Deferred, Error, EventLoop, Promise, Resolution};
    use std::cell::RefCell;
    use std::future::IntoFuture;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Reason {
        Msg(&'static str),
        Cycle,
    }

    impl From<Error> for Reason {
        fn from(err: Error) -> Self {
            match err {
                Error::ChainingCycle => Reason::Cycle,
            }
        }
    }

    /// Alternates between the event loop and the executor until neither has
    /// anything left to do.
    fn drive(event_loop: &EventLoop, pool: &mut LocalPool) {
        loop {
            pool.run_until_stalled();
            if event_loop.run() == 0 {
                break;
            }
        }
    }

    #[test]
    fn test_await_resolved_later() {
        let event_loop = EventLoop::new();
        let mut pool = LocalPool::new();
        let deferred = Deferred::<i32, Reason>::new(&event_loop.scheduler());
        let received = Rc::new(RefCell::new(None));

        let (promise, slot) = (deferred.promise().clone(), received.clone());
        pool.spawner()
            .spawn_local(async move {
                *slot.borrow_mut() = Some(promise.await);
            })
            .expect("spawn");
        drive(&event_loop, &mut pool);
        assert_eq!(*received.borrow(), None);

        let resolver = deferred.resolver().clone();
        event_loop.set_timeout(1000, move || resolver.resolve(Resolution::Value(42)));
        drive(&event_loop, &mut pool);
        assert_eq!(*received.borrow(), Some(Ok(42)));
        assert_eq!(event_loop.now(), 1000);
    }

    #[test]
    fn test_await_rejected() {
        let event_loop = EventLoop::new();
        let mut pool = LocalPool::new();
        let promise: Promise<String, Reason> =
            Promise::rejected(&event_loop.scheduler(), Reason::Msg("💥"));

        let outcome = pool.run_until(promise.into_future());
        assert_eq!(outcome, Err(Reason::Msg("💥")));
    }

    #[test]
    fn test_await_a_chain() {
        let event_loop = EventLoop::new();
        let mut pool = LocalPool::new();
        let scheduler = event_loop.scheduler();
        let received = Rc::new(RefCell::new(Vec::new()));

        let slot = received.clone();
        let start: Promise<i32, Reason> = Promise::resolved(&scheduler, Resolution::Value(1));
        pool.spawner()
            .spawn_local(async move {
                let doubled = start.then(|v| Ok(Resolution::Value(v * 2)));
                let value = doubled.clone().await;
                slot.borrow_mut().push(value);
                let failed: Promise<i32, Reason> = doubled.then(|_| Err(Reason::Msg("nope")));
                slot.borrow_mut().push(failed.await);
            })
            .expect("spawn");
        drive(&event_loop, &mut pool);
        assert_eq!(*received.borrow(), vec![Ok(2), Err(Reason::Msg("nope"))]);
    }

    #[test]
    fn test_two_waiters_on_one_promise() {
        let event_loop = EventLoop::new();
        let mut pool = LocalPool::new();
        let deferred = Deferred::<&str, Reason>::new(&event_loop.scheduler());
        let received = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..2 {
            let (promise, slot) = (deferred.promise().clone(), received.clone());
            pool.spawner()
                .spawn_local(async move {
                    let outcome = promise.await;
                    slot.borrow_mut().push(outcome);
                })
                .expect("spawn");
        }
        drive(&event_loop, &mut pool);
        deferred.resolve(Resolution::Value("🍓"));
        drive(&event_loop, &mut pool);
        assert_eq!(*received.borrow(), vec![Ok("🍓"), Ok("🍓")]);
    }

    #[test]
    fn test_deferred_into_parts() {
        let event_loop = EventLoop::new();
        let (promise, resolver) = Deferred::<i32, Reason>::new(&event_loop.scheduler()).into_parts();
        resolver.reject(Reason::Msg("first"));
        resolver.resolve(Resolution::Value(1));
        assert_eq!(promise.reason(), Some(Reason::Msg("first")));
    }
}
