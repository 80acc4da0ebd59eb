//! Containers shared between OS threads.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use sanduq_container::prelude::*;

const THREADS: usize = 16;

fn counting_factory(calls: &Arc<AtomicUsize>) -> impl Fn() -> Vec<u8> + Send + Sync + 'static {
    let calls = calls.clone();
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        vec![0_u8; 8]
    }
}

/// Runs `f` on `THREADS` threads released at the same time.
fn race<R: Send + 'static>(f: impl Fn() -> R + Send + Sync + 'static) -> Vec<R> {
    let f = Arc::new(f);
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let f = f.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                f()
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn singleton_factory_runs_once() {
    common::init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .put_scoped::<Singleton, _, _>("buffer", counting_factory(&calls))
        .unwrap();

    let values = race({
        let container = container.clone();
        move || container.get("buffer").unwrap()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.windows(2).all(|w| Value::ptr_eq(&w[0], &w[1])));
}

#[test]
fn thread_local_factory_runs_once_per_thread() {
    common::init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .put_scoped::<ThreadLocal, _, _>("buffer", counting_factory(&calls))
        .unwrap();

    let same_within_thread = race({
        let container = container.clone();
        move || {
            let first = container.get("buffer").unwrap();
            let second = container.get("buffer").unwrap();
            Value::ptr_eq(&first, &second)
        }
    });

    assert!(same_within_thread.into_iter().all(|same| same));
    assert_eq!(calls.load(Ordering::SeqCst), THREADS);
}

#[test]
fn no_scope_factory_runs_every_time() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container.put_factory("buffer", counting_factory(&calls)).unwrap();

    race({
        let container = container.clone();
        move || container.get("buffer").unwrap()
    });

    assert_eq!(calls.load(Ordering::SeqCst), THREADS);
}

#[test]
fn failed_factory_is_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .put(
            "flaky",
            Put::try_factory({
                let attempts = attempts.clone();
                move || {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("first attempt fails")
                    } else {
                        Ok(7_u32)
                    }
                }
            })
            .scope::<Singleton>(),
        )
        .unwrap();

    assert!(matches!(container.get("flaky"), Err(Error::Failed(_))));
    assert_eq!(*container.get_as::<u32>("flaky").unwrap(), 7);
    assert_eq!(*container.get_as::<u32>("flaky").unwrap(), 7);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn factories_resolve_from_their_own_container() {
    let container = Container::new();
    container.put_value("host", String::from("localhost")).unwrap();
    container
        .put(
            "url",
            Put::try_factory({
                let container = container.clone();
                move || {
                    let host = container.get_as::<String>("host")?;
                    Ok::<_, Error>(format!("http://{host}"))
                }
            })
            .scope::<Singleton>(),
        )
        .unwrap();

    let urls = race({
        let container = container.clone();
        move || container.get_as::<String>("url").unwrap()
    });
    assert!(urls.iter().all(|url| url.as_str() == "http://localhost"));
}

#[test]
fn stacks_are_shared_between_threads() {
    let stack = Stack::named("threads");
    let container = Container::new();
    container.put_value("answer", 42_u32).unwrap();
    let _guard = stack.push(container);

    let answers = race({
        let stack = stack.clone();
        move || *stack.get_as::<u32>("answer").unwrap()
    });
    assert!(answers.into_iter().all(|answer| answer == 42));
}
