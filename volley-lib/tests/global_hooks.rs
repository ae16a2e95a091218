//! These tests use the process-wide hook registry, so each one runs
//! serially and clears the registry when done.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use http::StatusCode;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serial_test::serial;
use test_utils::request;
use volley_lib::{
    Dispatcher, Request, Response, Transport, clear_global_hooks, register_after_request_hook,
};

struct ClearHooks;

impl Drop for ClearHooks {
    fn drop(&mut self) {
        clear_global_hooks();
    }
}

#[derive(Debug)]
struct Echo;

#[async_trait]
impl Transport for Echo {
    async fn execute(&self, request: &Request) -> Response {
        Response::new(StatusCode::OK, request.url().path())
    }
}

fn dispatcher() -> Dispatcher {
    Dispatcher::with_transport(Arc::new(Echo))
}

#[tokio::test]
#[serial]
async fn test_hook_runs_before_on_complete() {
    let _clear = ClearHooks;
    let log = Arc::new(Mutex::new(Vec::new()));

    let hook_log = Arc::clone(&log);
    register_after_request_hook(move |request| {
        // The response slot is already filled, `handled_response` is not
        assert!(request.response().is_some());
        assert!(request.handled_response().is_none());
        hook_log.lock().push(format!("hook {}", request.url().path()));
    });

    let r = request!("http://localhost/a");
    let callback_log = Arc::clone(&log);
    r.on_complete(move |response| {
        callback_log
            .lock()
            .push(format!("on_complete {}", response.body));
    });

    let dispatcher = dispatcher();
    dispatcher.enqueue(r).unwrap();
    dispatcher.run().await;

    assert_eq!(*log.lock(), vec!["hook /a", "on_complete /a"]);
}

#[tokio::test]
#[serial]
async fn test_hooks_are_shared_by_all_dispatchers() {
    let _clear = ClearHooks;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    register_after_request_hook(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    for path in ["/one", "/two"] {
        let dispatcher = dispatcher();
        dispatcher
            .enqueue(request!(format!("http://localhost{path}")))
            .unwrap();
        dispatcher.run().await;
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
#[serial]
async fn test_hook_runs_before_the_cache_setter() {
    let _clear = ClearHooks;
    let log = Arc::new(Mutex::new(Vec::new()));

    let hook_log = Arc::clone(&log);
    register_after_request_hook(move |_| hook_log.lock().push("hook"));

    let dispatcher = dispatcher();
    let setter_log = Arc::clone(&log);
    dispatcher.set_cache_setter(move |_| {
        setter_log.lock().push("setter");
        Ok(())
    });

    dispatcher
        .enqueue(request!(
            "http://localhost/cached",
            cache_timeout(Duration::from_secs(60))
        ))
        .unwrap();
    dispatcher.run().await;

    assert_eq!(*log.lock(), vec!["hook", "setter"]);
}

#[tokio::test]
#[serial]
async fn test_followers_pass_through_hooks() {
    let _clear = ClearHooks;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    register_after_request_hook(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let dispatcher = dispatcher();
    dispatcher.enqueue(request!("http://localhost/same")).unwrap();
    dispatcher.enqueue(request!("http://localhost/same")).unwrap();
    dispatcher.run().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
#[serial]
async fn test_clear() {
    let _clear = ClearHooks;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    register_after_request_hook(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    clear_global_hooks();

    let dispatcher = dispatcher();
    dispatcher.enqueue(request!("http://localhost/")).unwrap();
    dispatcher.run().await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
