//! Event Bus Integration Tests
//!
//! Tests for:
//! - Event<T>: ordering, deferred subscription, unsubscribe during dispatch
//! - Aggregated handler failures
//! - SubscriptionToken lifetime
//! - TypedEventCenter routing by type

use std::sync::Arc;

use lumen::core::errors::LumenError;
use lumen::core::event::{Event, SubscriptionToken, TypedEventCenter};
use parking_lot::Mutex;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn recorder(log: &Log, name: &'static str) -> impl FnMut(&u32) -> lumen::core::HandlerResult + Send + 'static {
    let log = Arc::clone(log);
    move |_| {
        log.lock().push(name);
        Ok(())
    }
}

// ============================================================================
// Dispatch Order & Tokens
// ============================================================================

#[test]
fn subscribe_then_reset_leaves_handler_count_unchanged() {
    let event = Event::<u32>::new();
    let log: Log = Arc::default();
    let _keep = event.subscribe(recorder(&log, "keep"));
    let before = event.handler_count();

    let mut token = event.subscribe(recorder(&log, "temp"));
    assert_eq!(event.handler_count(), before + 1);
    token.reset();
    assert_eq!(event.handler_count(), before);
    assert!(!token.is_active());

    event.publish(&1).unwrap();
    assert_eq!(*log.lock(), vec!["keep"]);
}

#[test]
fn reset_twice_unsubscribes_once() {
    let event = Event::<u32>::new();
    let log: Log = Arc::default();
    let _a = event.subscribe(recorder(&log, "a"));
    let mut b = event.subscribe(recorder(&log, "b"));
    b.reset();
    b.reset();
    assert_eq!(event.handler_count(), 1);
}

#[test]
fn empty_token_is_inactive() {
    let mut token = SubscriptionToken::empty();
    assert!(!token.is_active());
    token.reset();
}

#[test]
fn handler_added_during_publish_runs_next_time() {
    let event = Event::<u32>::new();
    let log: Log = Arc::default();
    let late_tokens: Arc<Mutex<Vec<SubscriptionToken>>> = Arc::default();

    let _adder = {
        let event = event.clone();
        let log = Arc::clone(&log);
        let late_tokens = Arc::clone(&late_tokens);
        event.clone().subscribe(move |_| {
            log.lock().push("adder");
            if late_tokens.lock().is_empty() {
                let token = event.subscribe(recorder(&log, "late"));
                late_tokens.lock().push(token);
            }
            Ok(())
        })
    };

    event.publish(&1).unwrap();
    assert_eq!(*log.lock(), vec!["adder"]);
    event.publish(&2).unwrap();
    assert_eq!(*log.lock(), vec!["adder", "adder", "late"]);
}

#[test]
fn handler_removed_during_publish_is_skipped() {
    let event = Event::<u32>::new();
    let log: Log = Arc::default();
    let victim: Arc<Mutex<Option<SubscriptionToken>>> = Arc::default();

    let _remover = {
        let log = Arc::clone(&log);
        let victim = Arc::clone(&victim);
        event.subscribe(move |_| {
            log.lock().push("remover");
            victim.lock().take();
            Ok(())
        })
    };
    *victim.lock() = Some(event.subscribe(recorder(&log, "victim")));

    event.publish(&1).unwrap();
    assert_eq!(*log.lock(), vec!["remover"]);
    assert_eq!(event.handler_count(), 1);
}

// ============================================================================
// Failure Aggregation
// ============================================================================

#[test]
fn every_handler_runs_and_failures_are_collected() {
    let event = Event::<u32>::new();
    let log: Log = Arc::default();
    let _a = event.subscribe(|_| Err("first".into()));
    let _b = event.subscribe(recorder(&log, "ok"));
    let _c = event.subscribe(|_| Err("second".into()));

    let err = event.publish(&3).unwrap_err();
    assert_eq!(*log.lock(), vec!["ok"]);
    match err {
        LumenError::EventDispatch(errors) => {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            assert_eq!(messages, vec!["first", "second"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// TypedEventCenter
// ============================================================================

#[derive(Debug)]
struct Resized {
    width: u32,
}

#[derive(Debug)]
struct Closed;

#[test]
fn typed_center_routes_by_type() {
    let center = TypedEventCenter::new();
    let widths: Arc<Mutex<Vec<u32>>> = Arc::default();
    let closed = Arc::new(Mutex::new(0));

    let _resize = {
        let widths = Arc::clone(&widths);
        center.subscribe(move |event: &Resized| {
            widths.lock().push(event.width);
            Ok(())
        })
    };
    let _close = {
        let closed = Arc::clone(&closed);
        center.subscribe(move |_: &Closed| {
            *closed.lock() += 1;
            Ok(())
        })
    };

    center.publish(&Resized { width: 640 }).unwrap();
    center.publish(&Closed).unwrap();
    center.publish(&Resized { width: 800 }).unwrap();

    assert_eq!(*widths.lock(), vec![640, 800]);
    assert_eq!(*closed.lock(), 1);
    assert_eq!(center.action_count::<Resized>(), 1);
}

#[test]
fn publishing_without_handlers_is_ok() {
    let center = TypedEventCenter::new();
    center.publish(&Closed).unwrap();
    assert_eq!(center.action_count::<Closed>(), 0);
}

#[test]
fn clear_detaches_outstanding_tokens() {
    let center = TypedEventCenter::new();
    let mut token = center.subscribe(|_: &Closed| Ok(()));
    center.clear();
    assert_eq!(center.action_count::<Closed>(), 0);
    token.reset();
}
