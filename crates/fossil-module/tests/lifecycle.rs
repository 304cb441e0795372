//! Lifecycle integration: epochs, asynchronous transition work, and
//! the overlap policy.

use fossil_event::{handler, Arg};
use fossil_module::{events, Module, Phase};
use fossil_wait::{Promise, WaitError, WaitOptions};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

fn wire_lifecycle_log(module: &Module) -> Log {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    for event in [events::START_FIRST, events::START, events::STANDBY, events::STOP] {
        let log = Arc::clone(&log);
        let tag = event.to_string();
        module.bus().on(
            event,
            handler(move |_args: &[Arg]| {
                log.lock().push(tag.clone());
                None
            }),
        );
    }
    log
}

#[test]
fn first_start_fires_once_per_epoch() {
    let module = Module::new("m");
    let log = wire_lifecycle_log(&module);

    assert!(module.start());
    assert!(!module.start(), "second start is a no-op");
    assert!(module.standby());
    assert!(module.start(), "restart within the epoch");
    assert!(module.stop());
    assert!(module.start(), "new epoch");

    assert_eq!(
        *log.lock(),
        vec![
            "start:first",
            "start",
            "standby",
            "start",
            "standby",
            "stop",
            "start:first",
            "start",
        ]
    );
}

#[test]
fn stop_before_any_start_is_noop() {
    let module = Module::new("m");
    let log = wire_lifecycle_log(&module);
    assert!(!module.stop());
    assert!(log.lock().is_empty());
}

#[test]
fn standby_when_not_running_is_noop() {
    let module = Module::new("m");
    assert!(!module.standby());
    module.start();
    module.standby();
    assert!(!module.standby());
}

#[test]
fn stop_waits_for_registered_work() {
    let module = Module::new("m");
    let gate = Promise::new();
    {
        let me = module.clone();
        let gate = gate.clone();
        module.bus().on(
            events::STANDBY,
            handler(move |_args: &[Arg]| {
                me.deferrable().wait_for(&gate, WaitOptions::default());
                None
            }),
        );
    }
    let stopped = Arc::new(Mutex::new(false));
    {
        let stopped = Arc::clone(&stopped);
        module.bus().on(
            events::STOP,
            handler(move |_args: &[Arg]| {
                *stopped.lock() = true;
                None
            }),
        );
    }

    module.start();
    assert!(module.stop());
    assert!(!*stopped.lock(), "stop must wait for the standby work");
    assert_eq!(module.phase(), Phase::Standby);

    gate.resolve(json!(null));
    assert!(*stopped.lock());
    assert_eq!(module.phase(), Phase::Stopped);
}

#[test]
fn overlapping_transitions_are_refused() {
    let module = Module::new("m");
    let gate = Promise::new();
    {
        let me = module.clone();
        let gate = gate.clone();
        module.bus().on(
            events::START,
            handler(move |_args: &[Arg]| {
                me.deferrable().wait_for(&gate, WaitOptions::default());
                None
            }),
        );
    }

    assert!(module.start());
    assert!(module.deferrable().is_waiting());

    // The start's work is still in flight: transitions are refused.
    assert!(!module.stop());
    assert!(!module.standby());
    assert!(module.phase().is_running());

    gate.resolve(json!(null));
    assert!(module.stop());
    assert_eq!(module.phase(), Phase::Stopped);
}

#[test]
fn start_failure_routes_to_hook() {
    let errors: Log = Arc::new(Mutex::new(Vec::new()));
    let module = {
        let errors = Arc::clone(&errors);
        Module::builder("m")
            .on_start_error(move |err| errors.lock().push(err.to_string()))
            .build()
    };
    let gate = Promise::new();
    {
        let me = module.clone();
        let gate = gate.clone();
        module.bus().on(
            events::START,
            handler(move |_args: &[Arg]| {
                me.deferrable().wait_for(&gate, WaitOptions::default());
                None
            }),
        );
    }

    module.start();
    gate.reject(WaitError::Failed("no database".into()));
    assert_eq!(errors.lock().len(), 1);
    assert!(errors.lock()[0].contains("no database"));
}

#[test]
fn stop_failure_routes_to_hook_and_keeps_standby() {
    let errors: Log = Arc::new(Mutex::new(Vec::new()));
    let module = {
        let errors = Arc::clone(&errors);
        Module::builder("m")
            .on_stop_error(move |err| errors.lock().push(err.to_string()))
            .build()
    };
    let gate = Promise::new();
    {
        let me = module.clone();
        let gate = gate.clone();
        module.bus().on(
            events::STANDBY,
            handler(move |_args: &[Arg]| {
                me.deferrable().wait_for(&gate, WaitOptions::default());
                None
            }),
        );
    }

    module.start();
    module.stop();
    gate.reject(WaitError::Failed("flush failed".into()));

    assert_eq!(errors.lock().len(), 1);
    // The epoch did not end; the module sits in standby.
    assert_eq!(module.phase(), Phase::Standby);
}

#[tokio::test]
async fn slow_start_work_times_out_into_the_hook() {
    let errors: Log = Arc::new(Mutex::new(Vec::new()));
    let module = {
        let errors = Arc::clone(&errors);
        Module::builder("m")
            .on_start_error(move |err| errors.lock().push(err.to_string()))
            .build()
    };
    let never = Promise::new();
    {
        let me = module.clone();
        let never = never.clone();
        module.bus().on(
            events::START,
            handler(move |_args: &[Arg]| {
                me.deferrable().wait_for(
                    &never,
                    WaitOptions::default().with_timeout(Duration::from_millis(20)),
                );
                None
            }),
        );
    }

    module.start();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(errors.lock().len(), 1);
    assert!(errors.lock()[0].contains("timed out"));
}
