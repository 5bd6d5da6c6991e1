use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use jsembed_kernel_rs::registry::{DuplicateBindingError, Registry, UnboundTypeError};

trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

trait Logger: Send + Sync {
    fn line(&self, message: &str) -> String;
}

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}

struct TickingClock(AtomicU64);

impl Clock for TickingClock {
    fn now_millis(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

fn clock_only() -> Registry {
    Registry::builder()
        .bind_instance::<dyn Clock>(Arc::new(FixedClock(1_700_000_000_000)))
        .build()
        .unwrap()
}

#[test]
fn unbound_type_fails_naming_the_type() {
    let registry = clock_only();
    let err = registry.get_instance::<dyn Logger>().err().unwrap();
    let unbound = err.downcast_ref::<UnboundTypeError>().unwrap();
    assert!(unbound.type_name.contains("Logger"));
    assert!(err.to_string().contains("Logger"));
    assert!(registry.get_provider::<dyn Logger>().is_err());
}

#[test]
fn optional_lookup_of_unbound_type_is_absent() {
    let registry = clock_only();
    assert!(registry.get_instance_or_none::<dyn Logger>().is_none());
    let clock = registry.get_instance_or_none::<dyn Clock>().unwrap();
    assert_eq!(clock.now_millis(), 1_700_000_000_000);
}

#[test]
fn singleton_bindings_share_one_instance() {
    let shared: Arc<dyn Clock> = Arc::new(TickingClock(AtomicU64::new(0)));
    let registry = Registry::builder()
        .bind_instance::<dyn Clock>(shared)
        .build()
        .unwrap();
    let a = registry.get_instance::<dyn Clock>().unwrap();
    let b = registry.get_instance::<dyn Clock>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.now_millis(), 0);
    assert_eq!(b.now_millis(), 1);
}

#[test]
fn providers_defer_construction() {
    let registry = Registry::builder()
        .bind::<dyn Clock, _>(|| Arc::new(TickingClock(AtomicU64::new(10))) as Arc<dyn Clock>)
        .build()
        .unwrap();
    let provider = registry.get_provider::<dyn Clock>().unwrap();
    let first = provider();
    let second = provider();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.now_millis(), 10);
    assert_eq!(second.now_millis(), 10);
}

#[test]
fn clones_share_bindings_across_threads() {
    let registry = clock_only();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || registry.get_instance::<dyn Clock>().unwrap().now_millis())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1_700_000_000_000);
    }
}

#[test]
fn duplicate_bindings_are_rejected_at_build_time() {
    let err = Registry::builder()
        .bind_instance::<dyn Clock>(Arc::new(FixedClock(1)))
        .bind_instance::<dyn Clock>(Arc::new(FixedClock(2)))
        .build()
        .unwrap_err();
    assert!(err.downcast_ref::<DuplicateBindingError>().is_some());
}
