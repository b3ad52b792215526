use crate::helpers::FakeConnection;
use nova_compat::registry::ConnectionRegistry;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn close_all_closes_in_registration_order_and_clears_the_registry() {
    let close_log = Arc::new(Mutex::new(Vec::new()));
    let registry = ConnectionRegistry::new();

    for id in 1..=3 {
        registry.register(Arc::new(FakeConnection::with_close_log(
            id,
            Arc::clone(&close_log),
        )));
    }
    assert_eq!(registry.len(), 3);

    let failures = registry.close_all().await;

    assert!(failures.is_empty());
    assert!(registry.is_empty());
    assert_eq!(*close_log.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn close_all_continues_past_individual_failures() {
    let close_log = Arc::new(Mutex::new(Vec::new()));
    let registry = ConnectionRegistry::new();

    let flaky = Arc::new(FakeConnection::with_close_log(2, Arc::clone(&close_log)));
    flaky.fail_close();

    registry.register(Arc::new(FakeConnection::with_close_log(
        1,
        Arc::clone(&close_log),
    )));
    registry.register(Arc::clone(&flaky));
    registry.register(Arc::new(FakeConnection::with_close_log(
        3,
        Arc::clone(&close_log),
    )));

    let failures = registry.close_all().await;

    // The failure is collected, the connections around it still close.
    assert_eq!(failures.len(), 1);
    assert!(registry.is_empty());
    assert_eq!(*close_log.lock().unwrap(), vec![1, 3]);
    assert!(!flaky.is_closed());
}

#[tokio::test]
async fn duplicate_registrations_are_tolerated() {
    let close_log = Arc::new(Mutex::new(Vec::new()));
    let registry = ConnectionRegistry::new();

    let connection = Arc::new(FakeConnection::with_close_log(7, Arc::clone(&close_log)));
    registry.register(Arc::clone(&connection));
    registry.register(connection);

    let failures = registry.close_all().await;

    assert!(failures.is_empty());
    assert_eq!(*close_log.lock().unwrap(), vec![7, 7]);
}
