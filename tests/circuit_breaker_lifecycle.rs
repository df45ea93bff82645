use ai_governance::clock::ManualClock;
use ai_governance::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
use ai_governance::Error;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn setup(threshold: u32, recovery: Duration) -> (Arc<ManualClock>, CircuitBreakerRegistry) {
    let clock = ManualClock::shared(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    let registry = CircuitBreakerRegistry::new(
        CircuitBreakerConfig::new()
            .with_failure_threshold(threshold)
            .with_recovery_timeout(recovery),
        clock.clone(),
    );
    (clock, registry)
}

#[test]
fn full_cycle_closed_open_half_open_closed() {
    let (clock, reg) = setup(3, Duration::from_secs(30));
    let b = reg.get("acme/m").unwrap();

    for _ in 0..3 {
        b.try_acquire().unwrap().failure();
    }
    assert_eq!(b.state(), CircuitState::Open);
    assert!(matches!(b.try_acquire(), Err(Error::CircuitOpen { backend }) if backend == "acme/m"));

    clock.advance(ChronoDuration::seconds(29));
    assert!(b.try_acquire().is_err());
    assert_eq!(reg.snapshot("acme/m").unwrap().open_remaining_ms, Some(1000));

    clock.advance(ChronoDuration::seconds(1));
    let trial = b.try_acquire().unwrap();
    assert!(trial.is_trial());
    assert_eq!(reg.state("acme/m"), CircuitState::HalfOpen);
    trial.success();

    assert_eq!(reg.state("acme/m"), CircuitState::Closed);
    assert_eq!(reg.snapshot("acme/m").unwrap().consecutive_failures, 0);
}

#[test]
fn failed_trial_reopens_with_a_fresh_timer() {
    let (clock, reg) = setup(1, Duration::from_secs(10));
    let b = reg.get("acme/m").unwrap();
    b.try_acquire().unwrap().failure();

    clock.advance(ChronoDuration::seconds(10));
    b.try_acquire().unwrap().failure();
    assert_eq!(b.state(), CircuitState::Open);

    clock.advance(ChronoDuration::seconds(9));
    assert!(reg.is_open("acme/m"));
    clock.advance(ChronoDuration::seconds(1));
    assert!(!reg.is_open("acme/m"));
}

#[test]
fn interleaved_success_keeps_breaker_closed() {
    let (_, reg) = setup(3, Duration::from_secs(10));
    for _ in 0..10 {
        reg.record_failure("acme/m").unwrap();
        reg.record_failure("acme/m").unwrap();
        reg.record_success("acme/m").unwrap();
    }
    assert_eq!(reg.state("acme/m"), CircuitState::Closed);
}

#[test]
fn exactly_one_trial_under_contention() {
    let (clock, reg) = setup(1, Duration::from_millis(100));
    let b = reg.get("acme/m").unwrap();
    b.record_failure();
    clock.advance(ChronoDuration::milliseconds(100));

    let threads = 12;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let b = Arc::clone(&b);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                match b.try_acquire() {
                    // hold the permit so nobody else can observe a released slot
                    Ok(permit) => {
                        std::mem::forget(permit);
                        true
                    }
                    Err(_) => false,
                }
            })
        })
        .collect();
    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(admitted, 1);
    assert_eq!(b.state(), CircuitState::HalfOpen);
}

#[test]
fn breakers_do_not_share_state() {
    let (_, reg) = setup(2, Duration::from_secs(60));
    reg.record_failure("a/x").unwrap();
    reg.record_failure("a/x").unwrap();
    reg.record_failure("a/y").unwrap();
    assert_eq!(reg.state("a/x"), CircuitState::Open);
    assert_eq!(reg.state("a/y"), CircuitState::Closed);

    let all = reg.snapshot_all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].backend, "a/x");
    assert_eq!(all[1].consecutive_failures, 1);
}
