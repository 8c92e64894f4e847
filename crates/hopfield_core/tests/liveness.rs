//! Liveness of the rendezvous protocol.
//!
//! Correct usage must always terminate, even for large networks and long
//! runs. Incorrect usage (a missing feed) must surface as `DeadlockTimeout`
//! rather than a hang, and must leave the network usable. A launch abandoned
//! by its caller poisons the network instead.

use std::time::{Duration, Instant};

use hopfield_core::{HopfieldConfig, HopfieldError, Network, WaitPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::timeout;

const OUTER_BOUND: Duration = Duration::from_secs(120);

fn random_patterns(rng: &mut StdRng, count: usize, n: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|_| {
            (0..n)
                .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
                .collect()
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fifty_units_hundred_rounds_complete() {
    let n = 50;
    let mut rng = StdRng::seed_from_u64(7);
    let patterns = random_patterns(&mut rng, 3, n);

    let start = Instant::now();
    let mut network = Network::new(n).unwrap();
    timeout(OUTER_BOUND, network.train(&patterns))
        .await
        .expect("training did not finish")
        .unwrap();

    network.feed_random(&mut rng).unwrap();
    timeout(OUTER_BOUND, network.run(100))
        .await
        .expect("recall did not finish")
        .unwrap();

    println!(
        "50 units, 3 patterns + 100 recall rounds in {:.2?}",
        start.elapsed()
    );
    assert!(network.potentials().iter().all(|&v| v == 1.0 || v == -1.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_long_training_completes() {
    let n = 20;
    let mut rng = StdRng::seed_from_u64(11);
    let patterns = random_patterns(&mut rng, 100, n);

    let mut network = Network::new(n).unwrap();
    timeout(OUTER_BOUND, network.train(&patterns))
        .await
        .expect("training did not finish")
        .unwrap();

    assert_eq!(
        network.weight_matrix(),
        hopfield_core::energy::hebbian_matrix(&patterns, n)
    );
}

#[tokio::test]
async fn test_single_threaded_runtime_does_not_deadlock() {
    let mut network = Network::new(12).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let patterns = random_patterns(&mut rng, 5, 12);

    timeout(OUTER_BOUND, async {
        network.train(&patterns).await.unwrap();
        network.feed(&patterns[0]).unwrap();
        network.run(25).await.unwrap();
    })
    .await
    .expect("current-thread runtime stalled");
}

#[tokio::test]
async fn test_missing_feed_reports_timeout_then_recovers() {
    let config = HopfieldConfig::default().with_exchange_timeout(Duration::from_millis(100));
    let mut network = Network::with_config(5, config).unwrap();
    network.train(&[[1.0f32, 1.0, -1.0, -1.0, 1.0]]).await.unwrap();

    // Only unit 2 is left unfed: it stalls on its stimulus, and its peers
    // stall waiting for its round-0 value.
    for id in [0, 1, 3, 4] {
        network.feed_unit(id, 1.0).unwrap();
    }
    let err = timeout(OUTER_BOUND, network.run(3))
        .await
        .expect("timeout was not enforced")
        .unwrap_err();
    match err {
        HopfieldError::DeadlockTimeout {
            wait_point: WaitPoint::Stimulus { .. } | WaitPoint::Receive { peer: 2, .. },
            ..
        } => {}
        other => panic!("unexpected error: {other}"),
    }

    // Links were drained, so a correct follow-up run is unaffected
    let settled = network.recall(&[1.0, 1.0, -1.0, -1.0, -1.0], 5).await.unwrap();
    assert_eq!(settled, vec![1.0, 1.0, -1.0, -1.0, 1.0]);
}

#[tokio::test]
async fn test_unbounded_config_still_completes() {
    let mut network = Network::with_config(6, HopfieldConfig::unbounded()).unwrap();
    let pattern = [1.0f32, -1.0, -1.0, 1.0, 1.0, -1.0];
    network.train(&[pattern]).await.unwrap();
    let settled = timeout(OUTER_BOUND, network.recall(&pattern, 10))
        .await
        .expect("unbounded recall stalled")
        .unwrap();
    assert_eq!(settled, pattern.to_vec());
}

#[tokio::test]
async fn test_cancelled_run_poisons_network() {
    let mut network = Network::with_config(4, HopfieldConfig::unbounded()).unwrap();
    for id in 0..3 {
        network.feed_unit(id, 1.0).unwrap();
    }

    // Unit 3 never gets a stimulus and nothing bounds the wait, so only the
    // caller's own timeout ends the run
    assert!(timeout(Duration::from_millis(100), network.run(5))
        .await
        .is_err());

    let poisoned = HopfieldError::Poisoned { lost: 4 };
    assert_eq!(network.feed(&[1.0; 4]).unwrap_err(), poisoned);
    assert_eq!(network.feed_unit(0, 1.0).unwrap_err(), poisoned);
    assert_eq!(network.run(1).await.unwrap_err(), poisoned);
    assert_eq!(network.train(&[[1.0f32; 4]]).await.unwrap_err(), poisoned);
    assert_eq!(network.energy().unwrap_err(), poisoned);
    assert_eq!(network.set_weight(0, 1, 1.0).unwrap_err(), poisoned);
    assert_eq!(network.set_threshold(0, 1.0).unwrap_err(), poisoned);
    assert_eq!(network.connect(0, 1).unwrap_err(), poisoned);
    println!("after cancel: {}", poisoned);
}

#[tokio::test]
async fn test_cancelled_training_poisons_network() {
    let mut network = Network::with_config(3, HopfieldConfig::unbounded()).unwrap();
    let patterns = [[1.0f32, -1.0, 1.0], [-1.0, -1.0, 1.0]];

    // On the current-thread runtime no worker has run yet, so the second
    // pattern cannot be handed over before the caller gives up
    assert!(timeout(Duration::ZERO, network.train(&patterns))
        .await
        .is_err());

    assert_eq!(
        network.energy().unwrap_err(),
        HopfieldError::Poisoned { lost: 3 }
    );
    assert!(network.potentials().is_empty());
}
