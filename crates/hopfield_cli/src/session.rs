use anyhow::Context;
use hopfield_core::{HopfieldConfig, Network};
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::memory::Memory;

/// Outcome of one recall, printed as a JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct RecallReport {
    pub probe: usize,
    pub seed: Vec<f32>,
    pub potentials: Vec<f32>,
    pub initial_energy: f32,
    pub energy: f32,
    /// Stored pattern the network settled on, if it settled on one
    pub recovered: Option<usize>,
}

/// Build a network sized for `memory` and store its patterns.
pub async fn train(memory: &Memory, config: &HopfieldConfig) -> anyhow::Result<Network> {
    let n = memory.units()?;
    let mut network = Network::with_config(n, config.clone()).context("building network")?;
    network
        .train(&memory.patterns)
        .await
        .context("training stored patterns")?;
    info!(units = n, patterns = memory.patterns.len(), "memory stored");
    Ok(network)
}

/// Run recall from a `seed` the network has already been fed.
async fn settle(
    network: &mut Network,
    memory: &Memory,
    probe: usize,
    seed: Vec<f32>,
    rounds: usize,
) -> anyhow::Result<RecallReport> {
    let initial_energy = network.energy_of(&seed)?;
    network
        .run(rounds)
        .await
        .with_context(|| format!("recalling probe {}", probe))?;
    let potentials = network.potentials();
    let energy = network.energy()?;
    let recovered = memory.matching(&potentials);

    info!(probe, initial_energy, energy, ?recovered, "probe settled");
    Ok(RecallReport {
        probe,
        seed,
        potentials,
        initial_energy,
        energy,
        recovered,
    })
}

/// Recall from every probe in the memory file.
pub async fn recall_probes(
    memory: &Memory,
    config: &HopfieldConfig,
    rounds: usize,
) -> anyhow::Result<Vec<RecallReport>> {
    let mut network = train(memory, config).await?;
    let mut reports = Vec::with_capacity(memory.probes.len());
    for (probe, seed) in memory.probes.iter().enumerate() {
        network
            .feed(seed)
            .with_context(|| format!("feeding probe {}", probe))?;
        reports.push(settle(&mut network, memory, probe, seed.clone(), rounds).await?);
    }
    Ok(reports)
}

/// Recall from `count` random seeds drawn from `rng`.
pub async fn recall_random<R: Rng + ?Sized>(
    memory: &Memory,
    config: &HopfieldConfig,
    rounds: usize,
    count: usize,
    rng: &mut R,
) -> anyhow::Result<Vec<RecallReport>> {
    let mut network = train(memory, config).await?;
    let mut reports = Vec::with_capacity(count);
    for probe in 0..count {
        let seed = network.feed_random(rng)?;
        reports.push(settle(&mut network, memory, probe, seed, rounds).await?);
    }
    Ok(reports)
}

/// Store the memory and return the learned weight matrix.
pub async fn weights(memory: &Memory, config: &HopfieldConfig) -> anyhow::Result<Vec<Vec<f32>>> {
    Ok(train(memory, config).await?.weight_matrix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn memory() -> Memory {
        Memory::from_toml_str(
            r#"
            patterns = [[1, -1, 1, -1]]
            probes = [[1, -1, 1, -1], [1, -1, -1, -1]]
            "#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_recall_probes_recovers_stored_pattern() {
        let reports = recall_probes(&memory(), &HopfieldConfig::default(), 10)
            .await
            .unwrap();
        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert_eq!(report.potentials, vec![1.0, -1.0, 1.0, -1.0]);
            assert_eq!(report.recovered, Some(0));
            assert!(report.energy <= report.initial_energy);
        }
        assert_eq!(reports[1].seed, vec![1.0, -1.0, -1.0, -1.0]);
    }

    #[tokio::test]
    async fn test_recall_random_reports_each_seed() {
        let mut rng = StdRng::seed_from_u64(5);
        let reports = recall_random(&memory(), &HopfieldConfig::default(), 10, 3, &mut rng)
            .await
            .unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(
            reports.iter().map(|r| r.probe).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_random_seeds_match_direct_feed() {
        let memory = memory();
        let reports = recall_random(
            &memory,
            &HopfieldConfig::default(),
            10,
            2,
            &mut StdRng::seed_from_u64(11),
        )
        .await
        .unwrap();

        // Same draws, fed once each, settle the same way
        let mut network = train(&memory, &HopfieldConfig::default()).await.unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for report in &reports {
            let seed = network.feed_random(&mut rng).unwrap();
            assert_eq!(report.seed, seed);
            assert_eq!(report.initial_energy, network.energy_of(&seed).unwrap());
            network.run(10).await.unwrap();
            assert_eq!(report.potentials, network.potentials());
            assert_eq!(report.recovered, memory.matching(&report.potentials));
        }
    }

    #[tokio::test]
    async fn test_weights_match_outer_product() {
        let w = weights(&memory(), &HopfieldConfig::default()).await.unwrap();
        assert_eq!(w[0], vec![0.0, -1.0, 1.0, -1.0]);
        assert_eq!(w[3], vec![-1.0, 1.0, -1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_invalid_probe_is_reported() {
        let memory = Memory::from_toml_str("patterns = [[1, -1]]\nprobes = [[1, 0]]").unwrap();
        let err = recall_probes(&memory, &HopfieldConfig::default(), 5)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("not bipolar"));
    }

    #[test]
    fn test_report_serializes() {
        let report = RecallReport {
            probe: 0,
            seed: vec![1.0, -1.0],
            potentials: vec![1.0, -1.0],
            initial_energy: 1.0,
            energy: -1.0,
            recovered: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"recovered\":null"));
        assert!(json.contains("\"energy\":-1.0"));
    }
}
