//! Predefined end-to-end scenarios for the leader-election protocol,
//! covering the concrete runs and boundary behaviors named in §8.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::cluster::Cluster;
use crate::fault_injection::FaultProfile;
use crate::metrics::{parse_role_events, RunSummary};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Everything needed to spawn and judge one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub name: String,
    pub description: String,
    pub nodes: usize,
    pub min_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub fail_chance: f64,
    pub message_loss_rate: f64,
    pub kill_node: Option<usize>,
    pub kill_after_ms: u64,
    pub run_for_ms: u64,
}

impl ScenarioConfig {
    fn new(name: &str, description: &str, nodes: usize, min: u64, max: u64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            nodes,
            min_timeout_ms: min,
            max_timeout_ms: max,
            fail_chance: 0.0,
            message_loss_rate: 0.0,
            kill_node: None,
            kill_after_ms: 0,
            run_for_ms: 5_000,
        }
    }

    fn with_fault(mut self, profile: FaultProfile) -> Self {
        self.message_loss_rate = profile.message_loss_rate;
        self.kill_node = profile.kill_node;
        self.kill_after_ms = profile.kill_after_ms;
        self
    }
}

pub fn get_scenario(name: &str) -> Result<ScenarioConfig, ScenarioError> {
    match name.to_lowercase().as_str() {
        "s1" | "happy" => Ok(ScenarioConfig::new(
            "s1",
            "happy path: 3 nodes, no faults, one leader within 5s",
            3,
            150,
            300,
        )),
        "s2" | "leader-crash" => Ok(ScenarioConfig::new(
            "s2",
            "leader failure: 5 nodes, kill the leader after it stabilizes",
            5,
            150,
            300,
        )
        .with_fault(FaultProfile::leader_crash(1_000))),
        "s3" | "split-vote" => Ok(ScenarioConfig::new(
            "s3",
            "split-vote recovery: 4 nodes, narrow timeout range forces splits",
            4,
            150,
            155,
        )),
        "b1" | "single-node" => Ok(ScenarioConfig::new("b1", "N=1 elects itself", 1, 150, 300)),
        "b2" | "two-node-one-dead" => Ok(ScenarioConfig::new(
            "b2",
            "N=2, one dead: survivor oscillates candidate forever",
            2,
            150,
            300,
        )
        .with_fault(FaultProfile {
            message_loss_rate: 0.0,
            kill_node: Some(1),
            kill_after_ms: 0,
        })),
        "b3" | "tied-timeouts" => {
            let mut cfg = ScenarioConfig::new(
                "b3",
                "min == max timeout: simultaneous timeouts, repeated split votes",
                4,
                200,
                200,
            );
            cfg.run_for_ms = 3_000;
            Ok(cfg)
        }
        other => Err(ScenarioError::UnknownScenario(other.to_string())),
    }
}

pub fn list_scenarios() -> Vec<&'static str> {
    vec!["s1", "s2", "s3", "b1", "b2", "b3"]
}

/// Outcome of one scenario run, judged against the run summary.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub scenario: String,
    pub summary: RunSummary,
    pub passed: bool,
    pub failure_reason: Option<String>,
}

/// Spawns the cluster described by `config`, lets it run for
/// `config.run_for_ms`, applies the configured fault partway through, then
/// parses every node's log and judges the outcome.
pub async fn run_scenario(
    config: &ScenarioConfig,
    output_dir: &Path,
    seed: u64,
) -> Result<ScenarioResult, ScenarioError> {
    let log_dir = output_dir.join(&config.name);
    let mut cluster = Cluster::spawn(
        config.nodes,
        config.min_timeout_ms,
        config.max_timeout_ms,
        config.fail_chance,
        config.message_loss_rate,
        seed,
        &log_dir,
    )?;

    if let Some(rank) = config.kill_node {
        tokio::time::sleep(Duration::from_millis(config.kill_after_ms)).await;
        info!("scenario {}: killing node {}", config.name, rank);
        cluster.kill_node(rank);
    }

    let remaining = config.run_for_ms.saturating_sub(config.kill_after_ms);
    tokio::time::sleep(Duration::from_millis(remaining)).await;
    cluster.shutdown();

    let events = parse_role_events(&log_dir, config.nodes)?;
    let summary = RunSummary::from_events(&events);

    let (passed, failure_reason) = judge(config, &summary);

    Ok(ScenarioResult {
        scenario: config.name.clone(),
        summary,
        passed,
        failure_reason,
    })
}

fn judge(config: &ScenarioConfig, summary: &RunSummary) -> (bool, Option<String>) {
    if !summary.at_most_one_leader_per_term() {
        return (false, Some("P1 violated: split leadership in one term".to_string()));
    }

    match config.name.as_str() {
        "s1" | "b1" => {
            if summary.leader_elections.is_empty() {
                (false, Some("no leader elected".to_string()))
            } else {
                (true, None)
            }
        }
        "s2" => {
            if summary.leader_elections.len() < 2 {
                (false, Some("no re-election after leader crash".to_string()))
            } else {
                (true, None)
            }
        }
        "s3" => {
            if summary.candidate_rounds < 2 || summary.leader_elections.is_empty() {
                (false, Some("expected multiple candidate rounds before a leader emerged".to_string()))
            } else {
                (true, None)
            }
        }
        "b2" | "b3" => {
            // Fragility is expected here (spec.md B2/B3): these never fail
            // the suite on their own account, only on a P1 violation above.
            (true, None)
        }
        _ => (true, None),
    }
}

/// Outcome of the whole suite.
#[derive(Debug, Clone)]
pub struct SuiteResults {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResults {
    pub fn to_junit_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuite name=\"raft leader election\" tests=\"{}\" failures=\"{}\" errors=\"0\">\n",
            self.total, self.failed
        ));

        for result in &self.results {
            xml.push_str(&format!("  <testcase name=\"{}\"", result.scenario));
            if result.passed {
                xml.push_str(" />\n");
            } else {
                xml.push_str(">\n");
                let msg = result.failure_reason.clone().unwrap_or_else(|| "unknown failure".to_string());
                xml.push_str(&format!("    <failure message=\"{}\"/>\n", msg));
                xml.push_str("  </testcase>\n");
            }
        }

        xml.push_str("</testsuite>\n");
        xml
    }
}

pub async fn run_suite(output_dir: &Path, seed: u64) -> Result<SuiteResults, ScenarioError> {
    std::fs::create_dir_all(output_dir)?;

    let mut results = Vec::new();
    let mut passed = 0;
    let mut failed = 0;

    for name in list_scenarios() {
        info!("running scenario: {}", name);
        let config = get_scenario(name)?;
        let result = run_scenario(&config, output_dir, seed).await?;

        if result.passed {
            info!("scenario {} passed", name);
            passed += 1;
        } else {
            info!("scenario {} failed: {:?}", name, result.failure_reason);
            failed += 1;
        }
        results.push(result);
    }

    Ok(SuiteResults {
        total: results.len(),
        passed,
        failed,
        results,
    })
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("./results")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_scenarios() {
        for name in list_scenarios() {
            assert!(get_scenario(name).is_ok());
        }
    }

    #[test]
    fn rejects_unknown_scenario() {
        assert!(matches!(
            get_scenario("nonexistent"),
            Err(ScenarioError::UnknownScenario(_))
        ));
    }

    #[test]
    fn s3_has_narrow_timeout_range_to_force_splits() {
        let s3 = get_scenario("s3").unwrap();
        assert_eq!(s3.max_timeout_ms - s3.min_timeout_ms, 5);
    }

    #[test]
    fn b3_has_equal_min_and_max_timeout() {
        let b3 = get_scenario("b3").unwrap();
        assert_eq!(b3.min_timeout_ms, b3.max_timeout_ms);
    }

    #[tokio::test]
    async fn s1_happy_path_elects_a_single_leader() {
        // spec.md S1: within 5 seconds, exactly one node logs "leader".
        let dir = tempfile::tempdir().unwrap();
        let config = get_scenario("s1").unwrap();

        let result = run_scenario(&config, dir.path(), 1).await.unwrap();

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.summary.leader_elections.len(), 1);
    }

    #[tokio::test]
    async fn s2_elects_a_new_leader_after_the_leader_is_killed() {
        // Drives `Cluster::spawn` directly rather than `run_scenario` with
        // the canned "s2" fault profile: that profile always kills rank 0,
        // but which rank actually wins the first election depends on the
        // per-rank random timeout draw, so this kills whichever rank the
        // logs show really did stabilize as leader.
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("s2");
        let config = get_scenario("s2").unwrap();
        let mut cluster = Cluster::spawn(
            config.nodes,
            config.min_timeout_ms,
            config.max_timeout_ms,
            config.fail_chance,
            config.message_loss_rate,
            1,
            &log_dir,
        )
        .unwrap();

        // Let the cluster stabilize on a leader well within spec.md S1's
        // own 5-second bound before killing it.
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        let before = RunSummary::from_events(&parse_role_events(&log_dir, config.nodes).unwrap());
        let (leader_rank, leader_term) = *before
            .leader_elections
            .first()
            .expect("a leader should have stabilized within 2s");

        cluster.kill_node(leader_rank);

        // spec.md S2: re-election within max_timeout + BROADCAST_INTERVAL_MS
        // (300 + 1000 = 1300ms) of the kill; wait comfortably longer.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        cluster.shutdown();

        let summary = RunSummary::from_events(&parse_role_events(&log_dir, config.nodes).unwrap());

        assert!(summary.at_most_one_leader_per_term());
        assert!(
            summary.leader_elections.len() >= 2,
            "expected a re-election after killing the leader, got {:?}",
            summary.leader_elections
        );
        assert!(summary.leader_elections[1].1 > leader_term);
    }

    #[tokio::test]
    async fn s3_split_vote_recovery_eventually_elects_a_leader() {
        let dir = tempfile::tempdir().unwrap();
        let config = get_scenario("s3").unwrap();

        let result = run_scenario(&config, dir.path(), 1).await.unwrap();

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.summary.candidate_rounds >= 2);
        assert!(!result.summary.leader_elections.is_empty());
    }

    #[tokio::test]
    async fn b1_single_node_cluster_elects_itself() {
        let dir = tempfile::tempdir().unwrap();
        let config = get_scenario("b1").unwrap();

        let result = run_scenario(&config, dir.path(), 1).await.unwrap();

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.summary.leader_elections, vec![(0, 1)]);
    }

    #[tokio::test]
    async fn b2_two_node_cluster_with_one_dead_never_elects_a_leader() {
        let dir = tempfile::tempdir().unwrap();
        let config = get_scenario("b2").unwrap();

        let result = run_scenario(&config, dir.path(), 1).await.unwrap();

        // Fragility is expected (spec.md B2): the survivor oscillates
        // Candidate -> Candidate forever without a peer to grant it a vote.
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.summary.leader_elections.is_empty());
        assert!(result.summary.candidate_rounds >= 1);
    }

    #[test]
    fn junit_xml_reports_failures() {
        let results = SuiteResults {
            total: 1,
            passed: 0,
            failed: 1,
            results: vec![ScenarioResult {
                scenario: "s1".to_string(),
                summary: RunSummary::from_events(&[]),
                passed: false,
                failure_reason: Some("no leader elected".to_string()),
            }],
        };
        let xml = results.to_junit_xml();
        assert!(xml.contains("failures=\"1\""));
        assert!(xml.contains("no leader elected"));
    }
}
