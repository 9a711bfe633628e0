//! Concurrent construction-site simulation.
//!
//! One tokio task per (project, team) assignment. Every site reports its
//! progress through the shared [`MessageLogger`], estimates its project, and
//! meets the other sites at two checkpoints (after preparation and after
//! foundation work). At each checkpoint the last arrival logs a coordinator
//! `System` message before anyone moves on.
//!
//! A site that times out at a checkpoint withdraws its arrival and abandons
//! the checkpoint for everyone: sites already waiting are released without an
//! announcement, and every later checkpoint is skipped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use siteplan_core::{
    ConstructionTeam, EstimationEngine, EstimationError, EstimationResult, MessageType,
    ProjectDescriptor, ProjectError, Worker,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::messages::MessageLogger;

/// Source label used for checkpoint coordination messages.
pub const COORDINATOR: &str = "Coordinator";

const CHECKPOINT_REACHED: &str = "All teams reached checkpoint! Moving to next phase.";

// ----------------------------------------------------------------------------
// Checkpoint
// ----------------------------------------------------------------------------

/// How a site left a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPass {
    /// Every site arrived and the announcement was made.
    Passed,
    /// This site gave up waiting and abandoned the checkpoint.
    TimedOut,
    /// Another site timed out; this one moves on without waiting.
    Abandoned,
}

#[derive(Debug, Default)]
struct CheckpointState {
    arrived: usize,
    generation: u64,
    abandoned: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Release {
    generation: u64,
    abandoned: bool,
}

/// Reusable rendezvous for a fixed number of sites.
///
/// Arrivals are counted under a mutex. A waiter that times out takes its
/// arrival back before abandoning, so a partial group is never released as
/// if complete. Abandonment is permanent.
struct Checkpoint {
    sites: usize,
    state: Mutex<CheckpointState>,
    released: watch::Sender<Release>,
}

impl Checkpoint {
    fn new(sites: usize) -> Self {
        let (released, _) = watch::channel(Release::default());
        Self {
            sites,
            state: Mutex::new(CheckpointState::default()),
            released,
        }
    }

    /// Waits up to `timeout` for the other sites. The last arrival runs
    /// `announce` before anyone is released.
    async fn pass(&self, timeout: Duration, announce: impl FnOnce()) -> CheckpointPass {
        let (target, mut rx) = {
            let mut state = self.state.lock();
            if state.abandoned {
                return CheckpointPass::Abandoned;
            }
            state.arrived += 1;
            if state.arrived < self.sites {
                // Subscribed under the lock so the release cannot be missed.
                (state.generation + 1, self.released.subscribe())
            } else {
                state.arrived = 0;
                state.generation += 1;
                let generation = state.generation;
                drop(state);

                announce();
                self.released.send_modify(|r| r.generation = generation);
                return CheckpointPass::Passed;
            }
        };

        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|r| r.generation >= target || r.abandoned),
        )
        .await
        .map(|seen| seen.map(|release| *release));
        match waited {
            Ok(Ok(release)) => Self::outcome(release, target),
            Ok(Err(_)) => CheckpointPass::Abandoned,
            Err(_) => self.withdraw(target, &mut rx).await,
        }
    }

    async fn withdraw(&self, target: u64, rx: &mut watch::Receiver<Release>) -> CheckpointPass {
        {
            let mut state = self.state.lock();
            if state.generation < target {
                state.arrived -= 1;
                state.abandoned = true;
                drop(state);
                self.released.send_modify(|r| r.abandoned = true);
                return CheckpointPass::TimedOut;
            }
        }

        // The last site arrived just as the wait expired; its release is
        // already on the way.
        match rx.wait_for(|r| r.generation >= target).await {
            Ok(release) => Self::outcome(*release, target),
            Err(_) => CheckpointPass::Abandoned,
        }
    }

    fn outcome(release: Release, target: u64) -> CheckpointPass {
        if release.generation >= target {
            CheckpointPass::Passed
        } else {
            CheckpointPass::Abandoned
        }
    }
}

// ----------------------------------------------------------------------------
// Simulation
// ----------------------------------------------------------------------------

/// A project and the team assigned to build it.
#[derive(Debug, Clone)]
pub struct SiteAssignment {
    pub project: ProjectDescriptor,
    pub team: ConstructionTeam,
}

impl SiteAssignment {
    #[must_use]
    pub fn new(project: ProjectDescriptor, team: ConstructionTeam) -> Self {
        Self { project, team }
    }
}

/// What happened at one site.
#[derive(Debug, Clone)]
pub struct SiteOutcome {
    /// Site label, `Project-<n>` in assignment order starting at 1.
    pub label: String,
    pub project: ProjectDescriptor,
    pub result: Result<EstimationResult, EstimationError>,
    /// Sum of member salaries for the configured payroll hours.
    pub payroll: f64,
    /// Checkpoints this site passed before moving on. Lower than the number
    /// of checkpoints when one timed out.
    pub checkpoints_passed: usize,
}

impl SiteOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs site assignments concurrently.
#[derive(Clone)]
pub struct SiteSimulation {
    engine: Arc<EstimationEngine>,
    logger: Arc<MessageLogger>,
    config: SimulationConfig,
}

impl SiteSimulation {
    #[must_use]
    pub fn new(
        engine: Arc<EstimationEngine>,
        logger: Arc<MessageLogger>,
        config: SimulationConfig,
    ) -> Self {
        Self {
            engine,
            logger,
            config,
        }
    }

    /// Runs every assignment on its own task and returns the outcomes in
    /// assignment order. Estimation failures are logged and reported in the
    /// outcome, never raised.
    ///
    /// # Errors
    ///
    /// Returns an error only if a site task panics or is cancelled.
    pub async fn run(&self, assignments: Vec<SiteAssignment>) -> anyhow::Result<Vec<SiteOutcome>> {
        if assignments.is_empty() {
            return Ok(Vec::new());
        }

        let sites = assignments.len();
        info!(sites, "site simulation starting");
        let checkpoint = Arc::new(Checkpoint::new(sites));

        let handles: Vec<_> = assignments
            .into_iter()
            .enumerate()
            .map(|(i, assignment)| {
                let sim = self.clone();
                let checkpoint = Arc::clone(&checkpoint);
                let label = format!("Project-{}", i + 1);
                tokio::spawn(async move { sim.run_site(label, assignment, &checkpoint).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(sites);
        for handle in handles {
            outcomes.push(handle.await.context("site task failed")?);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(sites, succeeded, "site simulation finished");
        Ok(outcomes)
    }

    async fn run_site(
        &self,
        label: String,
        assignment: SiteAssignment,
        checkpoint: &Checkpoint,
    ) -> SiteOutcome {
        let SiteAssignment { project, team } = assignment;
        let log = |message_type: MessageType, text: &str| {
            self.logger.log_message(&label, message_type, text);
        };

        // Preparation.
        log(
            MessageType::Info,
            &format!("Starting work on project '{}'", project.name()),
        );
        self.pause().await;
        log(
            MessageType::Info,
            &format!("Team formed, member count: {}", team.size()),
        );
        log(
            MessageType::Info,
            &format!(
                "Project details: area {:.2} sqm, {} floors, material: {}",
                project.area(),
                project.floors(),
                project.material()
            ),
        );
        log(
            MessageType::System,
            "Preparation complete, waiting for other teams",
        );
        let mut checkpoints_passed =
            usize::from(self.checkpoint(checkpoint, &label).await == CheckpointPass::Passed);

        // Foundation and estimate.
        log(MessageType::Info, "Starting foundation work");
        self.pause().await;
        let result = self.engine.estimate(&project, &team);
        match &result {
            Ok(estimate) => {
                log(
                    MessageType::Info,
                    &format!(
                        "Estimate ready: cost ${:.2}, duration {} days",
                        estimate.estimated_cost(),
                        estimate.estimated_duration()
                    ),
                );
                if estimate.has_negative_duration() {
                    self.logger.log_warning(
                        &label,
                        "Team is large enough to produce a negative duration estimate",
                    );
                }
            }
            Err(e) => {
                self.logger
                    .log_error(&label, &format!("Estimation failed: {e}"));
            }
        }
        log(
            MessageType::System,
            "Foundation complete, waiting for other teams",
        );
        checkpoints_passed +=
            usize::from(self.checkpoint(checkpoint, &label).await == CheckpointPass::Passed);

        // Completion.
        if result.is_ok() {
            log(
                MessageType::Info,
                &format!("Project '{}' successfully completed!", project.name()),
            );
        } else {
            self.logger.log_warning(
                &label,
                &format!("Project '{}' halted pending review", project.name()),
            );
        }

        SiteOutcome {
            payroll: team.team_cost(self.config.payroll_hours),
            label,
            project,
            result,
            checkpoints_passed,
        }
    }

    /// Meets the other sites at `checkpoint` and logs how this site left it.
    async fn checkpoint(&self, checkpoint: &Checkpoint, label: &str) -> CheckpointPass {
        let pass = checkpoint
            .pass(self.config.checkpoint_timeout(), || {
                self.logger
                    .log_message(COORDINATOR, MessageType::System, CHECKPOINT_REACHED);
            })
            .await;
        match pass {
            CheckpointPass::Passed => {}
            CheckpointPass::TimedOut => {
                self.logger.log_error(
                    label,
                    &format!(
                        "Timeout exceeded after {} ms at checkpoint",
                        self.config.checkpoint_timeout_ms
                    ),
                );
            }
            CheckpointPass::Abandoned => {
                debug!(site = label, "checkpoint abandoned");
                self.logger.log_warning(
                    label,
                    "Checkpoint abandoned after another team timed out, continuing",
                );
            }
        }
        pass
    }

    async fn pause(&self) {
        let delay = self.config.phase_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// The three reference sites: a brick residential block, a concrete office
/// building, and a metal warehouse whose material has no cost coefficient.
///
/// Each team is a mason, a plumber (own tools on even-numbered teams), and a
/// certified electrician.
///
/// # Errors
///
/// Returns a [`ProjectError`] if a reference project fails validation.
pub fn reference_assignments() -> Result<Vec<SiteAssignment>, ProjectError> {
    let projects = [
        ProjectDescriptor::new("Residential Building", 200.0, 3, "brick")?,
        ProjectDescriptor::new("Office Building", 350.0, 5, "concrete")?,
        ProjectDescriptor::new("Warehouse", 500.0, 1, "metal")?,
    ];

    Ok(projects
        .into_iter()
        .enumerate()
        .map(|(i, project)| {
            let n = i * 3;
            let team: ConstructionTeam = [
                Worker::builder(format!("Builder-{}", n + 1), "mason", 45.0),
                Worker::plumber(format!("Plumber-{}", n + 2), i % 2 == 0, 40.0),
                Worker::electrician(format!("Electrician-{}", n + 3), 1000.0, 50.0),
            ]
            .into_iter()
            .collect();
            SiteAssignment::new(project, team)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MemorySink;

    fn quick_config() -> SimulationConfig {
        SimulationConfig {
            phase_delay_ms: 0,
            ..SimulationConfig::default()
        }
    }

    fn simulation(sink: &Arc<MemorySink>) -> SiteSimulation {
        SiteSimulation::new(
            Arc::new(EstimationEngine::new()),
            Arc::new(MessageLogger::with_sink(sink.clone())),
            quick_config(),
        )
    }

    #[test]
    fn reference_sites() {
        let sites = reference_assignments().unwrap();
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[2].project.material(), "metal");
        assert!(sites.iter().all(|s| s.team.size() == 3));
        assert_eq!(sites[1].team.members()[0].name, "Builder-4");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn runs_all_sites_in_order() {
        let sink = Arc::new(MemorySink::new());
        let sim = simulation(&sink);

        let outcomes = sim.run(reference_assignments().unwrap()).await.unwrap();

        let labels: Vec<&str> = outcomes.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Project-1", "Project-2", "Project-3"]);
        assert!(outcomes[0].is_success());
        assert!(outcomes[1].is_success());
        assert!(matches!(
            outcomes[2].result,
            Err(EstimationError::InvalidMaterial { .. })
        ));
        assert!(outcomes.iter().all(|o| o.checkpoints_passed == 2));

        // 350 sqm, 5 floors, concrete, 3 members.
        let office = outcomes[1].result.as_ref().unwrap();
        assert!((office.estimated_cost() - 7_850_000.0).abs() < 1e-6);
        assert!((office.estimated_duration() - 165.0).abs() < f64::EPSILON);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn coordinator_announces_each_checkpoint_once() {
        let sink = Arc::new(MemorySink::new());
        let sim = simulation(&sink);
        sim.run(reference_assignments().unwrap()).await.unwrap();

        let coordinator = sink.records_from(COORDINATOR);
        assert_eq!(coordinator.len(), 2);
        assert!(coordinator
            .iter()
            .all(|r| r.message_type == MessageType::System && r.text == CHECKPOINT_REACHED));

        // Nobody starts foundation work before the first announcement.
        let records = sink.records();
        let announced = coordinator[0].sequence;
        assert!(records
            .iter()
            .filter(|r| r.text == "Starting foundation work")
            .all(|r| r.sequence > announced));

        assert_eq!(sink.count_of(MessageType::Error), 1);
        let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
        let expected: Vec<u64> = (1..=u64::try_from(records.len()).unwrap()).collect();
        assert_eq!(sequences, expected);
    }

    #[tokio::test]
    async fn payroll_uses_configured_hours() {
        let sink = Arc::new(MemorySink::new());
        let sim = simulation(&sink);
        let site = reference_assignments().unwrap().remove(0);
        let expected = site.team.team_cost(160);

        let outcomes = sim.run(vec![site]).await.unwrap();
        assert!((outcomes[0].payroll - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_assignments_no_messages() {
        let sink = Arc::new(MemorySink::new());
        let outcomes = simulation(&sink).run(Vec::new()).await.unwrap();
        assert!(outcomes.is_empty());
        assert!(sink.is_empty());
    }

    fn short_timeout_simulation(sink: &Arc<MemorySink>) -> SiteSimulation {
        SiteSimulation::new(
            Arc::new(EstimationEngine::new()),
            Arc::new(MessageLogger::with_sink(sink.clone())),
            SimulationConfig {
                phase_delay_ms: 0,
                checkpoint_timeout_ms: 100,
                ..SimulationConfig::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn checkpoint_times_out_when_a_site_never_arrives() {
        let sink = Arc::new(MemorySink::new());
        let sim = simulation(&sink);
        let checkpoint = Checkpoint::new(2);

        assert_eq!(
            sim.checkpoint(&checkpoint, "Project-1").await,
            CheckpointPass::TimedOut
        );
        let errors = sink.records_from("Project-1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message_type, MessageType::Error);
        assert!(errors[0].text.contains("5000 ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn late_site_after_timeout_is_not_announced() {
        let sink = Arc::new(MemorySink::new());
        let sim = short_timeout_simulation(&sink);
        let checkpoint = Checkpoint::new(2);

        assert_eq!(
            sim.checkpoint(&checkpoint, "Project-1").await,
            CheckpointPass::TimedOut
        );
        assert_eq!(
            sim.checkpoint(&checkpoint, "Project-2").await,
            CheckpointPass::Abandoned
        );
        // The next checkpoint is skipped too, without waiting.
        let before = tokio::time::Instant::now();
        assert_eq!(
            sim.checkpoint(&checkpoint, "Project-1").await,
            CheckpointPass::Abandoned
        );
        assert_eq!(tokio::time::Instant::now(), before);

        assert!(sink.records_from(COORDINATOR).is_empty());
        assert_eq!(sink.count_of(MessageType::Error), 1);
        assert_eq!(sink.count_of(MessageType::Warning), 2);
        let late = sink.records_from("Project-2");
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].message_type, MessageType::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_releases_sites_already_waiting() {
        let checkpoint = Arc::new(Checkpoint::new(3));
        let announced = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let start = tokio::time::Instant::now();

        let patient = {
            let checkpoint = Arc::clone(&checkpoint);
            let announced = Arc::clone(&announced);
            tokio::spawn(async move {
                let pass = checkpoint
                    .pass(Duration::from_secs(60), || {
                        announced.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    })
                    .await;
                (pass, tokio::time::Instant::now())
            })
        };
        tokio::task::yield_now().await;

        let impatient = checkpoint
            .pass(Duration::from_millis(100), || {
                announced.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })
            .await;
        assert_eq!(impatient, CheckpointPass::TimedOut);

        let (pass, finished) = patient.await.unwrap();
        assert_eq!(pass, CheckpointPass::Abandoned);
        assert!(finished - start < Duration::from_secs(60));
        assert_eq!(announced.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn checkpoint_is_reusable_across_rounds() {
        let checkpoint = Arc::new(Checkpoint::new(2));
        let announced = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let checkpoint = Arc::clone(&checkpoint);
                let announced = Arc::clone(&announced);
                tokio::spawn(async move {
                    let mut passes = Vec::new();
                    for _ in 0..3 {
                        let announced = Arc::clone(&announced);
                        passes.push(
                            checkpoint
                                .pass(Duration::from_secs(1), move || {
                                    announced.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                                })
                                .await,
                        );
                    }
                    passes
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), vec![CheckpointPass::Passed; 3]);
        }
        assert_eq!(announced.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
