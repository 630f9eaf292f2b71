// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Pipeline executor
//!
//! Drives every admitted identity through the graph to one terminal outcome.
//! Units (one stage or one gate for one identity) are spawned onto a
//! `JoinSet` as soon as their inputs exist and run under a semaphore. The
//! event loop in `run` exclusively owns the joiners and per-identity state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::{summarize, Cache, Fingerprint};
use crate::errors::{GplError, GplResult, RecoverySuggestion};
use crate::executors::ToolRunner;
use crate::gate::{ContentGate, GateDecision, GateKind};
use crate::join::{InterleaveJoiner, JoinError, JoinTarget, StrictJoiner};
use crate::model::{
    ArtifactRef, FailureCause, FailurePoint, InvocationStatus, Outcome, SampleIdentity, StageInvocation,
    StatusRecord,
};
use crate::pipeline::samples::{AdmittedSample, SampleEntry, SampleSheet};
use crate::pipeline::stage_executor::{StageExecutor, StageFailure};
use crate::pipeline::status::StatusLog;
use crate::pipeline::{CacheInvalidation, Node, PipelineGraph, Port, RunConfig};
use crate::stages::{
    self, AlignmentPair, PurpleInputs, PurpleSlot, ReportInputs, ReportSlot, StageInputs, StageKind, StageOutput,
};

/// Pipeline execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Skip cache lookups and stores
    pub no_cache: bool,
    /// Only show what would be done
    pub dry_run: bool,
}

/// Progress notifications emitted while a run is in flight
#[derive(Debug, Clone)]
pub enum RunEvent {
    Entered {
        identity: SampleIdentity,
    },
    Invocation {
        identity: SampleIdentity,
        stage: StageKind,
        status: InvocationStatus,
    },
    Gate {
        identity: SampleIdentity,
        gate: GateKind,
        passed: bool,
    },
    Finished {
        identity: SampleIdentity,
        outcome: Outcome,
    },
}

type EventHandler = Arc<dyn Fn(&RunEvent) + Send + Sync>;

/// A sheet entry whose names could not form an identity
#[derive(Debug, Clone)]
pub struct RejectedSample {
    pub name: String,
    pub reason: String,
}

/// Everything that happened to one identity
#[derive(Debug, Clone)]
pub struct IdentityReport {
    pub identity: SampleIdentity,
    pub outcome: Outcome,
    /// Finished invocations, in completion order
    pub invocations: Vec<StageInvocation>,
    pub gates: Vec<GateDecision>,
}

impl IdentityReport {
    /// The invocation of `stage`, if one was created
    pub fn invocation(&self, stage: StageKind) -> Option<&StageInvocation> {
        self.invocations.iter().find(|i| i.stage == stage)
    }

    /// Re-submission steps for a failed identity
    pub fn recovery(&self) -> Option<RecoverySuggestion> {
        match &self.outcome {
            Outcome::Failed {
                point,
                cause,
                fingerprint,
            } => Some(RecoverySuggestion::for_failure(
                &self.identity,
                point,
                cause,
                fingerprint.as_ref(),
            )),
            _ => None,
        }
    }
}

/// Result of a run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One report per identity, ordered by identity
    pub identities: Vec<IdentityReport>,
    pub rejected: Vec<RejectedSample>,
    /// External processes started during the run
    pub launched: usize,
    pub duration: Duration,
    /// Execution plan, for dry runs
    pub plan: Option<String>,
}

impl RunSummary {
    pub fn get(&self, identity: &SampleIdentity) -> Option<&IdentityReport> {
        self.identities.iter().find(|r| &r.identity == identity)
    }

    pub fn reported(&self) -> usize {
        self.identities.iter().filter(|r| r.outcome.is_reported()).count()
    }

    pub fn halted(&self) -> usize {
        self.identities
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::HaltedAtGate { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.identities.iter().filter(|r| r.outcome.is_failed()).count()
    }

    /// No identity failed and every entry was admitted
    pub fn success(&self) -> bool {
        self.failed() == 0 && self.rejected.is_empty()
    }
}

/// Pipeline executor
pub struct PipelineExecutor {
    config: Arc<RunConfig>,
    runner: Arc<dyn ToolRunner>,
    cache: Option<Arc<RwLock<Box<dyn Cache>>>>,
    graph: PipelineGraph,
    events: Option<EventHandler>,
}

impl PipelineExecutor {
    /// Create an executor running tools through `runner`
    pub fn new(config: RunConfig, runner: Arc<dyn ToolRunner>) -> GplResult<Self> {
        Ok(Self {
            config: Arc::new(config),
            runner,
            cache: None,
            graph: PipelineGraph::build()?,
            events: None,
        })
    }

    /// Set the cache layer
    pub fn with_cache(mut self, cache: Box<dyn Cache>) -> Self {
        self.cache = Some(Arc::new(RwLock::new(cache)));
        self
    }

    /// Receive run events, e.g. to drive a progress bar
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.events = Some(Arc::new(handler));
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Programs and jars the run needs but cannot find
    pub async fn check_tools(&self) -> GplResult<Vec<String>> {
        let mut missing = Vec::new();

        for (name, program) in self.config.tools.programs() {
            if name == "gridss_annotate" && !self.config.options.annotate_gridss_calls {
                continue;
            }
            if !self.runner.check_available(&program.to_string_lossy()).await? {
                missing.push(format!("{} ({})", name, program.display()));
            }
        }

        for (name, jar) in self.config.tools.jars() {
            if !jar.is_file() {
                missing.push(format!("{} ({})", name, jar.display()));
            }
        }

        Ok(missing)
    }

    /// Run every sample in the sheet to a terminal outcome
    pub async fn run(&self, sheet: &SampleSheet, options: &ExecutionOptions) -> GplResult<RunSummary> {
        let start = Instant::now();

        if options.dry_run {
            let config = self.config.clone();
            let sheet = sheet.clone();
            let plan = tokio::task::spawn_blocking(move || dry_run_plan(&config, &sheet)).await?;
            return Ok(RunSummary {
                plan: Some(plan),
                duration: start.elapsed(),
                ..Default::default()
            });
        }

        let mut stage_executor = StageExecutor::new(self.config.clone(), self.runner.clone());
        if !options.no_cache {
            if let Some(ref cache) = self.cache {
                stage_executor = stage_executor.with_cache(cache.clone());
            }
        }
        let stage_executor = Arc::new(stage_executor);

        let mut scheduler = Scheduler::new(
            &self.graph,
            self.config.clone(),
            stage_executor.clone(),
            self.events.clone(),
        );
        info!("Starting run over {} sample(s)", sheet.len());
        scheduler.drive(sheet).await?;

        let duration = start.elapsed();
        let summary = RunSummary {
            identities: scheduler.take_reports(),
            rejected: std::mem::take(&mut scheduler.rejected),
            launched: stage_executor.launches(),
            duration,
            plan: None,
        };

        Ok(summary)
    }
}

/// What a finished unit hands back to the event loop
enum UnitResult {
    Admitted {
        identity: SampleIdentity,
        result: GplResult<AdmittedSample>,
    },
    Stage {
        identity: SampleIdentity,
        stage: StageKind,
        result: Result<StageInvocation, StageFailure>,
    },
    Gate {
        identity: SampleIdentity,
        gate: GateKind,
        output: StageOutput,
        decision: GplResult<GateDecision>,
    },
}

#[derive(Default)]
struct IdentityState {
    /// Auxiliary SV calls for the merge stage
    auxiliary_sv: Option<ArtifactRef>,
    /// Sheet entries for this identity still being admitted
    outstanding_admissions: usize,
    /// Success outcome held back until every admission has returned
    deferred: Option<Outcome>,
    outcome: Option<Outcome>,
    invocations: Vec<StageInvocation>,
    gates: Vec<GateDecision>,
}

impl IdentityState {
    fn is_open(&self) -> bool {
        self.outcome.is_none() && self.deferred.is_none()
    }
}

struct Scheduler<'a> {
    graph: &'a PipelineGraph,
    config: Arc<RunConfig>,
    stages: Arc<StageExecutor>,
    semaphore: Arc<Semaphore>,
    status: StatusLog,
    events: Option<EventHandler>,
    tasks: JoinSet<UnitResult>,
    alignments: InterleaveJoiner<SampleIdentity, ArtifactRef>,
    purple: StrictJoiner<SampleIdentity, PurpleSlot, StageOutput>,
    report: StrictJoiner<SampleIdentity, ReportSlot, StageOutput>,
    identities: BTreeMap<SampleIdentity, IdentityState>,
    rejected: Vec<RejectedSample>,
}

impl<'a> Scheduler<'a> {
    fn new(
        graph: &'a PipelineGraph,
        config: Arc<RunConfig>,
        stages: Arc<StageExecutor>,
        events: Option<EventHandler>,
    ) -> Self {
        Self {
            graph,
            semaphore: Arc::new(Semaphore::new(config.resources.max_parallel.max(1))),
            status: StatusLog::new(config.status_log_path()),
            config,
            stages,
            events,
            tasks: JoinSet::new(),
            alignments: InterleaveJoiner::new(JoinTarget::Alignments, AlignmentPair::ARITY),
            purple: StrictJoiner::new(JoinTarget::PurpleInputs),
            report: StrictJoiner::new(JoinTarget::ReportInputs),
            identities: BTreeMap::new(),
            rejected: Vec::new(),
        }
    }

    /// Admit every entry and run the event loop until all units are done
    async fn drive(&mut self, sheet: &SampleSheet) -> GplResult<()> {
        for entry in &sheet.samples {
            self.enter(entry.clone());
        }

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(result) => self.handle(result).await?,
                // Units catch their own panics, so only cancellation lands here
                Err(e) => error!("A unit task was lost: {}", e),
            }
        }
        self.settle().await
    }

    /// Keys still holding partial or sealed join state
    fn join_state_len(&self) -> usize {
        self.alignments.pending_len()
            + self.alignments.sealed_len()
            + self.purple.pending_len()
            + self.purple.sealed_len()
            + self.report.pending_len()
            + self.report.sealed_len()
    }

    fn emit(&self, event: RunEvent) {
        if let Some(handler) = &self.events {
            handler(&event);
        }
    }

    fn is_open(&self, identity: &SampleIdentity) -> bool {
        self.identities.get(identity).is_some_and(IdentityState::is_open)
    }

    /// Accept a sheet entry and start its admission
    fn enter(&mut self, entry: SampleEntry) {
        let identity = match entry.identity() {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Rejecting sample {}__{}: {}", entry.tumour_name, entry.normal_name, e);
                self.rejected.push(RejectedSample {
                    name: format!("{}__{}", entry.tumour_name, entry.normal_name),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let state = self.identities.entry(identity.clone()).or_default();
        state.outstanding_admissions += 1;
        if state.outstanding_admissions == 1 {
            self.emit(RunEvent::Entered {
                identity: identity.clone(),
            });
        }

        let max_scan_bytes = self.config.gate.max_scan_bytes;
        let strategy = self.config.cache.invalidation;
        self.tasks.spawn(async move {
            let result = tokio::task::spawn_blocking(move || admit(&entry, max_scan_bytes, strategy))
                .await
                .map_err(GplError::from)
                .and_then(|admitted| admitted);
            UnitResult::Admitted { identity, result }
        });
    }

    async fn handle(&mut self, result: UnitResult) -> GplResult<()> {
        match result {
            UnitResult::Admitted { identity, result } => self.on_admitted(identity, result).await,
            UnitResult::Stage {
                identity,
                stage,
                result,
            } => self.on_stage(identity, stage, result).await,
            UnitResult::Gate {
                identity,
                gate,
                output,
                decision,
            } => self.on_gate(identity, gate, output, decision).await,
        }
    }

    async fn on_admitted(&mut self, identity: SampleIdentity, result: GplResult<AdmittedSample>) -> GplResult<()> {
        let Some(state) = self.identities.get_mut(&identity) else {
            return Ok(());
        };
        state.outstanding_admissions = state.outstanding_admissions.saturating_sub(1);
        if state.outcome.is_some() {
            debug!("Ignoring late admission for finished {}", identity);
            return Ok(());
        }

        let admitted = match result {
            Ok(admitted) => admitted,
            Err(e) => {
                return self
                    .fail(
                        &identity,
                        FailurePoint::Admission,
                        FailureCause::InvalidInput {
                            message: e.to_string(),
                        },
                        None,
                    )
                    .await;
            }
        };
        state.auxiliary_sv = Some(admitted.structural_variants.clone());
        info!("{}: admitted", identity);

        for (target, port) in self.graph.outgoing(Node::Entry) {
            if self.finished(&identity) {
                break;
            }
            match (target, port) {
                (Node::Join(JoinTarget::Alignments), Port::Alignments) => {
                    let fragments = admitted.alignments.clone().into_fragments();
                    for (position, fragment) in fragments.into_iter().enumerate() {
                        match self.alignments.offer(identity.clone(), position, fragment) {
                            Ok(None) => {}
                            Ok(Some(tuple)) => match AlignmentPair::try_from(tuple) {
                                Ok(pair) => self.fan_out(&identity, target, StageInputs::Alignments(pair)),
                                Err(e) => {
                                    return self
                                        .fail(&identity, FailurePoint::Join { target: JoinTarget::Alignments }, internal(e), None)
                                        .await
                                }
                            },
                            Err(e) => return self.join_failed(&identity, JoinTarget::Alignments, e).await,
                        }
                    }
                }
                (Node::Join(JoinTarget::PurpleInputs), Port::Purple(slot)) => {
                    let small_variants = StageOutput::SmallVariants {
                        vcf: admitted.small_variants.clone(),
                    };
                    self.offer_purple(&identity, slot, small_variants).await?;
                }
                (target, port) => {
                    return self.unroutable(&identity, Node::Entry, target, port).await;
                }
            }
        }

        self.release_deferred(&identity).await
    }

    async fn on_stage(
        &mut self,
        identity: SampleIdentity,
        stage: StageKind,
        result: Result<StageInvocation, StageFailure>,
    ) -> GplResult<()> {
        if !self.is_open(&identity) {
            debug!("Ignoring {} result for closed {}", stage, identity);
            return Ok(());
        }

        match result {
            Ok(invocation) => {
                self.record(&invocation).await?;
                match invocation.outputs {
                    Some(output) => self.deliver(&identity, Node::Stage(stage), output).await,
                    None => {
                        self.fail(
                            &identity,
                            FailurePoint::Stage { stage },
                            internal("stage finished without outputs"),
                            invocation.fingerprint,
                        )
                        .await
                    }
                }
            }
            Err(StageFailure { invocation, cause }) => {
                self.record(&invocation).await?;
                self.fail(&identity, FailurePoint::Stage { stage }, cause, invocation.fingerprint)
                    .await
            }
        }
    }

    async fn on_gate(
        &mut self,
        identity: SampleIdentity,
        gate: GateKind,
        output: StageOutput,
        decision: GplResult<GateDecision>,
    ) -> GplResult<()> {
        if !self.is_open(&identity) {
            debug!("Ignoring gate {} for closed {}", gate, identity);
            return Ok(());
        }

        let decision = match decision {
            Ok(decision) => decision,
            Err(e) => {
                return self
                    .fail(
                        &identity,
                        FailurePoint::Gate { gate },
                        FailureCause::GateError {
                            message: e.to_string(),
                        },
                        None,
                    )
                    .await;
            }
        };

        let passed = decision.passed;
        if let Some(state) = self.identities.get_mut(&identity) {
            state.gates.push(decision);
        }
        self.emit(RunEvent::Gate {
            identity: identity.clone(),
            gate,
            passed,
        });

        if passed {
            info!("{}: passed gate {}", identity, gate);
            self.deliver(&identity, Node::Gate(gate), output).await
        } else {
            warn!("{}: halted at gate {}: {}", identity, gate, gate.halt_reason());
            self.complete(&identity, Outcome::HaltedAtGate { gate }).await
        }
    }

    /// Route a node's payload along its outgoing edges
    async fn deliver(&mut self, identity: &SampleIdentity, from: Node, output: StageOutput) -> GplResult<()> {
        for (target, port) in self.graph.outgoing(from) {
            if !self.is_open(identity) {
                break;
            }

            match (target, port) {
                (Node::Stage(stage), Port::Forward) => {
                    let auxiliary = self
                        .identities
                        .get(identity)
                        .and_then(|s| s.auxiliary_sv.clone())
                        .unwrap_or_else(ArtifactRef::no_file);
                    match forward_inputs(stage, &output, &auxiliary) {
                        Ok(inputs) => self.spawn_stage(identity.clone(), stage, inputs),
                        Err(e) => {
                            return self
                                .fail(identity, FailurePoint::Stage { stage }, internal(e), None)
                                .await
                        }
                    }
                }
                (Node::Gate(gate), Port::Forward) => self.spawn_gate(identity.clone(), gate, output.clone()),
                (Node::Join(JoinTarget::PurpleInputs), Port::Purple(slot)) => {
                    self.offer_purple(identity, slot, output.clone()).await?
                }
                (Node::Join(JoinTarget::ReportInputs), Port::Report(slot)) => {
                    self.offer_report(identity, slot, output.clone()).await?
                }
                (Node::Terminal, _) => {
                    let report = output.primary().clone();
                    info!("{}: report written to {}", identity, report);
                    self.complete(identity, Outcome::Reported { report }).await?
                }
                (target, port) => return self.unroutable(identity, from, target, port).await,
            }
        }

        Ok(())
    }

    async fn offer_purple(&mut self, identity: &SampleIdentity, slot: PurpleSlot, output: StageOutput) -> GplResult<()> {
        let target = JoinTarget::PurpleInputs;
        match self.purple.offer(identity.clone(), slot, output) {
            Ok(None) => Ok(()),
            Ok(Some(joined)) => match PurpleInputs::try_from(joined) {
                Ok(inputs) => {
                    self.fan_out(identity, Node::Join(target), StageInputs::Purple(inputs));
                    Ok(())
                }
                Err(e) => self.fail(identity, FailurePoint::Join { target }, internal(e), None).await,
            },
            Err(e) => self.join_failed(identity, target, e).await,
        }
    }

    async fn offer_report(&mut self, identity: &SampleIdentity, slot: ReportSlot, output: StageOutput) -> GplResult<()> {
        let target = JoinTarget::ReportInputs;
        match self.report.offer(identity.clone(), slot, output) {
            Ok(None) => Ok(()),
            Ok(Some(joined)) => match ReportInputs::try_from(joined) {
                Ok(inputs) => {
                    self.fan_out(identity, Node::Join(target), StageInputs::Report(inputs));
                    Ok(())
                }
                Err(e) => self.fail(identity, FailurePoint::Join { target }, internal(e), None).await,
            },
            Err(e) => self.join_failed(identity, target, e).await,
        }
    }

    /// Start every stage fed by a completed join
    fn fan_out(&mut self, identity: &SampleIdentity, join: Node, inputs: StageInputs) {
        for (target, _) in self.graph.outgoing(join) {
            if let Node::Stage(stage) = target {
                self.spawn_stage(identity.clone(), stage, inputs.clone());
            }
        }
    }

    fn spawn_stage(&mut self, identity: SampleIdentity, stage: StageKind, inputs: StageInputs) {
        let executor = self.stages.clone();
        let semaphore = self.semaphore.clone();

        self.tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let unit_identity = identity.clone();
            // A panicking stage must still be attributed to its identity
            let handle = tokio::spawn(async move { executor.execute(&unit_identity, stage, &inputs).await });
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(StageFailure::internal(
                    StageInvocation::new(identity.clone(), stage),
                    e,
                )),
            };
            UnitResult::Stage {
                identity,
                stage,
                result,
            }
        });
    }

    fn spawn_gate(&mut self, identity: SampleIdentity, gate: GateKind, output: StageOutput) {
        let semaphore = self.semaphore.clone();
        let evaluator = ContentGate::new(gate, self.config.gate.max_scan_bytes);

        self.tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let artifact = output.primary().clone();
            let gate_identity = identity.clone();
            let decision = tokio::task::spawn_blocking(move || evaluator.evaluate(&gate_identity, &artifact))
                .await
                .map_err(GplError::from)
                .and_then(|decision| decision);
            UnitResult::Gate {
                identity,
                gate,
                output,
                decision,
            }
        });
    }

    /// Log a finished invocation
    async fn record(&mut self, invocation: &StageInvocation) -> GplResult<()> {
        self.status
            .append(&StatusRecord::Invocation {
                timestamp: SystemTime::now(),
                identity: invocation.identity.clone(),
                stage: invocation.stage,
                status: invocation.status(),
                fingerprint: invocation.fingerprint.clone(),
                duration_ms: invocation.duration_ms,
            })
            .await?;

        self.emit(RunEvent::Invocation {
            identity: invocation.identity.clone(),
            stage: invocation.stage,
            status: invocation.status(),
        });

        if let Some(state) = self.identities.get_mut(&invocation.identity) {
            state.invocations.push(invocation.clone());
        }
        Ok(())
    }

    async fn join_failed(&mut self, identity: &SampleIdentity, target: JoinTarget, error: JoinError) -> GplResult<()> {
        let cause = match error {
            JoinError::DuplicateEmission { slot, .. } => FailureCause::DuplicateEmission { slot },
            other => internal(other),
        };
        self.fail(identity, FailurePoint::Join { target }, cause, None).await
    }

    async fn unroutable(&mut self, identity: &SampleIdentity, from: Node, to: Node, port: Port) -> GplResult<()> {
        let point = match from {
            Node::Entry => FailurePoint::Admission,
            Node::Join(target) => FailurePoint::Join { target },
            Node::Stage(stage) => FailurePoint::Stage { stage },
            Node::Gate(gate) => FailurePoint::Gate { gate },
            Node::Terminal => FailurePoint::Stage {
                stage: StageKind::Report,
            },
        };
        let message = format!("no route from {} to {} ({:?})", from, to, port);
        self.fail(identity, point, internal(message), None).await
    }

    async fn fail(
        &mut self,
        identity: &SampleIdentity,
        point: FailurePoint,
        cause: FailureCause,
        fingerprint: Option<Fingerprint>,
    ) -> GplResult<()> {
        warn!("{}: failed at {}: {}", identity, point, cause);
        self.finish(
            identity,
            Outcome::Failed {
                point,
                cause,
                fingerprint,
            },
        )
        .await
    }

    /// Reach a success outcome, unless a duplicate entry may still arrive
    async fn complete(&mut self, identity: &SampleIdentity, outcome: Outcome) -> GplResult<()> {
        match self.identities.get_mut(identity) {
            Some(state) if state.outstanding_admissions > 0 => {
                state.deferred = Some(outcome);
                Ok(())
            }
            _ => self.finish(identity, outcome).await,
        }
    }

    async fn release_deferred(&mut self, identity: &SampleIdentity) -> GplResult<()> {
        let deferred = match self.identities.get_mut(identity) {
            Some(state) if state.outcome.is_none() && state.outstanding_admissions == 0 => state.deferred.take(),
            _ => None,
        };
        match deferred {
            Some(outcome) => self.finish(identity, outcome).await,
            None => Ok(()),
        }
    }

    fn finished(&self, identity: &SampleIdentity) -> bool {
        self.identities
            .get(identity)
            .map_or(true, |state| state.outcome.is_some())
    }

    async fn finish(&mut self, identity: &SampleIdentity, outcome: Outcome) -> GplResult<()> {
        let Some(state) = self.identities.get_mut(identity) else {
            return Ok(());
        };
        if state.outcome.is_some() {
            return Ok(());
        }
        state.deferred = None;
        state.outcome = Some(outcome.clone());

        // Results arriving after this point are dropped by `is_open`
        self.alignments.retire(identity);
        self.purple.retire(identity);
        self.report.retire(identity);

        self.status
            .append(&StatusRecord::Outcome {
                timestamp: SystemTime::now(),
                identity: identity.clone(),
                outcome: outcome.clone(),
            })
            .await?;

        self.emit(RunEvent::Finished {
            identity: identity.clone(),
            outcome,
        });
        Ok(())
    }

    /// Give every identity still without an outcome its final one
    async fn settle(&mut self) -> GplResult<()> {
        let unfinished: Vec<SampleIdentity> = self
            .identities
            .iter()
            .filter(|(_, state)| state.outcome.is_none())
            .map(|(identity, _)| identity.clone())
            .collect();

        for identity in unfinished {
            let deferred = self
                .identities
                .get_mut(&identity)
                .and_then(|state| state.deferred.take());
            match deferred {
                Some(outcome) => self.finish(&identity, outcome).await?,
                None => {
                    self.fail(
                        &identity,
                        FailurePoint::Admission,
                        internal("no unit left to run but no terminal outcome reached"),
                        None,
                    )
                    .await?
                }
            }
        }

        Ok(())
    }

    fn take_reports(&mut self) -> Vec<IdentityReport> {
        std::mem::take(&mut self.identities)
            .into_iter()
            .filter_map(|(identity, state)| {
                state.outcome.map(|outcome| IdentityReport {
                    identity,
                    outcome,
                    invocations: state.invocations,
                    gates: state.gates,
                })
            })
            .collect()
    }
}

fn internal(message: impl ToString) -> FailureCause {
    FailureCause::Internal {
        message: message.to_string(),
    }
}

/// Admit an entry and summarize its artifacts; performs blocking reads
fn admit(entry: &SampleEntry, max_scan_bytes: u64, strategy: CacheInvalidation) -> GplResult<AdmittedSample> {
    let summarized = |artifact: ArtifactRef| -> GplResult<ArtifactRef> {
        if artifact.is_absent() {
            return Ok(artifact);
        }
        let summary = summarize(&artifact, strategy)?;
        Ok(artifact.with_summary(summary))
    };

    let AdmittedSample {
        identity,
        alignments,
        small_variants,
        structural_variants,
    } = entry.admit(max_scan_bytes)?;

    Ok(AdmittedSample {
        identity,
        alignments: AlignmentPair {
            tumour_bam: summarized(alignments.tumour_bam)?,
            tumour_bai: summarized(alignments.tumour_bai)?,
            normal_bam: summarized(alignments.normal_bam)?,
            normal_bai: summarized(alignments.normal_bai)?,
        },
        small_variants: summarized(small_variants)?,
        structural_variants: summarized(structural_variants)?,
    })
}

/// Inputs for a stage fed directly by one upstream payload
fn forward_inputs(stage: StageKind, output: &StageOutput, auxiliary_sv: &ArtifactRef) -> GplResult<StageInputs> {
    let inputs = match (stage, output) {
        (StageKind::GridssAnnotate | StageKind::Gripss, StageOutput::SvCalls { vcf }) => {
            StageInputs::SvCalls { calls: vcf.clone() }
        }
        (StageKind::SvMerge, StageOutput::SvCalls { vcf }) => StageInputs::SvMerge {
            calls: vcf.clone(),
            auxiliary: auxiliary_sv.clone(),
        },
        (StageKind::Linx, StageOutput::Purple { dir, sv_vcf, .. }) => StageInputs::Linx {
            purple_dir: dir.clone(),
            sv_vcf: sv_vcf.clone(),
        },
        (StageKind::LinxPlot, StageOutput::Linx { dir }) => StageInputs::LinxPlot { linx_dir: dir.clone() },
        (stage, output) => {
            return Err(GplError::InvalidTuple {
                target: stage.to_string(),
                reason: format!("cannot consume {:?}", output),
            })
        }
    };
    Ok(inputs)
}

/// Per-identity execution plan; performs blocking reads but runs nothing
pub fn dry_run_plan(config: &RunConfig, sheet: &SampleSheet) -> String {
    let mut text = String::new();

    for entry in &sheet.samples {
        let admitted = match entry.admit(config.gate.max_scan_bytes) {
            Ok(admitted) => admitted,
            Err(e) => {
                text.push_str(&format!(
                    "{}__{}: not admitted: {}\n\n",
                    entry.tumour_name, entry.normal_name, e
                ));
                continue;
            }
        };

        text.push_str(&format!("{}\n", admitted.identity));
        match planned_steps(config, &admitted) {
            Ok(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    text.push_str(&format!("  {:>2}. {}\n", i + 1, step));
                }
            }
            Err(e) => text.push_str(&format!("  cannot plan: {}\n", e)),
        }
        text.push('\n');
    }

    text
}

/// Plan each stage against the outputs its upstream stages would produce
fn planned_steps(config: &RunConfig, admitted: &AdmittedSample) -> GplResult<Vec<String>> {
    let identity = &admitted.identity;
    let mut steps = Vec::new();

    let step = |steps: &mut Vec<String>, stage: StageKind, inputs: StageInputs| -> GplResult<StageOutput> {
        if let Some(forwarded) = stages::bypass(stage, &inputs, config) {
            steps.push(format!("{} (bypassed)", stage));
            return Ok(forwarded);
        }
        let plan = stages::plan(stage, identity, &inputs, config)?;
        steps.push(format!("{} [{}]\n        {}", stage, plan.resource_class, plan.command));
        Ok(plan.outputs)
    };

    let alignments = StageInputs::Alignments(admitted.alignments.clone());
    let amber = step(&mut steps, StageKind::Amber, alignments.clone())?;
    let cobalt = step(&mut steps, StageKind::Cobalt, alignments.clone())?;

    let mut calls = step(&mut steps, StageKind::Gridss, alignments)?;
    for stage in [StageKind::GridssAnnotate, StageKind::SvMerge, StageKind::Gripss] {
        let inputs = forward_inputs(stage, &calls, &admitted.structural_variants)?;
        calls = step(&mut steps, stage, inputs)?;
    }
    let (filtered, unfiltered) = match calls {
        StageOutput::FilteredSv { filtered, unfiltered } => (filtered, unfiltered),
        other => return Err(unexpected(StageKind::Gripss, &other)),
    };
    steps.push(format!("gate({})", GateKind::FilteredSv));

    let purple = step(
        &mut steps,
        StageKind::Purple,
        StageInputs::Purple(PurpleInputs {
            amber_dir: amber.primary().clone(),
            cobalt_dir: cobalt.primary().clone(),
            sv_filtered: filtered,
            sv_unfiltered: unfiltered,
            small_variants: admitted.small_variants.clone(),
        }),
    )?;
    steps.push(format!("gate({})", GateKind::PurpleSv));

    let linx = step(
        &mut steps,
        StageKind::Linx,
        forward_inputs(StageKind::Linx, &purple, &admitted.structural_variants)?,
    )?;
    let plots = step(
        &mut steps,
        StageKind::LinxPlot,
        forward_inputs(StageKind::LinxPlot, &linx, &admitted.structural_variants)?,
    )?;

    let (purple_dir, purple_sv_vcf) = match purple {
        StageOutput::Purple { dir, sv_vcf, .. } => (dir, sv_vcf),
        other => return Err(unexpected(StageKind::Purple, &other)),
    };
    step(
        &mut steps,
        StageKind::Report,
        StageInputs::Report(ReportInputs {
            purple_dir,
            purple_sv_vcf,
            linx_dir: linx.primary().clone(),
            plot_dir: plots.primary().clone(),
        }),
    )?;

    Ok(steps)
}

fn unexpected(stage: StageKind, output: &StageOutput) -> GplError {
    GplError::InvalidTuple {
        target: stage.to_string(),
        reason: format!("planned unexpected {:?}", output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FilesystemCache;
    use crate::executors::{ExecutionResult, ToolCommand};
    use crate::gate::vcf::tests::write_vcf_gz;
    use crate::pipeline::samples::tests::make_sample;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Plays every tool: writes the files each stage declares
    #[derive(Default)]
    struct ScriptedRunner {
        /// (namespace, stage, rendered command) per launch
        calls: Mutex<Vec<(String, String, String)>>,
        /// Tumours whose GRIPSS output holds no records
        empty_filtered: HashSet<String>,
        /// Tumours whose PURPLE SV output holds no records
        empty_purple: HashSet<String>,
        /// (tumour, stage) pairs that exit non-zero
        failing: HashSet<(String, String)>,
        /// (tumour, stage) pairs that exit zero without writing anything
        silent: HashSet<(String, String)>,
    }

    impl ScriptedRunner {
        fn launched(&self, stage: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|(_, s, _)| s == stage).count()
        }

        fn command_of(&self, stage: &str) -> String {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(_, s, _)| s == stage)
                .map(|(_, _, c)| c.clone())
                .unwrap()
        }

        fn write_outputs(&self, dir: &Path, tumour: &str, stage: &str) {
            let file = |suffix: &str| dir.join(format!("{}{}", tumour, suffix));
            match stage {
                "amber" => std::fs::write(file(".amber.baf.tsv.gz"), "baf").unwrap(),
                "cobalt" => std::fs::write(file(".cobalt.ratio.tsv.gz"), "ratio").unwrap(),
                "gridss" => write_vcf_gz(&file(".gridss.vcf.gz"), true),
                "gridss_annotate" => write_vcf_gz(&file(".gridss.repeatmasker.vcf.gz"), true),
                "sv_merge" => write_vcf_gz(&file(".gridss.merged.vcf.gz"), true),
                "gripss" => {
                    write_vcf_gz(&file(".gripss.filtered.vcf.gz"), !self.empty_filtered.contains(tumour));
                    write_vcf_gz(&file(".gripss.vcf.gz"), true);
                }
                "purple" => {
                    write_vcf_gz(&file(".purple.sv.vcf.gz"), !self.empty_purple.contains(tumour));
                    std::fs::write(file(".purple.purity.tsv"), "purity\n0.8\n").unwrap();
                }
                "linx" => std::fs::write(file(".linx.svs.tsv"), "svs").unwrap(),
                "linx_plot" => {
                    std::fs::create_dir_all(dir.join("plot")).unwrap();
                    std::fs::write(dir.join("plot").join("circos.png"), "png").unwrap();
                }
                "report" => std::fs::write(file(".gpl_report.html"), "<html></html>").unwrap(),
                other => panic!("unexpected stage {}", other),
            }
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        async fn run(&self, command: &ToolCommand, _budget: Duration) -> Result<ExecutionResult, GplError> {
            let dir = &command.working_dir;
            let stage = dir.file_name().unwrap().to_string_lossy().to_string();
            let namespace = dir.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
            let tumour = namespace.split("__").next().unwrap().to_string();

            self.calls
                .lock()
                .unwrap()
                .push((namespace, stage.clone(), command.render()));

            let key = (tumour.clone(), stage.clone());
            if self.failing.contains(&key) {
                return Ok(ExecutionResult::failure(
                    "Exception in thread \"main\"".into(),
                    1,
                    Duration::from_millis(3),
                ));
            }
            if !self.silent.contains(&key) {
                self.write_outputs(dir, &tumour, &stage);
            }
            Ok(ExecutionResult::success(String::new(), Duration::from_millis(3)))
        }

        async fn check_available(&self, _program: &str) -> Result<bool, GplError> {
            Ok(true)
        }
    }

    fn config(temp_dir: &TempDir) -> RunConfig {
        let mut config = RunConfig::default();
        config.output_dir = temp_dir.path().join("output");
        config.cache.directory = temp_dir.path().join("cache");
        config
    }

    fn executor(config: RunConfig, runner: Arc<ScriptedRunner>) -> PipelineExecutor {
        let cache = FilesystemCache::new(config.cache.directory.clone()).unwrap();
        PipelineExecutor::new(config, runner).unwrap().with_cache(Box::new(cache))
    }

    fn identity(tumour: &str, normal: &str) -> SampleIdentity {
        SampleIdentity::new(tumour, normal).unwrap()
    }

    fn key(tumour: &str, stage: &str) -> (String, String) {
        (tumour.to_string(), stage.to_string())
    }

    #[tokio::test]
    async fn test_full_run_bypasses_optional_stages() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let executor = executor(config(&temp_dir), runner.clone());
        let sheet = SampleSheet::single(make_sample(temp_dir.path(), "T1", "N1"));

        let summary = executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();
        assert!(summary.success());
        assert_eq!(summary.reported(), 1);

        let report = summary.get(&identity("T1", "N1")).unwrap();
        match &report.outcome {
            Outcome::Reported { report } => {
                assert!(report.path().ends_with("T1__N1/report/T1.gpl_report.html"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        for stage in [StageKind::GridssAnnotate, StageKind::SvMerge] {
            assert_eq!(report.invocation(stage).unwrap().status(), InvocationStatus::Bypassed);
            assert_eq!(runner.launched(stage.name()), 0);
        }
        // GRIPSS reads the GRIDSS calls unchanged
        assert!(runner.command_of("gripss").contains("gridss/T1.gridss.vcf.gz"));
        assert_eq!(summary.launched, 8);
        assert_eq!(report.gates.len(), 2);
    }

    #[tokio::test]
    async fn test_auxiliary_calls_are_merged() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let executor = executor(config(&temp_dir), runner.clone());

        let sv_vcf = temp_dir.path().join("TUMOUR.sv.vcf.gz");
        write_vcf_gz(&sv_vcf, true);
        let mut entry = make_sample(temp_dir.path(), "TUMOUR", "NORMAL");
        entry.tumour_sv_vcf = Some(sv_vcf);

        let summary = executor
            .run(&SampleSheet::single(entry), &ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.reported(), 1);
        assert_eq!(runner.launched("sv_merge"), 1);
        assert!(runner.command_of("gripss").contains("TUMOUR.gridss.merged.vcf.gz"));
    }

    #[tokio::test]
    async fn test_empty_filtered_calls_halt_before_purple() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner {
            empty_filtered: HashSet::from(["T1".to_string()]),
            ..Default::default()
        });
        let config = config(&temp_dir);
        let status_path = config.status_log_path();
        let executor = executor(config, runner.clone());
        let sheet = SampleSheet::single(make_sample(temp_dir.path(), "T1", "N1"));

        let summary = executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();
        let report = summary.get(&identity("T1", "N1")).unwrap();

        assert_eq!(
            report.outcome,
            Outcome::HaltedAtGate {
                gate: GateKind::FilteredSv
            }
        );
        assert!(report.invocation(StageKind::Purple).is_none());
        assert_eq!(runner.launched("purple"), 0);
        assert!(summary.success());

        let latest = StatusLog::new(status_path).latest_outcomes().unwrap();
        assert!(matches!(
            latest[&identity("T1", "N1")],
            Outcome::HaltedAtGate { .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_purple_calls_halt_before_linx() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner {
            empty_purple: HashSet::from(["T1".to_string()]),
            ..Default::default()
        });
        let executor = executor(config(&temp_dir), runner.clone());
        let sheet = SampleSheet::single(make_sample(temp_dir.path(), "T1", "N1"));

        let summary = executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();
        let report = summary.get(&identity("T1", "N1")).unwrap();

        assert_eq!(
            report.outcome,
            Outcome::HaltedAtGate {
                gate: GateKind::PurpleSv
            }
        );
        assert_eq!(report.gates.len(), 2);
        for stage in [StageKind::Linx, StageKind::LinxPlot, StageKind::Report] {
            assert!(report.invocation(stage).is_none());
            assert_eq!(runner.launched(stage.name()), 0);
        }
        assert_eq!(runner.launched("purple"), 1);
        assert!(summary.success());
    }

    #[tokio::test]
    async fn test_rerun_launches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let sheet = SampleSheet::single(make_sample(temp_dir.path(), "T1", "N1"));

        let first = executor(config(&temp_dir), runner.clone())
            .run(&sheet, &ExecutionOptions::default())
            .await
            .unwrap();
        let second = executor(config(&temp_dir), runner.clone())
            .run(&sheet, &ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(first.launched, 8);
        assert_eq!(second.launched, 0);

        let id = identity("T1", "N1");
        assert_eq!(first.get(&id).unwrap().outcome, second.get(&id).unwrap().outcome);
        assert!(second
            .get(&id)
            .unwrap()
            .invocations
            .iter()
            .all(|i| matches!(i.status(), InvocationStatus::Skipped | InvocationStatus::Bypassed)));
    }

    #[tokio::test]
    async fn test_no_cache_runs_everything_again() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let sheet = SampleSheet::single(make_sample(temp_dir.path(), "T1", "N1"));
        let executor = executor(config(&temp_dir), runner.clone());

        executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();
        let options = ExecutionOptions {
            no_cache: true,
            ..Default::default()
        };
        let second = executor.run(&sheet, &options).await.unwrap();
        assert_eq!(second.launched, 8);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_identity() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner {
            failing: HashSet::from([key("T2", "gridss")]),
            ..Default::default()
        });
        let executor = executor(config(&temp_dir), runner.clone());
        let sheet = SampleSheet {
            samples: vec![
                make_sample(temp_dir.path(), "T1", "N1"),
                make_sample(temp_dir.path(), "T2", "N2"),
            ],
        };

        let summary = executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();
        assert_eq!(summary.reported(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.success());

        let failed = summary.get(&identity("T2", "N2")).unwrap();
        match &failed.outcome {
            Outcome::Failed {
                point,
                cause,
                fingerprint,
            } => {
                assert_eq!(
                    *point,
                    FailurePoint::Stage {
                        stage: StageKind::Gridss
                    }
                );
                assert!(matches!(cause, FailureCause::NonZeroExit { code: 1, .. }));
                assert!(fingerprint.is_some());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(failed.invocation(StageKind::Gripss).is_none());

        let recovery = failed.recovery().unwrap();
        assert!(recovery.commands.iter().any(|c| c.starts_with("gplflow cache invalidate")));
    }

    #[tokio::test]
    async fn test_finished_identities_leave_no_join_state() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner {
            failing: HashSet::from([key("T2", "purple"), key("T3", "linx")]),
            ..Default::default()
        });
        let config = Arc::new(config(&temp_dir));
        let graph = PipelineGraph::build().unwrap();
        let stages = Arc::new(StageExecutor::new(config.clone(), runner));
        let entry = make_sample(temp_dir.path(), "T4", "N4");
        let sheet = SampleSheet {
            samples: vec![
                make_sample(temp_dir.path(), "T1", "N1"),
                make_sample(temp_dir.path(), "T2", "N2"),
                make_sample(temp_dir.path(), "T3", "N3"),
                entry.clone(),
                entry,
            ],
        };

        let mut scheduler = Scheduler::new(&graph, config, stages, None);
        scheduler.drive(&sheet).await.unwrap();

        let reports = scheduler.take_reports();
        assert_eq!(reports.len(), 4);
        assert_eq!(reports.iter().filter(|r| r.outcome.is_failed()).count(), 3);
        assert_eq!(scheduler.join_state_len(), 0);
    }

    #[tokio::test]
    async fn test_silent_failure_is_detected() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner {
            silent: HashSet::from([key("T1", "amber")]),
            ..Default::default()
        });
        let executor = executor(config(&temp_dir), runner.clone());
        let sheet = SampleSheet::single(make_sample(temp_dir.path(), "T1", "N1"));

        let summary = executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();
        let report = summary.get(&identity("T1", "N1")).unwrap();

        assert!(matches!(
            report.outcome,
            Outcome::Failed {
                cause: FailureCause::PostConditionViolated { .. },
                ..
            }
        ));
        assert_eq!(
            report.invocation(StageKind::Amber).unwrap().status(),
            InvocationStatus::Failed
        );
        assert_eq!(runner.launched("purple"), 0);
    }

    #[tokio::test]
    async fn test_empty_plot_directory_is_a_silent_failure() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner {
            silent: HashSet::from([key("T1", "linx_plot")]),
            ..Default::default()
        });
        let executor = executor(config(&temp_dir), runner.clone());
        let sheet = SampleSheet::single(make_sample(temp_dir.path(), "T1", "N1"));

        let summary = executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();
        let report = summary.get(&identity("T1", "N1")).unwrap();

        assert!(matches!(
            report.outcome,
            Outcome::Failed {
                point: FailurePoint::Stage {
                    stage: StageKind::LinxPlot
                },
                cause: FailureCause::PostConditionViolated { .. },
                ..
            }
        ));
        assert_eq!(runner.launched("report"), 0);
        assert!(!summary.success());
    }

    #[tokio::test]
    async fn test_duplicate_identity_fails_at_join() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let executor = executor(config(&temp_dir), runner);
        let entry = make_sample(temp_dir.path(), "T1", "N1");
        let sheet = SampleSheet {
            samples: vec![entry.clone(), entry],
        };

        let summary = executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();
        assert_eq!(summary.identities.len(), 1);
        assert!(matches!(
            summary.identities[0].outcome,
            Outcome::Failed {
                point: FailurePoint::Join {
                    target: JoinTarget::Alignments
                },
                cause: FailureCause::DuplicateEmission { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_admission_failure_and_rejection() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let executor = executor(config(&temp_dir), runner.clone());

        let unindexed = make_sample(temp_dir.path(), "T1", "N1");
        std::fs::remove_file(temp_dir.path().join("T1.bam.bai")).unwrap();
        let mut badly_named = make_sample(temp_dir.path(), "T2", "N2");
        badly_named.tumour_name = "T2/../x".into();
        let good = make_sample(temp_dir.path(), "T3", "N3");

        let sheet = SampleSheet {
            samples: vec![unindexed, badly_named, good],
        };
        let summary = executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();

        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(summary.identities.len(), 2);
        assert!(matches!(
            summary.get(&identity("T1", "N1")).unwrap().outcome,
            Outcome::Failed {
                point: FailurePoint::Admission,
                ..
            }
        ));
        assert!(summary.get(&identity("T3", "N3")).unwrap().outcome.is_reported());
        assert!(runner.calls.lock().unwrap().iter().all(|(ns, _, _)| ns == "T3__N3"));
    }

    #[tokio::test]
    async fn test_events_reach_handler() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let finished = Arc::new(Mutex::new(Vec::new()));
        let seen = finished.clone();
        let executor = executor(config(&temp_dir), runner).on_event(move |event| {
            if let RunEvent::Finished { identity, .. } = event {
                seen.lock().unwrap().push(identity.clone());
            }
        });
        let sheet = SampleSheet::single(make_sample(temp_dir.path(), "T1", "N1"));

        executor.run(&sheet, &ExecutionOptions::default()).await.unwrap();
        assert_eq!(*finished.lock().unwrap(), vec![identity("T1", "N1")]);
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_running() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let executor = executor(config(&temp_dir), runner.clone());
        let sheet = SampleSheet::single(make_sample(temp_dir.path(), "T1", "N1"));
        let options = ExecutionOptions {
            dry_run: true,
            ..Default::default()
        };

        let summary = executor.run(&sheet, &options).await.unwrap();
        let plan = summary.plan.unwrap();

        assert!(plan.starts_with("T1__N1\n"));
        assert!(plan.contains("gridss [heavy]"));
        assert!(plan.contains("sv_merge (bypassed)"));
        assert!(plan.contains("gate(filtered_sv)"));
        assert!(plan.contains("report [light]"));
        assert!(runner.calls.lock().unwrap().is_empty());
        assert!(summary.identities.is_empty());
    }

    #[test]
    fn test_forward_inputs() {
        let calls = StageOutput::SvCalls {
            vcf: ArtifactRef::file("/out/gridss/T1.gridss.vcf.gz"),
        };

        let merge = forward_inputs(StageKind::SvMerge, &calls, &ArtifactRef::no_file()).unwrap();
        assert!(matches!(merge, StageInputs::SvMerge { ref auxiliary, .. } if auxiliary.is_absent()));

        assert!(forward_inputs(StageKind::Linx, &calls, &ArtifactRef::no_file()).is_err());
    }
}
