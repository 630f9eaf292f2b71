// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Execution of a single stage for a single identity
//!
//! Bypass, memoization, the external process, post-conditions and the cache
//! write all happen here. Failures come back as values so one identity can
//! never abort the run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{summarize, Cache, CachedEntry, ContentHasher, Fingerprint};
use crate::errors::GplResult;
use crate::executors::ToolRunner;
use crate::model::{FailureCause, InvocationStatus, SampleIdentity, StageInvocation};
use crate::pipeline::RunConfig;
use crate::stages::{self, StageInputs, StageKind, StageOutput, StagePlan};

/// A stage invocation that ended in `Failed`
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub invocation: StageInvocation,
    pub cause: FailureCause,
}

impl StageFailure {
    fn new(mut invocation: StageInvocation, cause: FailureCause) -> Self {
        if invocation.status().can_advance_to(InvocationStatus::Failed) {
            // Pending and Running both move to Failed
            let _ = invocation.advance(InvocationStatus::Failed);
        }
        Self { invocation, cause }
    }

    pub(crate) fn internal(invocation: StageInvocation, message: impl ToString) -> Self {
        Self::new(
            invocation,
            FailureCause::Internal {
                message: message.to_string(),
            },
        )
    }
}

/// Runs stage plans through a `ToolRunner`, with optional memoization
pub struct StageExecutor {
    config: Arc<RunConfig>,
    runner: Arc<dyn ToolRunner>,
    cache: Option<Arc<RwLock<Box<dyn Cache>>>>,
    launches: AtomicUsize,
}

impl StageExecutor {
    pub fn new(config: Arc<RunConfig>, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            config,
            runner,
            cache: None,
            launches: AtomicUsize::new(0),
        }
    }

    /// Set the cache layer
    pub fn with_cache(mut self, cache: Arc<RwLock<Box<dyn Cache>>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Number of external processes started so far
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Plan without running
    pub fn plan(&self, identity: &SampleIdentity, stage: StageKind, inputs: &StageInputs) -> GplResult<StagePlan> {
        stages::plan(stage, identity, inputs, &self.config)
    }

    /// Run one stage for one identity
    pub async fn execute(
        &self,
        identity: &SampleIdentity,
        stage: StageKind,
        inputs: &StageInputs,
    ) -> Result<StageInvocation, StageFailure> {
        let mut invocation = StageInvocation::new(identity.clone(), stage);

        if let Some(forwarded) = stages::bypass(stage, inputs, &self.config) {
            info!("{} {}: bypassed", identity, stage);
            if let Err(e) = invocation.advance(InvocationStatus::Bypassed) {
                return Err(StageFailure::internal(invocation, e));
            }
            invocation.outputs = Some(forwarded);
            return Ok(invocation);
        }

        let plan = match self.plan(identity, stage, inputs) {
            Ok(plan) => plan,
            Err(e) => return Err(StageFailure::internal(invocation, e)),
        };

        let fingerprint =
            ContentHasher::fingerprint_invocation(stage, identity, &inputs.artifacts(), &plan.command);
        invocation.fingerprint = Some(fingerprint.clone());

        if let Some(outputs) = self.lookup(&fingerprint).await {
            info!("{} {}: skipped (cached {})", identity, stage, fingerprint.short());
            if let Err(e) = invocation.advance(InvocationStatus::Skipped) {
                return Err(StageFailure::internal(invocation, e));
            }
            invocation.outputs = Some(outputs);
            return Ok(invocation);
        }

        let stage_dir = self.config.stage_dir(identity, stage);
        if let Err(e) = reset_dir(&stage_dir).await {
            return Err(StageFailure::internal(invocation, e));
        }

        if let Err(e) = invocation.advance(InvocationStatus::Running) {
            return Err(StageFailure::internal(invocation, e));
        }
        info!("{} {}: running", identity, stage);
        debug!("{} {}: {}", identity, stage, plan.command);

        let budget = self.config.timeout_for(plan.resource_class);
        self.launches.fetch_add(1, Ordering::SeqCst);

        let result = match self.runner.run(&plan.command, budget).await {
            Ok(result) => result,
            Err(e) => {
                warn!("{} {}: could not start: {}", identity, stage, e);
                return Err(StageFailure::new(
                    invocation,
                    FailureCause::SpawnFailed {
                        message: e.to_string(),
                    },
                ));
            }
        };
        invocation.duration_ms = result.duration.as_millis() as u64;

        if result.timed_out {
            warn!("{} {}: timed out after {}s", identity, stage, budget.as_secs());
            return Err(StageFailure::new(
                invocation,
                FailureCause::TimedOut {
                    after_secs: budget.as_secs(),
                },
            ));
        }

        if !result.success {
            let code = result.exit_code.unwrap_or(-1);
            warn!("{} {}: exited with code {}", identity, stage, code);
            return Err(StageFailure::new(
                invocation,
                FailureCause::NonZeroExit {
                    code,
                    stderr_tail: result.stderr_tail(),
                },
            ));
        }

        let checked = plan.clone();
        let violation = match tokio::task::spawn_blocking(move || {
            checked.violated_postcondition().map(ToString::to_string)
        })
        .await
        {
            Ok(violation) => violation,
            Err(e) => return Err(StageFailure::internal(invocation, e)),
        };
        if let Some(condition) = violation {
            warn!("{} {}: exited cleanly but {} does not hold", identity, stage, condition);
            return Err(StageFailure::new(
                invocation,
                FailureCause::PostConditionViolated { condition },
            ));
        }

        let outputs = match self.summarize_outputs(plan.outputs).await {
            Ok(outputs) => outputs,
            Err(e) => return Err(StageFailure::internal(invocation, e)),
        };

        self.remember(identity, stage, &fingerprint, &outputs, invocation.duration_ms)
            .await;

        if let Err(e) = invocation.advance(InvocationStatus::Succeeded) {
            return Err(StageFailure::internal(invocation, e));
        }
        info!(
            "{} {}: succeeded in {:.1}s",
            identity,
            stage,
            invocation.duration_ms as f64 / 1000.0
        );
        invocation.outputs = Some(outputs);
        Ok(invocation)
    }

    /// Cached outputs for a fingerprint; cache errors count as a miss
    async fn lookup(&self, fingerprint: &Fingerprint) -> Option<StageOutput> {
        let cache = self.cache.as_ref()?;
        let cache = cache.read().await;
        match cache.get(fingerprint).await {
            Ok(entry) => entry.map(|e| e.outputs),
            Err(e) => {
                warn!("Cache lookup for {} failed: {}", fingerprint.short(), e);
                None
            }
        }
    }

    async fn remember(
        &self,
        identity: &SampleIdentity,
        stage: StageKind,
        fingerprint: &Fingerprint,
        outputs: &StageOutput,
        duration_ms: u64,
    ) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };

        let entry = CachedEntry {
            timestamp: SystemTime::now(),
            identity: identity.clone(),
            stage,
            fingerprint: fingerprint.clone(),
            outputs: outputs.clone(),
            duration_ms,
        };

        let cache = cache.write().await;
        if let Err(e) = cache.store(&entry).await {
            warn!("Could not cache {} {}: {}", identity, stage, e);
        }
    }

    /// Attach summaries to every produced artifact
    async fn summarize_outputs(&self, outputs: StageOutput) -> GplResult<StageOutput> {
        let strategy = self.config.cache.invalidation;
        tokio::task::spawn_blocking(move || {
            outputs.try_map_artifacts(|artifact| {
                if artifact.is_absent() {
                    return Ok(artifact);
                }
                let summary = summarize(&artifact, strategy)?;
                Ok(artifact.with_summary(summary))
            })
        })
        .await?
    }
}

/// Empty the stage directory so no output of an earlier attempt survives
async fn reset_dir(dir: &std::path::Path) -> GplResult<()> {
    use crate::errors::GplError;

    if tokio::fs::metadata(dir).await.is_ok() {
        tokio::fs::remove_dir_all(dir)
            .await
            .map_err(|e| GplError::write_failed(dir, e))?;
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| GplError::write_failed(dir, e))
}
