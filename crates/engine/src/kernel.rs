// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration kernel
//!
//! A session is single-threaded: the state machine below advances
//! sequentially and never runs two phases at once. Inside a phase the
//! worker pool provides bounded per-file parallelism; workers surface
//! results back here and only this module touches session state.

use crate::approval::{Approval, ApprovalGate};
use crate::audit::{parse_audit, AuditReport};
use crate::bus::EventBus;
use crate::committer::{commit_all, render_commit_message};
use crate::error::EngineError;
use crate::invoke::Invoker;
use crate::pool::{run_pool, PoolOptions, ProgressFn};
use crate::prompts;
use crate::recovery::{recover_file, recovery_budget, FileRecovery, RecoveryContext};
use crate::syntax::SyntaxValidator;
use crate::tester::{detect_test_command, run_tests};
use crate::watch;
use orchestra_adapters::backend::{BackendAdapter, CliBackend};
use orchestra_adapters::{
    merge_backends, resolve_chain, Cancellation, FallbackChain, RateLimitSet,
};
use orchestra_core::{
    plan, AgentRole, AgentStatus, CheckpointId, Clock, Config, ErrorKind, Event, EventSink,
    FileDirective, FileRecord, FileStatus, IdGen, ModelAttempt, Phase, Session, SessionId, StepId,
    SyntaxOutcome, SystemClock, TaskStep, UuidIdGen,
};
use orchestra_storage::{PromptCache, SessionStore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Scheduling shape of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Generate all files, then audit globally, iterating.
    #[default]
    Standard,
    /// Each file flows generate -> audit independently.
    Pipeline,
}

/// Per-run options layered over the config file by CLI flags.
#[derive(Debug, Clone, Default)]
pub struct KernelOptions {
    pub mode: RunMode,
    pub auto_approve: bool,
    pub parallel: Option<bool>,
    pub max_concurrency: Option<usize>,
    pub run_tests: bool,
    pub test_command: Option<String>,
    pub commit: bool,
    pub commit_message: Option<String>,
    /// Where the config document was read from, for the `config:loaded`
    /// event. `None` means defaults.
    pub config_path: Option<PathBuf>,
}

/// One-line result of a run, printed by the CLI.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub phase: Phase,
    pub iteration: u32,
    pub files_complete: usize,
    pub files_abandoned: usize,
    pub total_cost: f64,
    pub error: Option<String>,
}

/// Summary returned by `validate`.
#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    pub rows: Vec<(String, SyntaxOutcome, Option<String>)>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Where to (re-)enter the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Plan,
    Approve,
    Execute { resuming: bool },
    Audit,
    Recover,
    Test,
    Commit,
    Finish,
    Done,
}

/// Per-run context owned by the kernel thread.
struct Cx {
    session: Session,
    bus: Arc<EventBus>,
    chains: HashMap<AgentRole, Arc<FallbackChain>>,
    directives: Vec<FileDirective>,
    plan_path: PathBuf,
    last_fingerprint: Option<String>,
    checkpoint: Option<CheckpointId>,
    /// Watch-mode rerun: reuse the stored plan and skip the gate.
    reuse_plan: bool,
}

/// Shared state for worker-pool operations (must be `'static`).
struct WorkCtx<C: Clock> {
    invoker: Invoker<C>,
    executor_chain: Arc<FallbackChain>,
    auditor_chain: Arc<FallbackChain>,
    bus: Arc<EventBus>,
    validator: SyntaxValidator,
    project_root: PathBuf,
    task: String,
    overrides: orchestra_core::config::PromptOverrides,
    cancel: Cancellation,
}

/// Result a worker hands back to the kernel for one file.
struct WorkOutcome {
    path: String,
    attempts: Vec<ModelAttempt>,
    audit_attempts: Vec<ModelAttempt>,
    duration_ms: u64,
    generated: bool,
    /// Pipeline mode: the per-file audit verdict.
    approved: Option<bool>,
    syntax: Option<(SyntaxOutcome, Option<String>)>,
    error: Option<String>,
    output_hash: Option<String>,
}

pub struct Orchestrator<C: Clock, I: IdGen> {
    project_root: PathBuf,
    config: Config,
    options: KernelOptions,
    clock: C,
    ids: I,
    store: Arc<SessionStore<C>>,
    adapters: HashMap<AgentRole, Vec<Arc<dyn BackendAdapter>>>,
    costs: HashMap<String, f64>,
    rate_limits: RateLimitSet,
    gate: Arc<dyn ApprovalGate>,
    cancel: Cancellation,
}

impl Orchestrator<SystemClock, UuidIdGen> {
    /// Production constructor: resolve the per-role chains from the builtin
    /// registry merged with config overrides.
    pub fn from_config(
        project_root: &Path,
        config: Config,
        options: KernelOptions,
        gate: Arc<dyn ApprovalGate>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let entries = merge_backends(&config.backends);
        let mut adapters: HashMap<AgentRole, Vec<Arc<dyn BackendAdapter>>> = HashMap::new();
        for role in AgentRole::ALL {
            let chain_entries = resolve_chain(config.agents.for_role(role), &entries)?;
            adapters.insert(
                role,
                chain_entries
                    .into_iter()
                    .map(|entry| Arc::new(CliBackend::new(entry)) as Arc<dyn BackendAdapter>)
                    .collect(),
            );
        }
        let costs = entries
            .iter()
            .map(|e| (e.id.clone(), e.cost_per_1k_tokens))
            .collect();
        Ok(Self::assemble(
            project_root,
            config,
            options,
            SystemClock,
            UuidIdGen,
            gate,
            adapters,
            costs,
        ))
    }
}

impl<C: Clock, I: IdGen> Orchestrator<C, I> {
    /// Test constructor with injected adapters.
    pub fn with_adapters(
        project_root: &Path,
        config: Config,
        options: KernelOptions,
        clock: C,
        ids: I,
        gate: Arc<dyn ApprovalGate>,
        adapters: HashMap<AgentRole, Vec<Arc<dyn BackendAdapter>>>,
    ) -> Self {
        Self::assemble(
            project_root,
            config,
            options,
            clock,
            ids,
            gate,
            adapters,
            HashMap::new(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        project_root: &Path,
        config: Config,
        options: KernelOptions,
        clock: C,
        ids: I,
        gate: Arc<dyn ApprovalGate>,
        adapters: HashMap<AgentRole, Vec<Arc<dyn BackendAdapter>>>,
        costs: HashMap<String, f64>,
    ) -> Self {
        let store = Arc::new(SessionStore::new(project_root, clock.clone()));
        Self {
            project_root: project_root.to_path_buf(),
            config,
            options,
            clock,
            ids,
            store,
            adapters,
            costs,
            rate_limits: RateLimitSet::new(),
            gate,
            cancel: Cancellation::new(),
        }
    }

    pub fn store(&self) -> &SessionStore<C> {
        &self.store
    }

    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    pub fn rate_limits(&self) -> &RateLimitSet {
        &self.rate_limits
    }

    /// Fatal pre-flight: every role needs at least one available adapter.
    pub async fn ensure_available(&self) -> Result<(), EngineError> {
        let mut reasons = Vec::new();
        for role in AgentRole::ALL {
            let list = self.adapters.get(&role).map(Vec::as_slice).unwrap_or(&[]);
            let mut role_ok = false;
            for adapter in list {
                match adapter.availability().await {
                    Ok(()) => {
                        role_ok = true;
                        break;
                    }
                    Err(reason) => reasons.push(format!("{role}/{}: {reason}", adapter.info().name)),
                }
            }
            if !role_ok {
                return Err(EngineError::NoBackendAvailable { reasons });
            }
        }
        Ok(())
    }

    /// Create a session and run the kernel once.
    pub async fn run(&self, task: &str) -> Result<SessionOutcome, EngineError> {
        let session = self.store.create(task, &self.ids)?;
        self.run_session(session, None, false).await
    }

    /// Load the most recent resumable session and continue it.
    pub async fn resume(&self) -> Result<SessionOutcome, EngineError> {
        let Some(session) = self.store.latest_resumable()? else {
            return Err(EngineError::NothingToResume);
        };
        let entry = match session.phase {
            Phase::Init | Phase::Planning => Entry::Plan,
            Phase::AwaitingApproval => Entry::Approve,
            Phase::Executing | Phase::Fixing => Entry::Execute { resuming: true },
            Phase::Auditing => Entry::Audit,
            Phase::Recovery | Phase::MaxIterations | Phase::Consulting => Entry::Recover,
            Phase::Testing => Entry::Test,
            Phase::Committing => Entry::Commit,
            Phase::Completed | Phase::Failed | Phase::Rejected => {
                return Err(EngineError::NothingToResume)
            }
        };
        self.run_session(session, Some(entry), true).await
    }

    /// Watch-mode re-entry: back into planning on the same session.
    pub async fn rerun(&self, session_id: &str) -> Result<SessionOutcome, EngineError> {
        let Some(session) = self.store.load(session_id)? else {
            return Err(EngineError::Other(format!("no such session: {session_id}")));
        };
        self.run_session(session, Some(Entry::Plan), false).await
    }

    /// Run, then keep watching the planned paths and re-running until
    /// cancelled.
    pub async fn watch_loop(&self, task: &str) -> Result<SessionOutcome, EngineError> {
        let mut outcome = self.run(task).await?;
        loop {
            let Some(session) = self.store.load(outcome.session_id.as_str())? else {
                return Ok(outcome);
            };
            let paths: Vec<String> = session.files.iter().map(|f| f.path.clone()).collect();
            if paths.is_empty() {
                return Ok(outcome);
            }
            let debounce = Duration::from_millis(self.config.watch.debounce_ms);
            let changed =
                watch::watch_once(&self.project_root, &paths, debounce, &self.cancel)
                    .await
                    .map_err(|e| EngineError::Other(format!("watcher failed: {e}")))?;
            let Some(changed) = changed else {
                return Ok(outcome);
            };
            self.store
                .append_event(&session.id, &Event::WatchChange { paths: changed })?;
            self.store.append_event(
                &session.id,
                &Event::WatchRerun {
                    session: session.id.clone(),
                },
            )?;
            outcome = self.rerun(session.id.as_str()).await?;
        }
    }

    /// Re-run syntax validation over the latest session's planned files.
    pub async fn validate_latest(&self) -> Result<ValidationSummary, EngineError> {
        let Some(summary) = self.store.latest()? else {
            return Err(EngineError::Other("no session to validate".to_string()));
        };
        let Some(session) = self.store.load(summary.id.as_str())? else {
            return Err(EngineError::Other("no session to validate".to_string()));
        };
        let validator = SyntaxValidator::new(&self.config.languages);
        let mut result = ValidationSummary::default();
        for file in &session.files {
            let (outcome, detail) = validator
                .check(&self.project_root.join(&file.path), &self.cancel)
                .await;
            match outcome {
                SyntaxOutcome::Passed => result.passed += 1,
                SyntaxOutcome::Failed => result.failed += 1,
                SyntaxOutcome::Skipped => result.skipped += 1,
            }
            result.rows.push((file.path.clone(), outcome, detail));
        }
        self.store.append_event(
            &session.id,
            &Event::SyntaxValidation {
                checked: result.rows.len(),
                passed: result.passed,
                failed: result.failed,
                skipped: result.skipped,
            },
        )?;
        Ok(result)
    }

    // -- run loop -----------------------------------------------------------

    async fn run_session(
        &self,
        session: Session,
        entry_override: Option<Entry>,
        resumed: bool,
    ) -> Result<SessionOutcome, EngineError> {
        let mut cx = self.make_cx(session)?;
        cx.bus.emit(Event::ConfigLoaded {
            path: self.options.config_path.clone(),
        });
        if resumed {
            cx.bus.emit(Event::Resume {
                session: cx.session.id.clone(),
                phase: cx.session.phase,
            });
            // Re-hydrate directives from the stored plan for prompts.
            if let Some(plan_text) = self.store.load_plan(&cx.session.id)? {
                cx.directives = plan::parse_plan(&plan_text);
            }
            if cx.directives.is_empty() {
                cx.directives = cx
                    .session
                    .files
                    .iter()
                    .map(|f| FileDirective {
                        path: f.path.clone(),
                        summary: f.description.clone(),
                    })
                    .collect();
            }
        }
        if entry_override == Some(Entry::Plan) && !resumed && cx.session.phase == Phase::Completed
        {
            // Watch rerun: the machine allows completed -> planning.
            cx.reuse_plan = self.config.watch.reuse_plan;
        }

        let mut entry = entry_override.unwrap_or(Entry::Plan);
        let result = loop {
            if self.cancel.is_cancelled() {
                break Err(EngineError::Cancelled);
            }
            let step = match entry {
                Entry::Plan => self.phase_plan(&mut cx).await,
                Entry::Approve => self.phase_approve(&mut cx).await,
                Entry::Execute { resuming } => match self.options.mode {
                    RunMode::Standard => self.phase_execute(&mut cx, resuming).await,
                    RunMode::Pipeline => self.phase_execute_pipeline(&mut cx).await,
                },
                Entry::Audit => self.phase_audit(&mut cx).await,
                Entry::Recover => self.phase_recover(&mut cx).await,
                Entry::Test => self.phase_test(&mut cx).await,
                Entry::Commit => self.phase_commit(&mut cx).await,
                Entry::Finish => self.phase_finish(&mut cx).await,
                Entry::Done => break Ok(()),
            };
            match step {
                Ok(next) => entry = next,
                Err(err) => break Err(err),
            }
        };

        match result {
            Ok(()) => Ok(self.outcome(&cx)),
            Err(err) => {
                cx.bus.emit(Event::Error {
                    phase: cx.session.phase,
                    message: err.to_string(),
                });
                if cx.session.phase.is_resumable() {
                    let reason = err.to_string();
                    self.store
                        .force_phase(&mut cx.session, Phase::Failed, Some(reason))?;
                }
                Err(err)
            }
        }
    }

    fn make_cx(&self, session: Session) -> Result<Cx, EngineError> {
        let store = Arc::clone(&self.store);
        let id = session.id.clone();
        let bus = Arc::new(EventBus::new(move |event| {
            if let Err(e) = store.append_event(&id, event) {
                tracing::warn!(error = %e, "event log write failed");
            }
        }));

        let mut chains = HashMap::new();
        for role in AgentRole::ALL {
            let adapters = self.adapters.get(&role).cloned().unwrap_or_default();
            chains.insert(
                role,
                Arc::new(FallbackChain::new(
                    role.as_str(),
                    adapters,
                    self.rate_limits.clone(),
                    Arc::clone(&bus) as Arc<dyn EventSink>,
                )),
            );
        }

        let plan_path = self.store.plan_path(&session.id);
        Ok(Cx {
            session,
            bus,
            chains,
            directives: Vec::new(),
            plan_path,
            last_fingerprint: None,
            checkpoint: None,
            reuse_plan: false,
        })
    }

    fn invoker(&self) -> Invoker<C> {
        Invoker::new(self.clock.clone(), self.costs.clone())
            .with_cache(PromptCache::new(self.store.root()), false)
    }

    fn chain(&self, cx: &Cx, role: AgentRole) -> Arc<FallbackChain> {
        // Chains exist for every role; an unknown role would be a bug caught
        // in tests, and an empty chain simply exhausts immediately.
        cx.chains
            .get(&role)
            .cloned()
            .unwrap_or_else(|| {
                Arc::new(FallbackChain::new(
                    role.as_str(),
                    Vec::new(),
                    self.rate_limits.clone(),
                    Arc::clone(&cx.bus) as Arc<dyn EventSink>,
                ))
            })
    }

    fn enter_phase(&self, cx: &mut Cx, phase: Phase) -> Result<(), EngineError> {
        if cx.session.phase == phase {
            self.store.save(&mut cx.session)?;
        } else {
            self.store.set_phase(&mut cx.session, phase)?;
        }
        cx.bus.emit(Event::PhaseStart { phase });
        Ok(())
    }

    fn complete_phase(&self, cx: &Cx, phase: Phase) {
        cx.bus.emit(Event::PhaseComplete { phase });
    }

    fn begin_step(
        &self,
        cx: &mut Cx,
        role: AgentRole,
        file: Option<String>,
    ) -> usize {
        let step = TaskStep::start(
            StepId::new(self.ids.next()),
            role,
            file,
            cx.session.iteration,
            self.clock.epoch_ms(),
        );
        cx.session.push_step(step)
    }

    fn finish_step(
        &self,
        cx: &mut Cx,
        index: usize,
        attempts: Vec<ModelAttempt>,
        output_hash: Option<String>,
        success: bool,
    ) {
        for attempt in attempts {
            // A rate-limited or unavailable attempt means the chain moved on
            // to the next adapter.
            if attempt.error_kind.is_some_and(ErrorKind::is_transient) {
                cx.session.record_fallback_rotation();
            }
            cx.session.record_attempt(index, attempt);
        }
        let now = self.clock.epoch_ms();
        if let Some(step) = cx.session.steps.get_mut(index) {
            if success {
                step.complete(output_hash, now);
            } else {
                step.fail(now);
            }
        }
    }

    // -- phases -------------------------------------------------------------

    async fn phase_plan(&self, cx: &mut Cx) -> Result<Entry, EngineError> {
        self.enter_phase(cx, Phase::Planning)?;

        let plan_text = if cx.reuse_plan {
            match self.store.load_plan(&cx.session.id)? {
                Some(text) if !plan::parse_plan(&text).is_empty() => text,
                _ => self.generate_plan(cx).await?,
            }
        } else {
            self.generate_plan(cx).await?
        };

        cx.directives = plan::parse_plan(&plan_text);
        if cx.directives.is_empty() {
            return Err(EngineError::Planning(
                "plan contained no file directives".to_string(),
            ));
        }
        cx.session.files = cx
            .directives
            .iter()
            .map(|d| FileRecord::new(&d.path, &d.summary))
            .collect();
        cx.session.iteration = 0;
        cx.last_fingerprint = None;
        self.store.save(&mut cx.session)?;

        self.complete_phase(cx, Phase::Planning);
        Ok(Entry::Approve)
    }

    async fn generate_plan(&self, cx: &mut Cx) -> Result<String, EngineError> {
        let step = self.begin_step(cx, AgentRole::Architect, None);
        cx.session
            .set_agent_status(AgentRole::Architect, AgentStatus::Running, None);
        let prompt = prompts::architect(&self.config.prompts, &cx.session.task);
        let chain = self.chain(cx, AgentRole::Architect);
        let invoker = self.invoker();
        match invoker
            .invoke(&chain, &prompt, None, Some(&self.project_root), &self.cancel)
            .await
        {
            Ok(outcome) => {
                let hash = hash_text(&outcome.text);
                self.finish_step(cx, step, outcome.attempts.clone(), Some(hash), true);
                cx.session.set_agent_status(
                    AgentRole::Architect,
                    AgentStatus::Completed,
                    Some(outcome.duration_ms),
                );
                self.store
                    .save_agent_output(&cx.session.id, AgentRole::Architect, &outcome.text)?;
                self.store.save_plan(&cx.session.id, &outcome.text)?;
                Ok(outcome.text)
            }
            Err((error, attempts)) => {
                self.finish_step(cx, step, attempts, None, false);
                cx.session
                    .set_agent_status(AgentRole::Architect, AgentStatus::Failed, None);
                self.store.save(&mut cx.session)?;
                Err(EngineError::Planning(error.to_string()))
            }
        }
    }

    async fn phase_approve(&self, cx: &mut Cx) -> Result<Entry, EngineError> {
        self.enter_phase(cx, Phase::AwaitingApproval)?;
        let auto = self.options.auto_approve || cx.reuse_plan;
        if !auto {
            loop {
                let plan_text = self.store.load_plan(&cx.session.id)?.unwrap_or_default();
                cx.bus.emit(Event::PlanReady {
                    path: cx.plan_path.clone(),
                    content: plan_text.clone(),
                });
                match self.gate.decide(&plan_text, &cx.plan_path).await {
                    Approval::Approve => break,
                    Approval::Edit => {
                        // The caller edited the plan file; a new plan, so
                        // re-read and re-present.
                        let edited = self.store.load_plan(&cx.session.id)?.unwrap_or_default();
                        cx.directives = plan::parse_plan(&edited);
                        cx.session.files = cx
                            .directives
                            .iter()
                            .map(|d| FileRecord::new(&d.path, &d.summary))
                            .collect();
                        self.store.save(&mut cx.session)?;
                        continue;
                    }
                    Approval::Reject => {
                        self.store.set_phase(&mut cx.session, Phase::Rejected)?;
                        self.complete_phase(cx, Phase::AwaitingApproval);
                        return Ok(Entry::Done);
                    }
                }
            }
        }
        self.complete_phase(cx, Phase::AwaitingApproval);
        Ok(Entry::Execute { resuming: false })
    }

    fn work_ctx(&self, cx: &Cx) -> Arc<WorkCtx<C>> {
        Arc::new(WorkCtx {
            invoker: self.invoker(),
            executor_chain: self.chain(cx, AgentRole::Executor),
            auditor_chain: self.chain(cx, AgentRole::Auditor),
            bus: Arc::clone(&cx.bus),
            validator: SyntaxValidator::new(&self.config.languages),
            project_root: self.project_root.clone(),
            task: cx.session.task.clone(),
            overrides: self.config.prompts.clone(),
            cancel: self.cancel.clone(),
        })
    }

    fn pool_options(&self) -> PoolOptions {
        let parallel = self
            .options
            .parallel
            .unwrap_or(self.config.execution.parallel);
        let concurrency = if parallel {
            self.options
                .max_concurrency
                .unwrap_or(self.config.execution.max_concurrency)
        } else {
            1
        };
        PoolOptions::with_concurrency(concurrency)
    }

    async fn phase_execute(&self, cx: &mut Cx, resuming: bool) -> Result<Entry, EngineError> {
        let first_round = cx.session.iteration == 0;
        let resuming_mid_round = resuming && !first_round;
        if !resuming_mid_round {
            if cx.session.iteration >= self.config.execution.max_iterations {
                return Ok(Entry::Recover);
            }
            cx.session.iteration += 1;
        }
        let iteration = cx.session.iteration;
        let phase = if resuming_mid_round
            && matches!(cx.session.phase, Phase::Executing | Phase::Fixing)
        {
            cx.session.phase
        } else if first_round {
            Phase::Executing
        } else {
            Phase::Fixing
        };
        self.enter_phase(cx, phase)?;
        cx.bus.emit(Event::Iteration {
            iteration,
            max: self.config.execution.max_iterations,
        });

        // Checkpoint all planned paths before mutating the working tree.
        let all_paths: Vec<String> = cx.session.files.iter().map(|f| f.path.clone()).collect();
        let label = format!("before-{phase}-{iteration}");
        let meta = self.store.create_checkpoint(
            &mut cx.session,
            &self.project_root,
            &label,
            &all_paths,
            &self.ids,
        )?;
        for file in &mut cx.session.files {
            file.checkpoint = Some(meta.id.clone());
        }
        cx.checkpoint = Some(meta.id);

        let targets: Vec<FileDirective> = cx
            .session
            .files
            .iter()
            .filter(|f| {
                matches!(
                    f.status,
                    FileStatus::Pending | FileStatus::Running | FileStatus::AuditRejected
                )
            })
            .map(|f| FileDirective {
                path: f.path.clone(),
                summary: f.description.clone(),
            })
            .collect();

        if targets.is_empty() {
            self.complete_phase(cx, phase);
            return Ok(Entry::Audit);
        }

        cx.session
            .set_agent_status(AgentRole::Executor, AgentStatus::Running, None);
        self.store.save(&mut cx.session)?;

        let outcomes = self.generate_files(cx, &targets, false).await;
        let mut any_generated = false;
        for outcome in &outcomes {
            self.apply_work_outcome(cx, outcome, false)?;
            any_generated |= outcome.generated;
        }
        cx.session.set_agent_status(
            AgentRole::Executor,
            AgentStatus::Completed,
            Some(outcomes.iter().map(|o| o.duration_ms).max().unwrap_or(0)),
        );
        self.store.save(&mut cx.session)?;
        self.complete_phase(cx, phase);

        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if any_generated {
            Ok(Entry::Audit)
        } else {
            Ok(Entry::Recover)
        }
    }

    /// Run the executor (and in pipeline mode the auditor) over `targets`
    /// through the bounded pool.
    async fn generate_files(
        &self,
        cx: &Cx,
        targets: &[FileDirective],
        pipeline: bool,
    ) -> Vec<WorkOutcome> {
        let work = self.work_ctx(cx);
        let total = targets.len();
        let progress_bus = Arc::clone(&cx.bus);
        let progress: ProgressFn = Arc::new(move |completed, total| {
            progress_bus.emit(Event::ParallelProgress { completed, total });
        });

        let results = run_pool(
            targets.to_vec(),
            self.pool_options(),
            self.cancel.clone(),
            Some(progress),
            move |index, directive| {
                let work = Arc::clone(&work);
                async move {
                    Ok::<WorkOutcome, String>(
                        execute_one(&work, index, total, directive, pipeline).await,
                    )
                }
            },
        )
        .await;

        results
            .into_iter()
            .zip(targets)
            .map(|(result, directive)| match result {
                Ok(outcome) => outcome,
                Err(e) => WorkOutcome {
                    path: directive.path.clone(),
                    attempts: Vec::new(),
                    audit_attempts: Vec::new(),
                    duration_ms: 0,
                    generated: false,
                    approved: None,
                    syntax: None,
                    error: Some(e.to_string()),
                    output_hash: None,
                },
            })
            .collect()
    }

    /// Fold one worker result into the session (kernel thread only).
    fn apply_work_outcome(
        &self,
        cx: &mut Cx,
        outcome: &WorkOutcome,
        pipeline: bool,
    ) -> Result<(), EngineError> {
        let step = self.begin_step(cx, AgentRole::Executor, Some(outcome.path.clone()));
        self.finish_step(
            cx,
            step,
            outcome.attempts.clone(),
            outcome.output_hash.clone(),
            outcome.generated,
        );
        if pipeline && !outcome.audit_attempts.is_empty() {
            let audit_step = self.begin_step(cx, AgentRole::Auditor, Some(outcome.path.clone()));
            self.finish_step(
                cx,
                audit_step,
                outcome.audit_attempts.clone(),
                None,
                outcome.approved.is_some(),
            );
        }

        let Some(record) = cx.session.file_mut(&outcome.path) else {
            return Ok(());
        };
        if record.status == FileStatus::Pending || record.status == FileStatus::AuditRejected {
            let _ = record.set_status(FileStatus::Running);
        }
        record.last_duration_ms = Some(outcome.duration_ms);
        record.last_error = outcome.error.clone();

        if outcome.generated {
            record.set_status(FileStatus::Generated).map_err(|e| {
                EngineError::Other(e.to_string())
            })?;
            if let Some((SyntaxOutcome::Failed, detail)) = &outcome.syntax {
                record.last_error = detail.clone();
            }
            if pipeline {
                match outcome.approved {
                    Some(true) => {
                        let _ = record.set_status(FileStatus::Complete);
                    }
                    Some(false) | None => {
                        let _ = record.set_status(FileStatus::AuditRejected);
                        let _ = record.set_status(FileStatus::InRecovery);
                    }
                }
            }
        } else {
            let _ = record.set_status(FileStatus::InRecovery);
        }
        self.store.save(&mut cx.session)?;
        Ok(())
    }

    async fn phase_execute_pipeline(&self, cx: &mut Cx) -> Result<Entry, EngineError> {
        cx.session.iteration = 1;
        self.enter_phase(cx, Phase::Executing)?;
        cx.bus.emit(Event::Iteration {
            iteration: 1,
            max: self.config.execution.max_iterations,
        });

        let all_paths: Vec<String> = cx.session.files.iter().map(|f| f.path.clone()).collect();
        let meta = self.store.create_checkpoint(
            &mut cx.session,
            &self.project_root,
            "before-executing-1",
            &all_paths,
            &self.ids,
        )?;
        for file in &mut cx.session.files {
            file.checkpoint = Some(meta.id.clone());
        }
        cx.checkpoint = Some(meta.id);

        let targets = cx.directives.clone();
        let outcomes = self.generate_files(cx, &targets, true).await;
        for outcome in &outcomes {
            self.apply_work_outcome(cx, outcome, true)?;
        }
        self.complete_phase(cx, Phase::Executing);

        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let needs_recovery = cx
            .session
            .files
            .iter()
            .any(|f| f.status == FileStatus::InRecovery);
        if needs_recovery {
            Ok(Entry::Recover)
        } else {
            Ok(Entry::Test)
        }
    }

    async fn phase_audit(&self, cx: &mut Cx) -> Result<Entry, EngineError> {
        self.enter_phase(cx, Phase::Auditing)?;

        let generated: Vec<String> = cx
            .session
            .files
            .iter()
            .filter(|f| f.status == FileStatus::Generated)
            .map(|f| f.path.clone())
            .collect();

        if generated.is_empty() {
            self.complete_phase(cx, Phase::Auditing);
            return Ok(self.after_audit_success(cx));
        }

        let contents: Vec<(String, String)> = generated
            .iter()
            .map(|path| {
                let text = std::fs::read_to_string(self.project_root.join(path))
                    .unwrap_or_default();
                (path.clone(), text)
            })
            .collect();

        cx.session
            .set_agent_status(AgentRole::Auditor, AgentStatus::Running, None);
        let step = self.begin_step(cx, AgentRole::Auditor, None);
        let prompt = prompts::auditor(&self.config.prompts, &cx.session.task, &contents);
        let chain = self.chain(cx, AgentRole::Auditor);
        let invoker = self.invoker();
        let report = match invoker
            .invoke(&chain, &prompt, None, Some(&self.project_root), &self.cancel)
            .await
        {
            Ok(outcome) => {
                let report = parse_audit(&outcome.text, &generated);
                self.finish_step(
                    cx,
                    step,
                    outcome.attempts.clone(),
                    Some(hash_text(&outcome.text)),
                    true,
                );
                cx.session.set_agent_status(
                    AgentRole::Auditor,
                    AgentStatus::Completed,
                    Some(outcome.duration_ms),
                );
                self.store
                    .save_agent_output(&cx.session.id, AgentRole::Auditor, &outcome.text)?;
                report
            }
            Err((error, attempts)) => {
                self.finish_step(cx, step, attempts, None, false);
                cx.session
                    .set_agent_status(AgentRole::Auditor, AgentStatus::Failed, None);
                self.store.save(&mut cx.session)?;
                return Err(EngineError::Other(format!("auditor failed: {error}")));
            }
        };
        self.store
            .write_json(&cx.session.id, "audit-result.json", &report)?;

        for path in &generated {
            let issues: Vec<String> = report
                .issues
                .iter()
                .filter(|i| i.path.as_deref() == Some(path.as_str()) || i.path.is_none())
                .map(|i| i.description.clone())
                .collect();
            cx.bus.emit(Event::FileAudit {
                path: path.clone(),
                approved: issues.is_empty(),
                issues,
            });
        }

        // Output-hash change detection across audit rounds.
        let fingerprint = audit_fingerprint(&contents, &report);
        let converged = cx.last_fingerprint.as_deref() == Some(fingerprint.as_str());
        cx.last_fingerprint = Some(fingerprint);

        if report.approved {
            for file in &mut cx.session.files {
                if file.status == FileStatus::Generated {
                    let _ = file.set_status(FileStatus::AuditApproved);
                    let _ = file.set_status(FileStatus::Complete);
                }
            }
            self.store.save(&mut cx.session)?;
            self.complete_phase(cx, Phase::Auditing);
            return Ok(self.after_audit_success(cx));
        }

        let flagged = report.flagged_paths(&generated);
        for file in &mut cx.session.files {
            if file.status == FileStatus::Generated {
                if flagged.contains(&file.path) {
                    let _ = file.set_status(FileStatus::AuditRejected);
                } else {
                    let _ = file.set_status(FileStatus::AuditApproved);
                    let _ = file.set_status(FileStatus::Complete);
                }
            }
        }
        self.store.save(&mut cx.session)?;
        self.complete_phase(cx, Phase::Auditing);

        if converged {
            tracing::info!(session = %cx.session.id, "audit converged, no further change expected");
            self.store.set_phase(&mut cx.session, Phase::MaxIterations)?;
            return Ok(Entry::Recover);
        }
        if cx.session.iteration >= self.config.execution.max_iterations {
            self.store.set_phase(&mut cx.session, Phase::MaxIterations)?;
            return Ok(Entry::Recover);
        }
        Ok(Entry::Execute { resuming: false })
    }

    /// After a clean audit: recovery for stragglers, then tests and commit.
    fn after_audit_success(&self, cx: &Cx) -> Entry {
        let needs_recovery = cx
            .session
            .files
            .iter()
            .any(|f| matches!(f.status, FileStatus::InRecovery | FileStatus::AuditRejected));
        if needs_recovery {
            Entry::Recover
        } else {
            Entry::Test
        }
    }

    async fn phase_recover(&self, cx: &mut Cx) -> Result<Entry, EngineError> {
        self.enter_phase(cx, Phase::Recovery)?;

        // Files the loop could not land: chain failures and leftover
        // rejections.
        for file in &mut cx.session.files {
            if file.status == FileStatus::AuditRejected {
                let _ = file.set_status(FileStatus::InRecovery);
            }
        }
        self.store.save(&mut cx.session)?;

        let targets: Vec<(String, String, Option<String>)> = cx
            .session
            .files
            .iter()
            .filter(|f| f.status == FileStatus::InRecovery)
            .map(|f| (f.path.clone(), f.description.clone(), f.last_error.clone()))
            .collect();

        if targets.is_empty() {
            self.complete_phase(cx, Phase::Recovery);
            return Ok(Entry::Test);
        }

        let budget = recovery_budget(self.config.recovery.recovery_timeout_minutes);
        let branch = self.recover_targets(cx, &targets);
        let timed_out = tokio::time::timeout(budget, branch).await.is_err();
        if timed_out {
            tracing::warn!(session = %cx.session.id, "recovery branch timed out");
        }

        // Anything still in recovery is abandoned (and reverted when
        // configured).
        let revert = self.config.recovery.auto_revert_on_failure;
        let leftovers: Vec<String> = cx
            .session
            .files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::InRecovery | FileStatus::Running))
            .map(|f| f.path.clone())
            .collect();
        for path in leftovers {
            self.abandon_file(cx, &path, revert, "recovery exhausted")?;
        }
        self.store.save(&mut cx.session)?;
        self.complete_phase(cx, Phase::Recovery);
        Ok(Entry::Test)
    }

    async fn recover_targets(
        &self,
        cx: &mut Cx,
        targets: &[(String, String, Option<String>)],
    ) {
        let invoker = self.invoker();
        let validator = SyntaxValidator::new(&self.config.languages);
        let consultant_chain = self.chain(cx, AgentRole::Consultant);
        let executor_chain = self.chain(cx, AgentRole::Executor);
        let revert = self.config.recovery.auto_revert_on_failure;

        for (path, summary, last_error) in targets {
            if self.cancel.is_cancelled() {
                return;
            }
            // Consultant runs under its own phase flag, then control comes
            // back to recovery.
            if self.enter_consulting(cx).is_err() {
                return;
            }
            let recovery_cx = RecoveryContext {
                invoker: &invoker,
                consultant_chain: &consultant_chain,
                executor_chain: &executor_chain,
                validator: &validator,
                sink: cx.bus.as_ref(),
                overrides: &self.config.prompts,
                project_root: &self.project_root,
                task: &cx.session.task,
                max_attempts: self.config.recovery.max_recovery_attempts,
                cancel: &self.cancel,
            };
            let trace = recover_file(&recovery_cx, path, summary, last_error.as_deref()).await;
            if self.leave_consulting(cx).is_err() {
                return;
            }

            let consultant_step =
                self.begin_step(cx, AgentRole::Consultant, Some(path.clone()));
            self.finish_step(
                cx,
                consultant_step,
                trace.consultant_attempts.clone(),
                trace.guidance.as_deref().map(hash_text),
                trace.guidance.is_some(),
            );
            let executor_step = self.begin_step(cx, AgentRole::Executor, Some(path.clone()));
            let recovered = matches!(trace.outcome, FileRecovery::Recovered { .. });
            self.finish_step(
                cx,
                executor_step,
                trace.executor_attempts.clone(),
                None,
                recovered,
            );

            match trace.outcome {
                FileRecovery::Recovered { .. } => {
                    if let Some(record) = cx.session.file_mut(path) {
                        let _ = record.set_status(FileStatus::Running);
                        let _ = record.set_status(FileStatus::Generated);
                        let _ = record.set_status(FileStatus::AuditApproved);
                        let _ = record.set_status(FileStatus::Complete);
                        record.last_error = None;
                    }
                }
                FileRecovery::Abandoned { reason } => {
                    let _ = self.abandon_file(cx, path, revert, &reason);
                }
            }
            if self.store.save(&mut cx.session).is_err() {
                return;
            }
        }
    }

    fn enter_consulting(&self, cx: &mut Cx) -> Result<(), EngineError> {
        self.store.set_phase(&mut cx.session, Phase::Consulting)?;
        cx.bus.emit(Event::PhaseStart {
            phase: Phase::Consulting,
        });
        Ok(())
    }

    fn leave_consulting(&self, cx: &mut Cx) -> Result<(), EngineError> {
        cx.bus.emit(Event::PhaseComplete {
            phase: Phase::Consulting,
        });
        self.store.set_phase(&mut cx.session, Phase::Recovery)?;
        Ok(())
    }

    fn abandon_file(
        &self,
        cx: &mut Cx,
        path: &str,
        revert: bool,
        reason: &str,
    ) -> Result<(), EngineError> {
        if revert {
            let checkpoint = cx
                .session
                .file(path)
                .and_then(|f| f.checkpoint.clone())
                .or_else(|| cx.checkpoint.clone());
            if let Some(checkpoint) = checkpoint {
                if let Err(e) =
                    self.store
                        .revert_file(&cx.session, &self.project_root, &checkpoint, path)
                {
                    tracing::warn!(path, error = %e, "checkpoint revert failed");
                }
            }
        }
        if let Some(record) = cx.session.file_mut(path) {
            record.last_error = Some(reason.to_string());
            let _ = record.set_status(FileStatus::Abandoned);
            cx.bus.emit(Event::FileComplete {
                path: path.to_string(),
                status: FileStatus::Abandoned,
                duration_ms: record.last_duration_ms.unwrap_or(0),
            });
        }
        Ok(())
    }

    async fn phase_test(&self, cx: &mut Cx) -> Result<Entry, EngineError> {
        let enabled = self.options.run_tests || self.config.test.run_after_generation;
        if !enabled {
            return Ok(Entry::Commit);
        }
        let command = self
            .options
            .test_command
            .clone()
            .or_else(|| self.config.test.command.clone())
            .or_else(|| detect_test_command(&self.project_root));
        let Some(command) = command else {
            tracing::warn!("test phase enabled but no test command detected");
            return Ok(Entry::Commit);
        };

        self.enter_phase(cx, Phase::Testing)?;
        cx.bus.emit(Event::TestStart {
            command: command.clone(),
        });
        let outcome = run_tests(
            &self.project_root,
            &command,
            Duration::from_millis(self.config.test.timeout),
            &self.cancel,
        )
        .await;
        cx.bus.emit(Event::TestComplete {
            success: outcome.success,
            duration_ms: outcome.duration_ms,
        });
        if !outcome.success {
            // A failing test run downgrades nothing; the session completes.
            tracing::warn!(tail = %outcome.output_tail, "test run failed");
        }
        self.complete_phase(cx, Phase::Testing);
        Ok(Entry::Commit)
    }

    async fn phase_commit(&self, cx: &mut Cx) -> Result<Entry, EngineError> {
        let enabled = self.options.commit || self.config.git.auto_commit;
        if !enabled {
            return Ok(Entry::Finish);
        }
        let template = self
            .options
            .commit_message
            .clone()
            .unwrap_or_else(|| self.config.git.commit_message_template.clone());
        let message = render_commit_message(&template, &cx.session.task);

        self.enter_phase(cx, Phase::Committing)?;
        cx.bus.emit(Event::CommitStart {
            message: message.clone(),
        });
        let outcome = commit_all(
            &self.project_root,
            &message,
            self.config.git.branch.as_deref(),
            &self.cancel,
        )
        .await;
        cx.bus.emit(Event::CommitComplete {
            success: outcome.success,
            commit: outcome.commit.clone(),
        });
        if !outcome.success {
            tracing::warn!(detail = ?outcome.detail, "commit failed");
        }
        self.complete_phase(cx, Phase::Committing);
        Ok(Entry::Finish)
    }

    async fn phase_finish(&self, cx: &mut Cx) -> Result<Entry, EngineError> {
        let complete = cx
            .session
            .files
            .iter()
            .filter(|f| f.status == FileStatus::Complete)
            .count();
        let success = cx.session.files.is_empty() || complete > 0;
        if success {
            self.store.set_phase(&mut cx.session, Phase::Completed)?;
        } else {
            self.store.force_phase(
                &mut cx.session,
                Phase::Failed,
                Some("no file reached a complete state".to_string()),
            )?;
        }
        Ok(Entry::Done)
    }

    fn outcome(&self, cx: &Cx) -> SessionOutcome {
        SessionOutcome {
            session_id: cx.session.id.clone(),
            phase: cx.session.phase,
            iteration: cx.session.iteration,
            files_complete: cx
                .session
                .files
                .iter()
                .filter(|f| f.status == FileStatus::Complete)
                .count(),
            files_abandoned: cx
                .session
                .files
                .iter()
                .filter(|f| f.status == FileStatus::Abandoned)
                .count(),
            total_cost: cx.session.metrics.total_cost,
            error: cx.session.error.clone(),
        }
    }
}

/// One worker's unit of work: generate a file, check syntax, and in
/// pipeline mode audit it immediately.
async fn execute_one<C: Clock>(
    work: &WorkCtx<C>,
    index: usize,
    total: usize,
    directive: FileDirective,
    pipeline: bool,
) -> WorkOutcome {
    work.bus.emit(Event::FileStart {
        path: directive.path.clone(),
        index,
        total,
    });
    let started = std::time::Instant::now();
    let target = work.project_root.join(&directive.path);
    let prompt = prompts::executor(&work.overrides, &work.task, &directive, None);

    let mut outcome = WorkOutcome {
        path: directive.path.clone(),
        attempts: Vec::new(),
        audit_attempts: Vec::new(),
        duration_ms: 0,
        generated: false,
        approved: None,
        syntax: None,
        error: None,
        output_hash: None,
    };

    match work
        .invoker
        .invoke(
            &work.executor_chain,
            &prompt,
            Some(&target),
            Some(&work.project_root),
            &work.cancel,
        )
        .await
    {
        Ok(result) => {
            outcome.attempts = result.attempts;
            outcome.generated = true;
            outcome.output_hash = Some(hash_text(&result.text));

            let (syntax, detail) = work.validator.check(&target, &work.cancel).await;
            work.bus.emit(Event::SyntaxCheck {
                path: directive.path.clone(),
                outcome: syntax,
                detail: detail.clone(),
            });
            outcome.syntax = Some((syntax, detail));

            if pipeline {
                let contents = std::fs::read_to_string(&target).unwrap_or_default();
                let audit_prompt = prompts::auditor(
                    &work.overrides,
                    &work.task,
                    &[(directive.path.clone(), contents)],
                );
                match work
                    .invoker
                    .invoke(
                        &work.auditor_chain,
                        &audit_prompt,
                        None,
                        Some(&work.project_root),
                        &work.cancel,
                    )
                    .await
                {
                    Ok(audit) => {
                        outcome.audit_attempts = audit.attempts;
                        let report =
                            parse_audit(&audit.text, std::slice::from_ref(&directive.path));
                        let approved =
                            report.approved && outcome.syntax_ok();
                        work.bus.emit(Event::FileAudit {
                            path: directive.path.clone(),
                            approved,
                            issues: report
                                .issues
                                .iter()
                                .map(|i| i.description.clone())
                                .collect(),
                        });
                        outcome.approved = Some(approved);
                    }
                    Err((error, attempts)) => {
                        outcome.audit_attempts = attempts;
                        outcome.error = Some(format!("audit failed: {error}"));
                        outcome.approved = Some(false);
                    }
                }
            }
        }
        Err((error, attempts)) => {
            outcome.attempts = attempts;
            outcome.error = Some(error.to_string());
        }
    }

    outcome.duration_ms = started.elapsed().as_millis() as u64;
    let status = if outcome.generated {
        if outcome.approved == Some(true) {
            FileStatus::Complete
        } else {
            FileStatus::Generated
        }
    } else {
        FileStatus::InRecovery
    };
    work.bus.emit(Event::FileComplete {
        path: directive.path,
        status,
        duration_ms: outcome.duration_ms,
    });
    outcome
}

impl WorkOutcome {
    fn syntax_ok(&self) -> bool {
        !matches!(self.syntax, Some((SyntaxOutcome::Failed, _)))
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint for convergence detection: generated contents plus the
/// normalized issue list.
fn audit_fingerprint(contents: &[(String, String)], report: &AuditReport) -> String {
    let mut hasher = Sha256::new();
    for (path, body) in contents {
        hasher.update(path.as_bytes());
        hasher.update(b"\0");
        hasher.update(body.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(report.fingerprint_text().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "kernel_tests.rs"]
mod tests;
