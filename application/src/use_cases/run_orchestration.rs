//! Run Orchestration use case
//!
//! Drives one case from transcript to terminal state:
//!
//! 1. Score complexity and select the strategy for its level
//! 2. First pass: the editor drafts, each advisor reviews the draft
//! 3. Evaluate the last confidence against the strategy threshold
//! 4. Refinement rounds until converged or out of rounds: the editor
//!    rewrites its draft from advisor feedback; from round 2 on the
//!    advisors review the refined draft first
//!
//! Every invocation becomes exactly one step in the run trace, retries
//! included. Gateway failures and cancellation end the run as `FAILED` and
//! still return the partial trace. A persona missing from the registry is a
//! deployment error and is returned as `Err`, carrying the partial run.

use crate::config::ExecutionParams;
use crate::ports::llm_gateway::{GatewayError, GatewayResponse, LlmGateway};
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::trace_recorder::{NoTraceRecorder, TraceRecorder};
use crate::use_cases::shared::{cancellable, is_cancelled};
use chrono::Utc;
use middleware_domain::{
    AdvisorFeedback, CaseInput, ComplexityAnalyzer, ComplexityScore, DomainError, Evaluation,
    OrchestrationRun, OrchestrationState, PersonaConfig, PersonaInput, PersonaRegistry,
    PersonaRole, RunTrace, StepRecord, StepStatus, Strategy, StrategyTable, TerminationReason,
    evaluate, output_payload, parse_confidence,
};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors that prevent a run from producing a trace of its own
#[derive(Error, Debug)]
pub enum RunOrchestrationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A persona named by the strategy is not registered. The run up to the
    /// failing lookup is attached.
    #[error("Configuration error: {source}")]
    Configuration {
        source: DomainError,
        run: Box<OrchestrationRun>,
    },

    #[error("Orchestration state error: {0}")]
    State(DomainError),
}

impl RunOrchestrationError {
    /// The partial run, when one exists.
    pub fn partial_run(&self) -> Option<&OrchestrationRun> {
        match self {
            RunOrchestrationError::Configuration { run, .. } => Some(run),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, RunOrchestrationError::Configuration { .. })
    }
}

/// Why the orchestration loop stopped early
enum Halt {
    Terminate(TerminationReason),
    Configuration(DomainError),
    State(DomainError),
}

/// Successful output of one persona invocation
struct Invocation {
    text: String,
    output: Value,
    confidence: f64,
}

/// Final outcome of the retry loop around one gateway call
enum CallOutcome {
    Success {
        response: GatewayResponse,
        attempts: u32,
    },
    Failed {
        error: GatewayError,
        attempts: u32,
    },
    Cancelled {
        attempts: u32,
    },
}

/// Per-run mutable state threaded through the loop
struct ActiveRun<'a> {
    input: &'a CaseInput,
    registry: &'a PersonaRegistry,
    trace: RunTrace,
    state: OrchestrationState,
    /// Last confidence reported by a successful step
    last_confidence: f64,
    progress: &'a dyn ProgressNotifier,
}

impl ActiveRun<'_> {
    fn advance(&mut self, next: OrchestrationState) -> Result<(), Halt> {
        self.state = self.state.transition(next).map_err(Halt::State)?;
        Ok(())
    }
}

/// Use case for orchestrating personas over one clinical case
///
/// Holds only shared, read-only collaborators, so one instance can serve
/// many concurrent runs.
pub struct RunOrchestrationUseCase<G: LlmGateway + 'static> {
    gateway: Arc<G>,
    registry: Arc<PersonaRegistry>,
    strategies: Arc<StrategyTable>,
    analyzer: ComplexityAnalyzer,
    recorder: Arc<dyn TraceRecorder>,
    params: ExecutionParams,
    cancellation_token: Option<CancellationToken>,
}

impl<G: LlmGateway + 'static> RunOrchestrationUseCase<G> {
    pub fn new(
        gateway: Arc<G>,
        registry: Arc<PersonaRegistry>,
        strategies: Arc<StrategyTable>,
        analyzer: ComplexityAnalyzer,
    ) -> Self {
        Self {
            gateway,
            registry,
            strategies,
            analyzer,
            recorder: Arc::new(NoTraceRecorder),
            params: ExecutionParams::default(),
            cancellation_token: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn TraceRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_params(mut self, params: ExecutionParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(
        &self,
        input: CaseInput,
    ) -> Result<OrchestrationRun, RunOrchestrationError> {
        self.execute_with_progress(input, &NoProgress).await
    }

    /// Execute the use case with progress callbacks
    pub async fn execute_with_progress(
        &self,
        input: CaseInput,
        progress: &dyn ProgressNotifier,
    ) -> Result<OrchestrationRun, RunOrchestrationError> {
        self.run(input, &self.registry, None, progress).await
    }

    /// Re-run a case against the complexity, strategy and persona versions
    /// recorded in `previous`, regardless of what the registry and analyzer
    /// hold today.
    pub async fn replay(
        &self,
        input: CaseInput,
        previous: &OrchestrationRun,
        progress: &dyn ProgressNotifier,
    ) -> Result<OrchestrationRun, RunOrchestrationError> {
        let pinned = self
            .registry
            .pinned(&previous.persona_pins())
            .map_err(|e| RunOrchestrationError::InvalidInput(e.to_string()))?;
        let recorded = (previous.complexity, previous.strategy.clone());
        self.run(input, &pinned, Some(recorded), progress).await
    }

    async fn run(
        &self,
        input: CaseInput,
        registry: &PersonaRegistry,
        recorded: Option<(ComplexityScore, Strategy)>,
        progress: &dyn ProgressNotifier,
    ) -> Result<OrchestrationRun, RunOrchestrationError> {
        input
            .validate()
            .map_err(|e| RunOrchestrationError::InvalidInput(e.to_string()))?;
        let (complexity, strategy) = match recorded {
            Some(recorded) => recorded,
            None => {
                let complexity = self
                    .analyzer
                    .analyze(&input.transcript, input.hints.as_ref())
                    .map_err(|e| RunOrchestrationError::InvalidInput(e.to_string()))?;
                let strategy = self.strategies.select(complexity.level).clone();
                (complexity, strategy)
            }
        };
        let run_id = Uuid::new_v4().to_string();
        let clock = Instant::now();

        info!(
            run_id = %run_id,
            level = %complexity.level,
            score = complexity.score,
            personas = ?strategy.personas_sequence,
            "Starting orchestration run"
        );
        progress.on_run_start(&run_id, &strategy, &complexity);

        let mut active = ActiveRun {
            input: &input,
            registry,
            trace: RunTrace::new(run_id, strategy, complexity),
            state: OrchestrationState::SelectingStrategy,
            last_confidence: 0.0,
            progress,
        };

        let (reason, configuration_error) = match self.drive(&mut active).await {
            Ok(reason) | Err(Halt::Terminate(reason)) => (reason, None),
            Err(Halt::Configuration(e)) => (
                TerminationReason::Configuration {
                    message: e.to_string(),
                },
                Some(e),
            ),
            Err(Halt::State(e)) => return Err(RunOrchestrationError::State(e)),
        };

        let terminal = OrchestrationState::from(reason.terminal_state());
        if active.state != terminal {
            active.state = active
                .state
                .transition(terminal)
                .map_err(RunOrchestrationError::State)?;
        }

        let run = active.trace.finish(
            reason,
            active.last_confidence,
            clock.elapsed().as_millis() as u64,
        );

        if let Err(e) = self.recorder.finalize(&run) {
            warn!(run_id = %run.run_id, "Failed to record run: {}", e);
        }
        progress.on_run_complete(&run);

        info!(
            run_id = %run.run_id,
            state = %run.terminal_state,
            reason = %run.termination_reason.describe(),
            steps = run.steps.len(),
            confidence = run.final_confidence,
            "Orchestration run finished"
        );

        match configuration_error {
            Some(source) => Err(RunOrchestrationError::Configuration {
                source,
                run: Box::new(run),
            }),
            None => Ok(run),
        }
    }

    /// The orchestration loop. Returns the termination reason of a run that
    /// reached an evaluation-driven end.
    async fn drive(&self, run: &mut ActiveRun<'_>) -> Result<TerminationReason, Halt> {
        let strategy = run.trace.strategy().clone();
        let editor = strategy
            .editor()
            .ok_or_else(|| {
                Halt::Configuration(DomainError::Configuration(format!(
                    "strategy {} has no personas",
                    strategy.level
                )))
            })?
            .to_string();
        let advisors = strategy.advisors().to_vec();
        let transcript = run.input.transcript.clone();

        // First pass
        run.advance(OrchestrationState::InvokingPersona)?;
        let draft = self
            .invoke(
                run,
                &editor,
                PersonaRole::Editor,
                0,
                PersonaInput::Draft {
                    transcript: transcript.clone(),
                },
            )
            .await?;
        let mut draft_text = draft.text;
        let mut draft_output = draft.output;
        let mut feedback = self
            .review(run, &advisors, &transcript, &draft_output, 0)
            .await?;

        let mut rounds_completed = 0;
        let mut draft_repeated = false;
        loop {
            run.advance(OrchestrationState::EvaluatingConfidence)?;
            let confidence = run.last_confidence;
            match evaluate(&strategy, confidence, rounds_completed, draft_repeated) {
                Evaluation::Finish(reason) => {
                    debug!(
                        confidence,
                        threshold = strategy.confidence_threshold,
                        "Run finished: {}",
                        reason.describe()
                    );
                    run.advance(reason.terminal_state().into())?;
                    return Ok(reason);
                }
                Evaluation::Refine { round } => {
                    debug!(
                        round,
                        confidence,
                        threshold = strategy.confidence_threshold,
                        "Below threshold, refining"
                    );
                    run.advance(OrchestrationState::Refining)?;
                    run.advance(OrchestrationState::InvokingPersona)?;

                    if round > 1 {
                        feedback = self
                            .review(run, &advisors, &transcript, &draft_output, round)
                            .await?;
                    }

                    let refined = self
                        .invoke(
                            run,
                            &editor,
                            PersonaRole::Editor,
                            round,
                            PersonaInput::Refine {
                                transcript: transcript.clone(),
                                previous_draft: draft_output.clone(),
                                feedback: std::mem::take(&mut feedback),
                                round,
                            },
                        )
                        .await?;

                    draft_repeated = refined.text == draft_text;
                    if draft_repeated {
                        warn!(
                            round,
                            persona = %editor,
                            "Refined draft identical to previous draft"
                        );
                    }
                    draft_text = refined.text;
                    draft_output = refined.output;
                    rounds_completed = round;
                }
            }
        }
    }

    /// Have every advisor review the current draft, in sequence order.
    async fn review(
        &self,
        run: &mut ActiveRun<'_>,
        advisors: &[String],
        transcript: &str,
        draft: &Value,
        round: u32,
    ) -> Result<Vec<AdvisorFeedback>, Halt> {
        let mut feedback = Vec::with_capacity(advisors.len());
        for advisor in advisors {
            run.advance(OrchestrationState::InvokingPersona)?;
            let review = self
                .invoke(
                    run,
                    advisor,
                    PersonaRole::Advisor,
                    round,
                    PersonaInput::Review {
                        transcript: transcript.to_string(),
                        draft: draft.clone(),
                        round,
                    },
                )
                .await?;
            feedback.push(AdvisorFeedback {
                persona_id: advisor.clone(),
                confidence: review.confidence,
                feedback: review.output,
            });
        }
        Ok(feedback)
    }

    /// Invoke one persona (with retries) and append exactly one step.
    async fn invoke(
        &self,
        run: &mut ActiveRun<'_>,
        persona_id: &str,
        role: PersonaRole,
        round: u32,
        input: PersonaInput,
    ) -> Result<Invocation, Halt> {
        if is_cancelled(&self.cancellation_token) {
            return Err(Halt::Terminate(TerminationReason::Cancelled));
        }
        let persona = run
            .registry
            .get(persona_id)
            .map_err(Halt::Configuration)?;

        let step_number = run.trace.next_step_number();
        run.progress
            .on_step_start(step_number, persona_id, role, round);
        debug!(
            step = step_number,
            persona = persona_id,
            version = persona.version,
            task = input.task(),
            round,
            "Invoking persona"
        );

        let rendered = input.render();
        let timeout = Duration::from_millis(run.trace.strategy().call_timeout_ms);
        let started_at = Utc::now();
        let outcome = self
            .call_with_retry(&persona, &rendered, timeout, run.progress)
            .await;
        let ended_at = Utc::now();

        let mut step = StepRecord {
            step_number,
            persona_id: persona_id.to_string(),
            persona_version: persona.version,
            role,
            round,
            input_digest: input.digest(),
            output: Value::Null,
            confidence: 0.0,
            started_at,
            ended_at,
            status: StepStatus::Failed,
            attempts: 0,
            tokens_used: 0,
            latency_ms: 0,
            error: None,
        };

        let result = match outcome {
            CallOutcome::Success { response, attempts } => {
                let confidence = response
                    .confidence
                    .filter(|c| c.is_finite())
                    .or_else(|| parse_confidence(&response.text))
                    .unwrap_or_else(|| {
                        warn!(
                            persona = persona_id,
                            "No confidence in persona output, assuming {}",
                            self.params.missing_confidence
                        );
                        self.params.missing_confidence
                    })
                    .clamp(0.0, 1.0);
                let output = output_payload(&response.text);

                step.output = output.clone();
                step.confidence = confidence;
                step.status = if attempts > 1 {
                    StepStatus::Retried
                } else {
                    StepStatus::Ok
                };
                step.attempts = attempts;
                step.tokens_used = response.tokens_used;
                step.latency_ms = response.latency_ms;
                run.last_confidence = confidence;

                Ok(Invocation {
                    text: response.text,
                    output,
                    confidence,
                })
            }
            CallOutcome::Failed { error, attempts } => {
                warn!(
                    persona = persona_id,
                    attempts, "Persona invocation failed: {}", error
                );
                step.attempts = attempts;
                step.error = Some(error.to_string());
                Err(Halt::Terminate(TerminationReason::GatewayFailure {
                    persona_id: persona_id.to_string(),
                    message: error.to_string(),
                    transient: error.is_transient(),
                }))
            }
            CallOutcome::Cancelled { attempts } => {
                info!(persona = persona_id, attempts, "Run cancelled between retries");
                step.attempts = attempts;
                step.error = Some("cancelled".to_string());
                Err(Halt::Terminate(TerminationReason::Cancelled))
            }
        };

        run.trace.push(step);
        if let Some(recorded) = run.trace.steps().last() {
            if let Err(e) = self.recorder.append(run.trace.run_id(), recorded) {
                warn!(run_id = %run.trace.run_id(), "Failed to record step: {}", e);
            }
            run.progress.on_step_complete(recorded);
        }

        result
    }

    /// Call the gateway, retrying transient failures with backoff.
    ///
    /// Each attempt is bounded by `timeout`; an elapsed timeout is a
    /// transient failure. Cancellation is observed before every attempt and
    /// while backing off; a call already in flight runs to completion.
    async fn call_with_retry(
        &self,
        persona: &PersonaConfig,
        input: &str,
        timeout: Duration,
        progress: &dyn ProgressNotifier,
    ) -> CallOutcome {
        let policy = self.params.retry;
        let mut attempts = 0;

        loop {
            if is_cancelled(&self.cancellation_token) {
                return CallOutcome::Cancelled { attempts };
            }
            attempts += 1;

            let result = tokio::time::timeout(timeout, self.gateway.invoke(persona, input))
                .await
                .unwrap_or(Err(GatewayError::Timeout));

            let error = match result {
                Ok(response) => return CallOutcome::Success { response, attempts },
                Err(error) => error,
            };

            if !error.is_transient() || attempts >= policy.max_attempts() {
                return CallOutcome::Failed { error, attempts };
            }

            let jitter_sample: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
            let delay = policy.delay_for(attempts, jitter_sample);
            warn!(
                persona = %persona.id,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Transient gateway error, retrying: {}",
                error
            );
            progress.on_retry(&persona.id, attempts, &error);

            if cancellable(&self.cancellation_token, tokio::time::sleep(delay))
                .await
                .is_none()
            {
                return CallOutcome::Cancelled { attempts };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::trace_recorder::RecorderError;
    use async_trait::async_trait;
    use middleware_domain::{
        ComplexityLevel, ComplexityWeights, LevelBreakpoints, PersonaConfig, RetryPolicy,
        StructuredHints, TerminalState, input_digest,
    };
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    // ==================== Test Infrastructure ====================

    const EDITOR: &str = "soap_editor";
    const CLINICAL: &str = "clinical_advisor";
    const SAFETY: &str = "medication_safety_advisor";

    /// A scripted gateway reply
    #[derive(Debug, Clone)]
    enum Scripted {
        Reply(String, f64),
        Fail(GatewayError),
        /// Replies after a delay in milliseconds
        Delayed(u64, String, f64),
        /// Never completes (for timeout tests)
        Hang,
    }

    fn reply(text: &str, confidence: f64) -> Scripted {
        Scripted::Reply(text.to_string(), confidence)
    }

    /// Mock gateway returning scripted replies per persona, in order
    struct ScriptedGateway {
        scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
        /// Reply used once a persona's script is exhausted
        fallback: Mutex<HashMap<String, Scripted>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedGateway {
        fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                fallback: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn script(self, persona: &str, replies: Vec<Scripted>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(persona.to_string(), replies.into());
            self
        }

        fn always(self, persona: &str, reply: Scripted) -> Self {
            self.fallback
                .lock()
                .unwrap()
                .insert(persona.to_string(), reply);
            self
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn next(&self, persona: &str) -> Scripted {
            if let Some(next) = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(persona)
                .and_then(VecDeque::pop_front)
            {
                return next;
            }
            self.fallback
                .lock()
                .unwrap()
                .get(persona)
                .cloned()
                .unwrap_or_else(|| {
                    Scripted::Fail(GatewayError::InvalidRequest(format!(
                        "no script left for {}",
                        persona
                    )))
                })
        }
    }

    #[async_trait]
    impl LlmGateway for ScriptedGateway {
        async fn invoke(
            &self,
            persona: &PersonaConfig,
            input: &str,
        ) -> Result<GatewayResponse, GatewayError> {
            self.calls
                .lock()
                .unwrap()
                .push((persona.id.clone(), input.to_string()));
            match self.next(&persona.id) {
                Scripted::Reply(text, confidence) => Ok(GatewayResponse::new(text)
                    .with_confidence(confidence)
                    .with_usage(120, 40)),
                Scripted::Delayed(delay_ms, text, confidence) => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok(GatewayResponse::new(text)
                        .with_confidence(confidence)
                        .with_usage(120, 40))
                }
                Scripted::Fail(error) => Err(error),
                Scripted::Hang => std::future::pending().await,
            }
        }
    }

    /// Recorder that keeps everything in memory
    #[derive(Default)]
    struct RecordingRecorder {
        steps: Mutex<Vec<(String, u32)>>,
        runs: Mutex<Vec<String>>,
    }

    impl TraceRecorder for RecordingRecorder {
        fn append(&self, run_id: &str, step: &StepRecord) -> Result<(), RecorderError> {
            self.steps
                .lock()
                .unwrap()
                .push((run_id.to_string(), step.step_number));
            Ok(())
        }

        fn finalize(&self, run: &OrchestrationRun) -> Result<(), RecorderError> {
            self.runs.lock().unwrap().push(run.run_id.clone());
            Ok(())
        }
    }

    /// Recorder whose storage is broken
    struct BrokenRecorder;

    impl TraceRecorder for BrokenRecorder {
        fn append(&self, _run_id: &str, _step: &StepRecord) -> Result<(), RecorderError> {
            Err(RecorderError::Io(std::io::Error::other("disk full")))
        }

        fn finalize(&self, _run: &OrchestrationRun) -> Result<(), RecorderError> {
            Err(RecorderError::Io(std::io::Error::other("disk full")))
        }
    }

    fn registry() -> PersonaRegistry {
        PersonaRegistry::with_personas([
            PersonaConfig::new(EDITOR, "gpt-4.1").with_system_prompt("Draft a SOAP note."),
            PersonaConfig::new(CLINICAL, "gpt-4.1").with_system_prompt("Review clinically."),
            PersonaConfig::new(SAFETY, "gpt-4.1").with_system_prompt("Review medications."),
        ])
        .unwrap()
    }

    fn hints(symptoms: u32, meds: u32, anomalies: u32, differentials: u32, emergency: bool) -> StructuredHints {
        StructuredHints {
            symptom_count: Some(symptoms),
            medication_count: Some(meds),
            vital_sign_count: Some(anomalies),
            vital_anomaly_count: Some(anomalies),
            differential_count: Some(differentials),
            ambiguous: Some(false),
            pediatric: Some(false),
            emergency: Some(emergency),
        }
    }

    fn simple_case() -> CaseInput {
        CaseInput::new("Mild sore throat for two days, no fever, eating and drinking normally.")
            .with_hints(hints(0, 0, 0, 0, false))
    }

    fn moderate_case() -> CaseInput {
        CaseInput::new("Cough, fatigue and headache for a week. Taking ibuprofen, loratadine, omeprazole.")
            .with_hints(hints(3, 3, 0, 1, false))
    }

    fn complex_case() -> CaseInput {
        CaseInput::new("Chest pain radiating to the left arm, dyspnea, diaphoresis. BP 170/105, HR 128.")
            .with_hints(hints(5, 4, 2, 2, false))
    }

    fn critical_case() -> CaseInput {
        CaseInput::new("Unresponsive patient, suspected overdose, on warfarin and insulin.")
            .with_hints(hints(5, 4, 2, 2, true))
    }

    fn fast_params() -> ExecutionParams {
        ExecutionParams::default().with_retry(RetryPolicy::default().with_base_delay_ms(1))
    }

    fn use_case(gateway: Arc<ScriptedGateway>) -> RunOrchestrationUseCase<ScriptedGateway> {
        use_case_with(gateway, StrategyTable::default(), registry())
    }

    fn use_case_with(
        gateway: Arc<ScriptedGateway>,
        table: StrategyTable,
        registry: PersonaRegistry,
    ) -> RunOrchestrationUseCase<ScriptedGateway> {
        RunOrchestrationUseCase::new(
            gateway,
            Arc::new(registry),
            Arc::new(table),
            ComplexityAnalyzer::default(),
        )
        .with_params(fast_params())
    }

    fn personas(run: &OrchestrationRun) -> Vec<&str> {
        run.steps.iter().map(|s| s.persona_id.as_str()).collect()
    }

    /// Default table with the call timeout of one level replaced
    fn table_with_timeout(level: ComplexityLevel, timeout_ms: u64) -> StrategyTable {
        let defaults = StrategyTable::default();
        StrategyTable::from_strategies(defaults.iter().cloned().map(|s| {
            if s.level == level {
                s.with_call_timeout_ms(timeout_ms)
            } else {
                s
            }
        }))
        .unwrap()
    }

    // ==================== Flow Tests ====================

    #[tokio::test]
    async fn test_simple_case_converges_in_one_step() {
        let gateway = Arc::new(
            ScriptedGateway::new().script(EDITOR, vec![reply("S: sore throat\nP: fluids", 0.82)]),
        );
        let run = use_case(gateway).execute(simple_case()).await.unwrap();

        assert_eq!(run.complexity.level, ComplexityLevel::Simple);
        assert_eq!(run.terminal_state, TerminalState::Converged);
        assert_eq!(run.termination_reason, TerminationReason::ThresholdMet);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].persona_id, EDITOR);
        assert_eq!(run.steps[0].status, StepStatus::Ok);
        assert_eq!(
            run.final_output,
            Some(Value::String("S: sore throat\nP: fluids".to_string()))
        );
        assert_eq!(run.final_confidence, 0.82);
        assert!(!run.doctor_context_requested);
    }

    #[tokio::test]
    async fn test_simple_case_below_threshold_does_not_refine() {
        let gateway = Arc::new(ScriptedGateway::new().script(EDITOR, vec![reply("S: ?", 0.4)]));
        let run = use_case(gateway.clone()).execute(simple_case()).await.unwrap();

        assert_eq!(run.terminal_state, TerminalState::MaxRoundsReached);
        assert_eq!(run.termination_reason, TerminationReason::RefinementUnavailable);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(gateway.calls().len(), 1);
        assert!(run.doctor_context_requested);
        assert!(run.final_output.is_some());
    }

    #[tokio::test]
    async fn test_complex_case_refines_then_converges() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script(
                    EDITOR,
                    vec![
                        reply("S: chest pain", 0.7),
                        reply("S: chest pain\nA: rule out ACS", 0.96),
                    ],
                )
                .script(
                    CLINICAL,
                    vec![reply(r#"{"feedback": "add troponin", "confidence": 0.8}"#, 0.8)],
                ),
        );
        let run = use_case(gateway.clone()).execute(complex_case()).await.unwrap();

        assert_eq!(run.complexity.level, ComplexityLevel::Complex);
        assert_eq!(run.terminal_state, TerminalState::Converged);
        assert_eq!(personas(&run), vec![EDITOR, CLINICAL, EDITOR]);
        assert_eq!(
            run.steps.iter().map(|s| s.round).collect::<Vec<_>>(),
            vec![0, 0, 1]
        );
        assert_eq!(
            run.steps.iter().map(|s| s.step_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(run.final_confidence, 0.96);
        assert_eq!(
            run.final_output,
            Some(Value::String("S: chest pain\nA: rule out ACS".to_string()))
        );

        // The refinement input carries the advisor's structured feedback
        let calls = gateway.calls();
        let refine_input: Value = serde_json::from_str(&calls[2].1).unwrap();
        assert_eq!(refine_input["task"], "refine");
        assert_eq!(refine_input["previous_draft"], "S: chest pain");
        assert_eq!(refine_input["feedback"][0]["persona_id"], CLINICAL);
        assert_eq!(
            refine_input["feedback"][0]["feedback"]["feedback"],
            "add troponin"
        );
    }

    #[tokio::test]
    async fn test_never_converging_case_stops_at_round_budget() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script(
                    EDITOR,
                    vec![reply("draft 1", 0.5), reply("draft 2", 0.5), reply("draft 3", 0.5)],
                )
                .script(
                    CLINICAL,
                    vec![reply("needs work", 0.5), reply("still needs work", 0.5)],
                ),
        );
        let run = use_case(gateway).execute(complex_case()).await.unwrap();

        assert_eq!(run.terminal_state, TerminalState::MaxRoundsReached);
        assert_eq!(run.termination_reason, TerminationReason::RoundBudgetExhausted);
        assert_eq!(personas(&run), vec![EDITOR, CLINICAL, EDITOR, CLINICAL, EDITOR]);
        assert_eq!(run.steps.len(), run.strategy.step_budget());
        assert_eq!(run.rounds_used(), 2);
        assert!(run.doctor_context_requested);
        assert_eq!(
            run.final_output,
            Some(Value::String("draft 3".to_string()))
        );
    }

    #[tokio::test]
    async fn test_never_converging_critical_case_uses_full_step_budget() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script(
                    EDITOR,
                    vec![
                        reply("draft 1", 0.5),
                        reply("draft 2", 0.5),
                        reply("draft 3", 0.5),
                        reply("draft 4", 0.5),
                    ],
                )
                .always(CLINICAL, reply("needs work", 0.5))
                .always(SAFETY, reply("check doses", 0.5)),
        );
        let run = use_case(gateway.clone()).execute(critical_case()).await.unwrap();

        assert_eq!(run.complexity.level, ComplexityLevel::Critical);
        assert_eq!(run.termination_reason, TerminationReason::RoundBudgetExhausted);
        assert_eq!(run.steps.len(), run.strategy.step_budget());
        assert_eq!(run.steps.len(), 10);
        assert_eq!(
            personas(&run),
            vec![
                EDITOR, CLINICAL, SAFETY, EDITOR, CLINICAL, SAFETY, EDITOR, CLINICAL, SAFETY,
                EDITOR
            ]
        );
        assert_eq!(gateway.calls().len(), 10);
        assert_eq!(run.rounds_used(), 3);
    }

    #[tokio::test]
    async fn test_critical_case_runs_every_advisor() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script(EDITOR, vec![reply("S: overdose", 0.9)])
                .script(CLINICAL, vec![reply("ok", 0.97)])
                .script(SAFETY, vec![reply("warfarin interaction checked", 0.96)]),
        );
        let run = use_case(gateway).execute(critical_case()).await.unwrap();

        assert_eq!(run.complexity.level, ComplexityLevel::Critical);
        assert_eq!(personas(&run), vec![EDITOR, CLINICAL, SAFETY]);
        assert_eq!(run.terminal_state, TerminalState::Converged);
        assert_eq!(run.final_confidence, 0.96);
        assert_eq!(
            run.steps.iter().map(|s| s.role).collect::<Vec<_>>(),
            vec![PersonaRole::Editor, PersonaRole::Advisor, PersonaRole::Advisor]
        );
    }

    #[tokio::test]
    async fn test_identical_refinement_is_oscillation() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script(EDITOR, vec![reply("same draft", 0.5), reply("same draft", 0.5)])
                .script(CLINICAL, vec![reply("fix it", 0.5)]),
        );
        let run = use_case(gateway).execute(complex_case()).await.unwrap();

        assert_eq!(run.terminal_state, TerminalState::Converged);
        assert_eq!(run.termination_reason, TerminationReason::OscillationDetected);
        assert_eq!(run.steps.len(), 3);
        assert!(run.doctor_context_requested);
    }

    #[tokio::test]
    async fn test_refinement_disabled_stops_after_first_pass() {
        let defaults = StrategyTable::default();
        let table = StrategyTable::from_strategies(defaults.iter().cloned().map(|s| {
            if s.level == ComplexityLevel::Moderate {
                s.with_refinement(false)
            } else {
                s
            }
        }))
        .unwrap();
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script(EDITOR, vec![reply("draft", 0.6)])
                .script(CLINICAL, vec![reply("weak", 0.6)]),
        );
        let run = use_case_with(gateway, table, registry())
            .execute(moderate_case())
            .await
            .unwrap();

        assert_eq!(run.complexity.level, ComplexityLevel::Moderate);
        assert_eq!(run.terminal_state, TerminalState::MaxRoundsReached);
        assert_eq!(run.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_confidence_parsed_from_text_when_not_reported() {
        struct TextOnlyGateway;

        #[async_trait]
        impl LlmGateway for TextOnlyGateway {
            async fn invoke(
                &self,
                _persona: &PersonaConfig,
                _input: &str,
            ) -> Result<GatewayResponse, GatewayError> {
                Ok(GatewayResponse::new("S: sore throat\nConfidence: 91%"))
            }
        }

        let use_case = RunOrchestrationUseCase::new(
            Arc::new(TextOnlyGateway),
            Arc::new(registry()),
            Arc::new(StrategyTable::default()),
            ComplexityAnalyzer::default(),
        );
        let run = use_case.execute(simple_case()).await.unwrap();
        assert_eq!(run.steps[0].confidence, 0.91);
        assert!(run.is_converged());
    }

    #[tokio::test]
    async fn test_non_finite_confidence_is_treated_as_missing() {
        struct NanGateway;

        #[async_trait]
        impl LlmGateway for NanGateway {
            async fn invoke(
                &self,
                persona: &PersonaConfig,
                _input: &str,
            ) -> Result<GatewayResponse, GatewayError> {
                let text = if persona.id == EDITOR {
                    "S: sore throat\nConfidence: 91%"
                } else {
                    "no score given"
                };
                Ok(GatewayResponse::new(text).with_confidence(f64::NAN))
            }
        }

        let use_case = RunOrchestrationUseCase::new(
            Arc::new(NanGateway),
            Arc::new(registry()),
            Arc::new(StrategyTable::default()),
            ComplexityAnalyzer::default(),
        )
        .with_params(fast_params());

        let run = use_case.execute(simple_case()).await.unwrap();
        assert_eq!(run.steps[0].confidence, 0.91);

        let run = use_case.execute(moderate_case()).await.unwrap();
        assert_eq!(run.steps[1].confidence, 0.0);
        assert!(run.steps.iter().all(|s| s.confidence.is_finite()));

        let json = serde_json::to_string(&run.to_report()).unwrap();
        let report: middleware_domain::RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(OrchestrationRun::from_report(report).unwrap(), run);
    }

    // ==================== Failure Handling ====================

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script(
                    EDITOR,
                    vec![
                        Scripted::Fail(GatewayError::RateLimited("429".into())),
                        reply("S: cough", 0.8),
                    ],
                )
                .script(CLINICAL, vec![reply("fine", 0.9)]),
        );
        let run = use_case(gateway.clone()).execute(moderate_case()).await.unwrap();

        assert_eq!(run.terminal_state, TerminalState::Converged);
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[0].status, StepStatus::Retried);
        assert_eq!(run.steps[0].attempts, 2);
        assert_eq!(run.steps[1].status, StepStatus::Ok);
        assert_eq!(gateway.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_last_allowed_attempt_succeeds() {
        let gateway = Arc::new(ScriptedGateway::new().script(
            EDITOR,
            vec![
                Scripted::Fail(GatewayError::Unavailable("503".into())),
                Scripted::Fail(GatewayError::Timeout),
                reply("S: sore throat", 0.8),
            ],
        ));
        let run = use_case(gateway.clone()).execute(simple_case()).await.unwrap();

        assert_eq!(run.terminal_state, TerminalState::Converged);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].status, StepStatus::Retried);
        assert_eq!(run.steps[0].attempts, 3);
        assert!(run.steps[0].error.is_none());
        assert_eq!(gateway.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_fails_run_with_partial_trace() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script(EDITOR, vec![reply("S: cough", 0.8)])
                .script(
                    CLINICAL,
                    vec![Scripted::Fail(GatewayError::AuthenticationFailed(
                        "invalid api key".into(),
                    ))],
                ),
        );
        let run = use_case(gateway.clone()).execute(moderate_case()).await.unwrap();

        assert_eq!(run.terminal_state, TerminalState::Failed);
        assert!(matches!(
            &run.termination_reason,
            TerminationReason::GatewayFailure { persona_id, transient: false, .. }
                if persona_id == CLINICAL
        ));
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[1].status, StepStatus::Failed);
        assert_eq!(run.steps[1].attempts, 1);
        assert_eq!(run.steps[1].output, Value::Null);
        assert!(run.steps[1].error.as_deref().unwrap().contains("invalid api key"));
        assert!(run.final_output.is_none());
        assert!(run.doctor_context_requested);
        // Not retried
        assert_eq!(gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .always(EDITOR, Scripted::Fail(GatewayError::Unavailable("503".into()))),
        );
        let run = use_case(gateway.clone()).execute(simple_case()).await.unwrap();

        assert_eq!(run.terminal_state, TerminalState::Failed);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].attempts, 3);
        assert_eq!(run.steps[0].status, StepStatus::Failed);
        assert!(matches!(
            run.termination_reason,
            TerminationReason::GatewayFailure { transient: true, .. }
        ));
        assert_eq!(gateway.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_call_timeout_is_transient() {
        let gateway = Arc::new(
            ScriptedGateway::new().script(EDITOR, vec![Scripted::Hang, reply("S: cough", 0.9)]),
        );
        let run = use_case_with(
            gateway,
            table_with_timeout(ComplexityLevel::Simple, 20),
            registry(),
        )
        .execute(simple_case())
        .await
        .unwrap();

        assert_eq!(run.terminal_state, TerminalState::Converged);
        assert_eq!(run.steps[0].status, StepStatus::Retried);
        assert_eq!(run.steps[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_missing_persona_is_configuration_error_with_partial_run() {
        let registry =
            PersonaRegistry::with_personas([PersonaConfig::new(EDITOR, "gpt-4.1")]).unwrap();
        let gateway = Arc::new(ScriptedGateway::new().script(EDITOR, vec![reply("S: cough", 0.8)]));
        let err = use_case_with(gateway, StrategyTable::default(), registry)
            .execute(moderate_case())
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        let run = err.partial_run().unwrap();
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.terminal_state, TerminalState::Failed);
        assert!(matches!(
            run.termination_reason,
            TerminationReason::Configuration { .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_transcript_is_invalid_input() {
        let gateway = Arc::new(ScriptedGateway::new());
        let err = use_case(gateway.clone())
            .execute(CaseInput::new("   "))
            .await
            .unwrap_err();

        assert!(matches!(err, RunOrchestrationError::InvalidInput(_)));
        assert!(err.partial_run().is_none());
        assert!(gateway.calls().is_empty());
    }

    // ==================== Cancellation ====================

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let gateway = Arc::new(ScriptedGateway::new());
        let run = use_case(gateway.clone())
            .with_cancellation(token)
            .execute(simple_case())
            .await
            .unwrap();

        assert_eq!(run.terminal_state, TerminalState::Failed);
        assert_eq!(run.termination_reason, TerminationReason::Cancelled);
        assert!(run.steps.is_empty());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_lets_in_flight_call_finish() {
        let token = CancellationToken::new();
        let gateway = Arc::new(ScriptedGateway::new().script(
            EDITOR,
            vec![Scripted::Delayed(100, "S: chest pain".to_string(), 0.5)],
        ));
        let use_case = use_case(gateway.clone()).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let run = use_case.execute(complex_case()).await.unwrap();
        canceller.await.unwrap();

        // The editor's call completes; the advisor is never invoked
        assert_eq!(run.terminal_state, TerminalState::Failed);
        assert_eq!(run.termination_reason, TerminationReason::Cancelled);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].status, StepStatus::Ok);
        assert_eq!(
            run.steps[0].output,
            Value::String("S: chest pain".to_string())
        );
        assert_eq!(run.steps[0].confidence, 0.5);
        assert!(run.steps[0].error.is_none());
        assert_eq!(gateway.calls().len(), 1);
        assert!(run.final_output.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_during_retry_backoff() {
        let token = CancellationToken::new();
        let gateway = Arc::new(ScriptedGateway::new().script(
            EDITOR,
            vec![
                Scripted::Fail(GatewayError::RateLimited("429".into())),
                reply("S: ok", 0.9),
            ],
        ));
        let params = ExecutionParams::default()
            .with_retry(RetryPolicy::default().with_base_delay_ms(10_000));
        let use_case = use_case(gateway.clone())
            .with_params(params)
            .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let run = use_case.execute(simple_case()).await.unwrap();
        canceller.await.unwrap();

        assert_eq!(run.termination_reason, TerminationReason::Cancelled);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].status, StepStatus::Failed);
        assert_eq!(run.steps[0].attempts, 1);
        assert_eq!(run.steps[0].error.as_deref(), Some("cancelled"));
        assert_eq!(gateway.calls().len(), 1);
    }

    // ==================== Trace Properties ====================

    #[tokio::test]
    async fn test_steps_record_persona_version_and_input_digest() {
        let registry = registry();
        registry
            .put(EDITOR, PersonaConfig::new(EDITOR, "gpt-4.1").with_system_prompt("v2"))
            .unwrap();
        let gateway = Arc::new(ScriptedGateway::new().script(EDITOR, vec![reply("S: ok", 0.9)]));
        let case = simple_case();
        let run = use_case_with(gateway, StrategyTable::default(), registry)
            .execute(case.clone())
            .await
            .unwrap();

        assert_eq!(run.steps[0].persona_version, 2);
        assert_eq!(run.steps[0].input_digest, input_digest(&case.transcript));
        assert_eq!(run.steps[0].tokens_used, 120);
        assert_eq!(run.steps[0].latency_ms, 40);
    }

    #[tokio::test]
    async fn test_recorder_sees_every_step_and_the_run() {
        let recorder = Arc::new(RecordingRecorder::default());
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script(EDITOR, vec![reply("a", 0.7), reply("b", 0.95)])
                .script(CLINICAL, vec![reply("c", 0.8)]),
        );
        let run = use_case(gateway)
            .with_recorder(recorder.clone())
            .execute(complex_case())
            .await
            .unwrap();

        let steps = recorder.steps.lock().unwrap().clone();
        assert_eq!(
            steps,
            vec![
                (run.run_id.clone(), 1),
                (run.run_id.clone(), 2),
                (run.run_id.clone(), 3)
            ]
        );
        assert_eq!(recorder.runs.lock().unwrap().clone(), vec![run.run_id.clone()]);
    }

    #[tokio::test]
    async fn test_recorder_failure_does_not_fail_run() {
        let gateway = Arc::new(ScriptedGateway::new().script(EDITOR, vec![reply("S: ok", 0.9)]));
        let run = use_case(gateway)
            .with_recorder(Arc::new(BrokenRecorder))
            .execute(simple_case())
            .await
            .unwrap();
        assert!(run.is_converged());
    }

    fn fingerprint(run: &OrchestrationRun) -> Vec<(String, u32, String, Value, f64, StepStatus)> {
        run.steps
            .iter()
            .map(|s| {
                (
                    s.persona_id.clone(),
                    s.persona_version,
                    s.input_digest.clone(),
                    s.output.clone(),
                    s.confidence,
                    s.status,
                )
            })
            .collect()
    }

    fn scripted_complex_gateway() -> Arc<ScriptedGateway> {
        Arc::new(
            ScriptedGateway::new()
                .script(EDITOR, vec![reply("draft", 0.6), reply("better draft", 0.93)])
                .script(CLINICAL, vec![reply(r#"{"missing": "ECG"}"#, 0.7)]),
        )
    }

    #[tokio::test]
    async fn test_same_inputs_produce_same_trace() {
        let first = use_case(scripted_complex_gateway())
            .execute(complex_case())
            .await
            .unwrap();
        let second = use_case(scripted_complex_gateway())
            .execute(complex_case())
            .await
            .unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(fingerprint(&first), fingerprint(&second));
        assert_eq!(first.terminal_state, second.terminal_state);
    }

    #[tokio::test]
    async fn test_replay_uses_pinned_persona_versions() {
        let registry = Arc::new(registry());
        let make = |gateway: Arc<ScriptedGateway>| {
            RunOrchestrationUseCase::new(
                gateway,
                Arc::clone(&registry),
                Arc::new(StrategyTable::default()),
                ComplexityAnalyzer::default(),
            )
            .with_params(fast_params())
        };

        let original = make(scripted_complex_gateway())
            .execute(complex_case())
            .await
            .unwrap();

        // A newer editor version is registered after the original run
        registry
            .put(EDITOR, PersonaConfig::new(EDITOR, "gpt-5").with_system_prompt("new"))
            .unwrap();

        let replayed = make(scripted_complex_gateway())
            .replay(complex_case(), &original, &NoProgress)
            .await
            .unwrap();

        assert_eq!(fingerprint(&original), fingerprint(&replayed));
        assert!(replayed.steps.iter().all(|s| s.persona_version == 1));
    }

    #[tokio::test]
    async fn test_replay_keeps_recorded_complexity_after_breakpoints_change() {
        let original = use_case(scripted_complex_gateway())
            .execute(complex_case())
            .await
            .unwrap();
        assert_eq!(original.complexity.level, ComplexityLevel::Complex);

        // Every case scores CRITICAL under the new breakpoints
        let breakpoints = LevelBreakpoints {
            moderate: 0.001,
            complex: 0.002,
            critical: 0.003,
        };
        let rescoring = RunOrchestrationUseCase::new(
            scripted_complex_gateway(),
            Arc::new(registry()),
            Arc::new(StrategyTable::default()),
            ComplexityAnalyzer::new(ComplexityWeights::default(), breakpoints),
        )
        .with_params(fast_params());

        let replayed = rescoring
            .replay(complex_case(), &original, &NoProgress)
            .await
            .unwrap();

        assert_eq!(replayed.complexity, original.complexity);
        assert_eq!(replayed.strategy, original.strategy);
        assert_eq!(replayed.complexity.level, replayed.strategy.level);
        assert_eq!(fingerprint(&original), fingerprint(&replayed));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .always(EDITOR, reply("S: ok", 0.9))
                .always(CLINICAL, reply("fine", 0.9)),
        );
        let use_case = Arc::new(use_case(gateway));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let use_case = Arc::clone(&use_case);
                tokio::spawn(async move {
                    let case = if i % 2 == 0 { simple_case() } else { moderate_case() };
                    use_case.execute(case).await
                })
            })
            .collect();

        let mut run_ids = Vec::new();
        for handle in handles {
            let run = handle.await.unwrap().unwrap();
            assert!(run.is_converged());
            let numbers: Vec<u32> = run.steps.iter().map(|s| s.step_number).collect();
            assert_eq!(numbers, (1..=run.steps.len() as u32).collect::<Vec<_>>());
            run_ids.push(run.run_id);
        }
        run_ids.sort();
        run_ids.dedup();
        assert_eq!(run_ids.len(), 8);
    }
}
