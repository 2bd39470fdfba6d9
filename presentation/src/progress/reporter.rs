//! Progress reporting for orchestration runs

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use middleware_application::{GatewayError, ProgressNotifier};
use middleware_domain::core::string::preview_line;
use middleware_domain::{
    ComplexityScore, OrchestrationRun, PersonaRole, StepRecord, StepStatus, Strategy,
    TerminalState,
};
use std::sync::Mutex;
use std::time::Duration;

/// Reports progress with one spinner per persona invocation
pub struct ProgressReporter {
    multi: MultiProgress,
    current: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current: Mutex::new(None),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn with_current(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut current) = self.current.lock() {
            f(&mut current);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn role_label(role: PersonaRole, round: u32) -> String {
    match (role, round) {
        (PersonaRole::Editor, 0) => "drafting".to_string(),
        (PersonaRole::Editor, r) => format!("refining (round {})", r),
        (PersonaRole::Advisor, 0) => "reviewing".to_string(),
        (PersonaRole::Advisor, r) => format!("reviewing (round {})", r),
    }
}

fn step_summary(step: &StepRecord) -> String {
    match step.status {
        StepStatus::Ok => format!(
            "{} {} confidence {:.2}",
            "v".green(),
            step.persona_id,
            step.confidence
        ),
        StepStatus::Retried => format!(
            "{} {} confidence {:.2} after {} attempts",
            "v".yellow(),
            step.persona_id,
            step.confidence,
            step.attempts
        ),
        StepStatus::Failed => format!(
            "{} {} {}",
            "x".red(),
            step.persona_id,
            preview_line(step.error.as_deref().unwrap_or("failed"), 80)
        ),
    }
}

fn outcome_summary(run: &OrchestrationRun) -> String {
    let state = match run.terminal_state {
        TerminalState::Converged => run.terminal_state.as_str().green().bold(),
        TerminalState::MaxRoundsReached => run.terminal_state.as_str().yellow().bold(),
        TerminalState::Failed => run.terminal_state.as_str().red().bold(),
    };
    format!(
        "{} {} after {} steps (confidence {:.2})",
        "=>".cyan(),
        state,
        run.steps.len(),
        run.final_confidence
    )
}

impl ProgressNotifier for ProgressReporter {
    fn on_run_start(&self, _run_id: &str, strategy: &Strategy, complexity: &ComplexityScore) {
        let _ = self.multi.println(format!(
            "{} {} case (score {:.1}): {}",
            "->".cyan(),
            complexity.level.as_str().bold(),
            complexity.score,
            strategy.personas_sequence.join(", ")
        ));
    }

    fn on_step_start(&self, step_number: u32, persona_id: &str, role: PersonaRole, round: u32) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(format!("Step {}", step_number));
        pb.set_message(format!("{} {}", persona_id, role_label(role, round)));
        pb.enable_steady_tick(Duration::from_millis(100));

        self.with_current(|current| {
            if let Some(previous) = current.replace(pb) {
                previous.finish_and_clear();
            }
        });
    }

    fn on_step_complete(&self, step: &StepRecord) {
        let summary = step_summary(step);
        self.with_current(|current| match current.take() {
            Some(pb) => pb.finish_with_message(summary),
            None => {
                let _ = self.multi.println(summary);
            }
        });
    }

    fn on_retry(&self, persona_id: &str, attempt: u32, error: &GatewayError) {
        let message = format!(
            "{} {} retrying (attempt {}): {}",
            "!".yellow(),
            persona_id,
            attempt,
            error
        );
        self.with_current(|current| match current.as_ref() {
            Some(pb) => pb.set_message(message),
            None => {
                let _ = self.multi.println(message);
            }
        });
    }

    fn on_run_complete(&self, run: &OrchestrationRun) {
        self.with_current(|current| {
            if let Some(pb) = current.take() {
                pb.finish_and_clear();
            }
        });
        let _ = self.multi.println(outcome_summary(run));
    }
}

/// Simple text-based progress (no fancy UI), written to stderr
pub struct SimpleProgress;

impl ProgressNotifier for SimpleProgress {
    fn on_run_start(&self, run_id: &str, strategy: &Strategy, complexity: &ComplexityScore) {
        eprintln!(
            "{} run {} | {} (score {:.1}) | {}",
            "->".cyan(),
            run_id,
            complexity.level.as_str().bold(),
            complexity.score,
            strategy.personas_sequence.join(", ")
        );
    }

    fn on_step_start(&self, step_number: u32, persona_id: &str, role: PersonaRole, round: u32) {
        eprintln!(
            "  [{}] {} {}",
            step_number,
            persona_id,
            role_label(role, round)
        );
    }

    fn on_step_complete(&self, step: &StepRecord) {
        eprintln!("      {}", step_summary(step));
    }

    fn on_retry(&self, persona_id: &str, attempt: u32, error: &GatewayError) {
        eprintln!(
            "      {} {} retrying (attempt {}): {}",
            "!".yellow(),
            persona_id,
            attempt,
            error
        );
    }

    fn on_run_complete(&self, run: &OrchestrationRun) {
        eprintln!("{}", outcome_summary(run));
    }
}
