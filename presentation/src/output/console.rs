//! Console output formatter for orchestration runs

use colored::{ColoredString, Colorize};
use middleware_domain::{OrchestrationRun, StepRecord, StepStatus, TerminalState};
use serde_json::Value;

/// Formats orchestration runs for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Enable or disable ANSI colors for everything this crate prints
    pub fn set_color(enabled: bool) {
        if !enabled {
            colored::control::set_override(false);
        }
    }

    /// Format the complete run: complexity, strategy, every step, outcome
    pub fn format(run: &OrchestrationRun) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Decisional Middleware Run"));
        output.push('\n');

        output.push_str(&format!("{} {}\n", "Run:".cyan().bold(), run.run_id));
        output.push_str(&format!(
            "{} {} (score {:.1})\n",
            "Complexity:".cyan().bold(),
            run.complexity.level,
            run.complexity.score
        ));
        output.push_str(&format!(
            "{} {} | max rounds {} | threshold {:.2}{}\n",
            "Strategy:".cyan().bold(),
            run.strategy.personas_sequence.join(" -> "),
            run.strategy.max_rounds,
            run.strategy.confidence_threshold,
            if run.strategy.refinement_enabled() {
                ""
            } else {
                " | no refinement"
            }
        ));

        output.push_str(&Self::section_header("Steps"));
        if run.steps.is_empty() {
            output.push_str(&format!("{}\n", "(no persona was invoked)".dimmed()));
        }
        for step in &run.steps {
            output.push_str(&Self::step_line(step));
            output.push('\n');
        }

        output.push_str(&Self::section_header("Outcome"));
        output.push_str(&format!(
            "{} {} ({})\n",
            "State:".bold(),
            Self::state_label(run.terminal_state),
            run.termination_reason.describe()
        ));
        output.push_str(&format!(
            "{} {:.2}\n",
            "Confidence:".bold(),
            run.final_confidence
        ));
        output.push_str(&format!(
            "{} {} steps, {} rounds, {} tokens, {} ms\n",
            "Cost:".bold(),
            run.steps.len(),
            run.rounds_used(),
            run.total_tokens(),
            run.total_duration_ms
        ));
        if run.doctor_context_requested {
            output.push_str(&format!(
                "{}\n",
                "Clinician review requested: the note did not reach the confidence threshold."
                    .yellow()
                    .bold()
            ));
        }

        if let Some(note) = Self::note_text(run) {
            output.push_str(&Self::section_header("Final Note"));
            output.push_str(&note);
            output.push('\n');
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as the JSON run report
    pub fn format_json(run: &OrchestrationRun) -> String {
        serde_json::to_string_pretty(&run.to_report()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format the final note only (concise output)
    pub fn format_note_only(run: &OrchestrationRun) -> String {
        match Self::note_text(run) {
            Some(note) => note,
            None => format!(
                "{} {}",
                "No note produced:".red().bold(),
                run.termination_reason.describe()
            ),
        }
    }

    fn note_text(run: &OrchestrationRun) -> Option<String> {
        run.final_output.as_ref().map(|output| match output {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        })
    }

    fn step_line(step: &StepRecord) -> String {
        let status = match step.status {
            StepStatus::Ok => "OK".green(),
            StepStatus::Retried => "RETRIED".yellow(),
            StepStatus::Failed => "FAILED".red(),
        };
        let mut line = format!(
            "{:>3}. {} v{} {} round {} [{}] confidence {:.2} | {} ms",
            step.step_number,
            step.persona_id.bold(),
            step.persona_version,
            step.role.as_str().dimmed(),
            step.round,
            status,
            step.confidence,
            step.duration_ms()
        );
        if step.attempts > 1 {
            line.push_str(&format!(" | {} attempts", step.attempts));
        }
        if let Some(error) = &step.error {
            line.push_str(&format!("\n     {} {}", "error:".red(), error));
        }
        line
    }

    fn state_label(state: TerminalState) -> ColoredString {
        match state {
            TerminalState::Converged => state.as_str().green().bold(),
            TerminalState::MaxRoundsReached => state.as_str().yellow().bold(),
            TerminalState::Failed => state.as_str().red().bold(),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}
