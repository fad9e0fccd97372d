//! Terminal rendering of responses and command results.

use hai_ai::StructuredResponse;

use crate::config::OutputSettings;
use crate::executor::ExecutionOutcome;

/// Render a model response for the terminal.
pub(crate) fn format_response(response: &StructuredResponse, settings: &OutputSettings) -> String {
    let mut lines = Vec::new();

    if settings.show_internal_dialogue {
        if let Some(dialogue) = &response.internal_dialogue {
            lines.push(format!("Thinking: {}", dialogue));
            lines.push(String::new());
        }
    }

    // Answers have nothing but the explanation, so always show it.
    if settings.show_explanation || response.is_question() {
        lines.push(response.explanation.clone());
    }

    if let Some(command) = &response.command {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("  $ {}", command));
        lines.push(String::new());
        let mut confidence = format!(
            "Confidence: {}% ({})",
            response.confidence,
            response.confidence_level().as_str()
        );
        if response.fallback {
            confidence.push_str(", recovered from an unstructured reply");
        }
        lines.push(confidence);
    }

    if let Some(warning) = &response.safety_warning {
        lines.push(format!("Warning: {}", warning));
    }

    lines.join("\n")
}

pub(crate) fn print_response(response: &StructuredResponse, settings: &OutputSettings) {
    println!("{}", format_response(response, settings));
}

/// Render the end of a command run.
pub(crate) fn format_outcome(outcome: &ExecutionOutcome) -> String {
    if outcome.interrupted {
        return "Interrupted.".to_string();
    }
    if outcome.timed_out {
        return "Command timed out.".to_string();
    }
    match outcome.exit_code {
        Some(0) => String::new(),
        Some(code) => format!("Command exited with code {}.", code),
        None => "Command was terminated by a signal.".to_string(),
    }
}

pub(crate) fn print_outcome(outcome: &ExecutionOutcome) {
    print!("{}", outcome.stdout);
    eprint!("{}", outcome.stderr);
    let status = format_outcome(outcome);
    if !status.is_empty() {
        eprintln!("{}", status);
    }
}
