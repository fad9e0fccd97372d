//! The default command: turn a query into a command and maybe run it.

use std::time::Duration;

use dialoguer::Confirm;
use hai_ai::{
    generate_with_policy, ProviderManager, ProviderSelection, RetryPolicy, StructuredResponse,
    DEFAULT_MAX_RETRIES,
};
use hai_context::ContextAssembler;
use hai_memory::MemoryManager;
use tracing::{debug, info, warn};

use crate::config::{ExecutionSettings, HaiConfig};
use crate::executor::{self, ExecutionOutcome};
use crate::output;

/// Delay before the second attempt; doubles after that.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub(crate) struct AskOptions<'a> {
    pub query: &'a str,
    /// Provider name overriding the configured selection.
    pub provider: Option<&'a str>,
    pub no_memory: bool,
    /// Skip the confirmation prompt for commands without a safety warning.
    pub yes: bool,
    pub dry_run: bool,
}

/// What to do with a generated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Skip(&'static str),
    Run,
    Confirm,
}

/// Decide whether a response's command runs, needs a prompt, or is skipped.
///
/// Commands with a safety warning always need explicit confirmation.
pub(crate) fn decide(
    response: &StructuredResponse,
    execution: &ExecutionSettings,
    yes: bool,
    dry_run: bool,
) -> Decision {
    if response.command.is_none() {
        return Decision::Skip("nothing to run");
    }
    if dry_run {
        return Decision::Skip("dry run, not executed");
    }
    if response.safety_warning.is_some() {
        return Decision::Confirm;
    }
    if yes {
        return Decision::Run;
    }
    if execution.auto_execute
        && !execution.require_confirmation
        && response.confidence >= execution.auto_execute_threshold
    {
        return Decision::Run;
    }
    Decision::Confirm
}

/// Process exit status mirroring the command's.
pub(crate) fn exit_status(outcome: &ExecutionOutcome) -> i32 {
    if outcome.interrupted {
        130
    } else if outcome.timed_out {
        124
    } else {
        outcome.exit_code.unwrap_or(1)
    }
}

async fn confirm() -> bool {
    let answer = tokio::task::spawn_blocking(|| {
        Confirm::new()
            .with_prompt("Execute this command?")
            .default(false)
            .interact()
    })
    .await;
    match answer {
        Ok(Ok(answer)) => answer,
        Ok(Err(e)) => {
            warn!("cannot read confirmation: {}", e);
            false
        }
        Err(e) => {
            warn!("confirmation prompt failed: {}", e);
            false
        }
    }
}

/// Answer `options.query`. Returns the process exit status.
pub(crate) async fn run(config: &HaiConfig, options: AskOptions<'_>) -> miette::Result<i32> {
    let mut selection = config.selection().map_err(|e| miette::miette!("{}", e))?;
    let mut manager = ProviderManager::new(config.providers.clone(), &selection)
        .map_err(|e| miette::miette!("{}", e))?;
    if let Some(name) = options.provider {
        if !manager.switch_provider(name) {
            return Err(miette::miette!(
                "provider '{}' is unknown or not configured (see `hai --list-providers`)",
                name
            ));
        }
        selection = ProviderSelection::Single(manager.current_kind());
    }

    let mut memory = if options.no_memory {
        MemoryManager::disabled()
    } else {
        MemoryManager::new(config.memory.clone())
    };
    memory.load_all();

    let assembler = ContextAssembler::new(config.context.clone());
    let context = assembler.assemble(options.query, Some(&memory)).await;

    let provider = manager
        .resolve(&selection)
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    info!("using provider {}", manager.get_current_provider());

    let policy = RetryPolicy::new(DEFAULT_MAX_RETRIES).with_backoff(RETRY_BACKOFF);
    let response = generate_with_policy(provider.as_ref(), options.query, &context, policy)
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    output::print_response(&response, &config.output);

    let Some(command) = response.command.clone() else {
        memory.update_memory(options.query, None, &response.explanation, true);
        memory.save_all();
        return Ok(0);
    };

    let approved = match decide(&response, &config.execution, options.yes, options.dry_run) {
        Decision::Skip(reason) => {
            println!("({})", reason);
            false
        }
        Decision::Run => true,
        Decision::Confirm => confirm().await,
    };
    if !approved {
        return Ok(0);
    }

    let timeout = Duration::from_secs(config.execution.timeout_secs);
    let outcome = executor::execute(&command, timeout)
        .await
        .map_err(|e| miette::miette!("failed to run command: {}", e))?;
    output::print_outcome(&outcome);

    if outcome.interrupted {
        debug!("interrupted run not recorded in memory");
    } else {
        memory.update_memory(
            options.query,
            Some(&command),
            &outcome.result_text(),
            outcome.success(),
        );
        memory.save_all();
    }
    Ok(exit_status(&outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(confidence: i64) -> StructuredResponse {
        StructuredResponse::new("List files.", Some("ls".to_string()), confidence)
    }

    fn auto() -> ExecutionSettings {
        ExecutionSettings {
            auto_execute: true,
            require_confirmation: false,
            ..ExecutionSettings::default()
        }
    }

    #[test]
    fn test_defaults_ask_first() {
        let settings = ExecutionSettings::default();
        assert_eq!(decide(&response(99), &settings, false, false), Decision::Confirm);
    }

    #[test]
    fn test_auto_execute_above_threshold() {
        assert_eq!(decide(&response(90), &auto(), false, false), Decision::Run);
        assert_eq!(decide(&response(85), &auto(), false, false), Decision::Run);
        assert_eq!(decide(&response(84), &auto(), false, false), Decision::Confirm);
    }

    #[test]
    fn test_auto_execute_needs_confirmation_off() {
        let settings = ExecutionSettings {
            require_confirmation: true,
            ..auto()
        };
        assert_eq!(decide(&response(99), &settings, false, false), Decision::Confirm);
    }

    #[test]
    fn test_unsafe_always_confirms() {
        let mut unsafe_response = response(99);
        unsafe_response.safety_warning = Some("dangerous".to_string());
        assert_eq!(decide(&unsafe_response, &auto(), true, false), Decision::Confirm);
    }

    #[test]
    fn test_yes_and_dry_run() {
        let settings = ExecutionSettings::default();
        assert_eq!(decide(&response(10), &settings, true, false), Decision::Run);
        assert!(matches!(
            decide(&response(99), &auto(), true, true),
            Decision::Skip(_)
        ));
    }

    #[test]
    fn test_question_skipped() {
        let answer = StructuredResponse::new("It lists files.", None, 90);
        assert_eq!(
            decide(&answer, &auto(), true, false),
            Decision::Skip("nothing to run")
        );
    }

    #[test]
    fn test_exit_status() {
        let done = |code| ExecutionOutcome {
            exit_code: Some(code),
            ..ExecutionOutcome::default()
        };
        assert_eq!(exit_status(&done(0)), 0);
        assert_eq!(exit_status(&done(2)), 2);
        let timed_out = ExecutionOutcome {
            timed_out: true,
            ..ExecutionOutcome::default()
        };
        assert_eq!(exit_status(&timed_out), 124);
        let interrupted = ExecutionOutcome {
            interrupted: true,
            ..ExecutionOutcome::default()
        };
        assert_eq!(exit_status(&interrupted), 130);
    }
}
