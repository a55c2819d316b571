use anyhow::Result;
use cocommand_application::{CommandController, SubmitOutcome};
use cocommand_application::controller::user_message;
use cocommand_core::config::ClientConfig;
use cocommand_sdk::CocommandClient;
use colored::Colorize;

use crate::host::{Palette, TerminalHost};
use crate::render::PartPrinter;

pub async fn run(client: CocommandClient, config: &ClientConfig, text: &str) -> Result<()> {
    let palette = CommandController::new(client, TerminalHost, config);
    let _surface = palette.surface_guard();

    match submit_streaming(&palette, Some(text)).await? {
        SubmitOutcome::Failed(error) => anyhow::bail!("{}", user_message(&error)),
        SubmitOutcome::Ignored => anyhow::bail!("Nothing to run"),
        _ => Ok(()),
    }
}

/// Submits and prints parts as they change. Ctrl-C cancels the command
/// instead of killing the process.
pub async fn submit_streaming(palette: &Palette, override_text: Option<&str>) -> Result<SubmitOutcome> {
    let mut updates = palette.subscribe();
    let mut printer = PartPrinter::stdout();

    let submit = palette.submit(override_text);
    tokio::pin!(submit);
    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome,
            changed = updates.changed() => {
                if changed.is_ok() {
                    let parts = updates.borrow_and_update().parts.clone();
                    printer.show(&parts)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                palette.cancel();
            }
        }
    };

    printer.show(&palette.snapshot().parts)?;
    printer.finish()?;
    report(&outcome);
    Ok(outcome)
}

fn report(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Completed { turn_id } => {
            tracing::debug!("[Cli] Turn {} complete", turn_id);
        }
        SubmitOutcome::Cancelled => println!("{}", "Cancelled".yellow()),
        SubmitOutcome::Rejected => println!("{}", "A command is already running".yellow()),
        SubmitOutcome::Failed(error) => {
            tracing::debug!("[Cli] Command failed: {}", error);
        }
        SubmitOutcome::Ignored | SubmitOutcome::SettingsOpened => {}
    }
}
