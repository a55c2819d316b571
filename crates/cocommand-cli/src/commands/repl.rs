use std::borrow::Cow::{self, Borrowed, Owned};

use anyhow::Result;
use cocommand_application::controller::user_message;
use cocommand_application::{CommandController, DismissOutcome, ExtensionWindow, SubmitOutcome};
use cocommand_core::composer::{self, SuggestionKind};
use cocommand_core::config::ClientConfig;
use cocommand_sdk::{CocommandClient, RequestOptions};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Context, Editor, Event, EventContext, EventHandler, Helper,
    KeyCode, KeyEvent, Modifiers, Movement, RepeatCount,
};

use super::run::submit_streaming;
use crate::host::{Palette, TerminalHost};

const PALETTE_COMMANDS: &[&str] = &[":open", ":close", ":reset", ":quit"];

/// Completion for palette commands and `@extension` mentions.
struct PaletteHelper {
    commands: Vec<String>,
    extensions: Vec<String>,
}

impl PaletteHelper {
    fn new(settings_command: &str, extensions: Vec<String>) -> Self {
        let mut commands: Vec<String> = PALETTE_COMMANDS.iter().map(|c| c.to_string()).collect();
        commands.push(settings_command.to_string());
        Self {
            commands,
            extensions,
        }
    }

    fn is_command(line: &str) -> bool {
        line.starts_with(':') || line.starts_with('/')
    }
}

impl Helper for PaletteHelper {}

impl Completer for PaletteHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let head = &line[..pos];

        if Self::is_command(head) && !head.contains(' ') {
            let candidates = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(head))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            return Ok((0, candidates));
        }

        match composer::active_trigger(line, pos) {
            Some(trigger) if trigger.kind == SuggestionKind::Mention => {
                let candidates = self
                    .extensions
                    .iter()
                    .filter(|id| id.starts_with(&trigger.query))
                    .map(|id| Pair {
                        display: id.clone(),
                        replacement: format!("@{} ", id),
                    })
                    .collect();
                Ok((trigger.start, candidates))
            }
            _ => Ok((0, vec![])),
        }
    }
}

impl Highlighter for PaletteHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if Self::is_command(line) {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for PaletteHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let head = &line[..pos];

        if Self::is_command(head) && !head.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(head) && cmd.len() > head.len())
                .map(|cmd| cmd[head.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for PaletteHelper {}

/// Up/Down walk the controller's input history instead of the editor's.
struct HistoryKey {
    palette: Palette,
    older: bool,
}

impl ConditionalEventHandler for HistoryKey {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext,
    ) -> Option<Cmd> {
        if self.palette.snapshot().draft.render() != ctx.line() {
            self.palette.set_input(ctx.line());
        }
        let moved = if self.older {
            self.palette.history_up()
        } else {
            self.palette.history_down()
        };
        if !moved {
            return Some(Cmd::Noop);
        }
        let text = self.palette.snapshot().draft.render();
        Some(Cmd::Replace(Movement::WholeLine, Some(text)))
    }
}

pub async fn run(client: CocommandClient, config: &ClientConfig) -> Result<()> {
    let extensions = match client.workspace().extensions(&RequestOptions::new()).await {
        Ok(extensions) => extensions.into_iter().map(|e| e.id).collect(),
        Err(e) => {
            tracing::warn!("[Repl] Could not load extensions for completion: {}", e);
            Vec::new()
        }
    };

    let palette = CommandController::new(client.clone(), TerminalHost, config);
    let surface = palette.surface_guard();

    let mut rl: Editor<PaletteHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(PaletteHelper::new(&config.settings_command, extensions)));
    for (key, older) in [(KeyCode::Up, true), (KeyCode::Down, false)] {
        rl.bind_sequence(
            KeyEvent(key, Modifiers::NONE),
            EventHandler::Conditional(Box::new(HistoryKey {
                palette: palette.clone(),
                older,
            })),
        );
    }

    println!("{}", "=== Cocommand ===".bright_magenta().bold());
    println!(
        "{}",
        format!(
            "Connected to {}. Empty line dismisses, Ctrl-C cancels a running command, :quit exits.",
            client.base_url()
        )
        .bright_black()
    );
    println!();

    loop {
        match rl.readline("› ") {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed.is_empty() {
                    if palette.dismiss().await == DismissOutcome::Cleared {
                        println!("{}", "(cleared)".bright_black());
                    }
                    continue;
                }
                if matches!(trimmed, ":quit" | ":q" | "quit" | "exit") {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
                if trimmed.starts_with(':') {
                    palette_command(&palette, &client, trimmed).await;
                    continue;
                }

                palette.set_input(&line);
                let outcome = submit_streaming(&palette, None).await?;
                if let SubmitOutcome::Failed(error) = &outcome {
                    eprintln!("{}", format!("Error: {}", user_message(error)).red());
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type :quit to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    surface.dispose();
    Ok(())
}

async fn palette_command(palette: &Palette, client: &CocommandClient, line: &str) {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let argument = words.next();

    match (command, argument) {
        (":reset", _) => {
            palette.reset();
            println!("{}", "(reset)".bright_black());
        }
        (":open", Some(extension_id)) => {
            let window = ExtensionWindow {
                extension_id: extension_id.to_string(),
                title: extension_id.to_string(),
                url: Some(client.workspace().asset_url(extension_id, "index.html")),
            };
            palette.open_extension(&window).await;
        }
        (":close", Some(extension_id)) => palette.close_extension(extension_id).await,
        _ => println!("{}", format!("Unknown palette command: {}", line).bright_black()),
    }
}
