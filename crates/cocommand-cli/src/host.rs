use async_trait::async_trait;
use cocommand_application::{CommandController, ExtensionWindow, WindowHost};
use cocommand_sdk::CocommandClient;
use colored::Colorize;

/// The palette as driven from a terminal.
pub type Palette = CommandController<CocommandClient, TerminalHost>;

/// Stands in for the desktop window host: window requests become log lines
/// and short banners.
#[derive(Debug, Default)]
pub struct TerminalHost;

#[async_trait]
impl WindowHost for TerminalHost {
    async fn hide_window(&self) {
        tracing::info!("[TerminalHost] hide_window");
        println!("{}", "(palette hidden)".bright_black());
    }

    async fn open_settings_window(&self) {
        tracing::info!("[TerminalHost] open_settings_window");
        println!("{}", "Settings window requested".bright_magenta());
    }

    async fn open_extension_window(&self, window: &ExtensionWindow) {
        tracing::info!("[TerminalHost] open_extension_window {}", window.extension_id);
        println!("{}", format!("┌─ {} ─", window.title).bright_cyan().bold());
        if let Some(url) = &window.url {
            println!("{}", format!("│ {}", url).bright_cyan());
        }
        println!("{}", "└─".bright_cyan());
    }

    async fn close_extension_window(&self, extension_id: &str) {
        tracing::info!("[TerminalHost] close_extension_window {}", extension_id);
        println!("{}", format!("(closed {})", extension_id).bright_black());
    }
}
