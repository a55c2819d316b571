use anyhow::Result;
use cocommand_sdk::events::is_subscription_closed;
use cocommand_sdk::{CocommandClient, RequestOptions};
use colored::Colorize;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Prints runtime events as JSON lines until the server closes the stream or
/// Ctrl-C is pressed.
pub async fn run(client: &CocommandClient, session_id: Option<&str>) -> Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let options = RequestOptions::new().with_cancel(cancel);
    let mut events = client.events().subscribe(session_id, &options).await?;
    println!("{}", "Listening for runtime events (Ctrl-C to stop)".bright_black());

    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                let marker = if event.ends_run() { "■".green() } else { "•".bright_black() };
                println!("{} {}", marker, serde_json::to_string(&event)?);
            }
            Err(error) if is_subscription_closed(&error) => break,
            Err(error) => return Err(error.into()),
        }
    }

    println!("{}", "Event stream closed".bright_black());
    Ok(())
}
