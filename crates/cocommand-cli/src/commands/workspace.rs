use anyhow::Result;
use cocommand_application::controller::user_message;
use cocommand_sdk::{CocommandClient, RequestOptions};
use colored::Colorize;

pub async fn context(
    client: &CocommandClient,
    workspace_id: Option<&str>,
    session_id: Option<&str>,
) -> Result<()> {
    let context = client
        .sessions()
        .context(workspace_id, session_id, &RequestOptions::new())
        .await?;

    println!("{} {}", "Workspace:".bold(), context.workspace_id);
    println!("{} {}", "Session:  ".bold(), context.session_id);
    println!("{} {}", "Started:  ".bold(), context.started_at);
    match &context.ended_at {
        Some(ended_at) => println!("{} {}", "Ended:    ".bold(), ended_at),
        None => println!("{} {}", "Ended:    ".bold(), "(active)".green()),
    }
    Ok(())
}

pub async fn extensions(client: &CocommandClient) -> Result<()> {
    let extensions = client.workspace().extensions(&RequestOptions::new()).await?;
    if extensions.is_empty() {
        println!("{}", "No extensions installed".bright_black());
    }
    for extension in extensions {
        let kind = extension.kind.as_deref().unwrap_or("extension");
        println!("{} {} {}", extension.id.bright_cyan(), extension.name, format!("({})", kind).bright_black());
        for tool in extension.tools {
            let description = tool.description.unwrap_or_default();
            println!("  {} {}", format!("- {}", tool.id).yellow(), description.bright_black());
        }
    }
    Ok(())
}

pub async fn applications(client: &CocommandClient) -> Result<()> {
    let applications = client.workspace().applications(&RequestOptions::new()).await?;
    for application in applications {
        let bundle = application.bundle_id.as_deref().unwrap_or("");
        println!("{} {} {}", application.id.bright_cyan(), application.name, bundle.bright_black());
    }
    Ok(())
}

pub async fn open_application(client: &CocommandClient, id: &str) -> Result<()> {
    client
        .workspace()
        .open_application(id, &RequestOptions::new())
        .await?;
    println!("{}", format!("Opened {}", id).green());
    Ok(())
}

pub async fn search_notes(client: &CocommandClient, query: &str) -> Result<()> {
    match client.workspace().search_notes(query).await {
        Ok(notes) => {
            for note in notes {
                println!("{}", note);
            }
            Ok(())
        }
        Err(error) if error.is_not_implemented() => {
            println!("{}", user_message(&error).yellow());
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}
