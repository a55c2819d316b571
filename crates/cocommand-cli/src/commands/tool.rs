use anyhow::{Context, Result};
use cocommand_sdk::{CocommandClient, RequestOptions};
use serde_json::{Value, json};

pub async fn invoke(
    client: &CocommandClient,
    extension_id: &str,
    tool_id: &str,
    input: Option<&str>,
) -> Result<()> {
    let args = parse_args(input)?;
    let result = client
        .workspace()
        .invoke_tool(extension_id, tool_id, &args, &RequestOptions::new())
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Tool arguments must be a JSON object; no input means `{}`.
fn parse_args(input: Option<&str>) -> Result<Value> {
    let Some(raw) = input else {
        return Ok(json!({}));
    };
    let value: Value = serde_json::from_str(raw).context("Tool input is not valid JSON")?;
    anyhow::ensure!(value.is_object(), "Tool input must be a JSON object");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(None).unwrap(), json!({}));
        assert_eq!(
            parse_args(Some(r#"{"title": "Groceries"}"#)).unwrap(),
            json!({"title": "Groceries"})
        );
        assert!(parse_args(Some("[1, 2]")).is_err());
        assert!(parse_args(Some("{not json")).is_err());
    }
}
