use anyhow::{Context, Result};
use serde_json::Value;

use swipecap::{resolve_style, AppConfig};

pub fn cmd_style(config: &AppConfig, overrides: &[String]) -> Result<()> {
    let mut style = config.style.clone();
    for item in overrides {
        let (key, value) = item
            .split_once('=')
            .with_context(|| format!("expected KEY=VALUE, got '{item}'"))?;
        style.insert(key.trim().to_string(), parse_value(value.trim()));
    }

    let resolved = resolve_style(&style);
    for warning in &resolved.warnings {
        eprintln!("⚠️  {warning}");
    }
    println!("{}", serde_json::to_string_pretty(&resolved.value)?);

    Ok(())
}

/// JSON literal if it parses, otherwise a plain string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
