//! Config command implementations

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::ConfigCommand;
use crate::config::{self as app_config, AppConfig, RuntimeContext};
use crate::output::print_output;

const MASK: &str = "********";

pub fn run(ctx: &RuntimeContext, command: ConfigCommand) -> Result<ExitCode> {
    match command {
        ConfigCommand::Show => show(ctx)?,
        ConfigCommand::Path => println!("{}", ctx.config_path().display()),
        ConfigCommand::Get { key } => get(ctx, key.as_deref())?,
        ConfigCommand::Reset => reset(ctx)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn show(ctx: &RuntimeContext) -> Result<()> {
    print_output(ctx, &masked(&ctx.config))
}

fn get(ctx: &RuntimeContext, key: Option<&str>) -> Result<()> {
    match key {
        Some(key) => {
            let value = get_config_value(&masked(&ctx.config), key)?;
            println!("{value}");
            Ok(())
        }
        None => show(ctx),
    }
}

fn reset(ctx: &RuntimeContext) -> Result<()> {
    app_config::write_default_config(ctx.config_path())?;
    log::info!("wrote default configuration");
    println!(
        "Configuration reset to defaults at: {}",
        ctx.config_path().display()
    );
    Ok(())
}

/// Copy of the config with secrets replaced
fn masked(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if config.ewelink.password.is_some() {
        config.ewelink.password = Some(MASK.to_string());
    }
    if config.ewelink.app_secret.is_some() {
        config.ewelink.app_secret = Some(MASK.to_string());
    }
    config
}

fn get_config_value(config: &AppConfig, key: &str) -> Result<String> {
    let json = serde_json::to_value(config)?;

    let mut current = &json;
    for part in key.split('.') {
        current = current
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {key}"))?;
    }

    Ok(match current {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => serde_json::to_string(other)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_value() {
        let config = AppConfig::default();

        assert_eq!(get_config_value(&config, "ewelink.timeout").unwrap(), "30");
        assert_eq!(get_config_value(&config, "zeroconf.probe").unwrap(), "false");
        assert_eq!(get_config_value(&config, "ewelink.email").unwrap(), "null");
        assert!(get_config_value(&config, "nonexistent.key").is_err());
    }

    #[test]
    fn test_masked_hides_secrets() {
        let mut config = AppConfig::default();
        config.ewelink.password = Some("hunter2".to_string());
        config.ewelink.app_secret = Some("s3cret".to_string());

        let shown = masked(&config);
        assert_eq!(shown.ewelink.password.as_deref(), Some(MASK));
        assert_eq!(shown.ewelink.app_secret.as_deref(), Some(MASK));
        assert_eq!(
            get_config_value(&shown, "ewelink.password").unwrap(),
            MASK
        );
        // unset secrets stay unset
        assert!(masked(&AppConfig::default()).ewelink.password.is_none());
    }
}
