//! Output formatting utilities
//!
//! Handles JSON, YAML, and table output formats, plus the success/error
//! result objects printed by the cache commands.

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::cli::OutputFormat;
use crate::config::RuntimeContext;
use crate::error::ZeroconfError;

/// Format and print data according to the configured output format
pub fn print_output<T: Serialize + ?Sized>(ctx: &RuntimeContext, data: &T) -> Result<()> {
    let output = format_output(ctx.output_format(), std::io::stdout().is_terminal(), data)?;
    println!("{output}");
    Ok(())
}

/// Format data for an output format; `is_tty` selects pretty JSON
pub fn format_output<T: Serialize + ?Sized>(
    format: OutputFormat,
    is_tty: bool,
    data: &T,
) -> Result<String> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?.trim_end().to_string()),
        _ if is_tty => Ok(serde_json::to_string_pretty(data)?),
        _ => Ok(serde_json::to_string(data)?),
    }
}

/// Print a result object and map it to the process exit code
pub fn print_result<T: Serialize>(
    ctx: &RuntimeContext,
    result: &Result<T, ZeroconfError>,
) -> Result<ExitCode> {
    match result {
        Ok(value) => {
            print_output(ctx, value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => print_failure(ctx, err),
    }
}

/// Print the error result object for a failed operation
pub fn print_failure(ctx: &RuntimeContext, err: &ZeroconfError) -> Result<ExitCode> {
    log::debug!("operation failed: {err:?}");
    print_output(ctx, &err.body())?;
    Ok(ExitCode::FAILURE)
}

/// Like [`print_failure`], for reads of a cache file `command` would create
pub fn print_load_failure(
    ctx: &RuntimeContext,
    err: &ZeroconfError,
    command: &str,
) -> Result<ExitCode> {
    if let Some(hint) = load_hint(err, command) {
        log::warn!("{hint}");
    }
    print_failure(ctx, err)
}

fn load_hint(err: &ZeroconfError, command: &str) -> Option<String> {
    err.is_not_found()
        .then(|| format!("cache file missing; create it with 'ewz {command}'"))
}

/// Run `human` for interactive table output, otherwise serialize `data`
pub fn output_for_format<T, F>(ctx: &RuntimeContext, data: &T, human: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce() -> Result<()>,
{
    let format = ctx.output_format();
    let is_tty = std::io::stdout().is_terminal();

    match format {
        OutputFormat::Table => human(),
        OutputFormat::Auto if is_tty => human(),
        _ => print_output(ctx, data),
    }
}

/// Print a table from items that implement Tabled
pub fn print_table<T: Tabled>(ctx: &RuntimeContext, items: &[T]) -> Result<()> {
    let table = build_table(ctx, items);
    println!("{table}");
    Ok(())
}

fn build_table<T: Tabled>(ctx: &RuntimeContext, items: &[T]) -> Table {
    let mut table = Table::new(items);
    table.with(Style::sharp());

    if ctx.global.no_headers || ctx.config.output.no_headers {
        table.with(tabled::settings::Remove::row(
            tabled::settings::object::Rows::first(),
        ));
    }

    table
}

/// Parse JSON input from various sources (inline, file, stdin)
pub fn parse_json_input(input: &str) -> Result<serde_json::Value> {
    let input = input.trim();

    // Check for stdin indicator
    if input == "-" {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(serde_json::from_str(&buffer)?);
    }

    // Check for file path indicator
    if let Some(path) = input.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&content)?);
    }

    // Parse as inline JSON
    Ok(serde_json::from_str(input)?)
}

/// Shorten long identifiers for table cells
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zeroconf::ArpEntry;

    #[test]
    fn test_format_output_json() {
        let entries = vec![ArpEntry::new("10.0.0.1", "aa:bb:cc:dd:ee:ff")];
        let compact = format_output(OutputFormat::Json, false, &entries).unwrap();
        assert_eq!(compact, r#"[{"ip":"10.0.0.1","mac":"aa:bb:cc:dd:ee:ff"}]"#);

        let pretty = format_output(OutputFormat::Auto, true, &entries).unwrap();
        assert!(pretty.contains('\n'));
    }

    #[test]
    fn test_format_output_yaml_error_body() {
        let body = ZeroconfError::EmptyRange.body();
        let yaml = format_output(OutputFormat::Yaml, false, &body).unwrap();
        assert!(yaml.starts_with("error:"));
        assert!(yaml.contains("range must not be empty"));
    }

    #[test]
    fn test_parse_json_input_inline() {
        let json = r#"[{"ip": "10.0.0.1", "mac": "aa-bb-cc-dd-ee-ff"}]"#;
        let result = parse_json_input(json).unwrap();
        assert_eq!(result[0]["ip"], "10.0.0.1");
    }

    #[test]
    fn test_parse_json_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");
        std::fs::write(&path, r#"{"ip": "10.0.0.1"}"#).unwrap();

        let result = parse_json_input(&format!("@{}", path.display())).unwrap();
        assert_eq!(result["ip"], "10.0.0.1");
    }

    #[test]
    fn test_load_hint_only_for_missing_files() {
        let missing = ZeroconfError::filesystem(
            "open",
            std::path::Path::new("arp-table.json"),
            &std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(
            load_hint(&missing, "arp save").as_deref(),
            Some("cache file missing; create it with 'ewz arp save'")
        );
        assert!(load_hint(&ZeroconfError::EmptyRange, "arp save").is_none());
        assert!(load_hint(&ZeroconfError::cloud(406, None), "devices save").is_none());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("1000abcdef99", 8), "1000abc…");
    }
}
