use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{Cell, Table};

use trade_ingest::settings::load_settings;
use trade_ingest::{CsvParseResult, ParsedTradeRow};

use crate::fmt::{amount, opt, quantity};

pub fn run(
    settings_path: &Path,
    file: &Path,
    json: bool,
    timezone: Option<&str>,
    errors_only: bool,
) -> Result<()> {
    let mut settings = load_settings(settings_path);
    if let Some(tz) = timezone {
        settings.default_timezone = tz.to_string();
    }
    let parser = settings.parser()?;

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let result = parser.parse(&text)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result, errors_only);
    }
    Ok(())
}

fn print_report(result: &CsvParseResult, errors_only: bool) {
    let mut columns = Table::new();
    columns.set_header(vec!["Column", "Field"]);
    for header in &result.headers {
        let field = result
            .field_mappings
            .field_for(header)
            .map(|f| f.to_string())
            .unwrap_or_else(|| "(ignored)".dimmed().to_string());
        columns.add_row(vec![Cell::new(header), Cell::new(field)]);
    }
    println!("Columns\n{columns}");
    for field in &result.ambiguous_fields {
        println!(
            "{} several columns map to {field}; the first non-empty one is used",
            "warning:".yellow().bold()
        );
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Row", "Status", "Symbol", "Side", "Entry", "Exit", "Qty", "P/L", "Entry (UTC)", "Errors",
    ]);
    let rows: Vec<&ParsedTradeRow> = if errors_only {
        result.invalid_rows().collect()
    } else {
        result.rows.iter().collect()
    };
    for row in rows {
        let status = if row.is_valid {
            "ok".green().to_string()
        } else {
            "invalid".red().to_string()
        };
        let pnl = match row.data.profit_loss {
            Some(v) if v < 0.0 => amount(v).red().to_string(),
            Some(v) => amount(v).green().to_string(),
            None => String::new(),
        };
        let errors: Vec<String> = row
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        table.add_row(vec![
            Cell::new(row.line_number),
            Cell::new(status),
            Cell::new(row.data.symbol.as_deref().unwrap_or_default()),
            Cell::new(opt(row.data.side, |s| s.label().to_string())),
            Cell::new(opt(row.data.entry_price, quantity)),
            Cell::new(opt(row.data.exit_price, quantity)),
            Cell::new(opt(row.data.quantity, quantity)),
            Cell::new(pnl),
            Cell::new(opt(row.data.entry_datetime_utc, |t| {
                t.format("%Y-%m-%d %H:%M:%S").to_string()
            })),
            Cell::new(errors.join("\n")),
        ]);
    }
    println!("Rows\n{table}");

    for skipped in &result.skipped_lines {
        println!(
            "{} line {} has {} cells, expected {}",
            "skipped:".yellow(),
            skipped.line_number,
            skipped.found_cells,
            skipped.expected_cells
        );
    }
    println!(
        "{} valid, {} invalid, {} skipped (timezone: {})",
        result.valid_count, result.invalid_count, result.skipped_count, result.detected_timezone
    );
}
