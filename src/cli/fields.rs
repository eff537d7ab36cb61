use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Table};

use trade_ingest::settings::load_settings;
use trade_ingest::CanonicalField;

pub fn list(settings_path: &Path) -> Result<()> {
    let aliases = load_settings(settings_path).alias_table();
    let mut table = Table::new();
    table.set_header(vec!["Field", "Accepted headers"]);
    for field in CanonicalField::ALL {
        table.add_row(vec![
            Cell::new(field),
            Cell::new(aliases.aliases(field).join(", ")),
        ]);
    }
    println!("Fields\n{table}");
    Ok(())
}

pub fn match_headers(settings_path: &Path, headers: &[String]) -> Result<()> {
    let aliases = load_settings(settings_path).alias_table();
    let mut table = Table::new();
    table.set_header(vec!["Header", "Field"]);
    for header in headers {
        let field = aliases
            .match_field(header)
            .map(|f| f.to_string())
            .unwrap_or_else(|| "(no match)".to_string());
        table.add_row(vec![Cell::new(header), Cell::new(field)]);
    }
    println!("{table}");
    Ok(())
}
