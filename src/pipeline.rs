use std::sync::LazyLock;

use tracing::{debug, info, warn};

use crate::datetime::{DateTimeParser, TimezoneHint};
use crate::derived::derive_profit_loss;
use crate::error::{IngestError, Result};
use crate::fields::AliasTable;
use crate::models::{CanonicalField, CsvParseResult, ParsedTradeRow, RawRow, SkippedLine};
use crate::validator::validate_row;

static DEFAULT_PARSER: LazyLock<TradeCsvParser> = LazyLock::new(TradeCsvParser::default);

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Zone assumed for offset-less timestamps until a row names its own.
    pub default_timezone: TimezoneHint,
}

/// Split one CSV line into trimmed cells. A double quote toggles quoted
/// mode wherever it appears, a doubled quote inside quoted mode is a literal
/// quote, and only a comma outside quoted mode ends a cell.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

/// Non-blank lines with their 1-based physical line numbers.
fn content_lines(text: &str) -> Vec<(usize, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| (idx + 1, line))
        .collect()
}

/// Trade-history CSV parser. Holds only immutable configuration, so one
/// instance can serve any number of concurrent parses.
#[derive(Debug, Default)]
pub struct TradeCsvParser {
    aliases: AliasTable,
    dates: DateTimeParser,
    options: ParseOptions,
}

impl TradeCsvParser {
    pub fn new(aliases: AliasTable, options: ParseOptions) -> Self {
        Self {
            aliases,
            dates: DateTimeParser::default(),
            options,
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn parse(&self, text: &str) -> Result<CsvParseResult> {
        let lines = content_lines(text);
        if lines.len() < 2 {
            return Err(IngestError::MissingRows);
        }

        let headers = split_csv_line(lines[0].1);
        let mapping = self.aliases.resolve(&headers);
        debug!(
            columns = headers.len(),
            matched = mapping.matched().count(),
            "resolved header row"
        );
        let ambiguous_fields = mapping.ambiguous_fields();
        for field in &ambiguous_fields {
            let columns: Vec<&str> = mapping
                .columns_for(*field)
                .map(|idx| headers[idx].as_str())
                .collect();
            warn!(%field, ?columns, "several columns map to one field; using the first non-empty");
        }
        let has_timezone = mapping.contains(CanonicalField::Timezone);

        let mut hint = self.options.default_timezone.clone();
        let mut rows = Vec::with_capacity(lines.len() - 1);
        let mut skipped_lines = Vec::new();

        for (row_number, &(line_number, line)) in lines.iter().enumerate().skip(1) {
            let cells = split_csv_line(line);
            if cells.len() != headers.len() {
                debug!(
                    line_number,
                    expected = headers.len(),
                    found = cells.len(),
                    "skipping line with mismatched cell count"
                );
                skipped_lines.push(SkippedLine {
                    row_number,
                    line_number,
                    expected_cells: headers.len(),
                    found_cells: cells.len(),
                });
                continue;
            }

            let raw = RawRow::from_cells(&headers, cells);
            if has_timezone {
                if let Some(tz) = raw.value_for(&mapping, CanonicalField::Timezone) {
                    match TimezoneHint::parse(tz) {
                        Ok(parsed) => hint = parsed,
                        Err(e) => warn!(line_number, "{e}; keeping {hint}"),
                    }
                }
            }

            let mut validated = validate_row(&raw, &mapping, &hint, &self.dates);
            if validated.is_valid {
                derive_profit_loss(&mut validated.data);
            }
            rows.push(ParsedTradeRow {
                row_number,
                line_number,
                is_valid: validated.is_valid,
                errors: validated.errors,
                data: validated.data,
                raw,
            });
        }

        let valid_count = rows.iter().filter(|r| r.is_valid).count();
        let invalid_count = rows.len() - valid_count;
        info!(
            valid = valid_count,
            invalid = invalid_count,
            skipped = skipped_lines.len(),
            "parsed trade rows"
        );

        Ok(CsvParseResult {
            headers,
            field_mappings: mapping,
            rows,
            valid_count,
            invalid_count,
            skipped_count: skipped_lines.len(),
            skipped_lines,
            ambiguous_fields,
            detected_timezone: hint.label().to_string(),
        })
    }
}

/// Parse with the built-in alias dictionary and a UTC default.
pub fn parse_trade_csv(text: &str) -> Result<CsvParseResult> {
    DEFAULT_PARSER.parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Side};
    use chrono::{TimeZone, Utc};

    const HEADER: &str = "Symbol,Side,Entry Price,Exit Price,Entry Date,Quantity";

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_split_csv_line_quoting() {
        assert_eq!(split_csv_line("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(split_csv_line(r#""1,234.50",x"#), vec!["1,234.50", "x"]);
        assert_eq!(split_csv_line(r#""say ""hi""",2"#), vec![r#"say "hi""#, "2"]);
        assert_eq!(split_csv_line("a,,"), vec!["a", "", ""]);
        assert_eq!(split_csv_line(r#"" padded ",y"#), vec!["padded", "y"]);
    }

    #[test]
    fn test_split_csv_line_quote_after_whitespace() {
        assert_eq!(split_csv_line(r#"AAPL, "1,234.50""#), vec!["AAPL", "1,234.50"]);
        assert_eq!(split_csv_line(r#"a ,  "b, c"  ,d"#), vec!["a", "b, c", "d"]);
    }

    #[test]
    fn test_split_csv_line_quote_mid_field() {
        assert_eq!(split_csv_line(r#"ab"c,d"e,x"#), vec!["abc,de", "x"]);
        assert_eq!(split_csv_line(r#"5"" pipe,2"#), vec!["5 pipe", "2"]);
    }

    #[test]
    fn test_split_csv_line_keeps_bare_carriage_return() {
        assert_eq!(split_csv_line("a,b\rc,d"), vec!["a", "b\rc", "d"]);
    }

    #[test]
    fn test_spaced_quoted_price_parses() {
        let text = "Symbol,Side,Entry Price,Entry Date\nAAPL, long, \"1,234.50\", 2024-01-15\n";
        let result = parse_trade_csv(text).unwrap();
        assert_eq!(result.skipped_count, 0);
        assert_eq!(result.valid_count, 1);
        assert_eq!(result.rows[0].data.entry_price, Some(1234.50));
    }

    #[test]
    fn test_bare_carriage_return_is_not_truncated() {
        let text = "Symbol,Side,Entry Price,Entry Date\nAAPL,long,150,2024-01-15\rMSFT,short,400,2024-01-16\n";
        let result = parse_trade_csv(text).unwrap();
        assert_eq!(result.rows.len(), 0);
        assert_eq!(
            result.skipped_lines,
            vec![SkippedLine { row_number: 1, line_number: 2, expected_cells: 4, found_cells: 7 }]
        );
    }

    #[test]
    fn test_single_valid_row() {
        let text = format!("{HEADER}\nAAPL,long,150.50,155.75,2024-01-15 09:30:00,100\n");
        let result = parse_trade_csv(&text).unwrap();
        assert_eq!(result.valid_count, 1);
        assert_eq!(result.invalid_count, 0);
        assert_eq!(result.headers.len(), 6);
        let row = &result.rows[0];
        assert!(row.is_valid);
        assert_eq!(row.row_number, 1);
        assert_eq!(row.data.symbol.as_deref(), Some("AAPL"));
        assert_eq!(row.data.side.map(|s| s.direction), Some(Direction::Long));
        assert_eq!(row.data.entry_price, Some(150.50));
        assert_eq!(row.data.exit_price, Some(155.75));
        assert_eq!(row.data.quantity, Some(100.0));
        assert_eq!(
            row.data.entry_datetime_utc,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap())
        );
        assert!(approx(row.data.profit_loss.unwrap(), 525.0));
        assert_eq!(result.detected_timezone, "utc");
    }

    #[test]
    fn test_missing_symbol_is_invalid() {
        let text = format!("{HEADER}\n,long,150.50,155.75,2024-01-15 09:30:00,100");
        let result = parse_trade_csv(&text).unwrap();
        assert_eq!(result.valid_count, 0);
        assert_eq!(result.invalid_count, 1);
        let row = &result.rows[0];
        assert!(row.errors.iter().any(|e| e.field == CanonicalField::Symbol));
        assert_eq!(row.data.profit_loss, None);
        assert_eq!(row.raw.cells[0], ("Symbol".to_string(), String::new()));
    }

    #[test]
    fn test_structural_failure() {
        for text in ["", "   \n\n", HEADER, "\n\nSymbol,Side\n\n"] {
            let err = parse_trade_csv(text).unwrap_err();
            assert!(matches!(err, IngestError::MissingRows));
            assert_eq!(err.to_string(), "CSV must have a header row and at least one data row");
        }
    }

    #[test]
    fn test_crlf_blank_lines_and_numbering() {
        let text = format!(
            "{HEADER}\r\n\r\nAAPL,long,150,155,2024-01-15,10\r\n   \r\nMSFT,short,400,390,2024-01-16,5\r\n"
        );
        let result = parse_trade_csv(&text).unwrap();
        assert_eq!(result.valid_count, 2);
        assert_eq!(result.rows[0].row_number, 1);
        assert_eq!(result.rows[0].line_number, 3);
        assert_eq!(result.rows[1].row_number, 2);
        assert_eq!(result.rows[1].line_number, 5);
        assert_eq!(result.rows[1].data.symbol.as_deref(), Some("MSFT"));
    }

    #[test]
    fn test_mismatched_lines_are_skipped_and_reported() {
        let text = format!(
            "{HEADER}\nAAPL,long,150,155,2024-01-15,10\nBROKEN,long\nTSLA,long,200,,2024-01-17,1,extra\n"
        );
        let result = parse_trade_csv(&text).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.valid_count + result.invalid_count, 1);
        assert_eq!(result.skipped_count, 2);
        assert_eq!(
            result.skipped_lines[0],
            SkippedLine { row_number: 2, line_number: 3, expected_cells: 6, found_cells: 2 }
        );
        assert_eq!(result.skipped_lines[1].found_cells, 7);
    }

    #[test]
    fn test_bad_row_does_not_affect_others() {
        let text = format!(
            "{HEADER}\nAAPL,long,150,155,2024-01-15,10\nAAPL,sideways,150,155,2024-01-15,10\nAAPL,short,150,155,2024-01-15,10\n"
        );
        let result = parse_trade_csv(&text).unwrap();
        let validity: Vec<bool> = result.rows.iter().map(|r| r.is_valid).collect();
        assert_eq!(validity, vec![true, false, true]);
        assert_eq!(result.invalid_rows().count(), 1);
        assert_eq!(result.valid_count, 2);
    }

    #[test]
    fn test_running_timezone_hint() {
        let text = "Symbol,Side,Price,Time,TZ\n\
                    AAPL,buy,100,2024-01-15 09:30,\n\
                    AAPL,sell,101,2024-01-15 09:30,America/New_York\n\
                    AAPL,buy,102,2024-01-15 09:30,\n\
                    AAPL,sell,103,2024-01-15 09:30,Nowhere/Special\n";
        let result = parse_trade_csv(text).unwrap();
        assert_eq!(result.valid_count, 4);
        let times: Vec<_> = result
            .rows
            .iter()
            .map(|r| r.data.entry_datetime_utc.unwrap())
            .collect();
        assert_eq!(times[0], Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap());
        assert_eq!(times[1], Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap());
        assert_eq!(times[2], times[1]);
        assert_eq!(times[3], times[1]);
        assert_eq!(result.detected_timezone, "America/New_York");
    }

    #[test]
    fn test_default_timezone_option() {
        let options = ParseOptions {
            default_timezone: TimezoneHint::parse("+01:00").unwrap(),
        };
        let parser = TradeCsvParser::new(AliasTable::default(), options);
        let result = parser
            .parse("Symbol,Side,Price,Date\nDAX,long,17000,15.01.2024 09:00\n")
            .unwrap();
        assert_eq!(
            result.rows[0].data.entry_datetime_utc,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap())
        );
        assert_eq!(result.detected_timezone, "+01:00");
    }

    #[test]
    fn test_quoted_cells_and_bom() {
        let text = "\u{feff}\"Symbol\",\"Side\",\"Avg Fill Price\",\"Open Time\",\"Qty\"\n\
                    \"btc-usd\",\"SLD\",\"$42,150.00\",\"1705680000000\",\"0.5\"\n";
        let result = parse_trade_csv(text).unwrap();
        assert_eq!(result.valid_count, 1);
        let data = &result.rows[0].data;
        assert_eq!(data.symbol.as_deref(), Some("BTC-USD"));
        assert_eq!(data.side, Some(Side::SELL));
        assert_eq!(data.entry_price, Some(42150.0));
        assert_eq!(data.quantity, Some(0.5));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let text = format!(
            "{HEADER},Notes\nAAPL,long,150,155,2024-01-15,10,\"first, trade\"\n,bad,x,,nope,1,\n"
        );
        let first = parse_trade_csv(&text).unwrap();
        let second = parse_trade_csv(&text).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_result_json_shape() {
        let text = format!("{HEADER}\nAAPL,long,150,155,2024-01-15,10\n");
        let json = serde_json::to_value(parse_trade_csv(&text).unwrap()).unwrap();
        assert_eq!(json["validCount"], 1);
        assert_eq!(json["invalidCount"], 0);
        assert_eq!(json["detectedTimezone"], "utc");
        assert_eq!(json["fieldMappings"]["Entry Date"], "entry_datetime");
        assert_eq!(json["rows"][0]["isValid"], true);
        assert_eq!(json["rows"][0]["data"]["side"], "long");
        assert_eq!(json["rows"][0]["data"]["entry_datetime_utc"], "2024-01-15T00:00:00Z");
        assert_eq!(json["rows"][0]["raw"]["Symbol"], "AAPL");
    }
}
