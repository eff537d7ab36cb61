use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::datetime::DateTimeKind;
use crate::fields::{column_keys, HeaderMapping};

/// Closed set of normalized trade attributes a column header can map onto.
///
/// Declaration order doubles as the resolver's priority list: when two fields
/// tie on an alias match, the one listed first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Symbol,
    Side,
    EntryPrice,
    ExitPrice,
    FillPrice,
    EntryDatetime,
    ExitDatetime,
    Quantity,
    ProfitLoss,
    Commission,
    StopLoss,
    TakeProfit,
    Leverage,
    Margin,
    Strategy,
    BrokerId,
    AccountId,
    InstrumentType,
    Notes,
    Timezone,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 20] = [
        Self::Symbol,
        Self::Side,
        Self::EntryPrice,
        Self::ExitPrice,
        Self::FillPrice,
        Self::EntryDatetime,
        Self::ExitDatetime,
        Self::Quantity,
        Self::ProfitLoss,
        Self::Commission,
        Self::StopLoss,
        Self::TakeProfit,
        Self::Leverage,
        Self::Margin,
        Self::Strategy,
        Self::BrokerId,
        Self::AccountId,
        Self::InstrumentType,
        Self::Notes,
        Self::Timezone,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Symbol => "symbol",
            Self::Side => "side",
            Self::EntryPrice => "entry_price",
            Self::ExitPrice => "exit_price",
            Self::FillPrice => "fill_price",
            Self::EntryDatetime => "entry_datetime",
            Self::ExitDatetime => "exit_datetime",
            Self::Quantity => "quantity",
            Self::ProfitLoss => "profit_loss",
            Self::Commission => "commission",
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::Leverage => "leverage",
            Self::Margin => "margin",
            Self::Strategy => "strategy",
            Self::BrokerId => "broker_id",
            Self::AccountId => "account_id",
            Self::InstrumentType => "instrument_type",
            Self::Notes => "notes",
            Self::Timezone => "timezone",
        }
    }

    /// Position in the priority list.
    pub fn rank(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

/// Trade direction plus whether the source spelled it as an order verb
/// ("buy"/"sell") rather than a position ("long"/"short").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Side {
    pub direction: Direction,
    pub order_verb: bool,
}

impl Side {
    pub const LONG: Side = Side { direction: Direction::Long, order_verb: false };
    pub const SHORT: Side = Side { direction: Direction::Short, order_verb: false };
    pub const BUY: Side = Side { direction: Direction::Long, order_verb: true };
    pub const SELL: Side = Side { direction: Direction::Short, order_verb: true };

    pub fn label(&self) -> &'static str {
        match (self.direction, self.order_verb) {
            (Direction::Long, false) => "long",
            (Direction::Short, false) => "short",
            (Direction::Long, true) => "buy",
            (Direction::Short, true) => "sell",
        }
    }
}

impl Serialize for Side {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentType {
    Stock,
    Crypto,
    Forex,
    Futures,
    Options,
    #[default]
    Other,
}

/// One data line keyed by the raw header text, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn from_cells(headers: &[String], values: Vec<String>) -> Self {
        Self {
            cells: headers.iter().cloned().zip(values).collect(),
        }
    }

    /// Left-most non-empty cell among the columns mapped to `field`.
    pub fn value_for<'a>(&'a self, mapping: &HeaderMapping, field: CanonicalField) -> Option<&'a str> {
        mapping
            .columns_for(field)
            .filter_map(|idx| self.cells.get(idx))
            .map(|(_, v)| v.trim())
            .find(|v| !v.is_empty())
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let keys = column_keys(self.cells.iter().map(|(h, _)| h.as_str()));
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (key, (_, value)) in keys.iter().zip(&self.cells) {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Canonical trade record. Partial when the row failed validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_datetime_utc: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_datetime_kind: Option<DateTimeKind>,
    /// Zone or offset the entry time was read in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_datetime_timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_datetime_utc: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_datetime_kind: Option<DateTimeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_datetime_timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub instrument_type: InstrumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_strategy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: CanonicalField,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: CanonicalField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTradeRow {
    /// Position among non-blank lines; the header is row 0.
    pub row_number: usize,
    /// 1-based physical line in the input text.
    pub line_number: usize,
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub data: ParsedRow,
    pub raw: RawRow,
}

/// A data line dropped because its cell count did not match the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedLine {
    pub row_number: usize,
    pub line_number: usize,
    pub expected_cells: usize,
    pub found_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvParseResult {
    pub headers: Vec<String>,
    pub field_mappings: HeaderMapping,
    pub rows: Vec<ParsedTradeRow>,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub skipped_count: usize,
    pub skipped_lines: Vec<SkippedLine>,
    pub ambiguous_fields: Vec<CanonicalField>,
    pub detected_timezone: String,
}

impl CsvParseResult {
    pub fn invalid_rows(&self) -> impl Iterator<Item = &ParsedTradeRow> {
        self.rows.iter().filter(|r| !r.is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_keys_match_serde() {
        for field in CanonicalField::ALL {
            assert_eq!(serde_json::to_value(field).unwrap(), field.key());
            assert_eq!(field.to_string(), field.key());
        }
    }

    #[test]
    fn test_field_rank_follows_declaration() {
        assert_eq!(CanonicalField::Symbol.rank(), 0);
        assert_eq!(CanonicalField::Timezone.rank(), 19);
        assert!(CanonicalField::EntryPrice.rank() < CanonicalField::FillPrice.rank());
    }

    #[test]
    fn test_side_labels() {
        assert_eq!(Side::LONG.label(), "long");
        assert_eq!(Side::SHORT.label(), "short");
        assert_eq!(Side::BUY.label(), "buy");
        assert_eq!(Side::SELL.label(), "sell");
        assert_eq!(serde_json::to_string(&Side::SELL).unwrap(), "\"sell\"");
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Side::BUY.direction.sign(), 1.0);
        assert_eq!(Side::SHORT.direction.sign(), -1.0);
    }

    #[test]
    fn test_raw_row_serializes_in_column_order() {
        let headers = vec!["Symbol".to_string(), "Side".to_string()];
        let row = RawRow::from_cells(&headers, vec!["AAPL".into(), "long".into()]);
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"Symbol":"AAPL","Side":"long"}"#
        );
    }

    #[test]
    fn test_raw_row_keeps_repeated_headers() {
        let headers = vec!["Price".to_string(), "Price".to_string()];
        let row = RawRow::from_cells(&headers, vec!["10".into(), "12".into()]);
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"Price":"10","Price#2":"12"}"#
        );
    }

    #[test]
    fn test_parsed_row_omits_missing_fields() {
        let row = ParsedRow {
            symbol: Some("AAPL".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["instrument_type"], "other");
        assert!(json.get("exit_price").is_none());
    }
}
