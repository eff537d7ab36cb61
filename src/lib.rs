//! Trade-history CSV ingestion.
//!
//! Turns broker exports with arbitrary headers, date formats and number
//! formatting into canonical trade records, with per-row validation errors.
//! Pure and synchronous; only [`settings`] touches the filesystem.

pub mod datetime;
pub mod derived;
pub mod error;
pub mod fields;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod settings;
pub mod validator;

pub use datetime::{parse_datetime, DateTimeKind, DateTimeParser, ParsedDateTime, TimezoneHint};
pub use error::{IngestError, Result};
pub use fields::{AliasTable, HeaderMapping};
pub use models::{
    CanonicalField, CsvParseResult, Direction, InstrumentType, ParsedRow, ParsedTradeRow, RawRow,
    Side, SkippedLine, ValidationError,
};
pub use pipeline::{parse_trade_csv, ParseOptions, TradeCsvParser};
