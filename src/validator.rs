use crate::datetime::{DateTimeParser, TimezoneHint};
use crate::fields::HeaderMapping;
use crate::models::{CanonicalField as Field, ParsedRow, RawRow, ValidationError};
use crate::normalize::{normalize_instrument_type, normalize_side, normalize_text, parse_numeric};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRow {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub data: ParsedRow,
}

/// Reassign a lone fill price to whichever side of the trade is missing.
///
/// Returns the raw (entry, exit) cells after reassignment. A price counts as
/// present when it parses to a non-zero number.
pub fn assign_fill_price<'a>(
    entry: Option<&'a str>,
    exit: Option<&'a str>,
    fill: Option<&'a str>,
) -> (Option<&'a str>, Option<&'a str>) {
    let present = |v: Option<&str>| v.and_then(parse_numeric).is_some_and(|n| n != 0.0);
    let Some(fill) = fill.filter(|f| parse_numeric(f).is_some_and(|n| n > 0.0)) else {
        return (entry, exit);
    };
    match (present(entry), present(exit)) {
        (true, false) => (entry, Some(fill)),
        (false, _) => (Some(fill), exit),
        (true, true) => (entry, exit),
    }
}

/// Validate one row. Every field is checked; errors accumulate.
pub fn validate_row(
    raw: &RawRow,
    mapping: &HeaderMapping,
    hint: &TimezoneHint,
    dates: &DateTimeParser,
) -> ValidatedRow {
    let cell = |field: Field| raw.value_for(mapping, field);
    let mut errors = Vec::new();
    let mut data = ParsedRow::default();

    match cell(Field::Symbol) {
        Some(symbol) => {
            let symbol = symbol.to_uppercase();
            data.group_symbol = Some(symbol.clone());
            data.symbol = Some(symbol);
        }
        None => errors.push(ValidationError::new(Field::Symbol, "Symbol is required")),
    }

    match cell(Field::Side) {
        Some(value) => match normalize_side(value) {
            Some(side) => data.side = Some(side),
            None => errors.push(ValidationError::new(
                Field::Side,
                format!("Invalid side value: {value}"),
            )),
        },
        None => errors.push(ValidationError::new(Field::Side, "Side is required")),
    }

    let (entry_raw, exit_raw) = assign_fill_price(
        cell(Field::EntryPrice),
        cell(Field::ExitPrice),
        cell(Field::FillPrice),
    );
    match entry_raw {
        Some(value) => match parse_numeric(value).filter(|v| *v > 0.0) {
            Some(price) => data.entry_price = Some(price),
            None => errors.push(ValidationError::new(
                Field::EntryPrice,
                format!("Invalid entry price: {value}"),
            )),
        },
        None => errors.push(ValidationError::new(Field::EntryPrice, "Entry price is required")),
    }
    data.exit_price = exit_raw.and_then(parse_numeric).filter(|v| *v > 0.0);

    match cell(Field::EntryDatetime) {
        Some(value) => match dates.parse(value, hint) {
            Some(parsed) => {
                data.entry_datetime_utc = Some(parsed.utc);
                data.entry_datetime_kind = Some(parsed.kind);
                data.entry_datetime_timezone = Some(parsed.timezone);
            }
            None => errors.push(ValidationError::new(
                Field::EntryDatetime,
                format!("Invalid entry date: {value}"),
            )),
        },
        None => errors.push(ValidationError::new(Field::EntryDatetime, "Entry date is required")),
    }
    // an unreadable exit time never invalidates the row
    if let Some(parsed) = cell(Field::ExitDatetime).and_then(|v| dates.parse(v, hint)) {
        data.exit_datetime_utc = Some(parsed.utc);
        data.exit_datetime_kind = Some(parsed.kind);
        data.exit_datetime_timezone = Some(parsed.timezone);
    }

    let number = |field: Field| cell(field).and_then(parse_numeric);
    let non_negative = |field: Field| number(field).filter(|v| *v >= 0.0);
    data.quantity = number(Field::Quantity);
    data.profit_loss = number(Field::ProfitLoss);
    data.commission = number(Field::Commission).map(f64::abs);
    data.stop_loss = non_negative(Field::StopLoss);
    data.take_profit = non_negative(Field::TakeProfit);
    data.leverage = non_negative(Field::Leverage);
    data.margin = non_negative(Field::Margin);

    let text = |field: Field| cell(field).and_then(normalize_text);
    data.strategy = text(Field::Strategy);
    data.group_strategy = data.strategy.clone();
    data.broker_id = text(Field::BrokerId);
    data.account_id = text(Field::AccountId);
    data.notes = text(Field::Notes);
    data.instrument_type = cell(Field::InstrumentType)
        .map(normalize_instrument_type)
        .unwrap_or_default();

    ValidatedRow {
        is_valid: errors.is_empty(),
        errors,
        data,
    }
}
