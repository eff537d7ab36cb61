use crate::models::{InstrumentType, Side};

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '₩', '₽', '₿'];

const STOCK_WORDS: &[&str] = &["stock", "stocks", "equity", "equities", "share", "shares", "etf"];
const CRYPTO_WORDS: &[&str] = &["crypto", "cryptocurrency", "coin", "token", "spot"];
const FOREX_WORDS: &[&str] = &["forex", "fx", "currency", "cfd"];
const FUTURES_WORDS: &[&str] = &["future", "futures", "fut", "perp", "perpetual", "perpetuals", "swap"];
const OPTIONS_WORDS: &[&str] = &["option", "options", "opt", "call", "put"];

/// Parse a formatted number: "$1,234.50", " 42 ", "(12.50)".
///
/// Returns `None` for empty or unparseable input.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let s: String = raw
        .chars()
        .filter(|c| *c != ',' && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let value = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => -inner.trim().parse::<f64>().ok()?,
        None => s.parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

pub fn normalize_side(raw: &str) -> Option<Side> {
    match raw.trim().to_lowercase().as_str() {
        "long" | "l" => Some(Side::LONG),
        "short" | "sh" => Some(Side::SHORT),
        "buy" | "b" | "bot" | "bought" => Some(Side::BUY),
        "sell" | "s" | "sld" | "sold" => Some(Side::SELL),
        _ => None,
    }
}

/// Informational only: anything unrecognized is `Other`.
pub fn normalize_instrument_type(raw: &str) -> InstrumentType {
    let value = raw.trim().to_lowercase();
    let value = value.as_str();
    if STOCK_WORDS.contains(&value) {
        InstrumentType::Stock
    } else if CRYPTO_WORDS.contains(&value) {
        InstrumentType::Crypto
    } else if FOREX_WORDS.contains(&value) {
        InstrumentType::Forex
    } else if FUTURES_WORDS.contains(&value) {
        InstrumentType::Futures
    } else if OPTIONS_WORDS.contains(&value) {
        InstrumentType::Options
    } else {
        InstrumentType::Other
    }
}

/// Trimmed string, or `None` when nothing is left.
pub fn normalize_text(raw: &str) -> Option<String> {
    let s = raw.trim();
    (!s.is_empty()).then(|| s.to_string())
}
