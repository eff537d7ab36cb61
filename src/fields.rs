use std::collections::{BTreeMap, HashSet};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::models::CanonicalField;

// (field, accepted header spellings)
const DEFAULT_ALIASES: &[(CanonicalField, &[&str])] = &[
    (CanonicalField::Symbol, &[
        "symbol", "ticker", "ticker symbol", "instrument", "asset", "pair", "market",
        "contract", "security", "stock", "coin", "underlying",
    ]),
    (CanonicalField::Side, &[
        "side", "direction", "action", "type", "trade type", "order side", "position type",
        "long/short", "buy/sell", "b/s",
    ]),
    (CanonicalField::EntryPrice, &[
        "entry price", "entry", "open price", "opening price", "buy price", "avg entry price",
        "entry avg price", "price in",
    ]),
    (CanonicalField::ExitPrice, &[
        "exit price", "exit", "close price", "closing price", "sell price", "avg exit price",
        "exit avg price", "price out",
    ]),
    (CanonicalField::FillPrice, &[
        "fill price", "price", "avg price", "average price", "avg fill price", "execution price",
        "exec price", "trade price", "filled price", "fill", "t. price",
    ]),
    (CanonicalField::EntryDatetime, &[
        "entry date", "entry time", "entry datetime", "entry timestamp", "open date", "open time",
        "opening time", "opened", "opened at", "date", "time", "timestamp", "datetime",
        "date/time", "trade date", "trade time", "execution time", "buy date", "filled at",
    ]),
    (CanonicalField::ExitDatetime, &[
        "exit date", "exit time", "exit datetime", "exit timestamp", "close date", "close time",
        "closing time", "close datetime", "closed", "closed at", "sell date",
    ]),
    (CanonicalField::Quantity, &[
        "quantity", "qty", "size", "shares", "volume", "units", "contracts", "lots", "lot size",
        "amount", "position size", "filled qty", "executed qty",
    ]),
    (CanonicalField::ProfitLoss, &[
        "profit loss", "profit/loss", "p&l", "p/l", "pnl", "profit", "net pnl", "net p&l",
        "realized pnl", "realized p&l", "net profit", "gain/loss", "gain loss",
    ]),
    (CanonicalField::Commission, &[
        "commission", "commissions", "comm", "fee", "fees", "trading fee", "brokerage",
    ]),
    (CanonicalField::StopLoss, &["stop loss", "sl", "stop", "stop price", "stop loss price", "sl price"]),
    (CanonicalField::TakeProfit, &[
        "take profit", "tp", "target", "target price", "profit target", "take profit price",
        "tp price",
    ]),
    (CanonicalField::Leverage, &["leverage", "lev"]),
    (CanonicalField::Margin, &["margin", "initial margin", "margin used", "collateral"]),
    (CanonicalField::Strategy, &["strategy", "strategy name", "setup", "playbook", "tag", "tags"]),
    (CanonicalField::BrokerId, &["broker", "broker id", "broker name", "exchange", "platform", "venue"]),
    (CanonicalField::AccountId, &[
        "account", "account id", "account number", "account name", "acct", "portfolio",
    ]),
    (CanonicalField::InstrumentType, &[
        "instrument type", "asset class", "asset type", "security type", "market type",
        "product type", "category",
    ]),
    (CanonicalField::Notes, &["notes", "note", "comment", "comments", "memo", "description", "remarks"]),
    (CanonicalField::Timezone, &["timezone", "time zone", "tz", "utc offset"]),
];

/// Lower-case and drop whitespace, hyphens and underscores.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
struct FieldAliases {
    field: CanonicalField,
    aliases: Vec<String>,
    normalized: Vec<String>,
}

/// JSON object keys for a header row. A header repeated in the file is keyed
/// `<header>#<column>` (1-based) from its second occurrence on.
pub(crate) fn column_keys<'a>(headers: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            if seen.insert(header) {
                header.to_string()
            } else {
                format!("{header}#{}", idx + 1)
            }
        })
        .collect()
}

/// Alias dictionary used to resolve column headers. Immutable once built.
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: Vec<FieldAliases>,
    fuzzy: bool,
}

impl Default for AliasTable {
    fn default() -> Self {
        let entries = DEFAULT_ALIASES
            .iter()
            .map(|(field, aliases)| FieldAliases {
                field: *field,
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
                normalized: aliases.iter().map(|a| normalize_header(a)).collect(),
            })
            .collect();
        Self { entries, fuzzy: true }
    }
}

impl AliasTable {
    /// Append extra spellings to the built-in dictionary.
    pub fn with_extra_aliases(mut self, extra: &BTreeMap<CanonicalField, Vec<String>>) -> Self {
        for (field, aliases) in extra {
            let Some(entry) = self.entries.iter_mut().find(|e| e.field == *field) else {
                continue;
            };
            for alias in aliases {
                let normalized = normalize_header(alias);
                if normalized.is_empty() || entry.normalized.contains(&normalized) {
                    continue;
                }
                entry.aliases.push(alias.clone());
                entry.normalized.push(normalized);
            }
        }
        self
    }

    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.aliases.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a single header: exact alias match first, then a substring match
    /// in either direction.
    ///
    /// The substring pass ranks candidates by the length of the contained string
    /// (longer wins), then by how close the alias length is to the header length,
    /// then by field priority. The result never depends on table iteration order.
    pub fn match_field(&self, header: &str) -> Option<CanonicalField> {
        let h = normalize_header(header);
        if h.is_empty() {
            return None;
        }

        let exact = self
            .entries
            .iter()
            .filter(|e| e.normalized.iter().any(|a| *a == h))
            .map(|e| e.field)
            .min_by_key(CanonicalField::rank);
        if exact.is_some() || !self.fuzzy {
            return exact;
        }

        self.entries
            .iter()
            .flat_map(|e| e.normalized.iter().map(move |a| (e.field, a)))
            .filter_map(|(field, a)| {
                let matched = if h.contains(a.as_str()) {
                    a.len()
                } else if a.contains(h.as_str()) {
                    h.len()
                } else {
                    return None;
                };
                Some((std::cmp::Reverse(matched), a.len().abs_diff(h.len()), field.rank(), field))
            })
            .min()
            .map(|(_, _, _, field)| field)
    }

    /// Build the per-file header mapping.
    pub fn resolve(&self, headers: &[String]) -> HeaderMapping {
        let columns = headers
            .iter()
            .map(|h| (h.clone(), self.match_field(h)))
            .collect();
        HeaderMapping { columns }
    }
}

/// Column-indexed header resolution for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMapping {
    columns: Vec<(String, Option<CanonicalField>)>,
}

impl HeaderMapping {
    pub fn field_for(&self, header: &str) -> Option<CanonicalField> {
        self.columns
            .iter()
            .find(|(h, _)| h == header)
            .and_then(|(_, f)| *f)
    }

    pub fn columns_for(&self, field: CanonicalField) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(move |(_, (_, f))| *f == Some(field))
            .map(|(idx, _)| idx)
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns_for(field).next().is_some()
    }

    /// Matched (header, field) pairs in column order.
    pub fn matched(&self) -> impl Iterator<Item = (&str, CanonicalField)> {
        self.columns
            .iter()
            .filter_map(|(h, f)| f.map(|f| (h.as_str(), f)))
    }

    /// Fields claimed by more than one column, in priority order.
    pub fn ambiguous_fields(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|f| self.columns_for(*f).nth(1).is_some())
            .collect()
    }
}

impl Serialize for HeaderMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let keys = column_keys(self.columns.iter().map(|(h, _)| h.as_str()));
        let mut map = serializer.serialize_map(None)?;
        for (key, (_, field)) in keys.iter().zip(&self.columns) {
            if let Some(field) = field {
                map.serialize_entry(key, field)?;
            }
        }
        map.end()
    }
}
