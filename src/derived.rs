use crate::models::ParsedRow;

/// Fill in profit/loss from prices, quantity and direction when the export
/// did not supply it. Commission is subtracted when present.
///
/// Returns true when a value was derived. Never touches a supplied figure.
pub fn derive_profit_loss(row: &mut ParsedRow) -> bool {
    if row.profit_loss.is_some() {
        return false;
    }
    let (Some(entry), Some(exit), Some(quantity), Some(side)) =
        (row.entry_price, row.exit_price, row.quantity, row.side)
    else {
        return false;
    };
    let commission = row.commission.unwrap_or(0.0);
    row.profit_loss = Some((exit - entry) * quantity * side.direction.sign() - commission);
    true
}
