/// Format a number with thousands separators and two decimals: 1,234.56
pub fn amount(val: f64) -> String {
    let negative = val < 0.0;
    let fixed = format!("{:.2}", val.abs());
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative && fixed != "0.00" {
        format!("-{with_commas}.{dec_part}")
    } else {
        format!("{with_commas}.{dec_part}")
    }
}

/// Prices and quantities keep their own precision; only trailing zeros go.
pub fn quantity(val: f64) -> String {
    let s = format!("{val:.8}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

pub fn opt<T>(val: Option<T>, f: impl Fn(T) -> String) -> String {
    val.map(f).unwrap_or_default()
}
