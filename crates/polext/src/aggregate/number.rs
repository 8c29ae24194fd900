//! Monetary string normalization.
//!
//! Amounts arrive in whatever format the policy scan used (`1.200`,
//! `1,200.50`, `1.234,56 EUR`, `980,5`). They are rounded to whole units and
//! re-rendered with `.` as the thousands separator.

/// Applies the separator heuristic and returns a plain `digits[.digits]` string.
fn canonical_decimal(value: &str) -> String {
    let clean: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let has_dot = clean.contains('.');
    let has_comma = clean.contains(',');

    match (has_dot, has_comma) {
        (true, false) => {
            let parts: Vec<&str> = clean.split('.').collect();
            let thousands_group =
                parts[1].len() == 3 && parts[0] != "0" && !parts[0].is_empty();
            if parts.len() > 2 || thousands_group {
                clean.replace('.', "")
            } else {
                clean
            }
        }
        (false, true) => {
            if clean.matches(',').count() > 1 {
                clean.replace(',', "")
            } else {
                clean.replacen(',', ".", 1)
            }
        }
        (true, true) => {
            // The separator that appears last is the decimal one.
            let last_comma = clean.rfind(',').unwrap_or(0);
            let last_dot = clean.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                clean.replace('.', "").replacen(',', ".", 1)
            } else {
                clean.replace(',', "")
            }
        }
        (false, false) => clean,
    }
}

/// Parses the leading `digits[.digits]` prefix, ignoring anything after it.
fn parse_decimal_prefix(s: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;

    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() {
            seen_digit = true;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
        } else {
            break;
        }
        end = i + c.len_utf8();
    }

    if !seen_digit {
        return None;
    }
    s[..end].parse::<f64>().ok()
}

/// Parses a monetary string and rounds it to the nearest whole unit.
///
/// Returns `None` when the string holds no digits.
pub fn parse_amount(value: &str) -> Option<u64> {
    let decimal = canonical_decimal(value);
    parse_decimal_prefix(&decimal).map(|n| n.round() as u64)
}

/// Renders `n` with `.` between groups of three digits.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// Normalizes a monetary string. Empty or digit-less input becomes `"0"`.
pub fn format_amount(value: &str) -> String {
    group_thousands(parse_amount(value).unwrap_or(0))
}

/// Reads back a value produced by [`group_thousands`].
pub fn parse_grouped(value: &str) -> Option<u64> {
    let digits = value.replace('.', "");
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Premium for four installments: rate1 plus 10%, rounded.
///
/// When rate1 is zero or unparseable the result mirrors `rate1`.
pub fn derive_rate4(rate1: &str) -> String {
    match parse_grouped(rate1) {
        Some(n) if n > 0 => group_thousands((n as f64 * 1.10).round() as u64),
        _ => rate1.to_string(),
    }
}

/// Keeps only the digits of a franchise percentage; empty becomes `"0"`.
pub fn digits_only(value: &str) -> String {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        "0".to_string()
    } else {
        digits
    }
}
