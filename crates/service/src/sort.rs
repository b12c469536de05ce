//! Natural ordering of sibling `code` values.
//!
//! A code splits into a leading run of ASCII digits and the remaining suffix.
//! Codes order by that number (codes without one sort after every number),
//! then by the suffix compared case-insensitively.
//!
//! ```
//! use service::sort::sort_codes;
//! let mut codes = vec!["2A", "10", "1", "ITEM"];
//! sort_codes(&mut codes);
//! assert_eq!(codes, ["1", "2A", "10", "ITEM"]);
//! ```

use std::cmp::Ordering;

use crate::store::Document;

/// Leading digits with leading zeros removed; `None` stands for +infinity.
fn split_code(code: &str) -> (Option<&str>, &str) {
    let digits = code.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (None, code);
    }
    let (run, rest) = code.split_at(digits);
    let trimmed = run.trim_start_matches('0');
    (Some(if trimmed.is_empty() { "0" } else { trimmed }), rest)
}

// Compares digit strings of arbitrary length without parsing.
fn compare_runs(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.len().cmp(&y.len()).then_with(|| x.cmp(y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_suffix(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Total order over codes. Exact ties on number and folded suffix fall back
/// to the raw string so the order never depends on input order.
pub fn compare_codes(a: &str, b: &str) -> Ordering {
    let (num_a, rest_a) = split_code(a);
    let (num_b, rest_b) = split_code(b);
    compare_runs(num_a, num_b)
        .then_with(|| compare_suffix(rest_a, rest_b))
        .then_with(|| a.cmp(b))
}

pub fn sort_codes<S: AsRef<str>>(codes: &mut [S]) {
    codes.sort_by(|a, b| compare_codes(a.as_ref(), b.as_ref()));
}

/// Sort documents in place by their `code`; missing codes compare as empty.
pub fn sort_documents(docs: &mut [Document]) {
    docs.sort_by(|a, b| {
        compare_codes(a.code.as_deref().unwrap_or(""), b.code.as_deref().unwrap_or(""))
            .then_with(|| a.id.cmp(&b.id))
    });
}
