//! Best-effort numeric coercion. Every function returns `None` instead of failing.

/// `"$450,000"` → `450000.0`; `"B/.120,000 - 150,000"` → `120000.0` (ranges keep the low end)
pub fn clean_price(text: &str) -> Option<f64> {
    let cleaned = text.replace("B/.", "").replace(['$', ','], "");
    cleaned.split('-').next().and_then(parse_float)
}

/// Thousands separators are dropped: `"1,200"` → `1200.0`
pub fn parse_float(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Whole numbers only: `"2.5"` is not an integer
pub fn parse_int(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Recover a count from evidence such as `"Bedrooms: 3 habitaciones"`.
///
/// The first entry holding `"<label>: "` whose next token parses wins.
pub fn recover_from_specs<'a>(
    raw_specs: impl IntoIterator<Item = &'a str>,
    label: &str,
) -> Option<f64> {
    let prefix = format!("{label}: ");
    raw_specs.into_iter().find_map(|part| {
        let start = part.find(&prefix)? + prefix.len();
        part[start..].split_whitespace().next().and_then(parse_float)
    })
}
