//! Header keyword synonyms

/// Semantic meaning of a header cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// VIN / chassis number column
    Identifier,
    /// Make / brand column
    Brand,
    /// Model column
    Model,
    /// Recognized manifest column with no record field of its own
    Context,
}

/// Keyword table, checked in order. A header token matches when it starts with a keyword.
const SYNONYMS: &[(Field, &[&str])] = &[
    (Field::Identifier, &["VIN", "CHASSIS"]),
    (Field::Brand, &["MAKE", "BRAND", "OEM", "MANUFACTURER", "MARQUE"]),
    (Field::Model, &["MODEL"]),
    (Field::Context, &["COMMODITY", "CUST", "DESTINATION", "CONSIGNEE", "VOYAGE"]),
];

/// Pivot-table summaries ("Count of VIN") never start a data region
const PIVOT_MARKERS: &[&str] = &["COUNT OF", "SUM OF"];

fn tokens(cell: &str) -> impl Iterator<Item = String> + '_ {
    cell.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
}

/// Classify a header cell against the synonym table
pub fn classify(cell: &str) -> Option<Field> {
    let tokens: Vec<String> = tokens(cell).collect();
    SYNONYMS.iter().find_map(|(field, keywords)| {
        tokens
            .iter()
            .any(|t| keywords.iter().any(|k| t.starts_with(k)))
            .then_some(*field)
    })
}

/// Whether a cell marks a pivot-table summary
pub fn is_pivot_marker(cell: &str) -> bool {
    let upper = tokens(cell).collect::<Vec<_>>().join(" ");
    PIVOT_MARKERS.iter().any(|m| upper.contains(m))
}
