//! Customer and port-of-arrival codes used by the VDAT import

use chrono::NaiveDate;

/// Customer display name -> VDAT customer code
const CUSTOMER_CODES: &[(&str, &str)] = &[
    ("Hoedlmayr", "HOD"),
    ("Stellantis", "STS"),
    ("INEOS", "INO"),
    ("Aston Martin Lagonda", "AML"),
    ("Bentley Motors Ltd", "BML"),
    ("KESS Groning", "KGR"),
    ("Neptune JLR", "LRE"),
];

/// Port of arrival display name -> VDAT port code
const POA_CODES: &[(&str, &str)] = &[
    ("Grimsby", "GRIM"),
    ("Zeebrugge", "ZEEB"),
    ("Malmo", "MALM"),
    ("Emden", "EMD"),
    ("Setubal", "SETU"),
];

fn lookup(table: &[(&str, &str)], name: &str) -> String {
    let name = name.trim();
    table
        .iter()
        .find(|(display, _)| display.eq_ignore_ascii_case(name))
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| name.to_uppercase())
}

/// Customer code for a display name. Unlisted names pass through uppercased.
pub fn customer_code(name: &str) -> String {
    lookup(CUSTOMER_CODES, name)
}

/// Port code for a display name. Unlisted names pass through uppercased.
pub fn poa_code(name: &str) -> String {
    lookup(POA_CODES, name)
}

/// Batch reference used when the operator supplies none
pub fn default_batch_ref(date: NaiveDate, customer_code: &str) -> String {
    format!("{}{}", date.format("%d%m%Y"), customer_code)
}
