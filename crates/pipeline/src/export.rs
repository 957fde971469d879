//! VDAT import rows

use std::io;

use chrono::{NaiveDate, NaiveDateTime};
use data_validator::CanonicalRecord;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Longest sheet name spreadsheet writers accept
const MAX_SHEET_NAME: usize = 31;

const VDAT_COLUMNS: [&str; 7] = [
    "VIN",
    "BRAND",
    "MODEL",
    "MODELTYPE",
    "CUSTOMER",
    "POA",
    "DTMASSIGNEDDATE",
];

/// One row of the VDAT import file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct VdatRow {
    pub vin: String,
    pub brand: String,
    pub model: String,
    pub modeltype: String,
    pub customer: String,
    pub poa: String,
    /// Assignment date, dd/mm/yyyy
    pub dtmassigneddate: String,
}

/// Project canonical records onto VDAT rows
pub fn vdat_rows(
    records: &[CanonicalRecord],
    customer_code: &str,
    poa_code: &str,
    assigned: NaiveDate,
) -> Vec<VdatRow> {
    let date = assigned.format("%d/%m/%Y").to_string();
    records
        .iter()
        .map(|r| VdatRow {
            vin: r.vin.clone(),
            brand: r.brand_code.clone(),
            model: r.model.clone(),
            modeltype: r.model.clone(),
            customer: customer_code.to_string(),
            poa: poa_code.to_string(),
            dtmassigneddate: date.clone(),
        })
        .collect()
}

/// `VDAT_{customer}_{poa}_{YYYYmmdd_HHMM}.csv`
pub fn file_name(customer_code: &str, poa_code: &str, at: NaiveDateTime) -> String {
    format!(
        "VDAT_{}_{}_{}.csv",
        customer_code,
        poa_code,
        at.format("%Y%m%d_%H%M")
    )
}

/// Batch reference made safe for use as a worksheet name
pub fn sheet_name(batch_ref: &str) -> String {
    batch_ref
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '[' | ']'))
        .take(MAX_SHEET_NAME)
        .collect()
}

/// Write rows as CSV with a header line
pub fn write_csv<W: io::Write>(writer: W, rows: &[VdatRow]) -> Result<(), PipelineError> {
    let mut csv = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv.write_record(VDAT_COLUMNS)?;
    }
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}
