//! Boundary CSV loader: reads the assignment plan file described in
//! spec §6 and hands already-validated rows to
//! `camprov_core::plan::AssignmentPlan`.
//!
//! Grounded in `csv_handler.py::read_ip_list`: header names are matched
//! case-insensitively, invalid rows are skipped with a warning rather
//! than aborting the whole load, and the MAC/IP format validation
//! happens here rather than being pushed into the core crate.

use std::collections::HashMap;
use std::path::Path;

use camprov_common::HardwareAddress;
use camprov_core::plan::{AssignmentPlan, PlanRow};
use tracing::warn;

/// Read the assignment CSV at `path` and build a validated
/// [`AssignmentPlan`]. Rows with a missing or unparseable IP address are
/// skipped with a warning; a row missing its MAC address when other
/// rows in the file carry one is also skipped, matching the original
/// per-row tolerance rather than aborting the whole file.
pub fn load_plan(path: &Path) -> anyhow::Result<AssignmentPlan> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let ip_col = headers
        .iter()
        .position(|h| h == "finalipaddress" || h == "ip")
        .ok_or_else(|| anyhow::anyhow!("CSV file must contain a FinalIPAddress or IP column"))?;
    let mac_col = headers.iter().position(|h| h == "macaddress" || h == "mac");

    let mut rows = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let line = i + 2; // header is row 1
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping row {line}: {e}");
                continue;
            }
        };

        let Some(ip_raw) = record.get(ip_col).map(str::trim).filter(|s| !s.is_empty()) else {
            warn!("skipping row {line}: missing IP address");
            continue;
        };
        let Ok(addr) = ip_raw.parse() else {
            warn!("skipping row {line}: invalid IP address '{ip_raw}'");
            continue;
        };

        let hw = match mac_col {
            None => None,
            Some(col) => {
                let Some(mac_raw) = record.get(col).map(str::trim).filter(|s| !s.is_empty()) else {
                    warn!("skipping row {line}: missing MAC address");
                    continue;
                };
                match mac_raw.parse::<HardwareAddress>() {
                    Ok(hw) => Some(hw),
                    Err(_) => {
                        warn!("skipping row {line}: invalid MAC address '{mac_raw}'");
                        continue;
                    }
                }
            }
        };

        rows.push(PlanRow { addr, hw });
    }

    if rows.is_empty() {
        anyhow::bail!("no valid IP assignments found in {}", path.display());
    }

    Ok(AssignmentPlan::from_rows(rows)?)
}

/// Write the inventory report described in spec §6: standard fields
/// first, then sorted `<step>_success`/`<step>_message` columns.
/// Grounded in `csv_handler.py::write_inventory_report`'s field
/// ordering, generalized from a `Dict`-of-operations shape to
/// `ResultRecord`'s typed steps.
pub fn write_report(path: &Path, result: &camprov_core::ResultRecord) -> anyhow::Result<()> {
    let step_columns = result.step_name_columns();

    let mut headers = vec![
        "final_ip".to_string(),
        "temp_ip".to_string(),
        "mac".to_string(),
        "verified_mac".to_string(),
        "serial".to_string(),
        "status".to_string(),
    ];
    for step in &step_columns {
        headers.push(format!("{step}_success"));
        headers.push(format!("{step}_message"));
    }

    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(&headers)?;

    for device in result.iter() {
        let steps: HashMap<&str, &camprov_core::StepOutcome> = device
            .steps
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome))
            .collect();

        let mut row = vec![
            device.final_addr.map(|a| a.to_string()).unwrap_or_default(),
            device.temp_addr.to_string(),
            device.hw.canonical(),
            device.verified_hw.map(|h| h.canonical()).unwrap_or_default(),
            device.serial.clone().unwrap_or_default(),
            device.status.label(),
        ];
        for step in &step_columns {
            match steps.get(step.as_str()) {
                Some(outcome) => {
                    row.push(outcome.success.to_string());
                    row.push(outcome.message.clone());
                }
                None => {
                    row.push(String::new());
                    row.push(String::new());
                }
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
