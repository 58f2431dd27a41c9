use color_eyre::eyre::Result;
use csv::Writer;
use serde::Serialize;
use std::io::Write;

use crate::enums::OutputFormat;
use crate::scan::{AccessPoint, HostRecord, ScanReport};

/// A record that can be printed as a row.
pub trait Tabular: Serialize {
    fn header() -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
}

impl Tabular for HostRecord {
    fn header() -> &'static [&'static str] {
        &["ip", "mac", "type", "hostname", "vendor"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.address.to_string(),
            self.hardware_id.to_string(),
            self.origin.to_string(),
            self.name.clone().unwrap_or_default(),
            self.vendor.clone().unwrap_or_default(),
        ]
    }
}

impl Tabular for AccessPoint {
    fn header() -> &'static [&'static str] {
        &["ssid", "bssid", "authentication", "encryption", "signal", "channel"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.network_id.clone(),
            self.bssid.to_string(),
            self.authentication.clone(),
            self.encryption.clone(),
            format!("{}%", self.signal_percent),
            self.channel.to_string(),
        ]
    }
}

pub fn write_report<R: Tabular, W: Write>(
    out: &mut W,
    report: &ScanReport<R>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            writeln!(
                out,
                "{} scan, {} records ({} - {})",
                report.kind,
                report.records.len(),
                report.started_at.format("%H:%M:%S"),
                report.finished_at.format("%H:%M:%S"),
            )?;
            if let Some(warning) = &report.warning {
                writeln!(out, "warning: {warning}")?;
            }
            write_table(out, &report.records)?;
            writeln!(out)?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(out, &report.records)?,
    }
    Ok(())
}

/// Prints bare records, as produced by offline parsing.
pub fn write_records<R: Tabular, W: Write>(
    out: &mut W,
    records: &[R],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => write_table(out, records)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, records)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(out, records)?,
    }
    Ok(())
}

fn write_table<R: Tabular, W: Write>(out: &mut W, records: &[R]) -> Result<()> {
    let header: Vec<String> = R::header().iter().map(|h| h.to_uppercase()).collect();
    let rows: Vec<Vec<String>> = records.iter().map(Tabular::row).collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    for row in std::iter::once(&header).chain(&rows) {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

fn write_csv<R: Tabular, W: Write>(out: &mut W, records: &[R]) -> Result<()> {
    let mut w = Writer::from_writer(out);

    // -- header
    w.write_record(R::header())?;
    for record in records {
        w.write_record(record.row())?;
    }
    w.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{HostOrigin, ScanKind};
    use chrono::Local;
    use pretty_assertions::assert_eq;

    fn hosts() -> Vec<HostRecord> {
        let mut router = HostRecord::new(
            "192.168.1.1".parse().unwrap(),
            "00-11-22-33-44-55".parse().unwrap(),
            HostOrigin::Dynamic,
        );
        router.name = Some("router.lan".into());
        let printer = HostRecord::new(
            "192.168.1.20".parse().unwrap(),
            "aa:bb:cc:dd:ee:ff".parse().unwrap(),
            HostOrigin::Static,
        );
        vec![router, printer]
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn table_aligns_columns() {
        let text = render(|out| write_records(out, &hosts(), OutputFormat::Table));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("IP            MAC"));
        assert_eq!(
            lines[1],
            "192.168.1.1   00:11:22:33:44:55  dynamic  router.lan"
        );
        assert_eq!(lines[2], "192.168.1.20  aa:bb:cc:dd:ee:ff  static");
    }

    #[test]
    fn csv_has_header_and_rows() {
        let text = render(|out| write_records(out, &hosts(), OutputFormat::Csv));
        assert_eq!(
            text,
            "ip,mac,type,hostname,vendor\n\
             192.168.1.1,00:11:22:33:44:55,dynamic,router.lan,\n\
             192.168.1.20,aa:bb:cc:dd:ee:ff,static,,\n"
        );
    }

    #[test]
    fn json_report_carries_kind_and_records() {
        let report = ScanReport {
            kind: ScanKind::Hosts,
            started_at: Local::now(),
            finished_at: Local::now(),
            records: hosts(),
            warning: Some("neighbor cache unavailable".into()),
        };
        let text = render(|out| write_report(out, &report, OutputFormat::Json));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["kind"], "hosts");
        assert_eq!(value["records"][0]["hardware_id"], "00:11:22:33:44:55");
        assert_eq!(value["records"][1]["origin"], "static");
        assert_eq!(value["warning"], "neighbor cache unavailable");
    }

    #[test]
    fn access_point_rows_show_percent() {
        let ap = AccessPoint {
            network_id: "HomeNet".into(),
            bssid: "aa-bb-cc-dd-ee-ff".parse().unwrap(),
            authentication: "WPA2-Personal".into(),
            encryption: "CCMP".into(),
            signal_percent: 87,
            channel: 6,
        };
        assert_eq!(ap.row()[4], "87%");
        assert_eq!(ap.row()[5], "6");
    }
}
