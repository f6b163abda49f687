/*!
 * Device output formats
 */

use std::io::{self, Write};

use anyhow::Result;
use btswitch_core::Device;
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Tsv,
    Json,
}

const HEADER: [&str; 4] = ["Name", "Address", "Type", "RSSI"];

/// Spaces between aligned columns.
const PADDING: usize = 2;

pub fn write_devices(out: &mut dyn Write, devices: &[Device], format: Format, header: bool) -> Result<()> {
    match format {
        Format::Tsv => write_tsv(out, devices, header)?,
        Format::Json => write_json(out, devices)?,
    }
    Ok(())
}

/// Space-aligned columns; the last column is never padded.
pub fn write_tsv(out: &mut dyn Write, devices: &[Device], header: bool) -> io::Result<()> {
    let mut rows: Vec<[String; 4]> = Vec::with_capacity(devices.len() + 1);
    if header {
        rows.push(HEADER.map(str::to_string));
    }
    rows.extend(devices.iter().map(|d| {
        [
            d.name.clone(),
            d.address.clone(),
            d.device_type.clone(),
            d.rssi.map(|r| r.to_string()).unwrap_or_default(),
        ]
    }));

    let mut widths = [0usize; 3];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    for row in &rows {
        let mut line = String::new();
        for (cell, width) in row.iter().zip(widths) {
            line.push_str(cell);
            line.push_str(&" ".repeat(width - cell.chars().count() + PADDING));
        }
        line.push_str(&row[3]);
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Pretty-printed array; a single device is still a 1-element array.
pub fn write_json(out: &mut dyn Write, devices: &[Device]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, devices)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_names(out: &mut dyn Write, devices: &[Device]) -> io::Result<()> {
    for device in devices {
        writeln!(out, "{}", device.name)?;
    }
    out.flush()
}
