//! Plain ASCII rendering of a [`ForecastTable`].

use anyhow::{Result, bail};
use forecast_core::ForecastTable;
use serde_json::Value;
use std::fmt::Write;

const DATETIME_HEADER: &str = "datetime";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders the table with every cell right-aligned and floats rounded to
/// `decimals` places. Fails if a column is shorter than the time axis.
pub fn render(table: &ForecastTable, decimals: usize) -> Result<String> {
    let mut grid: Vec<Vec<String>> = Vec::with_capacity(table.len() + 1);

    let mut header = vec![DATETIME_HEADER.to_string()];
    header.extend(table.labels());
    grid.push(header);

    for (i, row) in table.rows().enumerate() {
        let mut line = Vec::with_capacity(row.cells.len() + 1);
        line.push(row.datetime.format(DATETIME_FORMAT).to_string());
        for (cell, column) in row.cells.iter().zip(&table.columns) {
            match cell {
                Some(value) => line.push(format_value(value, decimals)),
                None => bail!(
                    "column '{}' has {} values but the forecast has {} time steps (row {})",
                    column.label(),
                    column.values.len(),
                    table.len(),
                    i + 1
                ),
            }
        }
        grid.push(line);
    }

    let widths: Vec<usize> = (0..grid[0].len())
        .map(|col| grid.iter().map(|row| row[col].chars().count()).max().unwrap_or(0))
        .collect();

    let separator = {
        let mut s = String::from("+");
        for w in &widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    };

    let mut out = String::new();
    writeln!(out, "{separator}")?;
    for (i, row) in grid.iter().enumerate() {
        out.push('|');
        for (cell, w) in row.iter().zip(&widths) {
            write!(out, " {cell:>w$} |")?;
        }
        out.push('\n');
        if i == 0 {
            writeln!(out, "{separator}")?;
        }
    }
    writeln!(out, "{separator}")?;

    Ok(out)
}

fn format_value(value: &Value, decimals: usize) -> String {
    match value {
        Value::Null => String::new(),
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) => format!("{f:.decimals$}"),
            None => n.to_string(),
        },
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
