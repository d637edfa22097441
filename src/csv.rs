use crate::error::Result;
use std::io::prelude::*;

/// Write a row-major `rows x columns` field, one line per row.
pub fn write_csv<P: AsRef<std::path::Path>>(
    field: &[f64],
    rows: usize,
    columns: usize,
    path: &P,
) -> Result<()> {
    tracing::info!("Writing: {:?}", path.as_ref());
    debug_assert_eq!(field.len(), rows * columns);
    let mut output = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_rows(&mut output, field, columns)?;
    output.flush()?;
    Ok(())
}

fn write_rows<W: Write>(output: &mut W, field: &[f64], columns: usize) -> Result<()> {
    if columns == 0 {
        return Ok(());
    }
    for row in field.chunks(columns) {
        write!(output, "{}", row[0])?;
        for r in &row[1..] {
            write!(output, ", {r}")?;
        }
        writeln!(output)?;
    }
    Ok(())
}
