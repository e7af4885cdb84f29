//! Fixed-width text rendering of a row-set, for eyeballing results.

use std::io::Write;

use catchdb_error::Result;

use crate::cursor::RowSet;

/// Narrowest cell, in characters.
pub const MIN_CELL_WIDTH: usize = 10;

/// Print a header of column labels and one line per row, consuming the
/// row-set. Cells are right-aligned; reals carry two decimals and NULL is
/// blank. Returns the number of rows printed.
pub fn write_table<W: Write>(row_set: &mut dyn RowSet, out: &mut W) -> Result<usize> {
    let labels = row_set.column_names()?;
    let widths: Vec<usize> = labels
        .iter()
        .map(|label| label.chars().count().max(MIN_CELL_WIDTH))
        .collect();
    write_line(out, labels.iter().map(String::as_str), &widths)?;
    let mut rows = 0;
    let mut cells = Vec::with_capacity(labels.len());
    while row_set.next()? {
        cells.clear();
        for index in 0..labels.len() {
            cells.push(row_set.value(index)?.to_string());
        }
        write_line(out, cells.iter().map(String::as_str), &widths)?;
        rows += 1;
    }
    out.flush()?;
    Ok(rows)
}

fn write_line<'a, W: Write>(
    out: &mut W,
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
) -> Result<()> {
    for (index, (cell, &width)) in cells.zip(widths).enumerate() {
        if index > 0 {
            out.write_all(b" ")?;
        }
        write!(out, "{cell:>width$}")?;
    }
    out.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCursor;
    use catchdb_types::Value;

    #[test]
    fn renders_fixed_width_table() {
        let mut cursor = MemoryCursor::new(
            ["ID", "SST+00", "grSST-05_long_label"],
            vec![
                (17, vec![Value::Float(20.456), Value::Null]),
                (18, vec![Value::Float(-1.0), Value::Float(0.126)]),
            ],
        );
        let mut out = Vec::new();
        let rows = write_table(&mut cursor, &mut out).unwrap();
        assert_eq!(rows, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "        ID     SST+00 grSST-05_long_label",
                "        17      20.46                    ",
                "        18      -1.00                0.13",
            ]
        );
    }

    #[test]
    fn empty_row_set_prints_header_only() {
        let mut cursor = MemoryCursor::empty();
        let mut out = Vec::new();
        assert_eq!(write_table(&mut cursor, &mut out).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), "        ID\n");
    }
}
