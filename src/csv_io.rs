//! Comma-separated input and output for [`Dataset`]s.
//!
//! The reader understands an optional header row and an optional leading row-identifier
//! column. The writer emits the same layout: a header row (with an empty first cell when
//! row identifiers exist), then one line per row.

use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::dataset::{positional_labels, Dataset};
use crate::error::{PcaError, Result};

/// How a CSV source is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvLayout {
    /// First line holds column identifiers.
    pub has_header: bool,
    /// First column holds row identifiers.
    pub has_row_ids: bool,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            has_header: true,
            has_row_ids: true,
        }
    }
}

/// Reads a dataset from `path`.
///
/// # Errors
/// `Io` if the file cannot be read, `Parse` for ragged rows or non-numeric cells,
/// `EmptyInput` if the file holds no data rows.
pub fn read_dataset<P: AsRef<Path>>(path: P, layout: CsvLayout) -> Result<Dataset> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| PcaError::io(path, e))?;
    let dataset = parse_dataset(&text, layout, path)?;
    log::info!(
        "Loaded {} rows x {} columns from {:?}",
        dataset.n_rows(),
        dataset.n_columns(),
        path
    );
    Ok(dataset)
}

/// Parses CSV text. `source` is only used in error messages.
pub fn parse_dataset(text: &str, layout: CsvLayout, source: &Path) -> Result<Dataset> {
    let parse_error = |line: usize, message: String| PcaError::Parse {
        path: source.to_path_buf(),
        line,
        message,
    };

    let mut records = split_records(text, source)?.into_iter();

    let mut header: Option<Vec<String>> = None;
    if layout.has_header {
        let (_, mut cells) = records.next().ok_or(PcaError::EmptyInput)?;
        if layout.has_row_ids && !cells.is_empty() {
            cells.remove(0);
        }
        header = Some(cells);
    }

    let mut row_ids: Vec<String> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    let mut n_columns: Option<usize> = header.as_ref().map(|h| h.len());
    let mut n_rows = 0usize;

    for (line_no, mut cells) in records {
        if layout.has_row_ids {
            if cells.is_empty() {
                return Err(parse_error(line_no, "missing row identifier".into()));
            }
            row_ids.push(cells.remove(0));
        }
        match n_columns {
            Some(expected) if expected != cells.len() => {
                return Err(parse_error(
                    line_no,
                    format!("expected {} values, found {}", expected, cells.len()),
                ));
            }
            None => n_columns = Some(cells.len()),
            _ => {}
        }
        for cell in &cells {
            let value = cell
                .parse::<f64>()
                .map_err(|e| parse_error(line_no, format!("'{}' is not a number: {}", cell, e)))?;
            values.push(value);
        }
        n_rows += 1;
    }

    let n_columns = n_columns.unwrap_or(0);
    if n_rows == 0 || n_columns == 0 {
        return Err(PcaError::EmptyInput);
    }

    let matrix = Array2::from_shape_vec((n_rows, n_columns), values)
        .map_err(|e| PcaError::InvalidDataset(e.to_string()))?;
    let columns = header.unwrap_or_else(|| positional_labels(n_columns));
    let row_ids = if layout.has_row_ids { Some(row_ids) } else { None };
    Dataset::new(columns, row_ids, matrix)
}

/// Writes `dataset` to `path`, replacing any existing file.
pub fn write_dataset<P: AsRef<Path>>(path: P, dataset: &Dataset) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| PcaError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_csv(&mut writer, dataset).map_err(|e| PcaError::io(path, e))?;
    writer.flush().map_err(|e| PcaError::io(path, e))
}

/// Serializes `dataset` as CSV into any writer.
pub fn write_csv<W: Write>(writer: &mut W, dataset: &Dataset) -> std::io::Result<()> {
    let row_ids = dataset.row_ids();

    let mut header: Vec<String> = Vec::with_capacity(dataset.n_columns() + 1);
    if row_ids.is_some() {
        header.push(String::new());
    }
    header.extend(dataset.columns().iter().map(|c| escape_field(c)));
    writeln!(writer, "{}", header.join(","))?;

    for (i, row) in dataset.values().rows().into_iter().enumerate() {
        let mut cells: Vec<String> = Vec::with_capacity(row.len() + 1);
        if let Some(ids) = row_ids {
            cells.push(escape_field(&ids[i]));
        }
        cells.extend(row.iter().map(|x| x.to_string()));
        writeln!(writer, "{}", cells.join(","))?;
    }
    Ok(())
}

/// Splits CSV text into records of unescaped fields, each tagged with the line it starts on.
///
/// Quoted fields may span lines and keep surrounding whitespace; unquoted fields are
/// trimmed. Blank lines are skipped.
fn split_records(text: &str, source: &Path) -> Result<Vec<(usize, Vec<String>)>> {
    let parse_error = |line: usize, message: &str| PcaError::Parse {
        path: source.to_path_buf(),
        line,
        message: message.to_string(),
    };

    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => {
                    if c == '\n' {
                        line += 1;
                    }
                    current.push(c);
                }
            }
            continue;
        }
        match c {
            '"' if !quoted && current.trim().is_empty() => {
                current.clear();
                quoted = true;
                in_quotes = true;
            }
            ',' => fields.push(finish_field(&mut current, &mut quoted)),
            '\n' => {
                let blank = fields.is_empty() && !quoted && current.trim().is_empty();
                fields.push(finish_field(&mut current, &mut quoted));
                let record = std::mem::take(&mut fields);
                if !blank {
                    records.push((record_line, record));
                }
                line += 1;
                record_line = line;
            }
            _ if quoted => {
                if !c.is_whitespace() {
                    return Err(parse_error(line, "unexpected character after closing quote"));
                }
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(parse_error(record_line, "unterminated quoted field"));
    }
    if !fields.is_empty() || quoted || !current.trim().is_empty() {
        fields.push(finish_field(&mut current, &mut quoted));
        records.push((record_line, fields));
    }
    Ok(records)
}

fn finish_field(current: &mut String, quoted: &mut bool) -> String {
    let field = if *quoted {
        std::mem::take(current)
    } else {
        current.trim().to_string()
    };
    current.clear();
    *quoted = false;
    field
}

fn escape_field(field: &str) -> String {
    let needs_quotes = field.contains([',', '"', '\n', '\r']) || field.trim() != field;
    if needs_quotes {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
