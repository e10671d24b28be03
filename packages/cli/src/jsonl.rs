//! Line-delimited JSON input and output.
//!
//! Blank lines are skipped. `-` stands for stdin/stdout.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line that is not valid JSON for the expected type.
    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Opens a path for reading, or stdin for `-`.
///
/// # Errors
///
/// Returns [`JsonlError::Io`] if the file cannot be opened.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>, JsonlError> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    Ok(Box::new(BufReader::new(File::open(path)?)))
}

/// Opens a path for writing (truncating), or stdout for `None` / `-`.
///
/// # Errors
///
/// Returns [`JsonlError::Io`] if the file cannot be created.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, JsonlError> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            Ok(Box::new(BufWriter::new(File::create(path)?)))
        }
        _ => Ok(Box::new(BufWriter::new(std::io::stdout()))),
    }
}

/// Parses every non-blank line as a `T`.
///
/// # Errors
///
/// Returns [`JsonlError::Parse`] with the 1-based line number of the first
/// bad line.
pub fn read_all<T: DeserializeOwned>(input: impl Read) -> Result<Vec<T>, JsonlError> {
    let mut items = Vec::new();

    for (i, line) in BufReader::new(input).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|source| JsonlError::Parse {
            line: i + 1,
            source,
        })?;
        items.push(item);
    }

    Ok(items)
}

/// Writes one JSON object per line and flushes.
///
/// # Errors
///
/// Returns [`JsonlError`] if serialization or the write fails.
pub fn write_all<'a, T: Serialize + 'a>(
    output: &mut dyn Write,
    items: impl IntoIterator<Item = &'a T>,
) -> Result<usize, JsonlError> {
    let mut written = 0;
    for item in items {
        serde_json::to_writer(&mut *output, item)?;
        output.write_all(b"\n")?;
        written += 1;
    }
    output.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use geoparse_gazetteer_models::LocationRow;
    use geoparse_matcher_models::Document;

    use super::*;

    #[test]
    fn reads_documents_and_skips_blank_lines() {
        let input = "{\"id\":\"a\",\"text\":\"hello York\"}\n\n  \n{\"id\":\"b\",\"text\":\"x\",\"geotag\":\"POINT(1 2)\"}\n";
        let docs: Vec<Document> = read_all(input.as_bytes()).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0], Document::new("a", "hello York"));
        assert_eq!(docs[1].geotag.as_deref(), Some("POINT(1 2)"));
    }

    #[test]
    fn parse_errors_carry_the_line_number() {
        let input = "{\"id\":\"a\",\"text\":\"ok\"}\n{not json}\n";
        let err = read_all::<Document>(input.as_bytes()).unwrap_err();

        assert!(matches!(err, JsonlError::Parse { line: 2, .. }));
    }

    #[test]
    fn written_rows_read_back() {
        let rows = vec![LocationRow {
            loc_id: 7,
            name: "Southampton".to_string(),
            osm_id: "(26847709)".to_string(),
            admin_parents: String::new(),
            geom_wkt: "POINT(-1.4 50.9)".to_string(),
            tags_json: "{}".to_string(),
        }];

        let mut buf: Vec<u8> = Vec::new();
        assert_eq!(write_all(&mut buf, &rows).unwrap(), 1);
        assert!(buf.ends_with(b"\n"));

        let back: Vec<LocationRow> = read_all(buf.as_slice()).unwrap();
        assert_eq!(back, rows);
    }
}
