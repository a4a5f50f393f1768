//! Delimited-text and JSON-lines parsing with encoding and delimiter auto-detection.
//!
//! Knows nothing about customers or products: it turns bytes into header-keyed
//! string records, or into one JSON object per line.

use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord};
use serde_json::Value;

use crate::error::{LoadError, LoadResult, SourceLine};
use crate::models::RawTransaction;

/// Delimited file contents with detection metadata.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Column headers, trimmed
    pub headers: Vec<String>,
    /// Data rows, blank lines removed
    pub records: Vec<StringRecord>,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

impl ParseResult {
    /// Position of a header, ignoring case.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes using the given encoding, falling back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the header line.
///
/// Ties and header lines without any separator fall back to a comma.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text with an explicit delimiter.
pub fn parse_delimited(
    content: &str,
    delimiter: char,
    path: &Path,
) -> LoadResult<(Vec<String>, Vec<StringRecord>)> {
    if content.trim().is_empty() {
        return Err(LoadError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    let csv_error = |e: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim_matches('"').to_string())
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(record);
    }

    Ok((headers, records))
}

/// Read a delimited file with auto-detection of encoding and delimiter.
pub fn parse_delimited_file(path: &Path) -> LoadResult<ParseResult> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let (headers, records) = parse_delimited(&content, delimiter, path)?;

    Ok(ParseResult {
        headers,
        records,
        encoding,
        delimiter,
    })
}

/// Parse JSON-lines content: one JSON object per non-blank line.
pub fn parse_json_lines(content: &str, path: &Path) -> LoadResult<Vec<RawTransaction>> {
    let shared: Arc<Path> = Arc::from(path);
    let mut rows = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let origin = SourceLine::new(Arc::clone(&shared), idx + 1);
        let value: Value = serde_json::from_str(line).map_err(|source| LoadError::Json {
            origin: origin.clone(),
            source,
        })?;

        match value {
            Value::Object(fields) => rows.push(RawTransaction { origin, fields }),
            _ => return Err(LoadError::NotAnObject { origin }),
        }
    }

    Ok(rows)
}

/// Read a JSON-lines file.
pub fn parse_json_lines_file(path: &Path) -> LoadResult<Vec<RawTransaction>> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_json_lines(&content, path)
}
