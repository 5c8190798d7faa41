//! CSV reader construction, delimiter resolution, and text decoding.
//!
//! - **Delimiter resolution**: `.tsv` → tab, anything else → comma, unless a
//!   delimiter is given explicitly.
//! - **Encoding**: fields are decoded with `encoding_rs`. When no encoding is
//!   requested, UTF-8 is tried first and Windows-1252 is used for any field
//!   that is not valid UTF-8, so spreadsheet exports load without flags.
//! - **stdin**: the `-` path reads from standard input.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const UTF8_BOM: char = '\u{feff}';

/// How cell bytes are turned into text.
#[derive(Debug, Clone, Copy)]
pub enum Decoding {
    /// An encoding the caller asked for; undecodable bytes are an error.
    Strict(&'static Encoding),
    /// UTF-8 with a Windows-1252 fallback per field.
    Lenient,
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_decoding(label: Option<&str>) -> Result<Decoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .map(Decoding::Strict)
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(Decoding::Lenient),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

pub fn decode_bytes(bytes: &[u8], decoding: Decoding) -> Result<String> {
    match decoding {
        Decoding::Strict(encoding) => {
            let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
            if had_errors {
                Err(anyhow!(
                    "Failed to decode text with encoding {}",
                    encoding.name()
                ))
            } else {
                Ok(text.into_owned())
            }
        }
        Decoding::Lenient => match UTF_8.decode_without_bom_handling_and_without_replacement(bytes)
        {
            Some(text) => Ok(text.into_owned()),
            None => {
                let (text, _, _) = WINDOWS_1252.decode(bytes);
                Ok(text.into_owned())
            }
        },
    }
}

pub fn decode_record(record: &csv::ByteRecord, decoding: Decoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, decoding))
        .collect()
}

/// Decodes the header row, trimming whitespace and a leading byte-order mark.
pub fn reader_headers<R>(reader: &mut csv::Reader<R>, decoding: Decoding) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    let mut decoded = decode_record(&headers, decoding)?;
    if let Some(first) = decoded.first_mut() {
        *first = first.trim_start_matches(UTF8_BOM).to_string();
    }
    Ok(decoded.into_iter().map(|h| h.trim().to_string()).collect())
}
