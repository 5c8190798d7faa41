use std::{io::Read, path::Path};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    data::{Dataset, type_row},
    io_utils::{self, Decoding},
};

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub delimiter: u8,
    pub decoding: Decoding,
}

/// Loads a CSV file (or stdin for `-`) into a typed [`Dataset`].
pub fn load_dataset(path: &Path, options: IngestOptions) -> Result<Dataset> {
    info!(
        "Loading '{}' with delimiter '{}'",
        path.display(),
        crate::printable_delimiter(options.delimiter)
    );
    let reader = io_utils::open_csv_reader_from_path(path, options.delimiter)?;
    read_dataset(reader, options.decoding).with_context(|| format!("Reading CSV from {path:?}"))
}

pub fn read_dataset<R: Read>(mut reader: csv::Reader<R>, decoding: Decoding) -> Result<Dataset> {
    let headers = io_utils::reader_headers(&mut reader, decoding)?;
    let width = headers.len();
    let mut rows = Vec::new();
    let mut ragged = 0usize;

    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, decoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        if decoded.iter().all(|cell| cell.trim().is_empty()) {
            debug!("Skipping blank row {}", row_idx + 2);
            continue;
        }
        if decoded.len() != width {
            ragged += 1;
        }
        rows.push(type_row(&decoded, width));
    }

    if ragged > 0 {
        warn!("{ragged} row(s) did not match the header width of {width} and were padded or truncated");
    }
    debug!("Read {} row(s) across {} column(s)", rows.len(), width);
    Ok(Dataset::new(headers, rows))
}
