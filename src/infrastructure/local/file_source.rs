//! Reads task input records from local files.
//!
//! Plain and gzip-compressed (`.gz`) files are supported. In `text` mode
//! every line is one pre-delimited record; in `delimited` mode lines are
//! parsed with the `csv` reader and re-rendered by the session with the
//! bulk-load delimiters.

use crate::config::InputFormat;
use crate::domain::entities::Record;
use crate::domain::errors::{ExportError, Result};
use crate::ports::record_source::RecordSource;
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;

enum Inner {
    Text(Lines<Box<dyn BufRead>>),
    Delimited(csv::StringRecordsIntoIter<Box<dyn Read>>),
}

/// A `RecordSource` over one input file. Keys are record numbers.
pub struct FileRecordSource {
    inner: Inner,
    position: u64,
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)
        .map_err(|e| ExportError::InputError(format!("{}: {}", path.display(), e)))?;
    let is_gz = path.extension().map(|e| e == "gz").unwrap_or(false);
    if is_gz {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

impl FileRecordSource {
    pub fn open(path: &Path, format: InputFormat, delimiter: u8) -> Result<Self> {
        let reader = open_reader(path)?;
        let inner = match format {
            InputFormat::Text => {
                let buffered: Box<dyn BufRead> = Box::new(BufReader::with_capacity(64 * 1024, reader));
                Inner::Text(buffered.lines())
            }
            InputFormat::Delimited => Inner::Delimited(
                ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .delimiter(delimiter)
                    .from_reader(reader)
                    .into_records(),
            ),
        };
        Ok(Self { inner, position: 0 })
    }
}

impl RecordSource for FileRecordSource {
    fn next_key_value(&mut self) -> Result<Option<(u64, Record)>> {
        let record = match &mut self.inner {
            Inner::Text(lines) => match lines.next() {
                None => return Ok(None),
                Some(line) => Record::Text(line.map_err(|e| ExportError::InputError(e.to_string()))?),
            },
            Inner::Delimited(records) => match records.next() {
                None => return Ok(None),
                Some(rec) => Record::Fields(rec?.iter().map(|f| Some(f.to_string())).collect()),
            },
        };
        let key = self.position;
        self.position += 1;
        Ok(Some((key, record)))
    }
}
