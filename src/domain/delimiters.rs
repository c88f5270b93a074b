//! Delimiter handling for records written into the external table pipe.
//!
//! The same `DelimiterSet` drives both sides of the contract: the
//! `DELIMITER`/`QUOTEDVALUE`/`ESCAPECHAR` clauses of the bulk-load statement
//! and the bytes the record loop writes, so the database parses exactly what
//! we produce.

use crate::domain::entities::Record;
use crate::domain::errors::{ExportError, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};

/// Field, record, enclosing and escape characters of the exported text.
///
/// Character codes of `0` in configuration mean "not set".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterSet {
    pub fields_terminated_by: u8,
    pub lines_terminated_by: u8,
    pub enclosed_by: Option<u8>,
    pub escaped_by: Option<u8>,
}

impl DelimiterSet {
    pub fn new(field: u8, enclosed_by: u8, escaped_by: u8) -> Self {
        Self {
            fields_terminated_by: field,
            lines_terminated_by: b'\n',
            enclosed_by: (enclosed_by > 0).then_some(enclosed_by),
            escaped_by: (escaped_by > 0).then_some(escaped_by),
        }
    }
}

impl Default for DelimiterSet {
    fn default() -> Self {
        Self::new(b',', 0, 0)
    }
}

/// Turns framework records into the UTF-8 bytes written to the pipe.
///
/// Without an escape character fields go through a `csv` writer, which
/// encloses them when needed. With one, every field is escaped by hand so the
/// bytes agree with the statement's `ESCAPECHAR` clause:
/// - the escape character is doubled,
/// - with an enclosing character, that character is escaped and fields
///   holding a delimiter or the enclosing character are enclosed,
/// - without one, field and record delimiters are escaped in place.
pub struct RecordSerializer {
    builder: WriterBuilder,
    buf: Vec<u8>,
    delimiters: DelimiterSet,
    null_value: String,
}

impl RecordSerializer {
    pub fn new(delimiters: &DelimiterSet, null_value: &str) -> Self {
        let mut builder = WriterBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiters.fields_terminated_by)
            .terminator(Terminator::Any(delimiters.lines_terminated_by));

        match delimiters.enclosed_by {
            Some(q) => {
                builder.quote(q).quote_style(QuoteStyle::Necessary);
            }
            None => {
                builder.quote_style(QuoteStyle::Never);
            }
        }

        Self {
            builder,
            buf: Vec::with_capacity(4096),
            delimiters: *delimiters,
            null_value: null_value.to_string(),
        }
    }

    /// Serializes one record, record delimiter included.
    pub fn serialize(&mut self, record: &Record) -> Result<Vec<u8>> {
        match record {
            Record::Text(line) => {
                let mut bytes = Vec::with_capacity(line.len() + 1);
                bytes.extend_from_slice(line.as_bytes());
                bytes.push(self.delimiters.lines_terminated_by);
                Ok(bytes)
            }
            Record::Fields(fields) => {
                let null_value = self.null_value.as_str();
                let values = fields.iter().map(|f| f.as_deref().unwrap_or(null_value));
                match self.delimiters.escaped_by {
                    Some(escape) => {
                        for (i, value) in values.enumerate() {
                            if i > 0 {
                                self.buf.push(self.delimiters.fields_terminated_by);
                            }
                            escape_and_enclose(&mut self.buf, value.as_bytes(), escape, &self.delimiters);
                        }
                        self.buf.push(self.delimiters.lines_terminated_by);
                    }
                    None => {
                        let mut writer = self.builder.from_writer(&mut self.buf);
                        writer.write_record(values).map_err(|e| {
                            ExportError::InputError(format!("Failed to serialize record: {}", e))
                        })?;
                        writer.flush()?;
                    }
                }
                Ok(std::mem::take(&mut self.buf))
            }
        }
    }
}

fn escape_and_enclose(out: &mut Vec<u8>, value: &[u8], escape: u8, d: &DelimiterSet) {
    let field = d.fields_terminated_by;
    let line = d.lines_terminated_by;
    match d.enclosed_by {
        Some(quote) => {
            let enclose = value.iter().any(|&b| b == field || b == line || b == quote);
            if enclose {
                out.push(quote);
            }
            for &b in value {
                if b == escape || b == quote {
                    out.push(escape);
                }
                out.push(b);
            }
            if enclose {
                out.push(quote);
            }
        }
        None => {
            for &b in value {
                if b == escape || b == field || b == line {
                    out.push(escape);
                }
                out.push(b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[Option<&str>]) -> Record {
        Record::Fields(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    #[test]
    fn test_zero_codes_mean_unset() {
        let d = DelimiterSet::new(b'|', 0, 0);
        assert_eq!(d.enclosed_by, None);
        assert_eq!(d.escaped_by, None);
        assert_eq!(d.lines_terminated_by, b'\n');

        let d = DelimiterSet::new(b',', b'"', b'\\');
        assert_eq!(d.enclosed_by, Some(b'"'));
        assert_eq!(d.escaped_by, Some(b'\\'));
    }

    #[test]
    fn test_text_record_gets_newline() {
        let mut s = RecordSerializer::new(&DelimiterSet::default(), "null");
        let out = s.serialize(&Record::Text("1,abc,2.5".to_string())).unwrap();
        assert_eq!(out, b"1,abc,2.5\n");
    }

    #[test]
    fn test_fields_use_delimiter_and_null_token() {
        let mut s = RecordSerializer::new(&DelimiterSet::new(b'|', 0, 0), "NULL");
        let out = s.serialize(&fields(&[Some("1"), None, Some("x")])).unwrap();
        assert_eq!(out, b"1|NULL|x\n");

        // The buffer is drained between records.
        let out = s.serialize(&fields(&[Some("2"), Some("y")])).unwrap();
        assert_eq!(out, b"2|y\n");
    }

    #[test]
    fn test_fields_enclosed_when_needed() {
        let mut s = RecordSerializer::new(&DelimiterSet::new(b',', b'"', 0), "null");
        let out = s.serialize(&fields(&[Some("a,b"), Some("c")])).unwrap();
        assert_eq!(out, b"\"a,b\",c\n");
    }

    #[test]
    fn test_fields_escape_quote_with_escape_char() {
        let mut s = RecordSerializer::new(&DelimiterSet::new(b',', b'"', b'\\'), "null");
        let out = s.serialize(&fields(&[Some("say \"hi\""), Some("1")])).unwrap();
        assert_eq!(out, b"\"say \\\"hi\\\"\",1\n");
    }

    #[test]
    fn test_escape_without_enclosure_escapes_delimiters() {
        let mut s = RecordSerializer::new(&DelimiterSet::new(b',', 0, b'\\'), "null");
        let out = s.serialize(&fields(&[Some("a,b"), Some("c\\d"), Some("e\nf")])).unwrap();
        assert_eq!(out, b"a\\,b,c\\\\d,e\\\nf\n");

        let out = s.serialize(&fields(&[None, Some("plain")])).unwrap();
        assert_eq!(out, b"null,plain\n");
    }

    #[test]
    fn test_escape_with_enclosure_doubles_escape_char() {
        let mut s = RecordSerializer::new(&DelimiterSet::new(b',', b'"', b'\\'), "null");
        let out = s.serialize(&fields(&[Some("c\\d"), Some("x,y")])).unwrap();
        assert_eq!(out, b"c\\\\d,\"x,y\"\n");
    }
}
