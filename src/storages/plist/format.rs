use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::prelude::ToPrimitive;

use crate::{Result, StorageError, Value};

/// Serialization flavor of a property list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlistFormat {
    /// Verbose XML markup.
    Xml,
    /// Compact `bplist00` encoding.
    Binary,
    /// Legacy OpenStep text.
    OpenStep,
}

impl PlistFormat {
    /// Formats tried, in order, when content outgrows the current one.
    pub const CANDIDATES: [PlistFormat; 3] =
        [PlistFormat::Xml, PlistFormat::Binary, PlistFormat::OpenStep];

    /// Detects the format of an encoded property list from its leading bytes.
    pub fn detect(bytes: &[u8]) -> PlistFormat {
        if bytes.starts_with(b"bplist") {
            return PlistFormat::Binary;
        }
        let text = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);
        let start = text
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(text.len());
        let text = &text[start..];
        if text.starts_with(b"<?xml") || text.starts_with(b"<!DOCTYPE") || text.starts_with(b"<plist") {
            PlistFormat::Xml
        } else {
            PlistFormat::OpenStep
        }
    }

    /// Returns `true` if every value of `entries` can be encoded in this format.
    pub fn can_represent(&self, entries: &HashMap<String, Value>) -> bool {
        entries
            .iter()
            .all(|(key, value)| self.fits_text(key) && self.fits(value))
    }

    fn fits(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::String(s)) => self.fits_text(s),
            (_, Value::Array(items)) => items.iter().all(|item| self.fits(item)),
            (_, Value::Dictionary(dict)) => self.can_represent(dict),
            // `<hex>` data reads back as text, so only strings survive.
            (PlistFormat::OpenStep, _) => false,
            _ => true,
        }
    }

    fn fits_text(&self, text: &str) -> bool {
        match self {
            PlistFormat::Xml => text.chars().all(is_xml_char),
            PlistFormat::Binary => true,
            // Text files are read back byte by byte as Latin-1.
            PlistFormat::OpenStep => text.chars().all(is_openstep_char),
        }
    }

    /// Encodes `entries` as a property list in this format.
    pub fn encode(&self, entries: &HashMap<String, Value>) -> Result<Vec<u8>> {
        let root = to_plist(&Value::Dictionary(entries.clone()));
        let mut buf = Vec::new();
        match self {
            PlistFormat::Xml => root.to_writer_xml(&mut buf)?,
            PlistFormat::Binary => root.to_writer_binary(&mut buf)?,
            PlistFormat::OpenStep => super::openstep::write(&root, &mut buf)?,
        }
        Ok(buf)
    }

    /// Picks the format to write `entries` in, keeping `self` when it fits.
    pub fn select(self, entries: &HashMap<String, Value>) -> Result<PlistFormat> {
        if self.can_represent(entries) {
            return Ok(self);
        }
        Self::CANDIDATES
            .into_iter()
            .find(|format| format.can_represent(entries))
            .ok_or(StorageError::UnsupportedFormat)
    }
}

impl fmt::Display for PlistFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlistFormat::Xml => "xml",
            PlistFormat::Binary => "binary",
            PlistFormat::OpenStep => "openstep",
        };
        f.write_str(name)
    }
}

// XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{d7ff}'
        | '\u{e000}'..='\u{fffd}'
        | '\u{10000}'..='\u{10ffff}')
}

fn is_openstep_char(c: char) -> bool {
    c.is_ascii() && (!c.is_ascii_control() || matches!(c, '\t' | '\n'))
}

/// Decodes a property list whose root must be a dictionary.
///
/// Returns `None` for any other root.
pub fn decode(bytes: &[u8]) -> Result<Option<(HashMap<String, Value>, PlistFormat)>> {
    let format = PlistFormat::detect(bytes);
    let root = plist::Value::from_reader(Cursor::new(bytes))?;
    Ok(match from_plist(root) {
        Some(Value::Dictionary(entries)) => Some((entries, format)),
        _ => None,
    })
}

fn from_plist(value: plist::Value) -> Option<Value> {
    let value = match value {
        plist::Value::String(s) => Value::String(s),
        plist::Value::Integer(i) => match i.as_signed() {
            Some(i) => Value::Integer(i),
            None => Value::Double(i.as_unsigned()? as f64),
        },
        plist::Value::Real(d) => Value::Double(d),
        plist::Value::Boolean(b) => Value::Boolean(b),
        plist::Value::Data(bytes) => Value::Data(bytes),
        plist::Value::Date(date) => Value::Date(DateTime::<Utc>::from(SystemTime::from(date))),
        plist::Value::Array(items) => Value::Array(items.into_iter().filter_map(from_plist).collect()),
        plist::Value::Dictionary(dict) => Value::Dictionary(
            dict.into_iter()
                .filter_map(|(key, value)| Some((key, from_plist(value)?)))
                .collect(),
        ),
        other => {
            debug!("Skipping unsupported plist value {:?}", other);
            return None;
        }
    };
    Some(value)
}

fn to_plist(value: &Value) -> plist::Value {
    match value {
        Value::String(s) => plist::Value::String(s.clone()),
        Value::Integer(i) => plist::Value::Integer((*i).into()),
        Value::Double(d) => plist::Value::Real(*d),
        Value::Decimal(d) => match d.to_f64() {
            Some(d) => plist::Value::Real(d),
            None => plist::Value::String(d.to_string()),
        },
        Value::Boolean(b) => plist::Value::Boolean(*b),
        Value::Data(bytes) => plist::Value::Data(bytes.clone()),
        Value::Date(date) => plist::Value::Date(SystemTime::from(*date).into()),
        Value::Dictionary(dict) => {
            let mut keys: Vec<&String> = dict.keys().collect();
            keys.sort();
            let mut out = plist::Dictionary::new();
            for key in keys {
                out.insert(key.clone(), to_plist(&dict[key]));
            }
            plist::Value::Dictionary(out)
        }
        Value::Array(items) => plist::Value::Array(items.iter().map(to_plist).collect()),
    }
}
