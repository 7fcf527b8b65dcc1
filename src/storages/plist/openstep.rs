//! Writer for the legacy OpenStep property list text format.
//!
//! Only ASCII strings, arrays and dictionaries are written: the reader
//! returns `<hex>` data as text and decodes text as Latin-1. Callers are
//! expected to check representability before writing.

use std::io::{self, Write};

/// Writes `value` as OpenStep text.
pub fn write<W: Write>(value: &plist::Value, writer: &mut W) -> io::Result<()> {
    write_value(value, writer, 0)?;
    writeln!(writer)
}

fn write_value<W: Write>(value: &plist::Value, w: &mut W, depth: usize) -> io::Result<()> {
    match value {
        plist::Value::String(s) => write_string(s, w),
        plist::Value::Array(items) => {
            write!(w, "(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(w, ", ")?;
                }
                write_value(item, w, depth + 1)?;
            }
            write!(w, ")")
        }
        plist::Value::Dictionary(dict) => {
            writeln!(w, "{{")?;
            for (key, item) in dict.iter() {
                indent(w, depth + 1)?;
                write_string(key, w)?;
                write!(w, " = ")?;
                write_value(item, w, depth + 1)?;
                writeln!(w, ";")?;
            }
            indent(w, depth)?;
            write!(w, "}}")
        }
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("OpenStep cannot represent {other:?}"),
        )),
    }
}

fn write_string<W: Write>(s: &str, w: &mut W) -> io::Result<()> {
    write!(w, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(w, "\\\"")?,
            '\\' => write!(w, "\\\\")?,
            '\n' => write!(w, "\\n")?,
            '\t' => write!(w, "\\t")?,
            c => write!(w, "{c}")?,
        }
    }
    write!(w, "\"")
}

fn indent<W: Write>(w: &mut W, depth: usize) -> io::Result<()> {
    for _ in 0..depth {
        write!(w, "    ")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_nested_structures() {
        let mut inner = plist::Dictionary::new();
        inner.insert("k".to_owned(), plist::Value::String("v".to_owned()));
        let mut root = plist::Dictionary::new();
        root.insert(
            "list".to_owned(),
            plist::Value::Array(vec![
                plist::Value::String("a \"q\"".to_owned()),
                plist::Value::String("b".to_owned()),
            ]),
        );
        root.insert("nested".to_owned(), plist::Value::Dictionary(inner));

        let mut out = Vec::new();
        write(&plist::Value::Dictionary(root), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "{\n    \"list\" = (\"a \\\"q\\\"\", \"b\");\n    \"nested\" = {\n        \"k\" = \"v\";\n    };\n}\n"
        );
    }

    #[test]
    fn rejects_numbers_and_data() {
        for value in [plist::Value::Boolean(true), plist::Value::Data(vec![0x0f])] {
            let mut out = Vec::new();
            let err = write(&value, &mut out).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        }
    }
}
