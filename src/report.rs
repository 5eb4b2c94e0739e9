//! The line-oriented report stream.
//!
//! A report is framed by start/end markers and holds key/value pairs and
//! named tables,
//!
//! ```text
//! #start data file format 4
//! #pair "wall start date" "2025-05-17 12:00:00"
//! #pair "algorithm" "A*"
//! #altcols "Anytime Solution" "num" "cost"
//! #altrow "Anytime Solution" "1" "30"
//! #pair "wall finish date" "2025-05-17 12:00:01"
//! #end data file format 4
//! ```
//!
//! Fields are always quoted. Quotes, backslashes and newlines inside them are
//! escaped with a backslash. Lines not starting with `#` are free-form and
//! ignored by the parser.

use std::fmt::Display;
use std::io::Write;

use thiserror::Error;

pub const FORMAT: &str = "data file format 4";

/// Writes a report stream.
///
/// ```
/// use hsearch::report::{Report, ReportWriter};
///
/// let mut w = ReportWriter::new(Vec::new()).undated();
/// w.start().unwrap();
/// w.pair("final sol cost", 26).unwrap();
/// w.end().unwrap();
///
/// let text = String::from_utf8(w.into_inner()).unwrap();
/// let report = Report::parse(&text).unwrap();
/// assert_eq!(report.get("final sol cost"), Some("26"));
/// ```
#[derive(Debug)]
pub struct ReportWriter<W: Write> {
    out: W,
    dated: bool,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, dated: true }
    }

    /// Skips the wall clock dates, making the output reproducible.
    #[must_use]
    pub fn undated(mut self) -> Self {
        self.dated = false;
        self
    }

    pub fn start(&mut self) -> std::io::Result<()> {
        writeln!(self.out, "#start {FORMAT}")?;
        if self.dated {
            self.pair("wall start date", now())?;
        }
        Ok(())
    }

    pub fn end(&mut self) -> std::io::Result<()> {
        if self.dated {
            self.pair("wall finish date", now())?;
        }
        writeln!(self.out, "#end {FORMAT}")?;
        self.out.flush()
    }

    pub fn pair(&mut self, key: &str, value: impl Display) -> std::io::Result<()> {
        writeln!(
            self.out,
            "#pair \"{}\" \"{}\"",
            escape(key),
            escape(&value.to_string())
        )
    }

    /// Names the columns of a table.
    pub fn altcols<I, V>(&mut self, name: &str, cols: I) -> std::io::Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        self.record("altcols", name, cols)
    }

    /// Adds a row to a table.
    pub fn altrow<I, V>(&mut self, name: &str, values: I) -> std::io::Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        self.record("altrow", name, values)
    }

    /// Free-form text the parser skips.
    pub fn comment(&mut self, text: &str) -> std::io::Result<()> {
        for line in text.lines() {
            writeln!(self.out, "  {line}")?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn record<I, V>(&mut self, kind: &str, name: &str, fields: I) -> std::io::Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        write!(self.out, "#{kind} \"{}\"", escape(name))?;
        for f in fields {
            write!(self.out, " \"{}\"", escape(&f.to_string()))?;
        }
        writeln!(self.out)
    }
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportParseError {
    #[error("line {line}: unknown record {record:?}")]
    UnknownRecord { line: usize, record: String },
    #[error("line {line}: unsupported format {found:?}")]
    Format { line: usize, found: String },
    #[error("line {line}: expected a quoted field")]
    ExpectedField { line: usize },
    #[error("line {line}: unterminated field")]
    Unterminated { line: usize },
    #[error("line {line}: invalid escape sequence \\{escape}")]
    Escape { line: usize, escape: char },
    #[error("line {line}: {record} takes {expected} fields, found {found}")]
    Arity {
        line: usize,
        record: &'static str,
        expected: &'static str,
        found: usize,
    },
}

/// A parsed report stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// `#pair` records, in order.
    pub pairs: Vec<(String, String)>,
    /// `#altcols` records, in order.
    pub columns: Vec<(String, Vec<String>)>,
    /// `#altrow` records, in order.
    pub rows: Vec<(String, Vec<String>)>,
    /// Whether both frame markers were seen.
    pub complete: bool,
}

impl Report {
    pub fn parse(text: &str) -> Result<Self, ReportParseError> {
        let mut report = Self::default();
        let mut started = false;

        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let Some(rest) = raw.strip_prefix('#') else {
                continue;
            };
            let (record, rest) = rest.split_once(' ').unwrap_or((rest, ""));
            match record {
                "start" | "end" => {
                    if rest != FORMAT {
                        return Err(ReportParseError::Format {
                            line,
                            found: rest.to_string(),
                        });
                    }
                    if record == "start" {
                        started = true;
                    } else {
                        report.complete = started;
                    }
                }
                "pair" => {
                    let mut fields = fields(rest, line)?;
                    if fields.len() != 2 {
                        return Err(ReportParseError::Arity {
                            line,
                            record: "#pair",
                            expected: "2",
                            found: fields.len(),
                        });
                    }
                    let value = fields.pop().unwrap_or_default();
                    let key = fields.pop().unwrap_or_default();
                    report.pairs.push((key, value));
                }
                "altcols" | "altrow" => {
                    let mut fields = fields(rest, line)?.into_iter();
                    let Some(name) = fields.next() else {
                        return Err(ReportParseError::Arity {
                            line,
                            record: if record == "altcols" { "#altcols" } else { "#altrow" },
                            expected: "at least 1",
                            found: 0,
                        });
                    };
                    let entry = (name, fields.collect());
                    if record == "altcols" {
                        report.columns.push(entry);
                    } else {
                        report.rows.push(entry);
                    }
                }
                _ => {
                    return Err(ReportParseError::UnknownRecord {
                        line,
                        record: record.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// The last value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, cols)| cols.as_slice())
    }

    pub fn rows<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a [String]> + 'a {
        self.rows
            .iter()
            .filter(move |(name, _)| name == table)
            .map(|(_, row)| row.as_slice())
    }
}

/// Splits a sequence of quoted, space separated fields.
fn fields(mut s: &str, line: usize) -> Result<Vec<String>, ReportParseError> {
    let mut fields = vec![];
    loop {
        s = s.trim_start_matches(' ');
        if s.is_empty() {
            return Ok(fields);
        }
        let Some(body) = s.strip_prefix('"') else {
            return Err(ReportParseError::ExpectedField { line });
        };

        let mut field = String::new();
        let mut chars = body.char_indices();
        let end = loop {
            match chars.next() {
                None => return Err(ReportParseError::Unterminated { line }),
                Some((i, '"')) => break i,
                Some((_, '\\')) => match chars.next() {
                    Some((_, '"')) => field.push('"'),
                    Some((_, '\\')) => field.push('\\'),
                    Some((_, 'n')) => field.push('\n'),
                    Some((_, escape)) => return Err(ReportParseError::Escape { line, escape }),
                    None => return Err(ReportParseError::Unterminated { line }),
                },
                Some((_, c)) => field.push(c),
            }
        };
        fields.push(field);
        s = &body[end + 1..];
        if !s.is_empty() && !s.starts_with(' ') {
            return Err(ReportParseError::ExpectedField { line });
        }
    }
}
