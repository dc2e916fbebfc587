//! RFC 4180 CSV rendering for admin exports.

use std::borrow::Cow;

/// A value that can be written as one CSV row.
pub trait CsvRecord {
    /// Column names, in the order `fields` yields values.
    const HEADERS: &'static [&'static str];

    fn fields(&self) -> Vec<String>;
}

/// Quotes a field when it contains a delimiter, quote, CR or LF.
#[must_use]
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Appends one CRLF-terminated row to `out`.
pub fn write_row<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field.as_ref()));
    }
    out.push_str("\r\n");
}

/// Renders a header row followed by one row per record.
#[must_use]
pub fn render_csv<R: CsvRecord>(records: &[R]) -> String {
    let mut out = String::new();
    write_row(&mut out, R::HEADERS);
    for record in records {
        write_row(&mut out, &record.fields());
    }
    out
}

/// Formats an optional value as an empty cell when absent.
#[must_use]
pub fn opt_field<T: ToString>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}
