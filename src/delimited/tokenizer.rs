//! The delimited record grammar:
//!
//! ```text
//! record   := field (F field)* (R | EOF)
//! field    := quoted | unquoted
//! quoted   := Q (char-not-Q | QQ)* Q
//! unquoted := (char-not-F-not-R)*
//! ```
//!
//! `F` and `R` may be several characters long and are matched by longest
//! prefix. A doubled quote inside a quoted field is a literal quote. Raw
//! fields come back without the surrounding quotes and with the doubling
//! undone; trimming beyond the whitespace-preservation option is the
//! codecs' job.

use crate::delimited::DelimitedOptions;
use crate::source::{CharSource, RetryReader};
use crate::stream::{RawRecord, TokenizeError};

/// What terminated a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldEnd {
    Separator,
    Record,
    Eof,
}

pub(crate) struct DelimitedTokenizer<S: CharSource> {
    reader: RetryReader<S>,
    options: DelimitedOptions,
}

impl<S: CharSource> DelimitedTokenizer<S> {
    pub(crate) fn new(source: S, options: DelimitedOptions) -> Self {
        DelimitedTokenizer {
            reader: RetryReader::new(source),
            options,
        }
    }

    /// Tokenizes one record, or returns `None` at end of input.
    ///
    /// The returned [`RawRecord`] carries the exact unparsed span (without
    /// the record separator) for diagnostics. An interior empty line comes
    /// back as a single empty field; the stream layer decides whether to
    /// keep it.
    pub(crate) fn next_record(&mut self) -> Result<Option<RawRecord>, TokenizeError> {
        if self.reader.at_eof()? {
            return Ok(None);
        }
        let mut fields = Vec::new();
        let mut text = String::new();
        loop {
            let (field, end) = self.read_field(&mut text)?;
            fields.push(field);
            match end {
                FieldEnd::Separator => continue,
                FieldEnd::Record | FieldEnd::Eof => break,
            }
        }
        Ok(Some(RawRecord { fields, text }))
    }

    fn read_field(&mut self, text: &mut String) -> Result<(String, FieldEnd), TokenizeError> {
        if !self.options.preserve_whitespace {
            self.skip_inline_whitespace(text)?;
        }
        let quoted = !self.options.partitioned
            && self.reader.peek_char()? == Some(self.options.quote);
        if quoted {
            self.read_quoted_field(text)
        } else {
            self.read_unquoted_field(text)
        }
    }

    fn read_quoted_field(&mut self, text: &mut String) -> Result<(String, FieldEnd), TokenizeError> {
        let quote = self.options.quote;
        self.reader.next_char()?;
        text.push(quote);
        let mut content = String::new();
        loop {
            match self.reader.next_char()? {
                None => {
                    return Err(TokenizeError::Syntax(
                        "unterminated quoted field at end of input".to_string(),
                    ))
                }
                Some(ch) if ch == quote => {
                    text.push(ch);
                    if self.reader.peek_char()? == Some(quote) {
                        // Doubled quote: one literal quote.
                        self.reader.next_char()?;
                        text.push(quote);
                        content.push(quote);
                    } else {
                        break;
                    }
                }
                Some(ch) => {
                    if !self.options.allow_embedded_line_endings && (ch == '\r' || ch == '\n') {
                        return Err(TokenizeError::Syntax(
                            "line ending inside a quoted field".to_string(),
                        ));
                    }
                    text.push(ch);
                    content.push(ch);
                }
            }
        }
        self.skip_inline_whitespace(text)?;
        match self.try_boundary(text)? {
            Some(end) => Ok((content, end)),
            None => Err(TokenizeError::Syntax(
                "unexpected text after a closing quote".to_string(),
            )),
        }
    }

    fn read_unquoted_field(
        &mut self,
        text: &mut String,
    ) -> Result<(String, FieldEnd), TokenizeError> {
        let mut content = String::new();
        let end = loop {
            if let Some(end) = self.try_boundary(text)? {
                break end;
            }
            match self.reader.next_char()? {
                None => break FieldEnd::Eof,
                Some(ch) => {
                    text.push(ch);
                    content.push(ch);
                }
            }
        };
        if !self.options.preserve_whitespace {
            content = content.trim().to_string();
        }
        Ok((content, end))
    }

    /// Consumes a field or record separator if one starts at the cursor,
    /// longest match first. EOF counts as a record boundary.
    fn try_boundary(&mut self, text: &mut String) -> Result<Option<FieldEnd>, TokenizeError> {
        if self.reader.at_eof()? {
            return Ok(Some(FieldEnd::Eof));
        }
        let field_match = self.reader.looking_at(&self.options.separator)?;
        let mut record_match: Option<String> = None;
        for candidate in self.options.record_separator_candidates() {
            if self.reader.looking_at(candidate)? {
                record_match = Some(candidate.to_string());
                break;
            }
        }
        match (field_match, record_match) {
            (false, None) => Ok(None),
            (true, None) => {
                let separator = self.options.separator.clone();
                self.reader.consume(&separator)?;
                text.push_str(&separator);
                Ok(Some(FieldEnd::Separator))
            }
            (false, Some(record)) => {
                self.reader.consume(&record)?;
                Ok(Some(FieldEnd::Record))
            }
            (true, Some(record)) => {
                // Both start here; the longer literal wins.
                if self.options.separator.chars().count() >= record.chars().count() {
                    let separator = self.options.separator.clone();
                    self.reader.consume(&separator)?;
                    text.push_str(&separator);
                    Ok(Some(FieldEnd::Separator))
                } else {
                    self.reader.consume(&record)?;
                    Ok(Some(FieldEnd::Record))
                }
            }
        }
    }

    /// Skips spaces and tabs that cannot begin a separator, recording them
    /// in the raw span.
    fn skip_inline_whitespace(&mut self, text: &mut String) -> Result<(), TokenizeError> {
        loop {
            match self.reader.peek_char()? {
                Some(ch) if (ch == ' ' || ch == '\t') && !self.begins_boundary(ch) => {
                    self.reader.next_char()?;
                    text.push(ch);
                }
                _ => return Ok(()),
            }
        }
    }

    fn begins_boundary(&self, ch: char) -> bool {
        if self.options.separator.starts_with(ch) {
            return true;
        }
        match &self.options.record_separator {
            Some(separator) => separator.starts_with(ch),
            None => ch == '\r' || ch == '\n',
        }
    }
}
