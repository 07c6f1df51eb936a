//! Windowed partitioning of fixed-width records.
//!
//! Reading happens in two steps because schema selection may sit between
//! them: first the raw record text is cut out of the stream (by record
//! separator, or by a known total width), then the chosen schema's windows
//! slice it into fields. Fill characters are stripped here, at tokenization
//! time, so codecs receive the semantic content.

use crate::fixed::{FixedWidthOptions, PartialRecordPolicy, ResolvedWindow};
use crate::schema::{Alignment, Truncation};
use crate::source::{CharSource, RetryReader};
use crate::stream::TokenizeError;

pub(crate) struct FixedWindowTokenizer<S: CharSource> {
    reader: RetryReader<S>,
    has_record_separator: bool,
    candidates: Vec<String>,
}

impl<S: CharSource> FixedWindowTokenizer<S> {
    pub(crate) fn new(source: S, options: &FixedWidthOptions) -> Self {
        FixedWindowTokenizer {
            reader: RetryReader::new(source),
            has_record_separator: options.has_record_separator,
            candidates: options.record_separator_candidates(),
        }
    }

    /// Cuts the next raw record out of the stream, or returns `None` at end
    /// of input. `exact_len` is the window total, consulted only when
    /// records carry no separator.
    pub(crate) fn next_text(
        &mut self,
        exact_len: Option<usize>,
    ) -> Result<Option<String>, TokenizeError> {
        if self.reader.at_eof()? {
            return Ok(None);
        }
        if self.has_record_separator {
            let mut text = String::new();
            loop {
                let mut terminated = false;
                for candidate in &self.candidates {
                    if self.reader.consume(candidate)? {
                        terminated = true;
                        break;
                    }
                }
                if terminated {
                    return Ok(Some(text));
                }
                match self.reader.next_char()? {
                    Some(ch) => text.push(ch),
                    None => return Ok(Some(text)),
                }
            }
        }
        let expected = match exact_len {
            Some(expected) => expected,
            None => {
                return Err(TokenizeError::Syntax(
                    "record length is unknown without a record separator".to_string(),
                ))
            }
        };
        let mut text = String::with_capacity(expected);
        for _ in 0..expected {
            match self.reader.next_char()? {
                Some(ch) => text.push(ch),
                None => break,
            }
        }
        Ok(Some(text))
    }
}

/// Slices a raw record into fields by window widths, stripping fill
/// characters on the side the alignment pads. Characters past the window
/// total are dropped; trailing padding is routine in fixed-width files.
pub(crate) fn partition(
    text: &str,
    windows: &[ResolvedWindow],
    policy: PartialRecordPolicy,
) -> Result<Vec<String>, TokenizeError> {
    let chars: Vec<char> = text.chars().collect();
    let total: usize = windows.iter().map(|w| w.width).sum();
    if chars.len() < total && policy == PartialRecordPolicy::Error {
        return Err(TokenizeError::Syntax(format!(
            "record is {} characters long, expected {total}",
            chars.len()
        )));
    }
    let mut fields = Vec::with_capacity(windows.len());
    let mut offset = 0;
    for window in windows {
        let slice: String = if offset < chars.len() {
            let end = (offset + window.width).min(chars.len());
            chars[offset..end].iter().collect()
        } else {
            String::new()
        };
        offset += window.width;
        let stripped = match window.alignment {
            Alignment::LeftAligned => slice.trim_end_matches(window.fill),
            Alignment::RightAligned => slice.trim_start_matches(window.fill),
        };
        fields.push(stripped.to_string());
    }
    Ok(fields)
}

/// Pads or truncates formatted text to occupy its window exactly.
pub(crate) fn fit_window(text: &str, window: &ResolvedWindow) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() == window.width {
        return text.to_string();
    }
    if chars.len() > window.width {
        return match window.truncation {
            Truncation::TruncateTrailing => chars[..window.width].iter().collect(),
            Truncation::TruncateLeading => chars[chars.len() - window.width..].iter().collect(),
        };
    }
    let padding: String = std::iter::repeat(window.fill)
        .take(window.width - chars.len())
        .collect();
    match window.alignment {
        Alignment::LeftAligned => format!("{text}{padding}"),
        Alignment::RightAligned => format!("{padding}{text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StringSource;

    fn window(width: usize) -> ResolvedWindow {
        ResolvedWindow {
            width,
            alignment: Alignment::LeftAligned,
            fill: ' ',
            truncation: Truncation::TruncateTrailing,
        }
    }

    fn right(width: usize) -> ResolvedWindow {
        ResolvedWindow {
            alignment: Alignment::RightAligned,
            ..window(width)
        }
    }

    #[test]
    fn records_split_on_the_separator() {
        let options = FixedWidthOptions::default();
        let mut tokenizer = FixedWindowTokenizer::new(StringSource::new("abcd\nefgh\n"), &options);
        assert_eq!(tokenizer.next_text(None).unwrap(), Some("abcd".to_string()));
        assert_eq!(tokenizer.next_text(None).unwrap(), Some("efgh".to_string()));
        assert_eq!(tokenizer.next_text(None).unwrap(), None);
    }

    #[test]
    fn separator_free_records_split_by_width() {
        let options = FixedWidthOptions::new().has_record_separator(false);
        let mut tokenizer = FixedWindowTokenizer::new(StringSource::new("abcdefgh"), &options);
        assert_eq!(
            tokenizer.next_text(Some(4)).unwrap(),
            Some("abcd".to_string())
        );
        assert_eq!(
            tokenizer.next_text(Some(4)).unwrap(),
            Some("efgh".to_string())
        );
        assert_eq!(tokenizer.next_text(Some(4)).unwrap(), None);
    }

    #[test]
    fn partition_strips_fill_by_alignment() {
        let fields = partition(
            "bob       20120123",
            &[window(10), right(8)],
            PartialRecordPolicy::FillEmpty,
        )
        .unwrap();
        assert_eq!(fields, vec!["bob".to_string(), "20120123".to_string()]);
    }

    #[test]
    fn right_alignment_strips_leading_fill() {
        let fields = partition("   42", &[right(5)], PartialRecordPolicy::FillEmpty).unwrap();
        assert_eq!(fields, vec!["42".to_string()]);
    }

    #[test]
    fn short_records_fill_with_empty_fields() {
        let fields = partition("ab", &[window(2), window(3)], PartialRecordPolicy::FillEmpty)
            .unwrap();
        assert_eq!(fields, vec!["ab".to_string(), String::new()]);
    }

    #[test]
    fn short_records_can_be_rejected() {
        let result = partition("ab", &[window(2), window(3)], PartialRecordPolicy::Error);
        assert!(matches!(result, Err(TokenizeError::Syntax(_))));
    }

    #[test]
    fn characters_past_the_window_total_are_dropped() {
        let fields = partition("abcd   ", &[window(4)], PartialRecordPolicy::FillEmpty).unwrap();
        assert_eq!(fields, vec!["abcd".to_string()]);
    }

    #[test]
    fn all_fill_window_becomes_empty() {
        let fields = partition("    ", &[window(4)], PartialRecordPolicy::FillEmpty).unwrap();
        assert_eq!(fields, vec![String::new()]);
    }

    #[test]
    fn fit_pads_by_alignment() {
        assert_eq!(fit_window("ab", &window(5)), "ab   ");
        assert_eq!(fit_window("ab", &right(5)), "   ab");
        let zero_filled = ResolvedWindow {
            fill: '0',
            ..right(5)
        };
        assert_eq!(fit_window("42", &zero_filled), "00042");
    }

    #[test]
    fn fit_truncates_by_policy() {
        assert_eq!(fit_window("abcdefg", &window(4)), "abcd");
        let keep_tail = ResolvedWindow {
            truncation: Truncation::TruncateLeading,
            ..window(4)
        };
        assert_eq!(fit_window("abcdefg", &keep_tail), "defg");
    }
}
