// Statement Segmenter
//
// Splits normalized script text into top-level statements. A semicolon only
// terminates a statement when it sits outside quotes, outside comments and at
// parenthesis depth zero.

use super::error::{ConversionError, LexicalErrorKind};

/// One top-level statement span, without its terminating semicolon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    pub index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Restartable iterator over the statements of a script
///
/// Yields `Err` once, on the first unterminated quote or block comment, and
/// then stops. Call [`Segmenter::reset`] to scan again from the beginning.
#[derive(Debug, Clone)]
pub struct Segmenter<'a> {
    source: &'a str,
    position: usize,
    emitted: usize,
    failed: bool,
}

impl<'a> Segmenter<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            position: 0,
            emitted: 0,
            failed: false,
        }
    }

    pub fn reset(&mut self) {
        self.position = 0;
        self.emitted = 0;
        self.failed = false;
    }

    /// Scan from `self.position` to the next top-level separator
    fn scan(&mut self) -> Result<Option<(usize, usize)>, ConversionError> {
        let bytes = self.source.as_bytes();
        let start = self.position;
        let mut i = start;

        let mut quote: Option<u8> = None;
        let mut quote_start = 0;
        let mut line_comment = false;
        let mut block_comment = false;
        let mut block_start = 0;
        let mut depth: usize = 0;

        while i < bytes.len() {
            let b = bytes[i];
            let next = bytes.get(i + 1).copied();

            if let Some(q) = quote {
                if b == b'\\' && q != b'`' {
                    i += 2;
                    continue;
                }
                if b == q {
                    if next == Some(q) {
                        i += 2;
                        continue;
                    }
                    quote = None;
                }
                i += 1;
                continue;
            }

            if line_comment {
                if b == b'\n' {
                    line_comment = false;
                }
                i += 1;
                continue;
            }

            if block_comment {
                if b == b'*' && next == Some(b'/') {
                    block_comment = false;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }

            match b {
                b'\'' | b'"' | b'`' => {
                    quote = Some(b);
                    quote_start = i;
                }
                b'-' if next == Some(b'-') => {
                    line_comment = true;
                    i += 2;
                    continue;
                }
                b'/' if next == Some(b'*') => {
                    block_comment = true;
                    block_start = i;
                    i += 2;
                    continue;
                }
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b';' if depth == 0 => {
                    self.position = i + 1;
                    return Ok(Some((start, i)));
                }
                _ => {}
            }
            i += 1;
        }

        if let Some(q) = quote {
            return Err(ConversionError::lexical(
                LexicalErrorKind::UnterminatedQuote(q as char),
                self.source,
                quote_start,
            ));
        }
        if block_comment {
            return Err(ConversionError::lexical(
                LexicalErrorKind::UnterminatedBlockComment,
                self.source,
                block_start,
            ));
        }

        self.position = bytes.len();
        if start < bytes.len() {
            Ok(Some((start, bytes.len())))
        } else {
            Ok(None)
        }
    }
}

impl Iterator for Segmenter<'_> {
    type Item = Result<RawStatement, ConversionError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed {
            match self.scan() {
                Ok(Some((start, end))) => {
                    let raw = &self.source[start..end];
                    let text = raw.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let lead = raw.len() - raw.trim_start().len();
                    let statement = RawStatement {
                        index: self.emitted,
                        text: text.to_string(),
                        start: start + lead,
                        end: start + lead + text.len(),
                    };
                    self.emitted += 1;
                    return Some(Ok(statement));
                }
                Ok(None) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Split a whole script, failing on the first lexical error
pub fn split_statements(source: &str) -> Result<Vec<RawStatement>, ConversionError> {
    Segmenter::new(source).collect()
}
