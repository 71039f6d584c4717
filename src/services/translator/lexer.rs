// SQL Lexer
//
// Quote- and comment-aware tokenizer shared by the translation stages.
// Tokens keep their exact source text, so concatenating every token of a
// tokenized string reproduces the input byte for byte.

use super::error::{ConversionError, LexicalErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword
    Word,
    /// Backtick-quoted identifier
    QuotedIdent,
    /// Single- or double-quoted string literal
    StringLit,
    Number,
    LineComment,
    BlockComment,
    Whitespace,
    /// Any other single character
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            offset: 0,
        }
    }

    pub fn space() -> Self {
        Self::new(TokenKind::Whitespace, " ")
    }

    /// Case-insensitive keyword match
    pub fn is_word(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_any_word(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.is_word(k))
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.len() == c.len_utf8() && self.text.starts_with(c)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }

    /// Whitespace or comment
    pub fn is_trivia(&self) -> bool {
        self.kind == TokenKind::Whitespace || self.is_comment()
    }

    /// Word or quoted identifier
    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedIdent)
    }

    pub fn upper(&self) -> String {
        self.text.to_ascii_uppercase()
    }

    /// Identifier text without backticks
    pub fn identifier_name(&self) -> String {
        match self.kind {
            TokenKind::QuotedIdent => unquote(&self.text, '`'),
            _ => self.text.clone(),
        }
    }
}

/// Tokenize SQL text. Fails on unterminated quotes or block comments.
pub fn tokenize(sql: &str) -> Result<Vec<Token>, ConversionError> {
    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let end_of = |i: usize| chars.get(i).map(|(o, _)| *o).unwrap_or(sql.len());
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        let (kind, stop) = if c.is_whitespace() {
            let mut j = i + 1;
            while j < chars.len() && chars[j].1.is_whitespace() {
                j += 1;
            }
            (TokenKind::Whitespace, j)
        } else if c == '-' && next == Some('-') {
            let mut j = i + 2;
            while j < chars.len() && chars[j].1 != '\n' {
                j += 1;
            }
            (TokenKind::LineComment, j)
        } else if c == '/' && next == Some('*') {
            let mut j = i + 2;
            loop {
                if j + 1 >= chars.len() {
                    return Err(ConversionError::lexical(
                        LexicalErrorKind::UnterminatedBlockComment,
                        sql,
                        start,
                    ));
                }
                if chars[j].1 == '*' && chars[j + 1].1 == '/' {
                    break;
                }
                j += 1;
            }
            (TokenKind::BlockComment, j + 2)
        } else if c == '\'' || c == '"' || c == '`' {
            let j = scan_quoted(&chars, i, c).ok_or_else(|| {
                ConversionError::lexical(LexicalErrorKind::UnterminatedQuote(c), sql, start)
            })?;
            let kind = if c == '`' {
                TokenKind::QuotedIdent
            } else {
                TokenKind::StringLit
            };
            (kind, j)
        } else if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            (TokenKind::Number, scan_number(&chars, i))
        } else if c.is_alphabetic() || c == '_' {
            let mut j = i + 1;
            while j < chars.len() && (chars[j].1.is_alphanumeric() || chars[j].1 == '_' || chars[j].1 == '$') {
                j += 1;
            }
            (TokenKind::Word, j)
        } else if c == '$' && next == Some('{') {
            // ${hiveconf:var} substitution variables stay one opaque word
            let mut j = i + 2;
            while j < chars.len() && chars[j].1 != '}' {
                j += 1;
            }
            if j < chars.len() {
                (TokenKind::Word, j + 1)
            } else {
                (TokenKind::Punct, i + 1)
            }
        } else {
            (TokenKind::Punct, i + 1)
        };

        let stop_offset = end_of(stop);
        tokens.push(Token {
            kind,
            text: sql[start..stop_offset].to_string(),
            offset: start,
        });
        i = stop;
    }

    Ok(tokens)
}

/// Returns the char index one past the closing quote
fn scan_quoted(chars: &[(usize, char)], open: usize, quote: char) -> Option<usize> {
    let mut j = open + 1;
    while j < chars.len() {
        let c = chars[j].1;
        if c == '\\' && quote != '`' {
            j += 2;
            continue;
        }
        if c == quote {
            if chars.get(j + 1).map(|(_, n)| *n) == Some(quote) {
                j += 2;
                continue;
            }
            return Some(j + 1);
        }
        j += 1;
    }
    None
}

fn scan_number(chars: &[(usize, char)], start: usize) -> usize {
    let mut j = start;
    while j < chars.len() && chars[j].1.is_ascii_digit() {
        j += 1;
    }
    if j < chars.len() && chars[j].1 == '.' {
        j += 1;
        while j < chars.len() && chars[j].1.is_ascii_digit() {
            j += 1;
        }
    }
    if j < chars.len() && matches!(chars[j].1, 'e' | 'E') {
        let mut k = j + 1;
        if k < chars.len() && matches!(chars[k].1, '+' | '-') {
            k += 1;
        }
        if k < chars.len() && chars[k].1.is_ascii_digit() {
            j = k;
            while j < chars.len() && chars[j].1.is_ascii_digit() {
                j += 1;
            }
        }
    }
    // Hive literal suffixes: 10Y, 10S, 10L, 10BD
    while j < chars.len() && chars[j].1.is_ascii_alphabetic() {
        j += 1;
    }
    j
}

/// Strip surrounding quote characters and collapse doubled quotes
pub fn unquote(text: &str, quote: char) -> String {
    let inner = text
        .strip_prefix(quote)
        .and_then(|t| t.strip_suffix(quote))
        .unwrap_or(text);
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

/// Index of the next non-trivia token at or after `from`
pub fn next_significant(tokens: &[Token], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&i| !tokens[i].is_trivia())
}

/// Index of the previous non-trivia token strictly before `before`
pub fn prev_significant(tokens: &[Token], before: usize) -> Option<usize> {
    (0..before.min(tokens.len())).rev().find(|&i| !tokens[i].is_trivia())
}

/// Given the index of an opening `(`, return the index of its matching `)`
pub fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split a token slice on commas at parenthesis depth zero
pub fn split_top_level_commas(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth = depth.saturating_sub(1);
        } else if token.is_punct(',') && depth == 0 {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Find a keyword sequence at parenthesis depth zero, skipping trivia between words
pub fn find_top_level(tokens: &[Token], from: usize, keywords: &[&str]) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = from;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && matches_sequence(tokens, i, keywords).is_some() {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// If the keyword sequence starts at `at`, return the index one past its last word
pub fn matches_sequence(tokens: &[Token], at: usize, keywords: &[&str]) -> Option<usize> {
    let mut i = at;
    for (n, keyword) in keywords.iter().enumerate() {
        if n > 0 {
            i = next_significant(tokens, i)?;
        }
        if !tokens.get(i)?.is_word(keyword) {
            return None;
        }
        i += 1;
    }
    Some(i)
}

/// Concatenate token texts
pub fn render(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

/// Render significant tokens with single spaces collapsed and trimmed
pub fn render_trimmed(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    for token in tokens {
        if token.kind == TokenKind::Whitespace {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() && !out.ends_with('\n') {
            out.push(' ');
        }
        pending_space = false;
        out.push_str(&token.text);
        if token.kind == TokenKind::LineComment {
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

/// Trim a rendered piece. A trailing line comment keeps its newline so text
/// appended after the piece stays outside the comment.
pub fn trim_rendered(text: &str) -> String {
    let trimmed = text.trim();
    let ends_in_comment = tokenize(trimmed)
        .ok()
        .and_then(|tokens| tokens.last().map(|t| t.kind == TokenKind::LineComment))
        .unwrap_or(false);
    if ends_in_comment {
        format!("{}\n", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Render tokens without any whitespace except between adjacent words,
/// e.g. `DECIMAL ( 10 , 2 )` becomes `DECIMAL(10,2)`
pub fn render_compact(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut last_was_word = false;
    for token in tokens.iter().filter(|t| !t.is_trivia()) {
        let is_word = matches!(token.kind, TokenKind::Word | TokenKind::Number | TokenKind::QuotedIdent);
        if is_word && last_was_word {
            out.push(' ');
        }
        out.push_str(&token.text);
        last_was_word = is_word;
    }
    out
}

/// Drop leading and trailing trivia
pub fn trim_tokens(tokens: &[Token]) -> &[Token] {
    let start = tokens.iter().position(|t| !t.is_trivia()).unwrap_or(tokens.len());
    let end = tokens.iter().rposition(|t| !t.is_trivia()).map(|i| i + 1).unwrap_or(start);
    &tokens[start..end.max(start)]
}

/// Read `a.b.c` starting at `start`; returns the name and the index after it
pub fn dotted_name(tokens: &[Token], start: usize) -> (String, usize) {
    let mut parts = vec![tokens[start].identifier_name()];
    let mut i = start + 1;
    while tokens.get(i).is_some_and(|t| t.is_punct('.'))
        && tokens.get(i + 1).is_some_and(|t| t.is_identifier())
    {
        parts.push(tokens[i + 1].identifier_name());
        i += 2;
    }
    (parts.join("."), i)
}

/// Forward-only cursor over the significant tokens of a statement
#[derive(Debug, Clone)]
pub struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'t Token> {
        next_significant(self.tokens, self.pos).map(|i| &self.tokens[i])
    }

    pub fn peek_is(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(keyword))
    }

    pub fn bump(&mut self) -> Option<&'t Token> {
        let i = next_significant(self.tokens, self.pos)?;
        self.pos = i + 1;
        Some(&self.tokens[i])
    }

    pub fn eat(&mut self, keyword: &str) -> bool {
        if self.peek_is(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub fn eat_punct(&mut self, c: char) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(c)) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub fn eat_sequence(&mut self, keywords: &[&str]) -> bool {
        let end = next_significant(self.tokens, self.pos)
            .and_then(|i| matches_sequence(self.tokens, i, keywords));
        match end {
            Some(end) => {
                self.pos = end;
                true
            }
            None => false,
        }
    }

    /// Consume a parenthesized group and return the tokens inside it
    pub fn group(&mut self) -> Option<&'t [Token]> {
        let open = next_significant(self.tokens, self.pos)?;
        if !self.tokens[open].is_punct('(') {
            return None;
        }
        let close = matching_paren(self.tokens, open)?;
        self.pos = close + 1;
        Some(&self.tokens[open + 1..close])
    }

    /// Consume a possibly dotted identifier
    pub fn name(&mut self) -> Option<String> {
        let start = next_significant(self.tokens, self.pos)?;
        if !self.tokens[start].is_identifier() {
            return None;
        }
        let (name, end) = dotted_name(self.tokens, start);
        self.pos = end;
        Some(name)
    }

    /// Everything not yet consumed
    pub fn rest(&self) -> &'t [Token] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    pub fn is_done(&self) -> bool {
        self.peek().is_none()
    }
}
