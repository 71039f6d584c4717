// Preprocessor
//
// Removes Hive session directives (`SET hive.x = ...`, `ADD JAR ...`) and
// optimizer hint comments, drops ordinary comments unless they are to be
// kept, and collapses whitespace. String and comment contents are never
// touched because the work happens on lexer tokens.

use once_cell::sync::Lazy;
use regex::Regex;

use super::diagnostics::Diagnostics;
use super::error::ConversionError;
use super::lexer::{next_significant, render_trimmed, tokenize, Token, TokenKind};
use crate::models::DiagnosticCode;

static HINT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*(?:\(|,|$|\s)").expect("hint pattern is valid"));

const ADD_RESOURCES: &[&str] = &["JAR", "JARS", "FILE", "FILES", "ARCHIVE", "ARCHIVES"];

/// Normalize a whole script. Fails only on lexical errors.
pub fn preprocess(
    source: &str,
    preserve_comments: bool,
    diagnostics: &mut Diagnostics,
) -> Result<String, ConversionError> {
    let tokens = tokenize(source)?;
    let mut kept: Vec<Token> = Vec::with_capacity(tokens.len());

    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth = depth.saturating_sub(1);
        } else if token.is_punct(';') && depth == 0 {
            process_chunk(&tokens[start..=i], preserve_comments, diagnostics, &mut kept);
            start = i + 1;
            depth = 0;
        }
    }
    if start < tokens.len() {
        process_chunk(&tokens[start..], preserve_comments, diagnostics, &mut kept);
    }

    Ok(render_trimmed(&kept))
}

/// One statement's tokens, including its terminating semicolon if any
fn process_chunk(
    chunk: &[Token],
    preserve_comments: bool,
    diagnostics: &mut Diagnostics,
    kept: &mut Vec<Token>,
) {
    if let Some(first) = next_significant(chunk, 0) {
        if is_session_directive(chunk, first) {
            let body = render_trimmed(&chunk[first..]);
            let body = body.trim_end_matches(';').trim_end().to_string();
            tracing::debug!("Removing session directive: {}", body);
            diagnostics.metadata_mut().session_directives_removed += 1;
            diagnostics.warn(
                DiagnosticCode::SessionDirective,
                format!("Session directive removed: {}", body),
            );
            kept.extend(chunk[..first].iter().filter(|t| preserve_comments || !t.is_comment()).cloned());
            kept.push(Token::space());
            return;
        }
    }

    for token in chunk {
        match token.kind {
            TokenKind::BlockComment if token.text.starts_with("/*+") => {
                for name in hint_names(&token.text) {
                    diagnostics.warn(
                        DiagnosticCode::UnmappedHint,
                        format!("Optimizer hint {} removed", name),
                    );
                    let hints = &mut diagnostics.metadata_mut().hints_removed;
                    if !hints.contains(&name) {
                        hints.push(name);
                    }
                }
                kept.push(Token::space());
            }
            TokenKind::LineComment | TokenKind::BlockComment if !preserve_comments => {
                kept.push(Token::space());
            }
            _ => kept.push(token.clone()),
        }
    }
}

fn is_session_directive(chunk: &[Token], first: usize) -> bool {
    let head = &chunk[first];
    let Some(second) = next_significant(chunk, first + 1) else {
        return head.is_word("RESET");
    };

    if head.is_word("SET") {
        // SET hive.exec.dynamic.partition=true; Snowflake `SET x = 1` session variables stay
        let key = &chunk[second];
        let dotted = chunk.get(second + 1).is_some_and(|t| t.is_punct('.'));
        return key.kind == TokenKind::Word && dotted;
    }
    if head.is_word("ADD") {
        return chunk[second].is_any_word(ADD_RESOURCES);
    }
    false
}

/// Hint names inside `/*+ MAPJOIN(b), STREAMTABLE(a) */`, uppercased
fn hint_names(comment: &str) -> Vec<String> {
    let body = comment
        .trim_start_matches("/*+")
        .trim_end_matches("*/");
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut top_level = String::new();
    for c in body.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => top_level.push(c),
            _ => {}
        }
        if c == '(' && depth == 1 {
            top_level.push('(');
        }
    }
    for caps in HINT_NAME_RE.captures_iter(&top_level) {
        let name = caps[1].to_ascii_uppercase();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(source: &str, preserve: bool) -> (String, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let out = preprocess(source, preserve, &mut diagnostics).unwrap();
        (out, diagnostics)
    }

    #[test]
    fn test_session_directives_removed() {
        let (out, diagnostics) = run(
            "SET hive.exec.dynamic.partition.mode=nonstrict;\nADD JAR /opt/udfs.jar;\nSELECT 1;",
            false,
        );
        assert_eq!(out, "SELECT 1;");
        assert_eq!(diagnostics.metadata().session_directives_removed, 2);
        assert!(diagnostics
            .warnings()
            .iter()
            .all(|w| w.code == DiagnosticCode::SessionDirective));
    }

    #[test]
    fn test_plain_set_kept() {
        let (out, diagnostics) = run("SET run_date = '2024-01-01';", false);
        assert_eq!(out, "SET run_date = '2024-01-01';");
        assert_eq!(diagnostics.metadata().session_directives_removed, 0);
    }

    #[test]
    fn test_hints_removed_and_recorded() {
        let (out, diagnostics) = run("SELECT /*+ MAPJOIN(b), STREAMTABLE(a) */ a.x FROM a JOIN b ON a.k = b.k", true);
        assert_eq!(out, "SELECT a.x FROM a JOIN b ON a.k = b.k");
        assert_eq!(diagnostics.metadata().hints_removed, vec!["MAPJOIN", "STREAMTABLE"]);
    }

    #[test]
    fn test_comment_handling() {
        let source = "-- load\nSELECT  a, /* note */ b\n\n  FROM t";
        let (out, _) = run(source, false);
        assert_eq!(out, "SELECT a, b FROM t");

        let (out, _) = run(source, true);
        assert_eq!(out, "-- load\nSELECT a, /* note */ b FROM t");
    }

    #[test]
    fn test_string_contents_untouched() {
        let (out, _) = run("SELECT '  two  spaces -- not a comment ;'  FROM t", false);
        assert_eq!(out, "SELECT '  two  spaces -- not a comment ;' FROM t");
    }

    #[test]
    fn test_lexical_error_propagates() {
        let mut diagnostics = Diagnostics::new();
        assert!(preprocess("SELECT \"open", false, &mut diagnostics).is_err());
    }
}
