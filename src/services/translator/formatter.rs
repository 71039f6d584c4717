// Output Formatter
//
// Layout only: keywords are uppercased, top-level clauses start new lines,
// multi-item select lists and CREATE TABLE column lists get one item per
// line. The token stream is checked afterwards; if anything other than case
// and whitespace changed the formatter reports an error and the caller keeps
// the unformatted text.

use super::error::ConversionError;
use super::lexer::{tokenize, Token, TokenKind};

const INDENT: &str = "  ";

const KEYWORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "CLUSTER", "COLUMN",
    "COMMENT", "CREATE", "CROSS", "CURRENT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END",
    "EXCEPT", "EXISTS", "FALSE", "FOLLOWING", "FROM", "FULL", "GROUP", "HAVING", "IF", "IN", "INNER",
    "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LATERAL", "LEFT", "LIKE", "LIMIT", "MATCHED", "MERGE",
    "MINUS", "NOT", "NULL", "ON", "OR", "ORDER", "OUTER", "OVER", "OVERWRITE", "PARTITION", "PRECEDING",
    "QUALIFY", "RANGE", "RENAME", "REPLACE", "RIGHT", "ROW", "ROWS", "SELECT", "SET", "TABLE",
    "TEMPORARY", "THEN", "TO", "TRUE", "TRUNCATE", "UNBOUNDED", "UNION", "UPDATE", "USING", "VALUES",
    "VIEW", "WHEN", "WHERE", "WITH",
];

/// Clause keywords that start a new line at statement level
const CLAUSES: &[&str] = &[
    "FROM", "WHERE", "HAVING", "QUALIFY", "LIMIT", "UNION", "INTERSECT", "EXCEPT", "MINUS", "JOIN",
    "VALUES",
];

/// Clauses that only break when followed by `BY`
const BY_CLAUSES: &[&str] = &["GROUP", "ORDER"];

const JOIN_PREFIXES: &[&str] = &["LEFT", "RIGHT", "FULL", "INNER", "CROSS", "NATURAL"];

/// Table-level clauses of a CREATE TABLE
const TABLE_CLAUSES: &[&str] = &["CLUSTER", "STAGE_FILE_FORMAT", "COMMENT"];

/// Reformat one translated statement
pub fn format_statement(sql: &str) -> Result<String, ConversionError> {
    let tokens = tokenize(sql).map_err(|e| ConversionError::Format(e.to_string()))?;
    let out = Layout::new(&tokens).render();
    verify(&tokens, &out)?;
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Space {
    None,
    Blank,
    Newline,
}

struct Layout<'t> {
    /// Non-whitespace tokens, each with whether whitespace (and a newline) preceded it
    items: Vec<(&'t Token, Space)>,
    create_table: bool,
    merge: bool,
}

impl<'t> Layout<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        let mut items = Vec::new();
        let mut space = Space::None;
        for token in tokens {
            if token.kind == TokenKind::Whitespace {
                space = if token.text.contains('\n') { Space::Newline } else { space.max(Space::Blank) };
                continue;
            }
            items.push((token, space));
            space = Space::None;
        }

        let words: Vec<&Token> = items
            .iter()
            .map(|(t, _)| *t)
            .filter(|t| !t.is_comment())
            .take_while(|t| !t.is_punct('('))
            .collect();
        let create_table = words.first().is_some_and(|t| t.is_word("CREATE"))
            && words.iter().take(4).any(|t| t.is_word("TABLE"));
        let merge = words.first().is_some_and(|t| t.is_word("MERGE"));

        Self {
            items,
            create_table,
            merge,
        }
    }

    /// Next token that is not a comment
    fn next_word(&self, n: usize) -> Option<&'t Token> {
        self.items[n + 1..].iter().map(|(t, _)| *t).find(|t| !t.is_comment())
    }

    fn prev_word(&self, n: usize) -> Option<&'t Token> {
        self.items[..n].iter().rev().map(|(t, _)| *t).find(|t| !t.is_comment())
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let mut depth = 0usize;
        let mut case_depth = 0usize;
        let mut in_select_list = false;
        let mut column_group: Option<usize> = None;
        let mut pending: Option<&str> = None;

        for (n, &(token, space)) in self.items.iter().enumerate() {
            let top = depth == 0 && case_depth == 0;

            // a trailing comment stays on the line it annotates
            if token.is_comment() && space == Space::Blank && pending.is_some() {
                out.push(' ');
                out.push_str(&token.text);
                continue;
            }

            if top && n > 0 && self.starts_clause(n) {
                in_select_list = false;
                pending = Some("");
            }
            if token.is_punct(')') && column_group == Some(depth) {
                column_group = None;
                pending = Some("");
            }

            match pending.take() {
                Some(indent) => line_break(&mut out, indent),
                None if space != Space::None && !out.is_empty() => out.push(' '),
                None => {}
            }

            if token.kind == TokenKind::Word && token.is_any_word(KEYWORDS) {
                out.push_str(&token.upper());
            } else {
                out.push_str(&token.text);
            }

            if token.is_punct('(') {
                depth += 1;
                if self.create_table && column_group.is_none() && depth == 1 && self.opens_columns(n) {
                    column_group = Some(depth);
                    pending = Some(INDENT);
                }
            } else if token.is_punct(')') {
                depth = depth.saturating_sub(1);
            } else if token.is_word("CASE") {
                case_depth += 1;
            } else if token.is_word("END") {
                case_depth = case_depth.saturating_sub(1);
            } else if token.is_punct(',') {
                if column_group == Some(depth) || (top && in_select_list) {
                    pending = Some(INDENT);
                }
            } else if top && token.is_word("SELECT") {
                in_select_list = self.select_list_has_comma(n + 1);
                if in_select_list && !self.next_word(n).is_some_and(|t| t.is_any_word(&["DISTINCT", "ALL"])) {
                    pending = Some(INDENT);
                }
            } else if top && in_select_list && token.is_any_word(&["DISTINCT", "ALL"]) {
                if self.prev_word(n).is_some_and(|t| t.is_word("SELECT")) {
                    pending = Some(INDENT);
                }
            }

            if token.kind == TokenKind::LineComment && pending.is_none() {
                pending = Some(if in_select_list || column_group.is_some() { INDENT } else { "" });
            }
        }

        out.trim_end().to_string()
    }

    fn starts_clause(&self, n: usize) -> bool {
        let token = self.items[n].0;
        if token.kind != TokenKind::Word {
            return false;
        }
        let prev = self.prev_word(n);
        let next = self.next_word(n);

        if token.is_word("FROM") {
            // `IS [NOT] DISTINCT FROM`, `DELETE FROM`
            return !prev.is_some_and(|p| p.is_any_word(&["DISTINCT", "DELETE"]));
        }
        if token.is_word("JOIN") {
            return !prev.is_some_and(|p| p.is_any_word(JOIN_PREFIXES) || p.is_word("OUTER"));
        }
        if token.is_any_word(JOIN_PREFIXES) {
            return next.is_some_and(|t| t.is_any_word(&["JOIN", "OUTER"]));
        }
        if token.is_word("SELECT") {
            return !prev.is_some_and(|p| p.is_any_word(&["UNION", "ALL", "INTERSECT", "EXCEPT", "MINUS"]) || p.is_punct('('));
        }
        if token.is_any_word(BY_CLAUSES) {
            return next.is_some_and(|t| t.is_word("BY"));
        }
        if self.merge && token.is_any_word(&["USING", "WHEN"]) {
            return true;
        }
        if self.create_table {
            if token.is_any_word(TABLE_CLAUSES) {
                return true;
            }
            if token.is_word("AS") {
                return next.is_some_and(|t| t.is_any_word(&["SELECT", "WITH"]));
            }
        }
        token.is_any_word(CLAUSES)
    }

    /// Whether the `(` at `n` opens the column list of a CREATE TABLE
    fn opens_columns(&self, n: usize) -> bool {
        self.prev_word(n)
            .is_some_and(|p| matches!(p.kind, TokenKind::Word | TokenKind::QuotedIdent | TokenKind::StringLit))
            && !self.prev_word(n).is_some_and(|p| p.is_any_word(KEYWORDS))
    }

    fn select_list_has_comma(&self, from: usize) -> bool {
        let mut depth = 0usize;
        let mut case_depth = 0usize;
        for n in from..self.items.len() {
            let token = self.items[n].0;
            if token.is_punct('(') {
                depth += 1;
            } else if token.is_punct(')') {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            } else if token.is_word("CASE") {
                case_depth += 1;
            } else if token.is_word("END") {
                case_depth = case_depth.saturating_sub(1);
            } else if depth == 0 && case_depth == 0 {
                if token.is_punct(',') {
                    return true;
                }
                if self.starts_clause(n) {
                    return false;
                }
            }
        }
        false
    }
}

fn line_break(out: &mut String, indent: &str) {
    while out.ends_with(' ') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(indent);
}

/// Formatting may only change whitespace and keyword case
fn verify(original: &[Token], formatted: &str) -> Result<(), ConversionError> {
    let after = tokenize(formatted).map_err(|e| ConversionError::Format(e.to_string()))?;
    let before = original.iter().filter(|t| t.kind != TokenKind::Whitespace);
    let after: Vec<&Token> = after.iter().filter(|t| t.kind != TokenKind::Whitespace).collect();

    let mut count = 0;
    for (a, b) in before.zip(after.iter()) {
        count += 1;
        let same = a.kind == b.kind
            && if a.kind == TokenKind::Word {
                a.text.eq_ignore_ascii_case(&b.text)
            } else {
                a.text == b.text
            };
        if !same {
            return Err(ConversionError::Format(format!(
                "formatter changed '{}' into '{}'",
                a.text, b.text
            )));
        }
    }
    let expected = original.iter().filter(|t| t.kind != TokenKind::Whitespace).count();
    if count != expected || after.len() != expected {
        return Err(ConversionError::Format("formatter changed the token count".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_select_layout() {
        let out = format_statement(
            "select a, nvl_b AS b, case when x then 1 else 2 end AS c from t left join u on t.id = u.id where a > 1 order by a",
        )
        .unwrap();
        assert_eq!(
            out,
            "SELECT\n  a,\n  nvl_b AS b,\n  CASE WHEN x THEN 1 ELSE 2 END AS c\nFROM t\nLEFT JOIN u ON t.id = u.id\nWHERE a > 1\nORDER BY a"
        );
    }

    #[test]
    fn test_single_item_select_stays_inline() {
        assert_eq!(
            format_statement("INSERT OVERWRITE INTO t SELECT * FROM s").unwrap(),
            "INSERT OVERWRITE INTO t\nSELECT *\nFROM s"
        );
        assert_eq!(
            format_statement("SELECT x FROM (SELECT a, b FROM s) q WHERE a IS NOT DISTINCT FROM b").unwrap(),
            "SELECT x\nFROM (SELECT a, b FROM s) q\nWHERE a IS NOT DISTINCT FROM b"
        );
    }

    #[test]
    fn test_create_table_layout() {
        let out = format_statement(
            "CREATE TABLE t (a NUMBER(10,0), b VARCHAR COMMENT 'x', d VARCHAR) CLUSTER BY (d) STAGE_FILE_FORMAT = (TYPE = ORC)",
        )
        .unwrap();
        assert_eq!(
            out,
            "CREATE TABLE t (\n  a NUMBER(10,0),\n  b VARCHAR COMMENT 'x',\n  d VARCHAR\n)\nCLUSTER BY (d)\nSTAGE_FILE_FORMAT = (TYPE = ORC)"
        );
    }

    #[test]
    fn test_line_comment_keeps_its_line() {
        let out = format_statement("SELECT a, -- first\n b FROM t").unwrap();
        assert_eq!(out, "SELECT\n  a, -- first\n  b\nFROM t");
    }

    #[test]
    fn test_output_is_stable() {
        let once = format_statement("select a, b from t where x = 'a  b' group by a, b").unwrap();
        assert_eq!(format_statement(&once).unwrap(), once);
    }
}
