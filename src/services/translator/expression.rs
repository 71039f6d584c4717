// Expression Transformer
//
// Walks a statement's tokens and rewrites expression-level constructs:
// function calls (through the function table), CAST target types, string
// and identifier quoting, window frames, LATERAL VIEW generators and the
// query-level DISTRIBUTE/SORT/CLUSTER BY clauses. Parenthesized groups are
// handled recursively as separate query blocks, so subqueries get the same
// treatment. Inside OVER, DISTRIBUTE BY and SORT BY are PARTITION BY and
// ORDER BY.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::ConversionError;
use super::function_mapper::{CallMapping, FunctionRule};
use super::lexer::{
    dotted_name, matches_sequence, matching_paren, next_significant, prev_significant, render_trimmed,
    split_top_level_commas, trim_rendered, trim_tokens, Token, TokenKind,
};
use super::{lateral, window, Context, MappingTables};
use crate::models::DiagnosticCode;

static PLAIN_IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is valid"));

/// Snowflake reserved words that cannot be used as bare identifiers
const RESERVED: &[&str] = &[
    "ALL", "ALTER", "AND", "ANY", "AS", "BETWEEN", "BY", "CASE", "CAST", "CHECK", "COLUMN",
    "CONNECT", "CREATE", "CROSS", "CURRENT", "DELETE", "DISTINCT", "DROP", "ELSE", "EXISTS",
    "FALSE", "FOLLOWING", "FOR", "FROM", "FULL", "GRANT", "GROUP", "HAVING", "ILIKE", "IN",
    "INCREMENT", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LATERAL", "LEFT", "LIKE",
    "MINUS", "NATURAL", "NOT", "NULL", "OF", "ON", "OR", "ORDER", "QUALIFY", "REGEXP", "REVOKE",
    "RIGHT", "RLIKE", "ROW", "ROWS", "SAMPLE", "SELECT", "SET", "SOME", "START", "TABLE",
    "TABLESAMPLE", "THEN", "TO", "TRIGGER", "TRUE", "TRY_CAST", "UNION", "UNIQUE", "UPDATE",
    "USING", "VALUES", "VIEW", "WHEN", "WHENEVER", "WHERE", "WITH",
];

/// Words that may be followed by `(` without being a function call
const NOT_CALLS: &[&str] = &[
    "AND", "OR", "NOT", "IN", "EXISTS", "AS", "ON", "USING", "OVER", "VALUES", "FROM", "JOIN",
    "WHERE", "SELECT", "TABLE", "INTO", "WITH", "BY", "WHEN", "THEN", "ELSE", "CASE", "IS",
    "LIKE", "RLIKE", "BETWEEN", "UNION", "ALL", "DISTINCT", "ANY", "SOME", "HAVING", "LATERAL",
    "PARTITION", "INSERT", "SET", "RETURNS", "VIEW", "EXCEPT", "INTERSECT", "MINUS", "LIMIT",
];

/// Words after which a following `(` opens a column list, not call arguments
const NAME_INTRODUCERS: &[&str] = &["INTO", "TABLE", "VIEW", "JOIN", "FROM", "UPDATE", "EXISTS"];

const TABLE_INTRODUCERS: &[&str] = &["FROM", "JOIN", "INTO", "USING", "UPDATE"];

const NOT_TABLE_NAMES: &[&str] = &["SELECT", "LATERAL", "TABLE", "VALUES", "UNNEST", "WITH"];

const GENERATORS: &[&str] = &["EXPLODE", "POSEXPLODE", "INLINE", "STACK", "JSON_TUPLE", "PARSE_URL_TUPLE"];

/// Clauses that end a dropped DISTRIBUTE BY list
const CLAUSE_END: &[&str] = &[
    "SORT", "ORDER", "CLUSTER", "LIMIT", "UNION", "HAVING", "WINDOW", "INSERT", "EXCEPT",
    "INTERSECT", "MINUS",
];

/// Types that can be mapped without surrounding context
const BARE_TYPE_WORDS: &[&str] = &["STRING", "TINYINT", "SMALLINT", "INT", "BIGINT", "DOUBLE"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Table references are recorded
    Query,
    /// Inside call arguments, where `FROM` is part of the call (`EXTRACT(x FROM y)`)
    Arguments,
    /// Inside `OVER (...)`, where Hive accepts DISTRIBUTE BY and SORT BY
    Window,
}

/// Rewrite a statement or clause; the result is trimmed
pub fn translate(tokens: &[Token], ctx: &mut Context) -> Result<String, ConversionError> {
    Ok(trim_rendered(&walk(tokens, ctx, Scope::Query)?))
}

/// Rewrite an expression inside call arguments
pub fn translate_argument(tokens: &[Token], ctx: &mut Context) -> Result<String, ConversionError> {
    Ok(trim_rendered(&walk(tokens, ctx, Scope::Arguments)?))
}

fn walk(tokens: &[Token], ctx: &mut Context, scope: Scope) -> Result<String, ConversionError> {
    let mut out = String::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::StringLit => out.push_str(&single_quoted(&token.text)),
            TokenKind::QuotedIdent => out.push_str(&render_identifier(&token.identifier_name())),
            TokenKind::Number => out.push_str(strip_numeric_suffix(&token.text)),
            TokenKind::Punct if token.is_punct('(') => {
                let close = matching_paren(tokens, i)
                    .ok_or_else(|| ctx.structural("Unbalanced parentheses"))?;
                // a subquery is its own query block
                let saved = ctx.enter_block();
                let inner = walk(&tokens[i + 1..close], ctx, Scope::Query);
                ctx.leave_block(saved);
                out.push('(');
                out.push_str(&inner?);
                out.push(')');
                i = close + 1;
                continue;
            }
            TokenKind::Punct if token.is_punct(')') => {
                return Err(ctx.structural("Unbalanced parentheses"));
            }
            TokenKind::Punct if is_null_safe_equals(tokens, i) => {
                if !out.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push_str("IS NOT DISTINCT FROM");
                i += 3;
                if tokens.get(i).is_some_and(|t| t.kind != TokenKind::Whitespace) {
                    out.push(' ');
                }
                continue;
            }
            TokenKind::Word => {
                if let Some(next) = word(tokens, i, ctx, scope, &mut out)? {
                    i = next;
                    continue;
                }
                out.push_str(&token.text);
            }
            _ => out.push_str(&token.text),
        }
        i += 1;
    }

    Ok(out)
}

/// Handle a word that starts a construct. Returns the index to resume at,
/// or `None` when the word is copied through as-is.
fn word(
    tokens: &[Token],
    i: usize,
    ctx: &mut Context,
    scope: Scope,
    out: &mut String,
) -> Result<Option<usize>, ConversionError> {
    let token = &tokens[i];

    if matches_sequence(tokens, i, &["LATERAL", "VIEW"]).is_some() {
        let (text, next) = lateral::rewrite(tokens, i, ctx)?;
        out.push_str(&text);
        return Ok(Some(next));
    }

    if scope == Scope::Window {
        if let Some(end) = matches_sequence(tokens, i, &["DISTRIBUTE", "BY"]) {
            out.push_str("PARTITION BY");
            return Ok(Some(end));
        }
        if let Some(end) = matches_sequence(tokens, i, &["SORT", "BY"]) {
            out.push_str("ORDER BY");
            return Ok(Some(end));
        }
    }

    if let Some(end) = matches_sequence(tokens, i, &["SORT", "BY"]) {
        ctx.query_clause("SORT BY")?;
        ctx.diagnostics.warn(
            DiagnosticCode::ApproximateSemantics,
            "SORT BY orders rows within each reducer; mapped to a total ORDER BY",
        );
        out.push_str("ORDER BY");
        return Ok(Some(end));
    }

    if let Some(end) = matches_sequence(tokens, i, &["CLUSTER", "BY"]) {
        ctx.query_clause("CLUSTER BY")?;
        ctx.diagnostics.warn(
            DiagnosticCode::ApproximateSemantics,
            "CLUSTER BY distributes and sorts per reducer; mapped to a total ORDER BY",
        );
        out.push_str("ORDER BY");
        return Ok(Some(end));
    }

    if let Some(end) = matches_sequence(tokens, i, &["DISTRIBUTE", "BY"]) {
        ctx.query_clause("DISTRIBUTE BY")?;
        ctx.diagnostics.warn(
            DiagnosticCode::UnmappedHint,
            "DISTRIBUTE BY has no Snowflake equivalent and was dropped",
        );
        return Ok(Some(skip_clause(tokens, end)));
    }

    if let Some(open) = call_open(tokens, i) {
        let name = token.upper();
        if name == "CAST" || name == "TRY_CAST" {
            return cast(tokens, i, open, ctx, out).map(Some);
        }
        if name == "TRANSFORM" {
            return Err(ctx.unsupported("TRANSFORM ... USING"));
        }
        if GENERATORS.contains(&name.as_str()) {
            return Err(ctx.unsupported(format!("{} outside LATERAL VIEW", name)));
        }
        return call(tokens, i, open, ctx, out).map(Some);
    }

    if scope == Scope::Query && token.is_any_word(TABLE_INTRODUCERS) {
        if let Some(name) = table_name_after(tokens, i + 1) {
            ctx.diagnostics.table(&name);
        }
    }

    Ok(None)
}

/// Index of the `(` if the word at `i` starts a function call
fn call_open(tokens: &[Token], i: usize) -> Option<usize> {
    let token = &tokens[i];
    if token.is_any_word(NOT_CALLS) {
        return None;
    }
    let mut j = i + 1;
    while tokens.get(j).is_some_and(|t| t.kind == TokenKind::Whitespace) {
        j += 1;
    }
    if !tokens.get(j)?.is_punct('(') {
        return None;
    }
    if let Some(prev) = prev_significant(tokens, i) {
        let prev = &tokens[prev];
        if prev.is_punct('.') || prev.is_any_word(NAME_INTRODUCERS) {
            return None;
        }
    }
    Some(j)
}

fn call(
    tokens: &[Token],
    i: usize,
    open: usize,
    ctx: &mut Context,
    out: &mut String,
) -> Result<usize, ConversionError> {
    let close = matching_paren(tokens, open).ok_or_else(|| ctx.structural("Unbalanced parentheses"))?;
    let name = tokens[i].text.clone();
    let args = arguments(&tokens[open + 1..close], ctx)?;

    ctx.diagnostics.function(&name);
    let text = match ctx.tables.functions.apply(&name, &args) {
        CallMapping::Mapped(text) => text,
        CallMapping::Passthrough => format!("{}({})", name, args.join(", ")),
        CallMapping::ArgumentMismatch => {
            ctx.diagnostics.warn(
                DiagnosticCode::FunctionArguments,
                format!(
                    "{} called with {} argument(s); left unchanged",
                    name.to_ascii_uppercase(),
                    args.len()
                ),
            );
            format!("{}({})", name, args.join(", "))
        }
    };
    out.push_str(&text);

    let mut next = close + 1;
    if let Some(over) = next_significant(tokens, next).filter(|&o| tokens[o].is_word("OVER")) {
        if let Some(spec_open) = next_significant(tokens, over + 1).filter(|&o| tokens[o].is_punct('(')) {
            let spec_close = matching_paren(tokens, spec_open)
                .ok_or_else(|| ctx.structural("Unbalanced parentheses in OVER clause"))?;
            let frame = window::rewrite_frame(&tokens[spec_open + 1..spec_close], ctx);
            let spec = walk(&frame, ctx, Scope::Window)?;
            out.push_str(" OVER (");
            out.push_str(&trim_rendered(&spec));
            out.push(')');
            next = spec_close + 1;
        }
    }
    Ok(next)
}

/// Translate each top-level argument of a call
pub fn arguments(inner: &[Token], ctx: &mut Context) -> Result<Vec<String>, ConversionError> {
    if trim_tokens(inner).is_empty() {
        return Ok(Vec::new());
    }
    split_top_level_commas(inner)
        .into_iter()
        .map(|arg| translate_argument(arg, ctx))
        .collect()
}

/// `CAST(expr AS type)` with the target type mapped
fn cast(
    tokens: &[Token],
    i: usize,
    open: usize,
    ctx: &mut Context,
    out: &mut String,
) -> Result<usize, ConversionError> {
    let close = matching_paren(tokens, open).ok_or_else(|| ctx.structural("Unbalanced parentheses"))?;
    let inner = &tokens[open + 1..close];

    let mut depth = 0usize;
    let mut as_at = None;
    for (k, t) in inner.iter().enumerate() {
        if t.is_punct('(') {
            depth += 1;
        } else if t.is_punct(')') {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && t.is_word("AS") {
            as_at = Some(k);
        }
    }
    let as_at = as_at.ok_or_else(|| ctx.structural("CAST without AS"))?;

    let expr = translate_argument(&inner[..as_at], ctx)?;
    let target = ctx.map_type_tokens(&inner[as_at + 1..])?;
    out.push_str(&format!("{}({} AS {})", tokens[i].upper(), expr, target));
    Ok(close + 1)
}

/// Skip a clause's expression list up to the next clause keyword at this depth
fn skip_clause(tokens: &[Token], from: usize) -> usize {
    let mut depth = 0usize;
    let mut i = from;
    while i < tokens.len() {
        let t = &tokens[i];
        if t.is_punct('(') {
            depth += 1;
        } else if t.is_punct(')') {
            if depth == 0 {
                return i;
            }
            depth -= 1;
        } else if depth == 0 && (t.is_any_word(CLAUSE_END) || t.is_punct(';')) {
            return i;
        }
        i += 1;
    }
    i
}

/// Dotted table name starting at the next significant token after `from`
pub fn table_name_after(tokens: &[Token], from: usize) -> Option<String> {
    let start = next_significant(tokens, from)?;
    let first = &tokens[start];
    if !first.is_identifier() || first.is_any_word(NOT_TABLE_NAMES) {
        return None;
    }
    Some(dotted_name(tokens, start).0)
}

/// Render a dotted source name in target quoting
pub fn render_name(name: &str) -> String {
    name.split('.').map(render_identifier).collect::<Vec<_>>().join(".")
}

fn is_null_safe_equals(tokens: &[Token], i: usize) -> bool {
    tokens[i].is_punct('<')
        && tokens.get(i + 1).is_some_and(|t| t.is_punct('='))
        && tokens.get(i + 2).is_some_and(|t| t.is_punct('>'))
}

/// Bare identifier when possible, otherwise double-quoted
pub fn render_identifier(name: &str) -> String {
    let reserved = RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name));
    if PLAIN_IDENT_RE.is_match(name) && !reserved {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Convert a Hive string literal to a single-quoted Snowflake literal
pub fn single_quoted(text: &str) -> String {
    let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) else {
        return text.to_string();
    };

    let mut out = String::with_capacity(inner.len() + 2);
    out.push('\'');
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('"') => out.push('"'),
                Some(n) => {
                    out.push('\\');
                    out.push(n);
                }
                None => out.push('\\'),
            },
            '"' if chars.peek() == Some(&'"') => {
                chars.next();
                out.push('"');
            }
            '\'' => out.push_str("''"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// `10L`, `5Y`, `1.5BD` lose their Hive type suffix
fn strip_numeric_suffix(text: &str) -> &str {
    text.trim_end_matches(|c: char| c.is_ascii_alphabetic())
}

/// Best-effort rewrite that needs no statement structure: renames, quoting,
/// insert and external-table keywords, and unambiguous type words
pub fn context_free(tokens: &[Token], tables: &MappingTables) -> String {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];

        if let Some(end) = matches_sequence(tokens, i, &["INSERT", "OVERWRITE", "TABLE"]) {
            out.push(Token::new(TokenKind::Word, "INSERT OVERWRITE INTO"));
            i = end;
            continue;
        }
        if let Some(end) = matches_sequence(tokens, i, &["INSERT", "INTO", "TABLE"]) {
            out.push(Token::new(TokenKind::Word, "INSERT INTO"));
            i = end;
            continue;
        }
        if let Some(end) = matches_sequence(tokens, i, &["CREATE", "EXTERNAL", "TABLE"]) {
            out.push(Token::new(TokenKind::Word, "CREATE TABLE"));
            i = end;
            continue;
        }

        let replaced = match token.kind {
            TokenKind::StringLit => Some(single_quoted(&token.text)),
            TokenKind::QuotedIdent => Some(render_identifier(&token.identifier_name())),
            TokenKind::Word => context_free_word(tokens, i, tables),
            _ => None,
        };
        match replaced {
            Some(text) => out.push(Token::new(token.kind, text)),
            None => out.push(token.clone()),
        }
        i += 1;
    }

    render_trimmed(&out)
}

fn context_free_word(tokens: &[Token], i: usize, tables: &MappingTables) -> Option<String> {
    let token = &tokens[i];
    let followed_by_paren = next_significant(tokens, i + 1).is_some_and(|n| tokens[n].is_punct('('));
    let after_dot = i > 0 && tokens[i - 1].is_punct('.');

    if followed_by_paren {
        return match tables.functions.lookup(&token.text) {
            Some(FunctionRule::Rename(target)) if call_open(tokens, i).is_some() => Some(target.to_string()),
            _ => None,
        };
    }
    if !after_dot && token.is_any_word(BARE_TYPE_WORDS) {
        return Some(tables.types.map_text(&token.text).text().to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::translator::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn run(sql: &str) -> (String, Context<'static>) {
        let mut ctx = Context::new(0, MappingTables::shared());
        let out = translate(&tokenize(sql).unwrap(), &mut ctx).unwrap();
        (out, ctx)
    }

    fn run_err(sql: &str) -> ConversionError {
        let mut ctx = Context::new(0, MappingTables::shared());
        translate(&tokenize(sql).unwrap(), &mut ctx).unwrap_err()
    }

    #[test]
    fn test_function_renames_and_rewrites() {
        let (out, ctx) = run("SELECT nvl(a, 0), collect_set(b), my_udf(c) FROM t GROUP BY d");
        assert_eq!(
            out,
            "SELECT COALESCE(a, 0), ARRAY_AGG(DISTINCT b), my_udf(c) FROM t GROUP BY d"
        );
        let metadata_functions = ctx.diagnostics.warnings().len();
        assert_eq!(metadata_functions, 0);
    }

    #[test]
    fn test_nested_calls_rewrite_arguments_first() {
        let (out, _) = run("SELECT datediff(to_date(b), nvl(a, b)) FROM t");
        assert_eq!(out, "SELECT DATEDIFF(DAY, COALESCE(a, b), to_date(b)) FROM t");
    }

    #[test]
    fn test_argument_mismatch_warns() {
        let (out, ctx) = run("SELECT datediff(a) FROM t");
        assert_eq!(out, "SELECT datediff(a) FROM t");
        assert_eq!(ctx.diagnostics.warnings()[0].code, DiagnosticCode::FunctionArguments);
    }

    #[test]
    fn test_quoting() {
        let (out, _) = run("SELECT `user id`, `order`, `amount`, \"it's\" FROM `db`.`sales`");
        assert_eq!(out, "SELECT \"user id\", \"order\", amount, 'it''s' FROM db.sales");
    }

    #[test]
    fn test_cast_maps_type() {
        let (out, _) = run("SELECT CAST(x AS STRING), cast(y as decimal(10, 2)), CAST(z AS BIGINT) FROM t");
        assert_eq!(
            out,
            "SELECT CAST(x AS VARCHAR), CAST(y AS NUMBER(10,2)), CAST(z AS NUMBER(19,0)) FROM t"
        );
    }

    #[test]
    fn test_query_clauses() {
        let (out, ctx) = run("SELECT a FROM t SORT BY a");
        assert_eq!(out, "SELECT a FROM t ORDER BY a");
        assert_eq!(ctx.diagnostics.warnings()[0].code, DiagnosticCode::ApproximateSemantics);

        let (out, _) = run("SELECT a FROM t DISTRIBUTE BY a LIMIT 5");
        assert_eq!(out, "SELECT a FROM t LIMIT 5");

        let err = run_err("SELECT a FROM t DISTRIBUTE BY a SORT BY a");
        assert!(matches!(err, ConversionError::Structural { .. }));
    }

    #[test]
    fn test_window_distribute_and_sort_by() {
        let (out, ctx) = run("SELECT k, sum(x) OVER (DISTRIBUTE BY k SORT BY ts) FROM t");
        assert_eq!(out, "SELECT k, sum(x) OVER (PARTITION BY k ORDER BY ts) FROM t");
        assert!(ctx.diagnostics.warnings().is_empty());

        let (out, _) = run("SELECT k, sum(x) OVER (DISTRIBUTE BY k) FROM t SORT BY k");
        assert_eq!(out, "SELECT k, sum(x) OVER (PARTITION BY k) FROM t ORDER BY k");
    }

    #[test]
    fn test_subquery_is_its_own_clause_block() {
        let (out, _) = run("SELECT a FROM (SELECT a FROM t SORT BY a) x SORT BY a");
        assert_eq!(out, "SELECT a FROM (SELECT a FROM t ORDER BY a) x ORDER BY a");

        let (out, _) = run("SELECT a FROM (SELECT a FROM t SORT BY a) x DISTRIBUTE BY a LIMIT 1");
        assert_eq!(out, "SELECT a FROM (SELECT a FROM t ORDER BY a) x LIMIT 1");
    }

    #[test]
    fn test_line_comments_keep_their_newline() {
        let (out, _) = run("SELECT nvl(a -- first\n, b) FROM t");
        assert_eq!(out, "SELECT COALESCE(a -- first\n, b) FROM t");

        let (out, _) = run("SELECT sum(x) OVER (PARTITION BY k -- key\n) FROM t");
        assert_eq!(out, "SELECT sum(x) OVER (PARTITION BY k -- key\n) FROM t");
    }

    #[test]
    fn test_tables_recorded_outside_call_arguments() {
        let (_, ctx) = run("SELECT EXTRACT(YEAR FROM ts) FROM sales.orders o JOIN (SELECT * FROM customers) c ON o.id = c.id");
        let mut diagnostics = crate::services::translator::Diagnostics::new();
        diagnostics.commit(ctx.diagnostics);
        assert_eq!(
            diagnostics.metadata().tables_referenced,
            vec!["sales.orders", "customers"]
        );
        assert!(diagnostics.metadata().functions_used.contains(&"EXTRACT".to_string()));
    }

    #[test]
    fn test_generators_outside_lateral_view_unsupported() {
        let err = run_err("SELECT explode(items) FROM t");
        assert_eq!(err, ConversionError::unsupported(0, "EXPLODE outside LATERAL VIEW"));
        let err = run_err("SELECT TRANSFORM(a, b) USING 'cat' AS (x, y) FROM t");
        assert!(matches!(err, ConversionError::Unsupported { .. }));
    }

    #[test]
    fn test_literals() {
        let (out, _) = run("SELECT 10L, 5Y, a <=> b FROM t");
        assert_eq!(out, "SELECT 10, 5, a IS NOT DISTINCT FROM b FROM t");
    }

    #[test]
    fn test_context_free_fallback() {
        let tokens = tokenize("INSERT OVERWRITE TABLE t SELECT nvl(`a`, \"x\"), CAST(b AS STRING) FROM s").unwrap();
        assert_eq!(
            context_free(&tokens, MappingTables::shared()),
            "INSERT OVERWRITE INTO t SELECT COALESCE(a, 'x'), CAST(b AS VARCHAR) FROM s"
        );
    }
}
