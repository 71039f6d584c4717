// LATERAL VIEW Rewriting
//
// `LATERAL VIEW [OUTER] gen(args) alias [AS c1, c2]` becomes a cross join
// against an inline view over FLATTEN (or, for json_tuple, over GET calls),
// keeping the table alias and the column names the query refers to.

use super::error::ConversionError;
use super::expression::{arguments, render_identifier};
use super::lexer::{matches_sequence, matching_paren, next_significant, Token};
use super::Context;
use crate::models::DiagnosticCode;

/// Words that end a LATERAL VIEW column alias list
const CLAUSE_WORDS: &[&str] = &[
    "WHERE", "GROUP", "ORDER", "SORT", "CLUSTER", "DISTRIBUTE", "HAVING", "LIMIT", "LATERAL",
    "JOIN", "LEFT", "RIGHT", "FULL", "INNER", "CROSS", "UNION", "WINDOW", "INSERT", "SELECT", "ON",
];

struct LateralView {
    generator: String,
    outer: bool,
    args: Vec<String>,
    alias: String,
    columns: Vec<String>,
}

/// Rewrite the LATERAL VIEW clause starting at `start`. Returns the
/// replacement text and the index just past the clause.
pub fn rewrite(tokens: &[Token], start: usize, ctx: &mut Context) -> Result<(String, usize), ConversionError> {
    let (view, end) = parse(tokens, start, ctx)?;
    ctx.diagnostics.function(&view.generator);

    let text = match view.generator.to_ascii_lowercase().as_str() {
        "explode" => {
            let select = match view.columns.as_slice() {
                [value] => format!("VALUE AS {}", value),
                [key, value] => format!("KEY AS {}, VALUE AS {}", key, value),
                _ => return Err(ctx.structural("LATERAL VIEW explode needs one or two column aliases")),
            };
            flatten(&view, &select, ctx)?
        }
        "posexplode" => {
            let select = match view.columns.as_slice() {
                [pos, value] => format!("INDEX AS {}, VALUE AS {}", pos, value),
                _ => return Err(ctx.structural("LATERAL VIEW posexplode needs two column aliases")),
            };
            flatten(&view, &select, ctx)?
        }
        "json_tuple" => json_tuple(&view, ctx)?,
        _ => {
            return Err(ctx.unsupported(format!(
                "LATERAL VIEW {}",
                view.generator.to_ascii_uppercase()
            )))
        }
    };

    ctx.diagnostics.warn(
        DiagnosticCode::LossyTranslation,
        format!(
            "LATERAL VIEW {}{} rewritten to CROSS JOIN LATERAL",
            if view.outer { "OUTER " } else { "" },
            view.generator.to_ascii_uppercase()
        ),
    );
    Ok((text, end))
}

fn parse(tokens: &[Token], start: usize, ctx: &mut Context) -> Result<(LateralView, usize), ConversionError> {
    let malformed = |ctx: &Context| ctx.structural("Malformed LATERAL VIEW clause");

    let after_view = matches_sequence(tokens, start, &["LATERAL", "VIEW"]).ok_or_else(|| malformed(ctx))?;
    let mut i = next_significant(tokens, after_view).ok_or_else(|| malformed(ctx))?;

    let outer = tokens[i].is_word("OUTER");
    if outer {
        i = next_significant(tokens, i + 1).ok_or_else(|| malformed(ctx))?;
    }

    if !tokens[i].is_identifier() {
        return Err(malformed(ctx));
    }
    let generator = tokens[i].identifier_name();
    let open = next_significant(tokens, i + 1)
        .filter(|&o| tokens[o].is_punct('('))
        .ok_or_else(|| malformed(ctx))?;
    let close = matching_paren(tokens, open).ok_or_else(|| ctx.structural("Unbalanced parentheses"))?;
    let args = arguments(&tokens[open + 1..close], ctx)?;

    let alias_at = next_significant(tokens, close + 1)
        .filter(|&a| tokens[a].is_identifier() && !tokens[a].is_word("AS") && !tokens[a].is_any_word(CLAUSE_WORDS))
        .ok_or_else(|| ctx.structural("LATERAL VIEW requires a table alias"))?;
    let alias = render_identifier(&tokens[alias_at].identifier_name());
    let mut end = alias_at + 1;

    let mut columns = Vec::new();
    if let Some(as_at) = next_significant(tokens, end).filter(|&a| tokens[a].is_word("AS")) {
        let mut j = next_significant(tokens, as_at + 1);
        while let Some(col) = j.filter(|&c| tokens[c].is_identifier() && !tokens[c].is_any_word(CLAUSE_WORDS)) {
            columns.push(render_identifier(&tokens[col].identifier_name()));
            end = col + 1;
            match next_significant(tokens, end) {
                Some(comma) if tokens[comma].is_punct(',') => j = next_significant(tokens, comma + 1),
                _ => break,
            }
        }
        if columns.is_empty() {
            return Err(ctx.structural("LATERAL VIEW AS without column aliases"));
        }
    }

    Ok((
        LateralView {
            generator,
            outer,
            args,
            alias,
            columns,
        },
        end,
    ))
}

fn flatten(view: &LateralView, select: &str, ctx: &Context) -> Result<String, ConversionError> {
    let [input] = view.args.as_slice() else {
        return Err(ctx.structural(format!(
            "{} expects exactly one argument",
            view.generator.to_ascii_uppercase()
        )));
    };
    let outer = if view.outer { ", OUTER => TRUE" } else { "" };
    Ok(format!(
        "CROSS JOIN LATERAL (SELECT {} FROM TABLE(FLATTEN(INPUT => {}{}))) {}",
        select, input, outer, view.alias
    ))
}

fn json_tuple(view: &LateralView, ctx: &Context) -> Result<String, ConversionError> {
    let [json, fields @ ..] = view.args.as_slice() else {
        return Err(ctx.structural("json_tuple expects a JSON argument"));
    };
    if fields.is_empty() || fields.len() != view.columns.len() {
        return Err(ctx.structural(format!(
            "json_tuple extracts {} field(s) into {} column(s)",
            fields.len(),
            view.columns.len()
        )));
    }
    let select = fields
        .iter()
        .zip(&view.columns)
        .map(|(field, column)| format!("GET(PARSE_JSON({}), {})::VARCHAR AS {}", json, field, column))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("CROSS JOIN LATERAL (SELECT {}) {}", select, view.alias))
}
