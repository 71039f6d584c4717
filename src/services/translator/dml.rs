// DML Transformer
//
// INSERT targets, FROM-first multi-insert fan-out and UPDATE ... JOIN.

use super::error::ConversionError;
use super::expression::{self, render_name, table_name_after};
use super::lexer::{
    find_top_level, next_significant, render_trimmed, split_top_level_commas, trim_tokens, Cursor, Token,
};
use super::Context;
use crate::models::DiagnosticCode;

/// Clauses that follow the select list; the shared FROM goes before the first of them
const SELECT_TAIL: &[&str] = &[
    "WHERE", "GROUP", "HAVING", "WINDOW", "QUALIFY", "ORDER", "SORT", "CLUSTER", "DISTRIBUTE", "LIMIT",
    "UNION", "LATERAL",
];

/// `[WITH ...] INSERT {OVERWRITE | INTO} [TABLE] t [PARTITION (...)] [(cols)] query`
pub fn insert(tokens: &[Token], ctx: &mut Context) -> Result<String, ConversionError> {
    let insert_at = find_top_level(tokens, 0, &["INSERT"])
        .ok_or_else(|| ctx.structural("Expected INSERT"))?;
    let cte = trim_tokens(&tokens[..insert_at]);
    if !cte.is_empty() && !cte[0].is_word("WITH") {
        return Err(ctx.structural(format!("Unexpected {} before INSERT", cte[0].text)));
    }

    let mut c = Cursor::new(&tokens[insert_at..]);
    let head = insert_head(&mut c, ctx)?;
    let query = trim_tokens(c.rest());
    if query.is_empty() {
        return Err(ctx.structural("INSERT without a query or VALUES"));
    }
    let query = expression::translate(query, ctx)?;

    if cte.is_empty() {
        Ok(format!("{} {}", head, query))
    } else {
        let cte = expression::translate(cte, ctx)?;
        Ok(format!("{} {} {}", head, cte, query))
    }
}

/// Parse the INSERT target and render the Snowflake head. Leaves the cursor
/// at the start of the query.
fn insert_head(c: &mut Cursor, ctx: &mut Context) -> Result<String, ConversionError> {
    if !c.eat("INSERT") {
        return Err(ctx.structural("Expected INSERT"));
    }
    let overwrite = if c.eat("OVERWRITE") {
        true
    } else if c.eat("INTO") {
        false
    } else {
        return Err(ctx.structural("Expected OVERWRITE or INTO after INSERT"));
    };
    c.eat("TABLE");

    let name = c.name().ok_or_else(|| ctx.structural("Missing INSERT target table"))?;
    ctx.diagnostics.table(&name);

    if c.eat("PARTITION") {
        let spec = c.group().ok_or_else(|| ctx.structural("Malformed PARTITION clause"))?;
        drop_partition(spec, ctx)?;
    }
    if c.eat_sequence(&["IF", "NOT", "EXISTS"]) {
        ctx.diagnostics
            .warn(DiagnosticCode::DroppedClause, "IF NOT EXISTS dropped from INSERT");
    }

    let mut head = format!(
        "INSERT {} {}",
        if overwrite { "OVERWRITE INTO" } else { "INTO" },
        render_name(&name)
    );

    let is_column_list = c.peek().is_some_and(|t| t.is_punct('('))
        && !c.clone().group().is_some_and(|inner| {
            next_significant(inner, 0).is_some_and(|i| inner[i].is_any_word(&["SELECT", "WITH"]))
        });
    if is_column_list {
        let columns = c.group().ok_or_else(|| ctx.structural("Unbalanced column list"))?;
        head.push_str(&format!(" ({})", expression::translate(columns, ctx)?));
    }
    Ok(head)
}

/// Partition specs have no target equivalent; literal values mean the
/// source filtered or tagged rows by partition, which is lost
fn drop_partition(spec: &[Token], ctx: &mut Context) -> Result<(), ConversionError> {
    let mut literal = Vec::new();
    for part in split_top_level_commas(spec) {
        let part = trim_tokens(part);
        match part {
            [] => return Err(ctx.structural("Empty partition column")),
            [column] if column.is_identifier() => {}
            [column, rest @ ..] if column.is_identifier() => {
                let mut r = Cursor::new(rest);
                if !r.eat_punct('=') || r.is_done() {
                    return Err(ctx.structural(format!("Malformed partition column {}", render_trimmed(part))));
                }
                literal.push(format!(
                    "{}={}",
                    column.identifier_name(),
                    expression::translate_argument(r.rest(), ctx)?
                ));
            }
            _ => return Err(ctx.structural(format!("Malformed partition column {}", render_trimmed(part)))),
        }
    }
    if !literal.is_empty() {
        ctx.diagnostics.warn(
            DiagnosticCode::DroppedClause,
            format!(
                "Static partition value {} dropped; the target column is not filled or filtered by it",
                literal.join(", ")
            ),
        );
    }
    Ok(())
}

/// `FROM src INSERT ... SELECT ... [INSERT ... SELECT ...]` becomes one
/// INSERT per branch, each with the shared FROM. Without INSERT it is a
/// plain `SELECT ... FROM src ...`.
pub fn from_first(tokens: &[Token], ctx: &mut Context) -> Result<Vec<String>, ConversionError> {
    let from_at = next_significant(tokens, 0)
        .filter(|&i| tokens[i].is_word("FROM"))
        .ok_or_else(|| ctx.structural("Expected FROM"))?;

    let first_insert = find_top_level(tokens, from_at + 1, &["INSERT"]);
    let first_select = find_top_level(tokens, from_at + 1, &["SELECT"]);
    let body_at = match (first_insert, first_select) {
        (Some(i), Some(s)) => i.min(s),
        (Some(i), None) => i,
        (None, Some(s)) => s,
        (None, None) => return Err(ctx.structural("FROM without INSERT or SELECT")),
    };

    let source = trim_tokens(&tokens[from_at..body_at]);
    if source.len() < 2 {
        return Err(ctx.structural("FROM without a source"));
    }
    let from_clause = expression::translate(source, ctx)?;

    if !tokens[body_at].is_word("INSERT") {
        if first_insert.is_some() {
            return Err(ctx.structural("SELECT before INSERT in a multi-insert"));
        }
        return select_with_from(&tokens[body_at..], &from_clause, ctx).map(|sql| vec![sql]);
    }

    let mut starts = vec![body_at];
    while let Some(next) = find_top_level(tokens, starts[starts.len() - 1] + 1, &["INSERT"]) {
        starts.push(next);
    }

    let mut statements = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(tokens.len());
        ctx.begin_query();
        let mut c = Cursor::new(&tokens[start..end]);
        let head = insert_head(&mut c, ctx)?;
        let select = select_with_from(c.rest(), &from_clause, ctx)?;
        statements.push(format!("{} {}", head, select));
    }

    if statements.len() > 1 {
        tracing::debug!(
            "Statement {} fanned out into {} inserts",
            ctx.index,
            statements.len()
        );
    }
    Ok(statements)
}

/// Place the shared FROM clause after a branch's select list
fn select_with_from(branch: &[Token], from_clause: &str, ctx: &mut Context) -> Result<String, ConversionError> {
    let branch = trim_tokens(branch);
    if !branch.first().is_some_and(|t| t.is_word("SELECT")) {
        return Err(ctx.structural("Multi-insert branch without SELECT"));
    }

    let tail_at = first_top_level_word(branch, 1, SELECT_TAIL).unwrap_or(branch.len());
    let select = expression::translate(&branch[..tail_at], ctx)?;
    let tail = expression::translate(&branch[tail_at..], ctx)?;

    let sep = if select.ends_with('\n') { "" } else { " " };
    let mut sql = format!("{}{}{}", select, sep, from_clause);
    if !tail.is_empty() {
        sql.push(' ');
        sql.push_str(&tail);
    }
    Ok(sql)
}

fn first_top_level_word(tokens: &[Token], from: usize, words: &[&str]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(from) {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && token.is_any_word(words) {
            return Some(i);
        }
    }
    None
}

/// `UPDATE t [a] [INNER] JOIN s [b] ON cond SET ... [WHERE filter]` becomes
/// a MERGE; any other UPDATE only gets expression rewrites
pub fn update(tokens: &[Token], ctx: &mut Context) -> Result<String, ConversionError> {
    let set_at = find_top_level(tokens, 0, &["SET"]).ok_or_else(|| ctx.structural("UPDATE without SET"))?;
    let Some(join_at) = find_top_level(&tokens[..set_at], 0, &["JOIN"]) else {
        return expression::translate(tokens, ctx);
    };

    let mut head = Cursor::new(&tokens[..join_at]);
    if !head.eat("UPDATE") {
        return Err(ctx.structural("Expected UPDATE"));
    }
    let target = head.name().ok_or_else(|| ctx.structural("Missing UPDATE target table"))?;
    ctx.diagnostics.table(&target);
    head.eat("AS");
    let alias = match head.peek() {
        Some(t) if t.is_identifier() && !t.is_any_word(&["INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER"]) => {
            head.bump().map(|t| t.identifier_name())
        }
        _ => None,
    };
    head.eat("INNER");
    if !head.is_done() {
        return Err(ctx.structural(format!(
            "{} JOIN in UPDATE cannot become a MERGE",
            render_trimmed(head.rest())
        )));
    }

    let on_at = find_top_level(&tokens[..set_at], join_at, &["ON"])
        .ok_or_else(|| ctx.structural("UPDATE ... JOIN without ON"))?;
    let source = trim_tokens(&tokens[join_at + 1..on_at]);
    if source.is_empty() {
        return Err(ctx.structural("UPDATE ... JOIN without a source"));
    }
    if let Some(name) = table_name_after(tokens, join_at + 1) {
        ctx.diagnostics.table(&name);
    }
    let source = expression::translate(source, ctx)?;

    let condition = trim_tokens(&tokens[on_at + 1..set_at]);
    if condition.is_empty() {
        return Err(ctx.structural("UPDATE ... JOIN with an empty ON condition"));
    }
    let condition = expression::translate(condition, ctx)?;

    let where_at = find_top_level(tokens, set_at, &["WHERE"]);
    let assignments = &tokens[set_at + 1..where_at.unwrap_or(tokens.len())];
    let assignments = merge_assignments(assignments, &target, alias.as_deref(), ctx)?;

    let mut sql = format!("MERGE INTO {}", render_name(&target));
    if let Some(alias) = &alias {
        sql.push(' ');
        sql.push_str(&expression::render_identifier(alias));
    }
    sql.push_str(&format!(" USING {} ON {} WHEN MATCHED", source, condition));

    if let Some(where_at) = where_at {
        let filter_tokens = trim_tokens(&tokens[where_at + 1..]);
        if filter_tokens.is_empty() {
            return Err(ctx.structural("UPDATE with an empty WHERE"));
        }
        let filter = expression::translate(filter_tokens, ctx)?;
        if find_top_level(filter_tokens, 0, &["OR"]).is_some() {
            sql.push_str(&format!(" AND ({})", filter));
        } else {
            sql.push_str(&format!(" AND {}", filter));
        }
    }
    sql.push_str(" THEN UPDATE SET ");
    sql.push_str(&assignments);

    ctx.diagnostics.warn(
        DiagnosticCode::ApproximateSemantics,
        "UPDATE ... JOIN rewritten to MERGE; Snowflake fails when a target row matches several source rows",
    );
    Ok(sql)
}

/// Translate `col = expr` pairs, dropping the target qualifier from each column
fn merge_assignments(
    tokens: &[Token],
    target: &str,
    alias: Option<&str>,
    ctx: &mut Context,
) -> Result<String, ConversionError> {
    let qualifier = alias.unwrap_or_else(|| target.rsplit('.').next().unwrap_or(target));
    let mut rendered = Vec::new();

    for part in split_top_level_commas(tokens) {
        let part = trim_tokens(part);
        let eq = part
            .iter()
            .position(|t| t.is_punct('='))
            .ok_or_else(|| ctx.structural(format!("Malformed SET assignment '{}'", render_trimmed(part))))?;
        let column = match trim_tokens(&part[..eq]) {
            [q, dot, col] if dot.is_punct('.') && q.identifier_name().eq_ignore_ascii_case(qualifier) => {
                col.identifier_name()
            }
            [col] if col.is_identifier() => col.identifier_name(),
            other => {
                return Err(ctx.structural(format!(
                    "Unexpected SET target '{}'",
                    render_trimmed(other)
                )))
            }
        };
        let value = expression::translate_argument(&part[eq + 1..], ctx)?;
        if value.is_empty() {
            return Err(ctx.structural(format!("SET {} has no value", column)));
        }
        rendered.push(format!("{} = {}", expression::render_identifier(&column), value));
    }

    if rendered.is_empty() {
        return Err(ctx.structural("UPDATE with an empty SET list"));
    }
    Ok(rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::translator::lexer::tokenize;
    use crate::services::translator::MappingTables;
    use pretty_assertions::assert_eq;

    fn ctx() -> Context<'static> {
        Context::new(0, MappingTables::shared())
    }

    #[test]
    fn test_insert_overwrite_with_static_partition() {
        let mut ctx = ctx();
        let out = insert(
            &tokenize("INSERT OVERWRITE TABLE t PARTITION(dt='2024-01-01') SELECT * FROM s").unwrap(),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out, "INSERT OVERWRITE INTO t SELECT * FROM s");
        let warnings = ctx.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, DiagnosticCode::DroppedClause);
        assert!(warnings[0].message.contains("dt='2024-01-01'"));
    }

    #[test]
    fn test_insert_dynamic_partition_and_columns() {
        let mut ctx = ctx();
        let out = insert(
            &tokenize("INSERT INTO TABLE db.t PARTITION (dt) (a, b) SELECT a, b, dt FROM s").unwrap(),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out, "INSERT INTO db.t (a, b) SELECT a, b, dt FROM s");
        assert!(ctx.diagnostics.warnings().is_empty());

        let out = insert(&tokenize("insert into t values (1, \"x\")").unwrap(), &mut ctx).unwrap();
        assert_eq!(out, "INSERT INTO t values (1, 'x')");
    }

    #[test]
    fn test_insert_with_cte_prefix() {
        let mut ctx = ctx();
        let out = insert(
            &tokenize("WITH c AS (SELECT nvl(x, 0) AS x FROM s) INSERT OVERWRITE TABLE t SELECT x FROM c").unwrap(),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(
            out,
            "INSERT OVERWRITE INTO t WITH c AS (SELECT COALESCE(x, 0) AS x FROM s) SELECT x FROM c"
        );
    }

    #[test]
    fn test_multi_insert_fans_out_in_order() {
        let mut ctx = ctx();
        let out = from_first(
            &tokenize(
                "FROM src s \
                 INSERT OVERWRITE TABLE a SELECT s.x WHERE s.k = 1 \
                 INSERT INTO TABLE b PARTITION (dt) SELECT s.y, s.dt WHERE s.k = 2 \
                 INSERT INTO TABLE c SELECT count(*) GROUP BY s.z",
            )
            .unwrap(),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                "INSERT OVERWRITE INTO a SELECT s.x FROM src s WHERE s.k = 1",
                "INSERT INTO b SELECT s.y, s.dt FROM src s WHERE s.k = 2",
                "INSERT INTO c SELECT count(*) FROM src s GROUP BY s.z",
            ]
        );
    }

    #[test]
    fn test_sort_by_per_branch_is_allowed() {
        let mut ctx = ctx();
        let out = from_first(
            &tokenize("FROM src INSERT INTO a SELECT x SORT BY x INSERT INTO b SELECT y SORT BY y").unwrap(),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], "INSERT INTO b SELECT y FROM src ORDER BY y");
    }

    #[test]
    fn test_branch_comment_does_not_swallow_shared_from() {
        let mut ctx = ctx();
        let out = from_first(
            &tokenize("FROM src INSERT INTO a SELECT x -- note\n WHERE k = 1 INSERT INTO b SELECT y").unwrap(),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                "INSERT INTO a SELECT x -- note\nFROM src WHERE k = 1",
                "INSERT INTO b SELECT y FROM src",
            ]
        );
    }

    #[test]
    fn test_from_first_select() {
        let mut ctx = ctx();
        let out = from_first(&tokenize("FROM t SELECT a, b WHERE a > 1 LIMIT 5").unwrap(), &mut ctx).unwrap();
        assert_eq!(out, vec!["SELECT a, b FROM t WHERE a > 1 LIMIT 5"]);
    }

    #[test]
    fn test_update_join_becomes_merge() {
        let mut ctx = ctx();
        let out = update(
            &tokenize(
                "UPDATE t1 a JOIN t2 b ON (a.id = b.id AND a.k = b.k) \
                 SET a.v = b.v, a.n = (b.n + 1) WHERE b.flag = 1 OR b.force",
            )
            .unwrap(),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(
            out,
            "MERGE INTO t1 a USING t2 b ON (a.id = b.id AND a.k = b.k) WHEN MATCHED AND (b.flag = 1 OR b.force) \
             THEN UPDATE SET v = b.v, n = (b.n + 1)"
        );
        assert_eq!(ctx.diagnostics.warnings()[0].code, DiagnosticCode::ApproximateSemantics);
    }

    #[test]
    fn test_plain_update_and_bad_joins() {
        let mut ctx = ctx();
        let out = update(&tokenize("UPDATE t SET a = nvl(b, 0) WHERE c = \"x\"").unwrap(), &mut ctx).unwrap();
        assert_eq!(out, "UPDATE t SET a = COALESCE(b, 0) WHERE c = 'x'");

        let err = update(&tokenize("UPDATE t LEFT JOIN s ON t.id = s.id SET t.a = s.a").unwrap(), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ConversionError::Structural { .. }));

        let err = update(&tokenize("UPDATE t JOIN s ON (t.id = s.id SET t.a = s.a").unwrap(), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ConversionError::Structural { .. }));
    }
}
