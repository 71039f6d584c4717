// DDL Transformer
//
// CREATE TABLE is parsed into a `TableDefinition` and rebuilt from it, never
// patched in place, so running the output through again only changes
// formatting. ALTER, DROP and TRUNCATE are rewritten clause by clause.

use super::error::ConversionError;
use super::expression::{self, render_identifier, render_name, single_quoted};
use super::lexer::{
    render_compact, render_trimmed, split_top_level_commas, trim_tokens, unquote, Cursor, Token,
    TokenKind,
};
use super::Context;
use crate::models::{ColumnDefinition, DiagnosticCode, TableDefinition, TypeDescriptor};

/// Words that end a column's type
const COLUMN_TAIL: &[&str] = &[
    "COMMENT", "NOT", "NULL", "DEFAULT", "PRIMARY", "UNIQUE", "CHECK", "CONSTRAINT", "REFERENCES",
];

const TABLE_CONSTRAINTS: &[&str] = &["CONSTRAINT", "PRIMARY", "FOREIGN", "UNIQUE", "CHECK"];

/// Words that start a table clause after the column list
const TABLE_CLAUSES: &[&str] = &[
    "COMMENT", "PARTITIONED", "CLUSTERED", "CLUSTER", "SKEWED", "ROW", "STORED", "LOCATION",
    "TBLPROPERTIES", "STAGE_FILE_FORMAT", "AS",
];

/// Hive storage format to Snowflake file format type
fn stage_format(source: &str) -> Option<&'static str> {
    match source.to_ascii_uppercase().as_str() {
        "ORC" => Some("ORC"),
        "PARQUET" => Some("PARQUET"),
        "AVRO" => Some("AVRO"),
        "TEXTFILE" | "CSV" => Some("CSV"),
        "JSONFILE" | "JSON" => Some("JSON"),
        "XML" => Some("XML"),
        _ => None,
    }
}

const DEFAULT_STAGE_FORMAT: &str = "PARQUET";

pub fn create_table(tokens: &[Token], ctx: &mut Context) -> Result<String, ConversionError> {
    let definition = parse_create_table(tokens, ctx)?;
    let sql = render_table(&definition, ctx);
    ctx.table = Some(definition);
    Ok(sql)
}

/// Parse `CREATE [TEMPORARY] [EXTERNAL] TABLE ...` into a table definition
pub fn parse_create_table(tokens: &[Token], ctx: &mut Context) -> Result<TableDefinition, ConversionError> {
    let mut c = Cursor::new(tokens);
    if !c.eat("CREATE") {
        return Err(ctx.structural("Expected CREATE"));
    }
    let temporary = c.eat("TEMPORARY") || c.eat("TEMP");
    let external = c.eat("EXTERNAL");
    if !c.eat("TABLE") {
        return Err(ctx.structural("Expected TABLE"));
    }
    if c.eat_sequence(&["IF", "NOT", "EXISTS"]) {
        ctx.diagnostics
            .warn(DiagnosticCode::DroppedClause, "IF NOT EXISTS dropped from CREATE TABLE");
    }
    let name = c.name().ok_or_else(|| ctx.structural("Missing table name"))?;
    ctx.diagnostics.table(&name);

    let mut table = TableDefinition::new(name);
    table.temporary = temporary;
    table.external = external;
    if external {
        ctx.diagnostics.warn(
            DiagnosticCode::LossyTranslation,
            "EXTERNAL table created as a Snowflake managed table",
        );
    }

    if c.eat("LIKE") {
        let like = c.name().ok_or_else(|| ctx.structural("Missing table name after LIKE"))?;
        ctx.diagnostics.table(&like);
        table.like = Some(like);
    } else if c.peek().is_some_and(|t| t.is_punct('(')) {
        let group = c.group().ok_or_else(|| ctx.structural("Unbalanced column list"))?;
        table.columns = parse_columns(group, ctx)?;
    }

    parse_table_clauses(&mut c, &mut table, ctx)?;

    if table.columns.is_empty() && table.like.is_none() && table.as_query.is_none() {
        return Err(ctx.structural("CREATE TABLE without columns"));
    }

    if table.cluster_columns.is_empty() && !table.partition_columns.is_empty() {
        table.cluster_columns = table.partition_columns.iter().map(|col| col.name.clone()).collect();
        ctx.diagnostics.warn(
            DiagnosticCode::LossyTranslation,
            format!(
                "PARTITIONED BY ({}) folded into the column list and CLUSTER BY",
                table.cluster_columns.join(", ")
            ),
        );
    }

    Ok(table)
}

fn parse_table_clauses(c: &mut Cursor, table: &mut TableDefinition, ctx: &mut Context) -> Result<(), ConversionError> {
    while let Some(token) = c.peek() {
        if c.eat("COMMENT") {
            c.eat_punct('=');
            table.comment = Some(string_literal(c, ctx, "COMMENT")?);
        } else if c.eat_sequence(&["PARTITIONED", "BY"]) {
            let group = c.group().ok_or_else(|| ctx.structural("Malformed PARTITIONED BY"))?;
            table.partition_columns = parse_columns(group, ctx)?;
        } else if c.eat_sequence(&["CLUSTERED", "BY"]) {
            let group = c.group().ok_or_else(|| ctx.structural("Malformed CLUSTERED BY"))?;
            table.cluster_columns = column_names(group, ctx)?;
            if c.eat_sequence(&["SORTED", "BY"]) {
                c.group().ok_or_else(|| ctx.structural("Malformed SORTED BY"))?;
                ctx.diagnostics
                    .warn(DiagnosticCode::DroppedClause, "SORTED BY dropped from CLUSTERED BY");
            }
            if c.eat("INTO") {
                let count = c
                    .bump()
                    .filter(|t| t.kind == TokenKind::Number)
                    .and_then(|t| t.text.parse::<u32>().ok())
                    .ok_or_else(|| ctx.structural("Expected bucket count"))?;
                if !c.eat("BUCKETS") {
                    return Err(ctx.structural("Expected BUCKETS"));
                }
                table.bucket_count = Some(count);
                ctx.diagnostics.warn(
                    DiagnosticCode::DroppedClause,
                    format!("Bucket count {} dropped; CLUSTERED BY columns kept as the clustering key", count),
                );
            }
        } else if c.eat_sequence(&["CLUSTER", "BY"]) {
            let group = c.group().ok_or_else(|| ctx.structural("Malformed CLUSTER BY"))?;
            table.cluster_columns = column_names(group, ctx)?;
        } else if c.eat_sequence(&["SKEWED", "BY"]) {
            c.group().ok_or_else(|| ctx.structural("Malformed SKEWED BY"))?;
            if c.eat("ON") {
                c.group().ok_or_else(|| ctx.structural("Malformed SKEWED BY ... ON"))?;
            }
            c.eat_sequence(&["STORED", "AS", "DIRECTORIES"]);
            ctx.diagnostics
                .warn(DiagnosticCode::DroppedClause, "SKEWED BY clause dropped");
        } else if c.eat_sequence(&["ROW", "FORMAT"]) {
            skip_to_clause(c);
            ctx.diagnostics
                .warn(DiagnosticCode::DroppedClause, "ROW FORMAT clause dropped");
        } else if c.eat_sequence(&["STORED", "AS"]) {
            let format = if c.eat("INPUTFORMAT") {
                string_literal(c, ctx, "INPUTFORMAT")?;
                if c.eat("OUTPUTFORMAT") {
                    string_literal(c, ctx, "OUTPUTFORMAT")?;
                }
                "INPUTFORMAT".to_string()
            } else {
                c.bump()
                    .filter(|t| t.kind == TokenKind::Word)
                    .map(|t| t.upper())
                    .ok_or_else(|| ctx.structural("Expected storage format after STORED AS"))?
            };
            ctx.diagnostics.warn(
                DiagnosticCode::DroppedClause,
                format!(
                    "STORED AS {} replaced by STAGE_FILE_FORMAT (TYPE = {})",
                    format,
                    stage_format(&format).unwrap_or(DEFAULT_STAGE_FORMAT)
                ),
            );
            table.storage_format = Some(format);
        } else if c.eat_sequence(&["STORED", "BY"]) {
            skip_to_clause(c);
            ctx.diagnostics
                .warn(DiagnosticCode::DroppedClause, "STORED BY storage handler dropped");
        } else if c.eat("LOCATION") {
            string_literal(c, ctx, "LOCATION")?;
            ctx.diagnostics
                .warn(DiagnosticCode::DroppedClause, "LOCATION clause dropped");
        } else if c.eat("TBLPROPERTIES") {
            c.group().ok_or_else(|| ctx.structural("Malformed TBLPROPERTIES"))?;
            ctx.diagnostics
                .warn(DiagnosticCode::DroppedClause, "TBLPROPERTIES clause dropped");
        } else if c.eat("STAGE_FILE_FORMAT") {
            c.eat_punct('=');
            let group = c.group().ok_or_else(|| ctx.structural("Malformed STAGE_FILE_FORMAT"))?;
            let mut inner = Cursor::new(group);
            if !(inner.eat("TYPE") && inner.eat_punct('=')) {
                return Err(ctx.structural("STAGE_FILE_FORMAT without TYPE"));
            }
            let format = inner
                .bump()
                .map(|t| t.upper())
                .ok_or_else(|| ctx.structural("STAGE_FILE_FORMAT without TYPE"))?;
            table.storage_format = Some(format);
        } else if c.eat("AS") {
            let query = trim_tokens(c.rest());
            table.as_query = Some(expression::translate(query, ctx)?);
            break;
        } else {
            return Err(ctx.structural(format!("Unrecognized table clause {}", token.text)));
        }
    }
    Ok(())
}

/// Advance past a free-form clause body up to the next table clause
fn skip_to_clause(c: &mut Cursor) {
    while let Some(token) = c.peek() {
        if token.is_any_word(TABLE_CLAUSES) {
            if !token.is_word("AS") {
                break;
            }
            // `NULL DEFINED AS '\N'` inside ROW FORMAT is not a CTAS body
            let mut ahead = c.clone();
            ahead.bump();
            if ahead
                .peek()
                .is_some_and(|t| t.is_any_word(&["SELECT", "WITH", "FROM"]) || t.is_punct('('))
            {
                break;
            }
        }
        if token.is_punct('(') {
            c.group();
        } else {
            c.bump();
        }
    }
}

fn string_literal(c: &mut Cursor, ctx: &Context, clause: &str) -> Result<String, ConversionError> {
    c.bump()
        .filter(|t| t.kind == TokenKind::StringLit)
        .map(|t| single_quoted(&t.text))
        .ok_or_else(|| ctx.structural(format!("Expected a string after {}", clause)))
}

/// Split a definition list on commas outside `()` and `<>`
fn split_definitions<'t>(tokens: &'t [Token], ctx: &Context) -> Result<Vec<&'t [Token]>, ConversionError> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct('(') || token.is_punct('<') {
            depth += 1;
        } else if token.is_punct(')') || token.is_punct('>') {
            depth -= 1;
            if depth < 0 {
                return Err(ctx.structural("Unbalanced column list"));
            }
        } else if token.is_punct(',') && depth == 0 {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    if depth != 0 {
        return Err(ctx.structural("Unbalanced column list"));
    }
    parts.push(&tokens[start..]);
    Ok(parts)
}

/// Parse `name type [COMMENT '...']` entries; table constraints are dropped
pub fn parse_columns(tokens: &[Token], ctx: &mut Context) -> Result<Vec<ColumnDefinition>, ConversionError> {
    let mut columns = Vec::new();
    for part in split_definitions(tokens, ctx)? {
        let part = trim_tokens(part);
        if part.is_empty() {
            return Err(ctx.structural("Empty column definition"));
        }
        if part[0].is_any_word(TABLE_CONSTRAINTS) {
            ctx.diagnostics.warn(
                DiagnosticCode::DroppedClause,
                format!("Table constraint dropped: {}", render_trimmed(part)),
            );
            continue;
        }
        columns.push(parse_column(part, ctx)?);
    }
    Ok(columns)
}

fn parse_column(part: &[Token], ctx: &mut Context) -> Result<ColumnDefinition, ConversionError> {
    let name = column_name(&part[0])
        .ok_or_else(|| ctx.structural(format!("Expected column name, found {}", part[0].text)))?;

    let mut depth: i32 = 0;
    let mut type_end = part.len();
    for (i, token) in part.iter().enumerate().skip(1) {
        if token.is_punct('(') || token.is_punct('<') {
            depth += 1;
        } else if token.is_punct(')') || token.is_punct('>') {
            depth -= 1;
        } else if depth == 0 && token.is_any_word(COLUMN_TAIL) {
            type_end = i;
            break;
        }
    }
    let type_text = render_compact(&part[1..type_end]);
    if type_text.is_empty() {
        return Err(ctx.structural(format!("Column {} has no type", name)));
    }
    let data_type = TypeDescriptor::parse(&type_text)
        .ok_or_else(|| ctx.structural(format!("Cannot parse type '{}' of column {}", type_text, name)))?;

    let mut column = ColumnDefinition::new(name, data_type);
    let mut tail = Cursor::new(&part[type_end..]);
    if tail.eat("COMMENT") {
        column.comment = Some(string_literal(&mut tail, ctx, "COMMENT")?);
    }
    if !tail.is_done() {
        ctx.diagnostics.warn(
            DiagnosticCode::DroppedClause,
            format!(
                "Column constraint on {} dropped: {}",
                column.name,
                render_trimmed(tail.rest())
            ),
        );
    }
    Ok(column)
}

fn column_names(tokens: &[Token], ctx: &Context) -> Result<Vec<String>, ConversionError> {
    split_top_level_commas(tokens)
        .into_iter()
        .map(|part| match trim_tokens(part) {
            [single] => column_name(single),
            _ => None,
        }
        .ok_or_else(|| ctx.structural(format!("Expected a column name, found '{}'", render_trimmed(part)))))
        .collect()
}

/// Column names may come back double-quoted from an earlier translation
fn column_name(token: &Token) -> Option<String> {
    match token.kind {
        TokenKind::Word | TokenKind::QuotedIdent => Some(token.identifier_name()),
        TokenKind::StringLit if token.text.starts_with('"') => Some(unquote(&token.text, '"')),
        _ => None,
    }
}

fn render_column(column: &ColumnDefinition, ctx: &mut Context) -> String {
    let mut sql = format!("{} {}", render_identifier(&column.name), ctx.map_type(&column.data_type));
    if let Some(comment) = &column.comment {
        sql.push_str(" COMMENT ");
        sql.push_str(comment);
    }
    sql
}

/// Rebuild the target CREATE TABLE from a parsed definition
pub fn render_table(table: &TableDefinition, ctx: &mut Context) -> String {
    let mut sql = String::from("CREATE ");
    if table.temporary {
        sql.push_str("TEMPORARY ");
    }
    sql.push_str("TABLE ");
    sql.push_str(&render_name(&table.name));

    if let Some(like) = &table.like {
        sql.push_str(" LIKE ");
        sql.push_str(&render_name(like));
    } else if !table.columns.is_empty() || !table.partition_columns.is_empty() {
        let columns: Vec<String> = table
            .columns
            .iter()
            .chain(&table.partition_columns)
            .map(|column| render_column(column, ctx))
            .collect();
        sql.push_str(" (");
        sql.push_str(&columns.join(", "));
        sql.push(')');
    }

    if !table.cluster_columns.is_empty() {
        let columns: Vec<String> = table.cluster_columns.iter().map(|c| render_identifier(c)).collect();
        sql.push_str(&format!(" CLUSTER BY ({})", columns.join(", ")));
    }

    if let Some(format) = &table.storage_format {
        let target = match stage_format(format) {
            Some(target) => target,
            None => {
                ctx.diagnostics.warn(
                    DiagnosticCode::UnmappedFormat,
                    format!(
                        "Storage format {} has no Snowflake file format; using {}",
                        format, DEFAULT_STAGE_FORMAT
                    ),
                );
                DEFAULT_STAGE_FORMAT
            }
        };
        sql.push_str(&format!(" STAGE_FILE_FORMAT = (TYPE = {})", target));
    }

    if let Some(comment) = &table.comment {
        sql.push_str(" COMMENT = ");
        sql.push_str(comment);
    }

    if let Some(query) = &table.as_query {
        sql.push_str(" AS ");
        sql.push_str(query);
    }
    sql
}

/// `CREATE [OR REPLACE] VIEW [IF NOT EXISTS] name [(cols)] [COMMENT '..'] AS query`
pub fn create_view(tokens: &[Token], ctx: &mut Context) -> Result<String, ConversionError> {
    let mut c = Cursor::new(tokens);
    let mut sql = String::from("CREATE ");
    if !c.eat("CREATE") {
        return Err(ctx.structural("Expected CREATE"));
    }
    if c.eat_sequence(&["OR", "REPLACE"]) {
        sql.push_str("OR REPLACE ");
    }
    if !c.eat("VIEW") {
        return Err(ctx.structural("Expected VIEW"));
    }
    sql.push_str("VIEW ");
    if c.eat_sequence(&["IF", "NOT", "EXISTS"]) {
        sql.push_str("IF NOT EXISTS ");
    }
    let name = c.name().ok_or_else(|| ctx.structural("Missing view name"))?;
    ctx.diagnostics.table(&name);
    sql.push_str(&render_name(&name));

    if c.peek().is_some_and(|t| t.is_punct('(')) {
        let group = c.group().ok_or_else(|| ctx.structural("Unbalanced view column list"))?;
        sql.push_str(&format!(" ({})", expression::translate(group, ctx)?));
    }

    loop {
        if c.eat("COMMENT") {
            sql.push_str(&format!(" COMMENT = {}", string_literal(&mut c, ctx, "COMMENT")?));
        } else if c.eat("TBLPROPERTIES") {
            c.group().ok_or_else(|| ctx.structural("Malformed TBLPROPERTIES"))?;
            ctx.diagnostics
                .warn(DiagnosticCode::DroppedClause, "TBLPROPERTIES clause dropped");
        } else if c.eat("AS") {
            let query = expression::translate(trim_tokens(c.rest()), ctx)?;
            sql.push_str(" AS ");
            sql.push_str(&query);
            return Ok(sql);
        } else {
            let found = c.peek().map(|t| t.text.clone()).unwrap_or_else(|| "end of statement".to_string());
            return Err(ctx.structural(format!("Unexpected {} in CREATE VIEW", found)));
        }
    }
}

/// ALTER TABLE sub-forms; one source statement may become several
pub fn alter_table(tokens: &[Token], ctx: &mut Context) -> Result<Vec<String>, ConversionError> {
    let mut c = Cursor::new(tokens);
    if !c.eat_sequence(&["ALTER", "TABLE"]) {
        return Err(ctx.structural("Expected ALTER TABLE"));
    }
    let name = c.name().ok_or_else(|| ctx.structural("Missing table name"))?;
    ctx.diagnostics.table(&name);
    let table = render_name(&name);

    if c.eat_sequence(&["ADD", "COLUMNS"]) {
        let group = c.group().ok_or_else(|| ctx.structural("Malformed ADD COLUMNS"))?;
        let columns = parse_columns(group, ctx)?;
        if columns.is_empty() {
            return Err(ctx.structural("ADD COLUMNS without columns"));
        }
        let rendered: Vec<String> = columns.iter().map(|col| render_column(col, ctx)).collect();
        return Ok(vec![format!("ALTER TABLE {} ADD COLUMN {}", table, rendered.join(", "))]);
    }

    if c.eat_sequence(&["REPLACE", "COLUMNS"]) {
        return Err(ctx.unsupported("ALTER TABLE REPLACE COLUMNS"));
    }

    if c.eat("CHANGE") {
        c.eat("COLUMN");
        return change_column(&mut c, &table, ctx);
    }

    if c.eat_sequence(&["SET", "TBLPROPERTIES"]) {
        let group = c.group().ok_or_else(|| ctx.structural("Malformed TBLPROPERTIES"))?;
        return set_properties(group, &table, ctx).map(|sql| vec![sql]);
    }

    if c.eat_sequence(&["RENAME", "TO"]) {
        let target = c.name().ok_or_else(|| ctx.structural("Missing new table name"))?;
        ctx.diagnostics.table(&target);
        return Ok(vec![format!("ALTER TABLE {} RENAME TO {}", table, render_name(&target))]);
    }

    let form = c.peek().map(|t| t.upper()).unwrap_or_default();
    ctx.diagnostics.unsupported(format!("ALTER TABLE {}", form).trim_end());
    ctx.diagnostics.warn(
        DiagnosticCode::UnsupportedConstruct,
        format!("ALTER TABLE {} passed through unchanged", form),
    );
    Ok(vec![render_trimmed(tokens)])
}

/// `CHANGE [COLUMN] old new type [COMMENT '..'] [FIRST | AFTER col] [CASCADE | RESTRICT]`
fn change_column(c: &mut Cursor, table: &str, ctx: &mut Context) -> Result<Vec<String>, ConversionError> {
    let old = c
        .bump()
        .and_then(column_name)
        .ok_or_else(|| ctx.structural("CHANGE COLUMN without a column name"))?;
    let new = c
        .bump()
        .and_then(column_name)
        .ok_or_else(|| ctx.structural("CHANGE COLUMN without a new column name"))?;

    let rest = trim_tokens(c.rest());
    let type_end = rest
        .iter()
        .position(|t| t.is_any_word(&["COMMENT", "FIRST", "AFTER", "CASCADE", "RESTRICT"]))
        .unwrap_or(rest.len());
    let data_type = ctx.map_type_tokens(&rest[..type_end])?;

    let mut tail = Cursor::new(&rest[type_end..]);
    let comment = if tail.eat("COMMENT") {
        Some(string_literal(&mut tail, ctx, "COMMENT")?)
    } else {
        None
    };
    if tail.eat("FIRST") || (tail.eat("AFTER") && tail.name().is_some()) {
        ctx.diagnostics.warn(
            DiagnosticCode::DroppedClause,
            "Column position (FIRST/AFTER) dropped; Snowflake cannot reorder columns",
        );
    }
    let _ = tail.eat("CASCADE") || tail.eat("RESTRICT");
    if !tail.is_done() {
        return Err(ctx.structural(format!("Unexpected {} in CHANGE COLUMN", render_trimmed(tail.rest()))));
    }

    let old_sql = render_identifier(&old);
    let new_sql = render_identifier(&new);
    let mut statements = Vec::new();
    if !old.eq_ignore_ascii_case(&new) {
        statements.push(format!("ALTER TABLE {} RENAME COLUMN {} TO {}", table, old_sql, new_sql));
    }
    statements.push(format!(
        "ALTER TABLE {} ALTER COLUMN {} SET DATA TYPE {}",
        table, new_sql, data_type
    ));
    if let Some(comment) = comment {
        statements.push(format!("ALTER TABLE {} ALTER COLUMN {} COMMENT {}", table, new_sql, comment));
    }
    Ok(statements)
}

/// Table properties become the table comment
fn set_properties(group: &[Token], table: &str, ctx: &mut Context) -> Result<String, ConversionError> {
    let mut comment = None;
    let mut others = Vec::new();

    for part in split_top_level_commas(group) {
        let mut p = Cursor::new(part);
        let key = p.bump().filter(|t| t.kind == TokenKind::StringLit);
        let eq = p.eat_punct('=');
        let value = p.bump().filter(|t| t.kind == TokenKind::StringLit);
        let (Some(key), true, Some(value), true) = (key, eq, value, p.is_done()) else {
            return Err(ctx.structural(format!("Malformed table property '{}'", render_trimmed(part))));
        };
        let key = literal_text(key);
        if key.eq_ignore_ascii_case("comment") {
            comment = Some(single_quoted(&value.text));
        } else {
            others.push((key, literal_text(value)));
        }
    }

    let comment = match comment {
        Some(comment) => {
            if !others.is_empty() {
                let keys: Vec<&str> = others.iter().map(|(k, _)| k.as_str()).collect();
                ctx.diagnostics.warn(
                    DiagnosticCode::DroppedClause,
                    format!("Table properties dropped: {}", keys.join(", ")),
                );
            }
            comment
        }
        None => {
            let folded: Vec<String> = others.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            ctx.diagnostics.warn(
                DiagnosticCode::LossyTranslation,
                "Table properties stored in the table comment",
            );
            quote_literal(&folded.join(", "))
        }
    };
    Ok(format!("ALTER TABLE {} SET COMMENT = {}", table, comment))
}

fn literal_text(token: &Token) -> String {
    let quote = token.text.chars().next().unwrap_or('\'');
    unquote(&token.text, quote)
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// `DROP TABLE [IF EXISTS] name [PURGE]`
pub fn drop_table(tokens: &[Token], ctx: &mut Context) -> Result<String, ConversionError> {
    let mut c = Cursor::new(tokens);
    if !c.eat_sequence(&["DROP", "TABLE"]) {
        return Err(ctx.structural("Expected DROP TABLE"));
    }
    let if_exists = c.eat_sequence(&["IF", "EXISTS"]);
    let name = c.name().ok_or_else(|| ctx.structural("Missing table name"))?;
    ctx.diagnostics.table(&name);
    if c.eat("PURGE") {
        ctx.diagnostics.warn(
            DiagnosticCode::DroppedClause,
            "PURGE dropped; the table stays recoverable through Time Travel",
        );
    }
    if !c.is_done() {
        return Err(ctx.structural(format!("Unexpected {} in DROP TABLE", render_trimmed(c.rest()))));
    }
    Ok(format!(
        "DROP TABLE {}{}",
        if if_exists { "IF EXISTS " } else { "" },
        render_name(&name)
    ))
}

/// `TRUNCATE [TABLE] name [PARTITION (k = v, ...)]`; a partition becomes a DELETE
pub fn truncate_table(tokens: &[Token], ctx: &mut Context) -> Result<String, ConversionError> {
    let mut c = Cursor::new(tokens);
    if !c.eat("TRUNCATE") {
        return Err(ctx.structural("Expected TRUNCATE"));
    }
    c.eat("TABLE");
    let name = c.name().ok_or_else(|| ctx.structural("Missing table name"))?;
    ctx.diagnostics.table(&name);
    let table = render_name(&name);

    if !c.eat("PARTITION") {
        if !c.is_done() {
            return Err(ctx.structural(format!("Unexpected {} in TRUNCATE", render_trimmed(c.rest()))));
        }
        return Ok(format!("TRUNCATE TABLE {}", table));
    }

    let group = c.group().ok_or_else(|| ctx.structural("Malformed PARTITION spec"))?;
    let mut conditions = Vec::new();
    for part in split_top_level_commas(group) {
        let part = trim_tokens(part);
        let eq = part.iter().position(|t| t.is_punct('='));
        let (Some(eq), Some(column)) = (eq, part.first().filter(|t| t.is_identifier())) else {
            return Err(ctx.structural(format!(
                "Partition column {} has no value",
                render_trimmed(part)
            )));
        };
        let value = expression::translate_argument(&part[eq + 1..], ctx)?;
        if value.is_empty() {
            return Err(ctx.structural("Partition value missing"));
        }
        conditions.push(format!("{} = {}", render_identifier(&column.identifier_name()), value));
    }
    Ok(format!("DELETE FROM {} WHERE {}", table, conditions.join(" AND ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::translator::lexer::tokenize;
    use crate::services::translator::MappingTables;
    use pretty_assertions::assert_eq;

    fn create(sql: &str) -> (String, TableDefinition, Vec<DiagnosticCode>) {
        let mut ctx = Context::new(0, MappingTables::shared());
        let out = create_table(&tokenize(sql).unwrap(), &mut ctx).unwrap();
        let codes = ctx.diagnostics.warnings().iter().map(|w| w.code).collect();
        (out, ctx.table.unwrap(), codes)
    }

    fn alter(sql: &str) -> Vec<String> {
        let mut ctx = Context::new(0, MappingTables::shared());
        alter_table(&tokenize(sql).unwrap(), &mut ctx).unwrap()
    }

    #[test]
    fn test_partitioned_orc_table() {
        let (out, table, codes) =
            create("CREATE TABLE t (a INT, b STRING) PARTITIONED BY (d STRING) STORED AS ORC");
        assert_eq!(
            out,
            "CREATE TABLE t (a NUMBER(10,0), b VARCHAR, d VARCHAR) CLUSTER BY (d) STAGE_FILE_FORMAT = (TYPE = ORC)"
        );
        assert_eq!(table.column_names(), vec!["a", "b", "d"]);
        assert!(codes.contains(&DiagnosticCode::DroppedClause));
    }

    #[test]
    fn test_external_table_clauses_dropped() {
        let (out, _, codes) = create(
            "CREATE EXTERNAL TABLE IF NOT EXISTS db.events (\
               id BIGINT COMMENT 'event id', payload MAP<STRING,STRING>, tags ARRAY<STRING>, \
               price DECIMAL(12,2)) \
             COMMENT 'raw events' \
             CLUSTERED BY (id) SORTED BY (id) INTO 32 BUCKETS \
             ROW FORMAT DELIMITED FIELDS TERMINATED BY ',' NULL DEFINED AS '' \
             STORED AS SEQUENCEFILE \
             LOCATION 's3://bucket/events' \
             TBLPROPERTIES ('transactional'='false')",
        );
        assert_eq!(
            out,
            "CREATE TABLE db.events (id NUMBER(19,0) COMMENT 'event id', payload OBJECT, tags ARRAY, price NUMBER(12,2)) \
             CLUSTER BY (id) STAGE_FILE_FORMAT = (TYPE = PARQUET) COMMENT = 'raw events'"
        );
        let lossy = codes.iter().filter(|c| **c == DiagnosticCode::LossyTranslation).count();
        // EXTERNAL plus one composite-type warning for the whole statement
        assert_eq!(lossy, 2);
        assert!(codes.contains(&DiagnosticCode::UnmappedFormat));
    }

    #[test]
    fn test_reconstruction_is_idempotent() {
        let (first, table, _) = create(
            "CREATE TEMPORARY TABLE s.t (`order` INT, ts TIMESTAMP, m MAP<STRING,INT> COMMENT \"x\") \
             PARTITIONED BY (dt STRING, hr INT) STORED AS PARQUET TBLPROPERTIES ('a'='b')",
        );
        let (second, again, _) = create(&first);
        assert_eq!(first, second);
        assert_eq!(table.column_names(), again.column_names());
    }

    #[test]
    fn test_nested_types_not_split() {
        let (_, table, _) = create("CREATE TABLE t (s STRUCT<a:INT,b:MAP<STRING,DECIMAL(10,2)>>, n INT)");
        assert_eq!(table.column_names(), vec!["s", "n"]);
        assert_eq!(table.columns[0].data_type.name, "STRUCT");
    }

    #[test]
    fn test_ctas_and_like() {
        let (out, _, _) = create("CREATE TABLE t STORED AS ORC AS SELECT nvl(a, 0) AS a FROM s");
        assert_eq!(out, "CREATE TABLE t STAGE_FILE_FORMAT = (TYPE = ORC) AS SELECT COALESCE(a, 0) AS a FROM s");

        let (out, _, _) = create("CREATE TABLE t2 LIKE t1 LOCATION '/x'");
        assert_eq!(out, "CREATE TABLE t2 LIKE t1");
    }

    #[test]
    fn test_unbalanced_column_list_is_structural() {
        let mut ctx = Context::new(3, MappingTables::shared());
        let err = create_table(&tokenize("CREATE TABLE t (a MAP<STRING,INT, b INT)").unwrap(), &mut ctx).unwrap_err();
        assert!(matches!(err, ConversionError::Structural { statement: 3, .. }));
    }

    #[test]
    fn test_alter_table_forms() {
        assert_eq!(
            alter("ALTER TABLE t ADD COLUMNS (c1 STRING COMMENT 'x', c2 BIGINT) CASCADE"),
            vec!["ALTER TABLE t ADD COLUMN c1 VARCHAR COMMENT 'x', c2 NUMBER(19,0)"]
        );
        assert_eq!(
            alter("ALTER TABLE t CHANGE COLUMN old_name new_name DOUBLE COMMENT 'renamed' AFTER c1"),
            vec![
                "ALTER TABLE t RENAME COLUMN old_name TO new_name",
                "ALTER TABLE t ALTER COLUMN new_name SET DATA TYPE FLOAT",
                "ALTER TABLE t ALTER COLUMN new_name COMMENT 'renamed'",
            ]
        );
        assert_eq!(
            alter("ALTER TABLE t SET TBLPROPERTIES ('comment' = 'daily snapshot')"),
            vec!["ALTER TABLE t SET COMMENT = 'daily snapshot'"]
        );
        assert_eq!(
            alter("ALTER TABLE t SET TBLPROPERTIES ('owner'='etl', 'ttl'='30')"),
            vec!["ALTER TABLE t SET COMMENT = 'owner=etl, ttl=30'"]
        );
        assert_eq!(alter("ALTER TABLE t RENAME TO t_old"), vec!["ALTER TABLE t RENAME TO t_old"]);
    }

    #[test]
    fn test_unknown_alter_passes_through() {
        let mut ctx = Context::new(0, MappingTables::shared());
        let out = alter_table(
            &tokenize("ALTER TABLE t ADD PARTITION (dt='2024-01-01')").unwrap(),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out, vec!["ALTER TABLE t ADD PARTITION (dt='2024-01-01')"]);
        assert_eq!(ctx.diagnostics.warnings()[0].code, DiagnosticCode::UnsupportedConstruct);
    }

    #[test]
    fn test_drop_and_truncate() {
        let mut ctx = Context::new(0, MappingTables::shared());
        assert_eq!(
            drop_table(&tokenize("DROP TABLE IF EXISTS db.t PURGE").unwrap(), &mut ctx).unwrap(),
            "DROP TABLE IF EXISTS db.t"
        );
        assert_eq!(
            truncate_table(
                &tokenize("TRUNCATE TABLE t PARTITION (dt = \"2024-01-01\", hr = 3)").unwrap(),
                &mut ctx
            )
            .unwrap(),
            "DELETE FROM t WHERE dt = '2024-01-01' AND hr = 3"
        );
        assert!(truncate_table(&tokenize("TRUNCATE TABLE t PARTITION (dt)").unwrap(), &mut ctx).is_err());
    }
}
