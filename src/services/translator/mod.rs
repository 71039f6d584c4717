// Hive to Snowflake Translation Engine
//
// Pure, synchronous text-to-text translation. The mapping tables are built
// once and shared read-only; everything else is scoped to one statement
// (`Context`) or one request (`Diagnostics`).

pub mod classifier;
pub mod ddl;
pub mod diagnostics;
pub mod dml;
pub mod error;
pub mod expression;
pub mod formatter;
pub mod function_mapper;
pub mod lateral;
pub mod lexer;
pub mod preprocessor;
pub mod segmenter;
pub mod type_mapper;
pub mod window;

use once_cell::sync::Lazy;

pub use classifier::{classify, dispatch, Route};
pub use diagnostics::{Diagnostics, StatementDiagnostics};
pub use error::{ConversionError, LexicalErrorKind};
pub use formatter::format_statement;
pub use function_mapper::{CallMapping, FunctionMapper, FunctionRule};
pub use preprocessor::preprocess;
pub use segmenter::{split_statements, RawStatement, Segmenter};
pub use type_mapper::{TypeMapper, TypeMapping};

use crate::models::{DiagnosticCode, Statement, TableDefinition, TypeDescriptor};
use lexer::{render_compact, tokenize, Token};
use tracing::debug;

/// Immutable lookup tables shared by every request
pub struct MappingTables {
    pub types: TypeMapper,
    pub functions: FunctionMapper,
}

static SHARED_TABLES: Lazy<MappingTables> = Lazy::new(MappingTables::new);

impl MappingTables {
    pub fn new() -> Self {
        Self {
            types: TypeMapper::new(),
            functions: FunctionMapper::new(),
        }
    }

    /// Process-wide tables, built on first use
    pub fn shared() -> &'static MappingTables {
        &SHARED_TABLES
    }
}

impl Default for MappingTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Translation state for a single statement
pub struct Context<'a> {
    pub index: usize,
    pub tables: &'a MappingTables,
    pub diagnostics: StatementDiagnostics,
    /// Structure parsed from a CREATE TABLE statement
    pub table: Option<TableDefinition>,
    query_clauses: usize,
}

impl<'a> Context<'a> {
    pub fn new(index: usize, tables: &'a MappingTables) -> Self {
        Self {
            index,
            tables,
            diagnostics: StatementDiagnostics::new(index),
            table: None,
            query_clauses: 0,
        }
    }

    pub fn structural(&self, message: impl Into<String>) -> ConversionError {
        ConversionError::structural(self.index, message)
    }

    pub fn unsupported(&self, construct: impl Into<String>) -> ConversionError {
        ConversionError::unsupported(self.index, construct)
    }

    /// Map a source type, recording usage and any loss
    pub fn map_type(&mut self, source: &TypeDescriptor) -> String {
        self.diagnostics.type_used(&source.name);
        match self.tables.types.map(source) {
            TypeMapping::Mapped { text, dropped_args } => {
                if dropped_args {
                    self.diagnostics.warn_once(
                        "composite-type-arguments",
                        DiagnosticCode::LossyTranslation,
                        "Composite type arguments dropped: ARRAY, OBJECT and VARIANT are not parameterized in Snowflake",
                    );
                }
                text
            }
            // Unknown types pass through unchanged, warned once per type and statement
            TypeMapping::Unmapped(text) => {
                debug!("Type {} passed through unmapped", text);
                self.diagnostics.warn_once(
                    &format!("unmapped-type:{}", text.to_ascii_uppercase()),
                    DiagnosticCode::UnmappedType,
                    format!("Type {} has no Snowflake mapping and was passed through", text),
                );
                text
            }
        }
    }

    /// Map a type written as a token run, e.g. `DECIMAL ( 10 , 2 )`
    pub fn map_type_tokens(&mut self, tokens: &[Token]) -> Result<String, ConversionError> {
        let text = render_compact(tokens);
        let descriptor = TypeDescriptor::parse(&text)
            .ok_or_else(|| self.structural(format!("Cannot parse type '{}'", text)))?;
        Ok(self.map_type(&descriptor))
    }

    /// Start a new query block inside the same statement (fan-out branches)
    pub fn begin_query(&mut self) {
        self.query_clauses = 0;
    }

    /// Enter a nested query block; returns the outer block's clause count
    pub fn enter_block(&mut self) -> usize {
        std::mem::take(&mut self.query_clauses)
    }

    pub fn leave_block(&mut self, saved: usize) {
        self.query_clauses = saved;
    }

    /// Count a DISTRIBUTE/SORT/CLUSTER BY clause; more than one per query block is an error
    pub fn query_clause(&mut self, clause: &str) -> Result<(), ConversionError> {
        self.query_clauses += 1;
        if self.query_clauses > 1 {
            return Err(self.structural(format!(
                "{} combined with another DISTRIBUTE/SORT/CLUSTER BY clause",
                clause
            )));
        }
        Ok(())
    }
}

/// A statement whose translation succeeded
#[derive(Debug)]
pub struct Translation {
    pub statement: Statement,
    pub output: Vec<String>,
    pub diagnostics: StatementDiagnostics,
}

/// Tokenize and classify one segmented statement
pub fn prepare(raw: &RawStatement) -> Result<(Statement, Vec<Token>, Route), ConversionError> {
    let tokens = tokenize(&raw.text)?;
    let (kind, route) = classify(&tokens);
    Ok((Statement::new(raw.index, raw.text.clone(), kind), tokens, route))
}

/// Translate a prepared statement. Findings are returned only on success.
pub fn translate(
    mut statement: Statement,
    tokens: &[Token],
    route: Route,
    tables: &MappingTables,
) -> Result<Translation, ConversionError> {
    let mut ctx = Context::new(statement.index, tables);
    let mut output = dispatch(route, tokens, &mut ctx)?;

    // structural rewrites rebuild the text from parsed parts; keep leading comments
    if !matches!(route, Route::Expression | Route::Verbatim) {
        let leading: Vec<&str> = tokens
            .iter()
            .take_while(|t| t.is_trivia())
            .filter(|t| t.is_comment())
            .map(|t| t.text.as_str())
            .collect();
        if let Some(first) = output.first_mut().filter(|_| !leading.is_empty()) {
            *first = format!("{}\n{}", leading.join("\n"), first);
        }
    }

    statement.table = ctx.table;
    Ok(Translation {
        statement,
        output,
        diagnostics: ctx.diagnostics,
    })
}

/// Translate a single statement text end to end, without formatting
pub fn translate_text(index: usize, sql: &str, tables: &MappingTables) -> Result<Translation, ConversionError> {
    let raw = RawStatement {
        index,
        text: sql.trim().trim_end_matches(';').to_string(),
        start: 0,
        end: sql.len(),
    };
    let (statement, tokens, route) = prepare(&raw)?;
    translate(statement, &tokens, route, tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatementKind;

    #[test]
    fn test_shared_tables_are_built_once() {
        let a = MappingTables::shared() as *const MappingTables;
        let b = MappingTables::shared() as *const MappingTables;
        assert_eq!(a, b);
    }

    #[test]
    fn test_map_type_warns_once_for_composites() {
        let tables = MappingTables::new();
        let mut ctx = Context::new(0, &tables);
        for text in ["ARRAY<INT>", "MAP<STRING,INT>", "STRUCT<a:INT>"] {
            let descriptor = TypeDescriptor::parse(text).unwrap();
            ctx.map_type(&descriptor);
        }
        assert_eq!(ctx.diagnostics.warnings().len(), 1);
    }

    #[test]
    fn test_unknown_type_passes_through_with_one_warning() {
        let tables = MappingTables::new();
        let mut ctx = Context::new(0, &tables);
        for text in ["GEOMETRY", "geometry", "GEOMETRY"] {
            let descriptor = TypeDescriptor::parse(text).unwrap();
            assert_eq!(ctx.map_type(&descriptor).to_ascii_uppercase(), "GEOMETRY");
        }
        let warnings = ctx.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, DiagnosticCode::UnmappedType);
    }

    #[test]
    fn test_translate_text_sets_kind() {
        let translation = translate_text(2, "DROP TABLE IF EXISTS t PURGE;", MappingTables::shared()).unwrap();
        assert_eq!(translation.statement.kind, StatementKind::DdlDrop);
        assert_eq!(translation.statement.index, 2);
        assert_eq!(translation.output, vec!["DROP TABLE IF EXISTS t"]);
    }
}
