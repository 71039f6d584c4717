// Conversion Service
//
// Runs one request through the engine: preprocess, segment, classify,
// translate, apply the unsupported-construct policy, format, validate and
// join. Every path ends in a `ConversionResult`; nothing here panics or
// returns an error to the caller.

use std::time::Instant;

use crate::models::{
    ConversionOptions, ConversionRequest, ConversionResult, Diagnostic, DiagnosticCode, UnsupportedPolicy,
};
use crate::services::translator::expression::context_free;
use crate::services::translator::lexer::{render_trimmed, tokenize, Token, TokenKind};
use crate::services::translator::{
    format_statement, prepare, preprocess, split_statements, translate, ConversionError, Diagnostics,
    MappingTables, RawStatement,
};
use crate::validation::SqlValidator;

/// One piece of the output script
enum Output {
    Statement(String),
    /// A comment-only chunk kept when comments are preserved
    Comment(String),
}

#[derive(Clone)]
pub struct ConversionService {
    defaults: ConversionOptions,
    tables: &'static MappingTables,
}

impl ConversionService {
    pub fn new() -> Self {
        Self::with_defaults(ConversionOptions::default())
    }

    /// Service whose requests fall back to `defaults` when they carry no options
    pub fn with_defaults(defaults: ConversionOptions) -> Self {
        Self {
            defaults,
            tables: MappingTables::shared(),
        }
    }

    pub fn defaults(&self) -> &ConversionOptions {
        &self.defaults
    }

    pub fn convert(&self, request: &ConversionRequest) -> ConversionResult {
        let options = request.options.as_ref().unwrap_or(&self.defaults);
        self.convert_script(&request.sql, options)
    }

    /// Convert a whole script with explicit options
    pub fn convert_script(&self, sql: &str, options: &ConversionOptions) -> ConversionResult {
        let start_time = Instant::now();
        let mut diagnostics = Diagnostics::new();

        let outcome = self.run(sql, options, &mut diagnostics);
        let output = match outcome {
            Ok(output) => Some(output),
            Err(e) => {
                let code = match &e {
                    ConversionError::Lexical { .. } => DiagnosticCode::LexicalError,
                    ConversionError::Structural { .. } => DiagnosticCode::StructuralError,
                    ConversionError::Unsupported { .. } => DiagnosticCode::UnsupportedConstruct,
                    ConversionError::Format(_) => DiagnosticCode::Formatting,
                };
                diagnostics.error(Diagnostic::new(code, e.statement(), e.to_string()));
                None
            }
        };

        let (warnings, errors, metadata) = diagnostics.into_parts();
        tracing::info!(
            "Converted {} statement(s) into {} for target {}: {} warning(s), {} error(s) in {}ms",
            metadata.statement_count,
            metadata.output_statement_count,
            options.target.as_str(),
            warnings.len(),
            errors.len(),
            start_time.elapsed().as_millis()
        );

        match output {
            Some(sql) if errors.is_empty() => ConversionResult::succeeded(sql, warnings, metadata, options.target),
            _ => ConversionResult::failed(errors, warnings, metadata, options.target),
        }
    }

    fn run(
        &self,
        sql: &str,
        options: &ConversionOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<String, ConversionError> {
        let normalized = preprocess(sql, options.preserve_comments, diagnostics)?;
        let statements = split_statements(&normalized)?;

        let mut outputs = Vec::new();
        for raw in &statements {
            let (statement, tokens, route) = prepare(raw)?;
            if tokens.iter().all(Token::is_trivia) {
                outputs.push(Output::Comment(render_trimmed(&tokens)));
                continue;
            }

            diagnostics.record_kind(statement.kind);
            tracing::debug!(
                "Statement {} classified as {} ({:?})",
                raw.index,
                statement.kind.as_str(),
                route
            );

            let texts = match translate(statement, &tokens, route, self.tables) {
                Ok(translation) => {
                    diagnostics.commit(translation.diagnostics);
                    translation.output
                }
                Err(e) if e.is_recoverable() => self.recover(e, raw, &tokens, options.policy, diagnostics)?,
                Err(e) => return Err(e),
            };

            for text in texts {
                let text = self.finish(text, raw.index, options, diagnostics);
                outputs.push(Output::Statement(text));
            }
        }

        diagnostics.metadata_mut().output_statement_count = outputs
            .iter()
            .filter(|o| matches!(o, Output::Statement(_)))
            .count();

        Ok(join(outputs))
    }

    /// Resolve a recoverable failure with the configured policy
    fn recover(
        &self,
        error: ConversionError,
        raw: &RawStatement,
        tokens: &[Token],
        policy: UnsupportedPolicy,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<String>, ConversionError> {
        match policy {
            UnsupportedPolicy::Error => Err(error),
            UnsupportedPolicy::Ignore => {
                tracing::debug!("Statement {} passed through unchanged: {}", raw.index, error);
                Ok(vec![render_trimmed(tokens)])
            }
            UnsupportedPolicy::Warn => {
                tracing::warn!("Statement {} fell back to a context-free rewrite: {}", raw.index, error);
                let mut findings = diagnostics.statement(raw.index);
                if let ConversionError::Unsupported { construct, .. } = &error {
                    findings.unsupported(construct);
                }
                findings.warn(
                    DiagnosticCode::PolicyFallback,
                    format!("{}; applied a context-free rewrite, review manually", error),
                );
                diagnostics.commit(findings);
                Ok(vec![context_free(tokens, self.tables)])
            }
        }
    }

    /// Format and validate one output statement
    fn finish(&self, text: String, index: usize, options: &ConversionOptions, diagnostics: &mut Diagnostics) -> String {
        let mut findings = diagnostics.statement(index);
        let text = text.trim_end().to_string();

        let text = if options.pretty {
            match format_statement(&text) {
                Ok(formatted) => formatted,
                Err(e) => {
                    findings.warn(DiagnosticCode::Formatting, format!("{}; output left unformatted", e));
                    text
                }
            }
        } else {
            text
        };

        if options.validate_output {
            for issue in SqlValidator::validate_target(&text) {
                findings.warn(DiagnosticCode::Validation, issue);
            }
        }

        diagnostics.commit(findings);
        text
    }
}

impl Default for ConversionService {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminate statements with `;` and separate them with a blank line
fn join(outputs: Vec<Output>) -> String {
    outputs
        .into_iter()
        .map(|output| match output {
            Output::Statement(text) if ends_with_line_comment(&text) => format!("{}\n;", text),
            Output::Statement(text) => format!("{};", text),
            Output::Comment(text) => text,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn ends_with_line_comment(text: &str) -> bool {
    tokenize(text)
        .ok()
        .and_then(|tokens| tokens.into_iter().rev().find(|t| t.kind != TokenKind::Whitespace))
        .is_some_and(|t| t.kind == TokenKind::LineComment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatementKind;
    use pretty_assertions::assert_eq;

    fn plain() -> ConversionOptions {
        ConversionOptions::default().with_pretty(false)
    }

    fn convert(sql: &str, options: ConversionOptions) -> ConversionResult {
        ConversionService::new().convert(&ConversionRequest::new(sql).with_options(options))
    }

    #[test]
    fn test_create_table_scenario() {
        let result = convert(
            "CREATE TABLE t (a INT, b STRING) PARTITIONED BY (d STRING) STORED AS ORC;",
            plain(),
        );
        assert!(result.success);
        assert_eq!(
            result.sql.as_deref(),
            Some("CREATE TABLE t (a NUMBER(10,0), b VARCHAR, d VARCHAR) CLUSTER BY (d) STAGE_FILE_FORMAT = (TYPE = ORC);")
        );
        assert!(result.has_warning(DiagnosticCode::DroppedClause));
        assert_eq!(result.metadata.tables_referenced, vec!["t"]);
        assert_eq!(result.metadata.types_used, vec!["INT", "STRING"]);
        assert!(result.warnings.iter().all(|w| w.statement == Some(0)));
    }

    #[test]
    fn test_insert_overwrite_scenario() {
        let result = convert(
            "INSERT OVERWRITE TABLE t PARTITION(dt='2024-01-01') SELECT * FROM s;",
            plain(),
        );
        assert_eq!(result.sql.as_deref(), Some("INSERT OVERWRITE INTO t SELECT * FROM s;"));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.metadata.tables_referenced, vec!["t", "s"]);
    }

    #[test]
    fn test_lateral_view_and_window_scenarios() {
        let result = convert(
            "SELECT o.id, item, sum(qty) OVER (PARTITION BY k ORDER BY t RANGE BETWEEN 10 PRECEDING AND CURRENT ROW) \
             FROM orders o LATERAL VIEW EXPLODE(items) e AS item",
            plain(),
        );
        let sql = result.sql.unwrap();
        assert!(sql.contains("CROSS JOIN LATERAL (SELECT VALUE AS item FROM TABLE(FLATTEN(INPUT => items))) e"));
        assert!(sql.contains("ROWS BETWEEN 10 PRECEDING AND CURRENT ROW"));
        assert!(result.warnings.iter().any(|w| w.code == DiagnosticCode::LossyTranslation));
        assert!(result.warnings.iter().any(|w| w.code == DiagnosticCode::ApproximateSemantics));
    }

    #[test]
    fn test_semicolon_in_literal_is_one_statement() {
        let result = convert("SELECT 'a;b' AS x, \"c;d\" AS y FROM t", plain());
        assert_eq!(result.sql.as_deref(), Some("SELECT 'a;b' AS x, 'c;d' AS y FROM t;"));
        assert_eq!(result.metadata.statement_count, 1);
    }

    #[test]
    fn test_session_directives_and_hints() {
        let result = convert(
            "SET hive.exec.dynamic.partition=true;\nADD JAR /tmp/udf.jar;\nSELECT /*+ MAPJOIN(d) */ f.a FROM f JOIN d ON f.k = d.k;",
            plain(),
        );
        assert_eq!(result.sql.as_deref(), Some("SELECT f.a FROM f JOIN d ON f.k = d.k;"));
        assert_eq!(result.metadata.session_directives_removed, 2);
        assert_eq!(result.metadata.hints_removed, vec!["MAPJOIN"]);
        assert_eq!(result.metadata.statement_count, 1);
    }

    #[test]
    fn test_lexical_error_aborts_everything() {
        let result = convert("SELECT 1;\nSELECT 'open", plain());
        assert!(!result.success);
        assert!(result.sql.is_none());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, DiagnosticCode::LexicalError);
        assert!(result.errors[0].message.contains("line 2"));
    }

    #[test]
    fn test_policy_warn_falls_back() {
        let result = convert("LOAD DATA INPATH '/x' INTO TABLE t;\nSELECT nvl(a, 1) FROM t", plain());
        assert!(result.success);
        assert_eq!(
            result.sql.as_deref(),
            Some("LOAD DATA INPATH '/x' INTO TABLE t;\n\nSELECT COALESCE(a, 1) FROM t;")
        );
        let fallback: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.code == DiagnosticCode::PolicyFallback)
            .collect();
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].statement, Some(0));
        assert_eq!(result.metadata.unsupported_constructs, vec!["LOAD DATA"]);
    }

    #[test]
    fn test_policy_error_aborts_citing_statement() {
        let result = convert(
            "SELECT 1;\nMSCK REPAIR TABLE t",
            plain().with_policy(UnsupportedPolicy::Error),
        );
        assert!(!result.success);
        assert_eq!(result.errors[0].code, DiagnosticCode::UnsupportedConstruct);
        assert_eq!(result.errors[0].statement, Some(1));
    }

    #[test]
    fn test_policy_ignore_passes_through_silently() {
        let result = convert(
            "SELECT transform(a) USING 'cat' FROM t",
            plain().with_policy(UnsupportedPolicy::Ignore),
        );
        assert!(result.success);
        assert_eq!(result.sql.as_deref(), Some("SELECT transform(a) USING 'cat' FROM t;"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_failed_statement_leaves_no_partial_findings() {
        // nvl was recorded before the SORT BY failure discarded the translation
        let result = convert("SELECT nvl(a, 0) FROM t DISTRIBUTE BY a SORT BY a", plain());
        assert!(result.success);
        assert!(result.metadata.functions_used.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, DiagnosticCode::PolicyFallback);
    }

    #[test]
    fn test_fan_out_counts_outputs() {
        let result = convert(
            "FROM src INSERT INTO a SELECT x WHERE k = 1 INSERT INTO b SELECT y WHERE k = 2 INSERT INTO c SELECT z WHERE k = 3",
            plain(),
        );
        assert_eq!(result.metadata.statement_count, 1);
        assert_eq!(result.metadata.output_statement_count, 3);
        assert_eq!(result.metadata.statement_kinds.get(StatementKind::DmlInsert.as_str()), Some(&1));
        assert_eq!(
            result.sql.as_deref(),
            Some(
                "INSERT INTO a SELECT x FROM src WHERE k = 1;\n\n\
                 INSERT INTO b SELECT y FROM src WHERE k = 2;\n\n\
                 INSERT INTO c SELECT z FROM src WHERE k = 3;"
            )
        );
    }

    #[test]
    fn test_preserved_comments() {
        let result = convert(
            "-- load orders\nINSERT INTO TABLE t SELECT a FROM s; -- trailing\n",
            plain().with_comments(true),
        );
        assert_eq!(
            result.sql.as_deref(),
            Some("-- load orders\nINSERT INTO t SELECT a FROM s;\n\n-- trailing")
        );
        assert_eq!(result.metadata.statement_count, 1);
        assert_eq!(result.metadata.output_statement_count, 1);
    }

    #[test]
    fn test_pretty_output() {
        let result = convert("select a, b from t where a > 1", ConversionOptions::default());
        assert_eq!(result.sql.as_deref(), Some("SELECT\n  a,\n  b\nFROM t\nWHERE a > 1;"));
    }

    #[test]
    fn test_defaults_apply_without_options() {
        let service = ConversionService::with_defaults(plain().with_policy(UnsupportedPolicy::Error));
        let result = service.convert(&ConversionRequest::new("LOAD DATA INPATH '/x' INTO TABLE t"));
        assert!(!result.success);
        assert_eq!(service.defaults().policy, UnsupportedPolicy::Error);
    }

    #[test]
    fn test_empty_script() {
        let result = convert("  ;; ", plain());
        assert!(result.success);
        assert_eq!(result.sql.as_deref(), Some(""));
        assert_eq!(result.metadata.statement_count, 0);
    }

    #[test]
    fn test_output_validation() {
        let options = plain().with_validation(true);
        let result = convert("SELECT nvl(a, 1) FROM t;", options.clone());
        assert!(!result.has_warning(DiagnosticCode::Validation));

        // passthrough under ignore keeps Hive-only syntax in the output
        let result = convert(
            "LOAD DATA INPATH '/x' INTO TABLE t;",
            options.with_policy(UnsupportedPolicy::Ignore),
        );
        assert!(result.success);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == DiagnosticCode::Validation && w.message.contains("LOAD DATA")));
    }

    #[test]
    fn test_preserved_comments_inside_statements() {
        let options = plain().with_comments(true);

        let result = convert("SELECT nvl(a -- first\n, b) FROM t;", options.clone());
        assert_eq!(result.sql.as_deref(), Some("SELECT COALESCE(a -- first\n, b) FROM t;"));

        let result = convert(
            "FROM src INSERT INTO a SELECT x -- note\n WHERE k = 1 INSERT INTO b SELECT y;",
            options.clone(),
        );
        assert_eq!(
            result.sql.as_deref(),
            Some("INSERT INTO a SELECT x -- note\nFROM src WHERE k = 1;\n\nINSERT INTO b SELECT y FROM src;")
        );

        let result = convert("SELECT a FROM t -- tail", options);
        assert_eq!(result.sql.as_deref(), Some("SELECT a FROM t -- tail\n;"));
    }

    #[test]
    fn test_window_and_nested_sort_by() {
        let result = convert("SELECT k, sum(x) OVER (DISTRIBUTE BY k SORT BY ts) FROM t;", plain());
        assert_eq!(
            result.sql.as_deref(),
            Some("SELECT k, sum(x) OVER (PARTITION BY k ORDER BY ts) FROM t;")
        );
        assert!(result.warnings.is_empty());

        let result = convert(
            "SELECT a FROM (SELECT a FROM t SORT BY a) x SORT BY a;",
            plain().with_policy(UnsupportedPolicy::Error),
        );
        assert!(result.success);
        assert_eq!(
            result.sql.as_deref(),
            Some("SELECT a FROM (SELECT a FROM t ORDER BY a) x ORDER BY a;")
        );
    }
}
