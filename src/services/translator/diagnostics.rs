// Diagnostics & Metadata Collector
//
// Request-scoped accumulation of warnings, errors and usage statistics.
// Nothing here ever fails. Statement-level findings are buffered in a
// `StatementDiagnostics` and only merged into the request once the
// statement's translation is accepted, so a statement that falls back to
// another strategy leaves no half-finished findings behind.

use std::collections::HashSet;

use crate::models::{ConversionMetadata, Diagnostic, DiagnosticCode, StatementKind};

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Diagnostic>,
    errors: Vec<Diagnostic>,
    metadata: ConversionMetadata,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request-level warning, not tied to one statement
    pub fn warn(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        self.warnings.push(Diagnostic::new(code, None, message));
    }

    pub fn error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    pub fn metadata_mut(&mut self) -> &mut ConversionMetadata {
        &mut self.metadata
    }

    pub fn metadata(&self) -> &ConversionMetadata {
        &self.metadata
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn record_kind(&mut self, kind: StatementKind) {
        self.metadata.statement_count += 1;
        *self
            .metadata
            .statement_kinds
            .entry(kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Open a buffer for one statement's findings
    pub fn statement(&self, index: usize) -> StatementDiagnostics {
        StatementDiagnostics::new(index)
    }

    /// Merge an accepted statement's findings into the request
    pub fn commit(&mut self, statement: StatementDiagnostics) {
        self.warnings.extend(statement.warnings);
        push_all(&mut self.metadata.tables_referenced, statement.tables);
        push_all(&mut self.metadata.functions_used, statement.functions);
        push_all(&mut self.metadata.types_used, statement.types);
        push_all(&mut self.metadata.unsupported_constructs, statement.unsupported);
    }

    pub fn into_parts(self) -> (Vec<Diagnostic>, Vec<Diagnostic>, ConversionMetadata) {
        (self.warnings, self.errors, self.metadata)
    }
}

fn push_all(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        push_unique(target, item);
    }
}

fn push_unique(target: &mut Vec<String>, item: String) {
    if !target.contains(&item) {
        target.push(item);
    }
}

/// Findings for a single statement, merged on commit
#[derive(Debug, Clone)]
pub struct StatementDiagnostics {
    index: usize,
    warnings: Vec<Diagnostic>,
    once: HashSet<String>,
    tables: Vec<String>,
    functions: Vec<String>,
    types: Vec<String>,
    unsupported: Vec<String>,
}

impl StatementDiagnostics {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            warnings: Vec::new(),
            once: HashSet::new(),
            tables: Vec::new(),
            functions: Vec::new(),
            types: Vec::new(),
            unsupported: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn warn(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        self.warnings
            .push(Diagnostic::new(code, Some(self.index), message));
    }

    /// Warn at most once per statement for the given key
    pub fn warn_once(&mut self, key: &str, code: DiagnosticCode, message: impl Into<String>) -> bool {
        if self.once.insert(key.to_string()) {
            self.warn(code, message);
            true
        } else {
            false
        }
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn table(&mut self, name: &str) {
        push_unique(&mut self.tables, name.to_string());
    }

    pub fn function(&mut self, name: &str) {
        push_unique(&mut self.functions, name.to_ascii_uppercase());
    }

    pub fn type_used(&mut self, name: &str) {
        push_unique(&mut self.types, name.to_ascii_uppercase());
    }

    pub fn unsupported(&mut self, construct: &str) {
        push_unique(&mut self.unsupported, construct.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_merges_in_order_without_duplicates() {
        let mut diagnostics = Diagnostics::new();

        let mut first = diagnostics.statement(0);
        first.table("sales");
        first.function("nvl");
        first.warn(DiagnosticCode::DroppedClause, "LOCATION clause dropped");
        diagnostics.commit(first);

        let mut second = diagnostics.statement(1);
        second.table("orders");
        second.table("sales");
        second.function("NVL");
        diagnostics.commit(second);

        let metadata = diagnostics.metadata();
        assert_eq!(metadata.tables_referenced, vec!["sales", "orders"]);
        assert_eq!(metadata.functions_used, vec!["NVL"]);
        assert_eq!(diagnostics.warnings().len(), 1);
        assert_eq!(diagnostics.warnings()[0].statement, Some(0));
    }

    #[test]
    fn test_warn_once_per_statement() {
        let mut statement = StatementDiagnostics::new(4);
        assert!(statement.warn_once("composite", DiagnosticCode::LossyTranslation, "a"));
        assert!(!statement.warn_once("composite", DiagnosticCode::LossyTranslation, "b"));
        assert_eq!(statement.warnings().len(), 1);

        let mut next = StatementDiagnostics::new(5);
        assert!(next.warn_once("composite", DiagnosticCode::LossyTranslation, "c"));
    }

    #[test]
    fn test_uncommitted_findings_are_discarded() {
        let mut diagnostics = Diagnostics::new();
        let mut abandoned = diagnostics.statement(0);
        abandoned.warn(DiagnosticCode::DroppedClause, "never merged");
        abandoned.table("ghost");
        drop(abandoned);

        diagnostics.record_kind(StatementKind::Query);
        assert!(diagnostics.warnings().is_empty());
        assert!(diagnostics.metadata().tables_referenced.is_empty());
        assert_eq!(diagnostics.metadata().statement_kinds.get("QUERY"), Some(&1));
    }
}
