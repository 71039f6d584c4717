// Conversion Request / Result Models
//
// The request record handed to the translation engine and the result record
// it returns. The integration layer serializes these unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to do with a statement the engine cannot restructure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedPolicy {
    /// Fall back to a context-free rewrite and record a warning
    #[default]
    Warn,
    /// Abort the whole request
    Error,
    /// Pass the statement through unmodified, silently
    Ignore,
}

impl UnsupportedPolicy {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "warn" | "warning" => Ok(UnsupportedPolicy::Warn),
            "error" | "fail" => Ok(UnsupportedPolicy::Error),
            "ignore" => Ok(UnsupportedPolicy::Ignore),
            _ => Err(format!("Unsupported policy: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnsupportedPolicy::Warn => "warn",
            UnsupportedPolicy::Error => "error",
            UnsupportedPolicy::Ignore => "ignore",
        }
    }
}

/// Target dialect version tag. Only one target exists today.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetDialect {
    #[default]
    Snowflake,
}

impl TargetDialect {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "snowflake" | "snowflake-current" => Ok(TargetDialect::Snowflake),
            _ => Err(format!("Unsupported target dialect: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetDialect::Snowflake => "snowflake",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionOptions {
    #[serde(default)]
    pub policy: UnsupportedPolicy,

    /// Keep source comments in the output (optimizer hints are always removed)
    #[serde(default)]
    pub preserve_comments: bool,

    #[serde(default)]
    pub target: TargetDialect,

    /// Run the cosmetic formatter on every output statement
    #[serde(default = "default_pretty")]
    pub pretty: bool,

    /// Parse the converted output with the target dialect parser
    #[serde(default)]
    pub validate_output: bool,
}

fn default_pretty() -> bool {
    true
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            policy: UnsupportedPolicy::default(),
            preserve_comments: false,
            target: TargetDialect::default(),
            pretty: default_pretty(),
            validate_output: false,
        }
    }
}

impl ConversionOptions {
    pub fn with_policy(mut self, policy: UnsupportedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_comments(mut self, preserve_comments: bool) -> Self {
        self.preserve_comments = preserve_comments;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_validation(mut self, validate_output: bool) -> Self {
        self.validate_output = validate_output;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Complete source-dialect script
    pub sql: String,

    /// Omitted options fall back to the configured defaults
    #[serde(default)]
    pub options: Option<ConversionOptions>,
}

impl ConversionRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Category of a warning or error
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    LexicalError,
    StructuralError,
    UnsupportedConstruct,
    PolicyFallback,
    DroppedClause,
    LossyTranslation,
    ApproximateSemantics,
    UnmappedType,
    UnmappedFormat,
    UnmappedHint,
    FunctionArguments,
    SessionDirective,
    Formatting,
    Validation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    /// Index of the statement within the request, if statement-scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, statement: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            code,
            statement,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.statement {
            Some(n) => write!(f, "[statement {}] {}", n, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Usage statistics collected over one request. Lists keep first-seen order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionMetadata {
    pub tables_referenced: Vec<String>,
    pub functions_used: Vec<String>,
    pub types_used: Vec<String>,
    pub unsupported_constructs: Vec<String>,
    pub hints_removed: Vec<String>,
    pub session_directives_removed: usize,
    pub statement_count: usize,
    /// Output statement count; differs from input when inserts fan out
    pub output_statement_count: usize,
    pub statement_kinds: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
    pub metadata: ConversionMetadata,
    pub target: TargetDialect,
}

impl ConversionResult {
    pub fn succeeded(
        sql: String,
        warnings: Vec<Diagnostic>,
        metadata: ConversionMetadata,
        target: TargetDialect,
    ) -> Self {
        Self {
            success: true,
            sql: Some(sql),
            warnings,
            errors: Vec::new(),
            metadata,
            target,
        }
    }

    pub fn failed(
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
        metadata: ConversionMetadata,
        target: TargetDialect,
    ) -> Self {
        Self {
            success: false,
            sql: None,
            warnings,
            errors,
            metadata,
            target,
        }
    }

    pub fn has_warning(&self, code: DiagnosticCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!(UnsupportedPolicy::from_str("WARN").unwrap(), UnsupportedPolicy::Warn);
        assert_eq!(UnsupportedPolicy::from_str("error").unwrap(), UnsupportedPolicy::Error);
        assert_eq!(UnsupportedPolicy::from_str("ignore").unwrap(), UnsupportedPolicy::Ignore);
        assert!(UnsupportedPolicy::from_str("panic").is_err());
    }

    #[test]
    fn test_options_defaults_from_json() {
        let options: ConversionOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ConversionOptions::default());
        assert!(options.pretty);

        let options: ConversionOptions =
            serde_json::from_str(r#"{"policy":"error","preserve_comments":true}"#).unwrap();
        assert_eq!(options.policy, UnsupportedPolicy::Error);
        assert!(options.preserve_comments);
    }

    #[test]
    fn test_result_serialization_omits_missing_sql() {
        let result = ConversionResult::failed(
            vec![Diagnostic::new(DiagnosticCode::LexicalError, None, "boom")],
            Vec::new(),
            ConversionMetadata::default(),
            TargetDialect::Snowflake,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("sql").is_none());
        assert_eq!(json["errors"][0]["code"], "lexical_error");
        assert_eq!(json["target"], "snowflake");
    }
}
