use sqlparser::ast::Statement;
use sqlparser::dialect::SnowflakeDialect;
use sqlparser::parser::Parser;

use crate::services::translator::lexer::{matches_sequence, tokenize};

/// Hive-only constructs that should never survive conversion
const RESIDUAL_CONSTRUCTS: &[&[&str]] = &[
    &["PARTITIONED", "BY"],
    &["CLUSTERED", "BY"],
    &["STORED", "AS"],
    &["ROW", "FORMAT"],
    &["TBLPROPERTIES"],
    &["LATERAL", "VIEW"],
    &["DISTRIBUTE", "BY"],
    &["SORT", "BY"],
    &["ADD", "JAR"],
    &["LOAD", "DATA"],
];

/// Post-conversion checks on target-dialect output
pub struct SqlValidator;

impl SqlValidator {
    /// Check one converted statement. Returns human-readable findings;
    /// an empty list means the statement looks like valid Snowflake SQL.
    pub fn validate_target(sql: &str) -> Vec<String> {
        let mut issues = Vec::new();

        if let Err(e) = Self::parse_target(sql) {
            issues.push(format!("Snowflake parser rejected the statement: {}", e));
        }

        for construct in Self::residual_constructs(sql) {
            issues.push(format!("Hive-only construct {} remains in the output", construct));
        }

        issues
    }

    /// Parse with the Snowflake dialect
    pub fn parse_target(sql: &str) -> Result<Vec<Statement>, String> {
        let dialect = SnowflakeDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(sql)
            .map_err(|e| format!("SQL parsing error: {}", e))?;

        let ast = parser
            .parse_statements()
            .map_err(|e| format!("SQL parsing error: {}", e))?;

        if ast.is_empty() {
            return Err("Empty SQL statement".to_string());
        }
        Ok(ast)
    }

    /// Hive keyword sequences found outside strings and comments
    pub fn residual_constructs(sql: &str) -> Vec<String> {
        let Ok(tokens) = tokenize(sql) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for construct in RESIDUAL_CONSTRUCTS {
            let present = (0..tokens.len()).any(|i| matches_sequence(&tokens, i, construct).is_some());
            if present {
                found.push(construct.join(" "));
            }
        }
        found
    }
}
