// Statement and Table Definition Models
//
// Structured forms produced while translating a script: the per-statement
// record built by the classifier and the table definition parsed from
// CREATE TABLE statements.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind tag assigned to every statement by the classifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    DdlCreate,
    DdlAlter,
    DdlDrop,
    DmlInsert,
    DmlUpdate,
    DmlMerge,
    Query,
    Unknown,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::DdlCreate => "DDL_CREATE",
            StatementKind::DdlAlter => "DDL_ALTER",
            StatementKind::DdlDrop => "DDL_DROP",
            StatementKind::DmlInsert => "DML_INSERT",
            StatementKind::DmlUpdate => "DML_UPDATE",
            StatementKind::DmlMerge => "DML_MERGE",
            StatementKind::Query => "QUERY",
            StatementKind::Unknown => "UNKNOWN",
        }
    }
}

/// A type as written in the source: base name, scalar parameters and,
/// for composite types, the raw text between the angle brackets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub params: Vec<String>,
    pub type_args: Option<String>,
}

static TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*([A-Za-z_][A-Za-z0-9_]*(?:\s+[A-Za-z_][A-Za-z0-9_]*)*)\s*(?:\(([^()]*)\))?\s*(?:<(.*)>)?\s*$")
        .expect("type descriptor pattern is valid")
});

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            type_args: None,
        }
    }

    /// Parse `DECIMAL(10,2)`, `ARRAY<STRUCT<a:INT>>`, `DOUBLE PRECISION` and similar
    pub fn parse(text: &str) -> Option<Self> {
        let caps = TYPE_RE.captures(text)?;
        let name = caps
            .get(1)?
            .as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        let params = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let type_args = caps.get(3).map(|m| m.as_str().trim().to_string());
        if let Some(args) = &type_args {
            if !angle_brackets_balanced(args) {
                return None;
            }
        }
        Some(Self {
            name,
            params,
            type_args,
        })
    }

    pub fn is_composite(&self) -> bool {
        self.type_args.is_some()
    }
}

fn angle_brackets_balanced(text: &str) -> bool {
    let mut depth: i32 = 0;
    for c in text.chars() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

impl std::fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.params.is_empty() {
            write!(f, "({})", self.params.join(","))?;
        }
        if let Some(args) = &self.type_args {
            write!(f, "<{}>", args)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: TypeDescriptor,
    /// Comment as a target-dialect string literal, quotes included
    pub comment: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            data_type,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub temporary: bool,
    pub external: bool,
    /// Source storage-format keyword (`ORC`, `PARQUET`, ...)
    pub storage_format: Option<String>,
    pub partition_columns: Vec<ColumnDefinition>,
    pub cluster_columns: Vec<String>,
    pub bucket_count: Option<u32>,
    /// Table comment as a target-dialect string literal
    pub comment: Option<String>,
    /// `CREATE TABLE x LIKE y`
    pub like: Option<String>,
    /// `CREATE TABLE x AS <query>`, already translated
    pub as_query: Option<String>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Every column name in definition order, partition columns last
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .chain(self.partition_columns.iter())
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// One classified top-level statement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Statement {
    pub index: usize,
    pub text: String,
    pub kind: StatementKind,
    /// Parsed table structure, when the statement is a table definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableDefinition>,
}

impl Statement {
    pub fn new(index: usize, text: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            index,
            text: text.into(),
            kind,
            table: None,
        }
    }
}
