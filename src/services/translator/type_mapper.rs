// Type Mapper
//
// Fixed lookup table from Hive column types to Snowflake column types.
// Parameterized scalars keep their parameters; integer-family types without
// parameters get a fixed precision/scale; composite types lose their type
// arguments. Target names map to themselves so translated DDL can be fed
// back through the engine unchanged.

use std::collections::HashMap;

use crate::models::TypeDescriptor;

#[derive(Debug, Clone, Copy)]
enum TypeRule {
    Scalar {
        target: &'static str,
        default_params: &'static [&'static str],
    },
    Composite {
        target: &'static str,
    },
}

/// Outcome of mapping one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMapping {
    Mapped {
        text: String,
        /// Composite type arguments were dropped
        dropped_args: bool,
    },
    /// No rule; the source text passes through
    Unmapped(String),
}

impl TypeMapping {
    pub fn text(&self) -> &str {
        match self {
            TypeMapping::Mapped { text, .. } | TypeMapping::Unmapped(text) => text,
        }
    }
}

/// Source type names the mapper recognizes
pub const SOURCE_TYPES: &[&str] = &[
    "TINYINT",
    "SMALLINT",
    "INT",
    "INTEGER",
    "BIGINT",
    "FLOAT",
    "DOUBLE",
    "DOUBLE PRECISION",
    "DECIMAL",
    "NUMERIC",
    "STRING",
    "VARCHAR",
    "CHAR",
    "BOOLEAN",
    "BINARY",
    "DATE",
    "TIMESTAMP",
    "TIMESTAMP WITH LOCAL TIME ZONE",
    "ARRAY",
    "MAP",
    "STRUCT",
    "UNIONTYPE",
];

pub struct TypeMapper {
    rules: HashMap<&'static str, TypeRule>,
}

impl TypeMapper {
    pub fn new() -> Self {
        let scalar = |target, default_params| TypeRule::Scalar {
            target,
            default_params,
        };
        let composite = |target| TypeRule::Composite { target };

        let entries: [(&'static str, TypeRule); 34] = [
            ("TINYINT", scalar("NUMBER", &["3", "0"])),
            ("SMALLINT", scalar("NUMBER", &["5", "0"])),
            ("INT", scalar("NUMBER", &["10", "0"])),
            ("INTEGER", scalar("NUMBER", &["10", "0"])),
            ("BIGINT", scalar("NUMBER", &["19", "0"])),
            ("DECIMAL", scalar("NUMBER", &["10", "0"])),
            ("NUMERIC", scalar("NUMBER", &["10", "0"])),
            ("FLOAT", scalar("FLOAT", &[])),
            ("DOUBLE", scalar("FLOAT", &[])),
            ("DOUBLE PRECISION", scalar("FLOAT", &[])),
            ("REAL", scalar("FLOAT", &[])),
            ("STRING", scalar("VARCHAR", &[])),
            ("VARCHAR", scalar("VARCHAR", &[])),
            ("CHAR", scalar("CHAR", &[])),
            ("TEXT", scalar("VARCHAR", &[])),
            ("BOOLEAN", scalar("BOOLEAN", &[])),
            ("BINARY", scalar("BINARY", &[])),
            ("DATE", scalar("DATE", &[])),
            ("TIMESTAMP", scalar("TIMESTAMP_NTZ", &[])),
            ("TIMESTAMP WITH LOCAL TIME ZONE", scalar("TIMESTAMP_LTZ", &[])),
            ("ARRAY", composite("ARRAY")),
            ("MAP", composite("OBJECT")),
            ("STRUCT", composite("OBJECT")),
            ("UNIONTYPE", composite("VARIANT")),
            // target-side names, identity
            ("NUMBER", scalar("NUMBER", &["38", "0"])),
            ("TIMESTAMP_NTZ", scalar("TIMESTAMP_NTZ", &[])),
            ("TIMESTAMP_LTZ", scalar("TIMESTAMP_LTZ", &[])),
            ("TIMESTAMP_TZ", scalar("TIMESTAMP_TZ", &[])),
            ("OBJECT", composite("OBJECT")),
            ("VARIANT", composite("VARIANT")),
            ("TIME", scalar("TIME", &[])),
            ("VARBINARY", scalar("BINARY", &[])),
            ("DATETIME", scalar("TIMESTAMP_NTZ", &[])),
            ("BYTEINT", scalar("NUMBER", &["3", "0"])),
        ];

        Self {
            rules: entries.into_iter().collect(),
        }
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.rules.contains_key(name.to_ascii_uppercase().as_str())
    }

    pub fn map(&self, source: &TypeDescriptor) -> TypeMapping {
        let Some(rule) = self.rules.get(source.name.as_str()) else {
            return TypeMapping::Unmapped(source.to_string());
        };

        match *rule {
            TypeRule::Scalar {
                target,
                default_params,
            } => {
                let params: Vec<&str> = if source.params.is_empty() {
                    default_params.to_vec()
                } else {
                    source.params.iter().map(String::as_str).collect()
                };
                let text = if params.is_empty() {
                    target.to_string()
                } else {
                    format!("{}({})", target, params.join(","))
                };
                TypeMapping::Mapped {
                    text,
                    dropped_args: false,
                }
            }
            TypeRule::Composite { target } => TypeMapping::Mapped {
                text: target.to_string(),
                dropped_args: source.type_args.is_some(),
            },
        }
    }

    /// Map a type written as text; unparseable text passes through unmapped
    pub fn map_text(&self, text: &str) -> TypeMapping {
        match TypeDescriptor::parse(text) {
            Some(descriptor) => self.map(&descriptor),
            None => TypeMapping::Unmapped(text.to_string()),
        }
    }
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new()
    }
}
