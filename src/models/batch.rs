// Batch Conversion Models
//
// A named set of scripts converted with shared options, and the summary
// report returned for the set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::conversion::{ConversionOptions, ConversionResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedScript {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConversionRequest {
    pub scripts: Vec<NamedScript>,
    #[serde(default)]
    pub options: Option<ConversionOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConversion {
    pub name: String,
    pub result: ConversionResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_scripts: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_warnings: usize,
    pub input_statements: usize,
    pub output_statements: usize,
    /// Input statement totals per kind across every script
    pub statement_kinds: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConversionReport {
    pub id: String,
    pub generated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub results: Vec<ScriptConversion>,
}

impl BatchConversionReport {
    pub fn new(results: Vec<ScriptConversion>) -> Self {
        let mut summary = BatchSummary {
            total_scripts: results.len(),
            ..Default::default()
        };

        for script in &results {
            let result = &script.result;
            if result.success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
            summary.total_warnings += result.warnings.len();
            summary.input_statements += result.metadata.statement_count;
            summary.output_statements += result.metadata.output_statement_count;
            for (kind, count) in &result.metadata.statement_kinds {
                *summary.statement_kinds.entry(kind.clone()).or_insert(0) += count;
            }
        }

        Self {
            id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            summary,
            results,
        }
    }
}
