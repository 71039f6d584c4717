use tracing::info;

use crate::api::middleware::AppError;
use crate::models::{BatchConversionReport, BatchConversionRequest, ScriptConversion};
use crate::services::conversion_service::ConversionService;

/// Converts several named scripts with shared options
#[derive(Clone, Default)]
pub struct BatchService {
    converter: ConversionService,
}

impl BatchService {
    pub fn new(converter: ConversionService) -> Self {
        Self { converter }
    }

    /// Each script runs on the blocking pool; results keep input order.
    pub async fn convert_batch(&self, request: BatchConversionRequest) -> Result<BatchConversionReport, AppError> {
        let options = request
            .options
            .unwrap_or_else(|| self.converter.defaults().clone());

        let mut handles = Vec::with_capacity(request.scripts.len());
        for script in request.scripts {
            let converter = self.converter.clone();
            let options = options.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let result = converter.convert_script(&script.sql, &options);
                ScriptConversion {
                    name: script.name,
                    result,
                }
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let conversion = handle
                .await
                .map_err(|e| AppError::Internal(format!("Conversion task failed: {}", e)))?;
            results.push(conversion);
        }

        let report = BatchConversionReport::new(results);
        info!(
            "Batch {} converted {} scripts ({} failed, {} warnings)",
            report.id, report.summary.total_scripts, report.summary.failed, report.summary.total_warnings
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversionOptions, NamedScript};
    use pretty_assertions::assert_eq;

    fn script(name: &str, sql: &str) -> NamedScript {
        NamedScript {
            name: name.to_string(),
            sql: sql.to_string(),
        }
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let service = BatchService::default();
        let request = BatchConversionRequest {
            scripts: vec![
                script("daily.hql", "SELECT nvl(a, 1) FROM t;"),
                script("broken.hql", "SELECT 'unterminated FROM t;"),
                script("load.hql", "INSERT INTO t SELECT a FROM s; SELECT b FROM t;"),
            ],
            options: Some(ConversionOptions::default().with_pretty(false)),
        };

        let report = service.convert_batch(request).await.unwrap();
        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["daily.hql", "broken.hql", "load.hql"]);

        assert_eq!(report.summary.total_scripts, 3);
        assert_eq!(report.summary.successful, 2);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(
            report.results[0].result.sql.as_deref(),
            Some("SELECT COALESCE(a, 1) FROM t;")
        );
        assert!(report.results[1].result.sql.is_none());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = BatchService::default()
            .convert_batch(BatchConversionRequest {
                scripts: Vec::new(),
                options: None,
            })
            .await
            .unwrap();
        assert_eq!(report.summary.total_scripts, 0);
        assert!(report.results.is_empty());
    }
}
