// Contract Analysis Pipeline
// extract -> segment -> entities -> classify + risk per clause -> optional enrichment -> audit

use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::{
    AnalysisReport, AnnotatedClause, Document, DocumentKind, EnrichmentIssue, ReportMetadata, RiskSummary,
};
use crate::services::audit::{AuditEvent, AuditSink, ANALYSIS_COMPLETE};
use crate::services::classifier::ClauseClassifier;
use crate::services::config_store::{AnalysisConfig, AppConfig, ConfigError};
use crate::services::enrichment::{Enricher, EnrichmentError, DEFAULT_EXPLAIN_CONTEXT};
use crate::services::entities::EntityScanner;
use crate::services::extraction::{ExtractionError, TextExtractor};
use crate::services::risk::RiskEvaluator;
use crate::services::rules::CompiledRules;
use crate::services::segmenter::ClauseSegmenter;
use crate::services::text_processor::truncate_chars;

pub const NO_HIGH_RISK_SUMMARY: &str =
    "No high-severity risks detected. The contract appears standard based on the configured risk criteria.";
pub const RISK_SUMMARY_FAILED: &str = "Error generating summary.";

/// Clauses longer than this are explained even when neutral and low risk.
const LONG_CLAUSE_WORDS: usize = 30;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("{0}")]
    Extraction(String),
}

impl From<ExtractionError> for PipelineError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::UnsupportedFormat(t) => PipelineError::UnsupportedFormat(t),
            ExtractionError::Failed(msg) => PipelineError::Extraction(msg),
        }
    }
}

/// Whether a clause gets a plain-language explanation.
pub fn needs_explanation(clause: &AnnotatedClause) -> bool {
    clause.risk.is_elevated() || clause.category.is_operative() || clause.word_count() > LONG_CLAUSE_WORDS
}

/// Whether a clause gets remediation advice.
pub fn needs_remedy(clause: &AnnotatedClause) -> bool {
    clause.risk.is_elevated()
}

struct ClauseEnrichment {
    index: usize,
    explanation: Option<Result<String, EnrichmentError>>,
    remedy: Option<Result<String, EnrichmentError>>,
}

fn document_issue(field: &str, e: &EnrichmentError) -> EnrichmentIssue {
    warn!(field, error = %e, "enrichment.document_failed");
    EnrichmentIssue {
        scope: "document".to_string(),
        field: field.to_string(),
        message: e.to_string(),
    }
}

fn declared_kind(document: &Document) -> Result<DocumentKind, PipelineError> {
    document
        .kind()
        .ok_or_else(|| PipelineError::UnsupportedFormat(document.declared_type.clone()))
}

async fn bounded<F>(semaphore: &Semaphore, timeout_secs: u64, fut: F) -> Result<String, EnrichmentError>
where
    F: Future<Output = Result<String, EnrichmentError>>,
{
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|_| EnrichmentError::Task("semaphore closed".to_string()))?;
    match tokio::time::timeout(Duration::from_secs(timeout_secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(EnrichmentError::Timeout(timeout_secs)),
    }
}

pub struct ContractPipeline {
    config: AnalysisConfig,
    extractor: Arc<TextExtractor>,
    segmenter: ClauseSegmenter,
    scanner: EntityScanner,
    classifier: ClauseClassifier,
    evaluator: RiskEvaluator,
    audit: Arc<dyn AuditSink>,
}

impl ContractPipeline {
    pub fn new(config: AnalysisConfig, rules: Arc<CompiledRules>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            extractor: Arc::new(TextExtractor::new(&config)),
            segmenter: ClauseSegmenter::new(rules.clone()),
            scanner: EntityScanner::new(rules.clone()),
            classifier: ClauseClassifier::new(rules.clone()),
            evaluator: RiskEvaluator::new(rules),
            config,
            audit,
        }
    }

    /// Loads the rule file named in the config, or the built-in tables.
    pub fn from_config(config: &AppConfig, audit: Arc<dyn AuditSink>) -> Result<Self, ConfigError> {
        let rules = CompiledRules::load_or_builtin(config.rules_file.as_deref())?;
        Ok(Self::new(config.analysis.clone(), rules, audit))
    }

    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Deterministic part of a run: no enrichment, no audit event.
    pub fn analyze(&self, document: &Document) -> Result<AnalysisReport, PipelineError> {
        let kind = declared_kind(document)?;
        let text = self.extractor.extract(document)?;
        Ok(self.build_report(document, kind, text))
    }

    /// PDF parsing and page recognition block, so they run off the async workers.
    async fn extract_blocking(&self, document: &Document) -> Result<(DocumentKind, String), PipelineError> {
        let kind = declared_kind(document)?;
        let extractor = self.extractor.clone();
        let owned = document.clone();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&owned))
            .await
            .map_err(|e| PipelineError::Extraction(format!("extraction task failed: {}", e)))??;
        Ok((kind, text))
    }

    fn build_report(&self, document: &Document, kind: DocumentKind, text: String) -> AnalysisReport {
        let started = Instant::now();
        let clauses = self.segmenter.segment(&text);
        let entities = self.scanner.scan(&text);

        let mut risk_summary = RiskSummary::default();
        let clauses: Vec<AnnotatedClause> = clauses
            .into_iter()
            .map(|clause| {
                let category = self.classifier.classify(&clause.text);
                let assessment = self.evaluator.evaluate(&clause.text);
                risk_summary.record(assessment.level);
                AnnotatedClause::new(clause, category, assessment)
            })
            .collect();

        info!(
            filename = %document.filename,
            clauses = clauses.len(),
            entities = entities.total(),
            high = risk_summary.high,
            medium = risk_summary.medium,
            low = risk_summary.low,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline.analyzed"
        );

        AnalysisReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            metadata: ReportMetadata {
                filename: document.filename.clone(),
                doc_type: kind,
            },
            entities,
            clauses,
            risk_summary,
            ai_summary: String::new(),
            comprehensive_summary: None,
            enrichment_errors: Vec::new(),
            text_preview: truncate_chars(&text, self.config.preview_chars).to_string(),
            full_text: text,
        }
    }

    /// Full run. Enrichment happens only when an enricher is given; its
    /// failures are recorded on the report and never fail the run.
    pub async fn run(
        &self,
        document: &Document,
        enricher: Option<Arc<dyn Enricher>>,
    ) -> Result<AnalysisReport, PipelineError> {
        let started = Instant::now();
        let mut report = match self.extract_blocking(document).await {
            Ok((kind, text)) => self.build_report(document, kind, text),
            Err(e) => {
                warn!(filename = %document.filename, error = %e, "pipeline.failed");
                return Err(e);
            }
        };

        let ai_enabled = enricher.is_some();
        if let Some(enricher) = enricher {
            self.enrich(&mut report, enricher).await;
        }

        self.emit_audit(&report, ai_enabled);
        info!(
            run_id = %report.run_id,
            filename = %report.metadata.filename,
            ai_enabled,
            enrichment_errors = report.enrichment_errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline.done"
        );
        Ok(report)
    }

    async fn enrich(&self, report: &mut AnalysisReport, enricher: Arc<dyn Enricher>) {
        let started = Instant::now();
        let timeout_secs = self.config.enrichment_timeout_secs;
        let semaphore = Arc::new(Semaphore::new(self.config.enrichment_concurrency.max(1)));
        let mut join_set: JoinSet<ClauseEnrichment> = JoinSet::new();

        for (index, clause) in report.clauses.iter().enumerate() {
            let wants_explanation = needs_explanation(clause);
            let wants_remedy = needs_remedy(clause);
            if !wants_explanation && !wants_remedy {
                continue;
            }

            let enricher = enricher.clone();
            let semaphore = semaphore.clone();
            let text = clause.text.clone();
            let risk = clause.risk;

            join_set.spawn(async move {
                let explanation = if wants_explanation {
                    Some(bounded(&semaphore, timeout_secs, enricher.explain(&text, DEFAULT_EXPLAIN_CONTEXT)).await)
                } else {
                    None
                };
                let remedy = if wants_remedy {
                    Some(bounded(&semaphore, timeout_secs, enricher.analyze_risk_depth(&text, risk)).await)
                } else {
                    None
                };
                ClauseEnrichment {
                    index,
                    explanation,
                    remedy,
                }
            });
        }
        let clause_tasks = join_set.len();

        // Document-level calls overlap with the clause tasks.
        let reasons = report.high_risk_reasons();
        let risk_summary_fut = async {
            if reasons.is_empty() {
                Ok(NO_HIGH_RISK_SUMMARY.to_string())
            } else {
                bounded(&semaphore, timeout_secs, enricher.summarize_risks(&reasons)).await
            }
        };
        let document_summary_fut = bounded(&semaphore, timeout_secs, enricher.summarize_document(&report.full_text));
        let (risk_summary, document_summary) = tokio::join!(risk_summary_fut, document_summary_fut);

        let mut issues: Vec<EnrichmentIssue> = Vec::new();

        report.ai_summary = match risk_summary {
            Ok(s) => s,
            Err(e) => {
                issues.push(document_issue("aiSummary", &e));
                RISK_SUMMARY_FAILED.to_string()
            }
        };
        report.comprehensive_summary = match document_summary {
            Ok(s) => Some(s),
            Err(e) => {
                issues.push(document_issue("comprehensiveSummary", &e));
                None
            }
        };

        while let Some(res) = join_set.join_next().await {
            let done = match res {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "enrichment.task_failed");
                    issues.push(EnrichmentIssue {
                        scope: "clause".to_string(),
                        field: "task".to_string(),
                        message: EnrichmentError::Task(e.to_string()).to_string(),
                    });
                    continue;
                }
            };

            let Some(clause) = report.clauses.get_mut(done.index) else {
                continue;
            };
            let scope = format!("clause:{}", clause.id);

            if let Some(result) = done.explanation {
                match result {
                    Ok(text) => clause.explanation = Some(text),
                    Err(e) => {
                        warn!(clause = %clause.id, error = %e, "enrichment.explain_failed");
                        issues.push(EnrichmentIssue {
                            scope: scope.clone(),
                            field: "explanation".to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
            if let Some(result) = done.remedy {
                match result {
                    Ok(text) => clause.remedy = Some(text),
                    Err(e) => {
                        warn!(clause = %clause.id, error = %e, "enrichment.remedy_failed");
                        issues.push(EnrichmentIssue {
                            scope,
                            field: "remedy".to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        report.enrichment_errors.extend(issues);
        info!(
            enricher = %enricher.label(),
            clause_tasks,
            errors = report.enrichment_errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "enrichment.done"
        );
    }

    fn emit_audit(&self, report: &AnalysisReport, ai_enabled: bool) {
        let event = AuditEvent::new(
            ANALYSIS_COMPLETE,
            json!({
                "filename": report.metadata.filename,
                "clauseCount": report.clauses.len(),
                "highRisks": report.risk_summary.high,
                "aiEnabled": ai_enabled,
                "runId": report.run_id,
            }),
            self.config.user_id.clone(),
        );
        if let Err(e) = self.audit.record(&event) {
            warn!(error = %e, "audit.write_failed");
        }
    }
}

/// Question answering over a finished report.
pub async fn ask(report: &AnalysisReport, question: &str, enricher: &dyn Enricher) -> Result<String, EnrichmentError> {
    enricher.answer_question(question, &report.full_text).await
}
