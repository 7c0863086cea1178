// Enrichment Service
// Natural-language explanations, remedies and summaries from a chat model.
// The pipeline only sees the `Enricher` trait; backends are chosen per run.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::RiskLevel;
use crate::services::config_store::{AppConfig, ModelMode};
use crate::services::providers::{get_api_key, ProviderClient, ProviderError, ProviderKind, ProviderTarget};
use crate::services::text_processor::truncate_chars;

pub const DOCUMENT_SUMMARY_MAX_CHARS: usize = 12_000;
pub const QUESTION_CONTEXT_MAX_CHARS: usize = 4_000;
pub const DEFAULT_EXPLAIN_CONTEXT: &str = "business";

const SYSTEM_PROMPT: &str = "You are a contract analyst advising small and medium business owners. \
Answer in English even when the source text is in another language. Be concise and avoid legal jargon.";

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("enrichment timed out after {0}s")]
    Timeout(u64),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("enrichment task failed: {0}")]
    Task(String),
}

/// String-in, string-out collaborator used to enrich a report.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Short description for logs, e.g. `ollama:mistral`.
    fn label(&self) -> String;

    async fn explain(&self, clause_text: &str, context: &str) -> Result<String, EnrichmentError>;

    /// Three labeled sections: Implication, Mitigation Strategy, Alternative Clause.
    async fn analyze_risk_depth(&self, clause_text: &str, risk: RiskLevel) -> Result<String, EnrichmentError>;

    async fn summarize_document(&self, full_text: &str) -> Result<String, EnrichmentError>;

    async fn summarize_risks(&self, reasons: &[String]) -> Result<String, EnrichmentError>;

    async fn answer_question(&self, question: &str, full_text: &str) -> Result<String, EnrichmentError>;
}

/// Used when no model backend is reachable. Every call succeeds with a notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineEnricher;

pub const OFFLINE_EXPLANATION: &str = "AI Offline: Enable a model provider for explanations.";
pub const OFFLINE_RISK_ANALYSIS: &str = "AI Offline: Enable a model provider for risk analysis.";
pub const OFFLINE_SUMMARY: &str = "AI Summary Unavailable (no model provider running).";
pub const OFFLINE_CHAT: &str = "AI Offline: Enable a model provider to ask questions about the document.";

#[async_trait]
impl Enricher for OfflineEnricher {
    fn label(&self) -> String {
        "offline".to_string()
    }

    async fn explain(&self, _clause_text: &str, _context: &str) -> Result<String, EnrichmentError> {
        Ok(OFFLINE_EXPLANATION.to_string())
    }

    async fn analyze_risk_depth(&self, _clause_text: &str, _risk: RiskLevel) -> Result<String, EnrichmentError> {
        Ok(OFFLINE_RISK_ANALYSIS.to_string())
    }

    async fn summarize_document(&self, _full_text: &str) -> Result<String, EnrichmentError> {
        Ok(OFFLINE_SUMMARY.to_string())
    }

    async fn summarize_risks(&self, _reasons: &[String]) -> Result<String, EnrichmentError> {
        Ok(OFFLINE_SUMMARY.to_string())
    }

    async fn answer_question(&self, _question: &str, _full_text: &str) -> Result<String, EnrichmentError> {
        Ok(OFFLINE_CHAT.to_string())
    }
}

/// Chat-model backed enricher.
pub struct LlmEnricher {
    client: ProviderClient,
    target: ProviderTarget,
    max_tokens: i32,
}

impl LlmEnricher {
    pub fn new(client: ProviderClient, target: ProviderTarget) -> Self {
        Self {
            client,
            target,
            max_tokens: 1024,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, EnrichmentError> {
        let result = self
            .client
            .chat(&self.target, SYSTEM_PROMPT, prompt, self.max_tokens)
            .await?;
        info!(
            provider = self.target.kind.name(),
            model = %self.target.model,
            latency_ms = result.latency_ms,
            "enrichment.call_ok"
        );
        Ok(result.content.trim().to_string())
    }
}

pub fn explain_prompt(clause_text: &str, context: &str) -> String {
    format!(
        "Explain the following contract clause in plain {} language for someone without legal training. \
Use at most 2 sentences. If the clause is not in English, translate it first.\n\nClause: {}",
        context, clause_text
    )
}

pub fn risk_depth_prompt(clause_text: &str, risk: RiskLevel) -> String {
    format!(
        "This clause was rated {} risk.\nClause: {}\n\n\
Respond with exactly these three sections:\n\
1. **Implication**: what the clause means for the business owner.\n\
2. **Mitigation Strategy**: concrete steps that reduce the risk.\n\
3. **Alternative Clause**: a fairer rewording that protects the smaller party.\n\
Keep each section short and practical.",
        risk, clause_text
    )
}

pub fn document_summary_prompt(full_text: &str) -> String {
    format!(
        "Explain this contract in plain English as if to a friend.\nText (truncated): {}\n\n\
Cover:\n\
1. What the deal is about.\n\
2. Who the main parties are.\n\
3. The most important things to watch (money, dates, restrictions).\n\n\
Use short sentences, no introduction line and no legal jargon.",
        truncate_chars(full_text, DOCUMENT_SUMMARY_MAX_CHARS)
    )
}

pub fn risk_summary_prompt(reasons: &[String]) -> String {
    format!(
        "Write an executive summary for a business owner based on these identified risks: {}\n\
Structure:\n\
- **Executive Overview**: one sentence overall assessment.\n\
- **Key Risks**: 3 bullet points on the critical issues.\n\
- **Negotiation Strategy**: one piece of advice for the next meeting.",
        reasons.join("; ")
    )
}

pub fn question_prompt(question: &str, full_text: &str) -> String {
    format!(
        "Contract context: {}\n\nQuestion: {}\n\n\
Answer strictly from the contract context above and cite clause numbers where possible. \
If the contract does not cover it, say so.",
        truncate_chars(full_text, QUESTION_CONTEXT_MAX_CHARS),
        question
    )
}

#[async_trait]
impl Enricher for LlmEnricher {
    fn label(&self) -> String {
        format!("{}:{}", self.target.kind.name(), self.target.model)
    }

    async fn explain(&self, clause_text: &str, context: &str) -> Result<String, EnrichmentError> {
        self.complete(&explain_prompt(clause_text, context)).await
    }

    async fn analyze_risk_depth(&self, clause_text: &str, risk: RiskLevel) -> Result<String, EnrichmentError> {
        self.complete(&risk_depth_prompt(clause_text, risk)).await
    }

    async fn summarize_document(&self, full_text: &str) -> Result<String, EnrichmentError> {
        self.complete(&document_summary_prompt(full_text)).await
    }

    async fn summarize_risks(&self, reasons: &[String]) -> Result<String, EnrichmentError> {
        self.complete(&risk_summary_prompt(reasons)).await
    }

    async fn answer_question(&self, question: &str, full_text: &str) -> Result<String, EnrichmentError> {
        self.complete(&question_prompt(question, full_text)).await
    }
}

/// Picks `(standard, reasoning)` models from what an Ollama host has installed.
pub fn select_ollama_models(available: &[String]) -> Option<(String, String)> {
    let first = available.first()?;
    let reasoning = available
        .iter()
        .find(|m| m.contains("deepseek-r1"))
        .cloned()
        .unwrap_or_else(|| "deepseek-r1".to_string());
    let standard = available
        .iter()
        .find(|m| m.contains("mistral") || m.contains("llama"))
        .unwrap_or(first)
        .clone();
    Some((standard, reasoning))
}

fn resolve_url(config: &AppConfig, kind: ProviderKind) -> String {
    config
        .enrichment
        .base_url
        .clone()
        .or_else(|| {
            config
                .providers
                .get(kind.name())
                .and_then(|p| p.base_url.clone())
        })
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| kind.env_or_default_url())
}

fn resolve_api_key(
    config: &AppConfig,
    kind: ProviderKind,
    key_lookup: fn(&str) -> Option<String>,
) -> Option<String> {
    key_lookup(kind.name()).or_else(|| {
        config
            .api_keys
            .get(kind.name())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    })
}

/// Model for a hosted backend: an explicit `--provider name:model` or config
/// model first, then the per-provider entry, then the backend's default.
fn hosted_model(config: &AppConfig, kind: ProviderKind) -> String {
    if config.enrichment.model_overridden() {
        return config.enrichment.active_model().trim().to_string();
    }
    config
        .providers
        .get(kind.name())
        .and_then(|p| p.model.as_deref())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| kind.default_model())
        .to_string()
}

/// Builds the enricher for one run from configuration. Falls back to
/// `OfflineEnricher` when the backend is unknown, unreachable or has no key.
pub async fn resolve_enricher(config: &AppConfig) -> Box<dyn Enricher> {
    resolve_enricher_with(config, get_api_key).await
}

/// Same as `resolve_enricher`, with the environment/store key lookup supplied.
pub async fn resolve_enricher_with(
    config: &AppConfig,
    key_lookup: fn(&str) -> Option<String>,
) -> Box<dyn Enricher> {
    let enrichment = &config.enrichment;
    let Some(kind) = ProviderKind::parse(&enrichment.provider) else {
        warn!(provider = %enrichment.provider, "enrichment.unknown_provider_offline");
        return Box::new(OfflineEnricher);
    };

    let client = ProviderClient::new();
    let url = resolve_url(config, kind);

    let model = if kind == ProviderKind::Ollama {
        match client.list_ollama_models(&url).await {
            Ok(models) => match select_ollama_models(&models) {
                Some((standard, reasoning)) => {
                    let wanted = enrichment.active_model();
                    match models.iter().find(|m| !wanted.is_empty() && m.starts_with(wanted)) {
                        Some(installed) => installed.clone(),
                        None if enrichment.mode == ModelMode::Reasoning => reasoning,
                        None => standard,
                    }
                }
                None => {
                    warn!(url = %url, "enrichment.ollama_no_models_offline");
                    return Box::new(OfflineEnricher);
                }
            },
            Err(e) => {
                warn!(url = %url, error = %e, "enrichment.ollama_unreachable_offline");
                return Box::new(OfflineEnricher);
            }
        }
    } else {
        hosted_model(config, kind)
    };

    let api_key = resolve_api_key(config, kind, key_lookup);
    if kind.needs_api_key() && api_key.is_none() {
        warn!(provider = kind.name(), "enrichment.missing_api_key_offline");
        return Box::new(OfflineEnricher);
    }

    info!(provider = kind.name(), model = %model, url = %url, "enrichment.resolved");
    Box::new(LlmEnricher::new(
        client,
        ProviderTarget {
            kind,
            model,
            url,
            api_key,
        },
    ))
}
