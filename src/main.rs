use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use contract_lens_lib::models::{AnalysisReport, Document, DocumentKind, EntityCategory};
use contract_lens_lib::services::config_store::{AppConfig, ConfigStore, ModelMode};
use contract_lens_lib::services::enrichment::{resolve_enricher, Enricher, OfflineEnricher};
use contract_lens_lib::services::pipeline::{ask, ContractPipeline};
use contract_lens_lib::services::providers::parse_provider;
use contract_lens_lib::services::text_processor::preview;
use contract_lens_lib::services::{AuditSink, JsonlAuditSink};

const USAGE: &str = "Usage:
  contract-lens <file> [--type pdf|docx|txt] [--ai] [--mode standard|reasoning]
                [--provider <name[:model]>] [--rules <rules.json>] [--out <report.json>]
                [--ask <question>]

Notes:
  - The document type is inferred from the extension unless --type is given.
  - --ai enables explanations and summaries from the configured model provider
    (default: local Ollama). Without a reachable provider, offline notices are used.";

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn load_config() -> Result<AppConfig> {
    match ConfigStore::default_config_dir() {
        Some(dir) => {
            let store = ConfigStore::new(dir);
            store
                .load()
                .with_context(|| format!("failed to load {}", store.config_file().display()))
        }
        None => Ok(AppConfig::default()),
    }
}

fn apply_overrides(config: &mut AppConfig, args: &[String]) -> Result<()> {
    if let Some(mode) = parse_arg_value(args, "--mode") {
        config.enrichment.mode = match mode.to_ascii_lowercase().as_str() {
            "standard" => ModelMode::Standard,
            "reasoning" => ModelMode::Reasoning,
            other => bail!("unknown --mode '{}' (expected standard or reasoning)", other),
        };
    }

    if let Some(spec) = parse_arg_value(args, "--provider") {
        let spec = parse_provider(&spec);
        config.enrichment.provider = spec.name;
        if !spec.model.is_empty() {
            match config.enrichment.mode {
                ModelMode::Standard => config.enrichment.standard_model = spec.model,
                ModelMode::Reasoning => config.enrichment.reasoning_model = spec.model,
            }
        }
    }

    if let Some(rules) = parse_arg_value(args, "--rules") {
        config.rules_file = Some(rules.into());
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("File: {} ({})", report.metadata.filename, report.metadata.doc_type);
    println!("Run: {}", report.run_id);
    println!(
        "Extracted: {} chars, {} clauses",
        report.full_text.chars().count(),
        report.clauses.len()
    );
    println!(
        "Risk: High={} Medium={} Low={}",
        report.risk_summary.high, report.risk_summary.medium, report.risk_summary.low
    );
    println!();

    for clause in &report.clauses {
        println!(
            "[{:<12}] {:<18} {:<6}  {}",
            preview(&clause.id, 12),
            clause.category.as_str(),
            clause.risk.as_str(),
            preview(&clause.text, 70)
        );
        if clause.risk.is_elevated() {
            println!("{:>16} {}", "->", clause.risk_reason);
        }
    }

    let entity_lines: Vec<String> = EntityCategory::ALL
        .iter()
        .filter(|c| !report.entities.get(**c).is_empty())
        .map(|c| format!("  {}: {}", c.as_str(), report.entities.get(*c).join(", ")))
        .collect();
    if !entity_lines.is_empty() {
        println!();
        println!("Entities:");
        for line in entity_lines {
            println!("{}", line);
        }
    }

    if !report.ai_summary.is_empty() {
        println!();
        println!("AI summary:\n{}", report.ai_summary);
    }
    if let Some(summary) = &report.comprehensive_summary {
        println!();
        println!("Document summary:\n{}", summary);
    }
    if !report.enrichment_errors.is_empty() {
        println!();
        println!("Enrichment issues: {}", report.enrichment_errors.len());
        for issue in &report.enrichment_errors {
            println!("  {} {}: {}", issue.scope, issue.field, issue.message);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || has_flag(&args, "--help") || has_flag(&args, "-h") {
        eprintln!("{}", USAGE);
        return Ok(());
    }

    contract_lens_lib::init_logging();

    let path = Path::new(&args[1]);
    let bytes = std::fs::read(path).with_context(|| format!("read file failed: {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());

    let declared_type = match parse_arg_value(&args, "--type") {
        Some(t) => t,
        None => DocumentKind::from_path(path)
            .map(|k| k.as_str().to_string())
            .or_else(|| path.extension().map(|e| e.to_string_lossy().to_string()))
            .unwrap_or_default(),
    };

    let mut config = load_config()?;
    apply_overrides(&mut config, &args)?;

    let audit: Arc<dyn AuditSink> = Arc::new(JsonlAuditSink::default_location());
    let pipeline = ContractPipeline::from_config(&config, audit).context("failed to load rule tables")?;

    let enable_ai = has_flag(&args, "--ai");
    let question = parse_arg_value(&args, "--ask");
    let enricher: Option<Arc<dyn Enricher>> = if enable_ai || question.is_some() {
        Some(Arc::from(resolve_enricher(&config).await))
    } else {
        None
    };

    let document = Document::new(filename, declared_type, bytes);
    let report = pipeline
        .run(&document, if enable_ai { enricher.clone() } else { None })
        .await
        .context("analysis failed")?;

    print_report(&report);

    if let Some(question) = question {
        let fallback = OfflineEnricher;
        let enricher: &dyn Enricher = match &enricher {
            Some(e) => e.as_ref(),
            None => &fallback,
        };
        let answer = ask(&report, &question, enricher)
            .await
            .unwrap_or_else(|e| format!("Error: {}", e));
        println!();
        println!("Q: {}", question);
        println!("A: {}", answer);
    }

    if let Some(out_path) = parse_arg_value(&args, "--out") {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&out_path, json).with_context(|| format!("write out failed: {}", out_path))?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
