use contract_lens_lib::models::{Document, DocumentKind};
use contract_lens_lib::services::config_store::AnalysisConfig;
use contract_lens_lib::services::pipeline::ContractPipeline;
use contract_lens_lib::services::rules::CompiledRules;
use contract_lens_lib::services::text_processor::preview;
use contract_lens_lib::services::TracingAuditSink;
use serde::Serialize;
use std::sync::Arc;

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin segment_contract -- <path.(pdf|docx|txt)> [--rules <rules.json>] [--clauses <n>] [--out <json_path>]\n\nNotes:\n  - Runs extraction, segmentation, classification and risk rules only (no model calls, no audit file)."
        );
        return Ok(());
    }

    let path = std::path::PathBuf::from(&args[1]);
    let clauses_n: usize = parse_arg_value(&args, "--clauses")
        .and_then(|s| s.parse().ok())
        .unwrap_or(50);
    let rules_path = parse_arg_value(&args, "--rules").map(std::path::PathBuf::from);
    let out_path = parse_arg_value(&args, "--out");

    let bytes = std::fs::read(&path)?;
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input.txt".to_string());
    let declared = DocumentKind::from_path(&path)
        .map(|k| k.as_str().to_string())
        .unwrap_or_else(|| path.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default());

    let rules = CompiledRules::load_or_builtin(rules_path.as_deref())?;
    let pipeline = ContractPipeline::new(AnalysisConfig::default(), rules, Arc::new(TracingAuditSink));
    let report = pipeline.analyze(&Document::new(file_name, declared, bytes))?;

    println!("File: {}", path.display());
    println!(
        "Extracted: {} chars ({} bytes)",
        report.full_text.chars().count(),
        report.full_text.len()
    );
    println!("Clauses: {}", report.clauses.len());
    println!();

    for (i, c) in report.clauses.iter().take(clauses_n).enumerate() {
        println!(
            "[C{:04}] id={:<12} kind={:?} category={} risk={} words={}  {}",
            i,
            c.id,
            c.kind,
            c.category,
            c.risk,
            c.word_count(),
            preview(&c.text, 120)
        );
    }
    if report.clauses.len() > clauses_n {
        println!("... ({} more clauses)", report.clauses.len() - clauses_n);
    }

    if let Some(out_path) = out_path {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Output<'a> {
            file: String,
            extracted_chars: usize,
            clauses: &'a [contract_lens_lib::models::AnnotatedClause],
            entities: &'a contract_lens_lib::models::EntityBag,
        }

        let out = Output {
            file: path.display().to_string(),
            extracted_chars: report.full_text.chars().count(),
            clauses: &report.clauses,
            entities: &report.entities,
        };

        std::fs::write(&out_path, serde_json::to_string_pretty(&out)?)?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
