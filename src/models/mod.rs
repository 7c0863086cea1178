// ContractLens Data Models
// Documents, clauses, annotations and the analysis report

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============ Documents ============

/// Source formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Txt,
}

impl DocumentKind {
    /// Parse a declared type such as `pdf`, `DOCX` or `.txt`.
    pub fn parse(declared: &str) -> Option<Self> {
        let normalized = declared.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "txt" => Some(DocumentKind::Txt),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::parse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Txt => "txt",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded document. The declared type is kept verbatim so an unknown
/// type surfaces as an extraction error rather than a silent fallback.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub declared_type: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, declared_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            declared_type: declared_type.into(),
            bytes,
        }
    }

    pub fn kind(&self) -> Option<DocumentKind> {
        DocumentKind::parse(&self.declared_type)
    }
}

// ============ Clauses ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClauseKind {
    Clause,
    Preamble,
}

/// A labeled unit of contract text, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub id: String,
    pub text: String,
    pub kind: ClauseKind,
}

impl Clause {
    pub fn new(id: impl Into<String>, text: impl Into<String>, kind: ClauseKind) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClauseCategory {
    Obligation,
    Prohibition,
    Right,
    #[serde(rename = "Definition/Neutral")]
    DefinitionNeutral,
}

impl ClauseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseCategory::Obligation => "Obligation",
            ClauseCategory::Prohibition => "Prohibition",
            ClauseCategory::Right => "Right",
            ClauseCategory::DefinitionNeutral => "Definition/Neutral",
        }
    }

    /// Categories that carry a legal effect worth explaining.
    pub fn is_operative(&self) -> bool {
        !matches!(self, ClauseCategory::DefinitionNeutral)
    }
}

impl fmt::Display for ClauseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, RiskLevel::Medium | RiskLevel::High)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub reason: String,
}

/// A clause with its classification, risk and optional enrichment text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedClause {
    pub id: String,
    pub text: String,
    pub kind: ClauseKind,
    pub category: ClauseCategory,
    pub risk: RiskLevel,
    pub risk_reason: String,
    pub explanation: Option<String>,
    pub remedy: Option<String>,
}

impl AnnotatedClause {
    pub fn new(clause: Clause, category: ClauseCategory, assessment: RiskAssessment) -> Self {
        Self {
            id: clause.id,
            text: clause.text,
            kind: clause.kind,
            category,
            risk: assessment.level,
            risk_reason: assessment.reason,
            explanation: None,
            remedy: None,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

// ============ Entities ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityCategory {
    Org,
    Person,
    Date,
    Money,
    Gpe,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 5] = [
        EntityCategory::Org,
        EntityCategory::Person,
        EntityCategory::Date,
        EntityCategory::Money,
        EntityCategory::Gpe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Org => "ORG",
            EntityCategory::Person => "PERSON",
            EntityCategory::Date => "DATE",
            EntityCategory::Money => "MONEY",
            EntityCategory::Gpe => "GPE",
        }
    }

    /// Map a pattern-table label onto a report category. Labels without a
    /// category of their own (e.g. `JURISDICTION`) collapse into GPE.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "ORG" => EntityCategory::Org,
            "PERSON" => EntityCategory::Person,
            "DATE" => EntityCategory::Date,
            "MONEY" => EntityCategory::Money,
            _ => EntityCategory::Gpe,
        }
    }
}

/// Distinct matched strings per entity category, first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBag {
    #[serde(rename = "ORG")]
    pub org: Vec<String>,
    #[serde(rename = "PERSON")]
    pub person: Vec<String>,
    #[serde(rename = "DATE")]
    pub date: Vec<String>,
    #[serde(rename = "MONEY")]
    pub money: Vec<String>,
    #[serde(rename = "GPE")]
    pub gpe: Vec<String>,
}

impl EntityBag {
    pub fn get(&self, category: EntityCategory) -> &[String] {
        match category {
            EntityCategory::Org => &self.org,
            EntityCategory::Person => &self.person,
            EntityCategory::Date => &self.date,
            EntityCategory::Money => &self.money,
            EntityCategory::Gpe => &self.gpe,
        }
    }

    /// Returns false when the value was already present.
    pub fn insert(&mut self, category: EntityCategory, value: &str) -> bool {
        let slot = match category {
            EntityCategory::Org => &mut self.org,
            EntityCategory::Person => &mut self.person,
            EntityCategory::Date => &mut self.date,
            EntityCategory::Money => &mut self.money,
            EntityCategory::Gpe => &mut self.gpe,
        };
        if slot.iter().any(|v| v == value) {
            return false;
        }
        slot.push(value.to_string());
        true
    }

    pub fn total(&self) -> usize {
        self.org.len() + self.person.len() + self.date.len() + self.money.len() + self.gpe.len()
    }
}

// ============ Report ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    #[serde(rename = "High")]
    pub high: usize,
    #[serde(rename = "Medium")]
    pub medium: usize,
    #[serde(rename = "Low")]
    pub low: usize,
}

impl RiskSummary {
    pub fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::High => self.high += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub filename: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentKind,
}

/// A failed enrichment call, kept on the report instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentIssue {
    /// `clause:<id>` or `document`
    pub scope: String,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub run_id: String,
    pub metadata: ReportMetadata,
    pub entities: EntityBag,
    pub clauses: Vec<AnnotatedClause>,
    pub risk_summary: RiskSummary,
    #[serde(default)]
    pub ai_summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comprehensive_summary: Option<String>,
    #[serde(default)]
    pub enrichment_errors: Vec<EnrichmentIssue>,
    pub text_preview: String,
    pub full_text: String,
}

impl AnalysisReport {
    pub fn high_risk_reasons(&self) -> Vec<String> {
        self.clauses
            .iter()
            .filter(|c| c.risk == RiskLevel::High)
            .map(|c| c.risk_reason.clone())
            .collect()
    }
}
