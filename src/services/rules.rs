// Rule Tables
// Ordered keyword/pattern tables driving segmentation, classification,
// risk scoring and entity extraction. Loaded once, then shared read-only.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::models::{ClauseCategory, EntityCategory, RiskLevel};
use crate::services::config_store::ConfigError;

static BUILTIN_RULES: OnceLock<Arc<CompiledRules>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingPattern {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordGroup {
    pub category: ClauseCategory,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRule {
    pub keyword: String,
    pub level: RiskLevel,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPatternSet {
    /// ORG, PERSON, DATE, MONEY, GPE; any other label lands in GPE.
    pub label: String,
    pub patterns: Vec<String>,
}

/// Serializable rule tables. Order matters in every list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTables {
    #[serde(default = "default_heading_patterns")]
    pub heading_patterns: Vec<HeadingPattern>,
    #[serde(default = "default_keyword_groups")]
    pub keyword_groups: Vec<KeywordGroup>,
    #[serde(default = "default_risk_rules")]
    pub risk_rules: Vec<RiskRule>,
    #[serde(default = "default_entity_patterns")]
    pub entity_patterns: Vec<EntityPatternSet>,
}

impl Default for RuleTables {
    fn default() -> Self {
        Self {
            heading_patterns: default_heading_patterns(),
            keyword_groups: default_keyword_groups(),
            risk_rules: default_risk_rules(),
            entity_patterns: default_entity_patterns(),
        }
    }
}

fn heading(name: &str, pattern: &str) -> HeadingPattern {
    HeadingPattern {
        name: name.to_string(),
        pattern: pattern.to_string(),
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn risk(keyword: &str, level: RiskLevel, reason: &str) -> RiskRule {
    RiskRule {
        keyword: keyword.to_string(),
        level,
        reason: reason.to_string(),
    }
}

fn default_heading_patterns() -> Vec<HeadingPattern> {
    vec![
        heading("dotted_numeric", r"^\s*(\d{1,2}\.\d{1,2}(\.\d{1,2})?)\s+(.+)"),
        heading("numeric", r"^\s*(\d{1,2}\.)\s+(.+)"),
        heading("article", r"^\s*(Article\s+[IVX]+)\s*[:.\-]?\s*(.+)"),
        heading("letter_item", r"^\s*([a-z]\))\s+(.+)"),
        heading("paren_letter_item", r"^\s*(\([a-z]\))\s+(.+)"),
    ]
}

fn default_keyword_groups() -> Vec<KeywordGroup> {
    // Prohibition first: "shall not" also contains the obligation keyword "shall".
    vec![
        KeywordGroup {
            category: ClauseCategory::Prohibition,
            keywords: words(&["shall not", "must not", "will not", "is prohibited from", "agrees not to"]),
        },
        KeywordGroup {
            category: ClauseCategory::Obligation,
            keywords: words(&["shall", "must", "will", "is required to", "agrees to"]),
        },
        KeywordGroup {
            category: ClauseCategory::Right,
            keywords: words(&["may", "has the right to", "is entitled to", "can"]),
        },
    ]
}

fn default_risk_rules() -> Vec<RiskRule> {
    vec![
        risk("terminate without cause", RiskLevel::High, "Unilateral termination right."),
        risk("terminate at any time", RiskLevel::High, "Unilateral termination right."),
        risk("indemnify", RiskLevel::Medium, "Potential uncapped liability."),
        risk("unlimited liability", RiskLevel::High, "Dangerous financial exposure."),
        risk("arbitration", RiskLevel::Medium, "Dispute resolution cost check required."),
        risk("non-compete", RiskLevel::High, "Restricts future business opportunities."),
        risk("exclusivity", RiskLevel::Medium, "Limits market freedom."),
    ]
}

fn default_entity_patterns() -> Vec<EntityPatternSet> {
    vec![
        EntityPatternSet {
            label: "MONEY".to_string(),
            patterns: words(&[r"Rs\.?\s*[\d,]+(\.\d{2})?", r"INR\s*[\d,]+", r"\$\s*[\d,]+"]),
        },
        EntityPatternSet {
            label: "DATE".to_string(),
            patterns: words(&[
                r"\d{1,2}(?:st|nd|rd|th)?\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*[\s,]+\d{2,4}",
                r"\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}",
                r"(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}",
            ]),
        },
        EntityPatternSet {
            label: "ORG".to_string(),
            patterns: words(&[r"(?i)(?:private limited|pvt\.? ltd\.?|limited|ltd\.?|inc\.?|corp\.?|llp|services)"]),
        },
        EntityPatternSet {
            label: "JURISDICTION".to_string(),
            patterns: words(&[r"(?i)courts? (?:of|in) [A-Z][a-z]+"]),
        },
    ]
}

impl RuleTables {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn compile(&self) -> Result<CompiledRules, regex::Error> {
        let headings = self
            .heading_patterns
            .iter()
            .map(|h| {
                RegexBuilder::new(&h.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| CompiledHeading {
                        name: h.name.clone(),
                        regex: re,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let keyword_groups = self
            .keyword_groups
            .iter()
            .map(|g| KeywordGroup {
                category: g.category,
                keywords: g.keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();

        let risk_rules = self
            .risk_rules
            .iter()
            .map(|r| RiskRule {
                keyword: r.keyword.to_lowercase(),
                level: r.level,
                reason: r.reason.clone(),
            })
            .collect();

        let mut entity_patterns = Vec::with_capacity(self.entity_patterns.len());
        for set in &self.entity_patterns {
            let category = EntityCategory::from_label(&set.label);
            for pattern in &set.patterns {
                entity_patterns.push((category, Regex::new(pattern)?));
            }
        }

        Ok(CompiledRules {
            headings,
            keyword_groups,
            risk_rules,
            entity_patterns,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledHeading {
    pub name: String,
    pub regex: Regex,
}

/// Rule tables ready for matching: regexes built, keywords lower-cased.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub headings: Vec<CompiledHeading>,
    pub keyword_groups: Vec<KeywordGroup>,
    pub risk_rules: Vec<RiskRule>,
    pub entity_patterns: Vec<(EntityCategory, Regex)>,
}

impl CompiledRules {
    /// The built-in tables, compiled on first use.
    pub fn builtin() -> Arc<CompiledRules> {
        BUILTIN_RULES
            .get_or_init(|| {
                Arc::new(
                    RuleTables::default()
                        .compile()
                        .expect("built-in rule tables must compile"),
                )
            })
            .clone()
    }

    /// Built-in tables unless a rules file is given.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Arc<CompiledRules>, ConfigError> {
        match path {
            Some(p) => Ok(Arc::new(RuleTables::load(p)?.compile()?)),
            None => Ok(Self::builtin()),
        }
    }
}
