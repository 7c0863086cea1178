// Clause Classifier
// Labels a clause with its legal nature using ordered keyword groups.

use std::sync::Arc;

use crate::models::ClauseCategory;
use crate::services::rules::CompiledRules;

pub struct ClauseClassifier {
    rules: Arc<CompiledRules>,
}

impl ClauseClassifier {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self { rules }
    }

    /// First keyword group with a substring hit wins; otherwise Definition/Neutral.
    pub fn classify(&self, text: &str) -> ClauseCategory {
        let lowered = text.to_lowercase();
        self.rules
            .keyword_groups
            .iter()
            .find(|group| group.keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|group| group.category)
            .unwrap_or(ClauseCategory::DefinitionNeutral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rules::{KeywordGroup, RuleTables};

    fn classifier() -> ClauseClassifier {
        ClauseClassifier::new(CompiledRules::builtin())
    }

    #[test]
    fn test_prohibition_takes_precedence_over_obligation() {
        let c = classifier();
        assert_eq!(
            c.classify("The Supplier shall deliver and shall not subcontract."),
            ClauseCategory::Prohibition
        );
        assert_eq!(c.classify("Vendor AGREES NOT TO disclose."), ClauseCategory::Prohibition);
    }

    #[test]
    fn test_obligation_and_right() {
        let c = classifier();
        assert_eq!(c.classify("The Client must pay within 30 days."), ClauseCategory::Obligation);
        assert_eq!(c.classify("The Client may audit the books."), ClauseCategory::Right);
    }

    #[test]
    fn test_neutral_and_empty() {
        let c = classifier();
        assert_eq!(c.classify("\"Affiliate\" means any entity."), ClauseCategory::DefinitionNeutral);
        assert_eq!(c.classify(""), ClauseCategory::DefinitionNeutral);
    }

    #[test]
    fn test_fixture_table_substitution() {
        let mut tables = RuleTables::default();
        tables.keyword_groups = vec![KeywordGroup {
            category: ClauseCategory::Right,
            keywords: vec!["Option".to_string()],
        }];
        let c = ClauseClassifier::new(Arc::new(tables.compile().unwrap()));
        assert_eq!(c.classify("Buyer holds an option to renew."), ClauseCategory::Right);
        assert_eq!(c.classify("Buyer shall pay."), ClauseCategory::DefinitionNeutral);
    }
}
