// Risk Evaluator
// Scores a clause against the ordered risk rule table.

use std::sync::Arc;

use crate::models::{RiskAssessment, RiskLevel};
use crate::services::rules::CompiledRules;

const STANDARD_REASON: &str = "Standard clause.";

pub struct RiskEvaluator {
    rules: Arc<CompiledRules>,
}

impl RiskEvaluator {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self { rules }
    }

    /// A High hit returns immediately. Otherwise the last Medium hit in table
    /// order is kept, and with no hits the clause is Low.
    pub fn evaluate(&self, text: &str) -> RiskAssessment {
        let lowered = text.to_lowercase();
        let mut level = RiskLevel::Low;
        let mut reason: &str = STANDARD_REASON;

        for rule in &self.rules.risk_rules {
            if !lowered.contains(rule.keyword.as_str()) {
                continue;
            }
            match rule.level {
                RiskLevel::High => {
                    return RiskAssessment {
                        level: RiskLevel::High,
                        reason: rule.reason.clone(),
                    }
                }
                RiskLevel::Medium => {
                    level = RiskLevel::Medium;
                    reason = rule.reason.as_str();
                }
                RiskLevel::Low => {}
            }
        }

        RiskAssessment {
            level,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> RiskEvaluator {
        RiskEvaluator::new(CompiledRules::builtin())
    }

    #[test]
    fn test_high_short_circuits_medium() {
        let r = evaluator().evaluate("Supplier shall indemnify, accept arbitration and a Non-Compete.");
        assert_eq!(r.level, RiskLevel::High);
        assert_eq!(r.reason, "Restricts future business opportunities.");
    }

    #[test]
    fn test_last_medium_rule_wins() {
        let r = evaluator().evaluate("Exclusivity applies and the Vendor will indemnify; arbitration in Delhi.");
        assert_eq!(r.level, RiskLevel::Medium);
        // exclusivity is the last Medium rule in table order
        assert_eq!(r.reason, "Limits market freedom.");

        let r = evaluator().evaluate("Vendor will indemnify. Disputes go to arbitration.");
        assert_eq!(r.reason, "Dispute resolution cost check required.");
    }

    #[test]
    fn test_standard_clause() {
        let r = evaluator().evaluate("Notices are sent by email.");
        assert_eq!(r.level, RiskLevel::Low);
        assert_eq!(r.reason, "Standard clause.");

        let r = evaluator().evaluate("");
        assert_eq!(r.level, RiskLevel::Low);
    }

    #[test]
    fn test_termination_rule() {
        let r = evaluator().evaluate("The Client may Terminate At Any Time.");
        assert_eq!(r.level, RiskLevel::High);
        assert_eq!(r.reason, "Unilateral termination right.");
    }
}
