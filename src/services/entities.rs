// Entity Scanner
// Regex-based entity extraction over the whole document.
// PERSON stays empty: no pattern covers it without a language model.

use std::sync::Arc;

use crate::models::EntityBag;
use crate::services::rules::CompiledRules;

pub struct EntityScanner {
    rules: Arc<CompiledRules>,
}

impl EntityScanner {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self { rules }
    }

    pub fn scan(&self, text: &str) -> EntityBag {
        let mut bag = EntityBag::default();
        for (category, regex) in &self.rules.entity_patterns {
            for m in regex.find_iter(text) {
                let value = m.as_str().trim();
                if !value.is_empty() {
                    bag.insert(*category, value);
                }
            }
        }
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityCategory;

    fn scanner() -> EntityScanner {
        EntityScanner::new(CompiledRules::builtin())
    }

    #[test]
    fn test_money_dedup() {
        let bag = scanner().scan("Fee of Rs. 5,000 payable. Late fee Rs. 5,000. Again Rs. 5,000 due.");
        assert_eq!(bag.get(EntityCategory::Money), &["Rs. 5,000".to_string()]);
    }

    #[test]
    fn test_dates_orgs_and_jurisdiction() {
        let text = "Acme Pvt. Ltd. signs on 5th March 2024 and 12/04/2024. Effective January 1, 2025. \
                    Subject to the courts of Mumbai.";
        let bag = scanner().scan(text);
        assert!(bag.date.contains(&"5th March 2024".to_string()));
        assert!(bag.date.contains(&"12/04/2024".to_string()));
        assert!(bag.date.contains(&"January 1, 2025".to_string()));
        assert!(bag.org.contains(&"Pvt. Ltd.".to_string()));
        assert_eq!(bag.gpe, vec!["courts of Mumbai".to_string()]);
        assert!(bag.person.is_empty());
    }

    #[test]
    fn test_dollar_and_inr() {
        let bag = scanner().scan("Pay $ 1,200 or INR 90,000.");
        assert_eq!(bag.money, vec!["INR 90,000".to_string(), "$ 1,200".to_string()]);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(scanner().scan("").total(), 0);
    }
}
