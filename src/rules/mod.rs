pub mod cost;
pub mod data_protection;
pub mod eks;
pub mod kubernetes;
pub mod security;

use std::collections::HashSet;

use crate::errors::EngineError;
use crate::inventory::finding::Finding;
use crate::inventory::RuleContext;

/// A stateless, side-effect-free predicate over a `RuleContext`. Rules never
/// perform I/O and never touch the clock except to stamp `detected_at` on a
/// finding they are emitting (spec §4.2). Safe to share across `RuleContext`
/// invocations — the registry stores rules behind `Box<dyn Rule>` and never
/// clones them per-context.
pub trait Rule: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding>;
}

/// Ordered, insertion-preserving rule registry. `register` rejects duplicate
/// IDs to catch catalog wiring mistakes early — returning a `Result` rather
/// than panicking, since a registry can be rebuilt at request time rather
/// than only at process startup.
#[derive(Default)]
pub struct Registry {
    rules: Vec<Box<dyn Rule>>,
    seen_ids: HashSet<&'static str>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn register(&mut self, rule: Box<dyn Rule>) -> Result<(), EngineError> {
        if !self.seen_ids.insert(rule.id()) {
            return Err(duplicate_rule_error(rule.id()));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Invokes every registered rule sequentially on one context and
    /// concatenates their findings, preserving registration order.
    pub fn evaluate_all(&self, ctx: &RuleContext) -> Vec<Finding> {
        self.rules.iter().flat_map(|rule| rule.evaluate(ctx)).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn duplicate_rule_error(id: &'static str) -> EngineError {
    EngineError::DuplicateRule(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str);
    impl Rule for Dummy {
        fn id(&self) -> &'static str {
            self.0
        }
        fn name(&self) -> &'static str {
            "dummy"
        }
        fn evaluate(&self, _ctx: &RuleContext) -> Vec<Finding> {
            Vec::new()
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = Registry::new();
        registry.register(Box::new(Dummy("A"))).unwrap();
        let result = registry.register(Box::new(Dummy("A")));
        assert!(result.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn evaluate_all_preserves_insertion_order() {
        struct OneFinding(&'static str);
        impl Rule for OneFinding {
            fn id(&self) -> &'static str {
                self.0
            }
            fn name(&self) -> &'static str {
                self.0
            }
            fn evaluate(&self, _ctx: &RuleContext) -> Vec<Finding> {
                vec![crate::rules::tests_support::finding_stub(self.0)]
            }
        }
        let mut registry = Registry::new();
        registry.register(Box::new(OneFinding("first"))).unwrap();
        registry.register(Box::new(OneFinding("second"))).unwrap();
        let ctx = crate::rules::tests_support::empty_ctx();
        let findings = registry.evaluate_all(&ctx);
        assert_eq!(findings[0].rule_id, "first");
        assert_eq!(findings[1].rule_id, "second");
    }
}

/// Small shared test helpers used across rule unit tests (kept crate-visible
/// under `#[cfg(test)]` so every `rules::*` submodule's tests can build a
/// minimal `RuleContext`/`Finding` without duplicating boilerplate).
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use crate::inventory::finding::{Domain, ResourceType};
    use chrono::Utc;
    use std::collections::BTreeMap;

    pub fn empty_ctx() -> RuleContext {
        RuleContext {
            account_id: "123456789012".into(),
            profile: "default".into(),
            region_data: None,
            cost_summary: None,
            cluster_data: None,
            policy: None,
        }
    }

    pub fn finding_stub(rule_id: &str) -> Finding {
        Finding {
            id: format!("{rule_id}-stub"),
            rule_id: rule_id.to_string(),
            resource_id: "stub".into(),
            resource_type: ResourceType::Ec2Instance,
            region: "us-east-1".into(),
            account_id: "123456789012".into(),
            profile: "default".into(),
            domain: Some(Domain::Cost),
            severity: crate::inventory::severity::Severity::Info,
            estimated_monthly_savings: 0.0,
            explanation: String::new(),
            recommendation: String::new(),
            detected_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }
}
