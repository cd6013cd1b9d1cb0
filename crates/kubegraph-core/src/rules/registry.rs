//! Ordered registry of relationship rules.

use std::sync::Arc;

use crate::model::Resource;

use super::{
    IdentityBindingRule, NamespaceContainmentRule, NetworkEndpointRule, OwnershipRule,
    RelationshipRule, ResourceCatalog, RuleOutput, SelectorMatchRule, VolumeReferenceRule,
};

/// Rules evaluated per event, in registration order.
///
/// Evaluation order only affects the order of produced edges and
/// diagnostics; edge identity includes the relation, so rules never
/// overwrite each other's edges.
#[derive(Clone)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn RelationshipRule>>,
}

impl RuleRegistry {
    /// Registry with every built-in rule.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(OwnershipRule));
        registry.register(Arc::new(SelectorMatchRule));
        registry.register(Arc::new(VolumeReferenceRule));
        registry.register(Arc::new(NetworkEndpointRule));
        registry.register(Arc::new(IdentityBindingRule));
        registry.register(Arc::new(NamespaceContainmentRule));

        registry
    }

    /// Registry with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule. A rule with the same name replaces the earlier one in place.
    pub fn register(&mut self, rule: Arc<dyn RelationshipRule>) {
        match self.rules.iter().position(|r| r.name() == rule.name()) {
            Some(i) => self.rules[i] = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn rules(&self) -> &[Arc<dyn RelationshipRule>] {
        &self.rules
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule with `resource` as the declarer.
    pub fn infer_all(&self, resource: &Resource, catalog: &ResourceCatalog) -> RuleOutput {
        let mut out = RuleOutput::default();
        for rule in &self.rules {
            out.extend(rule.infer(resource, catalog));
        }
        out
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}
