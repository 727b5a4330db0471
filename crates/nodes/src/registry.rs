//! Node registry — maps a node-type key to a factory.
//!
//! One registry instance is constructed at process start and passed by
//! reference wherever lookup is needed; there is no global state. The map
//! is `BTreeMap`-backed so discovery iterates in a stable order.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::aggregate::{GroupByNode, SummaryNode};
use crate::calculate::{AgingNode, CurrencyConvertNode, DsoNode, OutstandingNode};
use crate::collab::{InvoiceSource, RateSource, ReportRenderer};
use crate::fetch::InvoiceFetchNode;
use crate::filter::{FilterNode, SortNode};
use crate::output::ReportOutputNode;
use crate::traits::{NodeCategory, ProcessingNode};

/// Registry keys for the built-in node set.
pub mod keys {
    pub const INVOICE_FETCH: &str = "invoice_fetch";
    pub const AGING: &str = "aging";
    pub const OUTSTANDING: &str = "outstanding";
    pub const CURRENCY_CONVERT: &str = "currency_convert";
    pub const DSO: &str = "dso";
    pub const FILTER: &str = "filter";
    pub const SORT: &str = "sort";
    pub const GROUP_BY: &str = "group_by";
    pub const SUMMARY: &str = "summary";
    pub const REPORT_OUTPUT: &str = "report_output";
}

/// Constructs a fresh node instance for one execution.
pub type NodeFactory = Arc<dyn Fn() -> Arc<dyn ProcessingNode> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The key is already bound to a *different* factory. Re-registering
    /// the same factory is an idempotent no-op.
    #[error("node type '{0}' is already registered with a different factory")]
    DuplicateRegistration(String),

    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),
}

struct RegistryEntry {
    category: NodeCategory,
    factory: NodeFactory,
}

/// Maps node-type keys to factories, with category metadata for discovery.
#[derive(Default)]
pub struct NodeRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `key`.
    ///
    /// The entry's category is probed from a fresh instance at registration
    /// time, so discovery never needs to instantiate again.
    ///
    /// # Errors
    /// [`RegistryError::DuplicateRegistration`] if `key` is bound to a
    /// different factory.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        factory: NodeFactory,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        if let Some(existing) = self.entries.get(&key) {
            if Arc::ptr_eq(&existing.factory, &factory) {
                return Ok(());
            }
            return Err(RegistryError::DuplicateRegistration(key));
        }
        let category = factory().category();
        self.entries.insert(key, RegistryEntry { category, factory });
        Ok(())
    }

    /// Look up the factory for `key`.
    pub fn resolve(&self, key: &str) -> Result<NodeFactory, RegistryError> {
        self.entries
            .get(key)
            .map(|e| e.factory.clone())
            .ok_or_else(|| RegistryError::UnknownNodeType(key.to_owned()))
    }

    /// Construct a node instance for `key`.
    pub fn instantiate(&self, key: &str) -> Result<Arc<dyn ProcessingNode>, RegistryError> {
        Ok(self.resolve(key)?())
    }

    pub fn category_of(&self, key: &str) -> Result<NodeCategory, RegistryError> {
        self.entries
            .get(key)
            .map(|e| e.category)
            .ok_or_else(|| RegistryError::UnknownNodeType(key.to_owned()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered type keys in `category`, in key order. The iterator is
    /// lazy and restartable; concurrent readers are fine.
    pub fn list_by_category(&self, category: NodeCategory) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(move |(_, e)| e.category == category)
            .map(|(k, _)| k.as_str())
    }

    /// All registered keys with their categories, in key order.
    pub fn list(&self) -> impl Iterator<Item = (&str, NodeCategory)> + '_ {
        self.entries.iter().map(|(k, e)| (k.as_str(), e.category))
    }

    /// Build a registry wired with the standard node set against the given
    /// collaborators.
    pub fn with_builtins(
        invoices: Arc<dyn InvoiceSource>,
        rates: Arc<dyn RateSource>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        let mut registry = Self::new();

        let src = invoices;
        registry.must_register(keys::INVOICE_FETCH, {
            let src = src.clone();
            Arc::new(move || Arc::new(InvoiceFetchNode::new(src.clone())) as Arc<dyn ProcessingNode>)
        });
        registry.must_register(
            keys::AGING,
            Arc::new(|| Arc::new(AgingNode) as Arc<dyn ProcessingNode>),
        );
        registry.must_register(
            keys::OUTSTANDING,
            Arc::new(|| Arc::new(OutstandingNode) as Arc<dyn ProcessingNode>),
        );
        registry.must_register(keys::CURRENCY_CONVERT, {
            let rates = rates.clone();
            Arc::new(move || {
                Arc::new(CurrencyConvertNode::new(rates.clone())) as Arc<dyn ProcessingNode>
            })
        });
        registry.must_register(
            keys::DSO,
            Arc::new(|| Arc::new(DsoNode) as Arc<dyn ProcessingNode>),
        );
        registry.must_register(
            keys::FILTER,
            Arc::new(|| Arc::new(FilterNode) as Arc<dyn ProcessingNode>),
        );
        registry.must_register(
            keys::SORT,
            Arc::new(|| Arc::new(SortNode) as Arc<dyn ProcessingNode>),
        );
        registry.must_register(
            keys::GROUP_BY,
            Arc::new(|| Arc::new(GroupByNode) as Arc<dyn ProcessingNode>),
        );
        registry.must_register(
            keys::SUMMARY,
            Arc::new(|| Arc::new(SummaryNode) as Arc<dyn ProcessingNode>),
        );
        registry.must_register(keys::REPORT_OUTPUT, {
            let renderer = renderer.clone();
            Arc::new(move || {
                Arc::new(ReportOutputNode::new(renderer.clone())) as Arc<dyn ProcessingNode>
            })
        });

        registry
    }

    fn must_register(&mut self, key: &str, factory: NodeFactory) {
        self.register(key, factory)
            .expect("builtin node keys are distinct");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockNode;
    use crate::payload::Payload;

    fn mock_factory() -> NodeFactory {
        Arc::new(|| {
            Arc::new(MockNode::returning("m", Payload::Records(vec![]))) as Arc<dyn ProcessingNode>
        })
    }

    #[test]
    fn resolve_unknown_type_fails() {
        let registry = NodeRegistry::new();
        assert!(matches!(
            registry.resolve("ghost"),
            Err(RegistryError::UnknownNodeType(k)) if k == "ghost"
        ));
    }

    #[test]
    fn reregistering_same_factory_is_idempotent() {
        let mut registry = NodeRegistry::new();
        let factory = mock_factory();
        registry.register("mock", factory.clone()).unwrap();
        registry.register("mock", factory).unwrap();
        assert!(registry.contains("mock"));
    }

    #[test]
    fn reregistering_different_factory_is_rejected() {
        let mut registry = NodeRegistry::new();
        registry.register("mock", mock_factory()).unwrap();
        assert!(matches!(
            registry.register("mock", mock_factory()),
            Err(RegistryError::DuplicateRegistration(k)) if k == "mock"
        ));
    }

    #[test]
    fn listing_by_category_is_stable_and_restartable() {
        use crate::collab::{FixedRateTable, InMemoryInvoices, InMemoryRenderer};

        let registry = NodeRegistry::with_builtins(
            Arc::new(InMemoryInvoices::default()),
            Arc::new(FixedRateTable::new()),
            InMemoryRenderer::new(),
        );

        let calc_nodes: Vec<&str> = registry.list_by_category(NodeCategory::Calculation).collect();
        assert_eq!(
            calc_nodes,
            vec!["aging", "currency_convert", "dso", "outstanding"]
        );

        // Restartable: a second pass yields the same sequence.
        let again: Vec<&str> = registry.list_by_category(NodeCategory::Calculation).collect();
        assert_eq!(calc_nodes, again);

        let fetch: Vec<&str> = registry.list_by_category(NodeCategory::Fetch).collect();
        assert_eq!(fetch, vec!["invoice_fetch"]);
    }
}
