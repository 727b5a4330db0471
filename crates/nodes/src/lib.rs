//! `nodes` crate — the `ProcessingNode` trait, the typed payload model,
//! the node registry, and the built-in node implementations.
//!
//! Every node — built-in and external alike — implements [`ProcessingNode`].
//! The engine crate dispatches execution through this trait object, looked
//! up via [`NodeRegistry`].

pub mod aggregate;
pub mod calculate;
pub mod collab;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod mock;
pub mod output;
pub mod payload;
pub mod registry;
pub mod traits;

pub use error::NodeError;
pub use payload::{InvoiceCategory, InvoiceRecord, Payload, PaymentState};
pub use registry::{NodeFactory, NodeRegistry, RegistryError};
pub use traits::{ExecutionContext, NodeCategory, NodeInput, ProcessingNode};
