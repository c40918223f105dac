//! Object node graph: a tree of nodes with typed connections layered on top

mod connection;
mod history;
mod node;
mod store;


pub use connection::{Connection, ConnectionMetadata, Strength};
pub use history::ObjectGenerationRecord;
pub use node::{NodeId, NodeMetadata, NodeSource, NodeUpdate, ObjectNode, Properties, PropertyValue};
pub use store::{DanglingConnection, IntegrityIssue, ObjectGraph};
