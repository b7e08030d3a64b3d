//! Diagram graph indexing and step traversal.
//!
//! A diagram is a directed graph of steps, transitions, and gates connected
//! by `Connection`s. The engine never walks the raw connection list: it
//! builds a `GraphIndex` once (an arena of nodes with incoming/outgoing
//! adjacency by integer index) and asks it for the steps feeding into, or
//! fed by, a transition. Gates are transparent to those walks.

pub mod index;

pub use index::{GraphIndex, NodeKind};
