//! Vector indexes over embedded document nodes

pub mod vector_store;

pub use vector_store::VectorStoreIndex;
