//! Retrieval-augmented generation.
//!
//! `Retriever` runs gated similarity search and grounded question
//! answering over the vector store; `Comparator` narrows retrieval to
//! remittance fintechs and frames a comparison question.

mod compare;
mod engine;

pub use compare::{Comparator, Comparison};
pub use engine::{Answer, Retriever, SearchHit, SourceRef, StoredEntity};
