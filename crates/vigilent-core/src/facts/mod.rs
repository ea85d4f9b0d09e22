//! Contract facts: parsing, validation and content hashing.
//!
//! Facts are the immutable input to every analysis. They are parsed from
//! YAML or JSON and validated before any rule runs.

mod fingerprint;
mod parser;

pub use fingerprint::ContractHash;
pub use parser::{ContractFacts, FactsError};
