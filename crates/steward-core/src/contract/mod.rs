//! Contract parsing and validation.
//!
//! Stewardship contracts are structured data validated against JSON Schema.
//! This module parses YAML/JSON documents into an immutable [`Contract`].

mod parser;
mod schema;

pub use parser::{Acceptance, Accountability, Boundaries, Contract, ContractError, Intent, Rule};
pub use schema::validate_contract_schema;
