//! Defensive XML loading and the namespace-tolerant query layer.
//!
//! Every extractor in this crate is written against this module only,
//! never against a raw parser API. The lookup cascade — qualified search
//! under one binding set, then another, then an unqualified local-name
//! match — is what keeps the extractors working across CFDI 3.3, CFDI 4.0,
//! and payroll complements stamped without a namespace prefix.

mod dom;
mod query;

pub use dom::*;
pub use query::*;
