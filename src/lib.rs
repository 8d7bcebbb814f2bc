//! # comprobante
//!
//! Back-office toolkit for Mexican electronic invoices (CFDI XML):
//! classification into Nómina/Gasto buckets, payroll and invoice data
//! extraction into xlsx reports, and fiscal-status validation against the
//! SAT web service.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//! Floating point appears only at the spreadsheet-cell boundary.
//!
//! Real-world CFDIs come from many vendors' stamping software: CFDI 3.3 or
//! 4.0 namespaces, payroll complements with or without the `nomina12`
//! prefix, sometimes an unprefixed `Comprobante` root. The [`xml`] query
//! layer absorbs that variance (qualified lookup, alternate namespace,
//! local-name fallback) so the extractors stay schema-version-agnostic.
//!
//! Processing never aborts on a bad file. Every stage degrades to a default
//! plus a recorded diagnostic in the run's [`IssueTracker`]; only an empty
//! input directory or an unwritable output artifact ends a run early.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Diagnostics, defensive XML loading, query layer |
//! | `clasificador` | Nómina/Gasto/Vacíos folder classification + ZIP |
//! | `reportes` | xlsx report styling helpers |
//! | `nomina` | Payroll perception/deduction/subsidy extraction |
//! | `extractor` | Invoice & payment-complement extraction |
//! | `validacion` | SAT status lookup + validation report |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod xml;

#[cfg(feature = "clasificador")]
pub mod clasificador;

#[cfg(feature = "reportes")]
pub mod reportes;

#[cfg(feature = "nomina")]
pub mod nomina;

#[cfg(feature = "extractor")]
pub mod extractor;

#[cfg(feature = "validacion")]
pub mod validacion;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
