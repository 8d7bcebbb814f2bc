//! Run-scoped diagnostics, infrastructure errors, and the working-directory
//! contract shared by every pipeline.

mod error;
mod issues;
mod resumen;
mod workdir;

pub use error::*;
pub use issues::*;
pub use resumen::*;
pub use workdir::*;
