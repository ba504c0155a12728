//! Schema-driven desired/existing tree comparison.

pub mod engine;
pub mod result;

pub use engine::{covers, differs};
pub use result::{DiffError, DiffReason, DiffResult};
