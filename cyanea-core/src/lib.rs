//! Shared primitives, traits, and utilities for the Cyanea bioinformatics ecosystem.
//!
//! `cyanea-core` provides the foundation that all other Cyanea crates build on:
//!
//! - **Error types**: [`CyaneaError`] and [`Result`] for structured error handling
//! - **Traits**: Core abstractions like [`Scored`], [`Annotated`], [`Summarizable`]
//! - **Masks**: [`ValidityMask`] for tables with explicitly missing values

pub mod error;
pub mod mask;
pub mod traits;

pub use error::{CyaneaError, Result};
pub use mask::ValidityMask;
pub use traits::*;
