//! DNS MX resolution for the pipeline's second stage.
//!
//! The public entry point is [`resolve_mx`], which performs a single bounded
//! lookup through a [`LookupMx`] implementation and returns a [`MxStatus`]
//! describing the outcome.

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{LookupMx, SystemResolver, resolve_mx};
pub use types::{MxRecord, MxStatus};
