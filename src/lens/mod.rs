//! Lens module
//!
//! Lenses combine lookup logic with output formatting so the same code serves
//! the CLI and library users.
//!
//! # Architecture
//!
//! - [`query`]: input classification
//! - [`cidr`]: address range to CIDR reduction
//! - [`lookup`]: the [`lookup::LookupLens`] entry point, remote client,
//!   dispatch, concurrent pipeline and output rendering
//! - [`utils`]: output formats and list expansion
//!
//! ```rust,ignore
//! use asnmap::lens::lookup::{LookupLens, LookupInput};
//! use asnmap::lens::query::{classify, Query};
//! use asnmap::lens::cidr::reduce;
//! ```

pub mod utils;

pub mod cidr;
pub mod lookup;
pub mod query;
