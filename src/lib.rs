#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! asnmap - map ASNs, IPs, domains and organizations to network ranges
//!
//! asnmap classifies each input, queries an ASN lookup service (resolving
//! domains to addresses first), merges equivalent answers and reduces every
//! announced address range to its minimal list of CIDR blocks. It can be used
//! as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `cli` (default) | The `asnmap` binary and clap derives on lens types | `clap`, `tracing-subscriber`, `tokio` |
//!
//! ```toml
//! # Library only
//! asnmap = { version = "0.3", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - **[`lens`]**: lookup logic
//!   - `query`: input classification
//!   - `cidr`: range to CIDR reduction
//!   - `lookup`: remote client, dispatch, concurrent pipeline, rendering
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use asnmap::{AsnmapConfig, LookupLens};
//!
//! let config = AsnmapConfig::new(&None)?;
//! let lens = LookupLens::new(&config)?;
//! for record in lens.lookup("AS14421")? {
//!     for block in record.cidrs()? {
//!         println!("{}", block);
//!     }
//! }
//! ```
//!
//! ## Range Reduction
//!
//! ```rust
//! use asnmap::lens::cidr::reduce_str;
//!
//! let blocks = reduce_str("104.16.0.0", "104.21.127.255").unwrap();
//! let blocks: Vec<String> = blocks.iter().map(|b| b.to_string()).collect();
//! assert_eq!(blocks, vec!["104.16.0.0/14", "104.20.0.0/16", "104.21.0.0/17"]);
//! ```

pub mod config;
pub mod lens;

// =============================================================================
// Configuration
// =============================================================================

pub use config::AsnmapConfig;

// =============================================================================
// Lens Module
// =============================================================================

pub use lens::cidr::{reduce, CidrBlock, InvalidRangeError};
pub use lens::lookup::{
    CancelHandle, LookupError, LookupInput, LookupLens, PipelineError, PipelineSummary,
    ResultBatch, ResultRecord,
};
pub use lens::query::{classify, classify_with_hint, InputKind, Query};
pub use lens::utils::OutputFormat;
