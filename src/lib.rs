//! # xslcheck
//!
//! Static validation of XSLT-subset transformations against XSD schema pairs.
//!
//! Given a source schema, a target schema, and a stylesheet restricted to an
//! analyzable subset, the crate decides whether the transformation is
//! type-preserving (every valid source tree maps to a valid target tree) and
//! valid (the source language is contained in the preimage of the target
//! language), without ever executing the transformation.
//!
//! ## Pipeline
//!
//! 1. Subset linting of the stylesheet ([`linter`])
//! 2. Schema to regular tree grammar, for both schemas ([`grammar`])
//! 3. Stylesheet to macro tree transducer ([`transducer`])
//! 4. Type-preservation validation with a proof trace ([`validator`])
//! 5. Preimage computation and validity decision ([`preimage`], [`validity`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use xslcheck::analysis::{Analyzer, AnalysisRequest};
//!
//! let report = Analyzer::new().analyze(&AnalysisRequest {
//!     source_schema: source_xsd.into(),
//!     target_schema: target_xsd.into(),
//!     stylesheet: xslt.into(),
//! })?;
//!
//! if report.valid {
//!     println!("transformation is type-preserving and valid");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// XML surface
pub mod documents;
pub mod namespaces;

// Diagnostics
pub mod trace;

// Analysis components
pub mod grammar;
pub mod linter;
pub mod predicate;
pub mod preimage;
pub mod transducer;
pub mod validator;
pub mod validity;

// Request surface
pub mod analysis;

// Re-exports for convenience
pub use error::{Error, Result};

/// Version of the xslcheck library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSLT 1.0 namespace
pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
