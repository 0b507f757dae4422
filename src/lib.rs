//! Declarative HTTP client runtime: declare an interface's operations and
//! get back a callable client, without hand-assembling URLs and requests.
//!
//! Building blocks, in dependency order: [`uri_template`] (RFC 6570
//! expansion) underlies [`request_template`] (query/header/body resolution
//! per request), which [`contract`] (declaration parsing) and
//! [`template_builder`] (argument binding) feed. [`resilience`], [`target`],
//! and [`interceptor`] are the per-attempt collaborators [`executor`]'s
//! pipeline drives; [`circuit`] wraps that pipeline with an optional
//! fallback. [`runtime`] combines all of it into one immutable, shareable
//! client built via [`config`].

pub mod circuit;
pub mod config;
pub mod constants;
pub mod contract;
pub mod error;
pub mod executor;
pub mod interceptor;
pub mod invocation;
pub mod logging;
pub mod request_template;
pub mod resilience;
pub mod runtime;
pub mod target;
pub mod template_builder;
pub mod uri_template;

pub use config::{ClientConfig, RuntimeBuilder};
pub use error::Error;
pub use executor::ResponseMode;
pub use invocation::{ExecutionContext, ExecutionResult, OperationCall};
pub use runtime::Runtime;
