#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! List-query state machine for the automation controller admin console.
//!
//! Layout:
//! - `qs.rs`: namespaced query-string codec
//! - `request.rs`: async request state with last-request-wins semantics
//! - `selection.rs`: page-scoped row selection
//! - `batch.rs`: multi-item delete/disassociate with per-item reporting
//! - `delete_details.rs`: related-resource counts shown before deletes
//! - `search.rs`: searchable keys, lookups and toolbar param edits
//! - `list.rs`: the list screen controller combining all of the above
//! - `api.rs` / `http.rs`: REST seam and its `reqwest` implementation
//! - `context.rs` / `session.rs`: configuration, DI context and session facts

pub mod api;
pub mod batch;
pub mod context;
pub mod delete_details;
pub mod error;
pub mod http;
pub mod list;
pub mod qs;
pub mod request;
pub mod search;
pub mod selection;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use api::ResourceApi;
pub use context::{ConsoleConfig, ConsoleContext};
pub use error::{ApiError, ApiResult, ConsoleError, ConsoleResult};
pub use http::HttpApiClient;
pub use list::{ListData, ListPhase, ListScreen};
pub use request::{RequestCoordinator, RequestState, Settlement};
pub use selection::{Keyed, Selection};
