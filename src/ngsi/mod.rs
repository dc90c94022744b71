//! Shared NGSI request/response normalization layer.
//!
//! - [`codec`]: forbidden-character escaping of attribute values
//! - [`action`]: action types and allowlist-driven option merging
//! - [`request`]: header, query and path assembly
//! - [`response`]: status × action classification
//! - [`context`]: service / service-path propagation on messages
//! - [`pagination`]: sequential listing driver with pluggable sinks

pub mod action;
pub mod codec;
pub mod context;
pub mod pagination;
pub mod request;
pub mod response;

pub use action::{ActionConfig, ActionType, OPTION_FLAGS, QUERY_KEYS};
pub use context::Scope;
pub use pagination::{BufferingSink, PageEnd, PageSink, StreamingSink, paginate};
pub use request::{HttpMethod, RequestBody, RequestBuilder, RequestDescriptor};
pub use response::{Decoding, ResponseOutcome, classify, classify_result};
