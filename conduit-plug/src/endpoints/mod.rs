//! Built-in endpoints.

mod http_endpoint;
mod rewrite;

pub use http_endpoint::HttpEndpoint;
pub use rewrite::RewriteEndpoint;
