//! Networking contracts: URL resolution, response messages and the fetch
//! collaborator interface. No socket or TLS transport lives here.

pub mod fetch;
pub mod http;
pub mod url;

pub use fetch::FetchLimits;
pub use fetch::FetchedDocument;
pub use fetch::Fetcher;
pub use fetch::fetch_document;
pub use http::FetchResponse;
pub use http::HeaderMap;
pub use url::Scheme;
pub use url::UrlParts;
pub use url::is_safe_target;
pub use url::resolve;
pub use url::try_resolve;
