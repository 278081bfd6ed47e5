//! Client side of the network boundary
//!
//! - `client`: the secure API client, sole network egress
//! - `adapter`: maps proxy responses into domain records
//! - `mock`: fixture data for development

pub mod adapter;
pub mod client;
pub mod error;
pub mod guard;
pub mod mock;
pub mod transport;

pub use adapter::{
    classify_source, map_media_item, map_source, with_mock_fallback, MockPolicy, PStreamApi,
};
pub use client::{ApiClient, EndpointResolver, FixedEndpoint};
pub use error::{codes, is_api_error, is_network_error, normalize_error, ApiError, ClientError, Failure};
pub use guard::{extract_port, BackendAccessForbidden, DestinationGuard};
pub use mock::MockCatalog;
pub use transport::{HttpTransport, RequestContext, Transport, TransportFailure, TransportResponse};
