//! Authenticated HTTP client for the MediSecure API.
//!
//! [`AuthenticatedHttpClient`] attaches the stored bearer token to every
//! request. When the server answers 401 the client refreshes the token once,
//! queues every other request that fails meanwhile, and replays them all with
//! the new token. If the refresh cannot succeed, the stored session is cleared
//! and the [`Navigator`] is asked to show the login screen.
//!
//! Network access goes through the [`Transport`] trait; [`ReqwestTransport`]
//! is the production implementation.

mod client;
mod coordinator;
pub mod endpoints;
mod error;
mod navigation;
mod refresh_fsm;
mod transport;

pub use client::{AuthenticatedHttpClient, ClientConfig, RequestOptions};
pub use error::{ClientError, ClientResult, NetworkErrorKind, TransportError};
pub use navigation::{FnNavigator, LogNavigator, Navigator};
pub use refresh_fsm::RefreshState;
pub use transport::{
    ReqwestTransport, RequestBody, Transport, TransportRequest, TransportResponse,
};

pub use reqwest::header::{HeaderMap, HeaderValue};
pub use reqwest::{Method, StatusCode};
