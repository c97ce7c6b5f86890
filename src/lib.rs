//! Local runtime for HTTP integration connectors.
//!
//! A [`Connector`] declares an authorization strategy and named actions. A
//! [`Runner`] invokes those actions, sending their requests through a
//! [`Transport`], refreshing OAuth2 tokens once per request when asked to, and
//! following `after_response` continuations until a value comes back.

pub mod auth;
pub mod config;
pub mod connector;
pub mod constants;
pub mod encoding;
pub mod engine;
pub mod errors;
pub mod http;
pub mod schema;
pub mod services;
pub mod utils;

pub use auth::{AuthContext, Authorization, OAuth2, Settings, TokenPersistence};
pub use config::EngineConfig;
pub use connector::{Action, ActionContext, Connector};
pub use engine::{Engine, ErrorReporter, Runner, Step};
pub use errors::{EngineError, ErrorKind, Frame};
pub use http::{
    MultipartPart, PreparedRequest, RawResponse, Request, RequestBuilder, Response, ReqwestTransport,
    Transport,
};
pub use schema::{Primitive, Time, UnicodeString};
