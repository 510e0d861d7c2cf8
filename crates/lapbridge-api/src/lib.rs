// lapbridge-api: async client for the lap-timing HTTP API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::BearerToken;
pub use client::{Endpoints, LapClient};
pub use error::Error;
pub use models::TagEventBody;
pub use transport::{TlsMode, TransportConfig};
