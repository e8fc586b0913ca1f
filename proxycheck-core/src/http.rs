mod client;
mod error;
mod types;
mod util;

pub use client::{DEFAULT_CONNECT_TIMEOUT, HttpClient};
pub use error::{Error, TransportFailureKind, Result};
pub use types::{HeaderList, HttpRequest, HttpResponse};
