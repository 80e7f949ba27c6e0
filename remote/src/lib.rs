// exported modules
pub mod error;
pub mod host;
pub mod model;

// re-exports
pub use error::*;
pub use host::RemoteHost;
pub use model::*;
pub use reqwest::StatusCode;
