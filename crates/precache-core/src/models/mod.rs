//! Request and response types passed between the interceptor, cache
//! storage and the network.

pub mod request;
pub mod response;

pub use request::{Request, RequestKey};
pub use response::Response;
