pub mod auth;
pub mod json;
pub mod response;

pub use auth::{Authenticated, Authenticator, Authorized, Requirement};
pub use json::JsonBody;
pub use response::{ApiResponse, ApiResult};
