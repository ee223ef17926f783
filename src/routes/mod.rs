mod error;
pub mod health;
pub mod token;

pub use error::{ApiError, DENIED_MESSAGE, ErrorInfo, ErrorResponse};
