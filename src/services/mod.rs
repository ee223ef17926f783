mod token;

pub use token::{DispenseError, TokenRequest, TokenResponse, TokenService};
#[cfg(test)]
pub(crate) use token::tests as test_doubles;
