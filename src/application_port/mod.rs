mod anti_forgery;
mod rate_limiter;
mod refresh_token_service;

pub use anti_forgery::*;
pub use rate_limiter::*;
pub use refresh_token_service::*;
