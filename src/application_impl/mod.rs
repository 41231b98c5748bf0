mod anti_forgery_provider_impl;
mod rate_limiter_impl;
mod refresh_token_service_impl;
mod sweeper;
mod token;

pub use anti_forgery_provider_impl::*;
pub use rate_limiter_impl::*;
pub use refresh_token_service_impl::*;
pub use sweeper::*;
pub use token::*;
