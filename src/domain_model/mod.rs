mod rate_limit;
mod refresh_token;
mod subject;

pub use rate_limit::*;
pub use refresh_token::*;
pub use subject::*;
