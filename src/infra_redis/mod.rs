mod rate_window_store_redis;
mod token_cache_redis;

pub use rate_window_store_redis::*;
pub use token_cache_redis::*;
