mod clock;
mod store_error;

pub use clock::*;
pub use store_error::*;

// store

mod rate_window_store;
mod token_cache;

pub use rate_window_store::*;
pub use token_cache::*;

// repo

mod identity_lookup;
mod refresh_token_repo;

pub use identity_lookup::*;
pub use refresh_token_repo::*;
