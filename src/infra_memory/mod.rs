//! Process-local stores. `LocalTokenStore` is the anti-forgery fallback tier;
//! the `Memory*` adapters back the `fake` storage backend and the tests.

mod clock;
mod local_token_store;
mod memory_identity_lookup;
mod memory_rate_window_store;
mod memory_refresh_token_repo;
mod memory_token_cache;
mod switch;

pub use clock::*;
pub use local_token_store::*;
pub use memory_identity_lookup::*;
pub use memory_rate_window_store::*;
pub use memory_refresh_token_repo::*;
pub use memory_token_cache::*;
pub use switch::*;
