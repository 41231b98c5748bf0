mod identity_lookup_mysql;
mod refresh_token_repo_mysql;
mod util;

pub use identity_lookup_mysql::*;
pub use refresh_token_repo_mysql::*;
pub use util::*;
