mod server;
mod trusted_proxies;

pub use server::*;
pub use trusted_proxies::*;
