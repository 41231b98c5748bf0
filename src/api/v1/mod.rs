mod error;
mod guard;
mod handler;
mod router;

pub use error::{ApiErrorCode, recover_error};
pub use guard::{anti_forgery, client_ip, rate_limited, session_key};
pub use handler::{ApiResponse, CSRF_HEADER};
pub use router::routes;
