mod cookies;
mod error;
mod handler;
mod router;

pub use cookies::{CookiePolicy, ResponseCookies, SameSite};
pub use error::{ApiErrorCode, ApiRejection, recover_error};
pub use handler::ApiResponse;
pub use router::routes;
