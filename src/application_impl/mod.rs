mod auth_gate;
mod auth_service_impl;
mod clock_fake;
mod clock_impl;
mod deadline;
mod password_hasher_argon2;
mod session_manager;
mod token_issuer_jwt;
mod user_service_impl;

pub use auth_gate::*;
pub use auth_service_impl::*;
pub use clock_fake::*;
pub use clock_impl::*;
pub use password_hasher_argon2::*;
pub use session_manager::*;
pub use token_issuer_jwt::*;
pub use user_service_impl::*;
