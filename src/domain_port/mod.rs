// store

mod session_store;

pub use session_store::*;

// repo

mod account_repo;
mod identity_resolver;

pub use account_repo::*;
pub use identity_resolver::*;

// transport and time

mod clock;
mod cookie_transport;

pub use clock::*;
pub use cookie_transport::*;
