mod account_store_memory;
mod session_store_memory;

pub use account_store_memory::*;
pub use session_store_memory::*;
