//! Process-wide logging. Bootstrapped before settings are read so that
//! configuration errors are logged too.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
