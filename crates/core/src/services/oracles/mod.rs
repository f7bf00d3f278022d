pub mod command;
pub mod hashing;
pub mod retry;

pub use command::CommandOracle;
pub use hashing::{HashingOracle, DEFAULT_DIMENSIONS};
pub use retry::{RetryPolicy, RetryingOracle};
