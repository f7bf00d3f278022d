pub mod corpus;
pub mod ingest;
pub mod normalize;
pub mod oracles;
pub mod query;
pub mod store;

pub use corpus::*;
pub use ingest::*;
pub use normalize::*;
pub use oracles::*;
pub use query::*;
pub use store::*;
