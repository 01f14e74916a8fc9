pub mod errors;
pub mod models;
pub mod repo;
pub mod report;
pub mod router;
pub mod summary;
pub mod sync;
pub mod wire;

pub use errors::*;
pub use models::*;
pub use repo::*;
pub use report::*;
pub use router::*;
pub use summary::*;
pub use sync::*;
