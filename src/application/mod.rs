// Application layer - use cases and orchestration over the repository.

mod clock;
pub mod credentials;
pub mod error;
pub mod service;

pub use clock::*;
pub use error::*;
pub use service::*;
