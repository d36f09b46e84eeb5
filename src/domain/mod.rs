mod amount;
mod entry;
mod rating;
mod statement;
mod user;

pub use amount::*;
pub use entry::*;
pub use rating::*;
pub use statement::*;
pub use user::*;
