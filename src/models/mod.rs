pub mod user;
pub mod chat;
pub mod usage;
pub mod order;
pub mod response;

pub use user::*;
pub use chat::*;
pub use usage::*;
pub use order::*;
pub use response::*;
