pub mod jwt;
pub mod password;
pub mod webhook;

pub use jwt::*;
pub use password::*;
pub use webhook::*;
