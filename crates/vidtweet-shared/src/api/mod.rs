mod auth;
mod response;

pub use auth::*;
pub use response::*;
