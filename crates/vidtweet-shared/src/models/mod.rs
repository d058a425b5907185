mod page;
mod user;
mod video;

pub use page::*;
pub use user::*;
pub use video::*;
