pub mod account;
pub mod community;
pub mod lemmy;

pub use account::*;
pub use community::*;
pub use lemmy::*;
