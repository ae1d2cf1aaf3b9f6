//! Domain models for the Agri Advisor platform

mod conversation;
mod detection;
mod location;
mod product;
mod soil;
mod weather;

pub use conversation::*;
pub use detection::*;
pub use location::*;
pub use product::*;
pub use soil::*;
pub use weather::*;
