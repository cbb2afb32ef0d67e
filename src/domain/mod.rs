pub mod farm;
pub mod forecast;
pub mod weather;

pub use farm::*;
pub use forecast::*;
pub use weather::*;
