pub mod codec;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod paths;
pub mod traits;

pub use codec::Descriptor;
pub use config::*;
pub use errors::*;
pub use models::*;
pub use traits::*;
