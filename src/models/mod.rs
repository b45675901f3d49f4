//! Data models shared by the stores, the provider client and the API layer.

mod badge;
mod identity;
mod profile;
mod session;
mod setting;
mod trials;
mod user_badge;

pub use badge::*;
pub use identity::*;
pub use profile::*;
pub use session::*;
pub use setting::*;
pub use trials::*;
pub use user_badge::*;
