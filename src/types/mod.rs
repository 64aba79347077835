pub mod notification;
pub mod price;
pub mod quote;
pub mod trade;

pub use notification::*;
pub use price::*;
pub use quote::*;
pub use trade::*;
