mod price;

pub mod helpers;
pub mod op;
mod secret;

pub use price::{Price, PriceConversionError, CURRENCY_CODE};
pub use secret::Secret;
