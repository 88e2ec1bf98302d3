pub mod helpers;
mod paisa;

pub mod op;
mod secret;

pub use paisa::{Paisa, PaisaConversionError, NPR_CURRENCY_CODE};
pub use secret::Secret;
