mod centavos;
mod helpers;

pub mod op;
mod secret;

pub use centavos::{Centavos, CentavosConversionError, PESO_CURRENCY_CODE, PESO_SYMBOL};
pub use helpers::{parse_boolean_flag, parse_env_or_default};
pub use secret::Secret;
