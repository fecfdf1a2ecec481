pub mod conversions;
pub mod quote;
pub mod token;

pub use conversions::ConversionError;
pub use quote::{PriceMap, PriceQuote, SourceId};
pub use token::TokenAddress;
