use crate::types::conversions::{normalize_address, ConversionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chain-specific token contract address in canonical (lowercase) form.
///
/// Addresses are treated as opaque identifiers: the SDK does not validate
/// checksums or lengths, so the same type serves EVM hex addresses and
/// base58 mints alike. Equality and hashing are case-insensitive because the
/// stored form is always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAddress(String);

impl TokenAddress {
    pub fn new(raw: &str) -> Result<Self, ConversionError> {
        normalize_address(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TokenAddress {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TokenAddress {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TokenAddress> for String {
    fn from(address: TokenAddress) -> Self {
        address.0
    }
}

impl AsRef<str> for TokenAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn mixed_case_addresses_are_equal() {
        let a: TokenAddress = "0xAbCdEf".parse().unwrap();
        let b = TokenAddress::new("0xabcdef").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcdef");

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn serializes_as_plain_string() {
        let a = TokenAddress::new("0xAAA").unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"0xaaa\"");
        let back: TokenAddress = serde_json::from_str("\"0xAAA\"").unwrap();
        assert_eq!(back, a);
        assert!(serde_json::from_str::<TokenAddress>("\"\"").is_err());
    }
}
