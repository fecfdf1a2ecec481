use serde_json::Value;

// Precios: solo finitos y estrictamente positivos
pub fn is_valid_usd_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Reads a USD price out of a JSON value that providers send either as a
/// number (`1.23`) or as a numeric string (`"1.23"`).
///
/// Returns `None` for anything that is not a valid price, including zero,
/// negatives and non-finite values.
pub fn json_to_usd_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    is_valid_usd_price(price).then_some(price)
}

// Para addresses: forma canónica en minúsculas
pub fn normalize_address(raw: &str) -> Result<String, ConversionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConversionError::EmptyAddress);
    }
    // Se concatena en paths de URL: nada que cambie la ruta o la query
    if trimmed
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ',' | '/' | '?' | '#' | '%' | '&'))
    {
        return Err(ConversionError::InvalidAddress(trimmed.to_string()));
    }
    Ok(trimmed.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("Empty address")]
    EmptyAddress,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
