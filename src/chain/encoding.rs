//! Hex quantity and data helpers for the EVM JSON-RPC dialect

/// Strip an optional `0x`/`0X` prefix
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Parse a hex quantity such as `0x1b4`
pub fn parse_quantity_u64(value: &str) -> Result<u64, String> {
    let digits = strip_hex_prefix(value.trim());
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {:?}: {}", value, e))
}

pub fn parse_quantity_u128(value: &str) -> Result<u128, String> {
    let digits = strip_hex_prefix(value.trim());
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {:?}: {}", value, e))
}

/// Encode a quantity without leading zeros
pub fn to_quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

/// Decode 0x-prefixed data; `0x` and the empty string are empty data
pub fn decode_data(value: &str) -> Result<Vec<u8>, String> {
    let digits = strip_hex_prefix(value.trim());
    if digits.len() % 2 != 0 {
        return Err(format!("odd-length hex data ({} digits)", digits.len()));
    }
    hex::decode(digits).map_err(|e| format!("invalid hex data: {}", e))
}

pub fn encode_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Validate a 20-byte account and normalize it to lowercase `0x` form
pub fn normalize_address(value: &str) -> Result<String, String> {
    let digits = strip_hex_prefix(value.trim());
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid address {:?}", value));
    }
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}
