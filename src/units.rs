use anyhow::{Result, anyhow, bail};
use serde_json::Value;

/// Decimal places of the governance token.
pub const TOKEN_DECIMALS: usize = 18;

/// Base units per whole token.
pub const WEI_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

const _: () = assert!(WEI_PER_TOKEN == 10u128.pow(TOKEN_DECIMALS as u32));

/// Parse a user-entered decimal token amount ("50", "1.5") into base units.
pub fn parse_token_amount(raw: &str) -> Result<u128> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("amount cannot be empty");
    }
    if trimmed.starts_with('-') {
        bail!("amount must not be negative");
    }

    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        bail!("amount must contain digits");
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        bail!("amount must be a decimal number");
    }
    if fraction.len() > TOKEN_DECIMALS {
        bail!("amount supports at most {TOKEN_DECIMALS} decimal places");
    }

    let whole_units: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| anyhow!("amount exceeds token bounds"))?
    };
    let padded = format!("{fraction:0<width$}", width = TOKEN_DECIMALS);
    let fraction_units: u128 = padded
        .parse()
        .map_err(|_| anyhow!("amount fraction is not numeric"))?;

    whole_units
        .checked_mul(WEI_PER_TOKEN)
        .and_then(|units| units.checked_add(fraction_units))
        .ok_or_else(|| anyhow!("amount exceeds token bounds"))
}

/// Format base units as a human-readable token amount.
pub fn format_token_amount(base_units: u128, symbol: &str) -> String {
    let whole = base_units / WEI_PER_TOKEN;
    let frac = base_units % WEI_PER_TOKEN;
    if frac == 0 {
        format!("{whole} {symbol}")
    } else {
        let frac_str = format!("{frac:018}");
        let trimmed = frac_str.trim_end_matches('0');
        format!("{whole}.{trimmed} {symbol}")
    }
}

/// Decode a uint returned by the gateway. uint256 values arrive as decimal or
/// 0x-hex strings; small values may arrive as JSON numbers.
pub fn decode_uint(value: &Value, label: &str) -> Result<u128> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
                Some(digits) => u128::from_str_radix(digits, 16),
                None => raw.parse::<u128>(),
            };
            parsed.map_err(|err| anyhow!("{label} is not a representable uint ({raw}): {err}"))
        }
        Value::Number(number) => number
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| anyhow!("{label} is not an unsigned integer: {number}")),
        other => Err(anyhow!("{label} has unexpected type: {other}")),
    }
}

pub fn decode_bool(value: &Value, label: &str) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| anyhow!("{label} is not a boolean: {value}"))
}

/// Encode a uint for a gateway call argument.
pub fn encode_uint(value: u128) -> Value {
    Value::String(value.to_string())
}
