//! Transaction record as received from an explorer-style API.
//!
//! Fields are kept as raw JSON so one malformed transaction never rejects the
//! whole batch payload; coercion happens at read time through the accessors.

use crate::error::FeatureError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base units per whole currency unit (wei per ether).
pub const WEI_PER_UNIT: f64 = 1e18;

/// Base units per Gwei.
pub const WEI_PER_GWEI: f64 = 1e9;

/// A blockchain transaction to be scored.
///
/// Every field is optional. Absent and `null` fields read as zero (numbers)
/// or the empty string (addresses). Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque identifier, only used to locate the transaction inside its batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<Value>,

    /// Amount in base units (wei)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(
        rename = "blockNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub block_number: Option<Value>,

    /// Unix seconds
    #[serde(rename = "timeStamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,

    /// Sender address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,

    /// Receiver address, absent for contract creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,

    /// Gas price in wei
    #[serde(rename = "gasPrice", default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<Value>,
}

impl Transaction {
    /// Create a transaction with hash and addresses; numeric fields start absent.
    pub fn new(hash: &str, from: &str, to: &str) -> Self {
        Self {
            hash: Some(Value::String(hash.to_string())),
            from: Some(Value::String(from.to_string())),
            to: Some(Value::String(to.to_string())),
            ..Self::default()
        }
    }

    pub fn with_value_wei(mut self, wei: u128) -> Self {
        self.value = Some(Value::String(wei.to_string()));
        self
    }

    pub fn with_gas_price_wei(mut self, wei: u128) -> Self {
        self.gas_price = Some(Value::String(wei.to_string()));
        self
    }

    pub fn with_timestamp(mut self, unix_secs: i64) -> Self {
        self.timestamp = Some(Value::String(unix_secs.to_string()));
        self
    }

    pub fn with_block_number(mut self, block: u64) -> Self {
        self.block_number = Some(Value::String(block.to_string()));
        self
    }

    /// Built-in sample transaction: 0.1 unit at 50 Gwei.
    pub fn sample() -> Self {
        Self::new(
            "0xtest",
            "0xdbcc587c73c1fc82b4bb154d1af3adc025ea3163",
            "0x70dcf4d82c8e1b989d2a7a3c2303fa48a348d6c1",
        )
        .with_block_number(28_347_126)
        .with_timestamp(1_761_752_025)
        .with_value_wei(100_000_000_000_000_000)
        .with_gas_price_wei(50_000_000_000)
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_ref().and_then(Value::as_str)
    }

    /// Lowercased sender address.
    pub fn from_address(&self) -> Result<String, FeatureError> {
        read_address("from", self.from.as_ref())
    }

    /// Lowercased receiver address, empty for contract creation.
    pub fn to_address(&self) -> Result<String, FeatureError> {
        read_address("to", self.to.as_ref())
    }

    pub fn value_wei(&self) -> Result<f64, FeatureError> {
        let wei = read_f64("value", self.value.as_ref())?;
        if !wei.is_finite() || wei < 0.0 {
            return Err(FeatureError::malformed(
                "value",
                format!("expected a non-negative amount, got {wei}"),
            ));
        }
        Ok(wei)
    }

    pub fn block_number(&self) -> Result<i64, FeatureError> {
        read_non_negative_int("blockNumber", self.block_number.as_ref())
    }

    pub fn timestamp(&self) -> Result<i64, FeatureError> {
        read_non_negative_int("timeStamp", self.timestamp.as_ref())
    }

    /// Raw gas price in wei, `None` when it cannot be read as a number.
    pub fn gas_price_wei(&self) -> Option<f64> {
        read_f64("gasPrice", self.gas_price.as_ref()).ok()
    }
}

fn read_address(field: &'static str, raw: Option<&Value>) -> Result<String, FeatureError> {
    match raw {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.to_lowercase()),
        Some(other) => Err(FeatureError::malformed(
            field,
            format!("expected an address string, got {other}"),
        )),
    }
}

fn read_f64(field: &'static str, raw: Option<&Value>) -> Result<f64, FeatureError> {
    match raw {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| FeatureError::malformed(field, format!("unrepresentable number {n}"))),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(0.0);
            }
            s.parse::<f64>()
                .map_err(|_| FeatureError::malformed(field, format!("not a number: {s:?}")))
        }
        Some(other) => Err(FeatureError::malformed(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

fn read_non_negative_int(field: &'static str, raw: Option<&Value>) -> Result<i64, FeatureError> {
    let parsed = match raw {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i,
            None => match n.as_f64() {
                // Integral floats truncate toward zero
                Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => f.trunc() as i64,
                _ => {
                    return Err(FeatureError::malformed(
                        field,
                        format!("integer out of range: {n}"),
                    ))
                }
            },
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                0
            } else {
                s.parse::<i64>().map_err(|_| {
                    FeatureError::malformed(field, format!("not an integer: {s:?}"))
                })?
            }
        }
        Some(other) => {
            return Err(FeatureError::malformed(
                field,
                format!("expected an integer, got {other}"),
            ))
        }
    };

    if parsed < 0 {
        return Err(FeatureError::malformed(
            field,
            format!("expected a non-negative integer, got {parsed}"),
        ));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explorer_payload_deserialization() {
        let tx: Transaction = serde_json::from_value(json!({
            "hash": "0xabc",
            "blockNumber": "28347126",
            "timeStamp": "1761752025",
            "from": "0xDBCC587C73C1FC82B4BB154D1AF3ADC025EA3163",
            "to": null,
            "value": "100000000000000000",
            "gasPrice": "50000000000",
            "nonce": "7",
            "isError": "0"
        }))
        .unwrap();

        assert_eq!(tx.hash(), Some("0xabc"));
        assert_eq!(tx.block_number().unwrap(), 28_347_126);
        assert_eq!(tx.timestamp().unwrap(), 1_761_752_025);
        assert_eq!(
            tx.from_address().unwrap(),
            "0xdbcc587c73c1fc82b4bb154d1af3adc025ea3163"
        );
        assert_eq!(tx.to_address().unwrap(), "");
        assert_eq!(tx.value_wei().unwrap(), 1e17);
        assert_eq!(tx.gas_price_wei(), Some(5e10));
    }

    #[test]
    fn test_absent_fields_default_to_zero() {
        let tx: Transaction = serde_json::from_value(json!({})).unwrap();

        assert_eq!(tx.value_wei().unwrap(), 0.0);
        assert_eq!(tx.block_number().unwrap(), 0);
        assert_eq!(tx.timestamp().unwrap(), 0);
        assert_eq!(tx.from_address().unwrap(), "");
        assert_eq!(tx.gas_price_wei(), Some(0.0));
        assert_eq!(tx.hash(), None);
    }

    #[test]
    fn test_numeric_json_values() {
        let tx: Transaction = serde_json::from_value(json!({
            "value": 1.5e18,
            "blockNumber": 12.0,
            "timeStamp": 1700000000
        }))
        .unwrap();

        assert_eq!(tx.value_wei().unwrap(), 1.5e18);
        assert_eq!(tx.block_number().unwrap(), 12);
        assert_eq!(tx.timestamp().unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_malformed_fields_are_rejected_at_read_time() {
        let tx: Transaction = serde_json::from_value(json!({
            "value": "lots",
            "blockNumber": "0x1b",
            "timeStamp": -5,
            "from": 42,
            "gasPrice": "cheap"
        }))
        .unwrap();

        assert!(tx.value_wei().is_err());
        assert!(tx.block_number().is_err());
        assert!(tx.timestamp().is_err());
        assert!(tx.from_address().is_err());
        assert_eq!(tx.gas_price_wei(), None);
    }

    #[test]
    fn test_sample_roundtrips_through_json() {
        let tx = Transaction::sample();
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();

        assert_eq!(tx, back);
        assert_eq!(back.gas_price_wei(), Some(5e10));
    }
}
