//! Transaction payload carried by a pending callback record.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::operator::Operator;

/// Decoded value of a pending record.
///
/// Field names follow the producer's wire format. Missing and `null` fields
/// decode to their empty value; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionPayload {
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(rename = "desc", deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "msisdn", deserialize_with = "null_as_default")]
    pub subscriber_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub operator: String,
    #[serde(rename = "short-code", deserialize_with = "null_as_default")]
    pub short_code: String,
    #[serde(rename = "tran-ref", deserialize_with = "null_as_default")]
    pub tran_ref: String,
    /// Epoch seconds.
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: i64,
    #[serde(rename = "cyberus-return", deserialize_with = "null_as_default")]
    pub return_status: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// The raw value could not be decoded into a [`TransactionPayload`].
///
/// Never retriable: the same bytes will fail the same way on every scan.
#[derive(Debug, Error)]
#[error("undecodable transaction payload: {0}")]
pub struct PayloadError(#[from] serde_json::Error);

impl TransactionPayload {
    /// Decode a raw record value. Only a JSON object is accepted.
    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            return Err(PayloadError(serde::de::Error::custom(
                "expected a JSON object",
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn operator(&self) -> Operator {
        Operator::from_name(&self.operator)
    }
}
