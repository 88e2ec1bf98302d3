use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::GatewayError;

/// The canonical, flat `name → value` view of a gateway callback that signature checks and adapters work with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CallbackFields(BTreeMap<String, String>);

impl CallbackFields {
    pub fn from_pairs<K: Into<String>, V: Into<String>, I: IntoIterator<Item = (K, V)>>(pairs: I) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Flattens a JSON object into string fields. Numbers are rendered the way the gateways render them in their own
    /// signature strings, i.e. `1000.0` becomes `1000`.
    pub fn from_json(value: &Value) -> Result<Self, GatewayError> {
        let obj = value
            .as_object()
            .ok_or_else(|| GatewayError::InvalidPayload(format!("Expected a JSON object, got {value}")))?;
        let fields = obj.iter().map(|(k, v)| (k.clone(), json_scalar_to_string(v))).collect();
        Ok(Self(fields))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Like [`Self::get`], but treats empty values as missing.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    /// Adds every field from `other` that is not already present.
    pub fn merge(&mut self, other: CallbackFields) {
        for (k, v) in other.0 {
            self.0.entry(k).or_insert(v);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Null)
    }
}

impl From<HashMap<String, String>> for CallbackFields {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

fn json_scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or_default();
                #[allow(clippy::cast_possible_truncation)]
                let whole = f as i64;
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    whole.to_string()
                } else {
                    format!("{f}")
                }
            }
        },
        other => other.to_string(),
    }
}

/// A gateway callback as it arrived on the wire.
///
/// eSewa redirects with a single base64-encoded JSON `data` parameter, while Khalti (and eSewa's older flows) send
/// plain query or form fields. Both are decoded into [`CallbackFields`] before anything looks at them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackPayload {
    RawFields(CallbackFields),
    Base64Envelope(String),
}

impl CallbackPayload {
    /// Classifies the merged request parameters. A non-empty `data` parameter marks an envelope.
    pub fn from_params(params: CallbackFields) -> Self {
        match params.non_empty("data") {
            Some(data) => Self::Base64Envelope(data.to_string()),
            None => Self::RawFields(params),
        }
    }

    pub fn decode(self) -> Result<CallbackFields, GatewayError> {
        match self {
            Self::RawFields(fields) => Ok(fields),
            Self::Base64Envelope(data) => {
                // Query-string decoding turns '+' into ' '
                let data = data.trim().replace(' ', "+");
                let bytes = base64::decode(&data)
                    .or_else(|_| base64::decode_config(&data, base64::URL_SAFE))
                    .map_err(|e| GatewayError::InvalidPayload(format!("Invalid base64 data. {e}")))?;
                let json = serde_json::from_slice::<Value>(&bytes)
                    .map_err(|e| GatewayError::InvalidPayload(format!("Envelope is not JSON. {e}")))?;
                CallbackFields::from_json(&json)
            },
        }
    }
}
