use std::collections::HashMap;

use serde_json::Map;
use serde_json::Value;

use crate::model::parse_flat_json_object;
use crate::Error;
use crate::Result;
use crate::UpstreamData;

pub const DEFAULT_UPSTREAM_WEIGHT: i32 = 50;

const CANONICAL_FIELDS: [&str; 6] = ["url", "protocol", "weight", "status", "props", "namespaceId"];

/// Parses registry payloads into upstream entries.
///
/// The handler blob maps canonical upstream fields to the keys a particular
/// registry uses, e.g. `{"url": "address", "weight": "w"}`. Keys not covered
/// by the mapping are read under their canonical name; unknown keys are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct CustomUpstreamParser {
    // payload key -> canonical field
    conversion: HashMap<String, String>,
}

impl CustomUpstreamParser {
    /// `custom_map`: canonical field -> payload key
    pub fn new(custom_map: HashMap<String, String>) -> Self {
        let conversion = custom_map
            .into_iter()
            .map(|(field, key)| (key, field))
            .collect();
        Self { conversion }
    }

    pub fn from_handler(handler_blob: &str) -> Result<Self> {
        let custom_map = parse_flat_json_object(handler_blob, "discovery handler")?;
        for field in custom_map.keys() {
            if !CANONICAL_FIELDS.contains(&field.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "discovery handler maps unknown upstream field {}",
                    field
                )));
            }
        }
        Ok(Self::new(custom_map))
    }

    /// Accepts a single JSON object or an array of objects. Blank payloads
    /// yield nothing.
    pub fn parse_value(
        &self,
        payload: &str,
    ) -> Result<Vec<UpstreamData>> {
        if payload.trim().is_empty() {
            return Ok(Vec::new());
        }

        let value: Value = serde_json::from_str(payload)
            .map_err(|e| Error::InvalidConfig(format!("malformed upstream payload: {}", e)))?;

        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(object) => self.parse_object(object),
                    other => Err(Error::InvalidConfig(format!(
                        "upstream payload entry must be an object, got {}",
                        other
                    ))),
                })
                .collect(),
            Value::Object(object) => Ok(vec![self.parse_object(&object)?]),
            other => Err(Error::InvalidConfig(format!(
                "upstream payload must be an object or array, got {}",
                other
            ))),
        }
    }

    fn parse_object(
        &self,
        object: &Map<String, Value>,
    ) -> Result<UpstreamData> {
        let mut data = UpstreamData {
            weight: DEFAULT_UPSTREAM_WEIGHT,
            ..Default::default()
        };

        for (key, value) in object {
            let field = self.conversion.get(key).map(String::as_str).unwrap_or(key.as_str());
            match field {
                "url" => data.url = as_string(value),
                "protocol" => data.protocol = as_string(value),
                "weight" => data.weight = as_i32(field, value)?,
                "status" => data.status = as_i32(field, value)?,
                "props" => data.props = Some(as_string(value)),
                "namespaceId" => data.namespace_id = Some(as_string(value)),
                _ => {}
            }
        }

        if data.url.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "upstream payload {} has no url",
                Value::Object(object.clone())
            )));
        }
        Ok(data)
    }
}

fn as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_i32(
    field: &str,
    value: &Value,
) -> Result<i32> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| {
            Error::InvalidConfig(format!("upstream {} must be an integer, got {}", field, value))
        })
}
