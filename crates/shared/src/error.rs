use serde_json::Value;

/// Body of a non-success response, decoded as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Json(Value),
    Text(String),
}

impl ErrorBody {
    pub fn from_bytes(raw: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(raw) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(String::from_utf8_lossy(raw).trim().to_string()),
        }
    }

    /// Human-readable message. `{"detail": "..."}` yields the detail text,
    /// a list of validation entries yields their `msg` fields.
    pub fn message(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(Value::Object(map)) => match map.get("detail") {
                Some(Value::String(detail)) => detail.clone(),
                Some(Value::Array(entries)) => {
                    let messages: Vec<String> = entries.iter().filter_map(entry_message).collect();
                    if messages.is_empty() {
                        Value::Array(entries.clone()).to_string()
                    } else {
                        messages.join("; ")
                    }
                }
                _ => Value::Object(map.clone()).to_string(),
            },
            Self::Json(Value::String(text)) => text.clone(),
            Self::Json(other) => other.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Json(Value::Null) => true,
            Self::Json(_) => false,
        }
    }
}

fn entry_message(entry: &Value) -> Option<String> {
    let msg = entry.get("msg")?.as_str()?;
    let field = entry
        .get("loc")
        .and_then(Value::as_array)
        .and_then(|loc| loc.last())
        .and_then(Value::as_str);
    Some(match field {
        Some(field) => format!("{field}: {msg}"),
        None => msg.to_string(),
    })
}
