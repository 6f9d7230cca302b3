//! Payload deserialization helpers.
//!
//! With the `tracing` feature enabled, fields the typed message does not capture are logged
//! as warnings so protocol drift on the server side shows up in the logs instead of being
//! silently dropped.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize a message payload, warning about unknown fields.
///
/// Unknown fields never fail deserialization; a payload that does not fit the target type
/// is logged with the offending path before the error is returned.
#[cfg(feature = "tracing")]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    use std::any::type_name;

    tracing::trace!(type_name = %type_name::<T>(), json = %value, "decoding payload");

    let original = value.clone();
    let mut unknown_paths: Vec<String> = Vec::new();

    let result: T = serde_ignored::deserialize(value, |path| {
        unknown_paths.push(path.to_string());
    })
    .inspect_err(|_| {
        let json = original.to_string();
        let de = &mut serde_json::Deserializer::from_str(&json);
        if let Err(path_err) = serde_path_to_error::deserialize::<_, T>(de) {
            let path = path_err.path().to_string();
            tracing::error!(
                type_name = %type_name::<T>(),
                path = %path,
                value = %format_value(lookup_value(&original, &path)),
                error = %path_err.inner(),
                "payload does not match message type"
            );
        }
    })?;

    for path in unknown_paths {
        tracing::warn!(
            type_name = %type_name::<T>(),
            field = %path,
            value = %format_value(lookup_value(&original, &path)),
            "unknown field in server message"
        );
    }

    Ok(result)
}

/// Pass-through deserialization when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    Ok(serde_json::from_value(value)?)
}

/// Look up a value by a `serde_ignored` / `serde_path_to_error` path such as
/// `auctions[3].itemName` or `auctions.3.?.tier`.
#[cfg(feature = "tracing")]
fn lookup_value<'value>(value: &'value Value, path: &str) -> Option<&'value Value> {
    path.split(['.', '[', ']'])
        .filter(|segment| !segment.is_empty() && *segment != "?")
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
            _ => None,
        })
}

#[cfg(feature = "tracing")]
fn format_value(value: Option<&Value>) -> String {
    value.map_or_else(|| "<unable to retrieve>".to_owned(), Value::to_string)
}
