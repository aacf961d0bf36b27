//! Discovery topic layout: `<prefix>/<component>/[<node_id>/]<object_id>/config`.

use super::DiscoveryError;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryTopic<'a> {
    pub component: &'a str,
    pub node_id: Option<&'a str>,
    pub object_id: &'a str,
}

pub fn parse_topic<'a>(prefix: &str, topic: &'a str) -> Result<DiscoveryTopic<'a>, DiscoveryError> {
    let rest = topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| DiscoveryError::Topic(topic.to_string()))?;

    let levels: Vec<&str> = rest.split('/').collect();
    let parsed = match levels.as_slice() {
        [component, object_id, "config"] => DiscoveryTopic {
            component: *component,
            node_id: None,
            object_id: *object_id,
        },
        [component, node_id, object_id, "config"] => DiscoveryTopic {
            component: *component,
            node_id: Some(*node_id),
            object_id: *object_id,
        },
        _ => return Err(DiscoveryError::Topic(topic.to_string())),
    };

    if parsed.component.is_empty() || parsed.object_id.is_empty() {
        return Err(DiscoveryError::Topic(topic.to_string()));
    }
    Ok(parsed)
}

/// Applies the `~` base topic of a payload to topic options (keys ending in
/// `_topic` or `_t`) whose value starts or ends with `~`.
pub fn expand_base_topic(payload: &mut Value) {
    let Some(object) = payload.as_object_mut() else {
        return;
    };
    let Some(base) = object.get("~").and_then(Value::as_str).map(str::to_owned) else {
        return;
    };

    for (key, value) in object.iter_mut() {
        if !(key.ends_with("_topic") || key.ends_with("_t")) {
            continue;
        }
        if let Value::String(text) = value {
            if let Some(rest) = text.strip_prefix('~') {
                *text = format!("{base}{rest}");
            } else if let Some(rest) = text.strip_suffix('~') {
                *text = format!("{rest}{base}");
            }
        }
    }
}
