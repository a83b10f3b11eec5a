// Validating decode of interpreter payloads into typed actions.
use serde_json::{Map, Value};

use crate::action::types::{Action, ActionList, ScrollDirection};
use crate::errors::{WebGenError, WebGenResult};

/// Field names emitted by older interpreter builds.
const LEGACY_KIND: &str = "type";
const LEGACY_TARGET: &str = "selector";

/// Decode an untyped network payload into an [`ActionList`].
///
/// Validation is all-or-nothing: the first offending action rejects the
/// whole batch, so nothing is executed from a partially understood command.
pub fn parse_action_list(payload: &Value) -> WebGenResult<ActionList> {
    let items = payload
        .as_array()
        .ok_or_else(|| WebGenError::NotASequence(json_type(payload)))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_action(index, item))
        .collect::<WebGenResult<Vec<_>>>()
        .map(ActionList::from)
}

fn parse_action(index: usize, item: &Value) -> WebGenResult<Action> {
    let obj = item.as_object().ok_or_else(|| {
        WebGenError::malformed(index, "kind", format!("cannot be read from {}", json_type(item)))
    })?;

    let kind = string_field(index, obj, "kind", Some(LEGACY_KIND))?;
    match kind.as_str() {
        "click" => Ok(Action::Click {
            target: string_field(index, obj, "target", Some(LEGACY_TARGET))?,
        }),
        "fill" => Ok(Action::Fill {
            target: string_field(index, obj, "target", Some(LEGACY_TARGET))?,
            value: string_field(index, obj, "value", None)?,
        }),
        "navigate" => Ok(Action::Navigate {
            url: string_field(index, obj, "url", None)?,
        }),
        "scroll" => {
            let direction = match string_field(index, obj, "direction", None)?.as_str() {
                "up" => ScrollDirection::Up,
                "down" => ScrollDirection::Down,
                other => {
                    return Err(WebGenError::malformed(
                        index,
                        "direction",
                        format!("must be `up` or `down`, got `{other}`"),
                    ))
                }
            };
            Ok(Action::Scroll { direction })
        }
        other => Err(WebGenError::malformed(
            index,
            "kind",
            format!("has unknown value `{other}`"),
        )),
    }
}

/// Canonical name wins over the legacy spelling when both are present.
fn string_field(
    index: usize,
    obj: &Map<String, Value>,
    name: &'static str,
    legacy: Option<&str>,
) -> WebGenResult<String> {
    let value = obj
        .get(name)
        .or_else(|| legacy.and_then(|l| obj.get(l)));

    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(WebGenError::malformed(
            index,
            name,
            format!("must be a string, got {}", json_type(other)),
        )),
        None => Err(WebGenError::malformed(index, name, "is missing")),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
