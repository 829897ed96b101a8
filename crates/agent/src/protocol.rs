//! Think/act wire protocol codec.
//!
//! Each think-phase turn must carry a single JSON object:
//!
//! ```json
//! {"thought": "...", "action": {"type": "tool", "name": "echo", "args": {"message": "hi"}}}
//! {"thought": "...", "action": {"type": "final", "answer": "..."}}
//! {"thought": "...", "action": {"type": "none"}}
//! ```
//!
//! Models like to wrap that object in a code fence or surround it with
//! prose, so decoding first strips a fence and then looks for the first
//! brace-balanced JSON object. Anything that still does not validate is
//! rejected with a [`ProtocolError`] carrying the original text.

use loopwright_core::error::{ProtocolError, ProtocolFailure};
use serde_json::{Map, Value, json};

/// One decoded think-phase turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub thought: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Call a tool. `args` may be empty.
    Tool { name: String, args: Map<String, Value> },
    /// End the run with an answer.
    Final { answer: String },
    /// Nothing to do this step.
    None,
}

impl Action {
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Tool { .. } => "tool",
            Action::Final { .. } => "final",
            Action::None => "none",
        }
    }
}

impl Step {
    /// The wire form of this step.
    pub fn to_wire(&self) -> Value {
        let action = match &self.action {
            Action::Tool { name, args } => json!({ "type": "tool", "name": name, "args": args }),
            Action::Final { answer } => json!({ "type": "final", "answer": answer }),
            Action::None => json!({ "type": "none" }),
        };
        json!({ "thought": self.thought, "action": action })
    }
}

/// Serialize a step to its wire text.
pub fn encode(step: &Step) -> String {
    step.to_wire().to_string()
}

/// Decode raw model text into a [`Step`].
pub fn decode(raw: &str) -> Result<Step, ProtocolError> {
    let fail = |reason| ProtocolError::new(reason, raw);

    let text = strip_fence(raw);
    if text.is_empty() {
        return Err(fail(ProtocolFailure::Empty));
    }

    let value = find_json_object(text).map_err(fail)?;
    step_from_value(value).map_err(fail)
}

// ── Extraction ────────────────────────────────────────────────────────────

/// Strip a surrounding ```` ``` ```` fence (with optional language tag).
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_ticks) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the language tag line, if any.
    let body = match after_ticks.find('\n') {
        Some(newline) => &after_ticks[newline + 1..],
        None => after_ticks,
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Byte index of the `}` closing the object that opens at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// The first brace-balanced substring that parses as a JSON object.
fn find_json_object(text: &str) -> Result<Value, ProtocolFailure> {
    if text.starts_with('{') {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
            return Ok(value);
        }
    }

    // A rejected candidate may still contain the object, so every `{` is tried.
    let mut first_error: Option<String> = None;
    for (start, _) in text.match_indices('{') {
        let Some(end) = balanced_end(text, start) else {
            continue;
        };
        match serde_json::from_str::<Value>(&text[start..=end]) {
            Ok(value @ Value::Object(_)) => return Ok(value),
            Ok(_) => {}
            Err(e) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    Err(match first_error {
        Some(reason) => ProtocolFailure::MalformedJson(reason),
        None => ProtocolFailure::NoJsonObject,
    })
}

// ── Validation ────────────────────────────────────────────────────────────

fn required_string(
    obj: &mut Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<String, ProtocolFailure> {
    match obj.remove(key) {
        None | Some(Value::Null) => Err(ProtocolFailure::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ProtocolFailure::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn step_from_value(value: Value) -> Result<Step, ProtocolFailure> {
    let Value::Object(mut obj) = value else {
        return Err(ProtocolFailure::NoJsonObject);
    };

    let thought = required_string(&mut obj, "thought", "thought")?;

    let mut action = match obj.remove("action") {
        None | Some(Value::Null) => return Err(ProtocolFailure::MissingField("action")),
        Some(Value::Object(action)) => action,
        Some(_) => {
            return Err(ProtocolFailure::WrongType {
                field: "action",
                expected: "an object",
            });
        }
    };

    let action_type = required_string(&mut action, "type", "action.type")?;
    let action = match action_type.as_str() {
        "tool" => {
            let name = required_string(&mut action, "name", "action.name")?;
            if name.trim().is_empty() {
                return Err(ProtocolFailure::EmptyToolName);
            }
            let args = match action.remove("args") {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(args)) => args,
                Some(_) => {
                    return Err(ProtocolFailure::WrongType {
                        field: "action.args",
                        expected: "an object",
                    });
                }
            };
            Action::Tool {
                name: name.trim().to_string(),
                args,
            }
        }
        "final" => Action::Final {
            answer: required_string(&mut action, "answer", "action.answer")?,
        },
        "none" => Action::None,
        _ => return Err(ProtocolFailure::UnknownActionType(action_type)),
    };

    Ok(Step { thought, action })
}
