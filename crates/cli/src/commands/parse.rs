//! `loopwright parse`: run the step protocol decoder over stdin.

use std::io::Read;

use anyhow::Context;
use loopwright_agent::protocol;

pub fn run() -> anyhow::Result<()> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("Failed to read stdin")?;

    let text = render(&raw)?;
    println!("{text}");
    Ok(())
}

/// Decode `raw` and pretty-print the canonical step.
fn render(raw: &str) -> anyhow::Result<String> {
    let step = protocol::decode(raw)?;
    Ok(serde_json::to_string_pretty(&step.to_wire())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_response_is_normalized() {
        let raw = "```json\n{\"thought\":\"t\",\"action\":{\"type\":\"final\",\"answer\":\"42\"}}\n```";
        let text = render(raw).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["action"]["type"], "final");
        assert_eq!(value["action"]["answer"], "42");
    }

    #[test]
    fn prose_is_an_error() {
        let err = render("I think the answer is 42").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
