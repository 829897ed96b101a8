//! Clock tool: reports the current UTC time.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};

pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC (RFC 3339)."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let now = Utc::now();
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            data: Some(serde_json::json!({ "unix": now.timestamp() })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_rfc3339_utc() {
        let result = ClockTool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert!(result.output.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&result.output).is_ok());
    }
}
