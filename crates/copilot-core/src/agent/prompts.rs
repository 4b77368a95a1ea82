use serde_json::Value;

const STRICT_JSON_INSTRUCTION: &str = "Reply with strict JSON only: a single JSON value that conforms to the JSON schema below. \
Do not wrap it in markdown fences and do not add any text before or after it.";

/// Builds the message sent to the backend. With a response schema the schema
/// and the strict-JSON instruction come first, followed by the caller's prompt.
pub fn build_agent_message(prompt: &str, response_json_schema: Option<&Value>) -> String {
    let Some(schema) = response_json_schema else {
        return prompt.to_string();
    };

    let serialized_schema =
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());

    format!("{STRICT_JSON_INSTRUCTION}\n\nJSON schema:\n{serialized_schema}\n\nRequest:\n{prompt}")
}
