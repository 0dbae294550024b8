use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
	pub content: String,
	pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
	pub name: String,
	pub arguments: Value,
}

/// Optional constraints attached to a completion request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions<'a> {
	/// JSON schema the content should conform to. Servers may ignore it.
	pub response_schema: Option<(&'a str, &'a Value)>,
	/// Function-style tool declarations.
	pub tools: &'a [Value],
}

pub async fn complete(
	cfg: &scout_config::LlmProviderConfig,
	messages: &[Value],
	options: ChatOptions<'_>,
) -> Result<ChatCompletion> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
		"stream": false,
	});

	if let Some((name, schema)) = options.response_schema {
		body["response_format"] = serde_json::json!({
			"type": "json_schema",
			"json_schema": { "name": name, "schema": schema },
		});
	}
	if !options.tools.is_empty() {
		body["tools"] = Value::Array(options.tools.to_vec());
	}

	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_chat_response(json)
}

pub fn parse_chat_response(json: Value) -> Result<ChatCompletion> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.or_else(|| json.get("message"))
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing a message.".to_string(),
		})?;
	let content = message.get("content").and_then(|c| c.as_str()).unwrap_or_default().to_string();
	let tool_call = message
		.get("tool_calls")
		.and_then(|v| v.as_array())
		.and_then(|calls| calls.first())
		.and_then(|call| call.get("function"))
		.and_then(parse_tool_call);

	if content.is_empty() && tool_call.is_none() {
		return Err(Error::InvalidResponse {
			message: "Chat response has neither content nor a tool call.".to_string(),
		});
	}

	Ok(ChatCompletion { content, tool_call })
}

fn parse_tool_call(function: &Value) -> Option<ToolCall> {
	let name = function.get("name")?.as_str()?.to_string();
	let arguments = match function.get("arguments") {
		Some(Value::String(raw)) =>
			serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())),
		Some(value) => value.clone(),
		None => Value::Object(Default::default()),
	};

	Some(ToolCall { name, arguments })
}
