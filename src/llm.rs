use std::{fmt, str::FromStr};

use ask_llm::{Client as LlmClient, Conversation, Model, Role};
use color_eyre::{
	Result,
	eyre::{bail, eyre},
};
use serde_json::{Value, json};

use crate::config::AppConfig;

const PREAMBLE: &str = "You are an AI assistant helping with coding problems.";
const GEMINI_MODEL: &str = "gemini-2.0-flash";
const CLAUDE_MODEL: &str = "claude-3-7-sonnet-20250219";
const OPENAI_MODEL: &str = "gpt-4";
const MAX_TOKENS: usize = 4000;

/// Anything that can turn a prompt into model output.
///
/// Errors carry a human-readable reason; the orchestrator shows it verbatim behind an `Error:` prefix.
#[allow(async_fn_in_trait)]
pub trait Assistant {
	async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Model backend selection
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Provider {
	/// `ask_llm`'s own client, credentials from its environment
	#[default]
	AskLlm,
	Gemini,
	Claude,
	Gpt4,
}

impl FromStr for Provider {
	type Err = color_eyre::Report;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_lowercase().as_str() {
			"" | "ask_llm" | "ask-llm" => Ok(Provider::AskLlm),
			"gemini" => Ok(Provider::Gemini),
			"claude" => Ok(Provider::Claude),
			"gpt4" | "gpt-4" => Ok(Provider::Gpt4),
			other => bail!("Unsupported model: {other}"),
		}
	}
}

impl fmt::Display for Provider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Provider::AskLlm => write!(f, "ask_llm"),
			Provider::Gemini => write!(f, "Gemini"),
			Provider::Claude => write!(f, "Claude"),
			Provider::Gpt4 => write!(f, "GPT-4"),
		}
	}
}

/// Dispatches a prompt to the configured provider.
pub struct ProviderClient {
	provider: Provider,
	api_key: String,
	http: reqwest::Client,
}

impl ProviderClient {
	pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
		Self {
			provider,
			api_key: api_key.into(),
			http: reqwest::Client::new(),
		}
	}

	pub fn from_config(config: &AppConfig) -> Result<Self> {
		Ok(Self::new(config.provider.parse()?, config.api_key.clone()))
	}

	pub fn provider(&self) -> Provider {
		self.provider
	}

	async fn ask_llm(&self, prompt: &str) -> Result<String> {
		let mut conv = Conversation::new();
		conv.add(Role::User, format!("{PREAMBLE}\nPlease analyze this problem and provide a solution:\n{prompt}"));

		let client = LlmClient::default().model(Model::Medium).max_tokens(MAX_TOKENS);
		let response = client.conversation(&conv).await?;
		Ok(response.text)
	}

	async fn post(&self, request: reqwest::RequestBuilder) -> Result<Value> {
		let response = request.send().await.map_err(|e| eyre!("{}", e))?;
		let status = response.status();
		let body = response.text().await.map_err(|e| eyre!("Failed to read response body: {}", e))?;
		parse_body(status, &body)
	}

	async fn dispatch(&self, prompt: &str) -> Result<String> {
		if self.provider != Provider::AskLlm && self.api_key.is_empty() {
			bail!("API key not set. Please set `api_key` in the config.");
		}

		let data = match self.provider {
			Provider::AskLlm => return self.ask_llm(prompt).await,
			Provider::Gemini => {
				let url = format!("https://generativelanguage.googleapis.com/v1beta/models/{GEMINI_MODEL}:generateContent");
				self.post(self.http.post(url).query(&[("key", &self.api_key)]).json(&gemini_body(prompt))).await?
			}
			Provider::Claude => {
				let request = self
					.http
					.post("https://api.anthropic.com/v1/messages")
					.header("x-api-key", &self.api_key)
					.header("anthropic-version", "2023-06-01")
					.json(&claude_body(prompt));
				self.post(request).await?
			}
			Provider::Gpt4 => {
				let request = self.http.post("https://api.openai.com/v1/chat/completions").bearer_auth(&self.api_key).json(&openai_body(prompt));
				self.post(request).await?
			}
		};

		tracing::debug!("{} raw response: {}", self.provider, data);
		match self.provider {
			Provider::Gemini => gemini_text(&data),
			Provider::Claude => claude_text(&data),
			_ => openai_text(&data),
		}
	}
}

impl Assistant for ProviderClient {
	async fn complete(&self, prompt: &str) -> Result<String> {
		self.dispatch(prompt).await.map_err(|e| eyre!("{} API error: {e}", self.provider))
	}
}

/// Answers every prompt with the same text. Used by `replay --response`.
pub struct CannedResponse(pub String);

impl Assistant for CannedResponse {
	async fn complete(&self, _prompt: &str) -> Result<String> {
		Ok(self.0.clone())
	}
}

/// Non-2xx statuses win over the body: the provider's error message when the body carries one, else `HTTP {status}`.
fn parse_body(status: reqwest::StatusCode, body: &str) -> Result<Value> {
	let data = serde_json::from_str::<Value>(body);
	if !status.is_success() {
		let message = data.ok().and_then(|d| d["error"]["message"].as_str().map(str::to_string)).unwrap_or_else(|| format!("HTTP {status}"));
		bail!("{message}");
	}
	data.map_err(|e| eyre!("Failed to parse response body: {}", e))
}

fn gemini_body(prompt: &str) -> Value {
	json!({
		"contents": [{
			"parts": [{ "text": format!("{PREAMBLE}\nPlease analyze this problem and provide a solution:\n{prompt}") }]
		}],
		"generationConfig": {
			"temperature": 0.2,
			"topK": 40,
			"topP": 0.95,
			"maxOutputTokens": 8192,
		},
	})
}

fn claude_body(prompt: &str) -> Value {
	json!({
		"model": CLAUDE_MODEL,
		"max_tokens": MAX_TOKENS,
		"temperature": 0.2,
		"messages": [{
			"role": "user",
			"content": format!("{PREAMBLE}\nPlease analyze this problem and provide a solution:\n{prompt}"),
		}],
	})
}

fn openai_body(prompt: &str) -> Value {
	json!({
		"model": OPENAI_MODEL,
		"temperature": 0.2,
		"max_tokens": MAX_TOKENS,
		"messages": [
			{ "role": "system", "content": PREAMBLE },
			{ "role": "user", "content": format!("Please analyze this problem and provide a solution: {prompt}") },
		],
	})
}

fn gemini_text(data: &Value) -> Result<String> {
	data["candidates"][0]["content"]["parts"][0]["text"]
		.as_str()
		.map(str::to_string)
		.ok_or_else(|| eyre!("Unexpected response format from Gemini API"))
}

fn claude_text(data: &Value) -> Result<String> {
	data["content"][0]["text"]
		.as_str()
		.map(str::to_string)
		.ok_or_else(|| eyre!("Unexpected response format from Claude API"))
}

fn openai_text(data: &Value) -> Result<String> {
	data["choices"][0]["message"]["content"]
		.as_str()
		.map(str::to_string)
		.ok_or_else(|| eyre!("Unexpected response format from GPT-4 API"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn provider_names() {
		assert_eq!("".parse::<Provider>().unwrap(), Provider::AskLlm);
		assert_eq!("Gemini".parse::<Provider>().unwrap(), Provider::Gemini);
		assert_eq!(" claude ".parse::<Provider>().unwrap(), Provider::Claude);
		assert_eq!("GPT-4".parse::<Provider>().unwrap(), Provider::Gpt4);
		let err = "llama".parse::<Provider>().unwrap_err();
		assert_eq!(err.to_string(), "Unsupported model: llama");
	}

	#[test]
	fn payload_shapes() {
		let gemini = json!({ "candidates": [{ "content": { "parts": [{ "text": "g" }] } }] });
		let claude = json!({ "content": [{ "type": "text", "text": "c" }] });
		let openai = json!({ "choices": [{ "message": { "role": "assistant", "content": "o" } }] });
		assert_eq!(gemini_text(&gemini).unwrap(), "g");
		assert_eq!(claude_text(&claude).unwrap(), "c");
		assert_eq!(openai_text(&openai).unwrap(), "o");

		assert!(gemini_text(&json!({ "candidates": [] })).is_err());
		assert!(claude_text(&json!({ "content": "flat" })).is_err());
		assert!(openai_text(&json!({})).is_err());
	}

	#[test]
	fn request_bodies_carry_the_prompt() {
		assert!(gemini_body("P1").to_string().contains("P1"));
		assert_eq!(claude_body("P2")["messages"][0]["role"], "user");
		assert_eq!(openai_body("P3")["messages"][0]["content"], PREAMBLE);
	}

	#[test]
	fn error_status_is_checked_before_the_body() {
		let err = parse_body(reqwest::StatusCode::BAD_GATEWAY, "<html>Bad Gateway</html>").unwrap_err();
		assert_eq!(err.to_string(), "HTTP 502 Bad Gateway");

		let err = parse_body(reqwest::StatusCode::BAD_GATEWAY, "").unwrap_err();
		assert_eq!(err.to_string(), "HTTP 502 Bad Gateway");

		let err = parse_body(reqwest::StatusCode::UNAUTHORIZED, r#"{"error":{"message":"invalid x-api-key"}}"#).unwrap_err();
		assert_eq!(err.to_string(), "invalid x-api-key");

		assert_eq!(parse_body(reqwest::StatusCode::OK, r#"{"ok":true}"#).unwrap(), json!({ "ok": true }));
		assert!(parse_body(reqwest::StatusCode::OK, "not json").is_err());
	}

	#[tokio::test]
	async fn missing_key_is_reported_before_any_request() {
		let client = ProviderClient::new(Provider::Gemini, "");
		let err = client.complete("anything").await.unwrap_err();
		assert_eq!(err.to_string(), "Gemini API error: API key not set. Please set `api_key` in the config.");
	}
}
