use std::time::Duration;

use v_utils::macros::{MyConfigPrimitives, Settings};

use crate::automator::Delays;

#[derive(Clone, Debug, Default, MyConfigPrimitives, Settings)]
pub struct AppConfig {
	/// Which model backend answers: "ask_llm" (default), "gemini", "claude" or "gpt4"
	#[primitives(skip)]
	#[serde(default = "default_provider")]
	pub provider: String,
	/// Credential for the HTTP providers (ask_llm reads its own environment)
	#[serde(default)]
	pub api_key: String,
	/// Keyboard chord that triggers a cycle in watch mode (default: Ctrl+Shift+A)
	#[primitives(skip)]
	#[serde(default = "default_chord")]
	pub chord: String,
	/// How often the page is polled for chord presses, in ms (default: 250)
	#[serde(default = "default_chord_poll_ms")]
	pub chord_poll_ms: u64,
	/// Run with visible browser window (non-headless mode)
	#[serde(default)]
	pub visible: bool,
	/// Click run (and submit, on success) after injecting (default: true)
	#[serde(default = "default_true")]
	pub auto_run: bool,
	/// Pause between showing the response and touching the editor, in ms (default: 500)
	#[serde(default = "default_before_injection_ms")]
	pub before_injection_ms: u64,
	/// Pause between injection and looking for the run control, in ms (default: 300)
	#[serde(default = "default_after_injection_ms")]
	pub after_injection_ms: u64,
	/// Pause between clicking run and reading test results, in ms (default: 3000)
	#[serde(default = "default_after_run_ms")]
	pub after_run_ms: u64,
	/// Command to run after each cycle (receives the outcome message as argument)
	#[serde(default)]
	pub stop_hook: Option<String>,
	/// Save the page HTML before every cycle, for later `replay`
	#[serde(default)]
	pub save_snapshots: bool,
}

fn default_provider() -> String {
	"ask_llm".to_string()
}

fn default_chord() -> String {
	"Ctrl+Shift+A".to_string()
}

fn default_chord_poll_ms() -> u64 {
	250
}

fn default_true() -> bool {
	true
}

fn default_before_injection_ms() -> u64 {
	500
}

fn default_after_injection_ms() -> u64 {
	300
}

fn default_after_run_ms() -> u64 {
	3000
}

impl AppConfig {
	pub fn delays(&self) -> Delays {
		Delays::new(
			Duration::from_millis(self.before_injection_ms),
			Duration::from_millis(self.after_injection_ms),
			Duration::from_millis(self.after_run_ms),
		)
	}

	pub fn chord_poll(&self) -> Duration {
		Duration::from_millis(self.chord_poll_ms.max(10))
	}
}
