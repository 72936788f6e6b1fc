//! One trigger-to-completion cycle, and the loops that serve it on a live page.

use std::fmt;
#[cfg(feature = "xdg")]
use std::path::PathBuf;

use color_eyre::Result;
#[cfg(feature = "xdg")]
use color_eyre::eyre::eyre;
#[cfg(feature = "xdg")]
use v_utils::xdg_state_dir;
use v_utils::{elog, log};

use crate::{
	AutomationOutcome, PromptMode,
	automator::{self, Delays, RUN_BUTTON_TEXT, RUN_PROBES, SUBMIT_BUTTON_TEXT, SUBMIT_PROBES, Verdict, find_control},
	browser::{BrowserPage, OverlayPanel},
	chord::Chord,
	config::AppConfig,
	dom::Dom,
	editor::{self, EditorFamily},
	llm::Assistant,
	panel::Panel,
	problem::extract_problem,
	response::extract_code,
};

pub const NO_EDITOR_NOTICE: &str = "Could not find a code editor on this page";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CycleOptions {
	pub delays: Delays,
	/// Chain into run/submit after a successful injection
	pub auto_run: bool,
}

impl Default for CycleOptions {
	fn default() -> Self {
		Self {
			delays: Delays::default(),
			auto_run: true,
		}
	}
}

impl From<&AppConfig> for CycleOptions {
	fn from(config: &AppConfig) -> Self {
		Self {
			delays: config.delays(),
			auto_run: config.auto_run,
		}
	}
}

/// Everything a cycle produced. `code` is the cycle's last extracted code; it lives here and nowhere else.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CycleReport {
	pub problem: String,
	pub response: Option<String>,
	/// Reason the assistant gave up, exactly as shown in the panel after `Error: `
	pub error: Option<String>,
	pub code: String,
	pub outcome: AutomationOutcome,
}

/// Panel trouble is logged and otherwise ignored.
fn report_panel(result: Result<()>) {
	if let Err(e) = result {
		elog!("Failed to update panel: {e}");
	}
}

/// Extract, ask, show, inject, and (optionally) run and submit.
///
/// Never fails: every step that cannot proceed ends the cycle at the outcome reached so far.
pub async fn run_cycle<D, P, A>(dom: &D, panel: &P, assistant: &A, mode: PromptMode, options: &CycleOptions) -> CycleReport
where
	D: Dom,
	P: Panel,
	A: Assistant, {
	let mut report = CycleReport::default();
	report_panel(panel.loading().await);

	report.problem = extract_problem(dom).await;
	tracing::debug!("Extracted problem ({} chars)", report.problem.len());
	let prompt = mode.render(&report.problem);

	let response = match assistant.complete(&prompt).await {
		Ok(response) => response,
		Err(e) => {
			elog!("Assistant failed: {e}");
			report_panel(panel.show_response(&format!("Error: {e}")).await);
			report.error = Some(e.to_string());
			return report;
		}
	};
	report_panel(panel.show_response(&response).await);
	report.code = extract_code(&response);
	report.response = Some(response);

	if report.code.is_empty() {
		tracing::info!("Response carries no code block, leaving the editor alone");
		return report;
	}

	tokio::time::sleep(options.delays.before_injection).await;
	report.outcome = match editor::inject(dom, &report.code).await {
		Ok(outcome) => outcome,
		Err(e) => {
			elog!("Failed to inject code: {e}");
			return report;
		}
	};

	match report.outcome {
		AutomationOutcome::Injected => {
			log!("Code injected");
			report_panel(panel.hide().await);
		}
		AutomationOutcome::NoEditorFound => {
			elog!("{NO_EDITOR_NOTICE}");
			report_panel(panel.notice(NO_EDITOR_NOTICE).await);
			return report;
		}
		_ => return report,
	}

	if options.auto_run {
		report.outcome = automator::run_and_submit(dom, &options.delays).await;
	}
	report
}

/// What the pipeline would find on a page, without touching it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Inspection {
	pub problem: String,
	/// Family and matching selector (`None` for the fallback selector) of the located editor
	pub editor: Option<(EditorFamily, Option<&'static str>)>,
	pub run_control: bool,
	pub submit_control: bool,
	pub verdict: Verdict,
}

pub async fn inspect<D: Dom>(dom: &D) -> Result<Inspection> {
	let problem = extract_problem(dom).await;
	let editor = editor::locate_editor(dom).await?.map(|t| (t.family, t.probe.map(|p| p.selector)));
	let run_control = find_control(dom, RUN_PROBES, RUN_BUTTON_TEXT).await?.is_some();
	let submit_control = find_control(dom, SUBMIT_PROBES, SUBMIT_BUTTON_TEXT).await?.is_some();
	let verdict = automator::detect_verdict(dom).await?;
	Ok(Inspection {
		problem,
		editor,
		run_control,
		submit_control,
		verdict,
	})
}

impl fmt::Display for Inspection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "=== Problem ===")?;
		writeln!(f, "{}", self.problem)?;
		writeln!(f)?;
		match &self.editor {
			Some((family, Some(selector))) => writeln!(f, "Editor: {family} via {selector}")?,
			Some((family, None)) => writeln!(f, "Editor: {family} via fallback")?,
			None => writeln!(f, "Editor: none")?,
		}
		writeln!(f, "Run control: {}", if self.run_control { "found" } else { "missing" })?;
		writeln!(f, "Submit control: {}", if self.submit_control { "found" } else { "missing" })?;
		let action = if self.verdict.is_success() { "would submit" } else { "would not submit" };
		write!(f, "Verdict as the page stands: {} ({action})", self.verdict)
	}
}

/// Run the stop hook with a message if configured
pub fn run_stop_hook(config: &AppConfig, message: &str) {
	if let Some(ref hook) = config.stop_hook {
		log!("Running stop hook: {} {:?}", hook, message);
		if let Err(e) = tokio::process::Command::new("sh").arg("-c").arg(hook_command_line(hook, message)).spawn() {
			elog!("Failed to run stop hook {hook:?}: {e}");
		}
	}
}

/// `hook 'message'`, with single quotes in the message escaped for `sh`.
fn hook_command_line(hook: &str, message: &str) -> String {
	let escaped = message.replace('\'', "'\\''");
	format!("{hook} '{escaped}'")
}

/// One cycle on the live page, with the snapshot and stop hook around it.
pub async fn solve_once<A: Assistant>(page: &BrowserPage, panel: &OverlayPanel, assistant: &A, mode: PromptMode, config: &AppConfig, session_id: &str) -> CycleReport {
	#[cfg(feature = "xdg")]
	if config.save_snapshots
		&& let Err(e) = save_page_html(page, session_id).await
	{
		elog!("Failed to save page HTML: {e}");
	}
	#[cfg(not(feature = "xdg"))]
	let _ = session_id;

	let report = run_cycle(page, panel, assistant, mode, &CycleOptions::from(config)).await;
	let message = cycle_message(&report);
	if report.outcome.is_halt() || report.error.is_some() {
		elog!("{message}");
	} else {
		log!("{message}");
	}
	run_stop_hook(config, &message);
	report
}

/// One-line summary handed to the log and the stop hook.
fn cycle_message(report: &CycleReport) -> String {
	match (&report.error, report.outcome.is_halt()) {
		(Some(e), _) => format!("Error: {e}"),
		(None, true) => format!("Cycle halted: {}", report.outcome),
		(None, false) => format!("Cycle finished: {}", report.outcome),
	}
}

/// Serve chord presses until Ctrl-C. Cycles run one after another; presses made during a cycle are served after it.
pub async fn watch<A: Assistant>(page: &BrowserPage, assistant: &A, mode: PromptMode, config: &AppConfig, session_id: &str) -> Result<()> {
	let chord: Chord = config.chord.parse()?;
	let panel = OverlayPanel::new(page);
	page.install_chord(&chord).await?;
	log!("Press {chord} in the page to solve it, Ctrl+C here to stop");

	let ctrl_c = tokio::signal::ctrl_c();
	tokio::pin!(ctrl_c);
	let mut served = 0u64;
	loop {
		tokio::select! {
			_ = &mut ctrl_c => {
				log!("Stopping watch");
				return Ok(());
			}
			_ = tokio::time::sleep(config.chord_poll()) => {}
		}

		let presses = match page.chord_presses().await {
			Ok(Some(presses)) => presses,
			Ok(None) => {
				// Navigation wiped the listener along with the old document
				tracing::debug!("Chord listener missing on {}, reinstalling", page.url().await);
				served = 0;
				if let Err(e) = page.install_chord(&chord).await {
					elog!("{e}");
				}
				continue;
			}
			Err(e) => {
				elog!("{e}");
				continue;
			}
		};
		if presses <= served {
			continue;
		}
		served += 1;
		solve_once(page, &panel, assistant, mode, config, session_id).await;
	}
}

/// Save page HTML to XDG state directory, for `replay`
#[cfg(feature = "xdg")]
pub async fn save_page_html(page: &BrowserPage, session_id: &str) -> Result<PathBuf> {
	let html_dir = xdg_state_dir!("persist_htmls").join(session_id);
	std::fs::create_dir_all(&html_dir).map_err(|e| eyre!("Failed to create HTML dir: {}", e))?;

	let url = page.url().await;
	let html = page.outer_html().await?;
	let filepath = html_dir.join(snapshot_filename(&url, chrono::Utc::now().timestamp()));

	std::fs::write(&filepath, html).map_err(|e| eyre!("Failed to write HTML file: {}", e))?;

	log!("Saved page HTML to: {}", filepath.display());
	Ok(filepath)
}

#[cfg(feature = "xdg")]
fn snapshot_filename(url: &str, timestamp: i64) -> String {
	let label = url.replace("https://", "").replace("http://", "");
	let safe_label: String = label.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();
	format!("{timestamp}_{safe_label}.html")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[cfg(feature = "xdg")]
	#[test]
	fn snapshot_names_are_filesystem_safe() {
		assert_eq!(snapshot_filename("https://leetcode.com/problems/two-sum/", 42), "42_leetcode_com_problems_two-sum_.html");
	}

	#[test]
	fn halts_and_errors_are_told_apart() {
		let halted = CycleReport {
			outcome: AutomationOutcome::NoRunControlFound,
			..Default::default()
		};
		assert_eq!(cycle_message(&halted), "Cycle halted: no run control found");

		let failed = CycleReport {
			error: Some("Claude API error: HTTP 502 Bad Gateway".to_string()),
			..Default::default()
		};
		assert_eq!(cycle_message(&failed), "Error: Claude API error: HTTP 502 Bad Gateway");

		let done = CycleReport {
			outcome: AutomationOutcome::Submitted,
			..Default::default()
		};
		assert_eq!(cycle_message(&done), "Cycle finished: submitted");
	}

	#[test]
	fn hook_message_is_single_quoted_for_sh() {
		assert_eq!(hook_command_line("notify-send", "Cycle finished: submitted"), "notify-send 'Cycle finished: submitted'");
		assert_eq!(hook_command_line("notify-send", "it's done"), r#"notify-send 'it'\''s done'"#);
	}

	#[test]
	fn options_follow_config() {
		let config = AppConfig {
			auto_run: false,
			before_injection_ms: 1,
			after_injection_ms: 2,
			after_run_ms: 3,
			..Default::default()
		};
		let options = CycleOptions::from(&config);
		assert!(!options.auto_run);
		assert_eq!(options.delays.before_injection, std::time::Duration::from_millis(1));
		assert_eq!(options.delays.after_run, std::time::Duration::from_millis(3));
	}
}
