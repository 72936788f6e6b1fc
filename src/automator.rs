//! Run the injected code, read the verdict off the page, submit only on affirmative success.

use std::{fmt, time::Duration};

use color_eyre::Result;
use derive_new::new;
use v_utils::{elog, log};

use crate::{
	AutomationOutcome,
	dom::{Dom, Probe, button_with_text, first_match},
};

pub const RUN_PROBES: &[Probe] = &[
	Probe::new("leetcode", r#"[data-e2e-locator="console-run-button"]"#),
	Probe::new("generic", ".run-code-btn"),
	Probe::new("generic", "#run-code"),
	Probe::new("generic", r#"[data-cy="run-code-btn"]"#),
	Probe::new("generic", "button.run"),
	Probe::new("generic", r#"[title="Run Code"]"#),
	Probe::new("generic", r#"[aria-label="Run Code"]"#),
	Probe::new("generic", ".execute-code"),
	Probe::new("generic", r#"[title*="Run"]"#),
	Probe::new("generic", r#"[aria-label*="Run"]"#),
];
pub const RUN_BUTTON_TEXT: &[&str] = &["run", "execute"];

/// Any of these present after a run is taken as "everything passed".
pub const PASS_PROBES: &[Probe] = &[
	Probe::new("generic", ".test-case-success"),
	Probe::new("leetcode", r#"[data-e2e-locator="console-test-result-success"]"#),
	Probe::new("generic", ".success-icon"),
	Probe::new("generic", ".test-success"),
	Probe::new("generic", ".test-result-success"),
	Probe::new("generic", ".passed-test"),
	Probe::new("generic", r#"[data-cy="test-success"]"#),
];
pub const TEST_CASE_SELECTOR: &str = r#".test-case, .test-result, [data-cy="test-case"]"#;
/// Lower-case substrings that mark a test-case element as failed.
pub const FAILURE_MARKERS: &[&str] = &["fail", "error", "wrong"];

pub const SUBMIT_PROBES: &[Probe] = &[
	Probe::new("leetcode", r#"[data-e2e-locator="console-submit-button"]"#),
	Probe::new("generic", ".submit-button"),
	Probe::new("generic", "#submit-button"),
	Probe::new("generic", r#"[data-cy="submit-button"]"#),
	Probe::new("generic", "button.submit"),
	Probe::new("generic", r#"[title="Submit"]"#),
	Probe::new("generic", r#"[aria-label="Submit"]"#),
];
pub const SUBMIT_BUTTON_TEXT: &[&str] = &["submit"];

/// Fixed waits between pipeline steps. Test execution on the host page gives no completion signal, so these are
/// plain sleeps.
#[derive(Clone, Copy, Debug, Eq, PartialEq, new)]
pub struct Delays {
	/// After the response is shown, before the editor is touched
	pub before_injection: Duration,
	/// After injection, before looking for the run control
	pub after_injection: Duration,
	/// After clicking run, before reading the verdict
	pub after_run: Duration,
}

impl Default for Delays {
	fn default() -> Self {
		Self::new(Duration::from_millis(500), Duration::from_millis(300), Duration::from_millis(3000))
	}
}

/// What the page says about the last run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
	/// A known success indicator is present
	Indicator { selector: &'static str },
	/// Test-case elements exist and none carries a failure marker
	CasesClean { cases: usize },
	/// A test-case element carries a failure marker
	CaseFailed { text: String },
	/// Nothing on the page speaks to the outcome
	NoEvidence,
}

impl Verdict {
	pub fn is_success(&self) -> bool {
		matches!(self, Verdict::Indicator { .. } | Verdict::CasesClean { .. })
	}
}

impl fmt::Display for Verdict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Verdict::Indicator { selector } => write!(f, "success indicator {selector}"),
			Verdict::CasesClean { cases } => write!(f, "{cases} test case(s), none failing"),
			Verdict::CaseFailed { text } => write!(f, "failing test case: {text}"),
			Verdict::NoEvidence => write!(f, "no test results on the page"),
		}
	}
}

/// Locate a control through its probe table, then through button text.
pub async fn find_control<D: Dom>(dom: &D, probes: &[Probe], button_text: &[&str]) -> Result<Option<D::Node>> {
	if let Some((probe, node)) = first_match(dom, probes).await {
		tracing::debug!("Control matched {probe}");
		return Ok(Some(node));
	}
	if let Some((text, node)) = button_with_text(dom, button_text).await? {
		tracing::debug!("Control matched by button text {text:?}");
		return Ok(Some(node));
	}
	Ok(None)
}

pub async fn detect_verdict<D: Dom>(dom: &D) -> Result<Verdict> {
	if let Some((probe, _)) = first_match(dom, PASS_PROBES).await {
		return Ok(Verdict::Indicator { selector: probe.selector });
	}

	let cases = dom.query_all(TEST_CASE_SELECTOR).await?;
	if cases.is_empty() {
		return Ok(Verdict::NoEvidence);
	}
	for case in &cases {
		let text = dom.text(case).await?;
		let lower = text.to_lowercase();
		if FAILURE_MARKERS.iter().any(|m| lower.contains(m)) {
			return Ok(Verdict::CaseFailed { text: text.trim().to_string() });
		}
	}
	Ok(Verdict::CasesClean { cases: cases.len() })
}

/// Click run, wait for results, submit when they are unambiguously green. One attempt, no retries.
///
/// Starts from [`AutomationOutcome::Injected`]; page errors halt at whatever state was reached.
pub async fn run_and_submit<D: Dom>(dom: &D, delays: &Delays) -> AutomationOutcome {
	let mut outcome = AutomationOutcome::Injected;
	if let Err(e) = drive(dom, delays, &mut outcome).await {
		elog!("Run/submit stopped at {outcome}: {e}");
	}
	outcome
}

async fn drive<D: Dom>(dom: &D, delays: &Delays, outcome: &mut AutomationOutcome) -> Result<()> {
	tokio::time::sleep(delays.after_injection).await;

	let Some(run) = find_control(dom, RUN_PROBES, RUN_BUTTON_TEXT).await? else {
		log!("Could not find a run button");
		*outcome = AutomationOutcome::NoRunControlFound;
		return Ok(());
	};
	dom.click(&run).await?;
	*outcome = AutomationOutcome::Ran;

	tokio::time::sleep(delays.after_run).await;

	let verdict = detect_verdict(dom).await?;
	if !verdict.is_success() {
		log!("Not all tests passed ({verdict}), not submitting");
		return Ok(());
	}
	log!("All tests passed ({verdict}), submitting solution...");
	*outcome = AutomationOutcome::AllTestsPassed;

	let Some(submit) = find_control(dom, SUBMIT_PROBES, SUBMIT_BUTTON_TEXT).await? else {
		log!("Could not find a submit button");
		return Ok(());
	};
	dom.click(&submit).await?;
	*outcome = AutomationOutcome::Submitted;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_affirmative_verdicts_count_as_success() {
		assert!(Verdict::Indicator { selector: ".passed-test" }.is_success());
		assert!(Verdict::CasesClean { cases: 3 }.is_success());
		assert!(!Verdict::CaseFailed { text: "Wrong Answer".into() }.is_success());
		assert!(!Verdict::NoEvidence.is_success());
	}

	#[test]
	fn tables_are_valid_css() {
		for probe in RUN_PROBES.iter().chain(PASS_PROBES).chain(SUBMIT_PROBES) {
			assert!(scraper::Selector::parse(probe.selector).is_ok(), "{probe}");
		}
		assert!(scraper::Selector::parse(TEST_CASE_SELECTOR).is_ok());
	}

	#[test]
	fn run_table_never_submits() {
		assert!(RUN_PROBES.iter().all(|p| !p.selector.contains("submit")));
	}
}
