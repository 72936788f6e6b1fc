//! Best-effort problem statement extraction.

use crate::dom::{Dom, Probe};

/// Problem containers, most specific first. The first element with non-blank text wins.
pub const PROBLEM_PROBES: &[Probe] = &[
	Probe::new("leetcode", ".question-content__JfgR"),
	Probe::new("leetcode", ".content__u3I1"),
	Probe::new("hackerrank", ".challenge-body-html"),
	Probe::new("hackerrank", ".challenge-text"),
	Probe::new("codesignal", ".task-description"),
	Probe::new("generic", r#"[role="main"]"#),
	Probe::new("generic", "main"),
	Probe::new("generic", ".problem-statement"),
	Probe::new("generic", ".problem-description"),
];

/// How much of the page text is sent when no known container matches.
pub const FALLBACK_CHARS: usize = 5000;

/// Read the problem statement off the page. Never fails: page errors degrade to the generic fallback.
pub async fn extract_problem<D: Dom>(dom: &D) -> String {
	extract_with(dom, PROBLEM_PROBES).await
}

/// Like [`extract_problem`], over any probe table. A matched container with only whitespace does not end the walk;
/// the next probe is tried before falling back to the page text.
pub async fn extract_with<D: Dom>(dom: &D, probes: &[Probe]) -> String {
	for probe in probes {
		let node = match dom.query(probe.selector).await {
			Ok(Some(node)) => node,
			Ok(None) => continue,
			Err(e) => {
				tracing::warn!("Skipping problem probe {probe}: {e}");
				continue;
			}
		};
		match dom.text(&node).await {
			Ok(text) if !text.trim().is_empty() => {
				tracing::debug!("Problem text taken from {probe}");
				return text.trim().to_string();
			}
			Ok(_) => {}
			Err(e) => tracing::warn!("Failed to read text of {probe}: {e}"),
		}
	}

	tracing::debug!("No problem container matched, falling back to page text");
	match dom.page_text().await {
		Ok(text) => text.chars().take(FALLBACK_CHARS).collect(),
		Err(e) => {
			tracing::warn!("Failed to read page text: {e}");
			String::new()
		}
	}
}
