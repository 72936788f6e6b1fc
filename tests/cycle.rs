use std::{cell::RefCell, time::Duration};

use color_eyre::{Result, eyre::eyre};
use pretty_assertions::assert_eq;
use solve_headless::{
	AutomationOutcome, PromptMode,
	automator::Delays,
	editor::locate_editor,
	llm::{Assistant, CannedResponse},
	panel::Panel,
	runner::{CycleOptions, NO_EDITOR_NOTICE, inspect, run_cycle},
	snapshot::HtmlPage,
};

const LEETCODE_PAGE: &str = r#"<html><body>
	<div class="content__u3I1">Given an array of integers nums, return the indices of the two numbers that add up to target.</div>
	<textarea class="code-editor"></textarea>
	<button data-e2e-locator="console-run-button">Run</button>
	<button data-e2e-locator="console-submit-button">Submit</button>
	<div data-e2e-locator="console-test-result-success">Accepted</div>
</body></html>"#;

const RESPONSE: &str = "Use a hash map.\n```python\ndef two_sum(nums, target):\n    seen = {}\n    for i, n in enumerate(nums):\n        if target - n in seen:\n            return [seen[target - n], i]\n        seen[n] = i\n```";

#[derive(Debug, Eq, PartialEq)]
enum Shown {
	Loading,
	Response(String),
	Notice(String),
	Hidden,
}

#[derive(Default)]
struct RecordingPanel(RefCell<Vec<Shown>>);

impl Panel for RecordingPanel {
	async fn loading(&self) -> Result<()> {
		self.0.borrow_mut().push(Shown::Loading);
		Ok(())
	}

	async fn show_response(&self, response: &str) -> Result<()> {
		self.0.borrow_mut().push(Shown::Response(response.to_string()));
		Ok(())
	}

	async fn notice(&self, text: &str) -> Result<()> {
		self.0.borrow_mut().push(Shown::Notice(text.to_string()));
		Ok(())
	}

	async fn hide(&self) -> Result<()> {
		self.0.borrow_mut().push(Shown::Hidden);
		Ok(())
	}
}

struct Failing;

impl Assistant for Failing {
	async fn complete(&self, _prompt: &str) -> Result<String> {
		Err(eyre!("Gemini API error: quota exhausted"))
	}
}

/// Remembers the prompt it was given.
struct Recording {
	prompt: RefCell<Option<String>>,
	response: String,
}

impl Assistant for Recording {
	async fn complete(&self, prompt: &str) -> Result<String> {
		*self.prompt.borrow_mut() = Some(prompt.to_string());
		Ok(self.response.clone())
	}
}

#[tokio::test(start_paused = true)]
async fn full_cycle_reaches_submit() {
	let page = HtmlPage::parse(LEETCODE_PAGE);
	let panel = RecordingPanel::default();
	let assistant = Recording {
		prompt: RefCell::new(None),
		response: RESPONSE.to_string(),
	};

	let report = run_cycle(&page, &panel, &assistant, PromptMode::Solve, &CycleOptions::default()).await;

	assert_eq!(report.outcome, AutomationOutcome::Submitted);
	assert!(report.problem.starts_with("Given an array of integers nums"));
	assert!(report.code.starts_with("def two_sum(nums, target):"));
	let prompt = assistant.prompt.borrow().clone().unwrap();
	assert!(prompt.contains(&report.problem));
	assert_eq!(page.value_of(page.find("textarea").unwrap()), Some(report.code.clone()));
	assert_eq!(page.clicked().len(), 2);
	assert_eq!(*panel.0.borrow(), vec![Shown::Loading, Shown::Response(RESPONSE.to_string()), Shown::Hidden]);
}

#[tokio::test(start_paused = true)]
async fn fallback_editor_still_runs_and_submits() {
	let page = HtmlPage::parse(
		r#"<body>
			<div class="problem-description">Reverse the string s in place.</div>
			<textarea id="answer"></textarea>
			<button id="run">Run</button>
			<button id="send">Submit</button>
			<div class="success-icon"></div>
		</body>"#,
	);
	let target = locate_editor(&page).await.unwrap().unwrap();
	assert!(target.probe.is_none());

	let report = run_cycle(&page, &RecordingPanel::default(), &CannedResponse(RESPONSE.to_string()), PromptMode::Solve, &CycleOptions::default()).await;

	assert_eq!(report.outcome, AutomationOutcome::Submitted);
	assert_eq!(page.value_of(page.find("#answer").unwrap()), Some(report.code.clone()));
	assert_eq!(page.clicked(), vec![page.find("#run").unwrap(), page.find("#send").unwrap()]);
}

#[tokio::test(start_paused = true)]
async fn assistant_failure_is_shown_and_nothing_is_touched() {
	let page = HtmlPage::parse(LEETCODE_PAGE);
	let panel = RecordingPanel::default();

	let report = run_cycle(&page, &panel, &Failing, PromptMode::Solve, &CycleOptions::default()).await;

	assert_eq!(report.outcome, AutomationOutcome::NotAttempted);
	assert_eq!(report.error.as_deref(), Some("Gemini API error: quota exhausted"));
	assert!(page.mutations().is_empty());
	assert_eq!(*panel.0.borrow(), vec![Shown::Loading, Shown::Response("Error: Gemini API error: quota exhausted".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn prose_only_response_skips_injection() {
	let page = HtmlPage::parse(LEETCODE_PAGE);
	let panel = RecordingPanel::default();
	let assistant = CannedResponse("Think about complements of each number.".to_string());

	let report = run_cycle(&page, &panel, &assistant, PromptMode::Review, &CycleOptions::default()).await;

	assert_eq!(report.outcome, AutomationOutcome::NotAttempted);
	assert_eq!(report.code, "");
	assert!(page.mutations().is_empty());
	assert_eq!(panel.0.borrow().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_editor_is_reported_in_the_panel() {
	let page = HtmlPage::parse("<body><main>Print hello world.</main><button>Run</button></body>");
	let panel = RecordingPanel::default();

	let report = run_cycle(&page, &panel, &CannedResponse(RESPONSE.to_string()), PromptMode::Solve, &CycleOptions::default()).await;

	assert_eq!(report.outcome, AutomationOutcome::NoEditorFound);
	assert!(page.clicked().is_empty());
	assert_eq!(panel.0.borrow().last(), Some(&Shown::Notice(NO_EDITOR_NOTICE.to_string())));
}

#[tokio::test(start_paused = true)]
async fn auto_run_off_stops_after_injection() {
	let page = HtmlPage::parse(LEETCODE_PAGE);
	let options = CycleOptions {
		auto_run: false,
		..Default::default()
	};

	let report = run_cycle(&page, &RecordingPanel::default(), &CannedResponse(RESPONSE.to_string()), PromptMode::Solve, &options).await;

	assert_eq!(report.outcome, AutomationOutcome::Injected);
	assert!(page.clicked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn editor_is_untouched_until_the_pre_injection_delay_elapses() {
	let page = HtmlPage::parse(LEETCODE_PAGE);
	let panel = RecordingPanel::default();
	let assistant = CannedResponse(RESPONSE.to_string());
	let options = CycleOptions {
		delays: Delays::new(Duration::from_millis(500), Duration::from_millis(300), Duration::from_millis(3000)),
		auto_run: true,
	};

	let cycle = run_cycle(&page, &panel, &assistant, PromptMode::Solve, &options);
	tokio::pin!(cycle);
	tokio::select! {
		_ = &mut cycle => panic!("cycle finished early"),
		_ = tokio::time::sleep(Duration::from_millis(499)) => {}
	}
	assert!(page.mutations().is_empty());

	assert_eq!(cycle.await.outcome, AutomationOutcome::Submitted);
}

#[tokio::test]
async fn inspection_reports_what_a_cycle_would_use() {
	let page = HtmlPage::parse(LEETCODE_PAGE);
	let inspection = inspect(&page).await.unwrap();

	assert!(inspection.editor.is_some());
	assert!(inspection.run_control && inspection.submit_control);
	assert!(inspection.verdict.is_success());
	assert!(page.mutations().is_empty());
	assert!(inspection.to_string().contains("Editor: plain via textarea.code-editor"));
}
