use std::fmt;

pub mod automator;
pub mod browser;
pub mod chord;
pub mod config;
pub mod dom;
pub mod editor;
pub mod llm;
pub mod panel;
pub mod problem;
pub mod response;
pub mod runner;
pub mod snapshot;

/// How far one trigger-to-completion cycle got
///
/// Progress is strictly forward: NotAttempted -> Injected -> Ran -> AllTestsPassed -> Submitted. A step whose
/// precondition fails halts the cycle at the state reached so far, or at one of the two dedicated halt states.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AutomationOutcome {
	/// Nothing was written to the page (AI failure, or no code in the response)
	#[default]
	NotAttempted,
	/// Code is in the editor
	Injected,
	/// The run control was clicked
	Ran,
	/// The page reported success after the run
	AllTestsPassed,
	/// The submit control was clicked
	Submitted,
	/// The page has no editor candidate at all
	NoEditorFound,
	/// Code was injected but nothing looked like a run control
	NoRunControlFound,
}

impl AutomationOutcome {
	/// The two halt states that name a missing page control.
	pub fn is_halt(&self) -> bool {
		matches!(self, AutomationOutcome::NoEditorFound | AutomationOutcome::NoRunControlFound)
	}
}

impl fmt::Display for AutomationOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AutomationOutcome::NotAttempted => "not attempted",
			AutomationOutcome::Injected => "code injected",
			AutomationOutcome::Ran => "code ran",
			AutomationOutcome::AllTestsPassed => "all tests passed",
			AutomationOutcome::Submitted => "submitted",
			AutomationOutcome::NoEditorFound => "no editor found",
			AutomationOutcome::NoRunControlFound => "no run control found",
		};
		write!(f, "{s}")
	}
}

/// Which instruction template wraps the problem text. The pipeline is the same for both.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PromptMode {
	/// Ask for a submission-ready solution only
	#[default]
	Solve,
	/// Ask for an explained solution the user can review
	Review,
}

impl PromptMode {
	pub fn render(&self, problem: &str) -> String {
		match self {
			PromptMode::Solve => format!(
				r#"I'm working on this coding problem: {problem}.

IMPORTANT: I need a solution that will pass ALL test cases. Your code will be automatically inserted into the editor and run.

Please provide:
1. The most optimal solution with the correct time and space complexity
2. Code that handles ALL edge cases and corner cases
3. Clean, well-commented code that follows best practices

Format your response with the complete solution code in a SINGLE code block using triple backticks.

DO NOT include any explanations or analysis outside the code block - ONLY provide the working solution code."#
			),
			PromptMode::Review => format!(
				r#"I'm working on this coding problem: {problem}.

Please walk me through it:
1. Restate what the problem asks and the constraints that matter
2. Describe the approach and its time and space complexity
3. Point out the edge cases a solution has to handle

Then give the complete solution code in a SINGLE code block using triple backticks, so I can review it before running it."#
			),
		}
	}
}
