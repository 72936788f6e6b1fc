//! Abstract view of the host page.
//!
//! Every heuristic in the crate talks to the page only through [`Dom`], so the same selector tables drive a live
//! Chromium tab ([`crate::browser::BrowserPage`]) and a parsed HTML snapshot ([`crate::snapshot::HtmlPage`]).

use std::fmt;

use color_eyre::Result;

/// One row of a selector priority table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Probe {
	/// Which host platform the selector was written for ("generic" when not platform specific)
	pub platform: &'static str,
	/// CSS selector handed to `querySelector`
	pub selector: &'static str,
}

impl Probe {
	pub const fn new(platform: &'static str, selector: &'static str) -> Self {
		Self { platform, selector }
	}
}

impl fmt::Display for Probe {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.selector, self.platform)
	}
}

/// Tag name and class list of an element, lower-cased tag.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeInfo {
	pub tag: String,
	pub classes: Vec<String>,
}

impl NodeInfo {
	pub fn has_class(&self, class: &str) -> bool {
		self.classes.iter().any(|c| c == class)
	}

	pub fn is_textarea(&self) -> bool {
		self.tag == "textarea"
	}
}

/// Which property of an element a write replaces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Field {
	/// The form-control `value`
	Value,
	/// `textContent`, for contenteditable surfaces
	TextContent,
}

/// Synthetic events the injector fires. Always dispatched with `bubbles: true`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyntheticEvent {
	Input,
	Change,
}

impl SyntheticEvent {
	pub fn name(&self) -> &'static str {
		match self {
			SyntheticEvent::Input => "input",
			SyntheticEvent::Change => "change",
		}
	}
}

/// Read/write access to the current document.
///
/// Invalid selectors are errors, not misses; callers walking a priority table skip them.
#[allow(async_fn_in_trait)]
pub trait Dom {
	/// Opaque handle to a matched element. Only valid for the cycle that obtained it.
	type Node: Clone + fmt::Debug;

	/// First element matching `selector` in document order.
	async fn query(&self, selector: &str) -> Result<Option<Self::Node>>;
	/// All elements matching `selector` in document order.
	async fn query_all(&self, selector: &str) -> Result<Vec<Self::Node>>;
	/// First descendant of `node` matching `selector`.
	async fn query_within(&self, node: &Self::Node, selector: &str) -> Result<Option<Self::Node>>;
	async fn describe(&self, node: &Self::Node) -> Result<NodeInfo>;
	/// `textContent` of the element, untrimmed.
	async fn text(&self, node: &Self::Node) -> Result<String>;
	/// `textContent` of the whole body.
	async fn page_text(&self) -> Result<String>;
	async fn write(&self, node: &Self::Node, field: Field, value: &str) -> Result<()>;
	async fn dispatch(&self, node: &Self::Node, event: SyntheticEvent) -> Result<()>;
	async fn click(&self, node: &Self::Node) -> Result<()>;
	/// Set the value through an editor instance attached to `node` (CodeMirror-style widgets).
	/// Returns false when no such instance is reachable.
	async fn set_instance_value(&self, node: &Self::Node, value: &str) -> Result<bool>;
	/// Set the value of the first model in the page's global editor-model registry (Monaco-style widgets).
	/// Returns false when the registry is missing or empty.
	async fn set_model_value(&self, value: &str) -> Result<bool>;
}

/// Walk `probes` in order and return the first one that matches, with its element.
pub async fn first_match<D: Dom>(dom: &D, probes: &[Probe]) -> Option<(Probe, D::Node)> {
	for probe in probes {
		match dom.query(probe.selector).await {
			Ok(Some(node)) => return Some((*probe, node)),
			Ok(None) => {}
			Err(e) => tracing::warn!("Skipping probe {probe}: {e}"),
		}
	}
	None
}

/// First `<button>` whose lower-cased text contains any of `needles`.
pub async fn button_with_text<D: Dom>(dom: &D, needles: &[&str]) -> Result<Option<(String, D::Node)>> {
	for button in dom.query_all("button").await? {
		let text = dom.text(&button).await?.to_lowercase();
		if needles.iter().any(|n| text.contains(n)) {
			return Ok(Some((text.trim().to_string(), button)));
		}
	}
	Ok(None)
}
