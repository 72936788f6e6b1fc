//! Locating the page's code editor and replacing its contents.

use std::fmt;

use color_eyre::Result;

use crate::{
	AutomationOutcome,
	dom::{Dom, Field, NodeInfo, Probe, SyntheticEvent, first_match},
};

/// Known editor surfaces, most specific first.
pub const EDITOR_PROBES: &[Probe] = &[
	Probe::new("leetcode", ".CodeMirror"),
	Probe::new("leetcode", ".monaco-editor"),
	Probe::new("hackerrank", ".inputarea"),
	Probe::new("hackerrank", ".CodeMirror-code"),
	Probe::new("codesignal", ".cm-content"),
	Probe::new("generic", r#"[role="code-editor"]"#),
	Probe::new("generic", r#"[data-mode="text/javascript"]"#),
	Probe::new("generic", r#"[data-mode="text/python"]"#),
	Probe::new("generic", r#"[data-mode="text/java"]"#),
	Probe::new("generic", r#"[data-mode="text/cpp"]"#),
	Probe::new("generic", "textarea.code-editor"),
	Probe::new("monaco", ".monaco-editor .view-lines"),
];

/// Used only when no probe matched; the first hit in document order is taken.
pub const FALLBACK_EDITOR_SELECTOR: &str = r#"textarea, [contenteditable="true"]"#;

/// Editor implementation family, decided by the matched element's class markers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EditorFamily {
	/// `.CodeMirror` widgets: an editor instance hangs off the element
	CodeMirror,
	/// `.monaco-editor` / `.view-lines`: content lives in a global model registry
	Monaco,
	/// `<textarea>` or any other element edited through `value`/`textContent`
	Plain,
}

impl EditorFamily {
	pub fn classify(info: &NodeInfo) -> Self {
		if info.has_class("CodeMirror") {
			EditorFamily::CodeMirror
		} else if info.has_class("monaco-editor") || info.has_class("view-lines") {
			EditorFamily::Monaco
		} else {
			EditorFamily::Plain
		}
	}
}

impl fmt::Display for EditorFamily {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EditorFamily::CodeMirror => write!(f, "CodeMirror"),
			EditorFamily::Monaco => write!(f, "Monaco"),
			EditorFamily::Plain => write!(f, "plain"),
		}
	}
}

/// The widget matched for this cycle.
#[derive(Clone, Debug)]
pub struct EditorTarget<N> {
	pub node: N,
	pub family: EditorFamily,
	pub info: NodeInfo,
	/// `None` when found through [`FALLBACK_EDITOR_SELECTOR`]
	pub probe: Option<Probe>,
}

/// Find the editor to write into. `Ok(None)` means the page has no candidate at all.
pub async fn locate_editor<D: Dom>(dom: &D) -> Result<Option<EditorTarget<D::Node>>> {
	if let Some((probe, node)) = first_match(dom, EDITOR_PROBES).await {
		let info = dom.describe(&node).await?;
		let family = EditorFamily::classify(&info);
		tracing::debug!("Editor matched {probe}, treating it as {family}");
		return Ok(Some(EditorTarget {
			node,
			family,
			info,
			probe: Some(probe),
		}));
	}

	let Some(node) = dom.query(FALLBACK_EDITOR_SELECTOR).await? else {
		return Ok(None);
	};
	let info = dom.describe(&node).await?;
	tracing::debug!("No known editor, falling back to first <{}> in the document", info.tag);
	Ok(Some(EditorTarget {
		node,
		family: EditorFamily::Plain,
		info,
		probe: None,
	}))
}

/// Clear the editor, then write `code` into it.
///
/// The clear is silent; notification events fire once, after the final write, so listeners only ever observe the
/// finished contents.
pub async fn replace_contents<D: Dom>(dom: &D, target: &EditorTarget<D::Node>, code: &str) -> Result<bool> {
	write_editor(dom, target, "", false).await?;
	write_editor(dom, target, code, true).await
}

const INPUT_ONLY: &[SyntheticEvent] = &[SyntheticEvent::Input];
const INPUT_AND_CHANGE: &[SyntheticEvent] = &[SyntheticEvent::Input, SyntheticEvent::Change];

/// Returns false when the matched widget offered no writable surface.
async fn write_editor<D: Dom>(dom: &D, target: &EditorTarget<D::Node>, value: &str, notify: bool) -> Result<bool> {
	match target.family {
		EditorFamily::CodeMirror => {
			if dom.set_instance_value(&target.node, value).await? {
				return Ok(true);
			}
			write_nested_input(dom, &target.node, value, if notify { INPUT_ONLY } else { &[] }).await
		}
		EditorFamily::Monaco => {
			if dom.set_model_value(value).await? {
				return Ok(true);
			}
			write_nested_input(dom, &target.node, value, if notify { INPUT_AND_CHANGE } else { &[] }).await
		}
		EditorFamily::Plain => {
			let field = if target.info.is_textarea() { Field::Value } else { Field::TextContent };
			dom.write(&target.node, field, value).await?;
			if notify {
				dom.dispatch(&target.node, SyntheticEvent::Input).await?;
			}
			Ok(true)
		}
	}
}

async fn write_nested_input<D: Dom>(dom: &D, widget: &D::Node, value: &str, events: &[SyntheticEvent]) -> Result<bool> {
	let Some(input) = dom.query_within(widget, "textarea").await? else {
		return Ok(false);
	};
	dom.write(&input, Field::Value, value).await?;
	for event in events {
		dom.dispatch(&input, *event).await?;
	}
	Ok(true)
}

/// Locate the editor and put `code` into it.
///
/// Yields [`AutomationOutcome::Injected`] once a widget was matched, or [`AutomationOutcome::NoEditorFound`] when the
/// page has no candidate; in the latter case nothing on the page is touched.
pub async fn inject<D: Dom>(dom: &D, code: &str) -> Result<AutomationOutcome> {
	let Some(target) = locate_editor(dom).await? else {
		tracing::warn!("Could not find a code editor on this page");
		return Ok(AutomationOutcome::NoEditorFound);
	};

	if !replace_contents(dom, &target, code).await? {
		// One linear attempt: a matched widget is never swapped for another family.
		tracing::warn!("Matched {} editor exposed no writable surface", target.family);
	}
	Ok(AutomationOutcome::Injected)
}
