//! [`Dom`] over a parsed HTML document.
//!
//! Backs the `replay` command (saved page snapshots) and the test-suite. The parsed tree is immutable; every write,
//! event and click is appended to a journal instead, and reads consult the journal before the original markup.

use std::cell::RefCell;

use color_eyre::{Result, eyre::eyre};
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

use crate::dom::{Dom, Field, NodeInfo, SyntheticEvent};

/// A side effect the automation performed on the page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mutation {
	Write { node: NodeId, field: Field, value: String },
	Event { node: NodeId, event: SyntheticEvent },
	Click { node: NodeId },
	InstanceValue { node: NodeId, value: String },
	ModelValue { value: String },
}

pub struct HtmlPage {
	doc: Html,
	/// Elements carrying the `CodeMirror` class expose an editor instance
	editor_instances: bool,
	/// The page has a global editor-model registry with at least one model
	model_registry: bool,
	journal: RefCell<Vec<Mutation>>,
}

impl HtmlPage {
	pub fn parse(html: &str) -> Self {
		Self {
			doc: Html::parse_document(html),
			editor_instances: false,
			model_registry: false,
			journal: RefCell::new(Vec::new()),
		}
	}

	/// Pretend the page's CodeMirror widgets carry a live editor instance.
	pub fn with_editor_instances(mut self) -> Self {
		self.editor_instances = true;
		self
	}

	/// Pretend the page exposes a Monaco-style model registry with one model.
	pub fn with_model_registry(mut self) -> Self {
		self.model_registry = true;
		self
	}

	pub fn mutations(&self) -> Vec<Mutation> {
		self.journal.borrow().clone()
	}

	/// First element matching `selector`; invalid selectors match nothing.
	pub fn find(&self, selector: &str) -> Option<NodeId> {
		let selector = Selector::parse(selector).ok()?;
		self.doc.select(&selector).next().map(|el| el.id())
	}

	/// Current form value: the last value written, else the markup default.
	pub fn value_of(&self, node: NodeId) -> Option<String> {
		let written = self.journal.borrow().iter().rev().find_map(|m| match m {
			Mutation::Write { node: n, field: Field::Value, value } if *n == node => Some(value.clone()),
			_ => None,
		});
		if written.is_some() {
			return written;
		}
		let el = self.element(node).ok()?;
		match el.value().name() {
			"textarea" => Some(el.text().collect()),
			_ => el.value().attr("value").map(str::to_string),
		}
	}

	pub fn events_on(&self, node: NodeId) -> Vec<SyntheticEvent> {
		self.journal
			.borrow()
			.iter()
			.filter_map(|m| match m {
				Mutation::Event { node: n, event } if *n == node => Some(*event),
				_ => None,
			})
			.collect()
	}

	pub fn clicked(&self) -> Vec<NodeId> {
		self.journal
			.borrow()
			.iter()
			.filter_map(|m| match m {
				Mutation::Click { node } => Some(*node),
				_ => None,
			})
			.collect()
	}

	pub fn instance_value(&self, node: NodeId) -> Option<String> {
		self.journal.borrow().iter().rev().find_map(|m| match m {
			Mutation::InstanceValue { node: n, value } if *n == node => Some(value.clone()),
			_ => None,
		})
	}

	pub fn model_value(&self) -> Option<String> {
		self.journal.borrow().iter().rev().find_map(|m| match m {
			Mutation::ModelValue { value } => Some(value.clone()),
			_ => None,
		})
	}

	/// Most recent non-empty content put anywhere on the page, through any surface.
	pub fn last_written(&self) -> Option<String> {
		self.journal.borrow().iter().rev().find_map(|m| match m {
			Mutation::Write { value, .. } | Mutation::InstanceValue { value, .. } | Mutation::ModelValue { value } if !value.is_empty() => Some(value.clone()),
			_ => None,
		})
	}

	fn element(&self, node: NodeId) -> Result<ElementRef<'_>> {
		self.doc
			.tree
			.get(node)
			.and_then(ElementRef::wrap)
			.ok_or_else(|| eyre!("Node {node:?} is not an element of this page"))
	}

	fn record(&self, mutation: Mutation) {
		self.journal.borrow_mut().push(mutation);
	}
}

fn parse_selector(selector: &str) -> Result<Selector> {
	Selector::parse(selector).map_err(|e| eyre!("Invalid selector {selector:?}: {e:?}"))
}

impl Dom for HtmlPage {
	type Node = NodeId;

	async fn query(&self, selector: &str) -> Result<Option<NodeId>> {
		let selector = parse_selector(selector)?;
		Ok(self.doc.select(&selector).next().map(|el| el.id()))
	}

	async fn query_all(&self, selector: &str) -> Result<Vec<NodeId>> {
		let selector = parse_selector(selector)?;
		Ok(self.doc.select(&selector).map(|el| el.id()).collect())
	}

	async fn query_within(&self, node: &NodeId, selector: &str) -> Result<Option<NodeId>> {
		let selector = parse_selector(selector)?;
		Ok(self.element(*node)?.select(&selector).next().map(|el| el.id()))
	}

	async fn describe(&self, node: &NodeId) -> Result<NodeInfo> {
		let el = self.element(*node)?;
		Ok(NodeInfo {
			tag: el.value().name().to_lowercase(),
			classes: el.value().classes().map(str::to_string).collect(),
		})
	}

	async fn text(&self, node: &NodeId) -> Result<String> {
		let written = self.journal.borrow().iter().rev().find_map(|m| match m {
			Mutation::Write {
				node: n,
				field: Field::TextContent,
				value,
			} if n == node => Some(value.clone()),
			_ => None,
		});
		match written {
			Some(text) => Ok(text),
			None => Ok(self.element(*node)?.text().collect()),
		}
	}

	async fn page_text(&self) -> Result<String> {
		let body = parse_selector("body")?;
		let root = self.doc.select(&body).next().unwrap_or_else(|| self.doc.root_element());
		Ok(root.text().collect())
	}

	async fn write(&self, node: &NodeId, field: Field, value: &str) -> Result<()> {
		self.element(*node)?;
		self.record(Mutation::Write {
			node: *node,
			field,
			value: value.to_string(),
		});
		Ok(())
	}

	async fn dispatch(&self, node: &NodeId, event: SyntheticEvent) -> Result<()> {
		self.element(*node)?;
		self.record(Mutation::Event { node: *node, event });
		Ok(())
	}

	async fn click(&self, node: &NodeId) -> Result<()> {
		self.element(*node)?;
		self.record(Mutation::Click { node: *node });
		Ok(())
	}

	async fn set_instance_value(&self, node: &NodeId, value: &str) -> Result<bool> {
		let el = self.element(*node)?;
		if !self.editor_instances || !el.value().classes().any(|c| c == "CodeMirror") {
			return Ok(false);
		}
		self.record(Mutation::InstanceValue {
			node: *node,
			value: value.to_string(),
		});
		Ok(true)
	}

	async fn set_model_value(&self, value: &str) -> Result<bool> {
		if !self.model_registry {
			return Ok(false);
		}
		self.record(Mutation::ModelValue { value: value.to_string() });
		Ok(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn journal_overrides_markup_defaults() {
		let page = HtmlPage::parse(r#"<body><textarea id="t">old</textarea><div id="d">text</div></body>"#);
		let ta = page.find("#t").unwrap();
		let div = page.find("#d").unwrap();
		assert_eq!(page.value_of(ta).as_deref(), Some("old"));

		page.write(&ta, Field::Value, "new").await.unwrap();
		page.write(&div, Field::TextContent, "replaced").await.unwrap();

		assert_eq!(page.value_of(ta).as_deref(), Some("new"));
		assert_eq!(page.text(&div).await.unwrap(), "replaced");
	}

	#[tokio::test]
	async fn invalid_selector_is_an_error() {
		let page = HtmlPage::parse("<body></body>");
		assert!(page.query("div:contains(\"x\")").await.is_err());
		assert!(page.find("div:contains(\"x\")").is_none());
	}

	#[tokio::test]
	async fn query_within_excludes_the_scope_itself() {
		let page = HtmlPage::parse(r#"<body><div class="box" id="outer"><div class="box" id="inner"></div></div></body>"#);
		let outer = page.find("#outer").unwrap();
		let inner = page.query_within(&outer, ".box").await.unwrap();
		assert_eq!(inner, page.find("#inner"));
	}
}
