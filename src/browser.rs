//! Live Chromium page: [`Dom`] and [`Panel`] implemented by evaluating scripts over the DevTools protocol.
//!
//! Matched elements are kept in a page-side array and referred to by index, so the host document itself is never
//! tagged. A navigation drops the array; stale handles then fail loudly instead of touching the wrong element.

use chromiumoxide::{
	Page,
	browser::{Browser, BrowserConfig},
};
use color_eyre::{
	Result,
	eyre::{bail, eyre},
};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use v_utils::log;

use crate::{
	chord::{CHORD_COUNTER, Chord},
	config::AppConfig,
	dom::{Dom, Field, NodeInfo, SyntheticEvent},
	panel::Panel,
	response::{escape_html, format_response_html},
};

const NODES: &str = "__solveNodes";

/// Page-side helper: remember an element and return its index.
const REGISTER_JS: &str = r#"
	function register(el) {
		const reg = window.__solveNodes || (window.__solveNodes = []);
		let i = reg.indexOf(el);
		if (i < 0) {
			i = reg.length;
			reg.push(el);
		}
		return i;
	}
"#;

/// Index into the page-side element registry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NodeRef(u64);

/// Encode a Rust string as a JS string literal.
fn js_str(s: &str) -> String {
	serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[derive(Clone, Debug)]
pub struct BrowserPage {
	page: Page,
}

impl BrowserPage {
	pub fn new(page: Page) -> Self {
		Self { page }
	}

	pub fn inner(&self) -> &Page {
		&self.page
	}

	pub async fn url(&self) -> String {
		self.page.url().await.ok().flatten().unwrap_or_default()
	}

	pub async fn outer_html(&self) -> Result<String> {
		let html = self
			.page
			.evaluate("document.documentElement.outerHTML")
			.await
			.map_err(|e| eyre!("Failed to get page HTML: {}", e))?;
		Ok(html.value().and_then(|v| v.as_str()).unwrap_or("<html></html>").to_string())
	}

	/// Install the chord listener on the current document (no-op if already there).
	pub async fn install_chord(&self, chord: &Chord) -> Result<()> {
		self.page.evaluate(chord.listener_js()).await.map_err(|e| eyre!("Failed to install chord listener: {}", e))?;
		Ok(())
	}

	/// Presses counted by the listener so far; `None` when the document has no listener (e.g. after navigation).
	pub async fn chord_presses(&self) -> Result<Option<u64>> {
		let script = format!("(typeof window.{CHORD_COUNTER} === 'number') ? window.{CHORD_COUNTER} : -1");
		let result = self.page.evaluate(script).await.map_err(|e| eyre!("Failed to read chord counter: {}", e))?;
		Ok(result.value().and_then(|v| v.as_i64()).and_then(|n| u64::try_from(n).ok()))
	}

	/// Evaluate a script that returns a JSON string and parse it.
	async fn eval_json(&self, script: String) -> Result<Value> {
		let result = self.page.evaluate(script).await.map_err(|e| eyre!("Failed to evaluate page script: {}", e))?;
		let json_str = result.value().and_then(|v| v.as_str()).ok_or_else(|| eyre!("Page script returned no JSON"))?;
		serde_json::from_str(json_str).map_err(|e| eyre!("Failed to parse page script result: {}", e))
	}

	async fn select(&self, scope: Option<NodeRef>, selector: &str, all: bool) -> Result<Vec<NodeRef>> {
		let scope_expr = match scope {
			Some(node) => format!("(window.{NODES} || [])[{}]", node.0),
			None => "document".to_string(),
		};
		let script = format!(
			r#"
			(function() {{
				{REGISTER_JS}
				const scope = {scope_expr};
				if (!scope) return JSON.stringify({{ stale: true }});
				let found;
				try {{
					found = {all} ? Array.from(scope.querySelectorAll({sel})) : [scope.querySelector({sel})].filter(Boolean);
				}} catch (e) {{
					return JSON.stringify({{ invalid: String(e) }});
				}}
				return JSON.stringify({{ nodes: found.map(register) }});
			}})()
			"#,
			sel = js_str(selector),
		);

		let parsed = self.eval_json(script).await?;
		if parsed["stale"].as_bool() == Some(true) {
			bail!("Scope node is no longer attached to the page");
		}
		if let Some(reason) = parsed["invalid"].as_str() {
			bail!("Invalid selector {selector:?}: {reason}");
		}
		Ok(parsed["nodes"].as_array().map(|arr| arr.iter().filter_map(|v| v.as_u64()).map(NodeRef).collect()).unwrap_or_default())
	}

	/// Run `body` with `el` bound to the node; `body` must `return` a JSON-serialisable value.
	async fn with_node(&self, node: NodeRef, body: &str) -> Result<Value> {
		let script = format!(
			r#"
			(function() {{
				const el = (window.{NODES} || [])[{id}];
				if (!el) return JSON.stringify({{ stale: true }});
				const value = (function(el) {{ {body} }})(el);
				return JSON.stringify({{ value: value === undefined ? null : value }});
			}})()
			"#,
			id = node.0,
		);
		let parsed = self.eval_json(script).await?;
		if parsed["stale"].as_bool() == Some(true) {
			bail!("Node {} is no longer attached to the page", node.0);
		}
		Ok(parsed["value"].clone())
	}
}

impl Dom for BrowserPage {
	type Node = NodeRef;

	async fn query(&self, selector: &str) -> Result<Option<NodeRef>> {
		Ok(self.select(None, selector, false).await?.into_iter().next())
	}

	async fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>> {
		self.select(None, selector, true).await
	}

	async fn query_within(&self, node: &NodeRef, selector: &str) -> Result<Option<NodeRef>> {
		Ok(self.select(Some(*node), selector, false).await?.into_iter().next())
	}

	async fn describe(&self, node: &NodeRef) -> Result<NodeInfo> {
		let value = self.with_node(*node, "return { tag: el.tagName.toLowerCase(), classes: Array.from(el.classList || []) };").await?;
		Ok(NodeInfo {
			tag: value["tag"].as_str().unwrap_or_default().to_string(),
			classes: value["classes"]
				.as_array()
				.map(|arr| arr.iter().filter_map(|c| c.as_str()).map(str::to_string).collect())
				.unwrap_or_default(),
		})
	}

	async fn text(&self, node: &NodeRef) -> Result<String> {
		let value = self.with_node(*node, "return el.textContent || '';").await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	async fn page_text(&self) -> Result<String> {
		let result = self
			.page
			.evaluate("document.body ? (document.body.textContent || '') : ''")
			.await
			.map_err(|e| eyre!("Failed to read page text: {}", e))?;
		Ok(result.value().and_then(|v| v.as_str()).unwrap_or_default().to_string())
	}

	async fn write(&self, node: &NodeRef, field: Field, value: &str) -> Result<()> {
		let property = match field {
			Field::Value => "value",
			Field::TextContent => "textContent",
		};
		self.with_node(*node, &format!("el.{property} = {}; return true;", js_str(value))).await?;
		Ok(())
	}

	async fn dispatch(&self, node: &NodeRef, event: SyntheticEvent) -> Result<()> {
		let body = format!("el.dispatchEvent(new Event({}, {{ bubbles: true }})); return true;", js_str(event.name()));
		self.with_node(*node, &body).await?;
		Ok(())
	}

	async fn click(&self, node: &NodeRef) -> Result<()> {
		self.with_node(*node, "el.click(); return true;").await?;
		Ok(())
	}

	async fn set_instance_value(&self, node: &NodeRef, value: &str) -> Result<bool> {
		let body = format!(
			r#"
			const instance = el.__vue__ || el.CodeMirror;
			if (instance && typeof instance.setValue === 'function') {{
				instance.setValue({});
				return true;
			}}
			return false;
			"#,
			js_str(value)
		);
		Ok(self.with_node(*node, &body).await?.as_bool() == Some(true))
	}

	async fn set_model_value(&self, value: &str) -> Result<bool> {
		let script = format!(
			r#"
			(function() {{
				const editor = window.monaco && window.monaco.editor;
				const models = editor && typeof editor.getModels === 'function' ? editor.getModels() : null;
				if (models && models.length > 0) {{
					models[0].setValue({});
					return true;
				}}
				return false;
			}})()
			"#,
			js_str(value)
		);
		let result = self.page.evaluate(script).await.map_err(|e| eyre!("Failed to reach editor models: {}", e))?;
		Ok(result.value().and_then(|v| v.as_bool()) == Some(true))
	}
}

const PANEL_ID: &str = "solve-headless-panel";

const PANEL_CSS: &str = r#"
	#solve-headless-panel {
		position: fixed; bottom: 20px; right: 20px; width: 400px; max-height: 500px;
		background-color: rgba(30, 30, 30, 0.9); color: #f0f0f0; border-radius: 8px; padding: 10px;
		font-family: 'Courier New', monospace; font-size: 14px; z-index: 9999; overflow-y: auto;
		box-shadow: 0 4px 8px rgba(0, 0, 0, 0.3); transition: opacity 0.3s ease; opacity: 0; pointer-events: none;
	}
	#solve-headless-panel.visible { opacity: 1; pointer-events: auto; }
	#solve-headless-panel .solve-panel-header {
		display: flex; justify-content: space-between; align-items: center;
		margin-bottom: 10px; border-bottom: 1px solid #444; padding-bottom: 5px;
	}
	#solve-headless-panel .solve-panel-title { font-weight: bold; color: #00ff9d; }
	#solve-headless-panel .solve-panel-close { cursor: pointer; color: #999; }
	#solve-headless-panel .solve-panel-content { white-space: pre-wrap; line-height: 1.4; }
	#solve-headless-panel pre { background-color: rgba(0, 0, 0, 0.3); padding: 8px; border-radius: 5px; overflow-x: auto; }
	#solve-headless-panel code { background-color: rgba(0, 0, 0, 0.3); padding: 2px 4px; border-radius: 3px; }
	#solve-headless-panel .solve-panel-loading { display: flex; justify-content: center; align-items: center; height: 100px; }
	#solve-headless-panel .solve-panel-dot {
		width: 8px; height: 8px; margin: 0 5px; border-radius: 50%; background-color: #00ff9d;
		animation: solve-panel-pulse 1.5s infinite ease-in-out;
	}
	#solve-headless-panel .solve-panel-dot:nth-child(2) { animation-delay: 0.2s; }
	#solve-headless-panel .solve-panel-dot:nth-child(3) { animation-delay: 0.4s; }
	@keyframes solve-panel-pulse {
		0%, 100% { transform: scale(0.5); opacity: 0.5; }
		50% { transform: scale(1); opacity: 1; }
	}
"#;

const LOADING_HTML: &str = r#"<div class="solve-panel-loading"><div class="solve-panel-dot"></div><div class="solve-panel-dot"></div><div class="solve-panel-dot"></div></div>"#;

/// Fixed-position overlay drawn into the host page.
#[derive(Clone, Debug)]
pub struct OverlayPanel {
	page: Page,
}

impl OverlayPanel {
	pub fn new(page: &BrowserPage) -> Self {
		Self { page: page.inner().clone() }
	}

	/// Create the panel if needed, then run `action` with `panel` and `content` bound.
	async fn run(&self, action: &str) -> Result<()> {
		let script = format!(
			r#"
			(function() {{
				let panel = document.getElementById({id});
				if (!panel) {{
					const style = document.createElement('style');
					style.textContent = {css};
					(document.head || document.documentElement).appendChild(style);
					panel = document.createElement('div');
					panel.id = {id};
					panel.innerHTML = '<div class="solve-panel-header"><div class="solve-panel-title">solve_headless</div>'
						+ '<div class="solve-panel-close">&times;</div></div><div class="solve-panel-content"></div>';
					document.body.appendChild(panel);
					panel.querySelector('.solve-panel-close').addEventListener('click', () => panel.classList.remove('visible'));
				}}
				const content = panel.querySelector('.solve-panel-content');
				{action}
				return true;
			}})()
			"#,
			id = js_str(PANEL_ID),
			css = js_str(PANEL_CSS),
		);
		self.page.evaluate(script).await.map_err(|e| eyre!("Failed to update panel: {}", e))?;
		Ok(())
	}

	async fn show_html(&self, html: &str) -> Result<()> {
		self.run(&format!("content.innerHTML = {}; panel.classList.add('visible');", js_str(html))).await
	}
}

impl Panel for OverlayPanel {
	async fn loading(&self) -> Result<()> {
		self.show_html(LOADING_HTML).await
	}

	async fn show_response(&self, response: &str) -> Result<()> {
		self.show_html(&format_response_html(response)).await
	}

	async fn notice(&self, text: &str) -> Result<()> {
		self.show_html(&escape_html(text)).await
	}

	async fn hide(&self) -> Result<()> {
		self.run("panel.classList.remove('visible');").await
	}
}

/// A browser plus the tab the cycles run in.
pub struct Session {
	browser: Browser,
	handle: JoinHandle<()>,
	page: BrowserPage,
	attached: bool,
}

impl Session {
	/// Attach to a running browser's DevTools endpoint when `attach` is given, otherwise launch one.
	/// With a `url` a new tab is opened on it; without one an attached session reuses the first existing tab.
	pub async fn open(config: &AppConfig, url: Option<&str>, attach: Option<&str>) -> Result<Self> {
		let (mut browser, mut handler) = match attach {
			Some(endpoint) => {
				log!("Attaching to browser at {endpoint}...");
				Browser::connect(endpoint).await.map_err(|e| eyre!("Failed to attach to browser: {}", e))?
			}
			None => {
				let builder = if config.visible { BrowserConfig::builder().with_head() } else { BrowserConfig::builder() };
				let browser_config = builder.build().map_err(|e| eyre!("Failed to build browser config: {}", e))?;
				Browser::launch(browser_config).await.map_err(|e| eyre!("Failed to launch browser: {}", e))?
			}
		};

		// Events have to be drained or the browser connection stalls
		let handle = tokio::spawn(async move { while let Some(_event) = handler.next().await {} });

		let existing = match (attach, url) {
			(Some(_), None) => {
				let _ = browser.fetch_targets().await;
				tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
				browser.pages().await.unwrap_or_default().into_iter().next()
			}
			_ => None,
		};
		let page = match existing {
			Some(page) => page,
			None => {
				let target = url.unwrap_or("about:blank");
				log!("Opening {target}...");
				browser.new_page(target).await.map_err(|e| eyre!("Failed to create new page: {}", e))?
			}
		};
		if url.is_some() {
			page.wait_for_navigation().await.map_err(|e| eyre!("Failed waiting for navigation: {e}"))?;
		}

		Ok(Self {
			browser,
			handle,
			page: BrowserPage::new(page),
			attached: attach.is_some(),
		})
	}

	pub fn page(&self) -> &BrowserPage {
		&self.page
	}

	/// Close a launched browser; an attached one is left running.
	pub async fn close(mut self) -> Result<()> {
		if !self.attached {
			self.browser.close().await.map_err(|e| eyre!("Failed to close browser: {}", e))?;
		}
		self.handle.abort();
		Ok(())
	}
}
