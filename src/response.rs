//! Turning raw model output into code and into panel markup.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```(\w*)(.*?)```").expect("static regex"));
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("static regex"));

/// The largest fenced code block in `response`, trimmed. Empty when the response has no fenced block.
///
/// Models tend to mix small illustrative snippets with the full solution, so the longest block wins; on a tie the
/// earlier block is kept.
pub fn extract_code(response: &str) -> String {
	let (mut largest, mut largest_chars) = ("", 0);
	for caps in FENCED_BLOCK.captures_iter(response) {
		let code = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
		// Characters, not bytes: non-ASCII comments must not inflate a snippet
		let chars = code.chars().count();
		if chars > largest_chars {
			(largest, largest_chars) = (code, chars);
		}
	}
	largest.to_string()
}

/// Render a response for the on-page panel.
///
/// Fenced blocks become `<pre><code>` with their newlines intact; everywhere else inline code spans become `<code>`
/// and newlines become `<br>`. All text is escaped first.
pub fn format_response_html(response: &str) -> String {
	let mut html = String::with_capacity(response.len() + 64);
	let mut last = 0;
	for caps in FENCED_BLOCK.captures_iter(response) {
		let Some(whole) = caps.get(0) else { continue };
		html.push_str(&format_prose(&response[last..whole.start()]));
		let language = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
		let code = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
		html.push_str(&format!(r#"<pre><code class="language-{language}">{}</code></pre>"#, escape_html(code)));
		last = whole.end();
	}
	html.push_str(&format_prose(&response[last..]));
	html
}

fn format_prose(text: &str) -> String {
	let escaped = escape_html(text);
	INLINE_CODE.replace_all(&escaped, "<code>$1</code>").replace('\n', "<br>")
}

pub fn escape_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(c),
		}
	}
	out
}
