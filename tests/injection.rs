use pretty_assertions::assert_eq;
use solve_headless::{
	AutomationOutcome,
	dom::{Dom, Field, SyntheticEvent},
	editor::{EditorFamily, inject, locate_editor},
	snapshot::{HtmlPage, Mutation},
};

const CODE: &str = "def solve(nums):\n    return sorted(nums)";

#[tokio::test]
async fn textarea_gets_exactly_the_code_and_one_input_event() {
	let page = HtmlPage::parse(r#"<body><textarea class="code-editor">print("old")</textarea></body>"#);
	let textarea = page.find("textarea").unwrap();

	assert_eq!(inject(&page, CODE).await.unwrap(), AutomationOutcome::Injected);
	assert_eq!(page.value_of(textarea).as_deref(), Some(CODE));
	assert_eq!(page.events_on(textarea), vec![SyntheticEvent::Input]);
}

#[tokio::test]
async fn content_editable_fallback_is_written_through_text() {
	let page = HtmlPage::parse(r#"<body><div id="pad" contenteditable="true">scratch</div></body>"#);
	let pad = page.find("#pad").unwrap();

	let target = locate_editor(&page).await.unwrap().unwrap();
	assert_eq!(target.family, EditorFamily::Plain);
	assert!(target.probe.is_none());

	assert_eq!(inject(&page, CODE).await.unwrap(), AutomationOutcome::Injected);
	assert_eq!(page.text(&pad).await.unwrap(), CODE);
	assert_eq!(page.events_on(pad), vec![SyntheticEvent::Input]);
	assert!(!page.mutations().iter().any(|m| matches!(m, Mutation::Write { field: Field::Value, .. })));
}

#[tokio::test]
async fn codemirror_instance_is_preferred() {
	let page = HtmlPage::parse(r#"<body><div class="CodeMirror"><textarea></textarea></div></body>"#).with_editor_instances();
	let widget = page.find(".CodeMirror").unwrap();
	let nested = page.find("textarea").unwrap();

	assert_eq!(inject(&page, CODE).await.unwrap(), AutomationOutcome::Injected);
	assert_eq!(page.instance_value(widget).as_deref(), Some(CODE));
	assert!(page.events_on(nested).is_empty());
	assert_eq!(page.value_of(nested).as_deref(), Some(""));
}

#[tokio::test]
async fn codemirror_without_instance_uses_its_textarea() {
	let page = HtmlPage::parse(r#"<body><div class="CodeMirror"><textarea></textarea></div></body>"#);
	let nested = page.find("textarea").unwrap();

	assert_eq!(inject(&page, CODE).await.unwrap(), AutomationOutcome::Injected);
	assert_eq!(page.value_of(nested).as_deref(), Some(CODE));
	assert_eq!(page.events_on(nested), vec![SyntheticEvent::Input]);
}

#[tokio::test]
async fn monaco_model_is_preferred() {
	let page = HtmlPage::parse(r#"<body><div class="monaco-editor"><textarea class="inputarea"></textarea></div></body>"#).with_model_registry();

	assert_eq!(inject(&page, CODE).await.unwrap(), AutomationOutcome::Injected);
	assert_eq!(page.model_value().as_deref(), Some(CODE));
	assert!(page.events_on(page.find("textarea").unwrap()).is_empty());
}

#[tokio::test]
async fn monaco_without_models_fires_input_and_change() {
	let page = HtmlPage::parse(r#"<body><div class="monaco-editor"><textarea class="inputarea"></textarea></div></body>"#);
	let nested = page.find("textarea").unwrap();

	assert_eq!(inject(&page, CODE).await.unwrap(), AutomationOutcome::Injected);
	assert_eq!(page.value_of(nested).as_deref(), Some(CODE));
	assert_eq!(page.events_on(nested), vec![SyntheticEvent::Input, SyntheticEvent::Change]);
}

#[tokio::test]
async fn page_without_editor_is_left_untouched() {
	let page = HtmlPage::parse("<body><h1>Two Sum</h1><p>No editor here.</p></body>");

	assert_eq!(inject(&page, CODE).await.unwrap(), AutomationOutcome::NoEditorFound);
	assert!(page.mutations().is_empty());
}

#[tokio::test]
async fn matched_widget_without_surface_still_counts_as_injected() {
	let page = HtmlPage::parse(r#"<body><div class="CodeMirror"></div><textarea id="other"></textarea></body>"#);

	assert_eq!(inject(&page, CODE).await.unwrap(), AutomationOutcome::Injected);
	// No second candidate is tried once a widget matched
	assert!(page.mutations().is_empty());
}

#[tokio::test]
async fn probe_table_beats_document_order() {
	let page = HtmlPage::parse(r#"<body><textarea id="notes"></textarea><textarea class="code-editor" id="code"></textarea></body>"#);

	inject(&page, CODE).await.unwrap();
	assert_eq!(page.value_of(page.find("#code").unwrap()).as_deref(), Some(CODE));
	assert_eq!(page.value_of(page.find("#notes").unwrap()).as_deref(), Some(""));
}
