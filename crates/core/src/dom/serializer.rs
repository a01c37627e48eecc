//! C8: produces a compact, bounded text rendering of a page's live DOM
//! (§4.8). The traversal itself is pure and takes an already-parsed
//! `DomNode` tree plus page stats gathered by a single in-page evaluation;
//! `serialize` (the async CDP-calling entry point) is a thin wrapper around
//! `render`, per the "dynamic invocation in the page context" redesign note
//! (§9): the host side only orchestrates and parses, it never constructs
//! ad-hoc per-call JS strings.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::types::{DomNode, NodeType};

/// Tags skipped entirely, never emitted and never descended into (§4.8).
const SKIPPED_TAGS: &[&str] = &["SCRIPT", "STYLE", "SVG", "NOSCRIPT", "META", "LINK", "HEAD"];

/// Attributes kept on an emitted element line (§4.8).
const KEPT_ATTRS: &[&str] = &["id", "name", "type", "value", "placeholder", "aria-label", "role", "href", "src", "alt", "title", "data-testid", "disabled", "checked", "selected", "required", "class"];

/// Tags considered interactive by tag name alone (§4.8, §4.9).
pub const INTERACTIVE_TAGS: &[&str] = &["input", "button", "select", "textarea", "a"];

/// ARIA roles considered interactive (§4.8, §4.9).
pub const INTERACTIVE_ROLES: &[&str] = &["button", "link", "textbox", "checkbox", "radio", "combobox", "listbox", "menu", "menuitem", "tab", "switch", "slider"];

static INTERACTIVE_TAG_SET: LazyLock<BTreeSet<&'static str>> = LazyLock::new(|| INTERACTIVE_TAGS.iter().copied().collect());
static INTERACTIVE_ROLE_SET: LazyLock<BTreeSet<&'static str>> = LazyLock::new(|| INTERACTIVE_ROLES.iter().copied().collect());

/// Whether `node` counts as "interactive" per §4.8: its tag is in the
/// interactive tag set, or its `role` attribute is in the interactive role
/// set.
pub fn is_interactive(node: &DomNode) -> bool {
	let tag = node.node_name.to_ascii_lowercase();
	if INTERACTIVE_TAG_SET.contains(tag.as_str()) {
		return true;
	}
	if let Some(role) = node.attr("role") {
		return INTERACTIVE_ROLE_SET.contains(role.to_ascii_lowercase().as_str());
	}
	false
}

#[derive(Debug, Clone)]
pub struct SerializeOptions {
	pub max_depth: i64,
	pub max_output_chars: usize,
	pub include_page_stats: bool,
	pub pierce_iframes: bool,
	pub interactive_only: bool,
}

impl Default for SerializeOptions {
	fn default() -> Self {
		Self { max_depth: -1, max_output_chars: 50_000, include_page_stats: true, pierce_iframes: true, interactive_only: false }
	}
}

#[derive(Debug, Clone, Default)]
pub struct PageStats {
	pub url: String,
	pub title: String,
	pub scroll_x: f64,
	pub scroll_y: f64,
	pub viewport_width: f64,
	pub viewport_height: f64,
	pub scroll_width: f64,
	pub scroll_height: f64,
}

impl PageStats {
	fn line(&self) -> String {
		format!(
			"[page_stats] url={} title={:?} scroll=({},{}) viewport={}x{} full_scroll={}x{}",
			self.url, self.title, self.scroll_x, self.scroll_y, self.viewport_width, self.viewport_height, self.scroll_width, self.scroll_height
		)
	}
}

#[derive(Debug, Clone)]
pub struct SerializeResult {
	pub content: String,
	pub page_stats: Option<PageStats>,
	pub truncated: bool,
}

const TRUNCATION_SENTINEL_TEMPLATE: &str = "\n\n[Output truncated at {N} chars. Use depth parameter to limit scope.]";

fn truncation_message(n: usize) -> String {
	TRUNCATION_SENTINEL_TEMPLATE.replace("{N}", &n.to_string())
}

/// Pure rendering of an already-parsed document tree (§4.8 algorithm).
///
/// Resolved open question (`DESIGN.md`): the page-stats header line
/// participates in the truncation budget like every other line, rather than
/// being pushed unchecked. If it alone exceeds `max_output_chars` it is
/// dropped and `truncated` is still computed correctly for the body.
pub fn render(document: &DomNode, page_stats: Option<&PageStats>, opts: &SerializeOptions) -> SerializeResult {
	let mut out = String::new();
	let mut truncated = false;

	if opts.include_page_stats
		&& let Some(stats) = page_stats
	{
		let line = stats.line();
		if line.len() + 1 <= opts.max_output_chars {
			out.push_str(&line);
			out.push('\n');
		} else {
			truncated = true;
		}
	}

	if !truncated {
		truncated = walk(document, 0, opts, &mut out);
	}

	if truncated {
		let msg = truncation_message(opts.max_output_chars);
		out.push_str(&msg);
	}

	SerializeResult { content: out, page_stats: page_stats.cloned(), truncated }
}

/// Depth-first traversal. Returns `true` once truncation has occurred
/// (signals the caller to stop appending further content).
fn walk(node: &DomNode, depth: i64, opts: &SerializeOptions, out: &mut String) -> bool {
	for child in &node.children {
		if child.node_type != NodeType::Element {
			continue;
		}
		let tag_upper = child.node_name.to_ascii_uppercase();
		if SKIPPED_TAGS.contains(&tag_upper.as_str()) {
			continue;
		}
		if tag_upper == "#COMMENT" {
			continue;
		}

		let interactive = is_interactive(child);
		let emit = !opts.interactive_only || interactive;

		if emit {
			let line = render_line(child, depth);
			if out.len() + line.len() + 1 > opts.max_output_chars {
				return true;
			}
			out.push_str(&line);
			out.push('\n');
		}

		if opts.pierce_iframes
			&& let Some(content_doc) = &child.content_document
		{
			let src = child.attr("src").unwrap_or("");
			let sep = format!("{}--page-separator-- iframe: {}", "  ".repeat(depth as usize + 1), src);
			if out.len() + sep.len() + 1 > opts.max_output_chars {
				return true;
			}
			out.push_str(&sep);
			out.push('\n');
			if within_depth(depth + 1, opts.max_depth) && walk(content_doc, depth + 1, opts, out) {
				return true;
			}
			continue;
		}

		if within_depth(depth + 1, opts.max_depth) && walk(child, depth + 1, opts, out) {
			return true;
		}
	}
	false
}

fn within_depth(next_depth: i64, max_depth: i64) -> bool {
	max_depth < 0 || next_depth <= max_depth
}

fn render_line(node: &DomNode, depth: i64) -> String {
	let indent = "  ".repeat(depth as usize);
	let tag_lower = node.node_name.to_ascii_lowercase();
	let attrs: Vec<String> = KEPT_ATTRS.iter().filter_map(|name| node.attr(name).map(|v| format!(r#"{name}="{v}""#))).collect();
	let attrs_str = if attrs.is_empty() { String::new() } else { format!(" {}", attrs.join(" ")) };
	let text = clip_direct_text(&node.direct_text());
	let text_part = if text.is_empty() { String::new() } else { text };
	format!("{indent}[{}]<{tag_lower}{attrs_str}/>{text_part}", node.backend_node_id)
}

fn clip_direct_text(text: &str) -> String {
	let trimmed: Vec<&str> = text.split_whitespace().collect();
	let joined = trimmed.join(" ");
	joined.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn elem(tag: &str, backend_node_id: i64, attrs: &[(&str, &str)], children: Vec<DomNode>) -> DomNode {
		DomNode {
			node_type: NodeType::Element,
			node_name: tag.to_string(),
			backend_node_id,
			attributes: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
			node_value: None,
			children,
			content_document: None,
		}
	}

	fn text(value: &str) -> DomNode {
		DomNode { node_type: NodeType::Text, node_name: "#text".into(), backend_node_id: 0, attributes: vec![], node_value: Some(value.into()), children: vec![], content_document: None }
	}

	#[test]
	fn serializer_output_shape_matches_spec_scenario_2() {
		let h1 = elem("h1", 100, &[("id", "t")], vec![text("Hi")]);
		let button = elem("button", 101, &[], vec![text("OK")]);
		let body = elem("body", 3, &[], vec![h1, button]);
		let html = elem("html", 2, &[], vec![body]);
		let doc = DomNode { node_type: NodeType::Document, node_name: "#document".into(), backend_node_id: 1, attributes: vec![], node_value: None, children: vec![html], content_document: None };

		let opts = SerializeOptions { include_page_stats: false, ..Default::default() };
		let result = render(&doc, None, &opts);

		assert!(result.content.contains("[2]<html/>"), "{}", result.content);
		assert!(result.content.contains("  [3]<body/>"));
		assert!(result.content.contains("    [100]<h1 id=\"t\"/>Hi"));
		assert!(result.content.contains("    [101]<button/>OK"));
		assert!(!result.truncated);
	}

	#[test]
	fn truncation_stops_before_exceeding_budget_and_appends_sentinel() {
		let children: Vec<DomNode> = (0..50).map(|i| elem("div", i, &[], vec![text("filler text padding out each line")])).collect();
		let doc = DomNode { node_type: NodeType::Document, node_name: "#document".into(), backend_node_id: 0, attributes: vec![], node_value: None, children, content_document: None };

		let opts = SerializeOptions { include_page_stats: false, max_output_chars: 200, ..Default::default() };
		let result = render(&doc, None, &opts);

		assert!(result.truncated);
		assert!(result.content.contains("[Output truncated at 200 chars"));
		assert!(result.content.len() <= 200 + truncation_message(200).len());
	}

	#[test]
	fn interactive_only_emits_only_interactive_elements_but_still_descends() {
		let button = elem("button", 2, &[], vec![text("Click")]);
		let nested_div_with_button = elem("div", 1, &[], vec![button]);
		let plain_span = elem("span", 3, &[], vec![text("ignored")]);
		let doc = DomNode { node_type: NodeType::Document, node_name: "#document".into(), backend_node_id: 0, attributes: vec![], node_value: None, children: vec![nested_div_with_button, plain_span], content_document: None };

		let opts = SerializeOptions { include_page_stats: false, interactive_only: true, ..Default::default() };
		let result = render(&doc, None, &opts);

		assert!(result.content.contains("[2]<button/>Click"));
		assert!(!result.content.contains("<div"));
		assert!(!result.content.contains("<span"));
	}

	#[test]
	fn skipped_tags_are_never_emitted_or_descended() {
		let script = elem("script", 5, &[], vec![text("alert(1)")]);
		let doc = DomNode { node_type: NodeType::Document, node_name: "#document".into(), backend_node_id: 0, attributes: vec![], node_value: None, children: vec![script], content_document: None };
		let opts = SerializeOptions { include_page_stats: false, ..Default::default() };
		let result = render(&doc, None, &opts);
		assert!(!result.content.contains("alert"));
	}

	#[test]
	fn direct_text_clips_at_200_chars() {
		let long = "x".repeat(500);
		let div = elem("div", 1, &[], vec![text(&long)]);
		let doc = DomNode { node_type: NodeType::Document, node_name: "#document".into(), backend_node_id: 0, attributes: vec![], node_value: None, children: vec![div], content_document: None };
		let opts = SerializeOptions { include_page_stats: false, ..Default::default() };
		let result = render(&doc, None, &opts);
		let text_line = result.content.lines().find(|l| l.contains("[1]")).unwrap();
		let text_part = text_line.split("/>").nth(1).unwrap();
		assert_eq!(text_part.chars().count(), 200);
	}

	#[test]
	fn pierces_iframes_with_separator_line() {
		let inner_button = elem("button", 10, &[], vec![text("Inside")]);
		let inner_doc = DomNode { node_type: NodeType::Document, node_name: "#document".into(), backend_node_id: 0, attributes: vec![], node_value: None, children: vec![inner_button], content_document: None };
		let mut iframe = elem("iframe", 9, &[("src", "https://child.example/")], vec![]);
		iframe.content_document = Some(Box::new(inner_doc));
		let doc = DomNode { node_type: NodeType::Document, node_name: "#document".into(), backend_node_id: 0, attributes: vec![], node_value: None, children: vec![iframe], content_document: None };

		let opts = SerializeOptions { include_page_stats: false, ..Default::default() };
		let result = render(&doc, None, &opts);
		assert!(result.content.contains("--page-separator-- iframe: https://child.example/"));
		assert!(result.content.contains("[10]<button/>Inside"));
	}

	#[test]
	fn page_stats_header_participates_in_truncation_budget() {
		let doc = DomNode { node_type: NodeType::Document, node_name: "#document".into(), backend_node_id: 0, attributes: vec![], node_value: None, children: vec![], content_document: None };
		let stats = PageStats { url: "https://example.com/a/very/long/path/that/is/pretty/long".into(), title: "T".into(), ..Default::default() };
		let opts = SerializeOptions { include_page_stats: true, max_output_chars: 10, ..Default::default() };
		let result = render(&doc, Some(&stats), &opts);
		// stats line alone exceeds the 10-char budget; it must be dropped, not
		// pushed unchecked the way the source implementation did.
		assert!(!result.content.contains("[page_stats]"));
	}

	#[test]
	fn is_interactive_checks_tag_and_role() {
		let button = elem("button", 1, &[], vec![]);
		assert!(is_interactive(&button));
		let div_role = elem("div", 2, &[("role", "checkbox")], vec![]);
		assert!(is_interactive(&div_role));
		let plain_div = elem("div", 3, &[], vec![]);
		assert!(!is_interactive(&plain_div));
	}
}
