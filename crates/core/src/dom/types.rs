//! Shared DOM node shape used by the serializer, finder, and delta
//! recorder: a parsed, host-side mirror of CDP's `DOM.getDocument` tree.
//! Parsing CDP's wire shape into this once means the traversal logic in
//! `serializer`/`finder` is ordinary, unit-testable Rust with no CDP calls
//! inside the recursion itself.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
	Document,
	Element,
	Text,
	Comment,
	Other,
}

impl NodeType {
	fn from_cdp(node_type: i64) -> Self {
		match node_type {
			9 => NodeType::Document,
			1 => NodeType::Element,
			3 => NodeType::Text,
			8 => NodeType::Comment,
			_ => NodeType::Other,
		}
	}
}

#[derive(Debug, Clone)]
pub struct DomNode {
	pub node_type: NodeType,
	/// Upper-cased tag name for elements (`"DIV"`, `"BUTTON"`); CDP's own
	/// convention, also used by the `SCRIPT, STYLE, ...` skip list.
	pub node_name: String,
	pub backend_node_id: i64,
	/// Attribute name/value pairs, in document order.
	pub attributes: Vec<(String, String)>,
	/// Present for text/comment nodes.
	pub node_value: Option<String>,
	pub children: Vec<DomNode>,
	/// Set when this element is a frame owner with a nested document
	/// (`contentDocument` in CDP's response).
	pub content_document: Option<Box<DomNode>>,
}

impl DomNode {
	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attributes.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	/// Concatenation of immediate text-node children, matching §4.8
	/// `directText`.
	pub fn direct_text(&self) -> String {
		self.children
			.iter()
			.filter(|c| c.node_type == NodeType::Text)
			.map(|c| c.node_value.clone().unwrap_or_default())
			.collect::<Vec<_>>()
			.join(" ")
	}

	/// Parses a single CDP `DOM.getDocument`/node JSON object, recursing
	/// into `children` and `contentDocument`.
	pub fn from_cdp(value: &Value) -> Self {
		let node_type = NodeType::from_cdp(value.get("nodeType").and_then(Value::as_i64).unwrap_or(0));
		let node_name = value.get("nodeName").and_then(Value::as_str).unwrap_or("").to_string();
		let backend_node_id = value.get("backendNodeId").and_then(Value::as_i64).unwrap_or(0);
		let node_value = value.get("nodeValue").and_then(Value::as_str).map(str::to_string);

		let mut attributes = Vec::new();
		if let Some(flat) = value.get("attributes").and_then(Value::as_array) {
			let mut iter = flat.iter();
			while let (Some(name), Some(val)) = (iter.next(), iter.next()) {
				if let (Some(n), Some(v)) = (name.as_str(), val.as_str()) {
					attributes.push((n.to_string(), v.to_string()));
				}
			}
		}

		let children = value.get("children").and_then(Value::as_array).map(|arr| arr.iter().map(DomNode::from_cdp).collect()).unwrap_or_default();

		let content_document = value.get("contentDocument").filter(|v| !v.is_null()).map(|v| Box::new(DomNode::from_cdp(v)));

		Self { node_type, node_name, backend_node_id, attributes, node_value, children, content_document }
	}
}
