//! `Tab.mutate`: the generic element-interaction primitive every concrete
//! end-user tool (click_element, fill_form, ...) is a thin adapter over
//! (§1 "these components consume the core through ... `Tab.evaluate/
//! serialize/mutate`"). Resolves a ref/selector to a live remote object via
//! `RefTable`/`DOM.resolveNode`, then drives it with the same CDP calls
//! named in §6 (`DOM.getBoxModel`, `DOM.scrollIntoViewIfNeeded`,
//! `Runtime.callFunctionOn`, `Input.*`).

use serde_json::json;

use openchrome_protocol::{Error, Result};
use openchrome_runtime::Connection;

use crate::ref_table::RefTable;

/// One interaction a caller can perform against a resolved element.
#[derive(Debug, Clone)]
pub enum MutateAction {
	Click { reference: String },
	Type { reference: String, text: String },
	SetChecked { reference: String, checked: bool },
	ScrollIntoView { reference: String },
}

impl MutateAction {
	fn reference(&self) -> &str {
		match self {
			MutateAction::Click { reference } => reference,
			MutateAction::Type { reference, .. } => reference,
			MutateAction::SetChecked { reference, .. } => reference,
			MutateAction::ScrollIntoView { reference } => reference,
		}
	}
}

async fn resolve_object_id(connection: &Connection, cdp_session_id: &str, ref_table: &RefTable, session_id: &str, tab_id: &str, reference: &str) -> Result<String> {
	let backend_node_id = ref_table.resolve(session_id, tab_id, reference).ok_or_else(|| Error::RefStale { reference: reference.to_string(), reason: "unknown or malformed reference".into() })?;
	let result = connection.send(Some(cdp_session_id), "DOM.resolveNode", json!({ "backendNodeId": backend_node_id })).await?;
	result.get("object").and_then(|o| o.get("objectId")).and_then(|v| v.as_str()).map(str::to_string).ok_or_else(|| Error::CdpProtocol("DOM.resolveNode returned no objectId".into()))
}

async fn scroll_into_view(connection: &Connection, cdp_session_id: &str, object_id: &str) -> Result<()> {
	connection.send(Some(cdp_session_id), "DOM.scrollIntoViewIfNeeded", json!({ "objectId": object_id })).await?;
	Ok(())
}

async fn center_of(connection: &Connection, cdp_session_id: &str, object_id: &str) -> Result<(f64, f64)> {
	let model = connection.send(Some(cdp_session_id), "DOM.getBoxModel", json!({ "objectId": object_id })).await?;
	let quad = model.get("model").and_then(|m| m.get("content")).and_then(|v| v.as_array()).cloned().unwrap_or_default();
	if quad.len() < 8 {
		return Err(Error::CdpProtocol("DOM.getBoxModel returned no content quad".into()));
	}
	let xs: Vec<f64> = [0usize, 2, 4, 6].iter().filter_map(|&i| quad.get(i).and_then(|v| v.as_f64())).collect();
	let ys: Vec<f64> = [1usize, 3, 5, 7].iter().filter_map(|&i| quad.get(i).and_then(|v| v.as_f64())).collect();
	let cx = xs.iter().sum::<f64>() / xs.len() as f64;
	let cy = ys.iter().sum::<f64>() / ys.len() as f64;
	Ok((cx, cy))
}

async fn click_at(connection: &Connection, cdp_session_id: &str, x: f64, y: f64) -> Result<()> {
	let base = json!({ "x": x, "y": y, "button": "left", "clickCount": 1 });
	let mut pressed = base.clone();
	pressed["type"] = json!("mousePressed");
	connection.send(Some(cdp_session_id), "Input.dispatchMouseEvent", pressed).await?;
	let mut released = base;
	released["type"] = json!("mouseReleased");
	connection.send(Some(cdp_session_id), "Input.dispatchMouseEvent", released).await?;
	Ok(())
}

async fn focus(connection: &Connection, cdp_session_id: &str, object_id: &str) -> Result<()> {
	connection
		.send(Some(cdp_session_id), "Runtime.callFunctionOn", json!({ "objectId": object_id, "functionDeclaration": "function() { this.focus(); }", "returnByValue": true }))
		.await?;
	Ok(())
}

async fn set_checked(connection: &Connection, cdp_session_id: &str, object_id: &str, checked: bool) -> Result<()> {
	connection
		.send(
			Some(cdp_session_id),
			"Runtime.callFunctionOn",
			json!({
				"objectId": object_id,
				"functionDeclaration": "function(checked) { this.checked = checked; this.dispatchEvent(new Event('change', {bubbles:true})); }",
				"arguments": [{ "value": checked }],
				"returnByValue": true,
			}),
		)
		.await?;
	Ok(())
}

/// §6 `Tab.mutate`: resolves the action's target ref, performs it, and
/// returns the raw CDP-level result (the caller typically wraps this in
/// `dom::with_delta` to report what changed as a side effect).
pub async fn mutate(connection: &Connection, cdp_session_id: &str, ref_table: &RefTable, session_id: &str, tab_id: &str, action: &MutateAction) -> Result<serde_json::Value> {
	let object_id = resolve_object_id(connection, cdp_session_id, ref_table, session_id, tab_id, action.reference()).await?;
	scroll_into_view(connection, cdp_session_id, &object_id).await?;

	match action {
		MutateAction::Click { .. } => {
			let (x, y) = center_of(connection, cdp_session_id, &object_id).await?;
			click_at(connection, cdp_session_id, x, y).await?;
			Ok(json!({ "clicked": true, "x": x, "y": y }))
		}
		MutateAction::Type { text, .. } => {
			focus(connection, cdp_session_id, &object_id).await?;
			connection.send(Some(cdp_session_id), "Input.insertText", json!({ "text": text })).await?;
			Ok(json!({ "typed": text }))
		}
		MutateAction::SetChecked { checked, .. } => {
			set_checked(connection, cdp_session_id, &object_id, *checked).await?;
			Ok(json!({ "checked": checked }))
		}
		MutateAction::ScrollIntoView { .. } => Ok(json!({ "scrolled": true })),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn action_reference_extracts_the_target_ref() {
		assert_eq!(MutateAction::Click { reference: "ref_1".into() }.reference(), "ref_1");
		assert_eq!(MutateAction::Type { reference: "ref_2".into(), text: "hi".into() }.reference(), "ref_2");
		assert_eq!(MutateAction::SetChecked { reference: "ref_3".into(), checked: true }.reference(), "ref_3");
		assert_eq!(MutateAction::ScrollIntoView { reference: "ref_4".into() }.reference(), "ref_4");
	}
}
