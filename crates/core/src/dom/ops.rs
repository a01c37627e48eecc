//! Async orchestration for C8-C10: the thin CDP-calling layer that feeds
//! the pure functions in `serializer`/`finder`/`delta` (§9 "dynamic
//! invocation in the page context" — orchestration, scoring, and result
//! parsing live here in plain Rust; the in-page programs themselves are the
//! small fixed set in `page_scripts`).

use std::time::Duration;

use serde_json::json;
use tracing::debug;

use openchrome_protocol::{Error, Result};
use openchrome_runtime::Connection;

use super::delta::{self, DeltaOptions, MutationKind, NavigationState, RawDelta};
use super::finder::{self, Candidate, FoundElement};
use super::page_scripts;
use super::serializer::{self, PageStats, SerializeOptions, SerializeResult};
use super::types::DomNode;

const DEFAULT_SETTLE_MS: u64 = 150;
const DEFAULT_DELTA_MAX_CHARS: usize = 500;

async fn evaluate(connection: &Connection, cdp_session_id: &str, expression: &str) -> Result<serde_json::Value> {
	let result = connection.send(Some(cdp_session_id), "Runtime.evaluate", json!({ "expression": expression, "returnByValue": true, "awaitPromise": true })).await?;
	if let Some(exc) = result.get("exceptionDetails") {
		return Err(Error::CdpProtocol(format!("Runtime.evaluate threw: {exc}")));
	}
	Ok(result.get("result").and_then(|r| r.get("value")).cloned().unwrap_or(serde_json::Value::Null))
}

/// Fetches the live document tree via `DOM.getDocument` with unlimited depth
/// and frame piercing, and parses it into the host-side `DomNode` shape
/// (§4.8 "single depth-first traversal starting from the root document").
async fn fetch_document(connection: &Connection, cdp_session_id: &str) -> Result<DomNode> {
	let result = connection.send(Some(cdp_session_id), "DOM.getDocument", json!({ "depth": -1, "pierce": true })).await?;
	let root = result.get("root").ok_or_else(|| Error::CdpProtocol("DOM.getDocument returned no root".into()))?;
	Ok(DomNode::from_cdp(root))
}

async fn fetch_page_stats(connection: &Connection, cdp_session_id: &str) -> Result<PageStats> {
	let value = evaluate(connection, cdp_session_id, page_scripts::PAGE_STATS).await?;
	Ok(PageStats {
		url: value.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
		title: value.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
		scroll_x: value.get("scrollX").and_then(|v| v.as_f64()).unwrap_or_default(),
		scroll_y: value.get("scrollY").and_then(|v| v.as_f64()).unwrap_or_default(),
		viewport_width: value.get("viewportWidth").and_then(|v| v.as_f64()).unwrap_or_default(),
		viewport_height: value.get("viewportHeight").and_then(|v| v.as_f64()).unwrap_or_default(),
		scroll_width: value.get("scrollWidth").and_then(|v| v.as_f64()).unwrap_or_default(),
		scroll_height: value.get("scrollHeight").and_then(|v| v.as_f64()).unwrap_or_default(),
	})
}

/// §6 `DOM.serialize(tab, opts)`: gathers page stats and the live DOM over
/// CDP, then hands both to the pure `serializer::render`.
pub async fn serialize(connection: &Connection, cdp_session_id: &str, opts: &SerializeOptions) -> Result<SerializeResult> {
	let stats = if opts.include_page_stats { Some(fetch_page_stats(connection, cdp_session_id).await?) } else { None };
	let document = fetch_document(connection, cdp_session_id).await?;
	Ok(serializer::render(&document, stats.as_ref(), opts))
}

/// §4.9 "Backend-id resolution (batched CDP)": harvests visible candidates
/// by evaluating `CANDIDATE_HARVEST` for their display fields, then
/// separately evaluates `CANDIDATE_ELEMENTS` (kept live, not serialized) to
/// get one remote object id for the array; `Runtime.getProperties` on that
/// enumerates per-element object ids, and `DOM.describeNode` resolves each
/// to a backend node id. The two evaluations walk the same selector list in
/// the same document order, so the Nth display record and the Nth property
/// refer to the same element.
pub async fn harvest_candidates(connection: &Connection, cdp_session_id: &str) -> Result<Vec<Candidate>> {
	let selectors = finder::harvest_selectors().join(", ");

	let display_script = page_scripts::CANDIDATE_HARVEST.replace("__SELECTORS__", &selectors);
	let display_value = evaluate(connection, cdp_session_id, &display_script).await?;
	let display: Vec<serde_json::Value> = display_value.as_array().cloned().unwrap_or_default();

	let elements_script = page_scripts::CANDIDATE_ELEMENTS.replace("__SELECTORS__", &selectors);
	let elements_result = connection.send(Some(cdp_session_id), "Runtime.evaluate", json!({ "expression": elements_script, "returnByValue": false, "awaitPromise": true })).await?;
	let Some(array_object_id) = elements_result.get("result").and_then(|r| r.get("objectId")).and_then(|v| v.as_str()) else {
		return Ok(Vec::new());
	};

	let props = connection.send(Some(cdp_session_id), "Runtime.getProperties", json!({ "objectId": array_object_id, "ownProperties": true })).await?;
	let empty = Vec::new();
	let properties = props.get("result").and_then(|v| v.as_array()).unwrap_or(&empty);

	// §9 resolved open question #3: a dense, zero-based index set, filtered
	// with `name.parse::<u32>()` rather than an `isNaN(parseInt(...))`-style
	// check — this accepts "0" and rejects "length"/"-1"/leading-zero forms
	// uniformly.
	let mut indexed: Vec<(u32, &str)> = properties
		.iter()
		.filter_map(|p| {
			let name = p.get("name")?.as_str()?;
			let index: u32 = name.parse().ok()?;
			let object_id = p.get("value")?.get("objectId")?.as_str()?;
			Some((index, object_id))
		})
		.collect();
	indexed.sort_by_key(|(i, _)| *i);

	let mut candidates = Vec::with_capacity(indexed.len().min(display.len()));
	for (index, object_id) in indexed {
		let Some(record) = display.get(index as usize) else { continue };
		let describe = connection.send(Some(cdp_session_id), "DOM.describeNode", json!({ "objectId": object_id })).await;
		let backend_node_id = match describe {
			Ok(v) => v.get("node").and_then(|n| n.get("backendNodeId")).and_then(|v| v.as_i64()).unwrap_or(0),
			Err(err) => {
				debug!(error = %err, "describeNode failed for a candidate, skipping");
				continue;
			}
		};
		candidates.push(Candidate {
			backend_node_id,
			role: record.get("role").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
			name: record.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
			tag: record.get("tag").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
			input_type: record.get("inputType").and_then(|v| v.as_str()).map(str::to_string),
			placeholder: record.get("placeholder").and_then(|v| v.as_str()).map(str::to_string),
			aria_label: record.get("ariaLabel").and_then(|v| v.as_str()).map(str::to_string),
			text_prefix: record.get("textPrefix").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
			width: record.get("width").and_then(|v| v.as_f64()).unwrap_or_default(),
			height: record.get("height").and_then(|v| v.as_f64()).unwrap_or_default(),
			center_x: record.get("centerX").and_then(|v| v.as_f64()).unwrap_or_default(),
			center_y: record.get("centerY").and_then(|v| v.as_f64()).unwrap_or_default(),
		});
	}
	Ok(candidates)
}

/// §6 `Finder.findBest(tab, query)`.
pub async fn find_best_on_tab(connection: &Connection, cdp_session_id: &str, query: &str) -> Result<FoundElement> {
	let candidates = harvest_candidates(connection, cdp_session_id).await?;
	finder::find_best(query, &candidates)
}

fn parse_navigation_state(value: &serde_json::Value) -> NavigationState {
	NavigationState {
		url: value.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
		title: value.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
		scroll_x: value.get("scrollX").and_then(|v| v.as_f64()).unwrap_or_default(),
		scroll_y: value.get("scrollY").and_then(|v| v.as_f64()).unwrap_or_default(),
	}
}

fn parse_mutations(value: &serde_json::Value) -> Vec<MutationKind> {
	let Some(arr) = value.as_array() else { return Vec::new() };
	arr.iter()
		.filter_map(|m| {
			let kind = m.get("kind")?.as_str()?;
			let tag = m.get("tag")?.as_str()?.to_string();
			let role = m.get("role").and_then(|v| v.as_str()).map(str::to_string);
			match kind {
				"added" => Some(MutationKind::Added { tag, role, text_preview: m.get("textPreview").and_then(|v| v.as_str()).unwrap_or_default().to_string() }),
				"removed" => Some(MutationKind::Removed { tag, role, text_preview: m.get("textPreview").and_then(|v| v.as_str()).unwrap_or_default().to_string() }),
				"attr" => Some(MutationKind::AttrChanged {
					tag,
					id: m.get("id").and_then(|v| v.as_str()).map(str::to_string),
					attr: m.get("attr")?.as_str()?.to_string(),
					old: m.get("old").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
					new: m.get("new").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
				}),
				_ => None,
			}
		})
		.collect()
}

/// §4.10 `withDelta(tab, action, opts)`. `action` is the host-side closure
/// performing the click/input/etc. via whatever CDP calls it needs; this
/// function only owns the observer lifecycle and before/after bookkeeping
/// around it.
pub async fn with_delta<F, Fut, T>(connection: &Connection, cdp_session_id: &str, action: F, settle_ms: Option<u64>, max_chars: Option<usize>) -> Result<(T, String)>
where
	F: FnOnce() -> Fut,
	Fut: std::future::Future<Output = Result<T>>,
{
	let install = delta::WATCHED_ATTRS.iter().map(|a| format!("\"{a}\"")).collect::<Vec<_>>().join(",");
	let skipped = delta::SKIPPED_TAGS.iter().map(|t| format!("\"{t}\"")).collect::<Vec<_>>().join(",");
	let install_script = page_scripts::DELTA_OBSERVER_INSTALL.replace("__WATCHED_ATTRS__", &format!("[{install}]")).replace("__SKIPPED_TAGS__", &format!("[{skipped}]"));

	let before = fetch_page_stats(connection, cdp_session_id).await.map(|s| NavigationState { url: s.url, title: s.title, scroll_x: s.scroll_x, scroll_y: s.scroll_y }).unwrap_or_default();

	evaluate(connection, cdp_session_id, &install_script).await?;

	let result = match action().await {
		Ok(value) => value,
		Err(err) => {
			// §4.10 step 3: if the action throws, disconnect the observer and propagate.
			let _ = evaluate(connection, cdp_session_id, page_scripts::DELTA_OBSERVER_DRAIN).await;
			return Err(err);
		}
	};

	tokio::time::sleep(Duration::from_millis(settle_ms.unwrap_or(DEFAULT_SETTLE_MS))).await;

	// §7 "some operations (e.g., the DOM delta collector) self-recover by
	// returning empty delta" on a CDP protocol error (e.g. the navigation
	// that just happened destroyed the execution context the observer lived
	// in).
	let drained = match evaluate(connection, cdp_session_id, page_scripts::DELTA_OBSERVER_DRAIN).await {
		Ok(v) => v,
		Err(_) => {
			let opts = DeltaOptions::with_max_chars(max_chars.unwrap_or(DEFAULT_DELTA_MAX_CHARS));
			let empty = RawDelta::default();
			return Ok((result, delta::format_delta(&empty, &opts)));
		}
	};

	let after = parse_navigation_state(&drained);
	let navigated = drained.get("navigated").and_then(|v| v.as_bool()).unwrap_or(false);
	let raw = RawDelta { mutations: parse_mutations(drained.get("mutations").unwrap_or(&serde_json::Value::Null)), navigated, new_url: Some(after.url.clone()), before, after };

	let opts = DeltaOptions::with_max_chars(max_chars.unwrap_or(DEFAULT_DELTA_MAX_CHARS));
	Ok((result, delta::format_delta(&raw, &opts)))
}
