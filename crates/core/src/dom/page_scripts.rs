//! The small, stable set of JS programs evaluated in the page context on
//! behalf of the DOM module (§9 redesign note: "dynamic invocation in the
//! page context" — keep in-page code to a compiled-once minimum and do the
//! real logic, scoring, and formatting on the host side in plain Rust).
//!
//! Each constant is injected via `Runtime.evaluate`/`Runtime.callFunctionOn`
//! with `awaitPromise: true`; none of them are built from string
//! concatenation with user input, so there is no injection surface here.

/// Collects interactive-element candidates for the finder (§4.9). Runs the
/// selector union built host-side by `finder::harvest_selectors`, filters
/// out non-visible elements (`display:none`, zero-size, `visibility:hidden`),
/// and returns the fields `finder::Candidate` is built from. The caller
/// splices `__SELECTORS__` with the selector list joined by commas.
pub const CANDIDATE_HARVEST: &str = r#"
(() => {
	const nodes = Array.from(document.querySelectorAll("__SELECTORS__"));
	return nodes.map(el => {
		const rect = el.getBoundingClientRect();
		const style = getComputedStyle(el);
		return {
			role: el.getAttribute("role") || el.tagName.toLowerCase(),
			name: el.innerText || el.value || "",
			tag: el.tagName,
			inputType: el.getAttribute("type"),
			placeholder: el.getAttribute("placeholder"),
			ariaLabel: el.getAttribute("aria-label"),
			textPrefix: (el.innerText || "").slice(0, 80),
			width: rect.width,
			height: rect.height,
			centerX: rect.left + rect.width / 2,
			centerY: rect.top + rect.height / 2,
			visible: style.display !== "none" && style.visibility !== "hidden" && rect.width > 0 && rect.height > 0,
		};
	}).filter(c => c.visible);
})()
"#;

/// Companion to `CANDIDATE_HARVEST`, evaluated with `returnByValue: false` so
/// the result stays a live object in the page instead of being serialized:
/// the finder's batched backend-id resolution (§4.9 "Backend-id resolution")
/// calls `Runtime.getProperties` on this array's remote object id to get a
/// per-element object id, then issues `DOM.describeNode` in parallel against
/// each one — a single in-page walk instead of one query per candidate.
pub const CANDIDATE_ELEMENTS: &str = r#"
(() => Array.from(document.querySelectorAll("__SELECTORS__")).filter(el => {
	const rect = el.getBoundingClientRect();
	const style = getComputedStyle(el);
	return style.display !== "none" && style.visibility !== "hidden" && rect.width > 0 && rect.height > 0;
}))()
"#;

/// Gathers the single line of page stats the serializer prepends (§4.8
/// "Record page stats first ... via a single in-page evaluation"): URL,
/// title, current scroll position, viewport size, and full scroll extents.
pub const PAGE_STATS: &str = r#"
(() => ({
	url: location.href,
	title: document.title,
	scrollX: window.scrollX,
	scrollY: window.scrollY,
	viewportWidth: window.innerWidth,
	viewportHeight: window.innerHeight,
	scrollWidth: document.documentElement.scrollWidth,
	scrollHeight: document.documentElement.scrollHeight,
}))()
"#;

/// Installed before the triggering action runs (§4.10 step 1); records
/// mutations via a `MutationObserver` plus a `beforeunload`/`popstate`
/// listener for navigation detection, and exposes `window.__deltaDrain()`
/// to retrieve and clear the buffer.
pub const DELTA_OBSERVER_INSTALL: &str = r#"
(() => {
	window.__deltaBuffer = [];
	window.__deltaNavigated = false;
	const watchedAttrs = new Set(__WATCHED_ATTRS__);
	const skippedTags = new Set(__SKIPPED_TAGS__);
	const observer = new MutationObserver(records => {
		for (const r of records) {
			if (r.type === "childList") {
				for (const n of r.addedNodes) {
					if (n.nodeType === 1 && !skippedTags.has(n.tagName)) {
						window.__deltaBuffer.push({ kind: "added", tag: n.tagName, role: n.getAttribute("role"), textPreview: (n.innerText || "").slice(0, 40) });
					}
				}
				for (const n of r.removedNodes) {
					if (n.nodeType === 1 && !skippedTags.has(n.tagName)) {
						window.__deltaBuffer.push({ kind: "removed", tag: n.tagName, role: n.getAttribute("role"), textPreview: (n.innerText || "").slice(0, 40) });
					}
				}
			} else if (r.type === "attributes" && watchedAttrs.has(r.attributeName)) {
				window.__deltaBuffer.push({
					kind: "attr",
					tag: r.target.tagName,
					id: r.target.id || null,
					attr: r.attributeName,
					old: r.oldValue,
					new: r.target.getAttribute(r.attributeName),
				});
			}
		}
	});
	observer.observe(document, { childList: true, subtree: true, attributes: true, attributeOldValue: true });
	window.addEventListener("beforeunload", () => { window.__deltaNavigated = true; }, { once: true });
	window.__deltaObserver = observer;
})()
"#;

/// Drains the buffer installed by `DELTA_OBSERVER_INSTALL` and reports the
/// before/after navigation state the host compares (§4.10 step 4).
pub const DELTA_OBSERVER_DRAIN: &str = r#"
(() => {
	const observer = window.__deltaObserver;
	if (observer) observer.disconnect();
	const mutations = window.__deltaBuffer || [];
	const navigated = !!window.__deltaNavigated;
	return {
		mutations,
		navigated,
		url: location.href,
		title: document.title,
		scrollX: window.scrollX,
		scrollY: window.scrollY,
	};
})()
"#;
