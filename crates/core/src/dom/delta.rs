//! C10: formats the change set collected by an in-page mutation observer
//! around an action (§4.10). The observer itself runs in the page
//! (`page_scripts::DELTA_OBSERVER_INSTALL`); this module turns its raw
//! recorded events into the compact text summary, which is the part worth
//! unit-testing without a live browser.

use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Attribute names the observer watches for changes (§4.10 step 1).
pub const WATCHED_ATTRS: &[&str] = &["class", "style", "hidden", "disabled", "aria-expanded", "aria-hidden", "open", "checked", "value", "src", "href"];

/// Tags the observer ignores entirely (§4.10 step 1).
pub const SKIPPED_TAGS: &[&str] = &["SCRIPT", "STYLE", "LINK", "META", "NOSCRIPT"];

const MAX_TOTAL_MUTATIONS: usize = 15;
const MAX_PER_KIND: usize = 10;
const TEXT_PREVIEW_CHARS: usize = 40;

static ANIMATION_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new(r"(?i)animate|fade|slide|transition|entering|leaving|active|ng-|v-").unwrap());

#[derive(Debug, Clone)]
pub enum MutationKind {
	Added { tag: String, role: Option<String>, text_preview: String },
	Removed { tag: String, role: Option<String>, text_preview: String },
	AttrChanged { tag: String, id: Option<String>, attr: String, old: String, new: String },
}

#[derive(Debug, Clone, Default)]
pub struct NavigationState {
	pub url: String,
	pub title: String,
	pub scroll_x: f64,
	pub scroll_y: f64,
}

/// Everything the in-page observer recorded around one action (§4.10).
#[derive(Debug, Clone, Default)]
pub struct RawDelta {
	pub mutations: Vec<MutationKind>,
	pub navigated: bool,
	pub new_url: Option<String>,
	pub before: NavigationState,
	pub after: NavigationState,
}

#[derive(Debug, Clone, Default)]
pub struct DeltaOptions {
	pub max_chars: usize,
}

impl DeltaOptions {
	pub fn with_max_chars(max_chars: usize) -> Self {
		Self { max_chars }
	}
}

/// Whether a class-attribute change is entirely animation-churn and should
/// be skipped (§4.10 step 1 "Skip class changes whose entire diff is purely
/// animation-related").
fn is_animation_only_class_diff(old: &str, new: &str) -> bool {
	let old_classes: BTreeSet<&str> = old.split_whitespace().collect();
	let new_classes: BTreeSet<&str> = new.split_whitespace().collect();
	let changed: Vec<&str> = old_classes.symmetric_difference(&new_classes).copied().collect();
	!changed.is_empty() && changed.iter().all(|c| ANIMATION_PATTERN.is_match(c))
}

fn clip(text: &str, max: usize) -> String {
	text.chars().take(max).collect()
}

/// §4.10 step 6: `tag[role="..."]: ` when the observer captured a role,
/// else plain `tag ` — the text preview (quoted by the caller) follows.
fn tagged_selector(tag: &str, role: Option<&str>) -> String {
	match role {
		Some(role) => format!("{}[role={role:?}]: ", tag.to_ascii_lowercase()),
		None => format!("{} ", tag.to_ascii_lowercase()),
	}
}

fn dedup_key(m: &MutationKind) -> (u8, String, String, String) {
	match m {
		MutationKind::Added { tag, text_preview, .. } => (0, tag.clone(), text_preview.clone(), String::new()),
		MutationKind::Removed { tag, text_preview, .. } => (1, tag.clone(), text_preview.clone(), String::new()),
		MutationKind::AttrChanged { tag, attr, old, new, .. } => (2, tag.clone(), attr.clone(), format!("{old}->{new}")),
	}
}

/// §4.10 steps 5-6: format a collected `RawDelta` into the compact text
/// summary, or a navigation notice if the action triggered one.
pub fn format_delta(raw: &RawDelta, opts: &DeltaOptions) -> String {
	if raw.navigated || raw.after.url != raw.before.url {
		let url = raw.new_url.clone().unwrap_or_else(|| raw.after.url.clone());
		return clip(&format!("[Page navigated: {url}] (title: {:?})", raw.after.title), opts.max_chars.max(1));
	}

	let mut seen = BTreeSet::new();
	let mut added_count = 0usize;
	let mut removed_count = 0usize;
	let mut attr_count = 0usize;
	let mut lines = Vec::new();
	let mut total_emitted = 0usize;

	for m in &raw.mutations {
		if total_emitted >= MAX_TOTAL_MUTATIONS {
			break;
		}
		if let MutationKind::AttrChanged { attr, old, new, .. } = m
			&& attr == "class"
			&& is_animation_only_class_diff(old, new)
		{
			continue;
		}

		let key = dedup_key(m);
		if !seen.insert(key) {
			continue;
		}

		match m {
			MutationKind::Added { tag, role, text_preview } => {
				if added_count >= MAX_PER_KIND {
					continue;
				}
				lines.push(format!("+ {}{:?}", tagged_selector(tag, role.as_deref()), clip(text_preview, TEXT_PREVIEW_CHARS)));
				added_count += 1;
			}
			MutationKind::Removed { tag, role, text_preview } => {
				if removed_count >= MAX_PER_KIND {
					continue;
				}
				lines.push(format!("- {}{:?}", tagged_selector(tag, role.as_deref()), clip(text_preview, TEXT_PREVIEW_CHARS)));
				removed_count += 1;
			}
			MutationKind::AttrChanged { tag, id, attr, old, new } => {
				if attr_count >= MAX_PER_KIND {
					continue;
				}
				let selector = id.as_ref().map(|i| format!("{}#{}", tag.to_ascii_lowercase(), i)).unwrap_or_else(|| tag.to_ascii_lowercase());
				lines.push(format!("~ {selector}: {attr} {old}\u{2192}{new}"));
				attr_count += 1;
			}
		}
		total_emitted += 1;
	}

	if raw.after.title != raw.before.title {
		lines.push(format!("title: {:?} \u{2192} {:?}", raw.before.title, raw.after.title));
	}
	if raw.after.scroll_x != raw.before.scroll_x || raw.after.scroll_y != raw.before.scroll_y {
		lines.push(format!("scroll: ({},{}) \u{2192} ({},{})", raw.before.scroll_x, raw.before.scroll_y, raw.after.scroll_x, raw.after.scroll_y));
	}

	let joined = lines.join("\n");
	clip(&joined, opts.max_chars.max(1))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn role_div_added(text: &str) -> MutationKind {
		MutationKind::Added { tag: "div".into(), role: Some("alert".into()), text_preview: text.into() }
	}

	#[test]
	fn spec_scenario_6_simple_click_delta() {
		let raw = RawDelta { mutations: vec![role_div_added("Saved")], navigated: false, new_url: None, before: NavigationState::default(), after: NavigationState::default() };
		let out = format_delta(&raw, &DeltaOptions::with_max_chars(500));
		assert!(out.contains(r#"+ div[role="alert"]: "Saved""#));
		assert!(!out.contains("navigated"));
	}

	#[test]
	fn mutation_without_a_role_omits_the_bracket() {
		let m = MutationKind::Added { tag: "li".into(), role: None, text_preview: "item".into() };
		let raw = RawDelta { mutations: vec![m], ..Default::default() };
		let out = format_delta(&raw, &DeltaOptions::with_max_chars(500));
		assert_eq!(out, r#"+ li "item""#);
	}

	#[test]
	fn spec_scenario_6_navigation_delta() {
		let before = NavigationState { url: "https://a.example/".into(), title: "A".into(), scroll_x: 0.0, scroll_y: 0.0 };
		let after = NavigationState { url: "https://b.example/".into(), title: "B".into(), scroll_x: 0.0, scroll_y: 0.0 };
		let raw = RawDelta { mutations: vec![], navigated: true, new_url: Some("https://b.example/".into()), before, after };
		let out = format_delta(&raw, &DeltaOptions::with_max_chars(500));
		assert!(out.starts_with("[Page navigated: "));
	}

	#[test]
	fn animation_only_class_diff_is_skipped() {
		let m = MutationKind::AttrChanged { tag: "div".into(), id: None, attr: "class".into(), old: "card fade-in".into(), new: "card fade-out".into() };
		let raw = RawDelta { mutations: vec![m], ..Default::default() };
		let out = format_delta(&raw, &DeltaOptions::with_max_chars(500));
		assert!(out.is_empty());
	}

	#[test]
	fn non_animation_class_change_is_reported() {
		let m = MutationKind::AttrChanged { tag: "div".into(), id: Some("panel".into()), attr: "class".into(), old: "collapsed".into(), new: "expanded".into() };
		let raw = RawDelta { mutations: vec![m], ..Default::default() };
		let out = format_delta(&raw, &DeltaOptions::with_max_chars(500));
		assert!(out.contains("div#panel: class collapsed\u{2192}expanded"));
	}

	#[test]
	fn dedup_collapses_identical_mutations() {
		let mutations = vec![role_div_added("Saved"), role_div_added("Saved"), role_div_added("Saved")];
		let raw = RawDelta { mutations, ..Default::default() };
		let out = format_delta(&raw, &DeltaOptions::with_max_chars(500));
		assert_eq!(out.lines().count(), 1);
	}

	#[test]
	fn per_kind_cap_is_ten() {
		let mutations: Vec<MutationKind> = (0..15).map(|i| MutationKind::Added { tag: "li".into(), role: None, text_preview: format!("item {i}") }).collect();
		let raw = RawDelta { mutations, ..Default::default() };
		let out = format_delta(&raw, &DeltaOptions::with_max_chars(5000));
		assert_eq!(out.lines().count(), 10);
	}

	#[test]
	fn total_output_is_capped_at_max_chars() {
		let mutations: Vec<MutationKind> = (0..10).map(|i| MutationKind::Added { tag: "li".into(), role: None, text_preview: format!("a reasonably long item description number {i}") }).collect();
		let raw = RawDelta { mutations, ..Default::default() };
		let out = format_delta(&raw, &DeltaOptions::with_max_chars(50));
		assert!(out.chars().count() <= 50);
	}
}
