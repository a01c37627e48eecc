//! C8-C10: page-content serialization, element finding, and change-delta
//! recording. All three share `types::DomNode` as their host-side view of
//! the page and keep their real logic as pure functions over it, with the
//! small amount of in-page JS factored out to `page_scripts`.

pub mod delta;
pub mod finder;
pub mod ops;
pub mod page_scripts;
pub mod serializer;
pub mod types;

pub use delta::{DeltaOptions, MutationKind, NavigationState, RawDelta, format_delta};
pub use finder::{Candidate, FoundElement, find_best, harvest_selectors, score, tokenize};
pub use ops::{find_best_on_tab, harvest_candidates, serialize, with_delta};
pub use serializer::{PageStats, SerializeOptions, SerializeResult, render};
pub use types::{DomNode, NodeType};
