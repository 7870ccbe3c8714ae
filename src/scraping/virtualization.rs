use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use std::sync::OnceLock;

/// Class-name fragments left behind by common virtual-scrolling grids.
const VIRTUAL_MARKERS: &[&str] = &[
    "ag-grid",
    "ag-body-viewport",
    "react-table",
    "virtual",
    "virtualized",
    "tanstack",
    "rc-virtual-list",
    "cdk-virtual",
    "react-window",
];

static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();

fn matcher() -> &'static AhoCorasick {
    MATCHER.get_or_init(|| {
        AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(VIRTUAL_MARKERS)
            .expect("valid virtualization markers")
    })
}

/// `true` when any of the container's (or its ancestors') class names
/// carries a known virtual-list marker.
pub fn looks_virtualized<S: AsRef<str>>(classes: &[S]) -> bool {
    classes.iter().any(|c| matcher().is_match(c.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_grid_markers_case_insensitively() {
        assert!(looks_virtualized(&["wrapper", "AG-Grid-Root"]));
        assert!(looks_virtualized(&["ReactVirtualized__Grid"]));
    }

    #[test]
    fn plain_tables_are_not_virtualized() {
        assert!(!looks_virtualized(&["table table-striped", "container"]));
        assert!(!looks_virtualized::<&str>(&[]));
    }
}
