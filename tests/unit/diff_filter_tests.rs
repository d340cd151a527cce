//! Unit tests for context-aware substring filtering.

use browser_relay::content::diff::filter_with_context;

#[test]
fn match_with_after_context_and_gap_separator() {
    let text = "line1\nMATCH\nline3\nline4\nMATCH2\nline6";

    let filtered = filter_with_context(text, "MATCH", 0, 1);

    assert_eq!(filtered, "MATCH\nline3\n--\nMATCH2\nline6");
}

#[test]
fn match_includes_the_matched_line_itself() {
    let text = "alpha\nneedle here\nomega";

    let filtered = filter_with_context(text, "needle", 0, 0);

    assert_eq!(filtered, "needle here");
}

#[test]
fn before_context_is_clamped_at_start_of_text() {
    let text = "first\nsecond\nthird";

    let filtered = filter_with_context(text, "first", 3, 0);

    assert_eq!(filtered, "first");
}

#[test]
fn after_context_is_clamped_at_end_of_text() {
    let text = "first\nsecond\nlast";

    let filtered = filter_with_context(text, "last", 0, 5);

    assert_eq!(filtered, "last");
}

#[test]
fn overlapping_context_regions_merge_without_separator() {
    let text = "a\nMATCH\nb\nMATCH\nc";

    let filtered = filter_with_context(text, "MATCH", 1, 1);

    // The two context windows overlap on every line; one contiguous run,
    // no `--` separator, no duplicated lines.
    assert_eq!(filtered, "a\nMATCH\nb\nMATCH\nc");
}

#[test]
fn adjacent_regions_do_not_get_a_separator() {
    let text = "MATCH1\nMATCH2\nother";

    let filtered = filter_with_context(text, "MATCH", 0, 0);

    assert_eq!(filtered, "MATCH1\nMATCH2");
}

#[test]
fn no_match_yields_empty_output() {
    let text = "nothing\nto\nsee";

    let filtered = filter_with_context(text, "absent", 2, 2);

    assert_eq!(filtered, "");
}

#[test]
fn before_and_after_combine_around_a_single_match() {
    let text = "l1\nl2\nMATCH\nl4\nl5\nl6";

    let filtered = filter_with_context(text, "MATCH", 1, 2);

    assert_eq!(filtered, "l2\nMATCH\nl4\nl5");
}
