//! Pagination Tracker
//!
//! Tracks the current page of a record list. The bounds invariant
//! `1 <= current_page <= total_pages` holds after every mutation, and
//! `total_pages` is never zero even for an empty dataset.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Page size used when none (or an invalid one) is configured.
pub const DEFAULT_PER_PAGE: usize = 30;

/// Current page, page size and page count of a record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    current_page: usize,
    per_page: usize,
    total_pages: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE)
    }
}

impl Pagination {
    /// Start on page 1 of 1. A zero page size is raised to 1.
    #[must_use]
    pub fn new(per_page: usize) -> Self {
        Self {
            current_page: 1,
            per_page: per_page.max(1),
            total_pages: 1,
        }
    }

    /// Current 1-based page.
    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    /// Rows per page.
    #[must_use]
    pub const fn per_page(&self) -> usize {
        self.per_page
    }

    /// Page count, at least 1.
    #[must_use]
    pub const fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Recompute the page count for `dataset_len` rows and clamp the
    /// current page into range.
    pub fn update(&mut self, dataset_len: usize) {
        self.total_pages = dataset_len.div_ceil(self.per_page).max(1);
        self.current_page = self.current_page.clamp(1, self.total_pages);
    }

    /// Move by `offset` pages, clamped to the valid range, then call `render`.
    ///
    /// Returns whether the current page changed.
    pub fn change_page<F>(&mut self, offset: i64, render: F) -> bool
    where
        F: FnOnce(&Self),
    {
        let before = self.current_page;
        let target = i64::try_from(before)
            .unwrap_or(i64::MAX)
            .saturating_add(offset);
        let max = i64::try_from(self.total_pages).unwrap_or(i64::MAX);
        let clamped = target.clamp(1, max);
        self.current_page = usize::try_from(clamped).unwrap_or(1);
        render(self);
        self.current_page != before
    }

    /// Change the page size and go back to page 1.
    ///
    /// A zero page size falls back to [`DEFAULT_PER_PAGE`].
    pub fn set_per_page(&mut self, per_page: usize, dataset_len: usize) {
        self.per_page = if per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            per_page
        };
        self.current_page = 1;
        self.update(dataset_len);
    }

    /// Parse a page size from user input; invalid input yields the default.
    #[must_use]
    pub fn parse_per_page(input: &str) -> usize {
        input
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PER_PAGE)
    }

    /// Index range of the current page within a dataset of `dataset_len` rows.
    #[must_use]
    pub fn page_range(&self, dataset_len: usize) -> Range<usize> {
        let start = (self.current_page - 1)
            .saturating_mul(self.per_page)
            .min(dataset_len);
        let end = self
            .current_page
            .saturating_mul(self.per_page)
            .min(dataset_len);
        start..end
    }

    /// Slice of `items` shown on the current page.
    #[must_use]
    pub fn page_slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.page_range(items.len())]
    }

    /// Whether a previous page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// Whether a next page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Pager caption, e.g. `"Page 2 of 5"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("Page {} of {}", self.current_page, self.total_pages)
    }

    /// Re-establish invariants on a value restored from storage.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.per_page = self.per_page.max(1);
        self.total_pages = self.total_pages.max(1);
        self.current_page = self.current_page.clamp(1, self.total_pages);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_starts_on_first_page() {
        let p = Pagination::new(30);
        assert_eq!((p.current_page(), p.per_page(), p.total_pages()), (1, 30, 1));
        assert_eq!(Pagination::new(0).per_page(), 1);
    }

    #[test]
    fn update_computes_total_pages() {
        let mut p = Pagination::new(30);
        p.update(61);
        assert_eq!(p.total_pages(), 3);
        p.update(60);
        assert_eq!(p.total_pages(), 2);
        p.update(0);
        assert_eq!(p.total_pages(), 1);
    }

    #[test]
    fn update_clamps_current_page() {
        let mut p = Pagination::new(10);
        p.update(100);
        p.change_page(7, |_| {});
        assert_eq!(p.current_page(), 8);
        p.update(25);
        assert_eq!(p.current_page(), 3);
    }

    #[test]
    fn change_page_clamps_and_renders() {
        let mut p = Pagination::new(10);
        p.update(35);

        let mut rendered = 0;
        assert!(!p.change_page(-1, |_| rendered += 1));
        assert_eq!(p.current_page(), 1);

        assert!(p.change_page(10, |_| rendered += 1));
        assert_eq!(p.current_page(), 4);

        assert!(!p.change_page(1, |_| rendered += 1));
        assert_eq!(p.current_page(), 4);
        assert_eq!(rendered, 3);
    }

    #[test]
    fn set_per_page_resets_to_first_page() {
        let mut p = Pagination::new(10);
        p.update(100);
        p.change_page(5, |_| {});
        p.set_per_page(50, 100);
        assert_eq!((p.current_page(), p.total_pages()), (1, 2));
        p.set_per_page(0, 100);
        assert_eq!(p.per_page(), DEFAULT_PER_PAGE);
    }

    #[test]
    fn parse_per_page_falls_back() {
        assert_eq!(Pagination::parse_per_page(" 50 "), 50);
        assert_eq!(Pagination::parse_per_page("0"), DEFAULT_PER_PAGE);
        assert_eq!(Pagination::parse_per_page("abc"), DEFAULT_PER_PAGE);
    }

    #[test]
    fn page_slice_and_navigation() {
        let items: Vec<u32> = (0..25).collect();
        let mut p = Pagination::new(10);
        p.update(items.len());
        assert_eq!(p.page_slice(&items), &items[0..10]);
        assert!(!p.has_previous());
        assert!(p.has_next());

        p.change_page(2, |_| {});
        assert_eq!(p.page_slice(&items), &items[20..25]);
        assert!(p.has_previous());
        assert!(!p.has_next());
        assert_eq!(p.label(), "Page 3 of 3");
    }

    #[test]
    fn empty_dataset_slice_is_empty() {
        let p = Pagination::new(10);
        let items: Vec<u32> = Vec::new();
        assert!(p.page_slice(&items).is_empty());
    }

    #[test]
    fn sanitized_repairs_restored_state() {
        let p: Pagination =
            serde_json::from_str(r#"{"currentPage":9,"perPage":0,"totalPages":0}"#).unwrap();
        let p = p.sanitized();
        assert_eq!((p.current_page(), p.per_page(), p.total_pages()), (1, 1, 1));
    }

    proptest! {
        #[test]
        fn bounds_hold_after_any_sequence(
            per_page in 1_usize..50,
            ops in proptest::collection::vec((0_usize..500, -20_i64..20), 0..30),
        ) {
            let mut p = Pagination::new(per_page);
            for (len, offset) in ops {
                p.update(len);
                prop_assert!(p.total_pages() >= 1);
                prop_assert!(p.current_page() >= 1 && p.current_page() <= p.total_pages());
                prop_assert_eq!(p.total_pages(), len.div_ceil(per_page).max(1));

                p.change_page(offset, |_| {});
                prop_assert!(p.current_page() >= 1 && p.current_page() <= p.total_pages());
                prop_assert!(p.page_range(len).end <= len);
            }
        }
    }
}
