//! Paging for list queries.
//!
//! DAOs translate a [`PageRequest`] into `LIMIT ? OFFSET ?` and pair the
//! rows with a `COUNT(*)` over the same predicate.

use serde::{Deserialize, Serialize};

/// A request for one page of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page number.
    pub page: usize,
    /// Rows per page.
    pub size: usize,
}

impl PageRequest {
    /// Page size used when the caller does not choose one.
    pub const DEFAULT_SIZE: usize = 20;
    /// Upper bound applied to every request.
    pub const MAX_SIZE: usize = 100;

    /// Creates a page request, clamping the size to `1..=MAX_SIZE`.
    #[must_use]
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page,
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    /// First page with the default size.
    #[must_use]
    pub fn first() -> Self {
        Self::new(0, Self::DEFAULT_SIZE)
    }

    /// Number of rows to skip.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.page * self.size
    }

    /// Maximum number of rows to return.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.size
    }

    /// `LIMIT` bind value.
    #[must_use]
    pub fn sql_limit(&self) -> i64 {
        i64::try_from(self.limit()).unwrap_or(i64::MAX)
    }

    /// `OFFSET` bind value.
    #[must_use]
    pub fn sql_offset(&self) -> i64 {
        i64::try_from(self.offset()).unwrap_or(i64::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// Position of a page within the full result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: usize,
    pub size: usize,
    pub total_elements: u64,
    pub total_pages: u64,
    pub first: bool,
    pub last: bool,
    pub number_of_elements: usize,
}

impl PageInfo {
    #[must_use]
    pub fn new(page: usize, size: usize, total_elements: u64, number_of_elements: usize) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total_elements.div_ceil(size as u64)
        };

        Self {
            page,
            size,
            total_elements,
            total_pages,
            first: page == 0,
            last: page as u64 + 1 >= total_pages,
            number_of_elements,
        }
    }
}

/// One page of results plus its [`PageInfo`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(flatten)]
    pub info: PageInfo,
}

impl<T> Page<T> {
    /// Builds a page from the rows of `request` and the total row count.
    #[must_use]
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let number_of_elements = content.len();
        Self {
            content,
            info: PageInfo::new(request.page, request.size, total_elements, number_of_elements),
        }
    }

    #[must_use]
    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }

    /// Maps the rows, keeping the page position.
    #[must_use]
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            info: self.info,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub const fn total_elements(&self) -> u64 {
        self.info.total_elements
    }

    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        self.info.total_pages
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        !self.info.last
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        !self.info.first
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.content.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_bounds() {
        assert_eq!(PageRequest::new(0, 1000).size, PageRequest::MAX_SIZE);
        assert_eq!(PageRequest::new(0, 0).size, 1);
    }

    #[test]
    fn test_page_request_sql_values() {
        let req = PageRequest::new(3, 15);
        assert_eq!(req.sql_offset(), 45);
        assert_eq!(req.sql_limit(), 15);
        assert_eq!(PageRequest::first().sql_offset(), 0);
    }

    #[test]
    fn test_page_info_middle_page() {
        let page: Page<i32> = Page::new(vec![1, 2, 3], PageRequest::new(1, 3), 10);
        assert_eq!(page.total_pages(), 4);
        assert!(page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn test_page_info_last_page() {
        let page: Page<i32> = Page::new(vec![1, 2], PageRequest::new(2, 10), 22);
        assert!(page.info.last);
        assert!(!page.has_next());
    }

    #[test]
    fn test_empty_page_is_last() {
        let page: Page<i32> = Page::empty(PageRequest::first());
        assert!(page.is_empty());
        assert!(page.info.first);
        assert!(page.info.last);
        assert_eq!(page.total_pages(), 0);
    }

    #[test]
    fn test_page_map_keeps_info() {
        let page = Page::new(vec![1, 2, 3], PageRequest::new(0, 3), 7);
        let mapped = page.map(|x| x.to_string());
        assert_eq!(mapped.content, vec!["1", "2", "3"]);
        assert_eq!(mapped.total_elements(), 7);
    }
}
