//! Result windows and pages.
//!
//! [`Window`] is the skip/take pair used by the sorted pagination operations (skip 0, take 50
//! unless told otherwise). [`PaginationParams`] addresses 1-indexed pages and produces a
//! [`Page`] carrying the total match count and navigation links.

use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Default number of documents returned by a sorted pagination request.
pub const DEFAULT_TAKE: u64 = 50;

/// A skip/take window applied after sorting.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Documents to skip.
    pub skip: u64,
    /// Maximum documents to return.
    pub take: u64,
}

impl Window {
    pub fn new(skip: u64, take: u64) -> Self {
        Self { skip, take }
    }
}

impl Default for Window {
    fn default() -> Self {
        Self { skip: 0, take: DEFAULT_TAKE }
    }
}

/// A single page of results.
///
/// # Example
///
/// ```ignore
/// let page = Page::builder(vec!["a", "b"])
///     .with_count(7)
///     .with_next_page(Some(2))
///     .build();
///
/// assert_eq!(page.count, 7);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Number of matching items across all pages.
    pub count: u64,
    /// The next page number, if more items exist.
    pub next_page: Option<u64>,
    /// The previous page number, unless this is the first page.
    pub previous_page: Option<u64>,
}

impl<T> Page<T> {
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// Converts the items of this page, keeping the navigation metadata.
    pub fn try_map<U, F>(self, f: F) -> DocumentStoreResult<Page<U>>
    where
        F: FnMut(T) -> DocumentStoreResult<U>,
    {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<DocumentStoreResult<_>>()?,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Builder for [`Page`].
pub struct PageBuilder<T> {
    items: Vec<T>,
    count: u64,
    next_page: Option<u64>,
    previous_page: Option<u64>,
}

impl<T> PageBuilder<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn with_next_page(mut self, next_page: Option<u64>) -> Self {
        self.next_page = next_page;
        self
    }

    pub fn with_previous_page(mut self, previous_page: Option<u64>) -> Self {
        self.previous_page = previous_page;
        self
    }

    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

/// 1-indexed page addressing.
///
/// ```ignore
/// let params = PaginationParams::new(3, 20);
/// assert_eq!(params.window()?.skip, 40);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// The page number, starting at 1.
    pub page: u64,
    /// Items per page.
    pub per_page: u64,
}

impl PaginationParams {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    pub fn builder() -> PaginationParamsBuilder {
        PaginationParamsBuilder::new()
    }

    /// Returns the skip/take window addressed by these parameters.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidArgument`] when `page` is zero.
    pub fn window(&self) -> DocumentStoreResult<Window> {
        if self.page == 0 {
            return Err(DocumentStoreError::InvalidArgument(
                "page numbers start at 1".to_string(),
            ));
        }

        Ok(Window::new((self.page - 1).saturating_mul(self.per_page), self.per_page))
    }

    /// Wraps the items fetched for this page together with the total match count.
    pub fn page<T>(&self, items: Vec<T>, count: u64) -> Page<T> {
        let end = self
            .page
            .saturating_mul(self.per_page);

        Page::builder(items)
            .with_count(count)
            .with_next_page((end < count).then_some(self.page + 1))
            .with_previous_page((self.page > 1).then(|| self.page - 1))
            .build()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

/// Builder for [`PaginationParams`]. Unset values default to page 1, 10 per page.
#[derive(Default)]
pub struct PaginationParamsBuilder {
    page: Option<u64>,
    per_page: Option<u64>,
}

impl PaginationParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_per_page(mut self, per_page: u64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn build(self) -> PaginationParams {
        PaginationParams {
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_takes_fifty() {
        assert_eq!(Window::default(), Window::new(0, 50));
    }

    #[test]
    fn page_params_map_to_window() {
        assert_eq!(PaginationParams::new(3, 20).window().unwrap(), Window::new(40, 20));
        assert!(matches!(
            PaginationParams::new(0, 20).window(),
            Err(DocumentStoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn page_links() {
        let params = PaginationParams::new(2, 10);
        let page = params.page(vec![0; 10], 25);

        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));

        let last = PaginationParams::new(3, 10).page(vec![0; 5], 25);
        assert_eq!(last.next_page, None);
    }
}
