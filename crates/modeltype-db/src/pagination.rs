//! Pagination arithmetic.
//!
//! Provides [`Paginator`] and [`PageSlice`]. Page numbers are 1-based; for
//! `N` rows and page size `S` there are `ceil(N / S)` pages, and page `k`
//! holds rows `[(k-1)*S, k*S)` clipped to `N`.
//!
//! # Examples
//!
//! ```
//! use modeltype_db::pagination::Paginator;
//!
//! let items: Vec<i32> = (1..=100).collect();
//! let paginator = Paginator::new(items, 10);
//! assert_eq!(paginator.num_pages(), 10);
//! assert_eq!(paginator.count(), 100);
//!
//! let page = paginator.page(1).unwrap();
//! assert_eq!(page.object_list().len(), 10);
//! assert!(page.has_next());
//! assert!(!page.has_previous());
//! ```

use std::fmt;

/// Errors that can occur during pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    /// The requested page is beyond the last page.
    EmptyPage,
    /// The page number is invalid (zero).
    InvalidPage(String),
}

impl fmt::Display for PaginationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPage => write!(f, "That page contains no results"),
            Self::InvalidPage(msg) => write!(f, "Invalid page: {msg}"),
        }
    }
}

impl std::error::Error for PaginationError {}

/// Splits a collection of rows into pages.
#[derive(Debug, Clone)]
pub struct Paginator<T> {
    object_list: Vec<T>,
    per_page: usize,
}

impl<T> Paginator<T> {
    /// Creates a new `Paginator`. A page size of zero is treated as one.
    pub fn new(object_list: Vec<T>, per_page: usize) -> Self {
        Self {
            object_list,
            per_page: per_page.max(1),
        }
    }

    /// Returns the total number of objects across all pages.
    pub fn count(&self) -> usize {
        self.object_list.len()
    }

    /// Returns the page size.
    pub const fn per_page(&self) -> usize {
        self.per_page
    }

    /// Returns the total number of pages; zero when there are no objects.
    pub fn num_pages(&self) -> usize {
        self.count().div_ceil(self.per_page)
    }

    /// Returns the requested page (1-indexed).
    ///
    /// # Errors
    ///
    /// Returns `PaginationError::InvalidPage` if the page number is 0,
    /// and `PaginationError::EmptyPage` if the page is beyond the last page.
    pub fn page(self, number: usize) -> Result<PageSlice<T>, PaginationError> {
        if number == 0 {
            return Err(PaginationError::InvalidPage(
                "Page number must be >= 1".to_string(),
            ));
        }
        if number > self.num_pages() {
            return Err(PaginationError::EmptyPage);
        }
        Ok(self.slice(number))
    }

    /// Returns the requested page, clamping out-of-range numbers.
    ///
    /// A number of 0 yields the first page; a number past the end yields the
    /// last page. With no objects, page 1 is returned empty.
    pub fn get_page(self, number: usize) -> PageSlice<T> {
        let last = self.num_pages().max(1);
        self.slice(number.clamp(1, last))
    }

    fn slice(self, number: usize) -> PageSlice<T> {
        let num_pages = self.num_pages();
        let count = self.count();
        let start = ((number - 1) * self.per_page).min(count);
        let end = (start + self.per_page).min(count);
        let object_list = self
            .object_list
            .into_iter()
            .skip(start)
            .take(end - start)
            .collect();
        PageSlice {
            object_list,
            number,
            num_pages,
        }
    }
}

/// A single page of results from a [`Paginator`].
#[derive(Debug, Clone)]
pub struct PageSlice<T> {
    object_list: Vec<T>,
    number: usize,
    num_pages: usize,
}

impl<T> PageSlice<T> {
    /// Returns the items on this page.
    pub fn object_list(&self) -> &[T] {
        &self.object_list
    }

    /// Consumes the page, returning its items.
    pub fn into_object_list(self) -> Vec<T> {
        self.object_list
    }

    /// Returns the 1-based page number.
    pub const fn number(&self) -> usize {
        self.number
    }

    /// Returns `true` if there is a next page.
    pub const fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    /// Returns `true` if there is a previous page.
    pub const fn has_previous(&self) -> bool {
        self.number > 1
    }
}
