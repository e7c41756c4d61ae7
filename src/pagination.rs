//! Page-number pagination for post listings.
//!
//! Lenient about the requested page: anything that is not a number lands on
//! the first page, and a number outside `1..=num_pages` lands on the last.

use serde::Deserialize;

/// `?page=` as it arrives on listing URLs.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(total: i64, per_page: usize) -> Self {
        Self {
            total: total.max(0) as usize,
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self) -> usize {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(self.per_page)
        }
    }

    /// Resolve a raw `page` parameter to a valid 1-based page number.
    pub fn page_number(&self, raw: Option<&str>) -> usize {
        let parsed = match raw.map(str::trim) {
            None | Some("") => return 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) => n,
                Err(_) => return 1,
            },
        };

        if parsed < 1 || parsed as usize > self.num_pages() {
            self.num_pages()
        } else {
            parsed as usize
        }
    }

    /// `(limit, offset)` for the rows of `number`.
    pub fn bounds(&self, number: usize) -> (i64, i64) {
        let offset = (number.saturating_sub(1)) * self.per_page;
        (self.per_page as i64, offset as i64)
    }

    pub fn page<T>(&self, number: usize, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLink {
    pub number: usize,
    pub current: bool,
}

/// One page of a listing plus what the navigation needs.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn previous_page_number(&self) -> usize {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_page_number(&self) -> usize {
        (self.number + 1).min(self.num_pages)
    }

    pub fn links(&self) -> Vec<PageLink> {
        (1..=self.num_pages)
            .map(|number| PageLink {
                number,
                current: number == self.number,
            })
            .collect()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}
