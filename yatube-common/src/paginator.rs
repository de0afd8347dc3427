//! Splitting ordered listings into fixed-size pages.
//!
//! Page numbers coming from a request are never an error: anything that is
//! not a number selects the first page, and numbers outside the valid range
//! are clamped to the closest existing page.

use serde::{Deserialize, Serialize};
use std::num::{IntErrorKind, NonZeroU64};

/// Posts shown per listing page.
pub const POSTS_PER_PAGE: NonZeroU64 = NonZeroU64::new(10).unwrap();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Paginator {
    count: u64,
    per_page: NonZeroU64,
}

/// One slice of a listing together with its position among all pages.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Paginator {
    #[must_use]
    pub fn new(count: u64, per_page: NonZeroU64) -> Self {
        Self { count, per_page }
    }

    #[must_use]
    pub fn count(self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn per_page(self) -> u64 {
        self.per_page.get()
    }

    /// At least one page, even for an empty listing.
    #[must_use]
    pub fn num_pages(self) -> u64 {
        self.count.div_ceil(self.per_page.get()).max(1)
    }

    #[must_use]
    pub fn page_number(self, requested: Option<&str>) -> u64 {
        let Some(requested) = requested else {
            return 1;
        };

        match requested.trim().parse::<i64>() {
            Ok(number) => u64::try_from(number)
                .unwrap_or(0)
                .clamp(1, self.num_pages()),
            Err(err) if *err.kind() == IntErrorKind::PosOverflow => self.num_pages(),
            Err(_) => 1,
        }
    }

    /// Index of the first item on page `number`.
    #[must_use]
    pub fn offset(self, number: u64) -> u64 {
        (number.clamp(1, self.num_pages()) - 1) * self.per_page.get()
    }

    /// Wraps the already sliced `items` of page `number`.
    #[must_use]
    pub fn page<T>(self, number: u64, items: Vec<T>) -> Page<T> {
        let number = number.clamp(1, self.num_pages());

        Page {
            items,
            number,
            num_pages: self.num_pages(),
            count: self.count,
            has_next: number < self.num_pages(),
            has_previous: number > 1,
        }
    }

    /// Picks the requested page out of a listing held in memory.
    #[must_use]
    pub fn paginate<T>(items: Vec<T>, per_page: NonZeroU64, requested: Option<&str>) -> Page<T> {
        let paginator = Self::new(items.len() as u64, per_page);
        let number = paginator.page_number(requested);
        let offset = usize::try_from(paginator.offset(number)).unwrap_or(usize::MAX);
        let per_page = usize::try_from(paginator.per_page()).unwrap_or(usize::MAX);

        let items = items.into_iter().skip(offset).take(per_page).collect();
        paginator.page(number, items)
    }
}
