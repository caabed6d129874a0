//! Page bounds and navigation.

/// Number of pages needed for `total` records at `per_page` per page.
pub fn total_pages_for(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(per_page));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

pub fn is_valid_page(requested: u32, total_pages: u32) -> bool {
    requested >= 1 && requested <= total_pages
}

/// Returns the page to show after asking for `requested`; out-of-range
/// requests leave `current` untouched.
pub fn change_page(current: u32, requested: u32, total_pages: u32) -> u32 {
    if is_valid_page(requested, total_pages) {
        requested
    } else {
        current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Previous,
    Next,
    Last,
    To(u32),
}

impl PageNav {
    /// Requested target page. `Previous` from page 1 yields 0, which
    /// [`change_page`] rejects.
    pub fn target(self, current: u32, total_pages: u32) -> u32 {
        match self {
            PageNav::First => 1,
            PageNav::Previous => current.saturating_sub(1),
            PageNav::Next => current.saturating_add(1),
            PageNav::Last => total_pages,
            PageNav::To(page) => page,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl PageInfo {
    pub fn new(page: u32, per_page: u32, total: u64, total_pages: u32) -> Self {
        Self {
            page,
            per_page,
            total,
            total_pages,
        }
    }

    pub fn navigate(&self, nav: PageNav) -> u32 {
        change_page(
            self.page,
            nav.target(self.page, self.total_pages),
            self.total_pages,
        )
    }

    pub fn can_go_back(&self) -> bool {
        self.page > 1
    }

    pub fn can_go_forward(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn label(&self) -> String {
        format!("Page {} of {}", self.page, self.total_pages)
    }
}
