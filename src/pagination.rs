//! Page window over the sales table.
//!
//! `PageWindow::reduce` is the only way the window changes: it takes the
//! current window, a page-change intent and the last known record count,
//! and returns the next window. The offset it produces always satisfies
//! `0 <= offset <= max(0, total - page_size)` when the total is known.

pub const DEFAULT_PAGE_SIZE: u64 = 25;

/// Page sizes offered by `+`/`-`
pub const PAGE_SIZES: [u64; 4] = [10, 25, 50, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub page_index: u64,
    pub page_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageIntent {
    Next,
    Previous,
    First,
    Last,
    Goto(u64),
    SetPageSize(u64),
}

impl PageWindow {
    pub fn new(page_size: u64) -> Self {
        Self {
            offset: 0,
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn reduce(self, intent: PageIntent, total: Option<u64>) -> Self {
        let (page_index, page_size) = match intent {
            PageIntent::Next => (self.page_index.saturating_add(1), self.page_size),
            PageIntent::Previous => (self.page_index.saturating_sub(1), self.page_size),
            PageIntent::First => (0, self.page_size),
            PageIntent::Last => match total {
                Some(total) => (last_page_index(total, self.page_size), self.page_size),
                None => (self.page_index, self.page_size),
            },
            PageIntent::Goto(index) => (index, self.page_size),
            PageIntent::SetPageSize(size) => {
                // Keep the first visible row on screen under the new size
                let size = size.max(1);
                (self.offset / size, size)
            }
        };

        Self::at(page_index, page_size, total)
    }

    /// Window for `page_index`, clamped against `total` when it is known
    fn at(page_index: u64, page_size: u64, total: Option<u64>) -> Self {
        let page_size = page_size.max(1);
        let Some(total) = total else {
            return Self {
                offset: page_index.saturating_mul(page_size),
                page_index,
                page_size,
            };
        };

        let page_index = page_index.min(last_page_index(total, page_size));
        let offset = page_index
            .saturating_mul(page_size)
            .min(max_offset(total, page_size));

        Self {
            offset,
            page_index,
            page_size,
        }
    }

    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size).max(1)
    }

    /// 1-based inclusive row range shown by this window, `None` when empty
    pub fn range(&self, total: u64) -> Option<(u64, u64)> {
        if total == 0 || self.offset >= total {
            return None;
        }
        let end = self.offset.saturating_add(self.page_size).min(total);
        Some((self.offset + 1, end))
    }

    pub fn is_first(&self) -> bool {
        self.page_index == 0
    }

    pub fn is_last(&self, total: u64) -> bool {
        self.page_index >= last_page_index(total, self.page_size)
    }

    /// Next size up (or down) in `PAGE_SIZES`, staying put at either end
    pub fn step_page_size(&self, larger: bool) -> u64 {
        if larger {
            PAGE_SIZES
                .iter()
                .copied()
                .find(|&s| s > self.page_size)
                .unwrap_or(self.page_size)
        } else {
            PAGE_SIZES
                .iter()
                .rev()
                .copied()
                .find(|&s| s < self.page_size)
                .unwrap_or(self.page_size)
        }
    }
}

fn max_offset(total: u64, page_size: u64) -> u64 {
    total.saturating_sub(page_size)
}

fn last_page_index(total: u64, page_size: u64) -> u64 {
    total.div_ceil(page_size.max(1)).saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTENTS: [PageIntent; 9] = [
        PageIntent::Next,
        PageIntent::Previous,
        PageIntent::First,
        PageIntent::Last,
        PageIntent::Goto(0),
        PageIntent::Goto(3),
        PageIntent::Goto(u64::MAX),
        PageIntent::SetPageSize(10),
        PageIntent::SetPageSize(0),
    ];

    #[test]
    fn test_page_one_of_fifty() {
        let window = PageWindow::new(25).reduce(PageIntent::Goto(1), Some(50));
        assert_eq!(window.offset, 25);
        assert_eq!(window.page_index, 1);
    }

    #[test]
    fn test_page_past_end_is_clamped() {
        let window = PageWindow::new(25).reduce(PageIntent::Goto(3), Some(50));
        assert_eq!(window.offset, 25, "offset 75 should clamp to 50 - 25");
        assert_eq!(window.page_index, 1);
    }

    #[test]
    fn test_offset_always_in_range() {
        for total in [0u64, 1, 24, 25, 26, 50, 60, 101] {
            for size in [1u64, 10, 25, 100] {
                let mut window = PageWindow::new(size);
                for intent in INTENTS.iter().chain(INTENTS.iter().rev()) {
                    window = window.reduce(*intent, Some(total));
                    assert!(
                        window.offset <= total.saturating_sub(window.page_size),
                        "offset {} out of range for total {} size {} after {:?}",
                        window.offset,
                        total,
                        window.page_size,
                        intent
                    );
                }
            }
        }
    }

    #[test]
    fn test_page_size_change_recomputes_offset() {
        let window = PageWindow::new(25).reduce(PageIntent::Goto(2), Some(200));
        assert_eq!(window.offset, 50);

        let resized = window.reduce(PageIntent::SetPageSize(10), Some(200));
        assert_eq!(resized.page_size, 10);
        assert_eq!(resized.page_index, 5);
        assert_eq!(resized.offset, 50);

        let resized = window.reduce(PageIntent::SetPageSize(100), Some(200));
        assert_eq!(resized.page_index, 0);
        assert_eq!(resized.offset, 0, "offset must be a multiple of the new size");
    }

    #[test]
    fn test_last_page_overlaps_when_size_does_not_divide() {
        let window = PageWindow::new(25).reduce(PageIntent::Last, Some(60));
        assert_eq!(window.page_index, 2);
        assert_eq!(window.offset, 35);
        assert_eq!(window.range(60), Some((36, 60)));
        assert!(window.is_last(60));

        // Next on the last page stays put
        assert_eq!(window.reduce(PageIntent::Next, Some(60)), window);
    }

    #[test]
    fn test_unknown_total_does_not_clamp() {
        let window = PageWindow::new(25).reduce(PageIntent::Next, None);
        assert_eq!(window.offset, 25);
        assert_eq!(window.reduce(PageIntent::Last, None), window);
    }

    #[test]
    fn test_previous_saturates_at_zero() {
        let window = PageWindow::new(25).reduce(PageIntent::Previous, Some(50));
        assert_eq!(window, PageWindow::new(25));
        assert!(window.is_first());
    }

    #[test]
    fn test_page_count_and_range() {
        let window = PageWindow::new(25);
        assert_eq!(window.page_count(0), 1);
        assert_eq!(window.page_count(50), 2);
        assert_eq!(window.page_count(51), 3);
        assert_eq!(window.range(0), None);
        assert_eq!(window.range(10), Some((1, 10)));
    }

    #[test]
    fn test_step_page_size() {
        let window = PageWindow::new(25);
        assert_eq!(window.step_page_size(true), 50);
        assert_eq!(window.step_page_size(false), 10);
        assert_eq!(PageWindow::new(100).step_page_size(true), 100);
        assert_eq!(PageWindow::new(10).step_page_size(false), 10);
    }
}
