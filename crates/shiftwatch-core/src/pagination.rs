//! Pagination of ranked listings
//!
//! Pages are 1-based. The footer text `Page X/Y` is the only navigation
//! state a rendered view carries, so a cursor can be rebuilt from it.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One page of a ranked list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView<'a, T> {
    pub items: &'a [T],
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// Index of `items[0]` in the full list
    pub offset: usize,
}

/// Slice `items` to the requested page.
///
/// The page is clamped into `1..=total_pages`, and an empty list still has
/// one (empty) page. A zero page size is treated as one.
pub fn paginate<T>(items: &[T], page_size: usize, page: usize) -> PageView<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let offset = ((page - 1) * page_size).min(items.len());
    let end = (page * page_size).min(items.len());

    PageView {
        items: &items[offset..end],
        page,
        total_pages,
        total_items: items.len(),
        offset,
    }
}

impl<'a, T> PageView<'a, T> {
    /// Nothing to show; render the empty state instead of a list
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first_enabled(&self) -> bool {
        self.page > 1
    }

    pub fn prev_enabled(&self) -> bool {
        self.page > 1
    }

    pub fn next_enabled(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn last_enabled(&self) -> bool {
        self.page < self.total_pages
    }

    /// Items with their 1-based rank in the full list
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &'a T)> + '_ {
        let offset = self.offset;
        self.items
            .iter()
            .enumerate()
            .map(move |(i, item)| (offset + i + 1, item))
    }

    pub fn cursor(&self) -> PageCursor {
        PageCursor {
            page: self.page,
            total_pages: self.total_pages,
        }
    }

    pub fn footer(&self) -> String {
        self.cursor().to_string()
    }
}

/// Navigation buttons under a paginated view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavAction {
    First,
    Prev,
    Next,
    Last,
}

impl FromStr for NavAction {
    type Err = ParseNavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(NavAction::First),
            "prev" | "previous" => Ok(NavAction::Prev),
            "next" => Ok(NavAction::Next),
            "last" => Ok(NavAction::Last),
            _ => Err(ParseNavError::UnknownAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseNavError {
    #[error("Unknown navigation action: {0}")]
    UnknownAction(String),

    #[error("Not a page footer: {0:?}")]
    InvalidFooter(String),
}

/// Position within a paginated view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: usize,
    pub total_pages: usize,
}

impl PageCursor {
    pub fn new(page: usize, total_pages: usize) -> Self {
        let total_pages = total_pages.max(1);
        Self {
            page: page.clamp(1, total_pages),
            total_pages,
        }
    }

    /// Target page for `action`, or None when it would not change the page
    pub fn navigate(&self, action: NavAction) -> Option<usize> {
        let target = match action {
            NavAction::First => 1,
            NavAction::Prev => self.page.saturating_sub(1).max(1),
            NavAction::Next => (self.page + 1).min(self.total_pages),
            NavAction::Last => self.total_pages,
        };
        (target != self.page).then_some(target)
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page {}/{}", self.page, self.total_pages)
    }
}

impl FromStr for PageCursor {
    type Err = ParseNavError;

    /// Parse the `Page X/Y` footer, ignoring text around it
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseNavError::InvalidFooter(s.to_string());

        let rest = s.split_once("Page ").map(|(_, rest)| rest).ok_or_else(invalid)?;
        let (page, total) = rest.split_once('/').ok_or_else(invalid)?;
        let total: String = total.trim_start().chars().take_while(char::is_ascii_digit).collect();

        let page: usize = page.trim().parse().map_err(|_| invalid())?;
        let total_pages: usize = total.parse().map_err(|_| invalid())?;
        if page == 0 || total_pages == 0 || page > total_pages {
            return Err(invalid());
        }

        Ok(Self { page, total_pages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slices_pages() {
        let items: Vec<u32> = (1..=25).collect();

        let first = paginate(&items, 10, 1);
        assert_eq!(first.items, &items[0..10]);
        assert_eq!(first.total_pages, 3);
        assert!(!first.prev_enabled() && !first.first_enabled());
        assert!(first.next_enabled() && first.last_enabled());

        let last = paginate(&items, 10, 3);
        assert_eq!(last.items, &[21, 22, 23, 24, 25]);
        assert!(last.prev_enabled());
        assert!(!last.next_enabled() && !last.last_enabled());
        assert_eq!(last.footer(), "Page 3/3");
    }

    #[test]
    fn test_twenty_three_items_in_pages_of_five() {
        let items: Vec<u32> = (1..=23).collect();

        let first = paginate(&items, 5, 1);
        assert_eq!(first.total_pages, 5);
        assert!(!first.first_enabled() && !first.prev_enabled());
        assert!(first.next_enabled() && first.last_enabled());

        let last = paginate(&items, 5, 5);
        assert_eq!(last.items, &[21, 22, 23]);
        assert!(last.first_enabled() && last.prev_enabled());
        assert!(!last.next_enabled() && !last.last_enabled());

        assert_eq!(PageCursor::new(5, 5).navigate(NavAction::Next), None);
        assert_eq!(PageCursor::new(5, 5).navigate(NavAction::Prev), Some(4));
    }

    #[test]
    fn test_ranks_continue_across_pages() {
        let items = vec!["a", "b", "c", "d", "e"];
        let page = paginate(&items, 2, 2);
        let ranked: Vec<(usize, &&str)> = page.ranked().collect();
        assert_eq!(ranked, vec![(3, &"c"), (4, &"d")]);
    }

    #[test]
    fn test_out_of_range_page_is_clamped() {
        let items: Vec<u32> = (1..=5).collect();
        assert_eq!(paginate(&items, 2, 99).page, 3);
        assert_eq!(paginate(&items, 2, 0).page, 1);
    }

    #[test]
    fn test_empty_list_has_one_empty_page() {
        let items: Vec<u32> = Vec::new();
        let view = paginate(&items, 10, 1);
        assert!(view.is_empty());
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.footer(), "Page 1/1");
        assert!(!view.next_enabled() && !view.prev_enabled());
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_page() {
        let items: Vec<u32> = (1..=20).collect();
        assert_eq!(paginate(&items, 10, 1).total_pages, 2);
    }

    #[test]
    fn test_navigation() {
        let cursor = PageCursor::new(2, 4);
        assert_eq!(cursor.navigate(NavAction::First), Some(1));
        assert_eq!(cursor.navigate(NavAction::Prev), Some(1));
        assert_eq!(cursor.navigate(NavAction::Next), Some(3));
        assert_eq!(cursor.navigate(NavAction::Last), Some(4));

        let first = PageCursor::new(1, 4);
        assert_eq!(first.navigate(NavAction::Prev), None);
        assert_eq!(first.navigate(NavAction::First), None);

        let only = PageCursor::new(1, 1);
        assert_eq!(only.navigate(NavAction::Next), None);
        assert_eq!(only.navigate(NavAction::Last), None);
    }

    #[test]
    fn test_footer_round_trip() {
        let cursor = PageCursor::new(3, 7);
        let parsed: PageCursor = cursor.to_string().parse().unwrap();
        assert_eq!(parsed, cursor);

        let embedded: PageCursor = "Top pilots • Page 2/5 • updated hourly".parse().unwrap();
        assert_eq!(embedded, PageCursor::new(2, 5));

        assert!("Page 0/3".parse::<PageCursor>().is_err());
        assert!("Page 4/3".parse::<PageCursor>().is_err());
        assert!("no footer here".parse::<PageCursor>().is_err());
    }

    #[test]
    fn test_nav_action_names() {
        assert_eq!("next".parse::<NavAction>(), Ok(NavAction::Next));
        assert_eq!("Previous".parse::<NavAction>(), Ok(NavAction::Prev));
        assert!("jump".parse::<NavAction>().is_err());
    }
}
