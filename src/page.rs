use async_trait::async_trait;

use crate::error::Result;
use crate::tracker::retry::retry_fetch;

/// One fixed-size chunk of a remote collection.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
        }
    }
}

/// A remote collection fetched in fixed-size chunks.
///
/// `fetch_page` must be a pure function of `(self, page_index, page_size)`:
/// no hidden cursor state, so a caller can move forward and backward over the
/// same source and see consistent pages for a fixed remote state.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Fetch the 0-based `page_index`. A failed fetch propagates as
    /// `Error::Fetch`; there is no partial silent success.
    async fn fetch_page(&self, page_index: usize, page_size: usize) -> Result<Page<Self::Item>>;
}

/// Forward/backward pager over a `PageSource`, used by browsing callers.
///
/// The cursor only tracks the current index; every page it hands out comes
/// straight from the source, so `next`/`prev` are deterministic.
pub struct PageCursor<S: PageSource> {
    source: S,
    page_size: usize,
    page_index: usize,
}

impl<S: PageSource> PageCursor<S> {
    pub fn new(source: S, page_size: usize) -> Self {
        Self {
            source,
            page_size,
            page_index: 0,
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Fetch the page at the current index without moving.
    pub async fn current(&self) -> Result<Page<S::Item>> {
        self.source.fetch_page(self.page_index, self.page_size).await
    }

    /// Advance one page and fetch it.
    pub async fn next(&mut self) -> Result<Page<S::Item>> {
        self.page_index += 1;
        self.current().await
    }

    /// Step back one page (saturating at the first page) and fetch it.
    pub async fn prev(&mut self) -> Result<Page<S::Item>> {
        self.page_index = self.page_index.saturating_sub(1);
        self.current().await
    }
}

/// Drain every page of a source into one vector, retrying each page fetch up
/// to `max_retries` times.
///
/// Pagination is followed until the source reports no further pages. Callers
/// that merge multiple streams rely on this never terminating early: a later
/// page may hold an earlier-still-relevant item when the source's ordering is
/// only approximately chronological.
pub async fn fetch_all<S: PageSource>(
    source: &S,
    page_size: usize,
    max_retries: u32,
) -> Result<Vec<S::Item>> {
    let mut items = Vec::new();
    let mut page_index = 0;
    loop {
        let page = retry_fetch!(source.fetch_page(page_index, page_size), max_retries)?;
        let empty = page.items.is_empty();
        items.extend(page.items);
        if !page.has_more || empty {
            break;
        }
        page_index += 1;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves the numbers 0..total in fixed-size pages.
    struct Numbers {
        total: usize,
        fail_page: Option<usize>,
        calls: AtomicU32,
    }

    impl Numbers {
        fn new(total: usize) -> Self {
            Self {
                total,
                fail_page: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for Numbers {
        type Item = usize;

        async fn fetch_page(&self, page_index: usize, page_size: usize) -> Result<Page<usize>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_page == Some(page_index) {
                return Err(Error::Fetch("boom".into()));
            }
            let start = page_index * page_size;
            let end = (start + page_size).min(self.total);
            let items = (start..end).collect();
            Ok(Page {
                items,
                has_more: end < self.total,
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_all_drains_every_page() {
        let source = Numbers::new(10);
        let items = fetch_all(&source, 4, 0).await.unwrap();
        assert_eq!(items, (0..10).collect::<Vec<_>>());
        // Pages of 4: [0..4), [4..8), [8..10)
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_empty_source() {
        let source = Numbers::new(0);
        let items = fetch_all(&source, 4, 0).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_propagates_failure() {
        let mut source = Numbers::new(10);
        source.fail_page = Some(1);
        let err = fetch_all(&source, 4, 0).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[tokio::test]
    async fn test_cursor_moves_forward_and_backward() {
        let mut cursor = PageCursor::new(Numbers::new(10), 4);
        assert_eq!(cursor.current().await.unwrap().items, vec![0, 1, 2, 3]);
        assert_eq!(cursor.next().await.unwrap().items, vec![4, 5, 6, 7]);
        assert_eq!(cursor.next().await.unwrap().items, vec![8, 9]);
        assert_eq!(cursor.prev().await.unwrap().items, vec![4, 5, 6, 7]);
        assert_eq!(cursor.prev().await.unwrap().items, vec![0, 1, 2, 3]);
        // Saturates at the first page
        assert_eq!(cursor.prev().await.unwrap().items, vec![0, 1, 2, 3]);
        assert_eq!(cursor.page_index(), 0);
    }

    #[tokio::test]
    async fn test_cursor_is_deterministic() {
        let mut cursor = PageCursor::new(Numbers::new(9), 4);
        let first = cursor.current().await.unwrap().items;
        cursor.next().await.unwrap();
        cursor.prev().await.unwrap();
        assert_eq!(cursor.current().await.unwrap().items, first);
    }
}
