//! Pagination and fan-out helpers shared by the resolver and the orchestrator.

use std::future::Future;

use futures::future::{join_all, try_join_all};
use tracing::debug;

use crate::error::CloudResult;
use crate::models::{Page, PageRequest};

/// Page size used for every listing call.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Fetch every page of a listing.
///
/// The first page is fetched alone to learn the total count; the remaining
/// pages are requested concurrently and appended in page order. The first
/// failing page fails the whole listing.
pub async fn fetch_all<T, F, Fut>(page_size: u32, fetch: F) -> CloudResult<Vec<T>>
where
    F: Fn(PageRequest) -> Fut,
    Fut: Future<Output = CloudResult<Page<T>>>,
{
    let first = fetch(PageRequest::new(1, page_size)).await?;
    let total_pages = first.total_pages(page_size);
    let mut items = first.items;

    if total_pages <= 1 {
        return Ok(items);
    }

    debug!(total_pages, "Fetching remaining pages concurrently");
    let rest = try_join_all((2..=total_pages).map(|n| fetch(PageRequest::new(n, page_size)))).await?;
    for page in rest {
        items.extend(page.items);
    }
    Ok(items)
}

/// Run one future per item concurrently and collect the outputs in input order.
///
/// The futures are polled on the calling task. Callers that must not lose
/// siblings to a single failure convert failures to data inside `task`.
pub async fn fan_out<I, F, Fut>(items: I, task: F) -> Vec<Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    join_all(items.into_iter().map(task)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fetch_all_single_page() {
        let calls = AtomicUsize::new(0);
        let all: Vec<u32> = (0..10).collect();

        let items = fetch_all(50, |req| {
            calls.fetch_add(1, Ordering::SeqCst);
            let page = Page::slice(&all, req);
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(items, all);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_many_pages_preserves_order() {
        let all: Vec<u32> = (0..23).collect();

        let items = fetch_all(5, |req| {
            let page = Page::slice(&all, req);
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(items, all);
    }

    #[tokio::test]
    async fn test_fetch_all_propagates_page_error() {
        let all: Vec<u32> = (0..12).collect();

        let result = fetch_all(5, |req| {
            let page = Page::slice(&all, req);
            async move {
                if req.number == 3 {
                    Err(CloudError::service("Throttling", "too many requests"))
                } else {
                    Ok(page)
                }
            }
        })
        .await;

        assert!(matches!(result, Err(CloudError::Service { .. })));
    }

    #[tokio::test]
    async fn test_fan_out_keeps_input_order() {
        let outputs = fan_out(vec![3u64, 1, 2], |n| async move {
            tokio::time::sleep(std::time::Duration::from_millis(n)).await;
            n * 10
        })
        .await;

        assert_eq!(outputs, vec![30, 10, 20]);
    }
}
