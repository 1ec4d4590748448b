use anyhow::Result;
use async_trait::async_trait;

/// One page of a cursor-paginated list endpoint.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub end_cursor: String,
    pub has_next: bool,
}

/// A page-fetch operation. The empty cursor requests the first page.
#[async_trait]
pub trait FetchPage {
    type Item: Send;

    async fn fetch_page(&self, cursor: &str) -> Result<Page<Self::Item>>;
}

/// Walk a paginated endpoint to completion, concatenating items in page
/// order. Iterative on purpose: the number of remote pages bounds the loop,
/// not the call stack.
pub async fn drain_pages<F>(fetcher: &F) -> Result<Vec<F::Item>>
where
    F: FetchPage + Sync,
{
    let mut all = Vec::new();
    let mut cursor = String::new();
    loop {
        let page = fetcher.fetch_page(&cursor).await?;
        all.extend(page.items);
        if !page.has_next {
            break;
        }
        cursor = page.end_cursor;
    }
    Ok(all)
}
