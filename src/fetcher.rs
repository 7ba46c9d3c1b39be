//! Record fetcher - drains the remote database's pagination
//!
//! Pagination is inherently sequential (every request needs the cursor from
//! the previous response), so this stage runs on a single task. A short
//! pacing sleep between pages keeps the request rate under the remote
//! service's limit; it is best-effort, not a guarantee.

use std::time::Duration;

use crate::record::Record;
use crate::record_store::{RecordStore, RemoteError};

/// Fetch every record of the database, in remote listing order.
///
/// Any page failure aborts the fetch - a partial record set would roll up to
/// wrong totals.
pub async fn fetch_all(
    store: &dyn RecordStore,
    pacing: Duration,
) -> Result<Vec<Record>, RemoteError> {
    let mut all_records = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = store.query_page(cursor.as_deref()).await?;
        all_records.extend(page.records);

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }

        tokio::time::sleep(pacing).await;
    }

    log::debug!("Fetched {} records", all_records.len());
    Ok(all_records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::RecordPage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves a fixed sequence of pages and records the cursors it was asked
    /// for.
    struct PagedStore {
        pages: Vec<RecordPage>,
        seen_cursors: Mutex<Vec<Option<String>>>,
        fail_on_page: Option<usize>,
    }

    impl PagedStore {
        fn new(pages: Vec<RecordPage>) -> Self {
            Self {
                pages,
                seen_cursors: Mutex::new(Vec::new()),
                fail_on_page: None,
            }
        }
    }

    #[async_trait]
    impl RecordStore for PagedStore {
        async fn query_page(&self, cursor: Option<&str>) -> Result<RecordPage, RemoteError> {
            let mut seen = self.seen_cursors.lock().unwrap();
            let page_no = seen.len();
            seen.push(cursor.map(|c| c.to_string()));

            if self.fail_on_page == Some(page_no) {
                return Err(RemoteError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }

            Ok(self.pages[page_no].clone())
        }

        async fn update_estimate(&self, _record_id: &str, _total: f64) -> Result<(), RemoteError> {
            unreachable!("fetcher never writes");
        }
    }

    fn leaf(id: &str) -> Record {
        Record {
            id: id.to_string(),
            estimate: Some(1.0),
            child_ids: Vec::new(),
        }
    }

    fn page(ids: &[&str], next_cursor: Option<&str>) -> RecordPage {
        RecordPage {
            records: ids.iter().map(|id| leaf(id)).collect(),
            next_cursor: next_cursor.map(|c| c.to_string()),
        }
    }

    #[tokio::test]
    async fn test_fetch_drains_all_pages_in_order() {
        let store = PagedStore::new(vec![
            page(&["a", "b"], Some("cursor-1")),
            page(&["c"], Some("cursor-2")),
            page(&["d"], None),
        ]);

        let records = fetch_all(&store, Duration::from_millis(0)).await.unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);

        let cursors = store.seen_cursors.lock().unwrap();
        assert_eq!(
            *cursors,
            vec![
                None,
                Some("cursor-1".to_string()),
                Some("cursor-2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_single_page_needs_one_request() {
        let store = PagedStore::new(vec![page(&["only"], None)]);

        let records = fetch_all(&store, Duration::from_millis(0)).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(store.seen_cursors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_page_failure_propagates() {
        let mut store = PagedStore::new(vec![
            page(&["a"], Some("cursor-1")),
            page(&["b"], None),
        ]);
        store.fail_on_page = Some(1);

        let result = fetch_all(&store, Duration::from_millis(0)).await;

        assert!(matches!(result, Err(RemoteError::Api { status: 500, .. })));
    }
}
