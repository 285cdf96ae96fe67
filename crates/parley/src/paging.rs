//! Continuation-token pagination.

use std::collections::HashSet;
use std::future::Future;

use parley_protocol::ProtocolError;

use crate::ParleyError;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` or empty means this was the last.
    pub next_token: Option<String>,
}

/// Anything that can fetch a page given the previous page's cursor.
pub trait PageSource<T>: Sync {
    fn fetch_page(
        &self,
        token: Option<&str>,
    ) -> impl Future<Output = Result<Page<T>, ParleyError>> + Send;
}

/// Fetches pages starting at `first_token` until a page comes back without
/// a cursor, and returns every item in arrival order.
///
/// # Errors
/// Propagates the first fetch error. A cursor that was already requested is
/// reported as `ProtocolError::InvalidMessage` instead of looping forever.
pub async fn collect_pages<T, S>(
    source: &S,
    first_token: Option<String>,
) -> Result<Vec<T>, ParleyError>
where
    S: PageSource<T>,
{
    let mut items = Vec::new();
    let mut requested = HashSet::new();
    let mut token = first_token.filter(|t| !t.is_empty());

    loop {
        if let Some(t) = &token {
            if !requested.insert(t.clone()) {
                return Err(ProtocolError::InvalidMessage(format!(
                    "continuation token {t:?} repeated"
                ))
                .into());
            }
        }

        let page = source.fetch_page(token.as_deref()).await?;
        tracing::trace!(
            items = page.items.len(),
            next = ?page.next_token,
            "fetched page"
        );
        items.extend(page.items);

        match page.next_token.filter(|t| !t.is_empty()) {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Serves pages from a token → (items, next) table and logs requests.
    struct TablePages {
        pages: HashMap<Option<String>, (Vec<u32>, Option<String>)>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl TablePages {
        fn new(entries: &[(Option<&str>, &[u32], Option<&str>)]) -> Self {
            let pages = entries
                .iter()
                .map(|(token, items, next)| {
                    (
                        token.map(str::to_owned),
                        (items.to_vec(), next.map(str::to_owned)),
                    )
                })
                .collect();
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageSource<u32> for TablePages {
        async fn fetch_page(
            &self,
            token: Option<&str>,
        ) -> Result<Page<u32>, ParleyError> {
            let key = token.map(str::to_owned);
            self.requested.lock().unwrap().push(key.clone());
            let (items, next) = self
                .pages
                .get(&key)
                .cloned()
                .ok_or_else(|| ParleyError::server("no such page"))?;
            Ok(Page {
                items,
                next_token: next,
            })
        }
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_empty_token() {
        let source = TablePages::new(&[
            (Some("a"), &[1, 2], Some("b")),
            (Some("b"), &[3], Some("")),
        ]);

        let items = collect_pages(&source, Some("a".into())).await.unwrap();

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(source.requested.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_collect_pages_without_first_token_stops_on_absent_token() {
        let source = TablePages::new(&[
            (None, &[1], Some("n1")),
            (Some("n1"), &[2], None),
        ]);

        let items = collect_pages(&source, None).await.unwrap();

        assert_eq!(items, vec![1, 2]);
        assert_eq!(
            *source.requested.lock().unwrap(),
            vec![None, Some("n1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_collect_pages_repeated_token_returns_protocol_error() {
        let source = TablePages::new(&[
            (Some("a"), &[1], Some("b")),
            (Some("b"), &[2], Some("a")),
        ]);

        let result = collect_pages(&source, Some("a".into())).await;

        assert!(matches!(
            result,
            Err(ParleyError::Protocol(ProtocolError::InvalidMessage(_)))
        ));
        assert_eq!(source.requested.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_collect_pages_propagates_fetch_error() {
        let source = TablePages::new(&[(Some("a"), &[1], Some("missing"))]);
        let result = collect_pages(&source, Some("a".into())).await;
        assert!(matches!(result, Err(ParleyError::Server { .. })));
    }
}
