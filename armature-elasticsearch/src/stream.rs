//! Streamed search results over a scroll context.

use crate::error::{ElasticsearchError, Result};
use crate::hits::{SearchHit, SearchHits};
use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Engine-side cursor producing successive batches of hits.
#[async_trait]
pub trait ScrollCursor<T>: Send {
    /// Fetch the next batch. An empty batch ends the scroll.
    async fn next_batch(&mut self) -> Result<SearchHits<T>>;

    /// Release the engine-side context.
    async fn close(&mut self) -> Result<()>;
}

/// Lazily fetched hits of a scrolled search.
///
/// The engine keeps the scroll context open until [`close`] is awaited or
/// its keep-alive expires. Dropping an unclosed iterator logs a warning.
///
/// [`close`]: SearchHitsIterator::close
pub struct SearchHitsIterator<T> {
    cursor: Box<dyn ScrollCursor<T>>,
    buffer: VecDeque<SearchHit<T>>,
    total_hits: u64,
    max_results: Option<usize>,
    delivered: usize,
    exhausted: bool,
    closed: bool,
}

impl<T: Send + 'static> SearchHitsIterator<T> {
    /// Start iterating with the first batch already fetched.
    pub fn new(
        first: SearchHits<T>,
        cursor: Box<dyn ScrollCursor<T>>,
        max_results: Option<usize>,
    ) -> Self {
        Self {
            cursor,
            exhausted: first.search_hits.is_empty(),
            total_hits: first.total_hits,
            buffer: first.search_hits.into(),
            max_results,
            delivered: 0,
            closed: false,
        }
    }

    /// Total number of matches reported by the engine.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Next hit, fetching a new batch when the buffer runs dry.
    pub async fn next(&mut self) -> Result<Option<SearchHit<T>>> {
        if self.max_results.is_some_and(|max| self.delivered >= max) {
            return Ok(None);
        }

        if self.buffer.is_empty() && !self.exhausted && !self.closed {
            let batch = self.cursor.next_batch().await?;
            debug!(batch = batch.search_hits.len(), "fetched scroll batch");
            if batch.search_hits.is_empty() {
                self.exhausted = true;
            }
            self.buffer.extend(batch.search_hits);
        }

        let hit = self.buffer.pop_front();
        if hit.is_some() {
            self.delivered += 1;
        }
        Ok(hit)
    }

    /// Collect the remaining hits and close the cursor.
    pub async fn collect_all(mut self) -> Result<Vec<SearchHit<T>>> {
        let mut hits = Vec::new();
        while let Some(hit) = self.next().await? {
            hits.push(hit);
        }
        self.close().await?;
        Ok(hits)
    }

    /// Release the engine-side context. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.buffer.clear();
            self.cursor.close().await?;
        }
        Ok(())
    }

    /// Turn into a stream. The cursor is closed after the last hit.
    pub fn into_stream(self) -> impl Stream<Item = Result<SearchHit<T>>> + Send {
        stream::try_unfold(self, |mut iter| async move {
            match iter.next().await? {
                Some(hit) => Ok::<_, ElasticsearchError>(Some((hit, iter))),
                None => {
                    iter.close().await?;
                    Ok(None)
                }
            }
        })
    }
}

impl<T> Drop for SearchHitsIterator<T> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                delivered = self.delivered,
                "search hits iterator dropped without close; scroll context stays open until it expires"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct VecCursor {
        batches: VecDeque<Vec<u32>>,
        closed: Arc<AtomicBool>,
    }

    fn hits(values: Vec<u32>) -> SearchHits<u32> {
        let mut hits = SearchHits::empty();
        hits.total_hits = 5;
        hits.search_hits = values
            .into_iter()
            .map(|v| SearchHit {
                id: v.to_string(),
                index: "numbers".into(),
                score: None,
                sort_values: Vec::new(),
                highlight_fields: Default::default(),
                routing: None,
                version: None,
                seq_no: None,
                primary_term: None,
                matched_queries: Vec::new(),
                content: v,
            })
            .collect();
        hits
    }

    #[async_trait]
    impl ScrollCursor<u32> for VecCursor {
        async fn next_batch(&mut self) -> Result<SearchHits<u32>> {
            Ok(hits(self.batches.pop_front().unwrap_or_default()))
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn iterator(max_results: Option<usize>) -> (SearchHitsIterator<u32>, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let cursor = VecCursor {
            batches: VecDeque::from(vec![vec![3, 4], vec![5]]),
            closed: closed.clone(),
        };
        (
            SearchHitsIterator::new(hits(vec![1, 2]), Box::new(cursor), max_results),
            closed,
        )
    }

    #[tokio::test]
    async fn test_iterates_all_batches() {
        let (iter, closed) = iterator(None);
        assert_eq!(iter.total_hits(), 5);

        let values: Vec<u32> = iter
            .collect_all()
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.content)
            .collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_max_results_cap() {
        let (mut iter, _) = iterator(Some(3));
        let mut seen = Vec::new();
        while let Some(hit) = iter.next().await.unwrap() {
            seen.push(hit.content);
        }
        iter.close().await.unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stream_closes_cursor() {
        let (iter, closed) = iterator(None);
        let values: Vec<u32> = iter
            .into_stream()
            .map_ok(|h| h.content)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(values.len(), 5);
        assert!(closed.load(Ordering::SeqCst));
    }
}
