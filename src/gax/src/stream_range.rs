// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Convert paginated list RPCs into a stream of items.
//!
//! List RPCs, as defined by [AIP-158], return one page of results at a time,
//! and a token to fetch the next page. A [StreamRange] hides the pages: the
//! application iterates over the items, and the range fetches more pages as
//! needed.
//!
//! [AIP-158]: https://google.aip.dev/158

use crate::Result;
use futures::stream::unfold;
use futures::{Stream, StreamExt};
use pin_project::pin_project;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

/// Describes a list response that can feed a [StreamRange].
pub trait PageableResponse {
    type PageItem: Send;

    /// Consumes the response, returning the items in this page.
    fn items(self) -> Vec<Self::PageItem>;

    /// The token to fetch the next page, empty for the last page.
    fn next_page_token(&self) -> String;
}

/// A forward-only, single-pass stream over the items of a paginated list RPC.
///
/// The range fetches pages lazily, one at a time, when the application
/// consumes all the items in the previous page. Items are returned in the
/// order provided by the service.
///
/// If fetching a page fails the range yields the error and ends. Once the
/// range ends it keeps returning `None`, it never fetches pages again.
///
/// # Example
/// ```
/// # use gcloud_gax::stream_range::*;
/// # use gcloud_gax::Result;
/// struct Page { items: Vec<String>, next_page_token: String }
/// impl PageableResponse for Page {
///     type PageItem = String;
///     fn items(self) -> Vec<String> { self.items }
///     fn next_page_token(&self) -> String { self.next_page_token.clone() }
/// }
/// # tokio_test::block_on(async {
/// let mut range = StreamRange::new(String::new(), |token: String| async move {
///     let (items, next_page_token) = match token.as_str() {
///         "" => (vec!["a".to_string(), "b".to_string()], "page-2".to_string()),
///         _ => (vec!["c".to_string()], String::new()),
///     };
///     Ok(Page { items, next_page_token })
/// });
/// let mut names = Vec::new();
/// while let Some(item) = range.next().await {
///     names.push(item?);
/// }
/// assert_eq!(names, ["a", "b", "c"]);
/// # Result::<()>::Ok(()) });
/// ```
#[pin_project]
pub struct StreamRange<T> {
    #[pin]
    stream: Pin<Box<dyn Stream<Item = Result<T>> + Send>>,
}

struct State<T, F> {
    fetch: F,
    buffer: VecDeque<T>,
    next_page_token: Option<String>,
    page_count: usize,
}

impl<T> StreamRange<T>
where
    T: Send + 'static,
{
    /// Creates a new range.
    ///
    /// # Parameters
    /// * `seed_token` - the page token for the first request, typically empty.
    /// * `fetch` - fetches the page for a given token. This should include
    ///   any retry loop for the request.
    pub fn new<F, Fut, R>(seed_token: String, fetch: F) -> Self
    where
        F: FnMut(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: PageableResponse<PageItem = T>,
    {
        let state = State {
            fetch,
            buffer: VecDeque::new(),
            next_page_token: Some(seed_token),
            page_count: 0,
        };
        let stream = unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.buffer.pop_front() {
                    return Some((Ok(item), state));
                }
                let token = state.next_page_token.take()?;
                state.page_count += 1;
                tracing::debug!(page_count = state.page_count, "fetching next page");
                match (state.fetch)(token).await {
                    Ok(page) => {
                        let token = page.next_page_token();
                        state.next_page_token = (!token.is_empty()).then_some(token);
                        state.buffer = page.items().into();
                    }
                    Err(e) => {
                        tracing::debug!(page_count = state.page_count, "page fetch failed: {e}");
                        return Some((Err(e), state));
                    }
                }
            }
        });
        Self {
            stream: Box::pin(stream.fuse()),
        }
    }

    /// Returns the next item in the range.
    pub fn next(&mut self) -> futures::stream::Next<'_, Self> {
        StreamExt::next(self)
    }
}

impl<T> Stream for StreamRange<T> {
    type Item = Result<T>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.project().stream.poll_next(cx)
    }
}

impl<T> std::fmt::Debug for StreamRange<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRange").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct TestPage {
        items: Vec<&'static str>,
        next_page_token: &'static str,
    }

    impl PageableResponse for TestPage {
        type PageItem = &'static str;
        fn items(self) -> Vec<&'static str> {
            self.items
        }
        fn next_page_token(&self) -> String {
            self.next_page_token.to_string()
        }
    }

    type Responses = Arc<Mutex<VecDeque<(String, Result<TestPage>)>>>;

    // Returns a fetch function that verifies the tokens and counts the calls.
    fn fake_fetch(
        responses: Vec<(&'static str, Result<TestPage>)>,
        count: Arc<AtomicUsize>,
    ) -> impl FnMut(String) -> std::future::Ready<Result<TestPage>> + Send + 'static {
        let responses: Responses = Arc::new(Mutex::new(
            responses
                .into_iter()
                .map(|(t, r)| (t.to_string(), r))
                .collect(),
        ));
        move |token| {
            count.fetch_add(1, Ordering::SeqCst);
            let (want, response) = responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("too many page fetches");
            assert_eq!(token, want);
            std::future::ready(response)
        }
    }

    fn page(items: Vec<&'static str>, next_page_token: &'static str) -> Result<TestPage> {
        Ok(TestPage {
            items,
            next_page_token,
        })
    }

    #[tokio::test]
    async fn flattens_pages() -> anyhow::Result<()> {
        let count = Arc::new(AtomicUsize::new(0));
        let fetch = fake_fetch(
            vec![
                ("", page(vec!["a", "b"], "t1")),
                ("t1", page(vec!["c"], "t2")),
                ("t2", page(vec![], "")),
            ],
            count.clone(),
        );
        let mut range = StreamRange::new(String::new(), fetch);
        let mut got = Vec::new();
        while let Some(item) = range.next().await {
            got.push(item?);
        }
        assert_eq!(got, ["a", "b", "c"]);
        assert_eq!(count.load(Ordering::SeqCst), 3);

        // The range is single-pass.
        assert!(range.next().await.is_none());
        assert!(range.next().await.is_none());
        assert_eq!(count.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn fetches_lazily() -> anyhow::Result<()> {
        let count = Arc::new(AtomicUsize::new(0));
        let fetch = fake_fetch(
            vec![
                ("", page(vec!["a", "b"], "t1")),
                ("t1", page(vec!["c"], "")),
            ],
            count.clone(),
        );
        let mut range = StreamRange::new(String::new(), fetch);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(range.next().await.transpose()?, Some("a"));
        assert_eq!(range.next().await.transpose()?, Some("b"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(range.next().await.transpose()?, Some("c"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(range.next().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn skips_empty_pages() -> anyhow::Result<()> {
        let count = Arc::new(AtomicUsize::new(0));
        let fetch = fake_fetch(
            vec![
                ("start", page(vec![], "t1")),
                ("t1", page(vec![], "t2")),
                ("t2", page(vec!["a"], "")),
            ],
            count.clone(),
        );
        let range = StreamRange::new("start".to_string(), fetch);
        let got = range.collect::<Vec<_>>().await;
        assert_eq!(got.len(), 1);
        assert!(matches!(got[0], Ok("a")), "{got:?}");
        assert_eq!(count.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn error_ends_range() {
        let count = Arc::new(AtomicUsize::new(0));
        let fetch = fake_fetch(
            vec![
                ("", page(vec!["a"], "t1")),
                ("t1", Err(Error::other("simulated failure"))),
            ],
            count.clone(),
        );
        let mut range = StreamRange::new(String::new(), fetch);
        assert!(matches!(range.next().await, Some(Ok("a"))));
        let err = range.next().await;
        assert!(matches!(&err, Some(Err(e)) if e.to_string().contains("simulated failure")), "{err:?}");
        assert!(range.next().await.is_none());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn send() {
        static_assertions::assert_impl_all!(StreamRange<String>: Send, Unpin);
    }
}
