//! Lazy, offset-paginated listing of a year's completed signatures.
//!
//! [`SignatureLister::records`] yields records one by one and fetches the next
//! page only once the previous one has been consumed. Pagination stops at the
//! first page shorter than the page size. The stream is forward-only: calling
//! `records` again starts over from offset 0.

use futures_util::stream::{self, Stream, TryStreamExt};
use tracing::{debug, instrument};

use crate::api::{ApiError, SignatureApi, SignatureRecord};
use crate::config::DateRange;
use crate::download::RetryExecutor;

/// Paginates the listing endpoint for one date range.
#[derive(Clone, Copy)]
pub struct SignatureLister<'a> {
    api: &'a dyn SignatureApi,
    executor: &'a RetryExecutor,
    range: DateRange,
    page_size: usize,
}

struct PageCursor<'a> {
    lister: SignatureLister<'a>,
    offset: usize,
    exhausted: bool,
}

impl<'a> SignatureLister<'a> {
    /// Creates a lister. `page_size` is clamped to at least 1.
    #[must_use]
    pub fn new(
        api: &'a dyn SignatureApi,
        executor: &'a RetryExecutor,
        range: DateRange,
        page_size: usize,
    ) -> Self {
        Self {
            api,
            executor,
            range,
            page_size: page_size.max(1),
        }
    }

    /// Fetches the page starting at `offset`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last [`ApiError`] once retries are exhausted or the
    /// failure is not retryable.
    #[instrument(skip(self), fields(page_size = self.page_size))]
    pub async fn fetch_page(&self, offset: usize) -> Result<Vec<SignatureRecord>, ApiError> {
        let page = self
            .executor
            .execute("list_signatures", || {
                self.api
                    .list_signatures(&self.range, self.page_size, offset)
            })
            .await?;
        debug!(offset, records = page.len(), "fetched listing page");
        Ok(page)
    }

    /// Returns the records of every page as one lazy stream.
    ///
    /// The first error ends the stream.
    pub fn records(self) -> impl Stream<Item = Result<SignatureRecord, ApiError>> + 'a {
        let cursor = PageCursor {
            lister: self,
            offset: 0,
            exhausted: false,
        };

        stream::try_unfold(cursor, |mut cursor| async move {
            if cursor.exhausted {
                return Ok::<_, ApiError>(None);
            }
            let page = cursor.lister.fetch_page(cursor.offset).await?;
            if page.len() < cursor.lister.page_size {
                cursor.exhausted = true;
            }
            if page.is_empty() {
                return Ok(None);
            }
            cursor.offset += cursor.lister.page_size;
            Ok(Some((page, cursor)))
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, ApiError>)))
        .try_flatten()
    }
}
