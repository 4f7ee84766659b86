//! Cursor-paged listing over an ordered document collection.
//!
//! [`PagedCollectionCache`] fetches fixed-size pages from a [`DocumentStore`]
//! and remembers the boundary of every page it has produced, so moving to
//! the next or previous page is a single bounded range read instead of a
//! scan from the start. Each read asks for one record more than the page
//! size; that lookahead record decides `has_next` and is dropped.
//!
//! The cursor table only ever holds a contiguous prefix: cursor `i` exists
//! only if it was read right after cursor `i - 1`. Deletions truncate the
//! table at the affected page and later pages are re-derived lazily.

mod page;

pub use page::{Page, PageError};

use futures::Stream;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::catalog::{FromDocument, Product};
use crate::store::{is_valid_order_key, Cursor, DocumentStore, OrderedQuery};

/// Page size used by the admin listing.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Field the listing is ordered by unless configured otherwise.
pub const DEFAULT_ORDER_KEY: &str = "title";

#[derive(Debug, Default)]
struct CursorTable {
  cursors: Vec<Cursor>,
  /// Index and record count of the last page handed out
  displayed: Option<(usize, usize)>,
}

impl CursorTable {
  /// Store the boundary produced by reading page `index`.
  ///
  /// A boundary that moved invalidates every cursor derived from the old
  /// one; an empty page has no boundary and ends the table.
  fn record(&mut self, index: usize, cursor: Option<Cursor>) {
    debug_assert!(index <= self.cursors.len());
    match cursor {
      Some(cursor) => {
        if self.cursors.get(index) != Some(&cursor) {
          self.cursors.truncate(index);
          self.cursors.push(cursor);
        }
      }
      None => self.cursors.truncate(index),
    }
  }
}

/// Marks a cache operation as outstanding for as long as it lives.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
  fn acquire(flag: &'a AtomicBool) -> Result<Self, PageError> {
    if flag.swap(true, Ordering::AcqRel) {
      return Err(PageError::Busy);
    }
    Ok(Self(flag))
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

/// Resumable forward/backward pagination over a sorted collection.
///
/// One cache serves one listing session. Methods take `&self`; a second
/// fetch issued while one is outstanding is refused with
/// [`PageError::Busy`] rather than queued.
pub struct PagedCollectionCache<S, R = Product> {
  store: S,
  page_size: usize,
  order_key: String,
  table: Mutex<CursorTable>,
  in_flight: AtomicBool,
  _record: PhantomData<fn() -> R>,
}

impl<S: DocumentStore, R: FromDocument> PagedCollectionCache<S, R> {
  /// Create an empty cache over `store` ordered by [`DEFAULT_ORDER_KEY`].
  ///
  /// The page size must leave room for the lookahead record.
  pub fn new(store: S, page_size: usize) -> Result<Self, PageError> {
    if page_size == 0 || page_size.checked_add(1).is_none() {
      return Err(PageError::InvalidPageSize);
    }

    Ok(Self {
      store,
      page_size,
      order_key: DEFAULT_ORDER_KEY.to_string(),
      table: Mutex::new(CursorTable::default()),
      in_flight: AtomicBool::new(false),
      _record: PhantomData,
    })
  }

  /// Order the listing by another top-level string field.
  pub fn with_order_key(mut self, key: impl Into<String>) -> Result<Self, PageError> {
    let key = key.into();
    if !is_valid_order_key(&key) {
      return Err(PageError::InvalidOrderKey(key));
    }
    self.order_key = key;
    Ok(self)
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  pub fn order_key(&self) -> &str {
    &self.order_key
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Whether a fetch or deletion is currently outstanding.
  pub fn is_loading(&self) -> bool {
    self.in_flight.load(Ordering::Acquire)
  }

  /// Number of pages whose end boundary is known.
  pub fn cursor_count(&self) -> usize {
    self.table().cursors.len()
  }

  /// Boundary recorded for page `index`, if any.
  pub fn cursor(&self, index: usize) -> Option<Cursor> {
    self.table().cursors.get(index).cloned()
  }

  /// Fetch page `page_index`.
  ///
  /// Page 0 reads from the start of the collection; any later page resumes
  /// after the boundary recorded for the page before it, which must have
  /// been fetched first. On error the cursor table is left untouched.
  pub async fn fetch_page(&self, page_index: usize) -> Result<Page<R>, PageError> {
    let _in_flight = InFlight::acquire(&self.in_flight)?;

    let after = match page_index.checked_sub(1) {
      None => None,
      Some(previous) => Some(self.table().cursors.get(previous).cloned().ok_or(
        PageError::MissingCursor {
          requested: page_index,
          missing: previous,
        },
      )?),
    };

    let query = OrderedQuery {
      key: &self.order_key,
      after: after.as_ref(),
      limit: self.page_size + 1,
    };
    let mut documents = self
      .store
      .query_ordered(query)
      .await
      .map_err(PageError::Store)?;

    let has_next = documents.len() > self.page_size;
    documents.truncate(self.page_size);

    let boundary = match documents.last() {
      Some(last) => Some(last.cursor(&self.order_key).ok_or_else(|| {
        PageError::Store(color_eyre::eyre::eyre!(
          "Store returned document {} without a string '{}' field",
          last.id,
          self.order_key
        ))
      })?),
      None => None,
    };

    let records: Vec<R> = documents.iter().filter_map(R::from_document).collect();

    {
      let mut table = self.table();
      table.record(page_index, boundary);
      table.displayed = Some((page_index, records.len()));
    }

    debug!(
      page = page_index,
      records = records.len(),
      skipped = documents.len() - records.len(),
      has_next,
      "Fetched page"
    );

    Ok(Page {
      index: page_index,
      records,
      has_next,
      fetched_at: chrono::Utc::now(),
    })
  }

  /// Record that a document was deleted from page `page_index`.
  ///
  /// Drops the boundaries of that page and every page after it. Returns the
  /// page to fetch next: the previous page when the deletion emptied a page
  /// other than the first, otherwise `page_index` itself.
  pub fn on_record_deleted(&self, page_index: usize) -> Result<usize, PageError> {
    let _in_flight = InFlight::acquire(&self.in_flight)?;
    Ok(self.repair_after_delete(page_index))
  }

  /// Delete document `id` from the store, then repair the cursor table as
  /// [`on_record_deleted`](Self::on_record_deleted) does. A failed delete
  /// leaves the table untouched.
  pub async fn delete_record(&self, page_index: usize, id: &str) -> Result<usize, PageError> {
    let _in_flight = InFlight::acquire(&self.in_flight)?;
    self.store.delete(id).await.map_err(PageError::Store)?;
    Ok(self.repair_after_delete(page_index))
  }

  /// Caller must hold the in-flight guard.
  fn repair_after_delete(&self, page_index: usize) -> usize {
    let mut table = self.table();
    table.cursors.truncate(page_index);

    let mut refetch = page_index;
    if let Some((shown, len)) = table.displayed {
      if shown == page_index {
        let remaining = len.saturating_sub(1);
        table.displayed = Some((shown, remaining));
        if remaining == 0 && page_index > 0 {
          refetch = page_index - 1;
        }
      }
    }

    info!(
      page = page_index,
      kept = table.cursors.len(),
      refetch,
      "Truncated page cursors after deletion"
    );
    refetch
  }

  /// Walk the collection from page 0 until a page reports no successor.
  pub fn pages(&self) -> impl Stream<Item = Result<Page<R>, PageError>> + '_ {
    futures::stream::try_unfold(Some(0usize), move |next| async move {
      let Some(index) = next else {
        return Ok::<_, PageError>(None);
      };
      let page = self.fetch_page(index).await?;
      let next = page.has_next.then_some(index + 1);
      Ok(Some((page, next)))
    })
  }

  fn table(&self) -> MutexGuard<'_, CursorTable> {
    // Table updates are single assignments; a poisoned lock still holds a
    // consistent table.
    self.table.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
