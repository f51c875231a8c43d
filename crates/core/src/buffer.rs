//! Buffer negotiation for variable-length native queries
//!
//! Every variable-length SCM query follows the same protocol: call with an
//! empty buffer to learn the required size, allocate exactly that, call again.
//! [`negotiate`] implements that protocol once for all call sites, and
//! [`collect_pages`] drives cursor-based queries that return data in pages.

use crate::error::{ScmError, ScmResult};
use tracing::debug;

/// Default upper bound for a single negotiated buffer (8 MiB)
pub const DEFAULT_MAX_BUFFER: usize = 8 * 1024 * 1024;

/// Default upper bound on pages in one paged query
pub const DEFAULT_MAX_PAGES: usize = 4096;

/// Heap buffer aligned for the native structures written into it
#[derive(Debug, Clone, Default)]
pub struct NativeBuffer {
    words: Vec<u64>,
    len: usize,
}

impl NativeBuffer {
    /// Zeroed buffer of exactly `len` usable bytes
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(8)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `words` owns at least `len` initialized bytes and u8 has no alignment requirement
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and the borrow is unique
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }

    /// Pointer to the start of the buffer, 8-byte aligned
    pub fn as_ptr<T>(&self) -> *const T {
        self.words.as_ptr().cast::<T>()
    }

    pub fn as_mut_ptr<T>(&mut self) -> *mut T {
        self.words.as_mut_ptr().cast::<T>()
    }
}

/// Outcome of one invocation of a native query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The call succeeded with the buffer it was given
    Filled,
    /// The call reported that it needs this many bytes
    Needs(usize),
}

/// Run the two-call sizing protocol against `query`.
///
/// `query` receives the buffer to fill and reports either success or the
/// required size; any other native failure is returned as `Err` and aborts
/// negotiation. If the required size grows between the sizing call and the
/// fill call, the new size is tried once more before giving up.
pub fn negotiate<F>(api: &'static str, max_bytes: usize, mut query: F) -> ScmResult<NativeBuffer>
where
    F: FnMut(&mut NativeBuffer) -> ScmResult<Probe>,
{
    let mut buffer = NativeBuffer::default();
    let mut required = match query(&mut buffer)? {
        Probe::Filled => return Ok(buffer),
        Probe::Needs(bytes) => bytes,
    };

    for attempt in 0..2 {
        if required == 0 {
            return Err(ScmError::BufferNegotiationFailed {
                api,
                reason: "native call reported a zero-byte requirement".to_string(),
            });
        }
        if required > max_bytes {
            return Err(ScmError::BufferNegotiationFailed {
                api,
                reason: format!("required size {} exceeds limit {}", required, max_bytes),
            });
        }

        buffer = NativeBuffer::with_len(required);
        match query(&mut buffer)? {
            Probe::Filled => return Ok(buffer),
            Probe::Needs(bytes) => {
                debug!(api, attempt, previous = required, now = bytes, "required size grew");
                required = bytes.max(required + 1);
            }
        }
    }

    Err(ScmError::BufferNegotiationFailed {
        api,
        reason: format!("required size kept growing (last reported {})", required),
    })
}

/// One page of a cursor-based query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// The native call reported further data after this page
    pub more: bool,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, more: false }
    }

    pub fn partial(items: Vec<T>) -> Self {
        Self { items, more: true }
    }
}

/// Accumulate pages from `next_page` until it reports no more data.
///
/// The whole collection fails if any page fails. A page that reports more
/// data without yielding anything cannot make progress and is an error.
pub fn collect_pages<T, F>(api: &'static str, max_pages: usize, mut next_page: F) -> ScmResult<Vec<T>>
where
    F: FnMut() -> ScmResult<Page<T>>,
{
    let mut items = Vec::new();

    for page_index in 0..max_pages {
        let page = next_page()?;
        let count = page.items.len();
        items.extend(page.items);

        if !page.more {
            return Ok(items);
        }
        if count == 0 {
            return Err(ScmError::BufferNegotiationFailed {
                api,
                reason: format!("page {} reported more data but returned nothing", page_index),
            });
        }
        debug!(api, page_index, count, "fetched partial page");
    }

    Err(ScmError::BufferNegotiationFailed {
        api,
        reason: format!("more than {} pages", max_pages),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_aligned_and_sized() {
        let buffer = NativeBuffer::with_len(13);
        assert_eq!(buffer.len(), 13);
        assert_eq!(buffer.as_bytes().len(), 13);
        assert_eq!(buffer.as_ptr::<u8>() as usize % 8, 0);
        assert!(NativeBuffer::default().is_empty());
    }

    #[test]
    fn test_probe_then_fill() {
        let mut calls = Vec::new();
        let buffer = negotiate("Query", 1024, |buf| {
            calls.push(buf.len());
            if buf.len() < 40 {
                return Ok(Probe::Needs(40));
            }
            buf.as_bytes_mut()[0] = 7;
            Ok(Probe::Filled)
        })
        .unwrap();

        assert_eq!(calls, vec![0, 40]);
        assert_eq!(buffer.len(), 40);
        assert_eq!(buffer.as_bytes()[0], 7);
    }

    #[test]
    fn test_nothing_to_fetch() {
        let buffer = negotiate("Query", 1024, |_| Ok(Probe::Filled)).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_tolerates_one_growth() {
        let mut calls = Vec::new();
        let buffer = negotiate("Query", 1024, |buf| {
            calls.push(buf.len());
            match buf.len() {
                0 => Ok(Probe::Needs(64)),
                64 => Ok(Probe::Needs(96)),
                _ => Ok(Probe::Filled),
            }
        })
        .unwrap();
        assert_eq!(buffer.len(), 96);
        assert_eq!(calls, vec![0, 64, 96]);
    }

    #[test]
    fn test_fails_when_size_keeps_growing() {
        let mut size = 16;
        let err = negotiate("Query", 1 << 20, |_| {
            size *= 2;
            Ok(Probe::Needs(size))
        })
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BufferNegotiationFailed);
    }

    #[test]
    fn test_rejects_unreasonable_size() {
        let mut calls = 0;
        let err = negotiate("Query", 1024, |_| {
            calls += 1;
            Ok(Probe::Needs(usize::MAX / 2))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_native_error_aborts() {
        let err = negotiate("Query", 1024, |buf| {
            if buf.is_empty() {
                Ok(Probe::Needs(8))
            } else {
                Err(ScmError::AccessDenied { api: "Query" })
            }
        })
        .unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_collect_pages_in_order() {
        let mut pages = vec![
            Page::partial(vec![1, 2]),
            Page::partial(vec![3]),
            Page::last(vec![4, 5]),
        ]
        .into_iter();
        let items = collect_pages("Enum", 10, || Ok(pages.next().unwrap())).unwrap();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_collect_pages_is_all_or_nothing() {
        let mut call = 0;
        let result: ScmResult<Vec<u32>> = collect_pages("Enum", 10, || {
            call += 1;
            if call == 1 {
                Ok(Page::partial(vec![1]))
            } else {
                Err(ScmError::Unknown { api: "Enum", code: 6 })
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_collect_pages_detects_stall() {
        let result: ScmResult<Vec<u32>> = collect_pages("Enum", 10, || Ok(Page::partial(vec![])));
        assert!(result.is_err());
    }

    #[test]
    fn test_collect_pages_limit() {
        let result: ScmResult<Vec<u32>> = collect_pages("Enum", 3, || Ok(Page::partial(vec![1])));
        assert!(result.unwrap_err().to_string().contains("more than 3 pages"));
    }
}
