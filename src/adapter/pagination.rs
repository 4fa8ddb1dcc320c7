//! Generic pagination state for adapters that walk paged sources.

/// A position within a paged source: a numeric offset or an opaque
/// continuation token (raw bytes, base64 blobs, whatever the source hands
/// back).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Offset(u64),
    Token(String),
}

impl Cursor {
    pub fn offset(&self) -> Option<u64> {
        match self {
            Cursor::Offset(n) => Some(*n),
            Cursor::Token(_) => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Cursor::Token(t) => Some(t),
            Cursor::Offset(_) => None,
        }
    }
}

/// What one fetched page tells the pager.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Number of items the page carried.
    pub items: usize,
    /// The source's continuation cursor, `None` when it reports the end.
    pub next: Option<Cursor>,
    /// Total item count, when the source reports one.
    pub total: Option<u64>,
}

/// Monotonic cursor driving a paged enumeration.
///
/// The adapter loop is: take [`Pager::cursor`], fetch that page, report it
/// through [`Pager::advance`], repeat until `cursor` returns `None`.
/// Termination is guaranteed by the stop conditions: the source reports no
/// next page, the cursor fails to advance (equal or, for offsets,
/// non-increasing), the page is empty or short of the requested size, or a
/// known total has been reached.
#[derive(Debug)]
pub struct Pager {
    cursor: Cursor,
    page_size: Option<usize>,
    seen: u64,
    done: bool,
}

impl Pager {
    /// Starts at a numeric offset, usually zero.
    pub fn from_offset(start: u64) -> Self {
        Self {
            cursor: Cursor::Offset(start),
            page_size: None,
            seen: 0,
            done: false,
        }
    }

    /// Starts from an opaque continuation token.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            cursor: Cursor::Token(token.into()),
            page_size: None,
            seen: 0,
            done: false,
        }
    }

    /// Declares the requested page size, enabling the short-page stop
    /// condition.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// The cursor to fetch next, or `None` when the enumeration is over.
    pub fn cursor(&self) -> Option<&Cursor> {
        if self.done {
            None
        } else {
            Some(&self.cursor)
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Items seen across all reported pages.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Applies one fetched page and evaluates the stop conditions.
    pub fn advance(&mut self, page: Page) {
        if self.done {
            return;
        }
        self.seen += page.items as u64;

        if let Some(total) = page.total {
            if self.seen >= total {
                self.done = true;
                return;
            }
        }
        if page.items == 0 {
            self.done = true;
            return;
        }
        if let Some(size) = self.page_size {
            if page.items < size {
                self.done = true;
                return;
            }
        }
        match page.next {
            None => self.done = true,
            Some(next) => {
                let advanced = match (&self.cursor, &next) {
                    (Cursor::Offset(cur), Cursor::Offset(new)) => new > cur,
                    (cur, new) => new != cur,
                };
                if advanced {
                    self.cursor = next;
                } else {
                    self.done = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_pager_walks_full_pages() {
        let mut pager = Pager::from_offset(0).with_page_size(100);
        assert_eq!(pager.cursor().unwrap().offset(), Some(0));

        pager.advance(Page {
            items: 100,
            next: Some(Cursor::Offset(100)),
            total: None,
        });
        assert_eq!(pager.cursor().unwrap().offset(), Some(100));

        // Short page ends the enumeration.
        pager.advance(Page {
            items: 37,
            next: Some(Cursor::Offset(200)),
            total: None,
        });
        assert!(pager.is_done());
        assert_eq!(pager.seen(), 137);
    }

    #[test]
    fn test_empty_page_terminates() {
        let mut pager = Pager::from_offset(0);
        pager.advance(Page {
            items: 0,
            next: Some(Cursor::Offset(50)),
            total: None,
        });
        assert!(pager.is_done());
    }

    #[test]
    fn test_stuck_token_terminates() {
        let mut pager = Pager::from_token("abc");
        pager.advance(Page {
            items: 10,
            next: Some(Cursor::Token("def".to_string())),
            total: None,
        });
        assert_eq!(pager.cursor().unwrap().token(), Some("def"));

        // Source keeps handing back the same token.
        pager.advance(Page {
            items: 10,
            next: Some(Cursor::Token("def".to_string())),
            total: None,
        });
        assert!(pager.is_done());
    }

    #[test]
    fn test_non_increasing_offset_terminates() {
        let mut pager = Pager::from_offset(100);
        pager.advance(Page {
            items: 10,
            next: Some(Cursor::Offset(100)),
            total: None,
        });
        assert!(pager.is_done());
    }

    #[test]
    fn test_known_total_terminates() {
        let mut pager = Pager::from_offset(0).with_page_size(10);
        pager.advance(Page {
            items: 10,
            next: Some(Cursor::Offset(10)),
            total: Some(15),
        });
        assert!(!pager.is_done());

        pager.advance(Page {
            items: 10,
            next: Some(Cursor::Offset(20)),
            total: Some(15),
        });
        assert!(pager.is_done());
        assert_eq!(pager.seen(), 20);
    }

    #[test]
    fn test_reported_end_terminates() {
        let mut pager = Pager::from_token("start");
        pager.advance(Page {
            items: 25,
            next: None,
            total: None,
        });
        assert!(pager.is_done());
        assert!(pager.cursor().is_none());
    }

    #[test]
    fn test_advance_after_done_is_inert() {
        let mut pager = Pager::from_offset(0);
        pager.advance(Page::default());
        assert!(pager.is_done());

        pager.advance(Page {
            items: 10,
            next: Some(Cursor::Offset(10)),
            total: None,
        });
        assert!(pager.is_done());
        assert_eq!(pager.seen(), 0);
    }
}
