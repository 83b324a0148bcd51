//! Substring search over clipboard history
//!
//! At the bounded history size a linear scan is enough, so there is no
//! separate index: the query becomes a literal `instr` filter on
//! `text_content` and the store's recency ordering is reused as is.

/// Items shown by the panel when no explicit limit is given
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// How a query string filters the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFilter<'a> {
    /// Blank query: plain recency listing
    All,
    /// Items whose text contains the query (ASCII case-insensitive)
    Substring(&'a str),
}

impl<'a> SearchFilter<'a> {
    /// Whitespace-only queries list everything. Non-blank queries are matched
    /// verbatim, surrounding whitespace included.
    pub fn parse(query: &'a str) -> Self {
        if query.trim().is_empty() {
            SearchFilter::All
        } else {
            SearchFilter::Substring(query)
        }
    }
}
