//! [`PageDescriptor`]: the stateless strategy the paging decorator consults
//! to walk a list-returning callable page by page.

/// Stateless strategy consulted by the paging decorator.
///
/// Descriptors carry no hidden state and are safe to share across every
/// page a [`crate::PagedListResponse`] ever fetches; implementations are
/// expected to be pure functions of their inputs.
pub trait PageDescriptor<Req, Resp, Elem>: Send + Sync {
    /// The sentinel token meaning "no further pages". Also the token
    /// injected into the very first request.
    fn empty_token(&self) -> String {
        String::new()
    }

    /// Returns a copy of `req` with its page token set to `token`.
    fn with_page_token(&self, req: &Req, token: &str) -> Req;

    /// Returns a copy of `req` with its page-size hint set to `size`.
    fn with_page_size(&self, req: &Req, size: usize) -> Req;

    /// Reads the page-size hint carried by `req`.
    fn extract_page_size(&self, req: &Req) -> usize;

    /// Reads the continuation token from `resp`. Equal to [`empty_token`]
    /// iff no further pages exist.
    ///
    /// [`empty_token`]: PageDescriptor::empty_token
    fn extract_next_token(&self, resp: &Resp) -> String;

    /// Reads the ordered elements carried by `resp`.
    fn extract_resources(&self, resp: &Resp) -> Vec<Elem>;
}
