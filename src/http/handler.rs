//! Test-supplied route handlers.

use crate::http::request::Request;
use crate::http::response::ResponseWriter;

/// Produces the response for a matched request.
///
/// Handlers run on the blocking thread pool, so they may sleep to simulate a
/// slow upstream. Any closure `Fn(&mut ResponseWriter, &Request)` is a handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, w: &mut ResponseWriter, r: &Request);
}

impl<F> Handler for F
where
    F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
{
    fn handle(&self, w: &mut ResponseWriter, r: &Request) {
        self(w, r)
    }
}
