//! Longest-prefix resource table: routes a request to the most specific
//! registered handler, the way [`crate::auth::Authenticator`] routes a path
//! to the most specific restrict/permit rule.

use crate::{
    server::{connection::ConnectionData, server_impl::Handler},
    Handled, Request, Response, StatusCode,
};
use std::{collections::BTreeMap, future::Future, pin::Pin, sync::Arc};

/// Object-safe counterpart of [`Handler`], used so [`ResourceTable`] can hold
/// handlers of different concrete types behind one `Arc`.
trait DynHandler<S>: Sync + Send {
    fn handle<'a>(
        &'a self,
        connection_data: &'a mut S,
        request: &'a Request,
        response: &'a mut Response,
    ) -> Pin<Box<dyn Future<Output = Handled> + Send + 'a>>;
}

impl<T, S> DynHandler<S> for T
where
    T: Handler<S>,
    S: ConnectionData,
{
    fn handle<'a>(
        &'a self,
        connection_data: &'a mut S,
        request: &'a Request,
        response: &'a mut Response,
    ) -> Pin<Box<dyn Future<Output = Handled> + Send + 'a>> {
        Box::pin(Handler::handle(self, connection_data, request, response))
    }
}

fn strip_trailing_slash(path: &[u8]) -> &[u8] {
    if path.len() > 1 && path.ends_with(b"/") {
        &path[..path.len() - 1]
    } else {
        path
    }
}

/// Matches `path` against a resource key the way a restrict/permit rule
/// matches in [`crate::auth::Authenticator`]: `key` wins if it's empty,
/// equal to `path`, or a prefix of `path` followed by `/`.
fn is_prefix_match(path: &[u8], key: &[u8]) -> bool {
    key.is_empty()
        || (path.starts_with(key) && (path.len() == key.len() || path[key.len()] == b'/'))
}

/// Ordered map from resource path to handler, matched by longest prefix.
///
/// Register resources with [`ResourceTable::builder`], then pass the built
/// table as the server's [`Handler`] — it dispatches to the longest
/// registered prefix of the request path, or a built-in `404` when nothing
/// matches.
///
/// # Examples
///
/// ```
/// use maker_web::{ResourceTable, Handler, Request, Response, Handled, StatusCode};
///
/// struct Hello;
/// impl Handler for Hello {
///     async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
///         resp.status(StatusCode::Ok).body("Hello World!")
///     }
/// }
///
/// let table = ResourceTable::builder().resource("/hello", Hello).build();
/// ```
pub struct ResourceTable<S = ()> {
    routes: BTreeMap<Vec<u8>, Arc<dyn DynHandler<S>>>,
}

impl<S: ConnectionData> ResourceTable<S> {
    /// Creates a new builder with an empty resource table.
    #[inline(always)]
    pub fn builder() -> ResourceTableBuilder<S> {
        ResourceTableBuilder {
            routes: BTreeMap::new(),
        }
    }

    /// Finds the handler registered for the longest prefix of `path`, per
    /// the same predecessor-walk rule used in SPEC_FULL.md §4.7.
    fn lookup(&self, path: &[u8]) -> Option<&Arc<dyn DynHandler<S>>> {
        self.routes
            .range::<[u8], _>(..=path)
            .rev()
            .find(|(key, _)| is_prefix_match(path, key))
            .map(|(_, handler)| handler)
    }
}

impl<S: ConnectionData> Handler<S> for ResourceTable<S> {
    async fn handle(&self, connection_data: &mut S, request: &Request, response: &mut Response) -> Handled {
        match self.lookup(request.url().path()) {
            Some(handler) => handler.handle(connection_data, request, response).await,
            None => response
                .status(StatusCode::NotFound)
                .body("The requested resource was not found on this server"),
        }
    }
}

/// Builder for [`ResourceTable`].
pub struct ResourceTableBuilder<S = ()> {
    routes: BTreeMap<Vec<u8>, Arc<dyn DynHandler<S>>>,
}

impl<S: ConnectionData> ResourceTableBuilder<S> {
    /// Registers `handler` for `path`. A trailing slash on `path` is
    /// stripped, so registering `/x/` and `/x` is idempotent.
    #[inline]
    pub fn resource<H: Handler<S>>(mut self, path: impl AsRef<[u8]>, handler: H) -> Self {
        let key = strip_trailing_slash(path.as_ref()).to_vec();
        self.routes.insert(key, Arc::new(handler));
        self
    }

    /// Finalizes the builder into an immutable [`ResourceTable`].
    #[inline(always)]
    pub fn build(self) -> ResourceTable<S> {
        ResourceTable { routes: self.routes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;

    struct Stub(&'static [u8]);
    impl Handler for Stub {
        async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
            resp.status(StatusCode::Ok).body(self.0)
        }
    }

    fn table() -> ResourceTable {
        ResourceTable::builder()
            .resource("/a", Stub(b"a"))
            .resource("/a/b", Stub(b"a/b"))
            .resource("/a/bc", Stub(b"a/bc"))
            .build()
    }

    #[test]
    fn longest_prefix_wins() {
        let table = table();

        let a_b = table.routes.get(b"/a/b".as_slice()).unwrap();
        let a = table.routes.get(b"/a".as_slice()).unwrap();

        assert!(Arc::ptr_eq(table.lookup(b"/a/b/c").unwrap(), a_b));
        assert!(Arc::ptr_eq(table.lookup(b"/a/bx").unwrap(), a));
        assert!(table.lookup(b"/z").is_none());
    }

    #[test]
    fn trailing_slash_registration_is_idempotent() {
        let table = ResourceTable::builder()
            .resource("/x/", Stub(b"first"))
            .resource("/x", Stub(b"second"))
            .build();

        assert_eq!(table.routes.len(), 1);
    }

    #[tokio::test]
    async fn unmatched_path_returns_404() {
        let table = table();
        let mut data = ();
        let request = Request::new(&crate::limits::ReqLimits::default());
        let mut response = Response::new(&crate::limits::RespLimits::default());

        Handler::handle(&table, &mut data, &request, &mut response).await;
        assert!(response.buffer().starts_with(b"HTTP/1.1 404 Not Found"));
        assert!(crate::tools::str_op(response.buffer()).contains("was not found on this server"));
    }
}
