//! Core `RequestBuilder` structure and submission

use std::any::Any;
use std::sync::Arc;

use http::Method;

use fytch_client::{BufferPlan, FlushSink, FytchClient, Handle, Result, Submission};

/// Fluent builder over [`Submission`].
///
/// Construct with [`RequestBuilder::get`], [`RequestBuilder::post`], or
/// [`RequestBuilder::head`], chain configuration, then [`submit`] to a
/// client.
///
/// [`submit`]: RequestBuilder::submit
pub struct RequestBuilder {
    pub(crate) submission: Submission,
}

impl RequestBuilder {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            submission: Submission::new(method, url),
        }
    }

    /// Start building a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Start building a POST request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Start building a HEAD request.
    #[must_use]
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    /// Pick the response buffer behavior for this request.
    #[must_use]
    pub fn plan(mut self, plan: BufferPlan) -> Self {
        self.submission.plan = plan;
        self
    }

    /// Sink that receives full-buffer payloads when the request uses
    /// [`BufferPlan::ReuseWithFlush`].
    #[must_use]
    pub fn flush(mut self, sink: Arc<dyn FlushSink>) -> Self {
        self.submission.flush = Some(sink);
        self
    }

    /// Attach opaque caller data, retrievable later through
    /// `FytchClient::take_user_data`.
    #[must_use]
    pub fn user<T: Any + Send>(mut self, data: T) -> Self {
        self.submission.user = Some(Box::new(data));
        self
    }

    /// Hand the finished submission to the engine.
    ///
    /// # Errors
    ///
    /// Returns the engine's synchronous submission errors: invalid URL,
    /// empty POST body, exhausted pool, unknown persistent buffer id, or a
    /// transport rejection.
    pub fn submit(self, client: &FytchClient) -> Result<Handle> {
        client.submit(self.submission)
    }
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.submission.method)
            .field("url", &self.submission.url)
            .field("plan", &self.submission.plan)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_carries_method_url_and_plan() {
        let builder = RequestBuilder::get("http://example.com/x")
            .plan(BufferPlan::Fixed { capacity: 1024 });
        assert_eq!(builder.submission.method, Method::GET);
        assert_eq!(builder.submission.url, "http://example.com/x");
        assert_eq!(builder.submission.plan, BufferPlan::Fixed { capacity: 1024 });
    }

    #[test]
    fn user_data_is_boxed_into_the_submission() {
        let builder = RequestBuilder::head("http://example.com/").user(42u32);
        let boxed = builder.submission.user.expect("user data set");
        assert_eq!(boxed.downcast_ref::<u32>(), Some(&42));
    }
}
