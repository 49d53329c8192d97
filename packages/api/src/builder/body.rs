//! Body configuration methods

use bytes::Bytes;

use super::core::RequestBuilder;

impl RequestBuilder {
    /// Set the request body from raw bytes.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.submission.body = Some(body.into());
        self
    }

    /// Set the request body from text.
    #[must_use]
    pub fn text(self, body: impl Into<String>) -> Self {
        self.body(Bytes::from(body.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_body_is_stored_as_bytes() {
        let builder = RequestBuilder::post("http://example.com/").text("payload");
        assert_eq!(builder.submission.body.unwrap(), Bytes::from("payload"));
    }
}
