//! Header configuration methods

use http::header::{HeaderName, HeaderValue};

use super::core::RequestBuilder;

impl RequestBuilder {
    /// Set a request header. Invalid names or values are logged and skipped;
    /// the builder itself never fails.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (name.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.submission.headers.insert(name, value);
            }
            _ => {
                tracing::warn!(name, value, "skipping invalid request header");
            }
        }
        self
    }

    /// Set several headers from `(name, value)` pairs.
    #[must_use]
    pub fn headers<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (name, value) in pairs {
            self = self.header(name, value);
        }
        self
    }

    /// Set a header from a compact `"Name: value"` line.
    #[must_use]
    pub fn header_line(self, line: &str) -> Self {
        let Some((name, value)) = line.split_once(':') else {
            tracing::warn!(line, "skipping malformed header line");
            return self;
        };
        self.header(name.trim(), value.trim())
    }
}
