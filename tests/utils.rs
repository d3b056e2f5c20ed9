#![allow(dead_code)]

use std::fs;
use wiremock::{Match, Request};

/// # Panics
///
/// Will panic if a file can't be read or missing
#[must_use = "This function returns the body of the file as a string"]
pub fn body_from_file(path: &str) -> String {
    fs::read_to_string(path).expect("Failed to read file")
}

pub struct FormParamExactMatcher(String, String);

impl FormParamExactMatcher {
    /// Specify the expected value for a form parameter.
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        let key = key.into();
        let value = value.into();
        Self(key, value)
    }
}

/// Shorthand for [`FormParamExactMatcher::new`].
pub fn form_param<K, V>(key: K, value: V) -> FormParamExactMatcher
where
    K: Into<String>,
    V: Into<String>,
{
    FormParamExactMatcher::new(key, value)
}

impl Match for FormParamExactMatcher {
    fn matches(&self, request: &Request) -> bool {
        form_urlencoded::parse(&request.body)
            .any(|q| q.0 == self.0.as_str() && q.1 == self.1.as_str())
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Matches a multipart text field with an exact value
pub struct MultipartFieldMatcher(String, String);

pub fn multipart_field<K, V>(name: K, value: V) -> MultipartFieldMatcher
where
    K: Into<String>,
    V: Into<String>,
{
    MultipartFieldMatcher(name.into(), value.into())
}

impl Match for MultipartFieldMatcher {
    fn matches(&self, request: &Request) -> bool {
        let part = format!("name=\"{}\"\r\n\r\n{}\r\n", self.0, self.1);
        contains(&request.body, part.as_bytes())
    }
}

/// Matches a multipart file part by field name and file name
pub struct MultipartFileMatcher(String, String);

pub fn multipart_file<K, V>(name: K, file_name: V) -> MultipartFileMatcher
where
    K: Into<String>,
    V: Into<String>,
{
    MultipartFileMatcher(name.into(), file_name.into())
}

impl Match for MultipartFileMatcher {
    fn matches(&self, request: &Request) -> bool {
        let part = format!(
            "name=\"{}\"; filename=\"{}\"\r\ncontent-type: application/octet-stream",
            self.0, self.1
        );
        let body = String::from_utf8_lossy(&request.body).to_lowercase();
        body.contains(&part.to_lowercase())
    }
}

/// Matches a multipart body that has no field with this name
pub struct NoMultipartFieldMatcher(String);

pub fn no_multipart_field<K: Into<String>>(name: K) -> NoMultipartFieldMatcher {
    NoMultipartFieldMatcher(name.into())
}

impl Match for NoMultipartFieldMatcher {
    fn matches(&self, request: &Request) -> bool {
        let part = format!("name=\"{}\"", self.0);
        !contains(&request.body, part.as_bytes())
    }
}
