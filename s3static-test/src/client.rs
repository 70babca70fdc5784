//! Client for talking to a running s3static server

use reqwest::{redirect::Policy, Client, Method};
use std::collections::HashMap;

use crate::TestError;

/// A response reduced to what tests compare
#[derive(Debug, Clone)]
pub struct TestResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Client for s3static that never follows redirects
#[derive(Clone)]
pub struct StaticClient {
    base_url: String,
    client: Client,
}

impl StaticClient {
    /// Create a new client
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(crate::REQUEST_TIMEOUT_SECS))
            .redirect(Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }

    /// GET a raw path; `path` is sent as written, escapes included
    pub async fn get(&self, path: &str) -> Result<TestResponse, TestError> {
        self.request(Method::GET, path, &[]).await
    }

    /// HEAD a raw path
    pub async fn head(&self, path: &str) -> Result<TestResponse, TestError> {
        self.request(Method::HEAD, path, &[]).await
    }

    /// Send a request with extra headers
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<TestResponse, TestError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }
}
