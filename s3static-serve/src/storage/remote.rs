//! S3-compatible storage backend over `aws-sdk-s3`

use super::traits::*;
use async_trait::async_trait;
use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Region};
use aws_sdk_s3::{
    config::Credentials,
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    Client,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use s3static_core::StoreConfig;
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DELIMITER: &str = "/";

/// Backend talking to a real S3-compatible endpoint, bound to one bucket
///
/// The SDK client is cheap to share and pools connections internally; hyper's
/// pool keeps idle connections without a per-host cap.
#[derive(Debug, Clone)]
pub struct RemoteStorage {
    client: Client,
    bucket: String,
}

impl RemoteStorage {
    pub async fn connect(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(config.endpoint.as_str().trim_end_matches('/'))
            .region(Region::new(config.region.clone()))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(CONNECT_TIMEOUT)
                    .build(),
            )
            .retry_config(RetryConfig::disabled());

        loader = if config.is_anonymous() {
            loader.no_credentials()
        } else {
            loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "s3static",
            ))
        };

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();

        Self::from_client(Client::from_conf(s3_config), config.bucket.clone())
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for RemoteStorage {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let mut entries = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .delimiter(DELIMITER);
            if let Some(token) = continuation_token.take() {
                req = req.continuation_token(token);
            }

            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(err) if entries.is_empty() => return Err(classify_sdk_error(&err)),
                Err(err) => {
                    warn!(
                        prefix = %prefix,
                        error = %DisplayErrorContext(&err),
                        "Listing page failed, keeping {} entries already read",
                        entries.len()
                    );
                    break;
                }
            };

            for object in resp.contents() {
                let Some(key) = object.key() else { continue };
                entries.push(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().map_or(0, |s| u64::try_from(s).unwrap_or(0)),
                    last_modified: object.last_modified().and_then(to_chrono),
                });
            }
            for common in resp.common_prefixes() {
                if let Some(prefix) = common.prefix() {
                    entries.push(ObjectInfo::prefix(prefix));
                }
            }

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!(prefix = %prefix, entries = entries.len(), "Listed prefix");
        Ok(entries)
    }

    async fn get_object(&self, key: &str) -> Result<ObjectContent, StoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let not_found = err
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::get_object::GetObjectError::is_no_such_key);
                if not_found {
                    StoreError::NotFound(key.to_string())
                } else {
                    classify_sdk_error(&err)
                }
            })?;

        Ok(ObjectContent {
            key: key.to_string(),
            size: resp
                .content_length()
                .map_or(0, |len| u64::try_from(len).unwrap_or(0)),
            last_modified: resp.last_modified().and_then(to_chrono),
            etag: resp.e_tag().map(String::from),
            content_type: resp.content_type().map(String::from),
            body: body_stream(resp.body),
        })
    }
}

/// Adapt the SDK byte stream into a chunk stream
fn body_stream(body: ByteStream) -> BodyStream {
    futures::stream::try_unfold(body, |mut body| async move {
        match body.try_next().await {
            Ok(Some(chunk)) => Ok(Some((chunk, body))),
            Ok(None) => Ok(None),
            Err(err) => Err(StoreError::Stream(err.to_string())),
        }
    })
    .boxed()
}

fn classify_sdk_error<E, R>(err: &SdkError<E, R>) -> StoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(err).to_string();
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            StoreError::Unavailable(message)
        }
        _ => StoreError::Service(message),
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{retry::RetryConfig, BehaviorVersion, Credentials, Region};
    use aws_sdk_s3::primitives::SdkBody;
    use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};
    use futures::TryStreamExt;

    const ENDPOINT: &str = "http://localhost:9000";

    /// Storage whose client answers each request with the next canned response
    fn replay_storage(responses: Vec<http::Response<SdkBody>>) -> RemoteStorage {
        let events = responses
            .into_iter()
            .map(|response| {
                let request = http::Request::builder()
                    .uri(format!("{}/static", ENDPOINT))
                    .body(SdkBody::empty())
                    .unwrap();
                ReplayEvent::new(request, response)
            })
            .collect();

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("ak", "sk", None, None, "test"))
            .endpoint_url(ENDPOINT)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .http_client(StaticReplayClient::new(events))
            .build();

        RemoteStorage::from_client(Client::from_conf(config), "static")
    }

    fn xml(status: u16, body: &str) -> http::Response<SdkBody> {
        http::Response::builder()
            .status(status)
            .header("content-type", "application/xml")
            .body(SdkBody::from(body.to_string()))
            .unwrap()
    }

    fn list_page(contents: &[&str], prefixes: &[&str], next_token: Option<&str>) -> String {
        let mut body = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>static</Name><Prefix>docs/</Prefix><Delimiter>/</Delimiter><MaxKeys>1000</MaxKeys>"#,
        );
        body.push_str(&format!("<KeyCount>{}</KeyCount>", contents.len() + prefixes.len()));
        match next_token {
            Some(token) => body.push_str(&format!(
                "<IsTruncated>true</IsTruncated><NextContinuationToken>{}</NextContinuationToken>",
                token
            )),
            None => body.push_str("<IsTruncated>false</IsTruncated>"),
        }
        for key in contents {
            body.push_str(&format!(
                "<Contents><Key>{}</Key><LastModified>2025-01-01T00:00:00.000Z</LastModified><ETag>&quot;abc&quot;</ETag><Size>5</Size><StorageClass>STANDARD</StorageClass></Contents>",
                key
            ));
        }
        for prefix in prefixes {
            body.push_str(&format!("<CommonPrefixes><Prefix>{}</Prefix></CommonPrefixes>", prefix));
        }
        body.push_str("</ListBucketResult>");
        body
    }

    fn s3_error(code: &str, message: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{}</Code><Message>{}</Message><RequestId>test</RequestId></Error>"#,
            code, message
        )
    }

    fn keys(entries: &[ObjectInfo]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let storage = replay_storage(vec![
            xml(200, &list_page(&["docs/a.txt"], &["docs/img/"], Some("page-2"))),
            xml(200, &list_page(&["docs/b.txt"], &[], None)),
        ]);

        let entries = storage.list_objects("docs/").await.unwrap();
        assert_eq!(keys(&entries), vec!["docs/a.txt", "docs/img/", "docs/b.txt"]);
        assert_eq!(entries[0].size, 5);
        assert_eq!(
            entries[0].last_modified,
            DateTime::from_timestamp(1_735_689_600, 0)
        );
        assert_eq!(entries[1], ObjectInfo::prefix("docs/img/"));
    }

    #[tokio::test]
    async fn test_list_keeps_pages_read_before_a_failure() {
        let storage = replay_storage(vec![
            xml(200, &list_page(&["docs/a.txt"], &["docs/img/"], Some("page-2"))),
            xml(500, &s3_error("InternalError", "We encountered an internal error")),
        ]);

        let entries = storage.list_objects("docs/").await.unwrap();
        assert_eq!(keys(&entries), vec!["docs/a.txt", "docs/img/"]);
    }

    #[tokio::test]
    async fn test_list_service_error_on_first_page() {
        let storage = replay_storage(vec![xml(403, &s3_error("AccessDenied", "Access Denied"))]);

        let result = storage.list_objects("docs/").await;
        assert!(matches!(result, Err(StoreError::Service(_))), "{result:?}");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let storage = replay_storage(vec![xml(
            404,
            &s3_error("NoSuchKey", "The specified key does not exist."),
        )]);

        let result = storage.get_object("docs/missing.txt").await;
        assert!(
            matches!(&result, Err(StoreError::NotFound(key)) if key == "docs/missing.txt"),
            "{result:?}"
        );
    }

    #[tokio::test]
    async fn test_get_object_metadata_and_body() {
        let response = http::Response::builder()
            .status(200)
            .header("content-length", "5")
            .header("content-type", "text/plain")
            .header("etag", "\"abc\"")
            .header("last-modified", "Wed, 01 Jan 2025 00:00:00 GMT")
            .body(SdkBody::from("hello"))
            .unwrap();
        let storage = replay_storage(vec![response]);

        let content = storage.get_object("docs/a.txt").await.unwrap();
        assert_eq!(content.key, "docs/a.txt");
        assert_eq!(content.size, 5);
        assert_eq!(content.etag.as_deref(), Some("\"abc\""));
        assert_eq!(content.content_type.as_deref(), Some("text/plain"));
        assert_eq!(content.last_modified, DateTime::from_timestamp(1_735_689_600, 0));

        let chunks: Vec<bytes::Bytes> = content.body.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"hello");
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        // Reserve a port, then free it so nothing is listening there
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config =
            StoreConfig::new(&format!("http://127.0.0.1:{}", port), "static", "", "").unwrap();
        let storage = RemoteStorage::connect(&config).await;

        let result = storage.list_objects("").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))), "{result:?}");

        let result = storage.get_object("index.html").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))), "{result:?}");
    }
}
