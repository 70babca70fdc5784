//! End-to-end tests over a real socket

use s3static_serve::storage::EphemeralStorage;
use s3static_test::TestServer;
use std::sync::Arc;

#[tokio::test]
async fn test_file_directory_and_redirect() {
    let server = TestServer::start("public").await.unwrap();
    server.storage().put_object("public/index.html", "<h1>home</h1>", None);
    server.storage().put_object("public/docs/intro.md", "# intro", None);
    server.storage().put_object("private/secret.txt", "nope", None);

    let client = server.client();

    let file = client.get("/index.html").await.unwrap();
    assert_eq!(file.status, 200);
    assert_eq!(file.header("content-type"), Some("text/html; charset=utf-8"));
    assert!(file.header("last-modified").is_some());
    assert!(file.header("etag").is_some());
    assert_eq!(file.text(), "<h1>home</h1>");

    let redirect = client.get("/docs").await.unwrap();
    assert_eq!(redirect.status, 302);
    assert_eq!(redirect.header("location"), Some("/docs/"));

    let listing = client.get("/docs/").await.unwrap();
    assert_eq!(listing.status, 200);
    assert_eq!(
        listing.text(),
        "<pre>\n<a href=\"intro.md\">intro.md</a>\n</pre>"
    );

    let root = client.get("/").await.unwrap();
    assert_eq!(root.status, 200);
    assert!(root.text().contains("<a href=\"docs/\">docs/</a>"));
    assert!(!root.text().contains("secret"));

    assert_eq!(client.get("/secret.txt").await.unwrap().status, 404);
}

#[tokio::test]
async fn test_malformed_path_is_bad_request() {
    let server = TestServer::start("").await.unwrap();
    server.storage().put_object("a", "x", None);

    let response = server.client().get("/bad%zzescape").await.unwrap();
    assert_eq!(response.status, 400);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_head_over_socket() {
    let server = TestServer::start("").await.unwrap();
    server.storage().put_object("report.pdf", vec![0u8; 1024], None);

    let response = server.client().head("/report.pdf").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/pdf"));
    assert_eq!(response.header("content-length"), Some("1024"));
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_for_same_key() {
    let server = TestServer::start("").await.unwrap();
    let data: Vec<u8> = (0..=255u8).cycle().take(512 * 1024).collect();
    server.storage().put_object("big.bin", data.clone(), None);

    let client = server.client();
    let first = client.get("/big.bin").await.unwrap();
    assert_eq!(first.status, 200);
    assert_eq!(first.body, data);

    let (a, b) = tokio::join!(client.get("/big.bin"), client.get("/big.bin"));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.status, 200);
    assert_eq!(b.status, 200);
    assert_eq!(a.body, data);
    assert_eq!(b.body, data);
}

#[tokio::test]
async fn test_many_concurrent_mixed_requests() {
    let server = TestServer::start("").await.unwrap();
    for i in 0..10 {
        server
            .storage()
            .put_object(&format!("dir{}/file.txt", i), format!("file {}", i), None);
    }

    let client = server.client();
    let requests = (0..10).flat_map(|i| {
        let client = client.clone();
        let file = client.clone();
        [
            tokio::spawn(async move { client.get(&format!("/dir{}", i)).await }),
            tokio::spawn(async move { file.get(&format!("/dir{}/file.txt", i)).await }),
        ]
    });

    let results = futures::future::join_all(requests).await;
    for (n, result) in results.into_iter().enumerate() {
        let response = result.unwrap().unwrap();
        if n % 2 == 0 {
            assert_eq!(response.status, 302);
            assert_eq!(response.header("location"), Some(format!("/dir{}/", n / 2).as_str()));
        } else {
            assert_eq!(response.status, 200);
            assert_eq!(response.text(), format!("file {}", n / 2));
        }
    }
}

#[tokio::test]
async fn test_range_over_caller_supplied_store() {
    let store = Arc::new(EphemeralStorage::new().with_chunk_size(4));
    store.put_object("site/alphabet.txt", "abcdefghijklmnopqrstuvwxyz", None);

    let server = TestServer::start_with_store("site", store).await.unwrap();
    assert!(server.url().starts_with("http://127.0.0.1:"));

    let response = server
        .client()
        .request(reqwest::Method::GET, "/alphabet.txt", &[("range", "bytes=3-9")])
        .await
        .unwrap();
    assert_eq!(response.status, 206);
    assert_eq!(response.header("content-range"), Some("bytes 3-9/26"));
    assert_eq!(response.text(), "defghij");
}
