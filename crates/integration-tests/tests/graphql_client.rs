//! The HTTP client against a canned GraphQL server.
//!
//! A one-shot TCP listener answers each connection with the next canned
//! response and hands back the raw request it received.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use loose_gallery_core::{PreviewSize, ProductId};
use loose_gallery_designs::api::{EditorRequest, LockOutcome};
use loose_gallery_designs::config::{
    ApiConfig, ApiCredential, EditorConfig, EditorParamNames, LockCapability,
};
use loose_gallery_designs::{ApiErrorKind, DesignApi, LooseGalleryClient};
use loose_gallery_integration_tests::serial;
use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Serve `responses` in order, one per connection.
async fn canned_server(responses: Vec<(u16, &'static str)>) -> (Url, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut socket).await);

            let response = format!(
                "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
        requests
    });

    let url = Url::parse(&format!("http://{addr}/graphql")).unwrap();
    (url, handle)
}

/// Read headers and a `Content-Length` body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn client(endpoint: Url, lock_capability: LockCapability) -> LooseGalleryClient {
    let api = ApiConfig {
        endpoint,
        timeout: Duration::from_secs(5),
        lock_capability,
        credentials: Vec::new(),
    };
    let editor = EditorConfig {
        base_url: Url::parse("https://editor.loosegallery.test/").unwrap(),
        return_url: "https://shop.test/lg-return?lg_return=1".to_string(),
        forward_api_key: true,
        start_params: EditorParamNames::default(),
        edit_params: EditorParamNames::default(),
    };
    let credential = ApiCredential {
        name: "default".to_string(),
        api_key: SecretString::from("lg_live_test_key"),
    };
    LooseGalleryClient::new(&api, &editor, &credential).unwrap()
}

#[tokio::test]
async fn test_connection_sends_api_key_and_operation() {
    let (url, server) =
        canned_server(vec![(200, r#"{"data":{"domain":{"id":"dom-1","name":"Acme Prints"}}}"#)])
            .await;

    let domain = client(url, LockCapability::Remote)
        .test_connection()
        .await
        .unwrap();
    assert_eq!(domain.id.as_deref(), Some("dom-1"));
    assert_eq!(domain.name, "Acme Prints");

    let requests = server.await.unwrap();
    let request = requests[0].to_ascii_lowercase();
    assert!(request.starts_with("post /graphql"));
    assert!(request.contains("x-api-key: lg_live_test_key"));
    assert!(requests[0].contains(r#""operationName":"GetDomain""#));
}

#[tokio::test]
async fn test_preview_sends_serial_variables() {
    let (url, server) = canned_server(vec![(
        200,
        r#"{"data":{"asset":{"serial":"DSX123456","previewUrl":"https://cdn.test/p.png","thumbnailUrl":null}}}"#,
    )])
    .await;

    let preview = client(url, LockCapability::Remote)
        .get_design_preview(&serial("DSX123456"), PreviewSize::Large)
        .await
        .unwrap();
    assert_eq!(preview.preview_url.as_deref(), Some("https://cdn.test/p.png"));
    assert!(preview.thumbnail_url.is_none());

    let requests = server.await.unwrap();
    assert!(requests[0].contains(r#""serial":"DSX123456""#));
    assert!(requests[0].contains(r#""operationName":"GetAsset""#));
    // The size hint never reaches the API.
    assert!(!requests[0].contains("size"));
}

#[tokio::test]
async fn test_connection_without_domain_fails() {
    let (url, _server) = canned_server(vec![(200, r#"{"data":{"domain":null}}"#)]).await;

    let err = client(url, LockCapability::Remote)
        .test_connection()
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::ProtocolError);
    assert_eq!(err.message, "Failed to connect to API");
}

#[tokio::test]
async fn test_unknown_design_is_not_found() {
    let (url, _server) = canned_server(vec![(200, r#"{"data":{"asset":null}}"#)]).await;

    let err = client(url, LockCapability::Remote)
        .get_design_info(&serial("DSX404404"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::NotFound);
    assert_eq!(err.message, "Design DSX404404 not found");
}

#[tokio::test]
async fn test_graphql_errors_inside_200_are_classified() {
    let (url, _server) = canned_server(vec![
        (
            200,
            r#"{"errors":[{"message":"Invalid API key","extensions":{"code":"UNAUTHENTICATED"}}]}"#,
        ),
        (200, r#"{"errors":[{"message":"Asset already archived"}]}"#),
    ])
    .await;
    let client = client(url, LockCapability::Remote);

    let err = client.lock_design(&serial("DSX123456")).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Unauthorized);
    assert_eq!(err.message, "Invalid API key");

    let err = client.lock_design(&serial("DSX123456")).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::ProtocolError);
    assert_eq!(err.message, "Asset already archived");
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let (url, _server) = canned_server(vec![(503, "upstream unavailable")]).await;

    let err = client(url, LockCapability::Remote)
        .lock_design(&serial("DSX123456"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Unknown);
    assert_eq!(err.http_status, Some(503));
}

#[tokio::test]
async fn test_remote_lock() {
    let (url, server) = canned_server(vec![(
        200,
        r#"{"data":{"lockAsset":{"serial":"DSX123456","locked":true}}}"#,
    )])
    .await;

    let outcome = client(url, LockCapability::Remote)
        .lock_design(&serial("DSX123456"))
        .await
        .unwrap();
    assert_eq!(outcome, LockOutcome::Remote);

    let requests = server.await.unwrap();
    assert!(requests[0].contains(r#""operationName":"LockAsset""#));
}

#[tokio::test]
async fn test_editor_url_forwards_key_without_network() {
    // Nothing listens here; building links must not touch the network.
    let client = client(
        Url::parse("http://127.0.0.1:1/graphql").unwrap(),
        LockCapability::Remote,
    );

    let url = client.build_editor_url(&EditorRequest::start(
        "dom-1",
        serial("TPL0042"),
        ProductId::new(42),
    ));
    let parsed = Url::parse(&url).unwrap();
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    assert!(pairs.contains(&("domain".to_string(), "dom-1".to_string())));
    assert!(pairs.contains(&("template".to_string(), "TPL0042".to_string())));
    assert!(pairs.contains(&("api_key".to_string(), "lg_live_test_key".to_string())));
    assert!(pairs.contains(&("productId".to_string(), "42".to_string())));
    assert!(pairs.contains(&(
        "return_url".to_string(),
        "https://shop.test/lg-return?lg_return=1".to_string()
    )));
}
