use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;
use triple_s::services::storage_service::StorageService;

async fn test_app() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let storage = StorageService::open(dir.path()).await.unwrap();
    (dir, triple_s::app(storage))
}

async fn send(app: &Router, method: &str, uri: &str, body: Body) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_create_and_list_buckets() {
    let (_dir, app) = test_app().await;

    let response = send(&app, "PUT", "/alpha", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("<Location>/alpha</Location>"));

    let response = send(&app, "PUT", "/beta", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "GET", "/", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/xml"
    );
    let xml = body_string(response).await;
    assert!(xml.contains("<ListAllMyBucketsResult>"));
    assert!(xml.find("<Name>alpha</Name>").unwrap() < xml.find("<Name>beta</Name>").unwrap());
    assert_eq!(xml.matches("<Status>Active</Status>").count(), 2);
}

#[tokio::test]
async fn test_invalid_bucket_name_is_xml_error() {
    let (_dir, app) = test_app().await;

    for uri in ["/ab", "/AB-bucket", "/192.168.1.1", "/my..bucket"] {
        let response = send(&app, "PUT", uri, Body::empty()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let xml = body_string(response).await;
        assert!(xml.contains("<Error>"), "{uri}");
        assert!(xml.contains("<StatusCode>InvalidBucketName</StatusCode>"), "{uri}");
        assert!(xml.contains("<Message>"), "{uri}");
    }
}

#[tokio::test]
async fn test_duplicate_bucket_conflicts() {
    let (_dir, app) = test_app().await;
    assert_eq!(
        send(&app, "PUT", "/my-bucket", Body::empty()).await.status(),
        StatusCode::OK
    );
    let response = send(&app, "PUT", "/my-bucket", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(
        body_string(response)
            .await
            .contains("<StatusCode>Conflict</StatusCode>")
    );

    let xml = body_string(send(&app, "GET", "/", Body::empty()).await).await;
    assert_eq!(xml.matches("<Name>my-bucket</Name>").count(), 1);
}

#[tokio::test]
async fn test_put_and_get_object() {
    let (_dir, app) = test_app().await;
    send(&app, "PUT", "/docs", Body::empty()).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/docs/notes/today.txt")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("test data"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::ETAG));

    let response = send(&app, "GET", "/docs/notes/today.txt", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "9");
    assert!(response.headers().contains_key(header::LAST_MODIFIED));
    assert_eq!(body_string(response).await, "test data");

    let response = send(&app, "HEAD", "/docs/notes/today.txt", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "9");

    let xml = body_string(send(&app, "GET", "/docs", Body::empty()).await).await;
    assert!(xml.contains("<Key>notes/today.txt</Key>"));
    assert!(xml.contains("<Size>9</Size>"));
}

#[tokio::test]
async fn test_object_without_content_type_defaults_to_octet_stream() {
    let (_dir, app) = test_app().await;
    send(&app, "PUT", "/raw-data", Body::empty()).await;
    send(&app, "PUT", "/raw-data/blob", Body::from(vec![0u8, 1, 2, 255])).await;

    let response = send(&app, "GET", "/raw-data/blob", Body::empty()).await;
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), &[0u8, 1, 2, 255]);
}

#[tokio::test]
async fn test_missing_bucket_and_object_are_not_found() {
    let (_dir, app) = test_app().await;
    let response = send(&app, "PUT", "/ghost/key", Body::from("x")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(
        body_string(response)
            .await
            .contains("<StatusCode>NotFound</StatusCode>")
    );

    send(&app, "PUT", "/present", Body::empty()).await;
    assert_eq!(
        send(&app, "GET", "/present/none", Body::empty()).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        send(&app, "DELETE", "/present/none", Body::empty()).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        send(&app, "DELETE", "/ghost", Body::empty()).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_status_flips_with_object_count() {
    let (_dir, app) = test_app().await;
    send(&app, "PUT", "/cycle", Body::empty()).await;
    send(&app, "PUT", "/cycle/only", Body::from("1")).await;

    let response = send(&app, "DELETE", "/cycle/only", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let xml = body_string(send(&app, "GET", "/", Body::empty()).await).await;
    assert!(xml.contains("<Status>MarkedForDeletion</Status>"));

    send(&app, "PUT", "/cycle/again", Body::from("2")).await;
    let xml = body_string(send(&app, "GET", "/", Body::empty()).await).await;
    assert!(xml.contains("<Status>Active</Status>"));
    assert!(!xml.contains("MarkedForDeletion"));
}

#[tokio::test]
async fn test_delete_bucket_requires_empty_registry() {
    let (dir, app) = test_app().await;
    send(&app, "PUT", "/full", Body::empty()).await;
    send(&app, "PUT", "/full/item", Body::from("x")).await;

    let response = send(&app, "DELETE", "/full", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    send(&app, "DELETE", "/full/item", Body::empty()).await;
    let response = send(&app, "DELETE", "/full", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!dir.path().join("full").exists());

    let xml = body_string(send(&app, "GET", "/", Body::empty()).await).await;
    assert!(!xml.contains("<Name>full</Name>"));
}

#[tokio::test]
async fn test_malformed_path_and_unsupported_method() {
    let (_dir, app) = test_app().await;

    let response = send(&app, "GET", "//key", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_string(response)
            .await
            .contains("<StatusCode>BadRequest</StatusCode>")
    );

    let response = send(&app, "POST", "/bucket", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(
        body_string(response)
            .await
            .contains("<StatusCode>MethodNotAllowed</StatusCode>")
    );
}

#[tokio::test]
async fn test_health_endpoints() {
    let (_dir, app) = test_app().await;
    assert_eq!(
        send(&app, "GET", "/_healthz", Body::empty()).await.status(),
        StatusCode::OK
    );
    let response = send(&app, "GET", "/_readyz", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("\"status\":\"ok\""));

    // Health paths cannot be claimed as buckets.
    let response = send(&app, "PUT", "/_healthz", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_string(response)
            .await
            .contains("<StatusCode>InvalidBucketName</StatusCode>")
    );
}

#[tokio::test]
async fn test_buckets_named_like_health_paths_list_their_objects() {
    let (_dir, app) = test_app().await;
    for bucket in ["healthz", "readyz"] {
        assert_eq!(
            send(&app, "PUT", &format!("/{bucket}"), Body::empty()).await.status(),
            StatusCode::OK
        );
        send(&app, "PUT", &format!("/{bucket}/item"), Body::from("x")).await;

        let response = send(&app, "GET", &format!("/{bucket}"), Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let xml = body_string(response).await;
        assert!(xml.contains("<ListBucketResult>"), "{xml}");
        assert!(xml.contains("<Key>item</Key>"), "{xml}");
    }
}

#[tokio::test]
async fn test_registry_file_name_is_an_ordinary_bucket() {
    let (dir, app) = test_app().await;
    let response = send(&app, "PUT", "/buckets.csv", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(dir.path().join("buckets.csv").is_dir());

    let xml = body_string(send(&app, "GET", "/", Body::empty()).await).await;
    assert!(xml.contains("<Name>buckets.csv</Name>"));
}
