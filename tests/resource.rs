use httpdispatch::{
    Dispatcher, ErrorHandler, ErrorInfo, Handler, HttpError, Reply, ResponseDefaults, Route, Router,
};
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Body, Method, Request, StatusCode};
use std::fs;
use tempfile::TempDir;

fn site() -> (TempDir, Dispatcher) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
    fs::create_dir(dir.path().join("css")).unwrap();
    fs::write(dir.path().join("css").join("site.css"), "body { margin: 0 }").unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs").join("index.html"), "<h1>docs</h1>").unwrap();
    fs::write(dir.path().join("data.json"), r#"{"ok":true}"#).unwrap();

    let dispatcher = Router::default()
        .resource("/static/*", dir.path())
        .unwrap()
        .fix();
    (dir, dispatcher)
}

async fn send(dispatcher: &Dispatcher, method: Method, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    fetch(dispatcher, req).await
}

async fn fetch(dispatcher: &Dispatcher, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = dispatcher.serve(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn serves_files_with_guessed_content_type() {
    let (_dir, dispatcher) = site();

    let (status, headers, body) = send(&dispatcher, Method::GET, "/static/css/site.css").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/css");
    assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "18");
    assert_eq!(body, b"body { margin: 0 }");

    let (_, headers, _) = send(&dispatcher, Method::GET, "/static/data.json").await;
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
}

#[tokio::test]
async fn directories_serve_their_index() {
    let (_dir, dispatcher) = site();

    let (status, headers, body) = send(&dispatcher, Method::GET, "/static/docs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/html");
    assert_eq!(body, b"<h1>docs</h1>");
}

#[tokio::test]
async fn head_requests_have_no_body() {
    let (_dir, dispatcher) = site();

    let (status, headers, body) = send(&dispatcher, Method::HEAD, "/static/css/site.css").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "18");
    assert!(body.is_empty());
}

#[tokio::test]
async fn missing_files_and_traversal_are_404() {
    let (_dir, dispatcher) = site();

    let (status, _, _) = send(&dispatcher, Method::GET, "/static/nope.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&dispatcher, Method::GET, "/static/%2E%2E/secret").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&dispatcher, Method::GET, "/static/css%2F..%2F..%2Fsecret").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resources_only_serve_reads() {
    let (_dir, dispatcher) = site();

    let (status, headers, _) = send(&dispatcher, Method::POST, "/static/css/site.css").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers.get(header::ALLOW).unwrap(), "GET, HEAD");
}

#[tokio::test]
async fn missing_files_use_error_routes() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Router::default()
        .resource("/assets/*", dir.path())
        .unwrap()
        .error(404, 0, "/assets", ErrorHandler::sync(|info: &ErrorInfo, _: Reply| {
            Ok::<_, HttpError>(format!("no asset at {}", info.path))
        }))
        .unwrap()
        .fix();

    let (status, _, body) = send(&dispatcher, Method::GET, "/assets/logo.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"no asset at /assets/logo.png");
}

#[tokio::test]
async fn unchanged_files_are_304() {
    let (_dir, dispatcher) = site();

    let (status, headers, _) = send(&dispatcher, Method::GET, "/static/css/site.css").await;
    assert_eq!(status, StatusCode::OK);
    let etag = headers.get(header::ETAG).unwrap().clone();
    assert!(etag.to_str().unwrap().starts_with("\"12-"));

    let req = Request::builder()
        .uri("/static/css/site.css")
        .header(header::IF_NONE_MATCH, etag.clone())
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = fetch(&dispatcher, req).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert_eq!(headers.get(header::ETAG).unwrap(), &etag);
    assert!(body.is_empty());

    let req = Request::builder()
        .uri("/static/css/site.css")
        .header(header::IF_NONE_MATCH, HeaderValue::from_static("\"0-0\""))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = fetch(&dispatcher, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"body { margin: 0 }");
}

#[tokio::test]
async fn uncached_resources_have_no_etag() {
    let (dir, _) = site();
    let dispatcher = Router::default()
        .add(
            Route::new("/static/*", Handler::resource(dir.path()))
                .defaults(ResponseDefaults::new().cache(false)),
        )
        .unwrap()
        .fix();

    let req = Request::builder()
        .uri("/static/index.html")
        .header(header::IF_NONE_MATCH, HeaderValue::from_static("*"))
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = fetch(&dispatcher, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::ETAG).is_none());
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-cache, no-store, must-revalidate");
    assert_eq!(body, b"<h1>home</h1>");
}
