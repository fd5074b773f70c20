use std::time::Duration;

use page_extractor::{FailureKind, FetchSettings, ReqwestTransport, Transport};
use tokio::runtime::Runtime;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// The transport blocks on its own runtime, so the mock server lives on a separate one
// and the transport is driven from the plain test thread.
struct Served {
    server: MockServer,
    _runtime: Runtime,
}

impl Served {
    fn url(&self, route: &str) -> Url {
        Url::parse(&format!("{}{}", self.server.uri(), route)).unwrap()
    }
}

fn serve(route: &str, response: ResponseTemplate) -> Served {
    serve_all(vec![(route, response)])
}

fn serve_all(routes: Vec<(&str, ResponseTemplate)>) -> Served {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        for (route, response) in routes {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(response)
                .mount(&server)
                .await;
        }
        server
    });
    Served {
        server,
        _runtime: runtime,
    }
}

#[test]
fn transport_returns_bytes_and_headers() {
    let served = serve(
        "/photo.png",
        ResponseTemplate::new(200)
            .insert_header("Last-Modified", "Sun, 06 Nov 1994 08:49:37 GMT")
            .set_body_raw(vec![7u8; 64], "image/png"),
    );
    let url = served.url("/photo.png");

    let transport = ReqwestTransport::new().expect("runtime");
    let output = transport
        .fetch(&url, &FetchSettings::default())
        .expect("fetch ok");
    assert_eq!(output.metadata.original_url, url.as_str());
    assert_eq!(output.metadata.final_url, output.metadata.original_url);
    assert_eq!(output.metadata.redirect_count, 0);
    assert_eq!(output.metadata.content_type(), Some("image/png"));
    assert_eq!(output.metadata.headers.content_length(), Some(64));
    assert_eq!(
        output.metadata.headers.last_modified(),
        Some("Sun, 06 Nov 1994 08:49:37 GMT")
    );
    assert_eq!(output.bytes, vec![7u8; 64]);
}

#[test]
fn transport_fails_on_http_status() {
    let served = serve("/missing.jpg", ResponseTemplate::new(404));
    let transport = ReqwestTransport::new().unwrap();
    let err = transport
        .fetch(&served.url("/missing.jpg"), &FetchSettings::default())
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[test]
fn transport_times_out_on_slow_response() {
    let served = serve(
        "/slow.jpg",
        ResponseTemplate::new(200)
            .set_delay(Duration::from_millis(500))
            .set_body_string("slow"),
    );
    let settings = FetchSettings {
        read_timeout: Duration::from_millis(50),
        request_timeout: Duration::from_millis(100),
        ..FetchSettings::default()
    };
    let transport = ReqwestTransport::new().unwrap();
    let err = transport
        .fetch(&served.url("/slow.jpg"), &settings)
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[test]
fn transport_rejects_too_large_response() {
    let served = serve(
        "/large.jpg",
        ResponseTemplate::new(200)
            .insert_header("Content-Type", "image/jpeg")
            .set_body_string("01234567890"),
    );
    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let transport = ReqwestTransport::new().unwrap();
    let err = transport
        .fetch(&served.url("/large.jpg"), &settings)
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[test]
fn transport_refuses_non_http_urls() {
    let transport = ReqwestTransport::new().unwrap();
    let url = Url::parse("data:image/png;base64,AAAA").unwrap();
    let err = transport.fetch(&url, &FetchSettings::default()).unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[test]
fn one_transport_serves_sequential_fetches_and_counts_redirects() {
    let served = serve_all(vec![
        ("/a.png", ResponseTemplate::new(200).set_body_raw(vec![1u8; 8], "image/png")),
        (
            "/old.png",
            ResponseTemplate::new(301).insert_header("Location", "/b.png"),
        ),
        ("/b.png", ResponseTemplate::new(200).set_body_raw(vec![2u8; 8], "image/png")),
    ]);
    let transport = ReqwestTransport::new().unwrap();
    let settings = FetchSettings::default();

    let first = transport.fetch(&served.url("/a.png"), &settings).unwrap();
    assert_eq!(first.bytes, vec![1u8; 8]);
    assert_eq!(first.metadata.redirect_count, 0);

    let second = transport.fetch(&served.url("/old.png"), &settings).unwrap();
    assert_eq!(second.bytes, vec![2u8; 8]);
    assert_eq!(second.metadata.redirect_count, 1);
    assert_eq!(second.metadata.original_url, served.url("/old.png").as_str());
    assert_eq!(second.metadata.final_url, served.url("/b.png").as_str());
}

#[test]
fn transport_stops_at_redirect_limit() {
    let served = serve(
        "/loop.png",
        ResponseTemplate::new(302).insert_header("Location", "/loop.png"),
    );
    let settings = FetchSettings {
        redirect_limit: 2,
        ..FetchSettings::default()
    };
    let transport = ReqwestTransport::new().unwrap();
    let err = transport
        .fetch(&served.url("/loop.png"), &settings)
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::RedirectLimitExceeded);
}
