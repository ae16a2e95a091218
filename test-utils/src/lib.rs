//! `test-utils` is used for testing `volley-lib`.
//! This crate does not depend on `volley-lib`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Create a mock web server which answers `GET <path>` with the given
/// status, expecting exactly `$calls` requests.
/// The expectation is verified when the server is dropped.
#[macro_export]
macro_rules! counting_mock_server {
    ($path:expr, $status:expr, $calls:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path($path))
            .respond_with(template)
            .expect($calls)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}

/// Set up a mock server which has two routes: `/ok` and `/redirect`.
/// Calling `/redirect` returns a HTTP Location header redirecting to `/ok`
#[macro_export]
macro_rules! redirecting_mock_server {
    ($f:expr) => {{
        use std::str::FromStr;
        use url::Url;

        async {
            let mock_server = wiremock::MockServer::start().await;
            let ok_url = Url::from_str(&format!("{}/ok", mock_server.uri())).unwrap();
            let redirect_url = Url::from_str(&format!("{}/redirect", mock_server.uri())).unwrap();

            // Set up redirect
            let redirect = wiremock::ResponseTemplate::new(http::StatusCode::FOUND)
                .insert_header("Location", ok_url.as_str());
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/redirect"))
                .respond_with(redirect)
                .mount(&mock_server)
                .await;

            let ok = wiremock::ResponseTemplate::new(http::StatusCode::OK).set_body_string("ok");
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/ok"))
                .respond_with(ok)
                .mount(&mock_server)
                .await;

            $f(redirect_url, ok_url).await;
        }
    }};
}

/// Build a `volley_lib::Request` for the given URL, optionally with
/// `RequestOptions` builder calls.
///
/// # Panic
///
/// This panics on an invalid URL, so it should only be used for testing
#[macro_export]
macro_rules! request {
    ($url:expr) => {
        volley_lib::Request::new(&$url.to_string()).expect("Expected valid request URL")
    };
    ($url:expr, $($func:tt ($($arg:expr),*)).+) => {
        volley_lib::Request::with_options(
            &$url.to_string(),
            volley_lib::RequestOptions::builder()$(.$func($($arg),*))+.build(),
        )
        .expect("Expected valid request URL")
    };
}
