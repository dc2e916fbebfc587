//! Integration tests for `MapsClient` using wiremock HTTP mocks.

use jeffy_maps::{LatLng, MapsClient, MapsError, Waypoint};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> MapsClient {
    MapsClient::with_base_url("test-key", 30, base_url)
        .expect("client construction should not fail")
        .with_retry_policy(2, 0)
}

#[tokio::test]
async fn geocode_returns_first_match() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "OK",
        "results": [
            {
                "formatted_address": "1 High St, Leeds LS1 1AA, UK",
                "geometry": { "location": { "lat": 53.7997, "lng": -1.5492 } },
                "place_id": "abc123"
            },
            {
                "formatted_address": "1 High St, Leeds, Kent, UK",
                "geometry": { "location": { "lat": 51.25, "lng": 0.61 } }
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .and(query_param("key", "test-key"))
        .and(query_param("address", "1 High St, Leeds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client.geocode("1 High St, Leeds").await.expect("geocode");

    assert_eq!(result.formatted_address, "1 High St, Leeds LS1 1AA, UK");
    assert_eq!(
        result.location,
        LatLng {
            lat: 53.7997,
            lng: -1.5492
        }
    );
    assert_eq!(result.place_id.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn geocode_zero_results_is_no_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "ZERO_RESULTS", "results": [] })),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.geocode("nowhere").await.unwrap_err();
    assert!(matches!(err, MapsError::NoResults(_)), "got {err:?}");
}

#[tokio::test]
async fn quota_exceeded_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OVER_QUERY_LIMIT",
            "error_message": "You have exceeded your daily request quota for this API."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.geocode("Leeds").await.unwrap_err();
    assert!(matches!(err, MapsError::QuotaExceeded(_)), "got {err:?}");
}

#[tokio::test]
async fn request_denied_surfaces_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.geocode("Leeds").await.unwrap_err();
    match err {
        MapsError::ApiError { status, message } => {
            assert_eq!(status, "REQUEST_DENIED");
            assert_eq!(message, "The provided API key is invalid.");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [{
                "formatted_address": "York, UK",
                "geometry": { "location": { "lat": 53.96, "lng": -1.08 } }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client.geocode("York").await.expect("third attempt succeeds");
    assert_eq!(result.formatted_address, "York, UK");
}

#[tokio::test]
async fn http_errors_do_not_expose_the_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = MapsClient::with_base_url("SECRET-KEY-123", 30, &server.uri())
        .expect("client")
        .with_retry_policy(0, 0);
    let err = client.geocode("1 High St").await.unwrap_err();

    assert!(matches!(err, MapsError::Http(_)), "got {err:?}");
    assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");
    assert!(!format!("{err:?}").contains("SECRET-KEY-123"), "{err:?}");
}

#[tokio::test]
async fn throttled_requests_honour_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [{
                "formatted_address": "Leeds, UK",
                "geometry": { "location": { "lat": 53.8, "lng": -1.55 } }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Large base back-off: only the zero Retry-After keeps this test fast.
    let client = MapsClient::with_base_url("test-key", 30, &server.uri())
        .expect("client")
        .with_retry_policy(1, 60_000);
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), client.geocode("Leeds"))
        .await
        .expect("retry should not wait for the back-off")
        .expect("second attempt succeeds");
    assert_eq!(result.formatted_address, "Leeds, UK");
}

#[tokio::test]
async fn client_errors_fail_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.geocode("Nowhere").await.unwrap_err();
    assert!(matches!(err, MapsError::Http(_)), "got {err:?}");
}

#[tokio::test]
async fn directions_sums_legs_of_first_route() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "OK",
        "routes": [
            {
                "summary": "A64",
                "overview_polyline": { "points": "_p~iF~ps|U" },
                "legs": [
                    { "distance": { "value": 5000, "text": "5 km" }, "duration": { "value": 600, "text": "10 mins" } },
                    { "distance": { "value": 2500, "text": "2.5 km" }, "duration": { "value": 300, "text": "5 mins" } }
                ]
            },
            {
                "summary": "M1",
                "legs": [
                    { "distance": { "value": 9000, "text": "9 km" }, "duration": { "value": 500, "text": "8 mins" } }
                ]
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/directions/json"))
        .and(query_param("origin", "53.8,-1.55"))
        .and(query_param("destination", "1 High St, York"))
        .and(query_param("mode", "driving"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let route = client
        .directions(
            &Waypoint::from(LatLng {
                lat: 53.8,
                lng: -1.55,
            }),
            &Waypoint::from("1 High St, York"),
        )
        .await
        .expect("directions");

    assert_eq!(route.summary, "A64");
    assert_eq!(route.distance_meters, 7500);
    assert_eq!(route.duration_seconds, 900);
    assert_eq!(route.polyline.as_deref(), Some("_p~iF~ps|U"));
}

#[tokio::test]
async fn directions_without_routes_is_no_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/directions/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "OK", "routes": [] })),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .directions(&Waypoint::from("a"), &Waypoint::from("b"))
        .await
        .unwrap_err();
    assert!(matches!(err, MapsError::NoResults(_)));
}

#[tokio::test]
async fn distance_matrix_returns_one_cell_per_pair() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "OK",
        "origin_addresses": ["Leeds, UK"],
        "destination_addresses": ["York, UK", "Hull, UK"],
        "rows": [{
            "elements": [
                { "status": "OK", "distance": { "value": 40000, "text": "40 km" }, "duration": { "value": 2700, "text": "45 mins" } },
                { "status": "ZERO_RESULTS" }
            ]
        }]
    });

    Mock::given(method("GET"))
        .and(path("/distancematrix/json"))
        .and(query_param("origins", "Leeds"))
        .and(query_param("destinations", "York|Hull"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let matrix = client
        .distance_matrix(
            &[Waypoint::from("Leeds")],
            &[Waypoint::from("York"), Waypoint::from("Hull")],
        )
        .await
        .expect("matrix");

    assert_eq!(matrix.destinations, vec!["York, UK", "Hull, UK"]);
    assert_eq!(matrix.cells.len(), 2);
    assert_eq!(matrix.cells[0].duration_seconds, Some(2700));
    assert_eq!(matrix.cells[1].status, "ZERO_RESULTS");
    assert_eq!(matrix.cells[1].distance_meters, None);
}

#[tokio::test]
async fn distance_matrix_rejects_empty_input_without_calling_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .distance_matrix(&[], &[Waypoint::from("York")])
        .await
        .unwrap_err();
    assert!(matches!(err, MapsError::ApiError { .. }));
}
