use super::*;

fn test_client(base_url: &str) -> MapsClient {
    MapsClient::with_base_url("test-key", 30, base_url)
        .expect("client construction should not fail")
}

#[test]
fn build_url_appends_endpoint_and_key() {
    let client = test_client("https://maps.example.com/maps/api");
    let url = client
        .build_url("geocode/json", &[("address", "Leeds")])
        .unwrap();
    assert_eq!(
        url.as_str(),
        "https://maps.example.com/maps/api/geocode/json?key=test-key&address=Leeds"
    );
}

#[test]
fn build_url_tolerates_trailing_slash() {
    let client = test_client("https://maps.example.com/maps/api/");
    let url = client
        .build_url("directions/json", &[("origin", "a"), ("destination", "b")])
        .unwrap();
    assert_eq!(
        url.as_str(),
        "https://maps.example.com/maps/api/directions/json?key=test-key&origin=a&destination=b"
    );
}

#[test]
fn build_url_encodes_special_characters() {
    let client = test_client("https://maps.example.com");
    let url = client
        .build_url("geocode/json", &[("address", "1 High St, Leeds & York")])
        .unwrap();
    assert!(
        url.as_str().contains("%26"),
        "ampersand must be percent-encoded: {url}"
    );
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = MapsClient::with_base_url("k", 5, "not a url").unwrap_err();
    assert!(matches!(err, MapsError::InvalidBaseUrl { .. }));
}

#[test]
fn check_status_maps_each_envelope_status() {
    let ok = serde_json::json!({ "status": "OK" });
    assert!(check_status(&ok, "x").is_ok());

    let zero = serde_json::json!({ "status": "ZERO_RESULTS" });
    assert!(matches!(check_status(&zero, "x"), Err(MapsError::NoResults(_))));

    let quota = serde_json::json!({ "status": "OVER_QUERY_LIMIT", "error_message": "slow down" });
    assert!(matches!(
        check_status(&quota, "x"),
        Err(MapsError::QuotaExceeded(ref m)) if m == "slow down"
    ));

    let denied = serde_json::json!({ "status": "REQUEST_DENIED" });
    assert!(matches!(
        check_status(&denied, "x"),
        Err(MapsError::ApiError { ref status, .. }) if status == "REQUEST_DENIED"
    ));

    let missing = serde_json::json!({});
    assert!(matches!(check_status(&missing, "x"), Err(MapsError::ApiError { .. })));
}

#[test]
fn join_waypoints_uses_pipes() {
    let joined = join_waypoints(&[
        Waypoint::from("Leeds"),
        Waypoint::from(crate::types::LatLng { lat: 53.9, lng: -1.08 }),
    ]);
    assert_eq!(joined, "Leeds|53.9,-1.08");
}

#[test]
fn retry_after_reads_delay_seconds_only() {
    let secs = HeaderValue::from_static(" 7 ");
    assert_eq!(parse_retry_after(Some(&secs)), Some(Duration::from_secs(7)));
    let date = HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT");
    assert_eq!(parse_retry_after(Some(&date)), None);
    assert_eq!(parse_retry_after(None), None);
}
