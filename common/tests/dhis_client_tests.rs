// Reporting API client against a mock reporting server

use common::dhis::{Dhis2Client, PeriodTypeCatalog, ReportingDispatch};
use common::errors::IntegrationError;
use common::models::{DataPoint, DataPointSet};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn data_point_set(org_unit: &str) -> DataPointSet {
    DataPointSet {
        data_set: "ds1".to_string(),
        period: "202301".to_string(),
        org_unit: org_unit.to_string(),
        data_values: vec![DataPoint {
            data_element: "C100".to_string(),
            category_option_combo: "default".to_string(),
            value: 12.0,
        }],
    }
}

fn client() -> Dhis2Client {
    Dhis2Client::new(5).unwrap()
}

#[tokio::test]
async fn test_send_posts_payload_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dataValueSets"))
        .and(basic_auth("admin", "district"))
        .and(body_partial_json(json!({
            "dataSet": "ds1",
            "period": "202301",
            "orgUnit": "HC01",
            "dataValues": [{"dataElement": "C100", "categoryOptionCombo": "default", "value": 12.0}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "importCount": {"imported": 1, "updated": 0, "ignored": 0, "deleted": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client()
        .send(&data_point_set("HC01"), &server.uri(), "admin", "district")
        .await
        .unwrap();

    assert_eq!(summary.status, "SUCCESS");
    assert_eq!(summary.import_count.imported, 1);
}

#[tokio::test]
async fn test_send_accepts_wrapped_summary_and_trailing_slash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dataValueSets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "httpStatus": "OK",
            "response": {"status": "SUCCESS", "importCount": {"updated": 1}}
        })))
        .mount(&server)
        .await;

    let summary = client()
        .send(
            &data_point_set("HC01"),
            &format!("{}/", server.uri()),
            "admin",
            "district",
        )
        .await
        .unwrap();

    assert_eq!(summary.import_count.updated, 1);
}

#[tokio::test]
async fn test_send_conflict_is_client_error_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dataValueSets"))
        .respond_with(ResponseTemplate::new(409).set_body_string("period is locked"))
        .mount(&server)
        .await;

    let err = client()
        .send(&data_point_set("HC01"), &server.uri(), "admin", "district")
        .await
        .unwrap_err();

    match err {
        IntegrationError::ClientError { status, body } => {
            assert_eq!(status, 409);
            assert_eq!(body, "period is locked");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_send_unreachable_server_is_connection_failure() {
    let err = client()
        .send(&data_point_set("HC01"), "http://127.0.0.1:1", "admin", "district")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "connection_failed");
}

#[tokio::test]
async fn test_period_type_lookup_matches_exact_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/periodTypes"))
        .and(query_param("fields", "name,isoFormat,frequencyOrder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "periodTypes": [
                {"name": "Monthly", "isoFormat": "yyyyMM", "frequencyOrder": 30},
                {"name": "Quarterly", "isoFormat": "yyyyQn", "frequencyOrder": 91}
            ]
        })))
        .mount(&server)
        .await;

    let period_type = client()
        .lookup("Quarterly", &server.uri(), "admin", "district")
        .await
        .unwrap();
    assert_eq!(period_type.name, "Quarterly");
    assert_eq!(period_type.iso_format, "yyyyQn");

    let err = client()
        .lookup("quarterly", &server.uri(), "admin", "district")
        .await
        .unwrap_err();
    assert!(matches!(err, IntegrationError::PeriodTypeNotFound(name) if name == "quarterly"));
}

#[tokio::test]
async fn test_period_type_lookup_missing_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/periodTypes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "periodTypes": [{"name": "Monthly", "isoFormat": "yyyyMM"}]
        })))
        .mount(&server)
        .await;

    let err = client()
        .lookup("FinancialApril", &server.uri(), "admin", "district")
        .await
        .unwrap_err();

    assert!(matches!(err, IntegrationError::PeriodTypeNotFound(name) if name == "FinancialApril"));
}

#[tokio::test]
async fn test_period_type_lookup_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/periodTypes"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client()
        .lookup("Monthly", &server.uri(), "admin", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, IntegrationError::ClientError { status: 401, .. }));
}

#[tokio::test]
async fn test_organisation_unit_codes_skip_units_without_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/organisationUnits"))
        .and(query_param("paging", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organisationUnits": [{"code": "HC01"}, {}, {"code": "HC02"}]
        })))
        .mount(&server)
        .await;

    let codes = client()
        .organisation_unit_codes(&server.uri(), "admin", "district")
        .await
        .unwrap();

    assert_eq!(codes, vec!["HC01", "HC02"]);
}
