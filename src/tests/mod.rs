use chrono::NaiveDate;
use mockito::{Matcher, Server};

use crate::api::{ApiClient, ClientOptions};
use crate::engine::{classify, derive_columns, group_records, DeleteTarget};
use crate::error::{Error, GENERIC_CONNECT_FAILURE, GENERIC_INVALID_RESPONSE};
use crate::model::{
    AttendanceStatus, BulkAttendanceRequest, BulkEntry, FilteredReportRequest, ReportType,
    StartSessionRequest,
};

fn client_for(url: &str) -> ApiClient {
    ApiClient::new(&ClientOptions {
        base_url: url.to_string(),
        timeout_seconds: 5,
        proxy: None,
        header: Some("X-Token: abc".to_string()),
    })
    .unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn export_request() -> FilteredReportRequest {
    FilteredReportRequest {
        semester: 3,
        branch: "CSE".to_string(),
        subject: String::new(),
        report_type: ReportType::Monthly,
        start_date: day(2024, 8, 1),
        end_date: day(2024, 8, 31),
        include_present: true,
        include_absent: true,
    }
}

#[tokio::test]
async fn subjects_load_with_custom_header() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/subjects/getbysemesterandbranch/3/CSE")
        .match_header("x-token", "abc")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"code":"CS301","name":"Compilers"},{"code":"CS302","name":"Networks"}]"#)
        .expect(1)
        .create_async()
        .await;

    let subjects = client_for(&server.url())
        .subjects_by_semester_and_branch(3, "CSE")
        .await
        .unwrap();
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0].code, "CS301");
    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_message_is_surfaced_verbatim() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/students/getbysemester/7")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"No students in semester 7"}"#)
        .create_async()
        .await;

    let err = client_for(&server.url())
        .students_by_semester(7)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Server { status: 404, .. }));
    assert_eq!(err.user_message(), "No students in semester 7");
}

#[tokio::test]
async fn malformed_body_becomes_generic_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/mark/getall")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let err = client_for(&server.url()).all_records().await.unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
    assert_eq!(err.user_message(), GENERIC_INVALID_RESPONSE);
}

#[tokio::test]
async fn object_where_array_expected_is_rejected() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/students/getall")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"database offline"}"#)
        .create_async()
        .await;

    let err = client_for(&server.url()).all_students().await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedShape {
            expected: "an array",
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let err = client_for("http://127.0.0.1:1")
        .branches()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    assert_eq!(err.user_message(), GENERIC_CONNECT_FAILURE);
}

#[tokio::test]
async fn records_are_filtered_by_query_and_grouped() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/mark/get")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("date".into(), "2024-08-01".into()),
            Matcher::UrlEncoded("semester".into(), "3".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
                {"_id":"65f0c0ffee65f0c0ffee65f0","roll_no":"1","name":"Asha","branch":"CSE","subject_code":"CS2","date":"2024-08-01","status":"Present"},
                {"roll":"1","name":"Asha","branch":"CSE","subject":"CS1","date":"2024-08-01","status":"present"},
                {"roll_no":"2","name":"Ravi","branch":"CSE","subject_code":"CS1","date":"2024-08-01","status":"late"},
                {"roll_no":"1","name":"Asha","branch":"CSE","subject_code":"CS1","date":"2024-08-01","status":"absent"}
            ]"#,
        )
        .create_async()
        .await;

    let records = client_for(&server.url())
        .records(day(2024, 8, 1), 3, None)
        .await
        .unwrap();
    let grouped = group_records(&records);
    assert_eq!(grouped.rolls().collect::<Vec<_>>(), vec!["1", "2"]);
    assert_eq!(derive_columns(&grouped), vec!["CS1", "CS2"]);
    let asha = grouped.get("1").unwrap();
    assert_eq!(asha.status_for("CS1"), AttendanceStatus::Absent);
    assert_eq!(asha.status_for("CS2"), AttendanceStatus::Present);
    assert_eq!(
        grouped.get("2").unwrap().status_for("CS1"),
        AttendanceStatus::Absent
    );
}

#[tokio::test]
async fn delete_routes_by_identifier_shape() {
    let mut server = Server::new_async().await;
    let by_id = server
        .mock("DELETE", "/record/delete/65F0C0FFEE65F0C0FFEE65F0")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Record deleted"}"#)
        .expect(1)
        .create_async()
        .await;
    let by_roll = server
        .mock("DELETE", "/mark/delete_by_roll/21CS01")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"No records found for roll 21CS01"}"#)
        .expect(1)
        .create_async()
        .await;

    let api = client_for(&server.url());
    let id_target = classify(" 65F0C0FFEE65F0C0FFEE65F0 ");
    assert!(matches!(id_target, DeleteTarget::SingleRecord(_)));
    assert_eq!(
        api.delete(&id_target).await.unwrap().as_deref(),
        Some("Record deleted")
    );

    let err = api.delete(&classify("21CS01")).await.unwrap_err();
    assert_eq!(err.user_message(), "No records found for roll 21CS01");

    by_id.assert_async().await;
    by_roll.assert_async().await;
}

#[tokio::test]
async fn path_segments_are_percent_encoded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("DELETE", "/mark/delete_by_roll/21%2FCS%2001")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"deleted"}"#)
        .expect(1)
        .create_async()
        .await;

    let message = client_for(&server.url())
        .delete(&DeleteTarget::RollNumber(" 21/CS 01 ".to_string()))
        .await
        .unwrap();
    assert_eq!(message.as_deref(), Some("deleted"));
    mock.assert_async().await;
}

#[tokio::test]
async fn empty_bulk_never_reaches_the_server() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/mark/bulk")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let err = client_for(&server.url())
        .bulk_upsert(&BulkAttendanceRequest {
            attendance: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(err.is_precondition());
    mock.assert_async().await;
}

#[tokio::test]
async fn bulk_posts_lowercase_statuses() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/mark/bulk")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""roll_no":"1""#.to_string()),
            Matcher::Regex(r#""subject_code":"CS1""#.to_string()),
            Matcher::Regex(r#""date":"2024-08-01""#.to_string()),
            Matcher::Regex(r#""status":"present""#.to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"1 records upserted"}"#)
        .expect(1)
        .create_async()
        .await;

    let request = BulkAttendanceRequest {
        attendance: vec![BulkEntry {
            roll_no: "1".to_string(),
            name: "Asha".to_string(),
            branch: "CSE".to_string(),
            semester: 3,
            subject_code: "CS1".to_string(),
            date: day(2024, 8, 1),
            status: AttendanceStatus::Present,
        }],
    };
    let message = client_for(&server.url())
        .bulk_upsert(&request)
        .await
        .unwrap();
    assert_eq!(message.as_deref(), Some("1 records upserted"));
    mock.assert_async().await;
}

#[tokio::test]
async fn export_rejects_empty_file_and_surfaces_text_errors() {
    let mut server = Server::new_async().await;
    let empty = server
        .mock("POST", "/mark/generate_filtered_report")
        .with_status(200)
        .with_body("")
        .expect(1)
        .create_async()
        .await;

    let api = client_for(&server.url());
    let err = api
        .generate_filtered_report(&export_request())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyReport { .. }));
    assert_eq!(err.user_message(), "Empty file received.");
    empty.assert_async().await;

    let mut server = Server::new_async().await;
    let _failing = server
        .mock("POST", "/mark/generate_filtered_report")
        .with_status(500)
        .with_body("No attendance in range")
        .create_async()
        .await;
    let err = client_for(&server.url())
        .generate_filtered_report(&export_request())
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "No attendance in range");
}

#[tokio::test]
async fn export_returns_bytes() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/mark/generate_filtered_report")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "report_type": "monthly",
            "start_date": "2024-08-01",
            "end_date": "2024-08-31",
            "subject": ""
        })))
        .with_status(200)
        .with_body(vec![0x50, 0x4b, 0x03, 0x04])
        .create_async()
        .await;

    let bytes = client_for(&server.url())
        .generate_filtered_report(&export_request())
        .await
        .unwrap();
    assert_eq!(bytes, vec![0x50, 0x4b, 0x03, 0x04]);
}

#[tokio::test]
async fn student_lookup_maps_not_found_to_none() {
    let mut server = Server::new_async().await;
    let _found = server
        .mock("GET", "/api/student")
        .match_query(Matcher::UrlEncoded("roll".into(), "21CS01".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"roll":"21CS01","name":"Asha","branch":"CSE","semester":3}"#)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/api/student")
        .match_query(Matcher::UrlEncoded("roll".into(), "99".into()))
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Student not found"}"#)
        .create_async()
        .await;

    let api = client_for(&server.url());
    let found = api.student_lookup("21CS01", "cse", 3).await.unwrap();
    assert_eq!(found.map(|s| s.name).as_deref(), Some("Asha"));
    assert!(api.student_lookup("99", "CSE", 3).await.unwrap().is_none());
}

#[tokio::test]
async fn branches_are_normalized_and_deduplicated() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/students/getbranches")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"["cse"," CSE ","ECE","",null]"#)
        .create_async()
        .await;

    let branches = client_for(&server.url()).branches().await.unwrap();
    assert_eq!(branches, vec!["CSE", "ECE"]);
}

#[tokio::test]
async fn start_session_reports_sheet_name() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/start-attendance")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "subject_code": "CS301",
            "timing": "10:00-11:00"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"started","excel_file":"CS301_2024-08-01.xlsx"}"#)
        .create_async()
        .await;

    let response = client_for(&server.url())
        .start_session(&StartSessionRequest {
            subject_code: "CS301".to_string(),
            semester: 3,
            branch: "CSE".to_string(),
            timing: "10:00-11:00".to_string(),
            date: day(2024, 8, 1),
        })
        .await
        .unwrap();
    assert_eq!(response.excel_file.as_deref(), Some("CS301_2024-08-01.xlsx"));
}
