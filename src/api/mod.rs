//! Thin client over the attendance service. Every body is treated as
//! untrusted: non-2xx, unparseable JSON and wrong shapes all come back as
//! typed [`Error`]s instead of panics.

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, error, warn};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::engine::DeleteTarget;
use crate::error::{Error, Result};
use crate::model::{
    AddSubjectRequest, AttendanceRecord, BulkAttendanceRequest, FilteredReportRequest,
    MessageBody, RegisterRequest, SaveAttendanceRequest, StartSessionRequest,
    StartSessionResponse, Student, Subject,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const USER_AGENT: &str = concat!("rollbook/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout_seconds: usize,
    pub proxy: Option<String>,
    /// Extra `Key: Value` header sent with every request.
    pub header: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 10,
            proxy: None,
            header: None,
        }
    }
}

fn build_http_client(options: &ClientOptions) -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );
    if let Some(raw) = options.header.as_deref().filter(|h| !h.trim().is_empty()) {
        let (key, value) = parse_header(raw)?;
        headers.insert(key, value);
    }

    let timeout = Duration::from_secs(options.timeout_seconds.try_into().unwrap_or(10));
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout);

    if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| Error::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| Error::HttpClientBuild { source: e })
}

fn parse_header(
    raw: &str,
) -> Result<(reqwest::header::HeaderName, reqwest::header::HeaderValue)> {
    let invalid = || Error::Config {
        message: format!("invalid header '{raw}', expected 'Key: Value'"),
    };
    let (key, value) = raw.split_once(':').ok_or_else(invalid)?;
    let key = reqwest::header::HeaderName::from_str(key.trim()).map_err(|_| invalid())?;
    let value = reqwest::header::HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
    Ok((key, value))
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let base_url = options.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config {
                message: "base_url must not be empty".to_string(),
            });
        }
        Ok(Self {
            http: build_http_client(options)?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn subjects_by_semester_and_branch(
        &self,
        semester: u8,
        branch: &str,
    ) -> Result<Vec<Subject>> {
        let path = format!(
            "/subjects/getbysemesterandbranch/{semester}/{}",
            urlencoding::encode(branch.trim())
        );
        self.get_array(&path, &[]).await
    }

    pub async fn subjects_by_semester(&self, semester: u8) -> Result<Vec<Subject>> {
        self.get_array(&format!("/subjects/getbysemester/{semester}"), &[])
            .await
    }

    pub async fn students_by_semester(&self, semester: u8) -> Result<Vec<Student>> {
        self.get_array(&format!("/students/getbysemester/{semester}"), &[])
            .await
    }

    pub async fn all_students(&self) -> Result<Vec<Student>> {
        self.get_array("/students/getall", &[]).await
    }

    /// Distinct branch names, trimmed and upper-cased, blanks dropped.
    pub async fn branches(&self) -> Result<Vec<String>> {
        let raw: Vec<Value> = self.get_array("/students/getbranches", &[]).await?;
        let mut out: Vec<String> = Vec::with_capacity(raw.len());
        for value in raw {
            if let Some(branch) = value.as_str().map(crate::model::normalize_branch) {
                if !branch.is_empty() && !out.contains(&branch) {
                    out.push(branch);
                }
            }
        }
        Ok(out)
    }

    pub async fn all_records(&self) -> Result<Vec<AttendanceRecord>> {
        self.get_array("/mark/getall", &[]).await
    }

    /// Records for a date and semester, optionally narrowed to one subject.
    pub async fn records(
        &self,
        date: NaiveDate,
        semester: u8,
        subject: Option<&str>,
    ) -> Result<Vec<AttendanceRecord>> {
        let mut query = vec![
            ("date", date.format("%Y-%m-%d").to_string()),
            ("semester", semester.to_string()),
        ];
        if let Some(subject) = subject.map(str::trim).filter(|s| !s.is_empty()) {
            query.push(("subject", subject.to_string()));
        }
        self.get_array("/mark/get", &query).await
    }

    /// Submit a whole table in one request. The store upserts per row; a
    /// failure is reported for the batch as a whole.
    pub async fn bulk_upsert(&self, request: &BulkAttendanceRequest) -> Result<Option<String>> {
        if request.attendance.is_empty() {
            return Err(Error::precondition("No rows to submit."));
        }
        self.send_json(Method::POST, "/mark/bulk", Some(request))
            .await
    }

    /// Server-rendered spreadsheet bytes. A non-2xx text body becomes the
    /// error message; an empty 2xx body is an error.
    pub async fn generate_filtered_report(
        &self,
        request: &FilteredReportRequest,
    ) -> Result<Vec<u8>> {
        let path = "/mark/generate_filtered_report";
        let response = self
            .execute(path, self.request(Method::POST, path).json(request))
            .await?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport(path, e))?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            let message = serde_json::from_str::<MessageBody>(&text)
                .ok()
                .and_then(|b| b.error_text().map(str::to_string))
                .or_else(|| Some(text).filter(|t| !t.is_empty()));
            return Err(server_error(path, status.as_u16(), message));
        }
        if bytes.is_empty() {
            return Err(Error::EmptyReport {
                endpoint: path.to_string(),
            });
        }
        Ok(bytes.to_vec())
    }

    pub async fn delete(&self, target: &DeleteTarget) -> Result<Option<String>> {
        let path = match target {
            DeleteTarget::SingleRecord(id) => {
                format!("/record/delete/{}", urlencoding::encode(id.trim()))
            }
            DeleteTarget::RollNumber(roll) => {
                format!("/mark/delete_by_roll/{}", urlencoding::encode(roll.trim()))
            }
        };
        self.send_json::<()>(Method::DELETE, &path, None).await
    }

    pub async fn save_attendance(&self, request: &SaveAttendanceRequest) -> Result<Option<String>> {
        self.send_json(Method::POST, "/api/save-attendance", Some(request))
            .await
    }

    /// `Ok(None)` when the service reports no such student.
    pub async fn student_lookup(
        &self,
        roll: &str,
        branch: &str,
        semester: u8,
    ) -> Result<Option<Student>> {
        let path = "/api/student";
        let query = [
            ("roll", roll.trim().to_string()),
            ("branch", crate::model::normalize_branch(branch)),
            ("semester", semester.to_string()),
        ];
        let response = self
            .execute(path, self.request(Method::GET, path).query(&query))
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value = read_json(path, response).await?;
        if !value.is_object() {
            return Err(shape(path, "an object"));
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| malformed(path, e))
    }

    pub async fn add_subject(&self, request: &AddSubjectRequest) -> Result<Option<String>> {
        self.send_json(Method::POST, "/api/add-subject", Some(request))
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<Option<String>> {
        self.send_json(Method::POST, "/register", Some(request)).await
    }

    pub async fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<StartSessionResponse> {
        let path = "/start-attendance";
        let response = self
            .execute(path, self.request(Method::POST, path).json(request))
            .await?;
        let value = read_json(path, response).await?;
        if !value.is_object() {
            return Err(shape(path, "an object"));
        }
        serde_json::from_value(value).map_err(|e| malformed(path, e))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("{method} {path}");
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    async fn execute(&self, path: &str, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| transport(path, e))
    }

    async fn get_array<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut request = self.request(Method::GET, path);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.execute(path, request).await?;
        let value = read_json(path, response).await?;
        if !value.is_array() {
            warn!("{path} did not answer with an array");
            return Err(shape(path, "an array"));
        }
        serde_json::from_value(value).map_err(|e| malformed(path, e))
    }

    /// Mutations answer `{message}` or `{error}`; returns the message text.
    async fn send_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<String>> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.execute(path, request).await?;
        let value = read_json(path, response).await?;
        Ok(serde_json::from_value::<MessageBody>(value)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty()))
    }
}

/// Reads a JSON body. Non-2xx becomes `Server` carrying the body's
/// `error`/`message` when there is one. An empty 2xx body reads as `null`.
async fn read_json(path: &str, response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await.map_err(|e| transport(path, e))?;
    if !status.is_success() {
        let message = serde_json::from_str::<MessageBody>(&text)
            .ok()
            .and_then(|b| b.error_text().map(str::to_string));
        return Err(server_error(path, status.as_u16(), message));
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| malformed(path, e))
}

fn transport(path: &str, source: reqwest::Error) -> Error {
    error!("{path}: {source}");
    Error::Transport {
        endpoint: path.to_string(),
        source,
    }
}

fn server_error(path: &str, status: u16, message: Option<String>) -> Error {
    warn!("{path} answered {status}");
    Error::Server {
        endpoint: path.to_string(),
        status,
        message,
    }
}

fn malformed(path: &str, source: serde_json::Error) -> Error {
    warn!("{path}: unparseable body: {source}");
    Error::Malformed {
        endpoint: path.to_string(),
        source,
    }
}

fn shape(path: &str, expected: &'static str) -> Error {
    Error::UnexpectedShape {
        endpoint: path.to_string(),
        expected,
    }
}
