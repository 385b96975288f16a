use crate::application::use_cases::generate_testcases::{GenerateOutcome, GenerateTestCasesUseCase};
use crate::application::use_cases::text_extraction::extract_for;
use crate::domain::error::AppError;
use crate::domain::requirement::{AlmInput, PipelineRequest, UploadedFile};
use crate::domain::test_case::TestCaseRecord;
use crate::infrastructure::session_store::SessionStore;
use actix_cors::Cors;
use actix_web::{
    delete, dev::Server, get, http::StatusCode, post, web, App, HttpResponse, HttpServer,
    Responder,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use validator::Validate;

const LOG_CAPACITY: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub generate: Arc<GenerateTestCasesUseCase>,
    pub sessions: Arc<dyn SessionStore>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

fn default_username() -> String {
    "user".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[serde(default = "default_username")]
    #[validate(length(min = 1, max = 128))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub alm_tool: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub inputs: GenerateInputs,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenerateInputs {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub typed_requirements: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub uploaded_files: Vec<UploadedFilePayload>,
    #[serde(default)]
    pub alm_inputs: BTreeMap<String, AlmInput>,
}

/// Either already-extracted `content` or raw file bytes in `content_base64`.
#[derive(Debug, Deserialize, Validate)]
pub struct UploadedFilePayload {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_base64: Option<String>,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub message: String,
    pub session_id: String,
    pub count: usize,
    pub preview: Vec<TestCaseRecord>,
    pub columns: Vec<String>,
    pub download_reviewed: String,
    pub download_raw: String,
}

impl From<GenerateOutcome> for GenerateResponse {
    fn from(outcome: GenerateOutcome) -> Self {
        let session_id = outcome.session.id;
        Self {
            message: "Test cases generated and AI-reviewed".to_string(),
            count: outcome.session.reviewed_count,
            preview: outcome.preview,
            columns: outcome.columns.columns().to_vec(),
            download_reviewed: format!(
                "/api/download_reviewed/{}/{}",
                session_id, outcome.reviewed_file_name
            ),
            download_raw: format!("/api/download_raw/{}/{}", session_id, outcome.raw_file_name),
            session_id,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct StatusResponse {
    ok: bool,
    sessions: usize,
}

fn error_response(err: &AppError) -> HttpResponse {
    let status = match err {
        AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    HttpResponse::build(status).json(ErrorResponse {
        error: err.to_string(),
    })
}

impl GenerateRequest {
    /// Validated pipeline input. Base64 uploads are decoded and run through
    /// text extraction; undecodable payloads are rejected.
    pub fn into_pipeline_request(self) -> Result<PipelineRequest, AppError> {
        self.validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let mut uploaded_files = Vec::with_capacity(self.inputs.uploaded_files.len());
        for file in self.inputs.uploaded_files {
            let content = match (file.content, file.content_base64) {
                (_, Some(encoded)) => {
                    let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
                        AppError::ValidationError(format!(
                            "Invalid base64 content for {}: {}",
                            file.file_name, e
                        ))
                    })?;
                    extract_for(&file.file_name, &bytes)
                }
                (Some(content), None) => content,
                (None, None) => String::new(),
            };
            uploaded_files.push(UploadedFile {
                file_name: file.file_name,
                content,
            });
        }

        Ok(PipelineRequest {
            typed_requirements: self.inputs.typed_requirements,
            uploaded_files,
            alm_inputs: self.inputs.alm_inputs,
            alm_tool: self
                .alm_tool
                .filter(|tool| !tool.trim().is_empty())
                .unwrap_or_else(|| "jira".to_string())
                .to_lowercase(),
            external_prompt: None,
        })
    }
}

#[post("/generate_testcases")]
async fn generate_testcases(
    data: web::Data<HttpState>,
    req: web::Json<GenerateRequest>,
) -> impl Responder {
    let req = req.into_inner();
    let username = req.username.clone();
    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!(
            "Generating test cases for user={} alm_tool={}",
            username,
            req.alm_tool.as_deref().unwrap_or("jira")
        ),
    );

    let request = match req.into_pipeline_request() {
        Ok(request) => request,
        Err(e) => {
            add_log(&data.logs, "WARN", "HttpApi", &format!("Rejected request: {}", e));
            return error_response(&e);
        }
    };

    match data.generate.execute(&username, &request).await {
        Ok(outcome) => {
            add_log(
                &data.logs,
                "INFO",
                "HttpApi",
                &format!(
                    "Session {} created with {} reviewed test cases",
                    outcome.session.id, outcome.session.reviewed_count
                ),
            );
            HttpResponse::Ok().json(GenerateResponse::from(outcome))
        }
        Err(e) => {
            let level = if e.is_generation_failure() {
                warn!(error = %e, "generate_testcases: model output unusable");
                "WARN"
            } else {
                error!(error = %e, "generate_testcases failed");
                "ERROR"
            };
            add_log(&data.logs, level, "HttpApi", &format!("Generation failed: {}", e));
            error_response(&e)
        }
    }
}

#[derive(Clone, Copy)]
enum Artifact {
    Raw,
    Reviewed,
}

async fn download(data: &HttpState, session_id: &str, file_name: &str, artifact: Artifact) -> HttpResponse {
    let session = match data.sessions.fetch(session_id) {
        Ok(Some(session)) => session,
        Ok(None) => return error_response(&AppError::NotFound("Session not found".to_string())),
        Err(e) => return error_response(&e),
    };

    let path = match artifact {
        Artifact::Raw => session.raw_path,
        Artifact::Reviewed => session.reviewed_path,
    };
    let matches = Path::new(&path)
        .file_name()
        .map_or(false, |name| name == file_name);
    if !matches {
        return error_response(&AppError::NotFound("File not found".to_string()));
    }

    let content_type = match artifact {
        Artifact::Raw => "application/json",
        Artifact::Reviewed => "text/csv; charset=utf-8",
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => HttpResponse::Ok()
            .content_type(content_type)
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", file_name),
            ))
            .body(bytes),
        Err(e) => {
            add_log(
                &data.logs,
                "ERROR",
                "HttpApi",
                &format!("Failed to read artifact {}: {}", path, e),
            );
            error_response(&AppError::NotFound("File not found".to_string()))
        }
    }
}

#[get("/download_reviewed/{session_id}/{file_name}")]
async fn download_reviewed(
    data: web::Data<HttpState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (session_id, file_name) = path.into_inner();
    download(&data, &session_id, &file_name, Artifact::Reviewed).await
}

#[get("/download_raw/{session_id}/{file_name}")]
async fn download_raw(
    data: web::Data<HttpState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (session_id, file_name) = path.into_inner();
    download(&data, &session_id, &file_name, Artifact::Raw).await
}

#[delete("/sessions/{session_id}")]
async fn delete_session(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    match data.generate.evict(&session_id) {
        Ok(Some(_)) => {
            info!(session_id = %session_id, "Session evicted");
            HttpResponse::NoContent().finish()
        }
        Ok(None) => error_response(&AppError::NotFound("Session not found".to_string())),
        Err(e) => error_response(&e),
    }
}

#[get("/status")]
async fn get_status(data: web::Data<HttpState>) -> impl Responder {
    match data.sessions.len() {
        Ok(sessions) => HttpResponse::Ok().json(StatusResponse { ok: true, sessions }),
        Err(e) => error_response(&e),
    }
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    match data.logs.lock() {
        Ok(logs) => HttpResponse::Ok().json(&*logs),
        Err(_) => error_response(&AppError::Internal("Log buffer lock poisoned".to_string())),
    }
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    if let Ok(mut logs) = logs.lock() {
        logs.push(entry.clone());
        if logs.len() > LOG_CAPACITY {
            logs.remove(0);
        }
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(generate_testcases)
            .service(download_reviewed)
            .service(download_raw)
            .service(delete_session)
            .service(get_status)
            .service(get_logs),
    );
}

pub fn start_server(state: HttpState, host: &str, port: u16) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(32 * 1024 * 1024))
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
