#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use docdesk_api::config::ServerConfig;
use docdesk_api::engine::{Orchestrator, OrchestratorConfig};
use docdesk_api::router::build_app_router;
use docdesk_api::state::AppState;
use docdesk_core::body::{JobBody, JobContext, JobError, JobOutput};
use docdesk_core::job::JobKind;
use docdesk_core::params::ParamDefaults;
use docdesk_core::store::MemoryJobStore;
use docdesk_pipeline::harvest::HarvestConfig;
use docdesk_pipeline::JobBodies;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::ServiceExt;

pub const TEST_ORIGIN: &str = "http://localhost:5000";

/// Router plus the temporary directories it works in.
pub struct TestApp {
    pub router: Router,
    pub config: ServerConfig,
    _root: tempfile::TempDir,
}

impl TestApp {
    pub fn work_root(&self) -> &Path {
        &self.config.work_root
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }
}

/// Build a test `ServerConfig` rooted in `root`.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![TEST_ORIGIN.to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 16 * 1024 * 1024,
        work_root: root.join("work"),
        output_dir: root.join("output"),
        static_dir: None,
        default_inv_ratio: 0.75,
        harvest: HarvestConfig {
            endpoint: "http://127.0.0.1:9/search".to_string(),
            page_delay: Duration::ZERO,
            ..HarvestConfig::default()
        },
    }
}

/// App with the production job bodies.
pub fn build_test_app() -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let bodies = JobBodies::standard(config.harvest.clone()).unwrap();
    assemble(root, config, bodies)
}

/// App with the given job bodies.
pub fn build_test_app_with(bodies: JobBodies) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    assemble(root, config, bodies)
}

fn assemble(root: tempfile::TempDir, config: ServerConfig, bodies: JobBodies) -> TestApp {
    TestApp {
        router: build_router(&config, bodies),
        config,
        _root: root,
    }
}

/// Full router over a fresh in-memory store, as `main.rs` wires it.
pub fn build_router(config: &ServerConfig, bodies: JobBodies) -> Router {
    let (orchestrator, _recorder) = Orchestrator::start(
        Arc::new(MemoryJobStore::new()),
        bodies,
        OrchestratorConfig {
            work_root: config.work_root.clone(),
            output_dir: config.output_dir.clone(),
            param_defaults: ParamDefaults {
                inv_ratio: config.default_inv_ratio,
            },
        },
    );
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::new(orchestrator),
    };
    build_app_router(state, config)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct Form {
    parts: Vec<(String, Option<String>, Vec<u8>)>,
}

const BOUNDARY: &str = "docdesk-test-boundary";

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.parts
            .push(("files".to_string(), Some(name.to_string()), data.into()));
        self
    }

    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.parts
            .push((field.to_string(), None, value.as_bytes().to_vec()));
        self
    }

    pub fn into_request(self, uri: &str) -> Request<Body> {
        let mut body = Vec::new();
        for (field, file_name, data) in self.parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                }
                None => {
                    let disposition =
                        format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n");
                    body.extend_from_slice(disposition.as_bytes());
                }
            }
            body.extend_from_slice(&data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }
}

pub async fn post_form(app: &Router, uri: &str, form: Form) -> Response<Body> {
    app.clone().oneshot(form.into_request(uri)).await.unwrap()
}

/// Submit a job and return its id, asserting `202`.
pub async fn submit(app: &Router, kind: &str, form: Form) -> String {
    let response = post_form(app, &format!("/api/{kind}"), form).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    json["task_id"].as_str().unwrap().to_string()
}

pub async fn progress(app: &Router, id: &str) -> Value {
    let response = get(app, &format!("/api/progress/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

/// Poll until the job reaches a terminal status.
pub async fn wait_for_terminal(app: &Router, id: &str) -> Value {
    wait_for(app, id, |json| {
        matches!(json["status"].as_str(), Some("done" | "partial" | "error"))
    })
    .await
}

/// Poll progress until `accept` holds.
pub async fn wait_for(app: &Router, id: &str, accept: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..500 {
        let json = progress(app, id).await;
        if accept(&json) {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not reach the expected state");
}

/// Wait until `path` no longer exists.
pub async fn wait_until_removed(path: &Path) {
    for _ in 0..200 {
        if !path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} was not removed", path.display());
}

/// Entries directly under `dir`, empty if it does not exist.
pub fn entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|rd| rd.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A one-page PDF.
pub fn sample_pdf() -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m 100 100 l S".to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A small solid-colour image in `format`.
pub fn sample_image(format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 6, image::Rgb([30, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, format)
        .unwrap();
    out.into_inner()
}

// ---------------------------------------------------------------------------
// Job bodies with controlled behaviour
// ---------------------------------------------------------------------------

/// Reports 30%, waits for a permit, then writes `gated.txt`.
pub struct GatedBody {
    pub kind: JobKind,
    pub gate: Arc<Semaphore>,
    pub warnings: Vec<String>,
}

impl GatedBody {
    pub fn new(kind: JobKind) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                kind,
                gate: Arc::clone(&gate),
                warnings: Vec::new(),
            },
            gate,
        )
    }
}

#[async_trait]
impl JobBody for GatedBody {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn run(&self, ctx: JobContext) -> Result<JobOutput, JobError> {
        ctx.progress.report(30);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| JobError::Failed(e.to_string()))?;
        let artifact = ctx.artifact_dir.join("gated.txt");
        tokio::fs::write(&artifact, b"gated result").await?;
        Ok(JobOutput {
            artifact,
            warnings: self.warnings.clone(),
        })
    }
}

/// Fails with a fixed message.
pub struct FailingBody(pub JobKind);

#[async_trait]
impl JobBody for FailingBody {
    fn kind(&self) -> JobKind {
        self.0
    }

    async fn run(&self, _ctx: JobContext) -> Result<JobOutput, JobError> {
        Err(JobError::Failed("invoice unreadable".to_string()))
    }
}

/// Panics inside the body.
pub struct PanickingBody(pub JobKind);

#[async_trait]
impl JobBody for PanickingBody {
    fn kind(&self) -> JobKind {
        self.0
    }

    async fn run(&self, _ctx: JobContext) -> Result<JobOutput, JobError> {
        panic!("body exploded");
    }
}
