use argh::FromArgs;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use kornia_analyzer::{
    AnalysisForm, AnalysisResponse, AnalyzerConfig, Dispatcher, GenerationEngine,
    GenerationModel, NormalizedImage, ProviderCredentials, ResultEnvelope,
    config::DEFAULT_TARGET_EDGE,
};
use kornia_vlm::paligemma::{Paligemma, PaligemmaConfig, PaligemmaError};
use serde_json::json;
use std::{sync::Arc, time::Duration};

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_SAMPLE_LEN: usize = 50;
const DEFAULT_MAX_UPLOAD_MB: usize = 16;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Image Analyzer</title></head>
<body>
  <h1>Image Analyzer</h1>
  <form action="/analyze" method="post" enctype="multipart/form-data">
    <p><input type="file" name="image" accept="image/*" required></p>
    <p>
      <select name="analysis_type">
        <option value="describe">Describe</option>
        <option value="detect">Detect objects</option>
        <option value="answer">Answer a question</option>
      </select>
    </p>
    <p><input type="text" name="question" placeholder="What is in this image?"></p>
    <p><button type="submit">Analyze</button></p>
  </form>
</body>
</html>
"#;

fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

#[derive(FromArgs)]
/// Analyzer serves image description, detection and question answering over HTTP.
struct AnalyzerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on (defaults to $PORT or 5000)
    #[argh(option, short = 'p', default = "default_port()")]
    port: u16,

    /// edge length of the square image fed to the model
    #[argh(option, default = "DEFAULT_TARGET_EDGE")]
    target_size: usize,

    /// maximum number of tokens to generate
    #[argh(option, default = "DEFAULT_SAMPLE_LEN")]
    sample_len: usize,

    /// seconds to wait for the model before failing the request, 0 waits forever
    #[argh(option, default = "0")]
    timeout_secs: u64,

    /// maximum accepted upload size in megabytes
    #[argh(option, default = "DEFAULT_MAX_UPLOAD_MB")]
    max_upload_mb: usize,
}

async fn post_analyze(
    State(dispatcher): State<Arc<Dispatcher>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            log::warn!("Malformed upload: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ResultEnvelope::failure(e.to_string())),
            );
        }
    };

    // generation blocks, keep it off the async workers
    let reply = match tokio::task::spawn_blocking(move || dispatcher.handle(form)).await {
        Ok(reply) => reply,
        Err(e) => {
            log::error!("Analysis task failed: {}", e);
            AnalysisResponse {
                status: 500,
                envelope: ResultEnvelope::failure(e.to_string()),
            }
        }
    };

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.envelope))
}

async fn get_status(State(dispatcher): State<Arc<Dispatcher>>) -> impl IntoResponse {
    Json(json!({ "status": dispatcher.engine_state().as_str() }))
}

// Helper function
async fn read_form(mut multipart: Multipart) -> Result<AnalysisForm, MultipartError> {
    let mut form = AnalysisForm::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("image") => {
                let filename = field.file_name().map(|n| n.to_string());
                form.push_image(filename, field.bytes().await?.to_vec());
            }
            Some(name @ ("analysis_type" | "question")) => {
                form.push_text(name, field.text().await?);
            }
            _ => {}
        }
    }

    Ok(form)
}

// custom model that uses Paligemma to run generation
struct PaligemmaModel {
    model: Paligemma,
    sample_len: usize,
}

impl GenerationModel for PaligemmaModel {
    type Error = PaligemmaError;

    fn generate(&mut self, image: &NormalizedImage, prompt: &str) -> Result<String, Self::Error> {
        self.model.inference(image, prompt, self.sample_len, false)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env may also carry RUST_LOG and PORT
    dotenvy::dotenv().ok();
    env_logger::init();
    let args: AnalyzerArgs = argh::from_env();

    let credentials = match ProviderCredentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            log::error!("{}", e);
            log::error!("Set KAGGLE_USERNAME and KAGGLE_KEY in the environment or a .env file");
            std::process::exit(1);
        }
    };
    log::info!("Using provider credentials for {}", credentials.username);

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let config = AnalyzerConfig::default()
        .with_target_edge(args.target_size)
        .with_generation_timeout(
            (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs)),
        );

    let model = Paligemma::new(PaligemmaConfig::default())?;
    let engine = Arc::new(GenerationEngine::new(PaligemmaModel {
        model,
        sample_len: args.sample_len,
    }));
    let dispatcher = Arc::new(Dispatcher::new(engine, &config));

    let app = Router::new()
        .route("/", get(|| async { Html(INDEX_HTML) }))
        .route("/analyze", post(post_analyze))
        .route("/status", get(get_status))
        .layer(DefaultBodyLimit::max(
            args.max_upload_mb.saturating_mul(1024 * 1024),
        ))
        .with_state(dispatcher);

    log::info!("🚀 Starting the server");
    log::info!("🔥 Listening on: {}", addr);
    log::info!("🔧 Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
