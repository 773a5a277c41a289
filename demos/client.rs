use argh::FromArgs;
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5000;

#[derive(FromArgs)]
/// Analyzer client for uploading images and checking the engine
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "analyze" or "status"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Analyze(AnalyzeCommand),
    Status(StatusCommand),
}

#[derive(FromArgs)]
/// Upload an image for analysis
#[argh(subcommand, name = "analyze")]
struct AnalyzeCommand {
    /// the path to the image
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// the analysis type: describe, detect or answer
    #[argh(option, short = 'm', default = "String::from(\"describe\")")]
    mode: String,

    /// the question to ask in answer mode
    #[argh(option, short = 'q')]
    question: Option<String>,
}

#[derive(FromArgs)]
/// Check the engine state
#[argh(subcommand, name = "status")]
struct StatusCommand {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    match args.command {
        ClientCommands::Analyze(analyze_command) => {
            let bytes = tokio::fs::read(&analyze_command.image_path).await?;
            let file_name = analyze_command
                .image_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("upload")
                .to_string();

            let mut form = Form::new()
                .part("image", Part::bytes(bytes).file_name(file_name))
                .text("analysis_type", analyze_command.mode);
            if let Some(question) = analyze_command.question {
                form = form.text("question", question);
            }

            let response = client
                .post(format!("http://{}/analyze", addr))
                .multipart(form)
                .send()
                .await?;

            let status = response.status();
            let result = response.json::<serde_json::Value>().await?;
            println!("Status: {}", status);
            println!("Result: {}", serde_json::to_string_pretty(&result)?);
        }
        ClientCommands::Status(_) => {
            let response = client
                .get(format!("http://{}/status", addr))
                .send()
                .await?;

            let result = response.json::<serde_json::Value>().await?;
            println!("Result: {}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
