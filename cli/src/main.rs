use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; pass --session-token or set ROLLCALL_SESSION_TOKEN")]
    MissingSessionToken,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("websocket failed: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("server returned {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "rollcall-cli", about = "Rollcall attendance portal CLI")]
struct Cli {
    #[arg(long, env = "ROLLCALL_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "ROLLCALL_SESSION_TOKEN")]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    session_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Start a staff session and print the token.
    Login {
        #[arg(long, env = "ROLLCALL_STAFF_PASSWORD")]
        password: String,
    },
    Logout,
    Students(StudentsCommand),
    Attendance(AttendanceCommand),
    Absent(DateArgs),
    Stats(DateArgs),
    Analytics {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Email the parents of every absent student.
    Notify(DateArgs),
    Export(ExportCommand),
    /// Print store change events as they happen.
    Watch,
}

#[derive(Args, Debug, Default)]
struct DateArgs {
    /// `YYYY-MM-DD`; defaults to today on campus.
    #[arg(long)]
    date: Option<String>,
}

#[derive(Args, Debug)]
struct StudentsCommand {
    #[command(subcommand)]
    command: StudentsSubcommand,
}

#[derive(Subcommand, Debug)]
enum StudentsSubcommand {
    List {
        #[arg(long)]
        q: Option<String>,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        reg_no: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        parent_email: Option<String>,
    },
    Delete {
        reg_no: String,
    },
}

#[derive(Args, Debug)]
struct AttendanceCommand {
    #[command(subcommand)]
    command: AttendanceSubcommand,
}

#[derive(Subcommand, Debug)]
enum AttendanceSubcommand {
    List(DateArgs),
    /// Delete every attendance record. Requires `--confirm DELETE`.
    Clear {
        #[arg(long)]
        confirm: String,
    },
}

#[derive(Args, Debug)]
struct ExportCommand {
    #[command(subcommand)]
    command: ExportSubcommand,
}

#[derive(Subcommand, Debug)]
enum ExportSubcommand {
    Report(ExportArgs),
    Summary(ExportArgs),
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    date: DateArgs,
    #[arg(long, default_value = "-", help = "Output file path, or - for stdout")]
    out: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, session_token: cli.session_token };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Login { password } => run_login(&ctx, &password).await,
        Command::Logout => {
            api_request(&ctx, reqwest::Method::POST, &["api", "staff", "logout"], &[], None).await?;
            eprintln!("logged out");
            Ok(())
        }
        Command::Students(students) => run_students(&ctx, students).await,
        Command::Attendance(attendance) => run_attendance(&ctx, attendance).await,
        Command::Absent(args) => get_and_print(&ctx, &["api", "staff", "absent"], &date_query(&args)).await,
        Command::Stats(args) => get_and_print(&ctx, &["api", "staff", "stats"], &date_query(&args)).await,
        Command::Analytics { from, to } => {
            let params = [("from", from), ("to", to)];
            get_and_print(&ctx, &["api", "staff", "analytics"], &params).await
        }
        Command::Notify(args) => {
            let json =
                api_request(&ctx, reqwest::Method::POST, &["api", "staff", "notify"], &date_query(&args), None).await?;
            print_json(&json)
        }
        Command::Export(export) => run_export(&ctx, export).await,
        Command::Watch => run_watch(&ctx).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let response = reqwest::Client::new().get(api_url(&cli.base_url, &["healthz"])?).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), message: "health check failed".to_owned() });
    }
    println!("ok");
    Ok(())
}

async fn run_login(cli: &CliContext, password: &str) -> Result<(), CliError> {
    let response = reqwest::Client::new()
        .post(api_url(&cli.base_url, &["api", "staff", "login"])?)
        .json(&serde_json::json!({ "password": password }))
        .send()
        .await?;
    let json = read_json(response).await?;
    let token = json.get("token").and_then(Value::as_str).ok_or(CliError::MissingField("token"))?;
    println!("{token}");
    if let Some(expires_at) = json.get("expires_at").and_then(Value::as_str) {
        eprintln!("session expires at {expires_at}; export ROLLCALL_SESSION_TOKEN to reuse it");
    }
    Ok(())
}

async fn run_students(cli: &CliContext, students: StudentsCommand) -> Result<(), CliError> {
    match students.command {
        StudentsSubcommand::List { q } => {
            get_and_print(cli, &["api", "staff", "students"], &[("q", q)]).await
        }
        StudentsSubcommand::Add { name, reg_no, email, parent_email } => {
            let mut body = Map::new();
            body.insert("name".to_owned(), Value::String(name));
            body.insert("reg_no".to_owned(), Value::String(reg_no));
            if let Some(email) = email {
                body.insert("email".to_owned(), Value::String(email));
            }
            if let Some(parent_email) = parent_email {
                body.insert("parent_email".to_owned(), Value::String(parent_email));
            }
            let json = api_request(
                cli,
                reqwest::Method::POST,
                &["api", "staff", "students"],
                &[],
                Some(Value::Object(body)),
            )
            .await?;
            print_json(&json)
        }
        StudentsSubcommand::Delete { reg_no } => {
            api_request(cli, reqwest::Method::DELETE, &["api", "staff", "students", &reg_no], &[], None).await?;
            eprintln!("deleted {reg_no}");
            Ok(())
        }
    }
}

async fn run_attendance(cli: &CliContext, attendance: AttendanceCommand) -> Result<(), CliError> {
    match attendance.command {
        AttendanceSubcommand::List(args) => {
            get_and_print(cli, &["api", "staff", "attendance"], &date_query(&args)).await
        }
        AttendanceSubcommand::Clear { confirm } => {
            let body = serde_json::json!({ "confirm": confirm });
            let json =
                api_request(cli, reqwest::Method::POST, &["api", "staff", "attendance", "clear"], &[], Some(body))
                    .await?;
            print_json(&json)
        }
    }
}

async fn run_export(cli: &CliContext, export: ExportCommand) -> Result<(), CliError> {
    let (endpoint, args) = match export.command {
        ExportSubcommand::Report(args) => ("report.csv", args),
        ExportSubcommand::Summary(args) => ("summary.csv", args),
    };
    let response = authed_client(cli)?
        .get(api_url(&cli.base_url, &["api", "staff", "export", endpoint])?)
        .query(&present_params(&date_query(&args.date)))
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(CliError::ServerError { status: status.as_u16(), message });
    }
    let csv = response.bytes().await?;
    if args.out == "-" {
        print!("{}", String::from_utf8_lossy(&csv));
    } else {
        tokio::fs::write(&args.out, &csv).await?;
        eprintln!("wrote {} bytes to {}", csv.len(), args.out);
    }
    Ok(())
}

async fn run_watch(cli: &CliContext) -> Result<(), CliError> {
    let token = cli.session_token.as_deref().ok_or(CliError::MissingSessionToken)?;
    let mut request = feed_url(&cli.base_url)?.into_client_request()?;
    request.headers_mut().insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);

    let (mut stream, _) = connect_async(request).await?;
    eprintln!("watching for changes; ctrl-c to stop");
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => println!("{}", text.as_str()),
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

// =============================================================================
// HTTP HELPERS
// =============================================================================

/// Append `segments` to the base URL's path, encoding each one.
fn api_url(base_url: &str, segments: &[&str]) -> Result<Url, CliError> {
    let invalid = || CliError::InvalidBaseUrl(base_url.to_owned());
    let mut url = Url::parse(base_url).map_err(|_| invalid())?;
    url.path_segments_mut().map_err(|()| invalid())?.pop_if_empty().extend(segments);
    Ok(url)
}

/// Query pairs for the parameters that were given.
fn present_params<'a>(params: &[(&'a str, Option<String>)]) -> Vec<(&'a str, String)> {
    params.iter().filter_map(|(key, value)| value.clone().map(|v| (*key, v))).collect()
}

fn authed_client(cli: &CliContext) -> Result<reqwest::Client, CliError> {
    let session_token = cli.session_token.as_deref().ok_or(CliError::MissingSessionToken)?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {session_token}"))?);
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    segments: &[&str],
    params: &[(&str, Option<String>)],
    body: Option<Value>,
) -> Result<Value, CliError> {
    let request = authed_client(cli)?
        .request(method, api_url(&cli.base_url, segments)?)
        .query(&present_params(params));
    let request = if let Some(json) = body { request.json(&json) } else { request };
    read_json(request.send().await?).await
}

async fn read_json(response: reqwest::Response) -> Result<Value, CliError> {
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);
    if !status.is_success() {
        let message = value.get("error").and_then(Value::as_str).map_or_else(|| value.to_string(), ToOwned::to_owned);
        return Err(CliError::ServerError { status: status.as_u16(), message });
    }
    Ok(value)
}

async fn get_and_print(
    cli: &CliContext,
    segments: &[&str],
    params: &[(&str, Option<String>)],
) -> Result<(), CliError> {
    let json = api_request(cli, reqwest::Method::GET, segments, params, None).await?;
    print_json(&json)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn date_query(args: &DateArgs) -> [(&'static str, Option<String>); 1] {
    [("date", args.date.clone())]
}

fn feed_url(base_url: &str) -> Result<String, CliError> {
    let base_url = base_url.trim_end_matches('/');
    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/staff/feed"));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/staff/feed"));
    }
    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
