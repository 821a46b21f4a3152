use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use unitech::config::AppConfig;
use unitech::error::AppError;
use unitech::portal::provisioning::BackendResources;
use unitech::portal::storage::S3StorageGateway;
use unitech::portal::upload::PROGRESS_WIDTH;
use unitech::portal::{
    set_parameters, ApiClient, ApiGateway, ApplicationRecord, FetchRequest, FileSelection,
    PostRequest, Session, UploadView,
};

type PortalView = UploadView<S3StorageGateway, ApiClient>;

#[derive(Parser, Debug)]
#[command(
    name = "Unitech Portal",
    about = "Upload application documents and track applications from the command line",
    version
)]
struct Cli {
    /// Signed-in username (overrides UNITECH_USERNAME)
    #[arg(long, global = true)]
    username: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the upload screen: list files and submit the application (default command)
    Mount,
    /// Upload a file to private storage under the signed-in user
    Upload(UploadArgs),
    /// List the signed-in user's private files
    Files,
    /// Resolve a temporary download link for a stored key
    Link { key: String },
    /// Submit the placeholder application without opening the screen
    Apply,
    /// Issue a GET against a configured API
    Get(GetArgs),
    /// Summarize a provisioned backend resource descriptor
    Resources { path: PathBuf },
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// File to upload
    path: PathBuf,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// API name (defaults to the configured API)
    #[arg(long)]
    api: Option<String>,
    /// Path relative to the API root
    #[arg(long, default_value = "/")]
    endpoint: String,
    /// Query-string parameter as key=value; may be repeated
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    unitech::telemetry::init(&config.telemetry)?;
    info!(?config.environment, "unitech portal starting");

    let username = cli.username;
    let session = || config.session.session(username.clone());

    match cli.command.unwrap_or(Command::Mount) {
        Command::Mount => {
            let mut view = build_view(&config, session()?).await?;
            view.mount().await?;
            print!("{}", view.render());
            Ok(())
        }
        Command::Upload(args) => run_upload(&config, session()?, args).await,
        Command::Files => {
            let mut view = build_view(&config, session()?).await?;
            view.refresh_listing().await?;
            print!("{}", view.render());
            Ok(())
        }
        Command::Link { key } => {
            let mut view = build_view(&config, session()?).await?;
            match view.download(&key).await? {
                Some(link) => println!("{}", link.url),
                None => println!("No key given"),
            }
            Ok(())
        }
        Command::Apply => run_apply(&config, &session()?).await,
        Command::Get(args) => run_get(&config, &session()?, args).await,
        Command::Resources { path } => run_resources(&path),
    }
}

fn api_client(config: &AppConfig, session: &Session) -> ApiClient {
    ApiClient::new(config.api.clone()).with_access_token(session.access_token.clone())
}

async fn build_view(config: &AppConfig, session: Session) -> Result<PortalView, AppError> {
    let storage_config = config.require_storage()?;
    let storage =
        S3StorageGateway::from_config(storage_config, session.identity_id.clone()).await;
    let api = api_client(config, &session);
    Ok(UploadView::new(session, Arc::new(storage), Arc::new(api)))
}

async fn run_upload(config: &AppConfig, session: Session, args: UploadArgs) -> Result<(), AppError> {
    let file = FileSelection::from_path(&args.path).await?;
    let mut view = build_view(config, session).await?;
    view.select_file(file);

    let mut updates = view.subscribe_progress();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = *updates.borrow_and_update();
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\rUploading {}", snapshot.render(PROGRESS_WIDTH));
            let _ = stderr.flush();
        }
    });

    let outcome = view.upload().await;
    printer.abort();
    eprintln!();

    if let Some(receipt) = outcome? {
        println!("Uploaded {}", receipt.key);
    }
    view.refresh_listing().await?;
    print!("{}", view.render());
    Ok(())
}

async fn run_apply(config: &AppConfig, session: &Session) -> Result<(), AppError> {
    let api = api_client(config, session);
    let request = PostRequest::create_application(&ApplicationRecord::demo())?;
    let response = api.post_data(request).await?;
    println!("{response}");
    Ok(())
}

async fn run_get(config: &AppConfig, session: &Session, args: GetArgs) -> Result<(), AppError> {
    let GetArgs {
        api,
        endpoint,
        params,
    } = args;

    let request = FetchRequest {
        api_name: api.unwrap_or_else(|| config.api.default_api.clone()),
        endpoint,
        additional_params: set_parameters(params.into_iter().collect::<BTreeMap<_, _>>()),
    };
    let response = api_client(config, session).fetch_data(request).await?;
    println!("{response}");
    Ok(())
}

fn run_resources(path: &Path) -> Result<(), AppError> {
    let resources = BackendResources::from_path(path)?;

    println!("Backend resources ({})", path.display());
    for line in resources.summary() {
        println!("- {line}");
    }

    let missing = resources.missing_resources();
    if missing.is_empty() {
        println!("\nMissing resources: none");
    } else {
        println!("\nMissing resources");
        for name in missing {
            println!("- {name}");
        }
    }
    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}
