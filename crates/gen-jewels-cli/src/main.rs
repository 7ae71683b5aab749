use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gen_jewels_cli::app::{describe_record, init_logging, App};
use gen_jewels_client::{DesignRequest, ImageToImageRequest, RegisterRequest};
use gen_jewels_core::notify::messages;
use gen_jewels_core::{
    normalize_asset_url, ConfigLoader, GenerationParams, JewelsError, PageId, RecoveryStart,
    ServerStatus, SessionPhase,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(name = "gen-jewels", author, version, about = "Gen Jewels AI jewelry design client")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, help = "Configuration file (defaults to <config dir>/gen-jewels/config.yaml)")]
    config: Option<PathBuf>,

    #[clap(long, help = "Backend base URL, overrides the configuration")]
    api_url: Option<String>,

    #[clap(long, short, help = "Log level (error, warn, info, debug, trace)")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and pick up any unfinished design
    Login {
        #[clap(long, short)]
        username: String,
        #[clap(long, short)]
        password: String,
    },
    /// Create an account and company profile
    Register {
        #[clap(long)]
        owner_name: String,
        #[clap(long)]
        company_name: String,
        #[clap(long)]
        address: String,
        #[clap(long)]
        phone_number: String,
        #[clap(long, short)]
        username: String,
        #[clap(long, short)]
        password: String,
    },
    /// Forget the credential and any pending design
    Logout,
    /// Check whether the backend is reachable
    Health,
    /// Show the session state
    Status {
        #[clap(long, help = "Print the session snapshot as JSON")]
        json: bool,
    },
    /// List previously generated designs
    History {
        #[clap(long, short = 'n', default_value = "20")]
        limit: usize,
        #[clap(long, help = "Print records as JSON")]
        json: bool,
    },
    /// Design wizard: generate from structured attributes
    Wizard {
        #[clap(long)]
        jewelry_type: String,
        #[clap(long)]
        style: String,
        #[clap(long)]
        material: String,
        #[clap(long)]
        stone: String,
        #[clap(long)]
        theme: String,
        #[clap(long)]
        size: Option<String>,
        #[clap(long)]
        finish: Option<String>,
        #[clap(long)]
        extra_text: Option<String>,
    },
    /// Generate from a free-text description
    Text {
        prompt: String,
    },
    /// Generate from a reference image
    Image {
        #[clap(long, short)]
        file: PathBuf,
        #[clap(long)]
        jewelry_type: String,
        #[clap(long)]
        prompt: Option<String>,
        #[clap(long)]
        strength: Option<f32>,
    },
    /// Wait for a design left running by an earlier invocation
    Resume,
    /// Print the full URL for a server-relative image path
    Url {
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(cli.config.as_deref()).await?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
        config.validate()?;
    }

    let level = cli.log_level.unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level, config.logging.file.as_deref())?;

    if let Commands::Url { path } = &cli.command {
        println!("{}", normalize_asset_url(&config.api.base_url, path));
        return Ok(());
    }

    let app = App::build(config)?;
    log::debug!("Using backend at {}", app.base_url());

    match cli.command {
        Commands::Login { username, password } => {
            let start = app.manager.login(&username, &password).await?;
            println!("Logged in as {}", username);
            report_recovery(&app, start).await
        }
        Commands::Register {
            owner_name,
            company_name,
            address,
            phone_number,
            username,
            password,
        } => {
            let request = RegisterRequest {
                owner_name,
                company_name,
                address,
                phone_number,
                username,
                password,
            };
            app.manager.register(&request).await?;
            println!("Account created. Run `gen-jewels login` to sign in.");
            Ok(())
        }
        Commands::Logout => {
            app.manager.logout()?;
            println!("Logged out");
            Ok(())
        }
        Commands::Health => {
            let status = app.monitor.check().await;
            println!("Backend at {} is {}", app.base_url(), status);
            if status != ServerStatus::Live {
                anyhow::bail!(messages::SERVER_OFFLINE);
            }
            Ok(())
        }
        Commands::Status { json } => show_status(&app, json),
        Commands::History { limit, json } => show_history(&app, limit, json).await,
        Commands::Wizard {
            jewelry_type,
            style,
            material,
            stone,
            theme,
            size,
            finish,
            extra_text,
        } => {
            let mut request = DesignRequest::new(jewelry_type, style, material, stone, theme);
            if let Some(size) = size {
                request = request.with_size(size);
            }
            if let Some(finish) = finish {
                request = request.with_finish(finish);
            }
            if let Some(extra_text) = extra_text {
                request = request.with_extra_text(extra_text);
            }
            generate(&app, PageId::Wizard, request.into()).await
        }
        Commands::Text { prompt } => {
            if prompt.trim().is_empty() {
                anyhow::bail!("Please describe the design you want");
            }
            generate(&app, PageId::TextToImage, DesignRequest::from_prompt(prompt).into()).await
        }
        Commands::Image {
            file,
            jewelry_type,
            prompt,
            strength,
        } => {
            let request = image_request(&file, jewelry_type, prompt, strength).await?;
            generate(&app, PageId::ImageToImage, request.into()).await
        }
        Commands::Resume => {
            let start = app.manager.resume().await?;
            report_recovery(&app, start).await
        }
        Commands::Url { .. } => Ok(()),
    }
}

async fn generate(app: &App, page: PageId, params: GenerationParams) -> Result<()> {
    if app.monitor.check().await == ServerStatus::Offline {
        anyhow::bail!(messages::SERVER_OFFLINE);
    }

    if let RecoveryStart::Started(owner) = app.manager.resume().await? {
        log::info!("A design from the {} page is still pending", owner);
    }
    if !app.manager.register_page(page) {
        log::debug!("{} page is waiting on another page's generation", page);
    }

    let result = app.manager.start_generation(page, params).await;
    app.manager.unregister_page(page);

    match result {
        Ok(record) => {
            println!("{}", app.describe(&record));
            println!("{}", record.final_prompt);
            Ok(())
        }
        Err(JewelsError::SessionBusy { owner }) => {
            anyhow::bail!(
                "The {} page is still generating. Run `gen-jewels resume` to wait for it.",
                owner.display_name()
            )
        }
        Err(err) if err.is_transient() => {
            anyhow::bail!(
                "Lost contact with the backend ({}). The design may still finish; run `gen-jewels resume` to check.",
                err
            )
        }
        Err(err) => Err(err.into()),
    }
}

async fn report_recovery(app: &App, start: RecoveryStart) -> Result<()> {
    match start {
        RecoveryStart::NotAuthenticated => anyhow::bail!(messages::LOGIN_REQUIRED),
        RecoveryStart::NothingPending => {
            println!("No design is pending");
            Ok(())
        }
        RecoveryStart::InFlight(page) | RecoveryStart::AlreadyRecovering(page) => {
            println!("A {} design is already being handled", page.display_name());
            Ok(())
        }
        RecoveryStart::Started(page) => {
            println!("Checking for the {} design...", page.display_name());
            let snapshot = app.wait_for_recovery().await?;
            match snapshot.latest_result {
                Some(record) if snapshot.phase == SessionPhase::Idle => {
                    println!("{}", app.describe(&record));
                }
                _ => println!("The design did not show up in history; please generate it again"),
            }
            Ok(())
        }
    }
}

fn show_status(app: &App, json: bool) -> Result<()> {
    let snapshot = app.manager.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Backend:       {}", app.base_url());
    println!(
        "Logged in:     {}",
        if snapshot.authenticated { "yes" } else { "no" }
    );
    println!("Session:       {}", snapshot.phase);
    println!(
        "Pending flag:  {}",
        app.durable_flag().unwrap_or_else(|| "unset".to_string())
    );
    if let Some(record) = &snapshot.latest_result {
        println!("Latest design: {}", app.describe(record));
    }
    Ok(())
}

async fn show_history(app: &App, limit: usize, json: bool) -> Result<()> {
    let records = app.manager.fetch_history().await?;
    let shown: Vec<_> = records.into_iter().take(limit).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }
    if shown.is_empty() {
        println!("No designs yet");
    }
    for record in &shown {
        println!("{}", describe_record(app.base_url(), record));
    }
    Ok(())
}

async fn image_request(
    file: &Path,
    jewelry_type: String,
    prompt: Option<String>,
    strength: Option<f32>,
) -> Result<ImageToImageRequest> {
    let image = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read image {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.png".to_string());

    let mut request = ImageToImageRequest::new(image, file_name, jewelry_type);
    if let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) {
        request = request.with_prompt(prompt);
    }
    if let Some(strength) = strength {
        request = request.with_strength(strength);
    }
    Ok(request)
}
