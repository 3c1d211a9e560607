/// client-gallery operator CLI
///
/// ## Usage
///
/// ```bash
/// # Register a project and its first raw folder
/// client-gallery project create LCA-2041 --category wedding
/// client-gallery folder create LCA-2041 "Raw 1"
///
/// # Import a directory of camera files
/// client-gallery import LCA-2041 "Raw 1" /mnt/cards/2041 --recursive
///
/// # Close the selection window and snapshot the customer's picks
/// client-gallery lock LCA-2041
/// client-gallery submit LCA-2041
/// ```
///
/// Every command prints its result as JSON on stdout; logs go to stderr
/// (`RUST_LOG=client_gallery=debug` for per-item detail).

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use client_gallery::provider::{LocalFolderProvider, LocalPreviewResolver, RemotePreviewResolver};
use client_gallery::{
    Asset, Config, EditRequestItem, EditRequestStatus, GalleryError, Library, PreviewResolver,
    Result, SourceItem,
};

#[derive(Parser, Debug)]
#[command(name = "client-gallery")]
#[command(about = "Customer gallery catalog: imports, selections and edit requests")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "GALLERY_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog database (overrides the config file)
    #[arg(long, env = "GALLERY_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Project intake and delivery notes
    Project {
        #[command(subcommand)]
        action: ProjectCommand,
    },
    /// Raw folder registry
    Folder {
        #[command(subcommand)]
        action: FolderCommand,
    },
    /// Import media files from a local directory
    Import {
        reference: String,
        folder: String,
        dir: PathBuf,
        #[arg(long)]
        recursive: bool,
    },
    /// Import a provider listing saved as JSON
    ImportJson { file: PathBuf },
    /// List assets, optionally for one folder
    Assets {
        reference: String,
        #[arg(long)]
        folder: Option<String>,
    },
    /// Select (or with --off, deselect) an asset
    Select {
        reference: String,
        asset_id: i64,
        #[arg(long)]
        off: bool,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Remove a single asset
    RemoveAsset { reference: String, asset_id: i64 },
    /// Close (or with --off, reopen) the selection window
    Lock {
        reference: String,
        #[arg(long)]
        off: bool,
    },
    /// Record the current selection as a new version
    Submit { reference: String },
    /// Submitted selection versions, newest first
    Versions { reference: String },
    /// Submit an edit request from a JSON array of {fileName, changes}
    EditRequest { reference: String, file: PathBuf },
    /// Edit requests, newest first
    EditRequests { reference: String },
    /// Set an edit request's status (new, in_progress, done)
    EditStatus { request_id: i64, status: String },
    /// Rebuild folder and project counts from the asset rows
    Reconcile { reference: String },
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    Create {
        reference: String,
        #[arg(long, default_value = "")]
        category: String,
    },
    Show { reference: String },
    Notes { reference: String, text: String },
}

#[derive(Subcommand, Debug)]
enum FolderCommand {
    Create { reference: String, name: String },
    Delete { reference: String, name: String },
    List {
        reference: String,
        #[arg(long)]
        recount: bool,
    },
}

/// Payload accepted by `import-json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRequest {
    reference_id: String,
    // Older exports name the folder `rawFolder`
    #[serde(alias = "rawFolder")]
    folder_name: String,
    items: Vec<SourceItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetView {
    #[serde(flatten)]
    asset: Asset,
    preview_url: Option<String>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(db) = &args.db {
        config.database_path = db.clone();
    }
    Ok(config)
}

fn preview_url(config: &Config, asset: &Asset) -> Option<String> {
    let resolved = match (&config.local_media_root, &asset.external_id) {
        (Some(root), None) => LocalPreviewResolver::new(root).resolve(asset),
        _ => RemotePreviewResolver::new(config.preview_base_url.clone()).resolve(asset),
    };
    resolved.ok()
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let library = Library::open(&config.database_path)?.with_edit_limits(config.edit_request);

    match args.command {
        Command::Project { action } => match action {
            ProjectCommand::Create { reference, category } => {
                print_json(&library.create_project(&reference, &category)?)
            }
            ProjectCommand::Show { reference } => print_json(&library.get_project(&reference)?),
            ProjectCommand::Notes { reference, text } => {
                print_json(&library.set_edited_text(&reference, &text)?)
            }
        },
        Command::Folder { action } => match action {
            FolderCommand::Create { reference, name } => {
                print_json(&library.create_folder(&reference, &name)?)
            }
            FolderCommand::Delete { reference, name } => {
                let removed = library.delete_folder(&reference, &name)?;
                print_json(&serde_json::json!({ "folder": name, "removedAssets": removed }))
            }
            FolderCommand::List { reference, recount } => {
                print_json(&library.list_folders(&reference, recount)?)
            }
        },
        Command::Import {
            reference,
            folder,
            dir,
            recursive,
        } => {
            library.ensure_import_target(&reference, &folder)?;
            info!(dir = %dir.display(), "Scanning folder");

            // Walk the directory on the blocking pool
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let provider = LocalFolderProvider::new(&dir);
            let listing = runtime.block_on(provider.scan(String::new(), recursive))?;

            print_json(&library.import_listing(&reference, &folder, listing)?)
        }
        Command::ImportJson { file } => {
            let request: ImportRequest = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let result = library.import_assets(&request.reference_id, &request.folder_name, request.items)?;
            print_json(&result)
        }
        Command::Assets { reference, folder } => {
            let views: Vec<AssetView> = library
                .list_assets(&reference, folder.as_deref())?
                .into_iter()
                .map(|asset| AssetView {
                    preview_url: preview_url(&config, &asset),
                    asset,
                })
                .collect();
            print_json(&views)
        }
        Command::Select {
            reference,
            asset_id,
            off,
            actor,
        } => {
            let actor = actor.unwrap_or_else(|| config.default_actor.clone());
            print_json(&library.set_selection(&reference, asset_id, !off, &actor)?)
        }
        Command::RemoveAsset { reference, asset_id } => {
            print_json(&library.remove_asset(&reference, asset_id)?)
        }
        Command::Lock { reference, off } => print_json(&library.set_lock(&reference, !off)?),
        Command::Submit { reference } => print_json(&library.submit_selection(&reference)?),
        Command::Versions { reference } => {
            print_json(&library.list_selection_versions(&reference)?)
        }
        Command::EditRequest { reference, file } => {
            let items: Vec<EditRequestItem> = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            print_json(&library.submit_edit_request(&reference, &items)?)
        }
        Command::EditRequests { reference } => print_json(&library.list_edit_requests(&reference)?),
        Command::EditStatus { request_id, status } => {
            let status = EditRequestStatus::parse(&status)
                .ok_or_else(|| GalleryError::validation("status", format!("unknown status '{}'", status)))?;
            print_json(&library.set_edit_request_status(request_id, status)?)
        }
        Command::Reconcile { reference } => {
            let (folders, counts) = library.reconcile(&reference)?;
            print_json(&serde_json::json!({ "rawFolders": folders, "counts": counts }))
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("client_gallery=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = ?e.kind(), retryable = e.is_retryable(), "{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
