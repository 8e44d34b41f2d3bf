use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use siteedge::config::{Config, LogFormat};
use siteedge::deploy::{self, DeployLimits, Manifest};
use siteedge::proxy::{init, EdgeProxy};
use siteedge::storage::StorageRegistry;

/// Siteedge - multi-tenant static site edge built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "siteedge")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve sites
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Daemon mode
        #[arg(short = 'd', long)]
        daemon: bool,

        /// Test configuration and exit
        #[arg(long)]
        test: bool,

        /// Upgrade workers gracefully
        #[arg(long)]
        upgrade: bool,
    },

    /// Build `manifest.json` and `site.tar.gz` from a directory
    Pack {
        /// Site directory
        dir: PathBuf,

        /// Where the manifest and archive are written
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Maximum number of files
        #[arg(long, default_value_t = siteedge::constants::DEFAULT_MAX_DEPLOYMENT_FILES)]
        max_files: usize,
    },

    /// Verify an archive against its manifest and upload it to blob storage
    Ingest {
        #[arg(long)]
        manifest: PathBuf,

        #[arg(long)]
        archive: PathBuf,

        /// Storage URL, e.g. `file:///srv/blobs` or `s3://bucket/prefix`
        #[arg(long)]
        storage: String,

        /// Key prefix for the deployment's files
        #[arg(long)]
        prefix: String,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Serve {
            config,
            daemon,
            test,
            upgrade,
        } => serve(&config, daemon, test, upgrade),
        Command::Pack {
            dir,
            out_dir,
            max_files,
        } => {
            init_cli_logging()?;
            pack(&dir, &out_dir, max_files)
        }
        Command::Ingest {
            manifest,
            archive,
            storage,
            prefix,
        } => {
            init_cli_logging()?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(ingest(&manifest, &archive, &storage, &prefix))
        }
    }
}

fn init_cli_logging() -> anyhow::Result<()> {
    siteedge::logging::init_subscriber(LogFormat::Pretty, "info")
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging subsystem")
}

fn serve(config_path: &Path, daemon: bool, test: bool, upgrade: bool) -> anyhow::Result<()> {
    let config = Config::from_file(config_path)
        .map_err(anyhow::Error::msg)
        .context("Failed to load configuration")?;
    if let Err(e) = config.validate() {
        bail!("Invalid configuration: {}", e);
    }

    siteedge::logging::init_subscriber(config.logging.format, &config.logging.level)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging subsystem")?;

    tracing::info!(
        config_file = %config_path.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        host_pattern = %config.hosts.pattern,
        resolver = ?config.resolver.kind,
        "Configuration loaded successfully"
    );

    if test {
        tracing::info!("Configuration test passed");
        return Ok(());
    }

    // Resolver setup may touch storage, which needs a runtime of its own
    // before pingora starts its workers
    let runtime = tokio::runtime::Runtime::new()?;
    let handler = runtime
        .block_on(init::initialize_from_config(&config))
        .context("Failed to initialize edge")?;
    drop(runtime);

    let opt = Opt {
        daemon,
        upgrade,
        ..Default::default()
    };
    let mut server = Server::new(Some(opt)).context("Failed to create Pingora server")?;
    server.bootstrap();

    let proxy = EdgeProxy::new(Arc::new(handler));
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);
    proxy_service.threads = Some(config.server.threads);

    let listen_addr = config.server.listen_addr();
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, "Starting siteedge");

    server.add_service(proxy_service);
    server.run_forever();
}

fn pack(dir: &Path, out_dir: &Path, max_files: usize) -> anyhow::Result<()> {
    let manifest = deploy::collect(dir, max_files)
        .with_context(|| format!("Failed to collect {}", dir.display()))?;

    std::fs::create_dir_all(out_dir)?;
    let manifest_path = out_dir.join("manifest.json");
    let archive_path = out_dir.join("site.tar.gz");

    std::fs::write(&manifest_path, manifest.to_json()?)?;
    let archive = File::create(&archive_path)?;
    deploy::pack(dir, &manifest, archive)?;

    tracing::info!(
        files = manifest.file_count(),
        bytes = manifest.total_size(),
        manifest = %manifest_path.display(),
        archive = %archive_path.display(),
        "deployment packed"
    );
    Ok(())
}

async fn ingest(
    manifest_path: &Path,
    archive_path: &Path,
    storage: &str,
    prefix: &str,
) -> anyhow::Result<()> {
    let manifest = Manifest::from_json(&std::fs::read(manifest_path)?)?;
    manifest.validate()?;
    let archive = File::open(archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;

    let store = StorageRegistry::with_defaults().open(storage).await?;
    let report = deploy::ingest(&manifest, archive, DeployLimits::default(), store, prefix).await?;

    println!("{} files, {} bytes", report.files, report.bytes);
    Ok(())
}
