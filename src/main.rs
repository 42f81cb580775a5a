//! The network map service daemon.
//!
//! Boot sequence (`spec.md` §4.F/§9): load configuration, load or
//! generate the signing authority, migrate any filesystem-backed state
//! into the embedded database, spawn the processor on its dedicated
//! thread and wait for it to establish initial parameters and an
//! initial network map, then spawn the notary directory watcher and the
//! HTTP server on the shared multi-threaded runtime.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{crate_authors, crate_version, Arg, ArgAction, Command};
use tracing::{error, info};

use netmapd::config::Config;
use netmapd::log::{self, LogLevel};
use netmapd::metrics::Metrics;
use netmapd::migration;
use netmapd::processor::{Processor, Stores};
use netmapd::signing::SigningAuthority;
use netmapd::store::db::{self, DbStore};
use netmapd::store::Collection;
use netmapd::units::http_server::HttpServer;
use netmapd::units::notary_watcher::NotaryWatcher;
use netmapd::ExitError;

fn main() -> ExitCode {
    log::init(LogLevel::Info);

    let cmd = Command::new("netmapd")
        .version(crate_version!())
        .author(crate_authors!())
        .about("The network map service for a permissioned distributed ledger")
        .next_line_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("Path to the TOML configuration file"),
        )
        .arg(
            Arg::new("check_config")
                .long("check-config")
                .action(ArgAction::SetTrue)
                .help("Validate the configuration and exit without starting"),
        );

    let matches = cmd.get_matches();

    let config = match matches.get_one::<String>("config") {
        Some(path) => match Config::load_from_file(Utf8Path::new(path)) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("netmapd couldn't be configured: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    if let Err(err) = config.db_backend() {
        eprintln!("netmapd couldn't be configured: {err}");
        return ExitCode::FAILURE;
    }

    if matches.get_flag("check_config") {
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("couldn't start the Tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), ExitError> {
    std::fs::create_dir_all(&config.db_dir)?;

    let signing_key_path: Utf8PathBuf = config.db_dir.join("signing-key.pk8");
    let signing = Arc::new(
        SigningAuthority::load_or_generate(&signing_key_path)
            .map_err(|err| ExitError::Bootstrap(err.to_string()))?,
    );
    let metrics = Arc::new(Metrics::new());

    let db = db::open_database(&config.db_dir.join("netmap.redb"))
        .map_err(|err| ExitError::Bootstrap(err.to_string()))?;

    info!("migrating any filesystem-backed state into the embedded database");
    migration::run(&config.db_dir, db.clone())
        .await
        .map_err(|err| ExitError::Bootstrap(err.to_string()))?;

    let stores = Stores {
        network_parameters: Box::new(
            DbStore::open(db.clone(), Collection::SignedNetworkParameters).map_err(bootstrap_err)?,
        ),
        network_map: Box::new(DbStore::open(db.clone(), Collection::SignedNetworkMap).map_err(bootstrap_err)?),
        node_info: Box::new(DbStore::open(db.clone(), Collection::SignedNodeInfo).map_err(bootstrap_err)?),
        parameters_update: Box::new(
            DbStore::open(db.clone(), Collection::ParametersUpdate).map_err(bootstrap_err)?,
        ),
        etc: Box::new(DbStore::open(db, Collection::Etc).map_err(bootstrap_err)?),
    };

    let handle = Processor::spawn(
        stores,
        signing.clone(),
        metrics.clone(),
        config.param_update_delay,
        config.network_map_delay,
    );

    handle
        .ready
        .await
        .map_err(|_| ExitError::Bootstrap("processor terminated before reporting readiness".into()))?
        .map_err(|err| ExitError::Bootstrap(err.to_string()))?;
    info!("network parameters and network map established");

    let watcher = NotaryWatcher {
        dir: config.notary_dir.clone(),
        processor_tx: handle.tx.clone(),
    };
    tokio::spawn(watcher.run());

    let http_server = HttpServer {
        processor_tx: handle.tx.clone(),
        metrics: metrics.clone(),
        cache_timeout: config.cache_timeout,
    };
    let listen_addr: SocketAddr = ([0, 0, 0, 0], config.port).into();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let http_task = tokio::spawn(http_server.run(listen_addr, async {
        let _ = shutdown_rx.await;
    }));

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {err}");
    } else {
        info!("received shutdown signal");
    }
    let _ = shutdown_tx.send(());

    match http_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!("http server exited with an error: {err}"),
        Err(err) => error!("http server task panicked: {err}"),
    }

    Ok(())
}

fn bootstrap_err(err: netmapd::store::StoreError) -> ExitError {
    ExitError::Bootstrap(err.to_string())
}
