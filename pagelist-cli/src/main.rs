mod args;
mod paths;

use std::fs;
use std::fs::File;
use std::sync::Arc;

use pagelist_lib::PagelistClient;
use pagelist_lib::error::ListError;
use pagelist_lib::list::HeadlessViewport;
use pagelist_lib::list::ListConfig;
use pagelist_lib::list::RecordRow;
use pagelist_lib::list::RowElement;
use pagelist_lib::records::RecordStoreConfig;
use pagelist_lib::storage::MemoryBackend;
use pagelist_lib::storage::PersistentStore;
use pagelist_lib::storage::SqliteBackend;
use pagelist_lib::storage::StorageConfig;
use pagelist_lib::transport::Endpoint;
use pagelist_lib::transport::EndpointConfig;
use pagelist_lib::transport::EndpointPool;
use clap::Parser;
use serde_json::Value;
use simplelog::Config;
use simplelog::LevelFilter;
use simplelog::WriteLogger;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio::time::Instant;

use args::Args;
use paths::AppDirs;

/// Rows are printed one per terminal line.
const ROW_HEIGHT: f64 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] pagelist_lib::error::Error),

    #[error(transparent)]
    List(#[from] ListError),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

fn init_logging(dirs: Option<&AppDirs>) {
    let Some(dirs) = dirs else { return };
    if let Err(e) = dirs.rotate_logs(paths::KEPT_LOGS) {
        eprintln!("Logging disabled: {}", e);
        return;
    }
    match File::create(dirs.log_file()) {
        Ok(file) => {
            if let Err(e) = WriteLogger::init(LevelFilter::Debug, Config::default(), file) {
                eprintln!("Logging disabled: {}", e);
            }
        }
        Err(e) => eprintln!("Logging disabled: {}", e),
    }
}

fn open_storage(args: &Args, dirs: Option<&AppDirs>) -> PersistentStore {
    let config = if args.compress {
        StorageConfig::compressed()
    } else {
        StorageConfig::default()
    };
    if args.no_cache {
        return PersistentStore::new(MemoryBackend::new(), config);
    }

    let Some(path) = args.db.clone().or_else(|| dirs.map(AppDirs::record_db)) else {
        log::warn!("No data directory; keeping the record cache in memory");
        return PersistentStore::new(MemoryBackend::new(), config);
    };
    if let Some(dir) = path.parent()
        && let Err(e) = fs::create_dir_all(dir)
    {
        log::warn!("Could not create {}: {}", dir.display(), e);
    }
    let opened = SqliteBackend::open(&path).and_then(|backend| match args.max_pages {
        Some(pages) => backend.with_max_pages(pages),
        None => Ok(backend),
    });
    match opened {
        Ok(backend) => {
            log::info!("Record cache at {}", path.display());
            PersistentStore::new(backend, config)
        }
        Err(e) => {
            log::warn!("Could not open {}: {}; keeping the cache in memory", path.display(), e);
            PersistentStore::new(MemoryBackend::new(), config)
        }
    }
}

fn describe(record: &Value) -> String {
    for field in ["title", "name", "headline"] {
        if let Some(text) = record.get(field).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    record.to_string()
}

fn print_endpoints(client: &PagelistClient) {
    let Some(pool) = client.endpoints() else { return };
    let best = pool.best();
    for endpoint in pool.endpoints() {
        let marker = if best.as_deref() == Some(endpoint.url.as_str()) { "*" } else { " " };
        let latency = endpoint
            .latency
            .map(|l| format!("{} ms", l.as_millis()))
            .unwrap_or_else(|| "unreachable".to_string());
        let build = endpoint
            .build_timestamp
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_default();
        println!("{} {:<40} {:>12} {}", marker, endpoint.url, latency, build);
    }
}

async fn run(args: Args, dirs: Option<AppDirs>) -> Result<(), CliError> {
    let pool = EndpointPool::new(
        args.endpoints
            .iter()
            .enumerate()
            .map(|(i, url)| Endpoint::new(url, format!("mirror-{}", i + 1))),
        EndpointConfig::default(),
    );
    let client = PagelistClient::builder()
        .endpoints(pool)
        .storage(open_storage(&args, dirs.as_ref()))
        .record_config(RecordStoreConfig::default().with_block_size(args.block_size))
        .timeout(args.timeout())
        .build()?;
    let _scan = client.spawn_retry_scan();

    if args.ping || args.endpoints.len() > 1 {
        client.ping_endpoints().await;
    }
    if args.ping {
        print_endpoints(&client);
        return Ok(());
    }

    let viewport = Arc::new(HeadlessViewport::new(args.rows as f64 * ROW_HEIGHT));
    let list = client.list(
        "cli",
        viewport.clone(),
        ListConfig::default().with_row_height(ROW_HEIGHT).with_buffer(0),
    );

    let (totals, mut total_rx) = mpsc::unbounded_channel();
    list.on_total_changed(move |total| {
        let _ = totals.send(total);
    });

    let deadline = Instant::now() + args.timeout();
    list.update_query(args.query())?;
    let total = tokio::time::timeout_at(deadline, total_rx.recv())
        .await
        .map_err(|_| CliError::Timeout("the item count"))?
        .unwrap_or(0);
    println!("{} Items", total);
    if total == 0 {
        client.shutdown();
        return Ok(());
    }

    list.scroll_to_index(args.offset)?;
    list.on_frame()?;

    let last = (args.offset + args.rows).min(total);
    let wanted = |rows: &[(usize, RecordRow)]| -> Vec<(usize, RecordRow)> {
        rows.iter()
            .filter(|(index, _)| (args.offset..last).contains(index))
            .cloned()
            .collect()
    };

    let rows = loop {
        let rows = wanted(&list.rows());
        if rows.iter().all(|(_, row)| !row.is_loading()) {
            break rows;
        }
        if Instant::now() >= deadline {
            client.shutdown();
            return Err(CliError::Timeout("records"));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Heals rows whose first request hit a cold backend.
        list.render_visible_items()?;
    };

    for (index, row) in rows {
        let text = row.record().as_ref().map(describe).unwrap_or_default();
        println!("{:>8}  {}", index, text);
    }

    list.destroy();
    client.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let dirs = AppDirs::discover();
    init_logging(dirs.as_ref());

    if let Err(e) = run(args, dirs).await {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
