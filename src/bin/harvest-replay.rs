use anyhow::{anyhow, Result};
use std::path::PathBuf;
use table_harvest::core::config::load_harvest_config;
use table_harvest::{ContainerRef, Harvester, JsonFileSink, ResultSink, SnapshotSurface};

/// Replays captured HTML windows through the harvest loop, one file per
/// scroll position.
///
///   harvest-replay [--container SEL] [--out PATH] [--viewport PX] win1.html win2.html ...
#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut container = "table".to_string();
    let mut out = PathBuf::from("products.json");
    let mut viewport: Option<f64> = None;
    let mut files: Vec<PathBuf> = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--container" => container = args.next().ok_or_else(|| anyhow!("--container needs a value"))?,
            "--out" => out = PathBuf::from(args.next().ok_or_else(|| anyhow!("--out needs a value"))?),
            "--viewport" => {
                let v = args.next().ok_or_else(|| anyhow!("--viewport needs a value"))?;
                viewport = Some(v.parse().map_err(|_| anyhow!("bad --viewport '{}'", v))?);
            }
            _ => files.push(PathBuf::from(a)),
        }
    }

    let sink = JsonFileSink::new(&out);
    if files.is_empty() {
        sink.write(&[], &[])?;
        return Err(anyhow!("no snapshot files given"));
    }

    let mut surface = match SnapshotSurface::from_files(&files) {
        Ok(s) => s,
        Err(e) => {
            sink.write(&[], &[])?;
            return Err(e);
        }
    };
    if let Some(v) = viewport {
        surface = surface.with_viewport(v);
    }

    let harvester = Harvester::new(load_harvest_config().resolve());
    let report = harvester.run(&surface, &ContainerRef::new(container)).await;
    sink.write(&report.headers, &report.rows)?;

    println!(
        "{} ({} rows from {} windows) → {}",
        report.outcome,
        report.row_count(),
        surface.window_count(),
        out.display()
    );
    Ok(())
}
