use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::{error, info, warn};

use table_harvest::core::config::load_harvest_config;
use table_harvest::scraping::browser_manager::{launch_browser, wait_until_stable};
use table_harvest::{ChromiumSurface, ContainerRef, HarvestReport, Harvester, JsonFileSink, RenderSurface, ResultSink};

const USAGE: &str = "\
Usage: table-harvest --url <URL> [options]

Options:
  --url <URL>              page to open (env: TARGET_URL)
  --container <SELECTOR>   table container (default: table)
  --wait-for <SELECTOR>    wait for this selector before harvesting
  --out <PATH>             records output (default: products.json)
  --report <PATH>          also write the full run report as JSON
  --headed                 show the browser window";

struct CliArgs {
    url: String,
    container: String,
    wait_for: Option<String>,
    out: PathBuf,
    report: Option<PathBuf>,
    headed: bool,
}

/// `--name value` or `--name=value`.
fn arg_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == name {
            return it.next().cloned();
        }
        if let Some(rest) = a.strip_prefix(&prefix) {
            return Some(rest.to_string());
        }
    }
    None
}

fn parse_args() -> Result<CliArgs> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let url = arg_value(&args, "--url")
        .or_else(|| std::env::var("TARGET_URL").ok())
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| anyhow!("missing --url (or TARGET_URL)\n\n{}", USAGE))?;
    url::Url::parse(&url).with_context(|| format!("invalid URL '{}'", url))?;

    Ok(CliArgs {
        url,
        container: arg_value(&args, "--container").unwrap_or_else(|| "table".to_string()),
        wait_for: arg_value(&args, "--wait-for"),
        out: arg_value(&args, "--out")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("products.json")),
        report: arg_value(&args, "--report").map(PathBuf::from),
        headed: args.iter().any(|a| a == "--headed"),
    })
}

fn write_report(path: &PathBuf, report: &HarvestReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!("📝 Report written to {}", path.display());
    Ok(())
}

async fn harvest_live(cli: &CliArgs) -> Result<HarvestReport> {
    let settings = load_harvest_config().resolve();
    let session = launch_browser(!cli.headed).await?;

    let result = async {
        info!("🌐 Navigating to: {}", cli.url);
        let page = session.open_page(&cli.url).await?;
        wait_until_stable(&page, 1_500, 20_000).await;

        let surface = ChromiumSurface::new(page);
        if let Some(sel) = &cli.wait_for {
            match surface.wait_for_selector(sel, settings.row_wait_timeout).await {
                Ok(true) => info!("✅ '{}' is present", sel),
                Ok(false) => warn!("'{}' did not appear within {:?}", sel, settings.row_wait_timeout),
                Err(e) => warn!("waiting for '{}' failed: {}", sel, e),
            }
        }

        let harvester = Harvester::new(settings.clone());
        Ok::<_, anyhow::Error>(harvester.run(&surface, &ContainerRef::new(&cli.container)).await)
    }
    .await;

    session.close().await;
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chromiumoxide=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let cli = parse_args()?;
    let sink = JsonFileSink::new(&cli.out);

    match harvest_live(&cli).await {
        Ok(report) => {
            sink.write(&report.headers, &report.rows)?;
            if let Some(path) = &cli.report {
                write_report(path, &report)?;
            }
            println!("{} ({} rows) → {}", report.outcome, report.row_count(), cli.out.display());
            Ok(())
        }
        Err(e) => {
            error!("❌ Harvest failed: {:#}", e);
            // Keep the artifact contract: an empty but valid record list.
            sink.write(&[], &[])?;
            Err(e)
        }
    }
}
