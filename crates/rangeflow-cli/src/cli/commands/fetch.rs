//! `rangeflow fetch <url>` – download a byte range through the engine.

use anyhow::{Context, Result};
use rangeflow_core::config::RangeflowConfig;
use rangeflow_core::{CancelToken, CurlClient, Downloader, HttpRange, HttpRequestParams};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::{Duration, Instant};

use crate::cli::FetchArgs;

pub fn run_fetch(cfg: &RangeflowConfig, args: FetchArgs) -> Result<()> {
    let mut dl_cfg = cfg.downloader_config(None);
    if let Some(part_size) = args.part_size {
        dl_cfg.part_size = part_size;
    }
    if let Some(concurrency) = args.concurrency {
        dl_cfg.concurrency = concurrency;
    }
    let headers: HashMap<String, String> = args.headers.into_iter().collect();

    let size = match args.size {
        Some(size) => size,
        None => {
            let http = cfg.http.clone().unwrap_or_default();
            let head = CurlClient::new(http.curl_options())
                .probe(&args.url, &headers)
                .with_context(|| format!("probe {}", args.url))?;
            head.content_length.with_context(|| {
                format!("{} did not report its size; pass --size", args.url)
            })?
        }
    };

    let range = HttpRange {
        start: args.start,
        length: args.length,
    };
    let mut params = HttpRequestParams::new(args.url.clone(), range, size);
    params.headers = headers;

    let cancel = match args.timeout {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    let started = Instant::now();
    let mut reader = Downloader::new(dl_cfg)
        .download(&cancel, params)
        .with_context(|| format!("start download of {}", args.url))?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let copied = io::copy(&mut reader, &mut out).context("download failed");
    let stats = reader.stats();
    let closed = reader.close();
    let copied = copied?;
    closed.context("download failed")?;
    out.flush().context("flush output")?;

    let secs = started.elapsed().as_secs_f64();
    let mib_s = if secs > 0.0 {
        copied as f64 / (1024.0 * 1024.0) / secs
    } else {
        0.0
    };
    eprintln!(
        "{} bytes in {:.2}s ({:.2} MiB/s), peak {} workers",
        copied, secs, mib_s, stats.peak_workers
    );
    Ok(())
}
