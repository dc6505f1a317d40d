//! `rangeflow probe <url>` – report size and range support.

use anyhow::{Context, Result};
use rangeflow_core::config::RangeflowConfig;
use rangeflow_core::CurlClient;
use std::collections::HashMap;

pub fn run_probe(cfg: &RangeflowConfig, url: &str, headers: Vec<(String, String)>) -> Result<()> {
    let http = cfg.http.clone().unwrap_or_default();
    let headers: HashMap<String, String> = headers.into_iter().collect();
    let head = CurlClient::new(http.curl_options())
        .probe(url, &headers)
        .with_context(|| format!("probe {}", url))?;
    match head.content_length {
        Some(size) => println!("size:          {}", size),
        None => println!("size:          unknown"),
    }
    println!(
        "accept-ranges: {}",
        if head.accept_ranges { "bytes" } else { "none" }
    );
    Ok(())
}
