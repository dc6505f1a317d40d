//! `rangeflow config` – show config path and effective values.

use anyhow::Result;
use rangeflow_core::config::{self, RangeflowConfig};

pub fn run_config(cfg: &RangeflowConfig) -> Result<()> {
    println!("config: {}", config::config_path()?.display());
    println!("{:#?}", cfg);
    Ok(())
}
