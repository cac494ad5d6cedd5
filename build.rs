//! Copies `.env.example` into the dashtune data directory so an installed
//! binary has a configuration template next to where it looks for `.env`:
//!
//! - Linux: `~/.local/share/dashtune/.env.example`
//! - macOS: `~/Library/Application Support/dashtune/.env.example`
//! - Windows: `%LOCALAPPDATA%/dashtune/.env.example`
//!
//! A missing template only produces a cargo warning.

use std::{env, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let template = manifest_dir.join(".env.example");

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("dashtune");

    if !template.is_file() {
        println!("cargo:warning=.env.example not found at {}", template.display());
        return Ok(());
    }

    fs::create_dir_all(&out_dir)?;
    fs::copy(&template, out_dir.join(".env.example"))?;
    Ok(())
}
