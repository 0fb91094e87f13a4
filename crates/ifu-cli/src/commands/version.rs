use std::error::Error;
use std::process::Command;

use clap::Args;
use ifu_pipe::serde::to_canonical_json_bytes;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Emit format versions and toolchain information as JSON.
    #[arg(long)]
    pub long: bool,
}

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: String,
    container_format: u32,
    checkpoint_format: u32,
    rustc: String,
}

pub fn run(args: &VersionArgs) -> Result<(), Box<dyn Error>> {
    if !args.long {
        println!("{}", ifu_core::provenance::PIPELINE_VERSION);
        return Ok(());
    }
    let info = VersionInfo {
        version: ifu_core::provenance::PIPELINE_VERSION.into(),
        container_format: ifu_io::FORMAT_VERSION,
        checkpoint_format: ifu_fit::CHECKPOINT_VERSION,
        rustc: rustc_version(),
    };
    let json = to_canonical_json_bytes(&info)?;
    print!("{}", String::from_utf8(json)?);
    Ok(())
}

fn rustc_version() -> String {
    Command::new("rustc")
        .arg("--version")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .unwrap_or_else(|| "rustc unavailable".into())
}
