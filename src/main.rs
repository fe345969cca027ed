//! Inspect a VHD image
//!
//! Usage:
//!   vhd-reader <image.vhd>                    # print image info as JSON
//!   vhd-reader <image.vhd> --extract <dir>    # write <dir>/<stem>.raw
//!   vhd-reader <image.vhd> --verify <algo>    # md5 | sha1 | sha256 | sha512
//!
//! Control log level with RUST_LOG:
//!   RUST_LOG=vhd_reader_lib=trace vhd-reader disk.vhd

use std::path::PathBuf;
use std::process;

use clap::Parser;
use vhd_reader_lib::{logging, vhd};

#[derive(Parser, Debug)]
#[command(
    name = "vhd-reader",
    about = "Inspect, extract or hash fixed, dynamic and differencing VHD images."
)]
struct Args {
    /// VHD image path
    image: PathBuf,

    /// Write the linear disk to <DIR>/<stem>.raw
    #[arg(long, value_name = "DIR", conflicts_with = "verify")]
    extract: Option<PathBuf>,

    /// Hash the linear disk (md5, sha1, sha256, sha512)
    #[arg(long, value_name = "ALGORITHM")]
    verify: Option<String>,
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = &args.extract {
        let output = vhd::extract(&args.image, dir)?;
        println!("{}", output.display());
    } else if let Some(algorithm) = &args.verify {
        let digest = vhd::verify(&args.image, algorithm)?;
        println!("{}  {}", digest, args.image.display());
    } else {
        let info = vhd::info(&args.image)?;
        println!("{}", serde_json::to_string_pretty(&info)?);
    }
    Ok(())
}

fn main() {
    if cfg!(feature = "debug-logging") {
        logging::init_verbose();
    } else {
        logging::init();
    }

    let args = Args::parse();
    if let Err(e) = run(&args) {
        tracing::error!(error = %e, image = %args.image.display(), "vhd-reader failed");
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
