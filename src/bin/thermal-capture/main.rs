mod args;

use anyhow::{Context, Result};
use log::info;

use args::Args;
use thermal_capture::{cli::capture, AcquisitionPipeline};

fn main() -> Result<()> {
    env_logger::init();
    let Args {
        camera_type,
        ffc_path,
        frames,
        retries,
        temperature,
    } = Args::from_cmd_line()?;

    let mut pipeline = AcquisitionPipeline::open(camera_type, ffc_path.as_deref())
        .with_context(|| format!("opening {} camera", camera_type))?;
    info!("reading {} frames of {}", frames, pipeline.geometry());

    let report = capture(&mut pipeline, &temperature, frames, retries);
    pipeline.close();

    serde_json::to_writer(std::io::stdout().lock(), &report?)?;
    println!();
    Ok(())
}
