//! Helpers shared by the accompanying binaries.
//!
//! APIs here shouldn't be considered stable / used as a
//! library.

use anyhow::{Context, Result};
pub use clap::{App, Arg};
use indicatif::{ProgressBar, ProgressStyle};
pub use inflector::Inflector;
use log::warn;
use serde_derive::*;

use crate::{
    error::{Error, ReadError},
    frame::Geometry,
    pipeline::AcquisitionPipeline,
    stats::Stats,
    temperature::{Hotspots, TemperatureModel},
};

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::App::new($name)
            .version(clap::crate_version!())
            .author(clap::crate_authors!())
    }};
}

#[macro_export]
macro_rules! arg {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

#[derive(Serialize, Debug)]
pub struct FrameStats {
    pub index: usize,
    pub stats: Stats,
    pub hotspots: Option<Hotspots>,
}

#[derive(Serialize, Debug)]
pub struct CaptureReport {
    pub camera_type: String,
    pub geometry: Geometry,
    pub temperature: TemperatureModel,
    pub frames: Vec<FrameStats>,
    pub cumulative: Stats,
}

/// Read `count` frames, retrying each timed out read up to
/// `retries` times. Statistics are in degrees Celsius as
/// given by `model`.
pub fn capture(
    pipeline: &mut AcquisitionPipeline,
    model: &TemperatureModel,
    count: usize,
    retries: usize,
) -> Result<CaptureReport> {
    let bar = ProgressBar::new(count as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {wide_bar:cyan/blue} {pos:>7}/{len:7}"),
    );

    let mut frames = Vec::with_capacity(count);
    let mut cumulative = Stats::default();
    for index in 0..count {
        let mut attempt = 0;
        let frame = loop {
            match pipeline.read_frame() {
                Err(Error::Read(ReadError::Timeout)) if attempt < retries => {
                    attempt += 1;
                    warn!("frame {} timed out, retry {}/{}", index, attempt, retries);
                }
                res => break res.with_context(|| format!("reading frame {}", index))?,
            }
        };
        let stats = Stats::from_frame(&frame, model);
        cumulative += &stats;
        frames.push(FrameStats {
            index,
            stats,
            hotspots: Hotspots::from_frame(&frame, model),
        });
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(CaptureReport {
        camera_type: pipeline.variant().to_string(),
        geometry: pipeline.geometry(),
        temperature: *model,
        frames,
        cumulative,
    })
}
