use std::path::PathBuf;

use anyhow::Result;
use clap::value_t_or_exit;
use thermal_capture::{
    config::{default_config_path, CaptureConfig},
    args_parser, opt, CameraVariant, TemperatureModel,
};

pub struct Args {
    pub camera_type: CameraVariant,
    pub ffc_path: Option<PathBuf>,
    pub frames: usize,
    pub retries: usize,
    pub temperature: TemperatureModel,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("thermal-capture")
            .about("Read frames from a Seek thermal camera and print their statistics.")
            .arg(
                opt!("config")
                    .short("c")
                    .help("Config file. Default is ~/.config/libseek-pi/config.json"),
            )
            .arg(
                opt!("camera type")
                    .short("t")
                    .help("seek / seekpro (and aliases); overrides the config"),
            )
            .arg(
                opt!("ffc path")
                    .short("f")
                    .help("Flat-field calibration (PNG or TCAL); overrides the config"),
            )
            .arg(
                opt!("frames")
                    .short("n")
                    .help("Number of frames to read"),
            )
            .arg(
                opt!("retries")
                    .help("Retries per frame on read timeout.  Default is 3"),
            )
            .get_matches();

        let config = matches
            .value_of("config")
            .map(PathBuf::from)
            .or_else(default_config_path)
            .map(|p| CaptureConfig::load(&p))
            .unwrap_or_default();

        let camera_type = match matches.value_of("camera type") {
            Some(name) => name.parse()?,
            None => config.camera_type,
        };
        let ffc_path = matches
            .value_of("ffc path")
            .map(PathBuf::from)
            .or(config.ffc_path);
        let frames = matches
            .is_present("frames")
            .then(|| value_t_or_exit!(matches.value_of("frames"), usize))
            .unwrap_or(config.frame_count);
        let retries = matches
            .is_present("retries")
            .then(|| value_t_or_exit!(matches.value_of("retries"), usize))
            .unwrap_or(3);

        Ok(Args {
            camera_type,
            ffc_path,
            frames,
            retries,
            temperature: config.temperature,
        })
    }
}
