//! CLI argument parsing with clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use camera_preview::camera::Resolution;

/// Drive a camera through its lifecycle and inspect the frames it delivers
#[derive(Parser, Debug)]
#[command(name = "camera-preview")]
#[command(version, about = "Camera lifecycle and NV21 frame preview", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available cameras
    ListCameras,
    /// Open a camera and stream frames until Ctrl-C
    Run(RunArgs),
    /// Show which preview size a camera would use
    SelectSize(SelectSizeArgs),
    /// Reassemble raw Y/U/V plane files into one NV21 file
    Convert(ConvertArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Camera to open first (0 = back, 1 = front)
    #[arg(long)]
    pub camera: Option<String>,

    /// Display rotation in degrees (0, 90, 180, 270)
    #[arg(long)]
    pub rotation: Option<u32>,

    /// Mirror the preview horizontally
    #[arg(long)]
    pub mirror: bool,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,

    /// Switch camera once this many frames have arrived
    #[arg(long)]
    pub switch_after: Option<u64>,

    /// Process every Nth frame (default from config)
    #[arg(long)]
    pub sample_interval: Option<u32>,

    /// Write the last processed NV21 frame to this file
    #[arg(long)]
    pub dump: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Default)]
pub struct SelectSizeArgs {
    /// Camera whose advertised sizes are used
    #[arg(long)]
    pub camera: Option<String>,

    /// Candidate sizes to choose from instead of the camera's
    #[arg(long = "size", value_delimiter = ',')]
    pub sizes: Vec<Resolution>,

    /// Largest acceptable size
    #[arg(long)]
    pub max: Option<Resolution>,

    /// Smallest acceptable size
    #[arg(long)]
    pub min: Option<Resolution>,

    /// Size to use if offered
    #[arg(long)]
    pub exact: Option<Resolution>,

    /// Viewfinder size for aspect-ratio matching
    #[arg(long)]
    pub viewport: Option<Resolution>,
}

#[derive(clap::Args, Debug)]
pub struct ConvertArgs {
    /// Luma plane file
    #[arg(long)]
    pub y: PathBuf,

    /// U (Cb) plane file
    #[arg(long)]
    pub u: PathBuf,

    /// V (Cr) plane file
    #[arg(long)]
    pub v: PathBuf,

    /// Frame width in pixels
    #[arg(long)]
    pub width: u32,

    /// Frame height in pixels
    #[arg(long)]
    pub height: u32,

    /// Bytes per luma row (default: width)
    #[arg(long)]
    pub stride: Option<u32>,

    /// Output NV21 file
    #[arg(long, short)]
    pub output: PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_cameras_subcommand() {
        let args = Args::parse_from(["camera-preview", "list-cameras"]);
        assert!(matches!(args.command, Command::ListCameras));
        assert!(args.config.is_none());
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_global_options() {
        let args = Args::parse_from(["camera-preview", "run", "-vv", "--config", "/tmp/c.toml"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn test_run_defaults() {
        let args = Args::parse_from(["camera-preview", "run"]);
        let Command::Run(run) = args.command else {
            panic!("Expected Run subcommand");
        };
        assert!(run.camera.is_none());
        assert!(run.rotation.is_none());
        assert!(!run.mirror);
        assert!(run.frames.is_none());
        assert!(run.switch_after.is_none());
        assert!(run.dump.is_none());
    }

    #[test]
    fn test_run_options() {
        let args = Args::parse_from([
            "camera-preview",
            "run",
            "--camera", "1",
            "--rotation", "90",
            "--mirror",
            "--frames", "120",
            "--switch-after", "60",
            "--sample-interval", "10",
        ]);
        let Command::Run(run) = args.command else {
            panic!("Expected Run subcommand");
        };
        assert_eq!(run.camera.as_deref(), Some("1"));
        assert_eq!(run.rotation, Some(90));
        assert!(run.mirror);
        assert_eq!(run.frames, Some(120));
        assert_eq!(run.switch_after, Some(60));
        assert_eq!(run.sample_interval, Some(10));
    }

    #[test]
    fn test_select_size_parses_resolutions() {
        let args = Args::parse_from([
            "camera-preview",
            "select-size",
            "--size", "1920x1080,1280x720",
            "--size", "640x480",
            "--max", "1280x720",
            "--viewport", "1080x1920",
        ]);
        let Command::SelectSize(select) = args.command else {
            panic!("Expected SelectSize subcommand");
        };
        assert_eq!(
            select.sizes,
            vec![Resolution::FULL_HD, Resolution::HIGH, Resolution::MEDIUM]
        );
        assert_eq!(select.max, Some(Resolution::HIGH));
        assert_eq!(select.viewport, Some(Resolution::new(1080, 1920)));
    }

    #[test]
    fn test_select_size_rejects_bad_resolution() {
        let result = Args::try_parse_from(["camera-preview", "select-size", "--max", "wide"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_convert_requires_planes() {
        assert!(Args::try_parse_from(["camera-preview", "convert", "--width", "4"]).is_err());

        let args = Args::parse_from([
            "camera-preview", "convert",
            "--y", "y.raw", "--u", "u.raw", "--v", "v.raw",
            "--width", "640", "--height", "480", "--stride", "704",
            "-o", "out.nv21",
        ]);
        let Command::Convert(convert) = args.command else {
            panic!("Expected Convert subcommand");
        };
        assert_eq!(convert.stride, Some(704));
        assert_eq!(convert.output, PathBuf::from("out.nv21"));
    }

    #[test]
    fn test_config_subcommands() {
        let args = Args::parse_from(["camera-preview", "config", "show"]);
        assert!(matches!(
            args.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
        let args = Args::parse_from(["camera-preview", "config", "init"]);
        assert!(matches!(
            args.command,
            Command::Config {
                action: ConfigAction::Init
            }
        ));
    }
}
