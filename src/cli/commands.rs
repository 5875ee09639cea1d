//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use camera_preview::camera::simulated::{SimulatedCamera, SimulatedPlatform, SimulatedSurface};
use camera_preview::camera::{
    self, convert_to_nv21, frame_transform, select_preview_size, CameraError, CameraHelper,
    CameraIdentity, CameraListener, CameraPlatform, CameraSettings, ConvertError, FrameBufferPool,
    FrameSampler, OpenedInfo, PreviewFrame, PreviewGeometry, SettingsError, SizeConstraints,
};
use camera_preview::config::{default_path, Config, ConfigError, DEFAULT_CONFIG_TEMPLATE};

use super::args::{ConfigAction, ConvertArgs, RunArgs, SelectSizeArgs};

/// Errors a subcommand can end with.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid camera settings: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("{0}")]
    Usage(String),
}

fn read_file(path: &Path) -> Result<Vec<u8>, CommandError> {
    std::fs::read(path).map_err(|source| CommandError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), CommandError> {
    std::fs::write(path, contents).map_err(|source| CommandError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Simulated back and front cameras configured from `[simulator]`.
pub fn simulated_platform(config: &Config) -> SimulatedPlatform {
    let padding = config.simulator.row_padding;
    SimulatedPlatform::new(vec![
        SimulatedCamera::back().with_row_padding(padding),
        SimulatedCamera::front().with_row_padding(padding),
    ])
    .with_frame_interval(config.simulator.frame_interval())
}

/// List available cameras and print them to stdout.
pub fn list_cameras(platform: &dyn CameraPlatform) -> Result<(), CommandError> {
    let devices = camera::list_devices(platform)?;
    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    for device in devices {
        println!("  {}", device);
        let sizes: Vec<String> = device.output_sizes.iter().map(|s| s.to_string()).collect();
        if sizes.is_empty() {
            println!("    no stream configuration");
        } else {
            println!("    sizes: {}", sizes.join(", "));
        }
    }
    println!();
    println!("Use --camera <id> to select a camera.");
    Ok(())
}

/// Show which preview size a camera would stream at.
pub fn select_size(config: &Config, args: &SelectSizeArgs) -> Result<(), CommandError> {
    let candidates = if args.sizes.is_empty() {
        let platform = simulated_platform(config);
        let id = args
            .camera
            .as_deref()
            .or(config.camera.id.as_deref())
            .map(CameraIdentity::new)
            .unwrap_or_else(CameraIdentity::back);
        platform
            .characteristics(&id)
            .map_err(CameraError::from)?
            .output_sizes
            .unwrap_or_default()
    } else {
        args.sizes.clone()
    };

    let base = config.camera.size_constraints()?;
    let constraints = SizeConstraints {
        max: args.max.or(base.max),
        min: args.min.or(base.min),
        exact: args.exact.or(base.exact),
        viewport: args.viewport.or(base.viewport),
    };

    let selection = select_preview_size(&candidates, &constraints).ok_or_else(|| {
        CommandError::Usage("no candidate preview sizes to choose from".to_string())
    })?;
    if selection.fell_back {
        println!(
            "{} (no size within bounds, fell back to the largest)",
            selection.size
        );
    } else {
        println!("{}", selection.size);
    }
    Ok(())
}

/// Reassemble plane files into an NV21 file.
pub fn convert(args: &ConvertArgs) -> Result<(), CommandError> {
    let y = read_file(&args.y)?;
    let u = read_file(&args.u)?;
    let v = read_file(&args.v)?;

    let stride = args.stride.unwrap_or(args.width);
    let geometry =
        PreviewGeometry::new(args.width, args.height, stride).ok_or(ConvertError::InvalidGeometry {
            width: args.width,
            height: args.height,
            row_stride: stride,
        })?;

    let mut pool = FrameBufferPool::new();
    let out = pool.acquire(geometry);
    let layout = convert_to_nv21(&y, &u, &v, geometry, out)?;
    write_file(&args.output, out)?;

    println!(
        "Wrote {} bytes ({:?} input) to {}",
        geometry.nv21_len(),
        layout,
        args.output.display()
    );
    Ok(())
}

/// Events the preview host forwards from camera callbacks to the main loop.
#[derive(Debug)]
enum HostEvent {
    Opened(OpenedInfo),
    Frame(u64),
    Closed,
    Error(CameraError),
    Interrupted,
}

/// Listener standing in for the host application.
struct PreviewHost {
    events: Mutex<Sender<HostEvent>>,
    sampler: Mutex<FrameSampler>,
    mirror: bool,
    opened: Mutex<Option<OpenedInfo>>,
    frames: AtomicU64,
    processed: AtomicU64,
    last_frame: Mutex<Vec<u8>>,
}

impl PreviewHost {
    fn send(&self, event: HostEvent) {
        let _ = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(event);
    }
}

impl CameraListener for PreviewHost {
    fn on_camera_opened(&self, info: &OpenedInfo) {
        *self.opened.lock().unwrap_or_else(PoisonError::into_inner) = Some(info.clone());
        self.send(HostEvent::Opened(info.clone()));
    }

    fn on_preview_frame(&self, frame: &PreviewFrame<'_>) {
        let count = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        let sample = self
            .sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .should_process();
        if sample {
            self.processed.fetch_add(1, Ordering::SeqCst);
            let opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner).clone();
            if let Some(opened) = opened {
                let transform = frame_transform(&opened.identity, opened.orientation, self.mirror);
                log::info!(
                    "Frame {} from camera {}: {} stride {}, visible {}, rotate {}°, flip {}",
                    count,
                    opened.identity,
                    frame.size,
                    frame.row_stride,
                    frame.visible,
                    transform.rotation_degrees,
                    transform.mirror_horizontal
                );
            }
            if let Some(nv21) = frame.nv21 {
                let mut last = self.last_frame.lock().unwrap_or_else(PoisonError::into_inner);
                last.clear();
                last.extend_from_slice(nv21);
            }
        }
        self.send(HostEvent::Frame(count));
    }

    fn on_camera_closed(&self) {
        self.send(HostEvent::Closed);
    }

    fn on_camera_error(&self, error: &CameraError) {
        self.send(HostEvent::Error(error.clone()));
    }
}

/// Stream from a simulated camera until Ctrl-C or the frame limit.
pub fn run(config: &Config, args: &RunArgs) -> Result<(), CommandError> {
    let surface = Arc::new(SimulatedSurface::new(config.host.view_size()?));
    let mut builder = config
        .camera
        .apply(CameraSettings::builder().preview_on(surface))?;
    if let Some(id) = &args.camera {
        builder = builder.camera(CameraIdentity::new(id.as_str()));
    }
    if let Some(rotation) = args.rotation {
        builder = builder.display_rotation_degrees(rotation);
    }
    if args.mirror {
        builder = builder.mirror(true);
    }
    let settings = builder.build()?;
    let mirror = settings.mirror();

    let (tx, rx) = mpsc::channel();
    let interrupt = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.send(HostEvent::Interrupted);
    })?;

    let host = Arc::new(PreviewHost {
        events: Mutex::new(tx),
        sampler: Mutex::new(FrameSampler::new(
            args.sample_interval.unwrap_or(config.host.sample_interval),
        )),
        mirror,
        opened: Mutex::new(None),
        frames: AtomicU64::new(0),
        processed: AtomicU64::new(0),
        last_frame: Mutex::new(Vec::new()),
    });
    let platform: Arc<dyn CameraPlatform> = Arc::new(simulated_platform(config));
    let helper = CameraHelper::new(platform, settings, &host);

    helper.start();
    let mut switched = false;
    let mut failure = None;
    while let Ok(event) = rx.recv() {
        match event {
            HostEvent::Opened(info) => println!(
                "Camera {} open at {}, orientation {}°{}",
                info.identity,
                info.preview_size,
                info.orientation,
                if info.mirrored { ", mirrored" } else { "" }
            ),
            HostEvent::Frame(count) => {
                if !switched && args.switch_after.is_some_and(|n| count >= n) {
                    switched = true;
                    helper.switch_camera();
                }
                if args.frames.is_some_and(|n| count >= n) {
                    break;
                }
            }
            HostEvent::Closed => println!("Camera closed"),
            HostEvent::Error(e) if e.is_warning() => eprintln!("Warning: {e}"),
            HostEvent::Error(e) => {
                failure = Some(e);
                break;
            }
            HostEvent::Interrupted => {
                println!("Interrupted");
                break;
            }
        }
    }
    helper.release();

    println!(
        "Received {} frames, processed {}",
        host.frames.load(Ordering::SeqCst),
        host.processed.load(Ordering::SeqCst)
    );
    if let Some(path) = &args.dump {
        let last = host.last_frame.lock().unwrap_or_else(PoisonError::into_inner);
        if last.is_empty() {
            println!("No converted frame to write");
        } else {
            write_file(path, &last)?;
            println!("Wrote last frame to {}", path.display());
        }
    }
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: ConfigAction,
    config_path: Option<&Path>,
) -> Result<(), CommandError> {
    let path = config_path.map(PathBuf::from).unwrap_or_else(default_path);
    match action {
        ConfigAction::Show => {
            let config = Config::load(Some(&path))?;
            println!("Current configuration:");
            println!();
            print!("{}", config.to_toml()?);
            println!();
            if path.exists() {
                println!("Config file: {} (exists)", path.display());
            } else {
                println!("Config file: {} (not found)", path.display());
            }
            Ok(())
        }
        ConfigAction::Init => {
            if path.exists() {
                return Err(CommandError::Usage(format!(
                    "Config file already exists: {}\nUse 'camera-preview config show' to view current settings.",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| CommandError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            write_file(&path, DEFAULT_CONFIG_TEMPLATE.as_bytes())?;
            println!("Created config file: {}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane_files(dir: &Path, y: &[u8], u: &[u8], v: &[u8]) -> ConvertArgs {
        let write = |name: &str, data: &[u8]| {
            let path = dir.join(name);
            std::fs::write(&path, data).unwrap();
            path
        };
        ConvertArgs {
            y: write("y.raw", y),
            u: write("u.raw", u),
            v: write("v.raw", v),
            width: 4,
            height: 2,
            stride: None,
            output: dir.join("out.nv21"),
        }
    }

    #[test]
    fn test_convert_writes_nv21() {
        let dir = tempfile::tempdir().unwrap();
        let args = plane_files(dir.path(), &[7u8; 8], &[1, 2], &[3, 4]);
        convert(&args).unwrap();

        let out = std::fs::read(&args.output).unwrap();
        assert_eq!(out.len(), 12);
        assert_eq!(&out[..8], &[7u8; 8]);
        assert_eq!(&out[8..], &[3, 1, 4, 2]);
    }

    #[test]
    fn test_convert_rejects_narrow_stride() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = plane_files(dir.path(), &[0u8; 8], &[0; 2], &[0; 2]);
        args.stride = Some(3);
        assert!(matches!(
            convert(&args),
            Err(CommandError::Convert(ConvertError::InvalidGeometry { .. }))
        ));
    }

    #[test]
    fn test_convert_missing_plane_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = plane_files(dir.path(), &[0u8; 8], &[0; 2], &[0; 2]);
        args.u = dir.path().join("absent.raw");
        assert!(matches!(convert(&args), Err(CommandError::Io { .. })));
    }

    #[test]
    fn test_config_init_then_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        handle_config_action(ConfigAction::Init, Some(&path)).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), Config::default());

        assert!(matches!(
            handle_config_action(ConfigAction::Init, Some(&path)),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_select_size_with_explicit_candidates() {
        let args = SelectSizeArgs {
            sizes: vec![camera::Resolution::FULL_HD, camera::Resolution::MEDIUM],
            max: Some(camera::Resolution::HIGH),
            ..Default::default()
        };
        select_size(&Config::default(), &args).unwrap();
    }

    #[test]
    fn test_list_cameras_on_simulator() {
        let platform = simulated_platform(&Config::default());
        list_cameras(&platform).unwrap();
    }
}
