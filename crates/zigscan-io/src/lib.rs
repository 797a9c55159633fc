//! zigscan-io: Filesystem and device I/O.
//!
//! Loads the calibration record and camera frames from disk, archives
//! every processed sample, and delivers finished paths to the treatment
//! device over TCP. All geometry lives in `zigscan-pipeline`; all byte
//! formats live in `zigscan-export`.

pub mod archive;
pub mod calibration_file;
pub mod device;
pub mod frames;

pub use archive::{ArchiveError, ArchivedSample, SampleArchive, now};
pub use calibration_file::{CalibrationFileError, load_calibration, parse_calibration_yaml};
pub use device::{DeviceError, TcpDeviceLink};
pub use frames::{FrameError, load_frame, save_frame, save_mask};
