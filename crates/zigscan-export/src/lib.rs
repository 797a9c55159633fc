//! zigscan-export: Pure format serializers (sans-IO)
//!
//! Converts a computed scan path into the artifacts that leave the
//! machine: the per-sample coordinate text file, the binary frame sent
//! to the treatment device, and rows of the per-session run log.

pub mod coords;
pub mod runlog;
pub mod wire;

pub use coords::{CoordinateParseError, parse_coordinate_text, to_coordinate_text};
pub use runlog::{RUN_LOG_HEADER, RunLogEntry, Timestamp, to_csv_row};
pub use wire::{WireError, decode_path_frame, encode_path_frame};
