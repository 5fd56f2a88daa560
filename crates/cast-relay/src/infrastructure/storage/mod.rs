//! Storage infrastructure: the optional TOML configuration file.
//!
//! The relay keeps no state on disk.  The only file it reads is the operator's
//! config, and only when `--config` (or `CAST_CONFIG`) names one.

pub mod config;
