//! # mic-level-cpal
//!
//! Cross-platform input backend for mic-level, built on cpal.
//!
//! Provides:
//! - `CpalInputDevice`: default system microphone as an `InputDevice`
//! - `CpalDeviceFactory`: hands a fresh device to each capture session
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use mic_level_core::{EngineConfiguration, LevelEngine};
//! use mic_level_cpal::CpalDeviceFactory;
//!
//! let engine = LevelEngine::new(EngineConfiguration::default(), Arc::new(CpalDeviceFactory))?;
//! engine.start()?;
//! ```

pub mod cpal_mic;

pub use cpal_mic::{CpalDeviceFactory, CpalInputDevice};
