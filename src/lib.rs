//! Synheart Neuro - Real-time neuro-adaptive signal engine
//!
//! Neuro turns a stream of multi-channel EEG-like samples into cognitive
//! state metrics and picks UI adaptations for them through a deterministic
//! pipeline: bandpass filtering → band power estimation → metric derivation
//! → adaptation selection, with feedback learning on top.
//!
//! ## Modules
//!
//! - **Pipeline**: Per-sample processing (`NeuroProcessor`), usable on its own
//! - **Session**: Connection lifecycle, calibration and feedback around one pipeline
//! - **Simulator**: Seeded synthetic source for development and tests

pub mod baseline;
pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
pub mod filters;
pub mod history;
pub mod learner;
pub mod metrics;
pub mod pipeline;
pub mod power;
pub mod selector;
pub mod session;
pub mod simulator;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use baseline::CalibrationBaseline;
pub use catalog::AdaptationCatalog;
pub use config::{MetricWeights, PipelineConfig};
pub use device::DeviceLink;
pub use error::NeuroError;
pub use pipeline::NeuroProcessor;
pub use selector::{AdaptationSelector, ProfileScore};
pub use session::Session;
pub use simulator::{MentalState, SimulatedLink, SyntheticSource};
pub use types::{
    AdaptationDescriptor, AdaptationEvent, AdaptationProfile, Band, BandPowers, ConnectionState,
    DeviceInfo, DeviceKind, Metric, MetricVector, Sample, SignalFrame,
};

/// Library version
pub const NEURO_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "synheart-neuro";
