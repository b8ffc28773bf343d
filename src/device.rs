//! Device/transport seam
//!
//! The engine never talks to hardware. A `DeviceLink` implementation owned
//! by the transport layer (Bluetooth, USB, a synthetic generator, ...)
//! opens the device and reports what it found; samples then arrive through
//! `Session::process_signal`.

use crate::error::NeuroError;
use crate::types::{DeviceInfo, DeviceKind};
use async_trait::async_trait;

/// Opens and closes a device on behalf of a session
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Open a device of the requested kind
    async fn open(&self, kind: DeviceKind) -> Result<DeviceInfo, NeuroError>;

    /// Release the device. Called on disconnect; must not fail.
    async fn close(&self) {}
}
