//! Pipewright is the pipeline core of a Vulkan translation layer.
//!
//! It deduplicates pipelines by shader combination,
//! lazily compiles device pipeline objects for every observed state variant,
//! remaps shader-local resource slots onto one binding space per pipeline
//! and keeps the driver pipeline cache warm across runs.
//!
//! Recorded command lists are handed to [`SubmissionQueue`]
//! which submits them in order on a dedicated thread.
//!
//! Device access goes through the [`backend::Backend`] trait.
//! Vulkan implementation is available with `vulkan` feature.

// Someday this will be uncommented.
// #![warn(missing_docs)]

#![warn(missing_debug_implementations)]
#![warn(missing_copy_implementations)]

use std::{error::Error, fmt::Debug};

#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! trace {
    ($($tokens:tt)*) => {
        tracing::trace!($($tokens)*)
    };
}

#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! debug {
    ($($tokens:tt)*) => {
        tracing::debug!($($tokens)*)
    };
}

#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! info {
    ($($tokens:tt)*) => {
        tracing::info!($($tokens)*)
    };
}

#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! warn {
    ($($tokens:tt)*) => {
        tracing::warn!($($tokens)*)
    };
}

#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! error {
    ($($tokens:tt)*) => {
        tracing::error!($($tokens)*)
    };
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! trace {
    ($($e:expr),*) => {{ $(let _ = &$e;)* }};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($e:expr),*) => {{ $( let _ = &$e;)* }};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! info {
    ($($e:expr),*) => {{ $(let _ = &$e;)* }};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! warn {
    ($($e:expr),*) => {{ $(let _ = &$e;)* }};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! error {
    ($($e:expr),*) => {{ $(let _ = &$e;)* }};
}

pub mod backend;

mod cache;
mod descriptor;
mod device;
mod event;
mod pipeline;
mod queue;
mod shader;
mod spirv;
mod worker;

pub use self::{
    backend::{Backend, DeviceCapability},
    cache::*,
    descriptor::*,
    device::*,
    event::*,
    pipeline::*,
    queue::*,
    shader::*,
    spirv::*,
};

/// Error that may occur when allocation fails because of either
/// device memory is exhausted.
///
/// Deallocation of device memory or other resources may increase chance
/// that operation would succeed.
#[derive(Clone, Copy, Debug, thiserror::Error, PartialEq, Eq)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
#[error("Out of device memory")]
pub struct OutOfMemory;

/// Error that may occur during execution on the device
/// and then signalled on command submission or waiting operations.
///
/// This error is unrecoverable, lost device must be recreated.
#[derive(Clone, Copy, Debug, thiserror::Error, PartialEq, Eq)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
#[error("Device lost")]
pub struct DeviceLost;

/// Handles host OOM the same way global allocator does.
/// This function should be called on host OOM error returned from Vulkan API.
#[track_caller]
pub fn out_of_host_memory() -> ! {
    use std::alloc::{handle_alloc_error, Layout};

    handle_alloc_error(Layout::new::<u8>())
}

#[allow(dead_code)]
fn assert_object<T: Debug + Send + Sync + 'static>() {}

#[allow(dead_code)]
fn assert_error<T: Error + Send + Sync + 'static>() {}

#[allow(dead_code)]
fn assert_errors() {
    assert_error::<OutOfMemory>();
    assert_error::<DeviceLost>();
    assert_error::<InvalidShader>();
    assert_error::<CreateShaderModuleError>();
    assert_error::<ReadShaderError>();
    assert_error::<CreatePipelineError>();
    assert_error::<CompilePipelineError>();
    assert_error::<SubmitError>();
    assert_error::<QueueStopped>();
    assert_error::<CreateDeviceError>();
    assert_object::<Event>();
    assert_object::<Shader>();
    assert_object::<DescriptorSlotMapping>();
}
