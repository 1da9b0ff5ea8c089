use std::{
    fmt::{self, Debug},
    sync::Arc,
};

use crate::{
    backend::{Backend, DeviceCapability},
    cache::{CacheStorage, PipelineCache, PipelineCacheConfig},
    pipeline::{
        ComputePipeline, CreatePipelineError, GraphicsPipeline, PipelineManager, PipelineOptions,
    },
    queue::SubmissionQueue,
    shader::Shader,
    OutOfMemory,
};

/// Error that may occur when device is created.
#[derive(Debug, thiserror::Error)]
pub enum CreateDeviceError {
    #[error(transparent)]
    OutOfMemory {
        #[from]
        source: OutOfMemory,
    },

    #[error("Failed to spawn submission thread")]
    SpawnThread {
        #[from]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    pub cache: PipelineCacheConfig,
    pub pipelines: PipelineOptions,
    pub queue_thread_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            cache: PipelineCacheConfig::default(),
            pipelines: PipelineOptions::default(),
            queue_thread_name: String::from("pipewright-submit"),
        }
    }
}

/// Pipeline and submission services of one device.
pub struct Device<B: Backend> {
    backend: Arc<B>,
    queue: SubmissionQueue<B>,
    manager: PipelineManager<B>,
    cache: Arc<PipelineCache<B>>,
}

impl<B> Debug for Device<B>
where
    B: Backend,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Device")
            .field("backend", &self.backend)
            .field("queue", &self.queue)
            .field("manager", &self.manager)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<B> Device<B>
where
    B: Backend,
{
    pub fn new(
        backend: Arc<B>,
        storage: Box<dyn CacheStorage>,
        config: DeviceConfig,
    ) -> Result<Self, CreateDeviceError> {
        let cache = Arc::new(PipelineCache::new(Arc::clone(&backend), storage, config.cache)?);
        let manager = PipelineManager::new(Arc::clone(&backend), config.pipelines);
        let queue =
            SubmissionQueue::with_thread_name(Arc::clone(&backend), config.queue_thread_name)?;

        info!("Device created on {:?}", backend);

        Ok(Device {
            backend,
            queue,
            manager,
            cache,
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn supports(&self, capability: DeviceCapability) -> bool {
        self.backend.supports(capability)
    }

    pub fn pipeline_cache(&self) -> &Arc<PipelineCache<B>> {
        &self.cache
    }

    pub fn pipelines(&self) -> &PipelineManager<B> {
        &self.manager
    }

    pub fn queue(&self) -> &SubmissionQueue<B> {
        &self.queue
    }

    pub fn create_compute_pipeline(
        &self,
        cs: Option<&Arc<Shader>>,
    ) -> Result<Option<Arc<ComputePipeline<B>>>, CreatePipelineError> {
        self.manager.create_compute_pipeline(&self.cache, cs)
    }

    pub fn create_graphics_pipeline(
        &self,
        vs: Option<&Arc<Shader>>,
        tcs: Option<&Arc<Shader>>,
        tes: Option<&Arc<Shader>>,
        gs: Option<&Arc<Shader>>,
        fs: Option<&Arc<Shader>>,
    ) -> Result<Option<Arc<GraphicsPipeline<B>>>, CreatePipelineError> {
        self.manager
            .create_graphics_pipeline(&self.cache, vs, tcs, tes, gs, fs)
    }
}

impl<B> Drop for Device<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        self.queue.stop();
        self.manager.clear();
        self.cache.stop();
        debug!("Device destroyed");
    }
}
