use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    sync::Arc,
};

use hashbrown::{hash_map::Entry, HashMap};
use parking_lot::Mutex;

use super::{
    ComputePipeline, CreatePipelineError, GraphicsPipeline, GraphicsShaders, PipelineOptions,
};
use crate::{backend::Backend, cache::PipelineCache, shader::Shader};

/// Shader identity.
/// Two keys are equal only if they refer to the same shader object.
#[derive(Clone)]
struct ShaderKey(Option<Arc<Shader>>);

impl ShaderKey {
    fn new(shader: Option<&Arc<Shader>>) -> Self {
        ShaderKey(shader.cloned())
    }

    fn ptr(&self) -> *const Shader {
        match &self.0 {
            Some(shader) => Arc::as_ptr(shader),
            None => std::ptr::null(),
        }
    }
}

impl PartialEq for ShaderKey {
    fn eq(&self, other: &Self) -> bool {
        self.ptr() == other.ptr()
    }
}

impl Eq for ShaderKey {}

impl Hash for ShaderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr().hash(state)
    }
}

impl Debug for ShaderKey {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(shader) => fmt.write_str(shader.debug_name()),
            None => fmt.write_str("-"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ComputePipelineKey {
    cs: ShaderKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct GraphicsPipelineKey {
    vs: ShaderKey,
    tcs: ShaderKey,
    tes: ShaderKey,
    gs: ShaderKey,
    fs: ShaderKey,
}

/// Creates pipelines and deduplicates them by shader combination.
///
/// Requesting the same shaders again returns the same pipeline object,
/// also when requests race.
pub struct PipelineManager<B: Backend> {
    device: Arc<B>,
    options: PipelineOptions,
    compute: Mutex<HashMap<ComputePipelineKey, Arc<ComputePipeline<B>>>>,
    graphics: Mutex<HashMap<GraphicsPipelineKey, Arc<GraphicsPipeline<B>>>>,
}

impl<B> Debug for PipelineManager<B>
where
    B: Backend,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("PipelineManager")
            .field("options", &self.options)
            .field("compute", &self.compute.lock().len())
            .field("graphics", &self.graphics.lock().len())
            .finish()
    }
}

impl<B> PipelineManager<B>
where
    B: Backend,
{
    pub fn new(device: Arc<B>, options: PipelineOptions) -> Self {
        PipelineManager {
            device,
            options,
            compute: Mutex::new(HashMap::new()),
            graphics: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Returns compute pipeline for the shader, creating it on first request.
    ///
    /// Returns `Ok(None)` if no shader is given.
    pub fn create_compute_pipeline(
        &self,
        cache: &Arc<PipelineCache<B>>,
        cs: Option<&Arc<Shader>>,
    ) -> Result<Option<Arc<ComputePipeline<B>>>, CreatePipelineError> {
        let cs = match cs {
            Some(cs) => cs,
            None => return Ok(None),
        };

        let key = ComputePipelineKey {
            cs: ShaderKey::new(Some(cs)),
        };

        let mut compute = self.compute.lock();
        match compute.entry(key) {
            Entry::Occupied(entry) => Ok(Some(Arc::clone(entry.get()))),
            Entry::Vacant(entry) => {
                let pipeline = Arc::new(ComputePipeline::new(&self.device, cache, cs)?);
                entry.insert(Arc::clone(&pipeline));
                Ok(Some(pipeline))
            }
        }
    }

    /// Returns graphics pipeline for the shader combination,
    /// creating it on first request.
    ///
    /// Returns `Ok(None)` if no vertex shader is given.
    pub fn create_graphics_pipeline(
        &self,
        cache: &Arc<PipelineCache<B>>,
        vs: Option<&Arc<Shader>>,
        tcs: Option<&Arc<Shader>>,
        tes: Option<&Arc<Shader>>,
        gs: Option<&Arc<Shader>>,
        fs: Option<&Arc<Shader>>,
    ) -> Result<Option<Arc<GraphicsPipeline<B>>>, CreatePipelineError> {
        let vs = match vs {
            Some(vs) => vs,
            None => return Ok(None),
        };

        let key = GraphicsPipelineKey {
            vs: ShaderKey::new(Some(vs)),
            tcs: ShaderKey::new(tcs),
            tes: ShaderKey::new(tes),
            gs: ShaderKey::new(gs),
            fs: ShaderKey::new(fs),
        };

        let mut graphics = self.graphics.lock();
        match graphics.entry(key) {
            Entry::Occupied(entry) => Ok(Some(Arc::clone(entry.get()))),
            Entry::Vacant(entry) => {
                let shaders = GraphicsShaders {
                    vertex: Arc::clone(vs),
                    tessellation_control: tcs.cloned(),
                    tessellation_evaluation: tes.cloned(),
                    geometry: gs.cloned(),
                    fragment: fs.cloned(),
                };

                let pipeline = Arc::new(GraphicsPipeline::new(
                    &self.device,
                    cache,
                    self.options,
                    shaders,
                )?);
                entry.insert(Arc::clone(&pipeline));
                Ok(Some(pipeline))
            }
        }
    }

    pub fn compute_pipeline_count(&self) -> usize {
        self.compute.lock().len()
    }

    pub fn graphics_pipeline_count(&self) -> usize {
        self.graphics.lock().len()
    }

    /// Releases manager references to every pipeline.
    /// Pipelines still referenced elsewhere stay alive.
    pub fn clear(&self) {
        let compute = std::mem::take(&mut *self.compute.lock());
        let graphics = std::mem::take(&mut *self.graphics.lock());

        debug!(
            "Releasing {} compute and {} graphics pipelines",
            compute.len(),
            graphics.len()
        );
    }
}
