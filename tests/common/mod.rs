//! Common test utilities
//!
//! Provides:
//! - `MockBackend`: in-memory device counting compiles and live objects,
//!   recording submissions and injecting failures and delays
//! - `MockStorage`: cache storage counting writes
//! - SPIR-V and shader builders

#![allow(dead_code)]

use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use pipewright::{
    backend::{
        Backend, ComputePipelineDesc, DeviceCapability, GraphicsPipelineDesc, PipelineCreateFlags,
        RasterizationOrder,
    },
    decoration, op, CacheStorage, CompilePipelineError, CreateShaderModuleError, DescriptorSlot,
    DescriptorType, DeviceLost, InterfaceSlots, OutOfMemory, PipelineBindPoint, ResourceSlot,
    Shader, ShaderStage, SpirvCode, SubmitError, SPIRV_MAGIC,
};

/// Installs log subscriber once. Run tests with `RUST_LOG=debug` to see logs.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

// ============================================================================
// MockBackend
// ============================================================================

/// Parameters of one pipeline compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileRecord {
    pub handle: u64,
    pub bind_point: PipelineBindPoint,
    pub flags: PipelineCreateFlags,
    pub base: Option<u64>,
    pub stages: Vec<ShaderStage>,
    pub specialization: Vec<u32>,
    pub rasterization_order: Option<RasterizationOrder>,
}

/// Shader module handed to the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleRecord {
    pub handle: u64,
    pub stage: ShaderStage,
    pub code: Vec<u32>,
}

/// Command list that takes `delay` to execute.
#[derive(Debug, Default)]
pub struct MockCommandList {
    pub id: u32,
    pub delay: Duration,
    pub panic: bool,
    pub fail: bool,
}

impl MockCommandList {
    pub fn new(id: u32) -> Arc<Self> {
        Arc::new(MockCommandList {
            id,
            ..Default::default()
        })
    }

    pub fn delayed(id: u32, delay: Duration) -> Arc<Self> {
        Arc::new(MockCommandList {
            id,
            delay,
            ..Default::default()
        })
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    capabilities: Mutex<Vec<DeviceCapability>>,
    next_handle: AtomicU64,

    pub compiles: Mutex<Vec<CompileRecord>>,
    pub modules: Mutex<Vec<ModuleRecord>>,
    pub layouts: Mutex<Vec<Vec<DescriptorSlot>>>,
    pub submitted: Mutex<Vec<u32>>,
    pub cache_initial_data: Mutex<Option<Vec<u8>>>,

    pub live_modules: AtomicUsize,
    pub live_layouts: AtomicUsize,
    pub live_pipelines: AtomicUsize,
    pub live_caches: AtomicUsize,

    fail_compiles: AtomicUsize,
    reject_compiles: AtomicUsize,
    fail_module_at: Mutex<Option<usize>>,
    reject_module_at: Mutex<Option<usize>>,
    compile_delay: Mutex<Duration>,
    cache_data: Mutex<Vec<u8>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(MockBackend::default())
    }

    pub fn with_capabilities(capabilities: &[DeviceCapability]) -> Arc<Self> {
        let backend = MockBackend::default();
        *backend.capabilities.lock() = capabilities.to_vec();
        Arc::new(backend)
    }

    /// Next `count` pipeline compilations fail.
    pub fn fail_next_compiles(&self, count: usize) {
        self.fail_compiles.store(count, Ordering::SeqCst);
    }

    /// Next `count` pipeline compilations are rejected by the driver.
    pub fn reject_next_compiles(&self, count: usize) {
        self.reject_compiles.store(count, Ordering::SeqCst);
    }

    /// Shader module creation with this zero-based index fails.
    pub fn fail_module_at(&self, index: usize) {
        *self.fail_module_at.lock() = Some(index);
    }

    /// Shader module creation with this zero-based index is rejected by the driver.
    pub fn reject_module_at(&self, index: usize) {
        *self.reject_module_at.lock() = Some(index);
    }

    pub fn set_compile_delay(&self, delay: Duration) {
        *self.compile_delay.lock() = delay;
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.lock().len()
    }

    pub fn last_compile(&self) -> CompileRecord {
        self.compiles
            .lock()
            .last()
            .cloned()
            .expect("Nothing was compiled")
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn compile(&self, mut record: CompileRecord) -> Result<u64, CompilePipelineError> {
        let delay = *self.compile_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let failing = self
            .fail_compiles
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok();
        if failing {
            return Err(OutOfMemory.into());
        }

        let rejecting = self
            .reject_compiles
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok();
        if rejecting {
            return Err(CompilePipelineError::Rejected {
                message: String::from("ERROR_INVALID_SHADER_NV"),
            });
        }

        record.handle = self.handle();
        self.cache_data.lock().push(record.handle as u8);
        self.live_pipelines.fetch_add(1, Ordering::SeqCst);
        self.compiles.lock().push(record.clone());
        Ok(record.handle)
    }
}

impl Backend for MockBackend {
    type ShaderModule = u64;
    type PipelineLayout = u64;
    type Pipeline = u64;
    type PipelineCache = u64;
    type CommandList = MockCommandList;

    fn supports(&self, capability: DeviceCapability) -> bool {
        self.capabilities.lock().contains(&capability)
    }

    fn create_shader_module(
        &self,
        stage: ShaderStage,
        code: &SpirvCode,
    ) -> Result<u64, CreateShaderModuleError> {
        let mut modules = self.modules.lock();
        if *self.fail_module_at.lock() == Some(modules.len()) {
            return Err(OutOfMemory.into());
        }
        if *self.reject_module_at.lock() == Some(modules.len()) {
            return Err(CreateShaderModuleError::Rejected {
                message: String::from("ERROR_INVALID_SHADER_NV"),
            });
        }

        let handle = self.handle();
        modules.push(ModuleRecord {
            handle,
            stage,
            code: code.words().to_vec(),
        });
        self.live_modules.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn destroy_shader_module(&self, _module: &u64) {
        self.live_modules.fetch_sub(1, Ordering::SeqCst);
    }

    fn create_pipeline_layout(
        &self,
        bindings: &[DescriptorSlot],
        _bind_point: PipelineBindPoint,
    ) -> Result<u64, OutOfMemory> {
        self.layouts.lock().push(bindings.to_vec());
        self.live_layouts.fetch_add(1, Ordering::SeqCst);
        Ok(self.handle())
    }

    fn destroy_pipeline_layout(&self, _layout: &u64) {
        self.live_layouts.fetch_sub(1, Ordering::SeqCst);
    }

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_, Self>,
    ) -> Result<u64, CompilePipelineError> {
        self.compile(CompileRecord {
            handle: 0,
            bind_point: PipelineBindPoint::Compute,
            flags: desc.flags,
            base: desc.base,
            stages: vec![desc.shader.stage],
            specialization: desc.specialization.values().to_vec(),
            rasterization_order: None,
        })
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_, Self>,
    ) -> Result<u64, CompilePipelineError> {
        self.compile(CompileRecord {
            handle: 0,
            bind_point: PipelineBindPoint::Graphics,
            flags: desc.flags,
            base: desc.base,
            stages: desc.stages.iter().map(|stage| stage.stage).collect(),
            specialization: desc.specialization.values().to_vec(),
            rasterization_order: desc.rasterization_order,
        })
    }

    fn destroy_pipeline(&self, _pipeline: u64) {
        self.live_pipelines.fetch_sub(1, Ordering::SeqCst);
    }

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> Result<u64, OutOfMemory> {
        *self.cache_initial_data.lock() = Some(initial_data.to_vec());
        *self.cache_data.lock() = initial_data.to_vec();
        self.live_caches.fetch_add(1, Ordering::SeqCst);
        Ok(self.handle())
    }

    fn pipeline_cache_data(&self, _cache: &u64) -> Result<Vec<u8>, OutOfMemory> {
        Ok(self.cache_data.lock().clone())
    }

    fn destroy_pipeline_cache(&self, _cache: &u64) {
        self.live_caches.fetch_sub(1, Ordering::SeqCst);
    }

    fn submit(&self, list: &MockCommandList) -> Result<(), SubmitError> {
        if list.panic {
            panic!("Command list {} panicked", list.id);
        }
        if list.fail {
            return Err(DeviceLost.into());
        }
        if !list.delay.is_zero() {
            thread::sleep(list.delay);
        }
        self.submitted.lock().push(list.id);
        Ok(())
    }

    fn wait(&self, _list: &MockCommandList) -> Result<(), DeviceLost> {
        Ok(())
    }
}

// ============================================================================
// MockStorage
// ============================================================================

#[derive(Debug, Default)]
pub struct StorageState {
    pub data: Mutex<Option<Vec<u8>>>,
    pub writes: AtomicUsize,
    pub fail_load: AtomicBool,
    pub fail_store: AtomicBool,
    pub panic_store: AtomicBool,
    pub store_delay: Mutex<Duration>,
}

/// Storage keeping blob in memory. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MockStorage {
    pub state: Arc<StorageState>,
}

impl MockStorage {
    pub fn new() -> Self {
        MockStorage::default()
    }

    pub fn with_data(data: &[u8]) -> Self {
        let storage = MockStorage::default();
        *storage.state.data.lock() = Some(data.to_vec());
        storage
    }

    pub fn writes(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }

    pub fn data(&self) -> Option<Vec<u8>> {
        self.state.data.lock().clone()
    }

    pub fn boxed(&self) -> Box<dyn CacheStorage> {
        Box::new(self.clone())
    }
}

impl CacheStorage for MockStorage {
    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        if self.state.fail_load.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "load failed"));
        }
        Ok(self.state.data.lock().clone())
    }

    fn store(&self, data: &[u8]) -> io::Result<()> {
        let delay = *self.state.store_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if self.state.panic_store.swap(false, Ordering::SeqCst) {
            panic!("store panicked");
        }
        if self.state.fail_store.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "store failed"));
        }
        *self.state.data.lock() = Some(data.to_vec());
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        String::from("<mock>")
    }
}

// ============================================================================
// Shader builders
// ============================================================================

fn instruction(opcode: u16, operands: &[u32]) -> impl Iterator<Item = u32> + '_ {
    std::iter::once(((operands.len() as u32 + 1) << 16) | opcode as u32)
        .chain(operands.iter().copied())
}

/// Module decorating variable `100 + i` with `Binding` `slots[i]`.
/// `salt` makes otherwise equal modules differ.
pub fn spirv(slots: &[u32], salt: u32) -> SpirvCode {
    let mut words = vec![SPIRV_MAGIC, 0x0001_0000, salt, 256, 0];
    for (index, &slot) in slots.iter().enumerate() {
        let id = 100 + index as u32;
        words.extend(instruction(op::DECORATE, &[id, decoration::DESCRIPTOR_SET, 0]));
        words.extend(instruction(op::DECORATE, &[id, decoration::BINDING, slot]));
    }
    SpirvCode::from_words(words).expect("Valid module")
}

/// `Binding` literals of the module, in instruction order.
pub fn bindings(code: &[u32]) -> Vec<u32> {
    let code = SpirvCode::from_words(code.to_vec()).expect("Valid module");
    code.instructions()
        .filter_map(Result::ok)
        .filter(|ins| ins.opcode() == op::DECORATE && ins.operand(1) == Some(decoration::BINDING))
        .filter_map(|ins| ins.operand(2))
        .collect()
}

pub fn shader_with_interface(
    stage: ShaderStage,
    slots: &[u32],
    interface: InterfaceSlots,
    salt: u32,
) -> Arc<Shader> {
    let resources = slots
        .iter()
        .map(|&slot| ResourceSlot {
            slot,
            ty: DescriptorType::UniformBuffer,
            view: None,
        })
        .collect();

    Arc::new(Shader::new(stage, spirv(slots, salt), resources, interface))
}

pub fn shader(stage: ShaderStage, slots: &[u32]) -> Arc<Shader> {
    shader_with_interface(stage, slots, InterfaceSlots::default(), 0)
}
