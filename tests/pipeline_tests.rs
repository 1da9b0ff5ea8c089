//! Pipeline Variant Tests
//!
//! Tests for:
//! - ComputePipeline / GraphicsPipeline: one compilation per distinct state,
//!   derivative hints, failed compiles, concurrent misses
//! - Graphics state validation and rasterization order
//! - Specialization constants from binding state
//! - Pipeline: kind dispatch, device object release

mod common;

use std::{
    num::NonZeroU64,
    sync::{atomic::Ordering, Arc, Barrier},
    thread,
    time::Duration,
};

use common::{init_logging, shader, shader_with_interface, MockBackend, MockStorage};
use ordered_float::OrderedFloat;
use pipewright::{
    backend::{DeviceCapability, PipelineCreateFlags, RasterizationOrder},
    Blending, BlendFactor, BlendOp, CompareOp, ComputePipelineState, CreatePipelineError,
    DepthTest, GraphicsPipeline, GraphicsPipelineState, InterfaceSlots, InvalidPipelineState,
    Pipeline, PipelineCache, PipelineCacheConfig, PipelineManager, PipelineOptions,
    PipelineState, RenderPassHandle, Shader, ShaderStage, VertexFormat, VertexInputAttribute,
};

struct Fixture {
    backend: Arc<MockBackend>,
    cache: Arc<PipelineCache<MockBackend>>,
    manager: PipelineManager<MockBackend>,
}

fn fixture(capabilities: &[DeviceCapability], options: PipelineOptions) -> Fixture {
    init_logging();
    let backend = MockBackend::with_capabilities(capabilities);
    let cache = Arc::new(
        PipelineCache::new(
            Arc::clone(&backend),
            MockStorage::new().boxed(),
            PipelineCacheConfig::default(),
        )
        .unwrap(),
    );
    let manager = PipelineManager::new(Arc::clone(&backend), options);
    Fixture {
        backend,
        cache,
        manager,
    }
}

impl Fixture {
    fn graphics(
        &self,
        vs: &Arc<Shader>,
        tcs: Option<&Arc<Shader>>,
        tes: Option<&Arc<Shader>>,
        fs: Option<&Arc<Shader>>,
    ) -> Arc<GraphicsPipeline<MockBackend>> {
        self.manager
            .create_graphics_pipeline(&self.cache, Some(vs), tcs, tes, None, fs)
            .unwrap()
            .unwrap()
    }
}

fn render_pass(id: u64) -> RenderPassHandle {
    RenderPassHandle(NonZeroU64::new(id).unwrap())
}

fn valid_state() -> GraphicsPipelineState {
    let mut state = GraphicsPipelineState::default();
    state.output_merger.render_pass = Some(render_pass(1));
    state
}

fn alpha_blending() -> Blending {
    Blending {
        color_src_factor: BlendFactor::SrcAlpha,
        color_dst_factor: BlendFactor::OneMinusSrcAlpha,
        color_op: BlendOp::Add,
        alpha_src_factor: BlendFactor::One,
        alpha_dst_factor: BlendFactor::Zero,
        alpha_op: BlendOp::Add,
    }
}

// ============================================================================
// Variant cache
// ============================================================================

#[test]
fn compiles_once_per_distinct_compute_state() {
    let f = fixture(&[], PipelineOptions::default());
    let cs = shader(ShaderStage::Compute, &[0, 1]);
    let pipeline = f.manager.create_compute_pipeline(&f.cache, Some(&cs)).unwrap().unwrap();

    let s1 = ComputePipelineState::default();
    let mut s2 = ComputePipelineState::default();
    s2.bindings.bind(1);

    let h1 = pipeline.get_pipeline_handle(&s1).unwrap();
    let h2 = pipeline.get_pipeline_handle(&s2).unwrap();
    assert_ne!(h1, h2);

    for _ in 0..3 {
        assert_eq!(pipeline.get_pipeline_handle(&s1).unwrap(), h1);
        assert_eq!(pipeline.get_pipeline_handle(&s2).unwrap(), h2);
    }

    assert_eq!(f.backend.compile_count(), 2);
    assert_eq!(pipeline.variant_count(), 2);
}

#[test]
fn compiles_once_per_distinct_graphics_state() {
    let f = fixture(&[], PipelineOptions::default());
    let vs = shader(ShaderStage::Vertex, &[0]);
    let fs = shader(ShaderStage::Fragment, &[1]);
    let pipeline = f.graphics(&vs, None, None, Some(&fs));

    let s1 = valid_state();
    let mut s2 = valid_state();
    s2.output_merger.render_pass = Some(render_pass(2));
    let mut s3 = valid_state();
    s3.rasterizer.depth_bias = Some(pipewright::DepthBias {
        constant: OrderedFloat(1.0),
        clamp: OrderedFloat(0.0),
        slope: OrderedFloat(2.0),
    });

    let handles: Vec<u64> = [&s1, &s2, &s3, &s1, &s2, &s3]
        .iter()
        .map(|state| pipeline.get_pipeline_handle(state).unwrap())
        .collect();

    assert_eq!(&handles[..3], &handles[3..]);
    assert_eq!(f.backend.compile_count(), 3);
}

#[test]
fn concurrent_identical_misses_compile_once() {
    let f = fixture(&[], PipelineOptions::default());
    f.backend.set_compile_delay(Duration::from_millis(10));
    let cs = shader(ShaderStage::Compute, &[0]);
    let pipeline = f.manager.create_compute_pipeline(&f.cache, Some(&cs)).unwrap().unwrap();
    let barrier = Arc::new(Barrier::new(6));

    let threads: Vec<_> = (0..6)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pipeline
                    .get_pipeline_handle(&ComputePipelineState::default())
                    .unwrap()
            })
        })
        .collect();

    let handles: Vec<u64> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    assert!(handles.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(f.backend.compile_count(), 1);
}

#[test]
fn failed_compile_is_not_cached() {
    let f = fixture(&[], PipelineOptions::default());
    let cs = shader(ShaderStage::Compute, &[0]);
    let pipeline = f.manager.create_compute_pipeline(&f.cache, Some(&cs)).unwrap().unwrap();
    let state = ComputePipelineState::default();

    f.backend.fail_next_compiles(1);
    assert!(matches!(
        pipeline.get_pipeline_handle(&state),
        Err(CreatePipelineError::OutOfMemory { .. })
    ));
    assert_eq!(pipeline.variant_count(), 0);

    // Next request compiles again.
    let handle = pipeline.get_pipeline_handle(&state).unwrap();
    assert_eq!(pipeline.get_pipeline_handle(&state).unwrap(), handle);
    assert_eq!(pipeline.variant_count(), 1);
    assert_eq!(f.backend.compile_count(), 1);
}

#[test]
fn rejected_compute_compile_is_reported_and_not_cached() {
    let f = fixture(&[], PipelineOptions::default());
    let cs = shader(ShaderStage::Compute, &[0]);
    let pipeline = f.manager.create_compute_pipeline(&f.cache, Some(&cs)).unwrap().unwrap();
    let state = ComputePipelineState::default();

    f.backend.reject_next_compiles(1);
    match pipeline.get_pipeline_handle(&state) {
        Err(CreatePipelineError::Compile { pipeline: name, message }) => {
            assert_eq!(name, cs.debug_name());
            assert_eq!(message, "ERROR_INVALID_SHADER_NV");
        }
        other => panic!("Unexpected result {:?}", other),
    }
    assert_eq!(pipeline.variant_count(), 0);
    assert_eq!(f.backend.live_pipelines.load(Ordering::SeqCst), 0);

    pipeline.get_pipeline_handle(&state).unwrap();
    assert_eq!(pipeline.variant_count(), 1);
}

#[test]
fn rejected_graphics_compile_is_reported_and_not_cached() {
    let f = fixture(&[], PipelineOptions::default());
    let vs = shader(ShaderStage::Vertex, &[0]);
    let fs = shader(ShaderStage::Fragment, &[1]);
    let pipeline = f.graphics(&vs, None, None, Some(&fs));
    let state = valid_state();

    f.backend.reject_next_compiles(1);
    assert!(matches!(
        pipeline.get_pipeline_handle(&state),
        Err(CreatePipelineError::Compile { .. })
    ));
    assert_eq!(pipeline.variant_count(), 0);

    let handle = pipeline.get_pipeline_handle(&state).unwrap();
    assert_eq!(pipeline.get_pipeline_handle(&state).unwrap(), handle);
    assert_eq!(f.backend.compile_count(), 1);
}

// ============================================================================
// Derivatives
// ============================================================================

#[test]
fn later_variants_derive_from_first() {
    let f = fixture(&[DeviceCapability::PipelineDerivatives], PipelineOptions::default());
    let cs = shader(ShaderStage::Compute, &[0, 1, 2]);
    let pipeline = f.manager.create_compute_pipeline(&f.cache, Some(&cs)).unwrap().unwrap();

    let mut state = ComputePipelineState::default();
    let first = pipeline.get_pipeline_handle(&state).unwrap();
    let record = f.backend.last_compile();
    assert_eq!(record.flags, PipelineCreateFlags::ALLOW_DERIVATIVES);
    assert_eq!(record.base, None);

    for binding in 0..3 {
        state.bindings.bind(binding);
        pipeline.get_pipeline_handle(&state).unwrap();

        let record = f.backend.last_compile();
        assert_eq!(record.flags, PipelineCreateFlags::DERIVATIVE);
        assert_eq!(record.base, Some(first));
    }
}

#[test]
fn no_derivatives_without_capability() {
    let f = fixture(&[], PipelineOptions::default());
    let cs = shader(ShaderStage::Compute, &[0]);
    let pipeline = f.manager.create_compute_pipeline(&f.cache, Some(&cs)).unwrap().unwrap();

    let mut state = ComputePipelineState::default();
    pipeline.get_pipeline_handle(&state).unwrap();
    state.bindings.bind(0);
    pipeline.get_pipeline_handle(&state).unwrap();

    let compiles = f.backend.compiles.lock();
    assert!(compiles
        .iter()
        .all(|record| record.base.is_none() && record.flags.is_empty()));
}

// ============================================================================
// Specialization
// ============================================================================

#[test]
fn specialization_mirrors_binding_state() {
    let f = fixture(&[], PipelineOptions::default());
    let cs = shader(ShaderStage::Compute, &[0, 1, 2]);
    let pipeline = f.manager.create_compute_pipeline(&f.cache, Some(&cs)).unwrap().unwrap();

    let mut state = ComputePipelineState::default();
    state.bindings.bind(0);
    state.bindings.bind(2);
    pipeline.get_pipeline_handle(&state).unwrap();

    let values = f.backend.last_compile().specialization;
    assert_eq!(values.len(), 128);
    assert_eq!(&values[..4], &[1, 0, 1, 0]);
    assert!(values[4..].iter().all(|&value| value == 0));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn missing_render_pass_is_rejected() {
    let f = fixture(&[], PipelineOptions::default());
    let vs = shader(ShaderStage::Vertex, &[]);
    let pipeline = f.graphics(&vs, None, None, None);

    let result = pipeline.get_pipeline_handle(&GraphicsPipelineState::default());
    assert!(matches!(
        result,
        Err(CreatePipelineError::InvalidState {
            source: InvalidPipelineState::MissingRenderPass
        })
    ));
    assert_eq!(pipeline.variant_count(), 0);
    assert_eq!(f.backend.compile_count(), 0);
}

#[test]
fn vertex_inputs_must_be_provided() {
    let f = fixture(&[], PipelineOptions::default());
    let vs = shader_with_interface(
        ShaderStage::Vertex,
        &[],
        InterfaceSlots {
            inputs: 0b101,
            outputs: 0,
        },
        0,
    );
    let pipeline = f.graphics(&vs, None, None, None);

    let attribute = |location| VertexInputAttribute {
        location,
        binding: 0,
        format: VertexFormat::RGBA32Sfloat,
        offset: 16 * location,
    };

    let mut state = valid_state();
    state.input_layout.attributes.push(attribute(0));
    assert!(matches!(
        pipeline.get_pipeline_handle(&state),
        Err(CreatePipelineError::InvalidState {
            source: InvalidPipelineState::VertexInputMismatch {
                provided: 0b1,
                required: 0b101
            }
        })
    ));

    state.input_layout.attributes.push(attribute(2));
    state.input_layout.attributes.push(attribute(3));
    assert!(pipeline.get_pipeline_handle(&state).is_ok());
}

#[test]
fn patches_require_tessellation_shaders() {
    let f = fixture(&[], PipelineOptions::default());
    let vs = shader(ShaderStage::Vertex, &[]);
    let tcs = shader(ShaderStage::TessellationControl, &[]);
    let tes = shader(ShaderStage::TessellationEvaluation, &[]);

    let mut state = valid_state();
    state.input_assembly.topology = pipewright::PrimitiveTopology::PatchList;
    state.input_assembly.patch_vertex_count = 3;

    let plain = f.graphics(&vs, None, None, None);
    assert!(matches!(
        plain.get_pipeline_handle(&state),
        Err(CreatePipelineError::InvalidState {
            source: InvalidPipelineState::PatchesWithoutTessellation
        })
    ));

    let tessellated = f.graphics(&vs, Some(&tcs), Some(&tes), None);
    tessellated.get_pipeline_handle(&state).unwrap();
    assert_eq!(
        f.backend.last_compile().stages,
        [
            ShaderStage::Vertex,
            ShaderStage::TessellationControl,
            ShaderStage::TessellationEvaluation
        ]
    );
}

// ============================================================================
// Rasterization order
// ============================================================================

fn order_fixture(options: PipelineOptions) -> (Fixture, Arc<GraphicsPipeline<MockBackend>>) {
    let f = fixture(&[DeviceCapability::RasterizationOrder], options);
    let vs = shader(ShaderStage::Vertex, &[]);
    let fs = shader_with_interface(
        ShaderStage::Fragment,
        &[],
        InterfaceSlots {
            inputs: 0,
            outputs: 0b1,
        },
        0,
    );
    let pipeline = f.graphics(&vs, None, None, Some(&fs));
    (f, pipeline)
}

#[test]
fn depth_tested_opaque_draws_relax_order() {
    let (_f, pipeline) = order_fixture(PipelineOptions::default());

    let mut state = valid_state();
    assert_eq!(pipeline.rasterization_order(&state), RasterizationOrder::Strict);

    state.depth_stencil.depth_test = Some(DepthTest {
        compare: CompareOp::Less,
        write: true,
    });
    assert_eq!(pipeline.rasterization_order(&state), RasterizationOrder::Relaxed);

    state.depth_stencil.depth_test = Some(DepthTest {
        compare: CompareOp::LessOrEqual,
        write: true,
    });
    assert_eq!(pipeline.rasterization_order(&state), RasterizationOrder::Strict);

    state.depth_stencil.depth_test = Some(DepthTest {
        compare: CompareOp::Greater,
        write: false,
    });
    assert_eq!(pipeline.rasterization_order(&state), RasterizationOrder::Strict);
}

#[test]
fn blending_on_written_output_keeps_strict_order() {
    let (_f, pipeline) = order_fixture(PipelineOptions {
        assume_no_zfight: true,
    });

    let mut state = valid_state();
    assert_eq!(pipeline.rasterization_order(&state), RasterizationOrder::Relaxed);

    // Attachment 1 is not written by the fragment shader.
    state.output_merger.attachments[1].blending = Some(alpha_blending());
    assert_eq!(pipeline.rasterization_order(&state), RasterizationOrder::Relaxed);

    state.output_merger.attachments[0].blending = Some(alpha_blending());
    assert_eq!(pipeline.rasterization_order(&state), RasterizationOrder::Strict);
}

#[test]
fn order_is_passed_only_when_supported() {
    let (f, pipeline) = order_fixture(PipelineOptions {
        assume_no_zfight: true,
    });
    pipeline.get_pipeline_handle(&valid_state()).unwrap();
    assert_eq!(
        f.backend.last_compile().rasterization_order,
        Some(RasterizationOrder::Relaxed)
    );

    let f = fixture(
        &[],
        PipelineOptions {
            assume_no_zfight: true,
        },
    );
    let vs = shader(ShaderStage::Vertex, &[]);
    let pipeline = f.graphics(&vs, None, None, None);
    pipeline.get_pipeline_handle(&valid_state()).unwrap();
    assert_eq!(f.backend.last_compile().rasterization_order, None);
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn pipeline_dispatches_by_kind() {
    let f = fixture(&[], PipelineOptions::default());
    let cs = shader(ShaderStage::Compute, &[0]);
    let vs = shader(ShaderStage::Vertex, &[0]);

    let compute: Pipeline<_> = f
        .manager
        .create_compute_pipeline(&f.cache, Some(&cs))
        .unwrap()
        .unwrap()
        .into();
    let graphics: Pipeline<_> = f.graphics(&vs, None, None, None).into();

    let compute_state = ComputePipelineState::default();
    let graphics_state = valid_state();

    assert!(compute.handle(PipelineState::Compute(&compute_state)).is_ok());
    assert!(graphics.handle(PipelineState::Graphics(&graphics_state)).is_ok());

    assert!(matches!(
        compute.handle(PipelineState::Graphics(&graphics_state)),
        Err(CreatePipelineError::StateKindMismatch { .. })
    ));
    assert!(matches!(
        graphics.handle(PipelineState::Compute(&compute_state)),
        Err(CreatePipelineError::StateKindMismatch { .. })
    ));
    assert_eq!(compute.layout().binding_count(), 1);
}

#[test]
fn dropping_pipeline_releases_device_objects() {
    let f = fixture(&[], PipelineOptions::default());
    let vs = shader(ShaderStage::Vertex, &[0]);
    let fs = shader(ShaderStage::Fragment, &[1]);

    let pipeline = f.graphics(&vs, None, None, Some(&fs));
    let mut state = valid_state();
    pipeline.get_pipeline_handle(&state).unwrap();
    state.bindings.bind(1);
    pipeline.get_pipeline_handle(&state).unwrap();

    assert_eq!(f.backend.live_pipelines.load(Ordering::SeqCst), 2);
    assert_eq!(f.backend.live_modules.load(Ordering::SeqCst), 2);

    drop(pipeline);
    f.manager.clear();

    assert_eq!(f.backend.live_pipelines.load(Ordering::SeqCst), 0);
    assert_eq!(f.backend.live_modules.load(Ordering::SeqCst), 0);
    assert_eq!(f.backend.live_layouts.load(Ordering::SeqCst), 0);
}
