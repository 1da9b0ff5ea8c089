use ordered_float::OrderedFloat;

/// Topology of primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveTopology {
    /// Each vertex forms one point.
    PointList,

    /// Each separate pair of vertices forms one line.
    ///
    /// # Example
    ///
    /// Vertices `a`, `b`, `c`, `d` form lines `a, b` and `c, d`.
    LineList,

    /// Each pair of adjacent vertices forms one line.
    ///
    /// # Example
    ///
    /// Vertices `a`, `b`, `c`, `d` form lines `a, b`, `b, c` and `c, d`.
    LineStrip,

    /// Each separate triplet of vertices forms one triangle.
    TriangleList,

    /// Each triplet of adjacent vertices forms one triangle.
    ///
    /// # Example
    ///
    /// Vertices `a`, `b`, `c`, `d` form triangles `a, b, c` and `b, c, d`.
    TriangleStrip,

    /// First vertex is shared by all triangles.
    TriangleFan,

    LineListWithAdjacency,
    LineStripWithAdjacency,
    TriangleListWithAdjacency,
    TriangleStripWithAdjacency,

    /// Vertices are grouped into tessellation patches.
    /// Patch size is defined by `InputAssemblyState::patch_vertex_count`.
    PatchList,
}

impl Default for PrimitiveTopology {
    fn default() -> Self {
        PrimitiveTopology::TriangleList
    }
}

/// Controls vertex input iteration frequency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexInputRate {
    /// Iterate value once per vertex.
    Vertex,

    /// Iterate value once per instance.
    Instance,
}

impl Default for VertexInputRate {
    fn default() -> Self {
        VertexInputRate::Vertex
    }
}

/// Format of vertex attribute data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexFormat {
    R8Unorm,
    RG8Unorm,
    RGBA8Unorm,
    RGBA8Snorm,
    RGBA8Uint,
    BGRA8Unorm,
    R16Sfloat,
    RG16Sfloat,
    RGBA16Sfloat,
    RG16Snorm,
    RGBA16Snorm,
    RG16Unorm,
    RGBA16Unorm,
    RGBA16Uint,
    R32Sfloat,
    RG32Sfloat,
    RGB32Sfloat,
    RGBA32Sfloat,
    R32Uint,
    RG32Uint,
    RGB32Uint,
    RGBA32Uint,
    R32Sint,
    RG32Sint,
    RGB32Sint,
    RGBA32Sint,
    A2B10G10R10Unorm,
}

/// Polygon front face definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum FrontFace {
    /// Polygon with vertices in clockwise order is front facing.
    Clockwise,

    /// Polygon with vertices in counter-clockwise order is front facing.
    CounterClockwise,
}

impl Default for FrontFace {
    fn default() -> Self {
        FrontFace::Clockwise
    }
}

/// Polygon culling mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum Culling {
    Front,
    Back,
    FrontAndBack,
}

/// Polygon rasterization mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum PolygonMode {
    /// Fragments cover whole polygon.
    Fill,

    /// Fragments cover polygon edges.
    Line,

    /// Fragments cover polygon vertices.
    Point,
}

impl Default for PolygonMode {
    fn default() -> Self {
        PolygonMode::Fill
    }
}

/// Comparison between fragment value and stored value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Operation performed on value in stencil buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

/// Logical operation applied between fragment output `s`
/// and value stored in attachment `d`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicOp {
    /// `0`
    Clear,
    /// `s & d`
    And,
    /// `s & !d`
    AndReverse,
    /// `s`
    Copy,
    /// `!s & d`
    AndInverted,
    /// `d`
    NoOp,
    /// `s ^ d`
    Xor,
    /// `s | d`
    Or,
    /// `!(s | d)`
    Nor,
    /// `!(s ^ d)`
    Equivalent,
    /// `!d`
    Invert,
    /// `s | !d`
    OrReverse,
    /// `!s`
    CopyInverted,
    /// `!s | d`
    OrInverted,
    /// `!(s & d)`
    Nand,
    /// `!0`
    Set,
}

/// Blend factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
    Src1Color,
    OneMinusSrc1Color,
    Src1Alpha,
    OneMinusSrc1Alpha,
}

/// Blending operation between weighted source `S * Sf`
/// and weighted destination `D * Df`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendOp {
    /// `S * Sf + D * Df`
    Add,
    /// `S * Sf - D * Df`
    Subtract,
    /// `D * Df - S * Sf`
    ReverseSubtract,
    /// `min(S, D)`
    Min,
    /// `max(S, D)`
    Max,
}

bitflags::bitflags! {
    /// Flags for each of color components.
    #[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
    pub struct ComponentMask: u8 {
        const R = 0b0001;
        const G = 0b0010;
        const B = 0b0100;
        const A = 0b1000;
        const RGB = 0b0111;
        const RGBA = 0b1111;
    }
}

/// Blending of color attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct Blending {
    pub color_src_factor: BlendFactor,
    pub color_dst_factor: BlendFactor,
    pub color_op: BlendOp,
    pub alpha_src_factor: BlendFactor,
    pub alpha_dst_factor: BlendFactor,
    pub alpha_op: BlendOp,
}

/// Number of samples per pixel.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum Samples {
    Samples1,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
    Samples32,
    Samples64,
}

impl Default for Samples {
    fn default() -> Self {
        Samples::Samples1
    }
}

/// Depth test and write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthTest {
    /// Comparison between fragment depth and stored depth.
    pub compare: CompareOp,

    /// Whether fragment depth is written.
    pub write: bool,
}

/// Depth bounds test range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthBounds {
    pub min: OrderedFloat<f32>,
    pub max: OrderedFloat<f32>,
}

/// Depth bias applied to polygon fragments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthBias {
    pub constant: OrderedFloat<f32>,
    pub clamp: OrderedFloat<f32>,
    pub slope: OrderedFloat<f32>,
}

/// Stencil operations for one polygon face.
/// Reference value is dynamic state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct StencilTest {
    pub compare: CompareOp,
    pub compare_mask: u32,
    pub write_mask: u32,

    /// Performed when stencil test fails.
    pub fail: StencilOp,

    /// Performed when both stencil and depth tests pass.
    pub pass: StencilOp,

    /// Performed when stencil test passes and depth test fails.
    pub depth_fail: StencilOp,
}

impl Default for StencilTest {
    fn default() -> Self {
        StencilTest {
            compare: CompareOp::Always,
            compare_mask: !0,
            write_mask: !0,
            fail: StencilOp::Keep,
            pass: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct StencilTests {
    pub front: StencilTest,
    pub back: StencilTest,
}
