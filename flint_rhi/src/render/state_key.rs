//! Packed state keys for fixed-function state

use static_assertions::const_assert;
use crate::render::blend_state::{BlendStateDesc, ColorWriteMask};
use crate::render::depth_stencil_state::{DepthStencilStateDesc, StencilFaceDesc};
use crate::render::rasterizer_state::RasterizerStateDesc;

// ============================================================================
// State enums
// ============================================================================

macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            /// Every value, in discriminant order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Number of values
            pub const COUNT: usize = Self::ALL.len();

            /// Value for a packed discriminant, `None` if out of range
            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }
        }
    };
}

state_enum! {
    /// Blend factor applied to the source or destination color
    pub enum BlendSource {
        Zero = 0,
        One = 1,
        SrcColor = 2,
        InvSrcColor = 3,
        SrcAlpha = 4,
        InvSrcAlpha = 5,
        DestAlpha = 6,
        InvDestAlpha = 7,
        DestColor = 8,
        InvDestColor = 9,
        SrcAlphaSat = 10,
        BlendFactor = 11,
        InvBlendFactor = 12,
    }
}

state_enum! {
    /// Blend equation
    pub enum BlendOperation {
        Add = 0,
        Sub = 1,
        Min = 2,
        Max = 3,
        /// `dst - src`
        RevSub = 4,
    }
}

state_enum! {
    /// Face culling
    pub enum CullMode {
        None = 0,
        Front = 1,
        Back = 2,
        FrontAndBack = 3,
    }
}

state_enum! {
    /// Polygon fill
    pub enum FillMode {
        Solid = 0,
        Wireframe = 1,
    }
}

state_enum! {
    /// Depth/stencil/sampler comparison
    pub enum ComparisonFunction {
        Never = 0,
        Always = 1,
        Less = 2,
        Greater = 3,
        LEqual = 4,
        GEqual = 5,
        NotEqual = 6,
        Equal = 7,
    }
}

state_enum! {
    /// Stencil buffer update
    pub enum StencilOperation {
        Keep = 0,
        Zero = 1,
        Replace = 2,
        Inc = 3,
        IncWrap = 4,
        Dec = 5,
        DecWrap = 6,
        Invert = 7,
    }
}

// ============================================================================
// Float quantization
// ============================================================================

/// Quantize a float to one byte for key packing
///
/// The value is clamped to `[-1, 1]` and mapped linearly onto `[0, 255]`
/// (`round((x + 1) * 127.5)`). NaN maps to the bucket of `0.0`. Values in the
/// same bucket produce the same key, so states that differ only within a
/// bucket are treated as equal.
pub fn quantize_unit_float(value: f32) -> u8 {
    let value = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
    ((value + 1.0) * 127.5).round() as u8
}

/// Representative value of a quantization bucket
pub fn dequantize_unit_float(value: u8) -> f32 {
    value as f32 / 127.5 - 1.0
}

/// Bit pattern of a float with `-0.0` folded onto `0.0` and every NaN onto one pattern
fn canonical_f32_bits(value: f32) -> u32 {
    if value.is_nan() {
        f32::NAN.to_bits()
    } else if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

// ============================================================================
// Blend state key
// ============================================================================

/// Packed blend state
//
// Encoding
// bits  0- 3 -> color write mask (R, G, B, A)
// bit      4 -> blend enable
// bit      5 -> separate alpha blend
// bit      6 -> alpha to coverage
// bit      7 -> padding (always 0)
// bits  8-11 -> color source     bits 12-15 -> color destination    bits 16-19 -> color operation
// bits 20-23 -> alpha source     bits 24-27 -> alpha destination    bits 28-31 -> alpha operation
// bits 32-63 -> sample mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlendStateKey(u64);

impl BlendStateKey {
    const BOOL_MASK:              u64 = 0x1;
    const WRITE_MASK_MASK:        u64 = 0xF;
    const WRITE_MASK_SHIFT:       u64 = 0;
    const ENABLE_BLEND_SHIFT:     u64 = 4;
    const SEPARATE_ALPHA_SHIFT:   u64 = 5;
    const ALPHA_TO_COVERAGE_SHIFT: u64 = 6;

    const SOURCE_MASK:            u64 = 0xF;
    const OPERATION_MASK:         u64 = 0xF;
    const COLOR_SOURCE_SHIFT:     u64 = 8;
    const COLOR_DEST_SHIFT:       u64 = 12;
    const COLOR_OPERATION_SHIFT:  u64 = 16;
    const ALPHA_SOURCE_SHIFT:     u64 = 20;
    const ALPHA_DEST_SHIFT:       u64 = 24;
    const ALPHA_OPERATION_SHIFT:  u64 = 28;

    const SAMPLE_MASK_MASK:       u64 = 0xFFFF_FFFF;
    const SAMPLE_MASK_SHIFT:      u64 = 32;

    /// Bits owned by the sample mask
    pub const SAMPLE_MASK_BITS: u64 = Self::SAMPLE_MASK_MASK << Self::SAMPLE_MASK_SHIFT;

    /// Pack a blend description
    pub fn from_desc(desc: &BlendStateDesc) -> Self {
        Self(
            (desc.write_mask.bits()          as u64 & Self::WRITE_MASK_MASK ) << Self::WRITE_MASK_SHIFT        |
            (desc.enable_blend               as u64 & Self::BOOL_MASK       ) << Self::ENABLE_BLEND_SHIFT      |
            (desc.use_separate_alpha         as u64 & Self::BOOL_MASK       ) << Self::SEPARATE_ALPHA_SHIFT    |
            (desc.enable_alpha_to_coverage   as u64 & Self::BOOL_MASK       ) << Self::ALPHA_TO_COVERAGE_SHIFT |
            (desc.source                     as u64 & Self::SOURCE_MASK     ) << Self::COLOR_SOURCE_SHIFT      |
            (desc.dest                       as u64 & Self::SOURCE_MASK     ) << Self::COLOR_DEST_SHIFT        |
            (desc.operation                  as u64 & Self::OPERATION_MASK  ) << Self::COLOR_OPERATION_SHIFT   |
            (desc.source_alpha               as u64 & Self::SOURCE_MASK     ) << Self::ALPHA_SOURCE_SHIFT      |
            (desc.dest_alpha                 as u64 & Self::SOURCE_MASK     ) << Self::ALPHA_DEST_SHIFT        |
            (desc.operation_alpha            as u64 & Self::OPERATION_MASK  ) << Self::ALPHA_OPERATION_SHIFT   |
            (desc.sample_mask                as u64 & Self::SAMPLE_MASK_MASK) << Self::SAMPLE_MASK_SHIFT
        )
    }

    /// Unpack into a description
    pub fn to_desc(&self) -> Option<BlendStateDesc> {
        Some(BlendStateDesc {
            write_mask: ColorWriteMask::from_bits_truncate(self.field(Self::WRITE_MASK_SHIFT, Self::WRITE_MASK_MASK) as u8),
            enable_blend: self.field(Self::ENABLE_BLEND_SHIFT, Self::BOOL_MASK) != 0,
            use_separate_alpha: self.field(Self::SEPARATE_ALPHA_SHIFT, Self::BOOL_MASK) != 0,
            enable_alpha_to_coverage: self.field(Self::ALPHA_TO_COVERAGE_SHIFT, Self::BOOL_MASK) != 0,
            source: BlendSource::from_index(self.field(Self::COLOR_SOURCE_SHIFT, Self::SOURCE_MASK) as usize)?,
            dest: BlendSource::from_index(self.field(Self::COLOR_DEST_SHIFT, Self::SOURCE_MASK) as usize)?,
            operation: BlendOperation::from_index(self.field(Self::COLOR_OPERATION_SHIFT, Self::OPERATION_MASK) as usize)?,
            source_alpha: BlendSource::from_index(self.field(Self::ALPHA_SOURCE_SHIFT, Self::SOURCE_MASK) as usize)?,
            dest_alpha: BlendSource::from_index(self.field(Self::ALPHA_DEST_SHIFT, Self::SOURCE_MASK) as usize)?,
            operation_alpha: BlendOperation::from_index(self.field(Self::ALPHA_OPERATION_SHIFT, Self::OPERATION_MASK) as usize)?,
            sample_mask: self.field(Self::SAMPLE_MASK_SHIFT, Self::SAMPLE_MASK_MASK) as u32,
        })
    }

    /// Sample mask stored in the key
    pub fn sample_mask(&self) -> u32 {
        self.field(Self::SAMPLE_MASK_SHIFT, Self::SAMPLE_MASK_MASK) as u32
    }

    /// Raw packed value
    pub fn value(&self) -> u64 {
        self.0
    }

    fn field(&self, shift: u64, mask: u64) -> u64 {
        (self.0 >> shift) & mask
    }
}

const_assert!(BlendSource::COUNT - 1 <= BlendStateKey::SOURCE_MASK as usize);
const_assert!(BlendOperation::COUNT - 1 <= BlendStateKey::OPERATION_MASK as usize);
const_assert!(BlendStateKey::ALPHA_OPERATION_SHIFT + 4 <= BlendStateKey::SAMPLE_MASK_SHIFT);
const_assert!(std::mem::size_of::<BlendStateKey>() == std::mem::size_of::<u64>());

// ============================================================================
// Rasterizer state key
// ============================================================================

/// Packed rasterizer state
//
// Encoding
// bit      0 -> counter-clockwise front face
// bits  1- 2 -> cull mode
// bits  3- 4 -> fill mode
// bit      5 -> depth bias outside the zero bucket
// bit      6 -> slope scale outside the zero bucket
// bit      7 -> depth bias clamp outside the zero bucket
// bits  8-15 -> quantized depth bias
// bits 16-23 -> quantized slope scale
// bits 24-31 -> quantized depth bias clamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RasterizerStateKey(u32);

impl RasterizerStateKey {
    const BOOL_MASK:              u32 = 0x1;
    const CCW_SHIFT:              u32 = 0;
    const CULL_MODE_MASK:         u32 = 0x3;
    const CULL_MODE_SHIFT:        u32 = 1;
    const FILL_MODE_MASK:         u32 = 0x3;
    const FILL_MODE_SHIFT:        u32 = 3;
    const USE_DEPTH_BIAS_SHIFT:   u32 = 5;
    const USE_SLOPE_SCALE_SHIFT:  u32 = 6;
    const USE_BIAS_CLAMP_SHIFT:   u32 = 7;

    const BYTE_MASK:              u32 = 0xFF;
    const DEPTH_BIAS_SHIFT:       u32 = 8;
    const SLOPE_SCALE_SHIFT:      u32 = 16;
    const BIAS_CLAMP_SHIFT:       u32 = 24;
    // Bucket that 0.0 quantizes to
    const ZERO_BUCKET:            u32 = 128;

    /// Pack a rasterizer description
    pub fn from_desc(desc: &RasterizerStateDesc) -> Self {
        let depth_bias = quantize_unit_float(desc.depth_bias) as u32;
        let slope_scale = quantize_unit_float(desc.slope_scale) as u32;
        let bias_clamp = quantize_unit_float(desc.depth_bias_clamp) as u32;
        let in_use = |bucket: u32| (bucket != Self::ZERO_BUCKET) as u32;

        Self(
            (desc.use_triangle_ccw as u32 & Self::BOOL_MASK     ) << Self::CCW_SHIFT             |
            (desc.cull_mode        as u32 & Self::CULL_MODE_MASK) << Self::CULL_MODE_SHIFT       |
            (desc.fill_mode        as u32 & Self::FILL_MODE_MASK) << Self::FILL_MODE_SHIFT       |
            in_use(depth_bias)                                   << Self::USE_DEPTH_BIAS_SHIFT  |
            in_use(slope_scale)                                  << Self::USE_SLOPE_SCALE_SHIFT |
            in_use(bias_clamp)                                   << Self::USE_BIAS_CLAMP_SHIFT  |
            depth_bias  << Self::DEPTH_BIAS_SHIFT  |
            slope_scale << Self::SLOPE_SCALE_SHIFT |
            bias_clamp  << Self::BIAS_CLAMP_SHIFT
        )
    }

    /// Unpack into a description (float fields come back as bucket representatives)
    pub fn to_desc(&self) -> Option<RasterizerStateDesc> {
        let unpack_float = |use_shift: u32, value_shift: u32| {
            if self.field(use_shift, Self::BOOL_MASK) != 0 {
                dequantize_unit_float(self.field(value_shift, Self::BYTE_MASK) as u8)
            } else {
                0.0
            }
        };

        Some(RasterizerStateDesc {
            cull_mode: CullMode::from_index(self.field(Self::CULL_MODE_SHIFT, Self::CULL_MODE_MASK) as usize)?,
            fill_mode: FillMode::from_index(self.field(Self::FILL_MODE_SHIFT, Self::FILL_MODE_MASK) as usize)?,
            depth_bias: unpack_float(Self::USE_DEPTH_BIAS_SHIFT, Self::DEPTH_BIAS_SHIFT),
            slope_scale: unpack_float(Self::USE_SLOPE_SCALE_SHIFT, Self::SLOPE_SCALE_SHIFT),
            depth_bias_clamp: unpack_float(Self::USE_BIAS_CLAMP_SHIFT, Self::BIAS_CLAMP_SHIFT),
            use_triangle_ccw: self.field(Self::CCW_SHIFT, Self::BOOL_MASK) != 0,
        })
    }

    /// Raw packed value
    pub fn value(&self) -> u32 {
        self.0
    }

    fn field(&self, shift: u32, mask: u32) -> u32 {
        (self.0 >> shift) & mask
    }
}

const_assert!(CullMode::COUNT - 1 <= RasterizerStateKey::CULL_MODE_MASK as usize);
const_assert!(FillMode::COUNT - 1 <= RasterizerStateKey::FILL_MODE_MASK as usize);
const_assert!(RasterizerStateKey::USE_BIAS_CLAMP_SHIFT < RasterizerStateKey::DEPTH_BIAS_SHIFT);
const_assert!(std::mem::size_of::<RasterizerStateKey>() == std::mem::size_of::<u32>());

// ============================================================================
// Depth-stencil state key
// ============================================================================

/// Packed depth-stencil state
///
/// 128 bits wide: both depth bounds keep their exact `f32` bit pattern.
//
// Encoding
// bit      0 -> depth test          bit 1 -> stencil test
// bit      2 -> depth write         bit 3 -> depth bounds test
// bits  4- 6 -> depth comparison function
// bits  7-18 -> front face (func 3, pass 3, fail 3, depth fail 3)
// bits 19-30 -> back face  (func 3, pass 3, fail 3, depth fail 3)
// bit     31 -> padding (always 0)
// bits 32-39 -> stencil reference
// bits 40-47 -> stencil read mask
// bits 48-55 -> stencil write mask
// bits 56-63 -> padding (always 0)
// bits 64-95 -> depth bounds min (f32 bits)
// bits 96-127 -> depth bounds max (f32 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepthStencilStateKey(u128);

impl DepthStencilStateKey {
    const BOOL_MASK:               u128 = 0x1;
    const DEPTH_TEST_SHIFT:        u128 = 0;
    const STENCIL_TEST_SHIFT:      u128 = 1;
    const DEPTH_WRITE_SHIFT:       u128 = 2;
    const DEPTH_BOUNDS_TEST_SHIFT: u128 = 3;

    const COMPARISON_MASK:         u128 = 0x7;
    const DEPTH_FUNC_SHIFT:        u128 = 4;

    const STENCIL_OP_MASK:         u128 = 0x7;
    const FACE_MASK:               u128 = 0xFFF;
    const FACE_FUNC_SHIFT:         u128 = 0;
    const FACE_PASS_SHIFT:         u128 = 3;
    const FACE_FAIL_SHIFT:         u128 = 6;
    const FACE_DEPTH_FAIL_SHIFT:   u128 = 9;
    const FRONT_FACE_SHIFT:        u128 = 7;
    const BACK_FACE_SHIFT:         u128 = 19;

    const BYTE_MASK:               u128 = 0xFF;
    const STENCIL_REF_SHIFT:       u128 = 32;
    const READ_MASK_SHIFT:         u128 = 40;
    const WRITE_MASK_SHIFT:        u128 = 48;

    const FLOAT_MASK:              u128 = 0xFFFF_FFFF;
    const BOUNDS_MIN_SHIFT:        u128 = 64;
    const BOUNDS_MAX_SHIFT:        u128 = 96;

    /// Pack a depth-stencil description
    pub fn from_desc(desc: &DepthStencilStateDesc) -> Self {
        Self(
            (desc.enable_depth_test        as u128 & Self::BOOL_MASK      ) << Self::DEPTH_TEST_SHIFT        |
            (desc.enable_stencil_test      as u128 & Self::BOOL_MASK      ) << Self::STENCIL_TEST_SHIFT      |
            (desc.enable_depth_write       as u128 & Self::BOOL_MASK      ) << Self::DEPTH_WRITE_SHIFT       |
            (desc.enable_depth_bounds_test as u128 & Self::BOOL_MASK      ) << Self::DEPTH_BOUNDS_TEST_SHIFT |
            (desc.depth_comparison_func    as u128 & Self::COMPARISON_MASK) << Self::DEPTH_FUNC_SHIFT        |
            Self::pack_face(&desc.front)                                    << Self::FRONT_FACE_SHIFT        |
            Self::pack_face(&desc.back)                                     << Self::BACK_FACE_SHIFT         |
            (desc.stencil_ref_value        as u128 & Self::BYTE_MASK      ) << Self::STENCIL_REF_SHIFT       |
            (desc.stencil_read_mask        as u128 & Self::BYTE_MASK      ) << Self::READ_MASK_SHIFT         |
            (desc.stencil_write_mask       as u128 & Self::BYTE_MASK      ) << Self::WRITE_MASK_SHIFT        |
            (canonical_f32_bits(desc.depth_bounds_min) as u128) << Self::BOUNDS_MIN_SHIFT |
            (canonical_f32_bits(desc.depth_bounds_max) as u128) << Self::BOUNDS_MAX_SHIFT
        )
    }

    /// Unpack into a description
    pub fn to_desc(&self) -> Option<DepthStencilStateDesc> {
        Some(DepthStencilStateDesc {
            enable_depth_test: self.field(Self::DEPTH_TEST_SHIFT, Self::BOOL_MASK) != 0,
            enable_stencil_test: self.field(Self::STENCIL_TEST_SHIFT, Self::BOOL_MASK) != 0,
            enable_depth_write: self.field(Self::DEPTH_WRITE_SHIFT, Self::BOOL_MASK) != 0,
            enable_depth_bounds_test: self.field(Self::DEPTH_BOUNDS_TEST_SHIFT, Self::BOOL_MASK) != 0,
            depth_bounds_min: f32::from_bits(self.field(Self::BOUNDS_MIN_SHIFT, Self::FLOAT_MASK) as u32),
            depth_bounds_max: f32::from_bits(self.field(Self::BOUNDS_MAX_SHIFT, Self::FLOAT_MASK) as u32),
            depth_comparison_func: ComparisonFunction::from_index(self.field(Self::DEPTH_FUNC_SHIFT, Self::COMPARISON_MASK) as usize)?,
            stencil_ref_value: self.field(Self::STENCIL_REF_SHIFT, Self::BYTE_MASK) as u8,
            stencil_read_mask: self.field(Self::READ_MASK_SHIFT, Self::BYTE_MASK) as u8,
            stencil_write_mask: self.field(Self::WRITE_MASK_SHIFT, Self::BYTE_MASK) as u8,
            front: Self::unpack_face(self.field(Self::FRONT_FACE_SHIFT, Self::FACE_MASK))?,
            back: Self::unpack_face(self.field(Self::BACK_FACE_SHIFT, Self::FACE_MASK))?,
        })
    }

    /// Raw packed value
    pub fn value(&self) -> u128 {
        self.0
    }

    fn pack_face(face: &StencilFaceDesc) -> u128 {
        (face.comparison_function as u128 & Self::COMPARISON_MASK) << Self::FACE_FUNC_SHIFT       |
        (face.pass_operation      as u128 & Self::STENCIL_OP_MASK) << Self::FACE_PASS_SHIFT       |
        (face.fail_operation      as u128 & Self::STENCIL_OP_MASK) << Self::FACE_FAIL_SHIFT       |
        (face.z_fail_operation    as u128 & Self::STENCIL_OP_MASK) << Self::FACE_DEPTH_FAIL_SHIFT
    }

    fn unpack_face(raw: u128) -> Option<StencilFaceDesc> {
        let op = |shift: u128| StencilOperation::from_index(((raw >> shift) & Self::STENCIL_OP_MASK) as usize);
        Some(StencilFaceDesc {
            comparison_function: ComparisonFunction::from_index(((raw >> Self::FACE_FUNC_SHIFT) & Self::COMPARISON_MASK) as usize)?,
            pass_operation: op(Self::FACE_PASS_SHIFT)?,
            fail_operation: op(Self::FACE_FAIL_SHIFT)?,
            z_fail_operation: op(Self::FACE_DEPTH_FAIL_SHIFT)?,
        })
    }

    fn field(&self, shift: u128, mask: u128) -> u128 {
        (self.0 >> shift) & mask
    }
}

const_assert!(ComparisonFunction::COUNT - 1 <= DepthStencilStateKey::COMPARISON_MASK as usize);
const_assert!(StencilOperation::COUNT - 1 <= DepthStencilStateKey::STENCIL_OP_MASK as usize);
const_assert!(DepthStencilStateKey::FACE_DEPTH_FAIL_SHIFT + 3 <= 12);
const_assert!(DepthStencilStateKey::FRONT_FACE_SHIFT + 12 <= DepthStencilStateKey::BACK_FACE_SHIFT);
const_assert!(DepthStencilStateKey::BACK_FACE_SHIFT + 12 <= DepthStencilStateKey::STENCIL_REF_SHIFT);
const_assert!(std::mem::size_of::<DepthStencilStateKey>() == std::mem::size_of::<u128>());

#[cfg(test)]
#[path = "state_key_tests.rs"]
mod tests;
