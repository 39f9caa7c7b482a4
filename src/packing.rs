//! Color packing utilities.
//!
//! The consolidated vertex buffer stores per-vertex color as four unorm8
//! bytes carried in the bit pattern of a single f32. The value is never
//! used arithmetically on the CPU side, so the transform round-trips
//! byte-for-byte through `f32::to_bits`/`from_bits`.

/// Convert f32 to unsigned normalized 8-bit integer (unorm8)
///
/// Maps f32 range [0.0, 1.0] to u8 range [0, 255].
#[inline]
pub fn f32_to_unorm8(value: f32) -> u8 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * 255.0) as u8
}

/// Pack an RGBA color into the bit pattern of one f32 (r in the low byte).
#[inline]
pub fn pack_color_bits(r: f32, g: f32, b: f32, a: f32) -> f32 {
    let bytes = [
        f32_to_unorm8(r),
        f32_to_unorm8(g),
        f32_to_unorm8(b),
        f32_to_unorm8(a),
    ];
    f32::from_bits(u32::from_le_bytes(bytes))
}

/// Recover the four unorm8 color bytes from a packed float.
#[inline]
pub fn unpack_color_bits(packed: f32) -> [u8; 4] {
    packed.to_bits().to_le_bytes()
}
