use crate::audio_device::RawBlock;

/// Convert a driver block to 16-bit PCM.
///
/// 64-bit floats scale by `i16::MAX`, 32-bit floats by 32767, both truncated
/// toward zero. Integer samples pass through. Float-to-int `as` casts
/// saturate, so anything at or beyond full scale pins to the i16 limits and
/// NaN becomes 0.
pub fn to_pcm16(block: RawBlock) -> Vec<i16> {
    match block {
        RawBlock::F64(samples) => samples
            .into_iter()
            .map(|s| (s * f64::from(i16::MAX)) as i16)
            .collect(),
        RawBlock::F32(samples) => samples.into_iter().map(|s| (s * 32767.0) as i16).collect(),
        RawBlock::I16(samples) => samples,
    }
}
