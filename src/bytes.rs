//! Little-endian field readers over raw snapshots.
//!
//! Every reinterpretation of target memory goes through these. Out-of-range
//! fields read as zero (or an empty string), never panic.

fn field<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    data.get(offset..offset.checked_add(N)?)
        .and_then(|s| s.try_into().ok())
}

pub fn read_u8(data: &[u8], offset: usize) -> u8 {
    data.get(offset).copied().unwrap_or(0)
}

pub fn read_u16(data: &[u8], offset: usize) -> u16 {
    field(data, offset).map(u16::from_le_bytes).unwrap_or(0)
}

pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    field(data, offset).map(u32::from_le_bytes).unwrap_or(0)
}

pub fn read_i32(data: &[u8], offset: usize) -> i32 {
    field(data, offset).map(i32::from_le_bytes).unwrap_or(0)
}

pub fn read_i64(data: &[u8], offset: usize) -> i64 {
    field(data, offset).map(i64::from_le_bytes).unwrap_or(0)
}

pub fn read_u64(data: &[u8], offset: usize) -> u64 {
    field(data, offset).map(u64::from_le_bytes).unwrap_or(0)
}

pub fn read_f32(data: &[u8], offset: usize) -> f32 {
    field(data, offset).map(f32::from_le_bytes).unwrap_or(0.0)
}

/// Unsigned pointer of `width` bytes (4 or 8).
pub fn read_ptr(data: &[u8], offset: usize, width: usize) -> usize {
    if width == 8 {
        read_u64(data, offset) as usize
    } else {
        read_u32(data, offset) as usize
    }
}

/// Signed pointer-width value, for slots where "not strictly positive" means empty.
pub fn read_signed_ptr(data: &[u8], offset: usize, width: usize) -> i64 {
    if width == 8 {
        read_i64(data, offset)
    } else {
        i64::from(read_i32(data, offset))
    }
}

/// UTF-8 text in a fixed region of `max_len` bytes, ending at the first NUL.
pub fn read_cstring(data: &[u8], offset: usize, max_len: usize) -> String {
    if offset >= data.len() {
        return String::new();
    }
    let end = offset.saturating_add(max_len).min(data.len());
    let slice = &data[offset..end];
    let null_pos = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
    String::from_utf8_lossy(&slice[..null_pos]).into_owned()
}
