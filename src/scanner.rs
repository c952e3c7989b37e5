//! Signature scanning over the main module of the attached process.
//!
//! The module is read in independent 4 KiB windows. A match whose pattern or
//! trailing operand straddles a window edge is not seen.

use log::{debug, error, trace};

use crate::bytes::{read_i32, read_u32, read_u64};
use crate::memory::{ModuleInfo, ProcessMemoryReader};
use crate::pattern::Pattern;

pub const SCAN_WINDOW: usize = 4096;

/// How the operand following a signature turns into an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// 32-bit absolute address, zero-extended.
    Absolute32,
    /// 64-bit absolute address.
    Absolute64,
    /// Signed 32-bit displacement from the end of the operand (x86-64 `[rip+disp32]`).
    RipRelative32,
}

impl AddressingMode {
    /// Size of the operand in bytes.
    pub fn operand_size(self) -> usize {
        match self {
            Self::Absolute64 => 8,
            Self::Absolute32 | Self::RipRelative32 => 4,
        }
    }

    /// Resolve the operand at `data[offset..]`, which lives at `operand_address`
    /// in the target process.
    pub fn resolve(self, data: &[u8], offset: usize, operand_address: usize) -> usize {
        match self {
            Self::Absolute32 => read_u32(data, offset) as usize,
            Self::Absolute64 => read_u64(data, offset) as usize,
            Self::RipRelative32 => {
                let displacement = read_i32(data, offset) as isize;
                (operand_address + 4).wrapping_add_signed(displacement)
            }
        }
    }
}

pub struct SignatureScanner<'a> {
    reader: &'a dyn ProcessMemoryReader,
    module: ModuleInfo,
}

impl<'a> SignatureScanner<'a> {
    pub fn new(reader: &'a dyn ProcessMemoryReader, module: ModuleInfo) -> Self {
        Self { reader, module }
    }

    /// Find every occurrence of `signature` in the module and resolve the operand
    /// found `trailing_offset` bytes after each match.
    pub fn scan(&self, signature: &str, trailing_offset: usize, mode: AddressingMode) -> Vec<usize> {
        let Some(pattern) = Pattern::parse(signature) else {
            error!("Refusing to scan with malformed signature {}", signature);
            return Vec::new();
        };
        if pattern.is_empty() {
            return Vec::new();
        }

        let operand_start = pattern.len() + trailing_offset;
        let reach = operand_start + mode.operand_size();
        let end = self.module.end();
        let mut results = Vec::new();
        let mut windows_read = 0usize;
        let mut window_start = self.module.base;

        while window_start < end {
            let size = SCAN_WINDOW.min(end - window_start);
            match self.reader.read_memory(window_start, size) {
                Ok(data) => {
                    windows_read += 1;
                    for pos in pattern.find_all(&data) {
                        if pos + reach > data.len() {
                            continue;
                        }
                        let operand = pos + operand_start;
                        let address = mode.resolve(&data, operand, window_start + operand);
                        trace!(
                            "Signature hit at 0x{:X} resolved to 0x{:X}",
                            window_start + pos,
                            address
                        );
                        results.push(address);
                    }
                }
                Err(e) => trace!("Skipping unreadable window 0x{:X}: {}", window_start, e),
            }
            window_start += SCAN_WINDOW;
        }

        debug!(
            "Scanned 0x{:X}..0x{:X} ({} windows) for {}: {} matches",
            self.module.base,
            end,
            windows_read,
            signature,
            results.len()
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMemoryReader;

    const BASE: usize = 0x1_4000_0000;

    fn module_with(size: usize, writes: &[(usize, &[u8])]) -> MockMemoryReader {
        let mut image = vec![0xCCu8; size];
        for (offset, bytes) in writes {
            image[*offset..*offset + bytes.len()].copy_from_slice(bytes);
        }
        let mut reader = MockMemoryReader::new();
        reader.map_module(BASE, image);
        reader
    }

    fn scanner(reader: &MockMemoryReader) -> SignatureScanner<'_> {
        SignatureScanner::new(reader, reader.module.unwrap())
    }

    #[test]
    fn test_rip_relative_negative_displacement() {
        let data = (-0x10i32).to_le_bytes();
        let resolved = AddressingMode::RipRelative32.resolve(&data, 0, 0x1_4000_1000);
        assert_eq!(resolved, 0x1_4000_1004 - 0x10);
    }

    #[test]
    fn test_rip_relative_positive_displacement() {
        let data = 0x0123_4560i32.to_le_bytes();
        let resolved = AddressingMode::RipRelative32.resolve(&data, 0, 0x1_4000_1000);
        assert_eq!(resolved, 0x1_4000_1004 + 0x0123_4560);
    }

    #[test]
    fn test_absolute_modes() {
        let data = 0x8765_4321_0012_3456u64.to_le_bytes();
        assert_eq!(AddressingMode::Absolute32.resolve(&data, 0, 0), 0x0012_3456);
        assert_eq!(
            AddressingMode::Absolute64.resolve(&data, 0, 0),
            0x8765_4321_0012_3456u64 as usize
        );
        // High-bit 32-bit addresses stay positive.
        let high = 0xF000_0000u32.to_le_bytes();
        assert_eq!(AddressingMode::Absolute32.resolve(&high, 0, 0), 0xF000_0000);
    }

    #[test]
    fn test_scan_resolves_absolute_operand() {
        let mut site = vec![0xDE, 0xAD, 0xBE, 0xEF];
        site.extend_from_slice(&0x0040_1000u32.to_le_bytes());
        let reader = module_with(0x3000, &[(0x100, site.as_slice())]);

        let hits = scanner(&reader).scan("deadbeef", 0, AddressingMode::Absolute32);
        assert_eq!(hits, vec![0x0040_1000]);
    }

    #[test]
    fn test_scan_rip_relative_with_trailing_offset() {
        // pattern (3) + 2 skipped bytes + disp32
        let mut site = vec![0x48, 0x8D, 0x0D, 0x90, 0x90];
        site.extend_from_slice(&0x200i32.to_le_bytes());
        let reader = module_with(0x3000, &[(0x1800, site.as_slice())]);

        let hits = scanner(&reader).scan("488d0d", 2, AddressingMode::RipRelative32);
        let operand_address = BASE + 0x1800 + 3 + 2;
        assert_eq!(hits, vec![operand_address + 4 + 0x200]);
    }

    #[test]
    fn test_scan_collects_every_window() {
        let site: &[u8] = &[0xAB, 0xCD, 0x01, 0x00, 0x00, 0x00];
        let reader = module_with(0x3000, &[(0x10, site), (0x2010, site)]);

        let hits = scanner(&reader).scan("abcd", 0, AddressingMode::Absolute32);
        assert_eq!(hits, vec![1, 1]);
    }

    #[test]
    fn test_scan_misses_match_across_window_edge() {
        let site: &[u8] = &[0xAB, 0xCD, 0x01, 0x00, 0x00, 0x00];
        // Pattern fits, operand crosses into the next window.
        let reader = module_with(0x2000, &[(SCAN_WINDOW - 4, site)]);

        let hits = scanner(&reader).scan("abcd", 0, AddressingMode::Absolute32);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_scan_partial_last_window() {
        let site: &[u8] = &[0xAB, 0xCD, 0x07, 0x00, 0x00, 0x00];
        let reader = module_with(0x1800, &[(0x17F0, site)]);

        let hits = scanner(&reader).scan("abcd", 0, AddressingMode::Absolute32);
        assert_eq!(hits, vec![7]);
    }

    #[test]
    fn test_scan_skips_unreadable_windows() {
        let site: &[u8] = &[0xAB, 0xCD, 0x02, 0x00, 0x00, 0x00];
        let mut reader = MockMemoryReader::new();
        // Module claims 0x2000 bytes but only the second page is mapped.
        let mut page = vec![0u8; SCAN_WINDOW];
        page[0x20..0x26].copy_from_slice(site);
        reader.map(BASE + SCAN_WINDOW, page);
        reader.module = Some(ModuleInfo {
            base: BASE,
            size: 2 * SCAN_WINDOW,
        });

        let hits = scanner(&reader).scan("abcd", 0, AddressingMode::Absolute32);
        assert_eq!(hits, vec![2]);
    }

    #[test]
    fn test_scan_malformed_signature_is_empty() {
        let reader = module_with(0x1000, &[]);
        assert!(scanner(&reader)
            .scan("abc", 0, AddressingMode::Absolute32)
            .is_empty());
    }
}
