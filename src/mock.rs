//! In-memory stand-in for a live client process, used by the unit tests.

use std::cell::Cell;
use std::io;

use crate::memory::{ModuleInfo, ProcessMemoryReader};
use crate::offsets::OffsetTable;
use crate::scanner::AddressingMode;

/// Sparse memory image: every mapped segment is readable, everything else fails.
pub struct MockMemoryReader {
    pub segments: Vec<(usize, Vec<u8>)>,
    pub module: Option<ModuleInfo>,
    pub alive: bool,
    pub module_queries: Cell<usize>,
    pub reads: Cell<usize>,
}

impl MockMemoryReader {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            module: None,
            alive: true,
            module_queries: Cell::new(0),
            reads: Cell::new(0),
        }
    }

    /// Map `data` at `address`.
    pub fn map(&mut self, address: usize, data: Vec<u8>) {
        self.segments.push((address, data));
    }

    /// Map `data` as the main module image.
    pub fn map_module(&mut self, base: usize, data: Vec<u8>) {
        self.module = Some(ModuleInfo {
            base,
            size: data.len(),
        });
        self.map(base, data);
    }
}

impl ProcessMemoryReader for MockMemoryReader {
    fn attach(&mut self, _pid: u32) -> io::Result<()> {
        Ok(())
    }

    fn read_memory(&self, address: usize, size: usize) -> io::Result<Vec<u8>> {
        self.reads.set(self.reads.get() + 1);
        for (base, data) in &self.segments {
            if address >= *base && address + size <= base + data.len() {
                let offset = address - base;
                return Ok(data[offset..offset + size].to_vec());
            }
        }
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("unmapped read of {} bytes at {:#x}", size, address),
        ))
    }

    fn detach(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_attached(&self) -> bool {
        true
    }

    fn main_module(&self) -> io::Result<ModuleInfo> {
        self.module_queries.set(self.module_queries.get() + 1);
        self.module
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no module"))
    }

    fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Decode a hex signature into bytes, turning `??` into `fill`.
pub fn signature_bytes(signature: &str, fill: u8) -> Vec<u8> {
    signature
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).unwrap();
            if text == "??" {
                fill
            } else {
                u8::from_str_radix(text, 16).unwrap()
            }
        })
        .collect()
}

/// Builder for a raw combatant record.
pub struct RecordBuilder {
    pub data: Vec<u8>,
}

impl RecordBuilder {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
        }
    }

    pub fn bytes(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn u8(self, offset: usize, value: u8) -> Self {
        self.bytes(offset, &[value])
    }

    pub fn u16(self, offset: usize, value: u16) -> Self {
        self.bytes(offset, &value.to_le_bytes())
    }

    pub fn u32(self, offset: usize, value: u32) -> Self {
        self.bytes(offset, &value.to_le_bytes())
    }

    pub fn f32(self, offset: usize, value: f32) -> Self {
        self.bytes(offset, &value.to_le_bytes())
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// Where the two signatures sit inside a synthetic client module.
pub const COMBATANT_SITE: usize = 0x400;
pub const TARGET_SITE: usize = 0x1400;
pub const MODULE_SIZE: usize = 0x3000;

/// A main-module image holding both signatures of `table`, wired so the scan
/// resolves to `combatant_table` and `target_pointer` after the static offsets.
pub fn client_module(
    table: &OffsetTable,
    base: usize,
    combatant_table: usize,
    target_pointer: usize,
) -> Vec<u8> {
    let mut image = vec![0xCCu8; MODULE_SIZE];
    let sites = [
        (
            COMBATANT_SITE,
            table.combatant_signature,
            combatant_table - table.combatant_offset,
        ),
        (
            TARGET_SITE,
            table.target_signature,
            target_pointer - table.target_offset,
        ),
    ];
    for (site, signature, operand) in sites {
        let pattern = signature_bytes(signature, 0x90);
        let operand_at = site + pattern.len();
        image[site..operand_at].copy_from_slice(&pattern);
        let word = match table.addressing {
            AddressingMode::Absolute32 => (operand as u32).to_le_bytes().to_vec(),
            AddressingMode::Absolute64 => (operand as u64).to_le_bytes().to_vec(),
            AddressingMode::RipRelative32 => {
                let next = (base + operand_at + 4) as i64;
                ((operand as i64 - next) as i32).to_le_bytes().to_vec()
            }
        };
        image[operand_at..operand_at + word.len()].copy_from_slice(&word);
    }
    image
}
