//! Anchor discovery.
//!
//! An anchor is a base address found by signature scan and reused every poll:
//! the combatant table, the enmity table derived from it, and the target pointer.
//! Resolution is all-or-nothing per scan; a failed scan leaves its anchors unset
//! and the next validity check scans again, so the engine recovers on its own
//! after a client restart as long as the signatures still match.

use log::{debug, error, info};
use serde::Serialize;

use crate::entity::read_self;
use crate::error::EngineError;
use crate::memory::ProcessMemoryReader;
use crate::offsets::{ClientVariant, OffsetTable};
use crate::scanner::SignatureScanner;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Anchors {
    pub combatant_table: Option<usize>,
    pub enmity_table: Option<usize>,
    pub target_pointer: Option<usize>,
}

impl Anchors {
    pub fn is_complete(&self) -> bool {
        self.combatant_table.is_some() && self.enmity_table.is_some() && self.target_pointer.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorState {
    Unresolved,
    Resolved,
}

pub struct AnchorResolver {
    variant: ClientVariant,
    table: Option<&'static OffsetTable>,
    anchors: Anchors,
    attempts: u32,
}

impl AnchorResolver {
    pub fn new(variant: ClientVariant) -> Self {
        Self {
            variant,
            table: variant.layout(),
            anchors: Anchors::default(),
            attempts: 0,
        }
    }

    pub fn state(&self) -> AnchorState {
        if self.anchors.is_complete() {
            AnchorState::Resolved
        } else {
            AnchorState::Unresolved
        }
    }

    pub fn anchors(&self) -> Anchors {
        self.anchors
    }

    pub fn table(&self) -> Option<&'static OffsetTable> {
        self.table
    }

    /// Number of full scans attempted so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Resolve only if some anchor is missing. Returns whether all anchors are set.
    /// A variant without a layout never resolves and is not rescanned.
    pub fn ensure_resolved(&mut self, reader: &dyn ProcessMemoryReader) -> bool {
        if self.state() == AnchorState::Resolved {
            return true;
        }
        if self.table.is_none() {
            return false;
        }
        self.resolve(reader) == AnchorState::Resolved
    }

    /// Drop every anchor and scan the main module again.
    pub fn resolve(&mut self, reader: &dyn ProcessMemoryReader) -> AnchorState {
        self.anchors = Anchors::default();

        let Some(table) = self.table else {
            error!(
                "{}",
                EngineError::UnsupportedVariant(self.variant.label().to_string())
            );
            return AnchorState::Unresolved;
        };

        self.attempts += 1;
        let module = match reader.main_module() {
            Ok(module) => module,
            Err(e) => {
                error!("{}", EngineError::ModuleUnavailable(e));
                return AnchorState::Unresolved;
            }
        };
        debug!(
            "Resolving {} anchors in module 0x{:X} (size 0x{:X}), attempt {}",
            self.variant.label(),
            module.base,
            module.size,
            self.attempts
        );
        let scanner = SignatureScanner::new(reader, module);

        let combatants = expect_one(
            "CombatantList",
            scanner.scan(table.combatant_signature, 0, table.addressing),
        )
        .and_then(|address| offset_by("CombatantList", address, table.combatant_offset))
        .and_then(|combatant_table| {
            let enmity_table = offset_by("Enmity", combatant_table, table.enmity_offset)?;
            Ok((combatant_table, enmity_table))
        });
        match combatants {
            Ok((combatant_table, enmity_table)) => {
                self.anchors.combatant_table = Some(combatant_table);
                self.anchors.enmity_table = Some(enmity_table);
            }
            Err(e) => error!("{}", e),
        }

        match expect_one(
            "Target",
            scanner.scan(table.target_signature, 0, table.addressing),
        )
        .and_then(|address| offset_by("Target", address, table.target_offset))
        {
            Ok(address) => self.anchors.target_pointer = Some(address),
            Err(e) => error!("{}", e),
        }

        debug!(
            "combatant table: 0x{:X}, enmity table: 0x{:X}",
            self.anchors.combatant_table.unwrap_or(0),
            self.anchors.enmity_table.unwrap_or(0)
        );
        debug!(
            "target pointer: 0x{:X}",
            self.anchors.target_pointer.unwrap_or(0)
        );

        let state = self.state();
        if state == AnchorState::Resolved {
            info!("Resolved {} anchors", self.variant.label());
            if let Some(me) = self
                .anchors
                .combatant_table
                .and_then(|t| read_self(reader, t, table))
            {
                debug!("Local player: '{}' ({:X})", me.name, me.id);
            }
        }
        state
    }
}

/// Exactly one non-null hit, or a scan failure naming the anchor.
fn expect_one(anchor: &'static str, hits: Vec<usize>) -> Result<usize, EngineError> {
    match hits.as_slice() {
        [address] if *address != 0 => Ok(*address),
        _ => Err(EngineError::ScanFailure {
            anchor,
            matches: hits.len(),
        }),
    }
}

/// `address + offset`, or an error when the sum would wrap.
fn offset_by(anchor: &'static str, address: usize, offset: usize) -> Result<usize, EngineError> {
    address.checked_add(offset).ok_or(EngineError::AnchorOutOfRange {
        anchor,
        address,
        offset,
    })
}
