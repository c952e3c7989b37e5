// FFXIV client layouts (dx9 32-bit and dx11 64-bit builds).
// Signatures survive most patches; the enmity offset is the usual breakage point.

use crate::scanner::AddressingMode;

/// Reserved actor id meaning "no owner" / invalid reference.
pub const INVALID_ACTOR_ID: u32 = 0xE000_0000;

// ── Combatant table ─────────────────────────────────────────────────
pub const COMBATANT_SLOTS: usize = 344;
pub const COMBATANT_RECORD_SIZE: usize = 0x3F40;

// ── Enmity table (attached to the current target) ───────────────────
pub const ENMITY_SLOTS: usize = 16;
pub const ENMITY_SLOT_SIZE: usize = 72;
pub const ENMITY_ID: usize = 0x00; // u32
pub const ENMITY_VALUE: usize = 0x04; // u32

pub const MAX_TP: u16 = 1000;

/// Which client build the attached process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ClientVariant {
    Unknown,
    /// `ffxiv.exe`, the 32-bit DirectX 9 client.
    Dx9,
    /// `ffxiv_dx11.exe`, the 64-bit DirectX 11 client.
    Dx11,
}

impl ClientVariant {
    /// Identify the client from its executable name (`.exe` suffix optional).
    pub fn from_process_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let stem = lower.strip_suffix(".exe").unwrap_or(&lower);
        match stem {
            "ffxiv" => Self::Dx9,
            "ffxiv_dx11" => Self::Dx11,
            _ => Self::Unknown,
        }
    }

    /// Memory layout for this build, `None` when unsupported.
    pub fn layout(self) -> Option<&'static OffsetTable> {
        match self {
            Self::Dx9 => Some(&DX9),
            Self::Dx11 => Some(&DX11),
            Self::Unknown => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Dx9 => "dx9",
            Self::Dx11 => "dx11",
            Self::Unknown => "unknown",
        }
    }
}

/// Byte offsets of the fields inside one combatant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: usize,
    pub name_len: usize,
    pub id: usize,
    pub owner_id: usize,
    pub object_type: usize,
    pub effective_distance: usize,
    /// Stored as X, Z, Y.
    pub position: usize,
    /// Job, level, then HP/MP/TP at fixed steps from here.
    pub vitals: usize,
}

impl RecordLayout {
    pub const fn job(&self) -> usize {
        self.vitals
    }
    pub const fn level(&self) -> usize {
        self.vitals + 1
    }
    pub const fn current_hp(&self) -> usize {
        self.vitals + 8
    }
    pub const fn max_hp(&self) -> usize {
        self.vitals + 12
    }
    pub const fn current_mp(&self) -> usize {
        self.vitals + 16
    }
    pub const fn max_mp(&self) -> usize {
        self.vitals + 20
    }
    pub const fn current_tp(&self) -> usize {
        self.vitals + 24
    }
}

/// Everything that differs between client builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetTable {
    pub pointer_width: usize,
    pub addressing: AddressingMode,
    pub combatant_signature: &'static str,
    pub combatant_offset: usize,
    pub target_signature: &'static str,
    pub target_offset: usize,
    /// From the combatant table to the enmity table. Not signature-backed.
    pub enmity_offset: usize,
    pub record: RecordLayout,
}

pub static DX9: OffsetTable = OffsetTable {
    pointer_width: 4,
    addressing: AddressingMode::Absolute32,
    combatant_signature: "81feffff0000743581fe58010000732d8b3cb5",
    combatant_offset: 0,
    target_signature: "750e85d2750ab9",
    target_offset: 88,
    enmity_offset: 19188,
    record: RecordLayout {
        name: 0x30,
        name_len: 256,
        id: 0x74,
        owner_id: 0x84,
        object_type: 0x8A,
        effective_distance: 0x91,
        position: 0xA0,
        vitals: 0x14C0,
    },
};

pub static DX11: OffsetTable = OffsetTable {
    pointer_width: 8,
    addressing: AddressingMode::RipRelative32,
    combatant_signature: "48c1e8033dffff0000742b3da80100007324488d0d",
    combatant_offset: 0,
    target_signature: "4883C4205FC3483935285729017520483935",
    target_offset: 0,
    enmity_offset: 25312,
    record: RecordLayout {
        name: 0x30,
        name_len: 256,
        id: 0x74,
        owner_id: 0x84,
        object_type: 0x8A,
        effective_distance: 0x91,
        position: 0xB0,
        vitals: 0x16F0,
    },
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    #[test]
    fn test_variant_from_process_name() {
        assert_eq!(ClientVariant::from_process_name("ffxiv"), ClientVariant::Dx9);
        assert_eq!(ClientVariant::from_process_name("ffxiv.exe"), ClientVariant::Dx9);
        assert_eq!(
            ClientVariant::from_process_name("ffxiv_dx11"),
            ClientVariant::Dx11
        );
        assert_eq!(
            ClientVariant::from_process_name("FFXIV_DX11.EXE"),
            ClientVariant::Dx11
        );
        assert_eq!(
            ClientVariant::from_process_name("ffxivboot.exe"),
            ClientVariant::Unknown
        );
        assert!(ClientVariant::Unknown.layout().is_none());
    }

    #[test]
    fn test_layouts_match_pointer_width() {
        assert_eq!(ClientVariant::Dx9.layout().unwrap().pointer_width, 4);
        assert_eq!(ClientVariant::Dx11.layout().unwrap().pointer_width, 8);
        assert_eq!(DX11.addressing, AddressingMode::RipRelative32);
        assert_eq!(DX9.addressing, AddressingMode::Absolute32);
    }

    #[test]
    fn test_signatures_parse() {
        for table in [&DX9, &DX11] {
            assert!(Pattern::parse(table.combatant_signature).is_some());
            assert!(Pattern::parse(table.target_signature).is_some());
        }
    }

    #[test]
    fn test_vitals_fit_in_record() {
        for table in [&DX9, &DX11] {
            assert!(table.record.current_tp() + 2 <= COMBATANT_RECORD_SIZE);
            assert!(table.record.name + table.record.name_len <= COMBATANT_RECORD_SIZE);
        }
    }
}
