use log::{debug, trace};
use serde::Serialize;
use std::collections::HashSet;

use crate::bytes::{read_cstring, read_f32, read_i32, read_ptr, read_signed_ptr, read_u16, read_u32, read_u8};
use crate::memory::ProcessMemoryReader;
use crate::offsets::{
    OffsetTable, RecordLayout, COMBATANT_RECORD_SIZE, COMBATANT_SLOTS, INVALID_ACTOR_ID, MAX_TP,
};

// ─── Object Type ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectType {
    Player,
    Monster,
    Npc,
    Treasure,
    Aetheryte,
    Gathering,
    EventObject,
    Mount,
    Minion,
    Retainer,
    Other(u8),
}

impl ObjectType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Player,
            2 => Self::Monster,
            3 => Self::Npc,
            4 => Self::Treasure,
            5 => Self::Aetheryte,
            6 => Self::Gathering,
            7 => Self::EventObject,
            8 => Self::Mount,
            9 => Self::Minion,
            10 => Self::Retainer,
            other => Self::Other(other),
        }
    }

    /// Players and monsters carry job, level and HP/MP/TP.
    pub fn is_living(self) -> bool {
        matches!(self, Self::Player | Self::Monster)
    }
}

// ─── Combatant ──────────────────────────────────────────────────────

/// One visible actor, decoded from a single snapshot of its record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Combatant {
    pub name: String,
    pub id: u32,
    /// 0 when the actor has no owner.
    pub owner_id: u32,
    pub object_type: ObjectType,
    pub effective_distance: u8,
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    pub job: u8,
    pub level: u8,
    pub current_hp: i32,
    pub max_hp: i32,
    pub current_mp: i32,
    pub max_mp: i32,
    pub current_tp: u16,
    pub max_tp: u16,
}

impl Combatant {
    /// Decode a raw record. Pure; fields past the end of `data` read as zero.
    pub fn from_raw_bytes(data: &[u8], layout: &RecordLayout) -> Self {
        let mut owner_id = read_u32(data, layout.owner_id);
        if owner_id == INVALID_ACTOR_ID {
            owner_id = 0;
        }
        let object_type = ObjectType::from_u8(read_u8(data, layout.object_type));

        let mut combatant = Combatant {
            name: read_cstring(data, layout.name, layout.name_len),
            id: read_u32(data, layout.id),
            owner_id,
            object_type,
            effective_distance: read_u8(data, layout.effective_distance),
            pos_x: read_f32(data, layout.position),
            pos_z: read_f32(data, layout.position + 4),
            pos_y: read_f32(data, layout.position + 8),
            job: 0,
            level: 0,
            current_hp: 0,
            max_hp: 0,
            current_mp: 0,
            max_mp: 0,
            current_tp: 0,
            max_tp: 0,
        };

        if object_type.is_living() {
            combatant.job = read_u8(data, layout.job());
            combatant.level = read_u8(data, layout.level());
            combatant.current_hp = read_i32(data, layout.current_hp());
            combatant.max_hp = read_i32(data, layout.max_hp());
            combatant.current_mp = read_i32(data, layout.current_mp());
            combatant.max_mp = read_i32(data, layout.max_mp());
            combatant.current_tp = read_u16(data, layout.current_tp());
            combatant.max_tp = MAX_TP;
        }

        combatant
    }

    /// Whether `id` names a real actor.
    pub fn is_valid_id(id: u32) -> bool {
        id != 0 && id != INVALID_ACTOR_ID
    }
}

// ─── Readers ────────────────────────────────────────────────────────

/// Snapshot and decode the record at `address`. Unreadable memory decodes as zeroes.
pub fn read_combatant(
    reader: &dyn ProcessMemoryReader,
    address: usize,
    table: &OffsetTable,
) -> Combatant {
    let data = reader.read_zeroed(address, COMBATANT_RECORD_SIZE);
    Combatant::from_raw_bytes(&data, &table.record)
}

/// Every visible player and monster, in slot order, unique by id.
pub fn list_combatants(
    reader: &dyn ProcessMemoryReader,
    combatant_table: usize,
    table: &OffsetTable,
) -> Vec<Combatant> {
    let width = table.pointer_width;
    let slots = reader.read_zeroed(combatant_table, width * COMBATANT_SLOTS);

    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for i in 0..COMBATANT_SLOTS {
        let address = read_ptr(&slots, i * width, width);
        if address == 0 {
            continue;
        }
        let combatant = read_combatant(reader, address, table);
        if !combatant.object_type.is_living() {
            continue;
        }
        if !Combatant::is_valid_id(combatant.id) {
            trace!("  slot {}: skipping invalid id 0x{:X}", i, combatant.id);
            continue;
        }
        if seen.insert(combatant.id) {
            result.push(combatant);
        }
    }

    debug!("Combatant list: {} entries", result.len());
    result
}

/// The local player: the first slot of the combatant table.
pub fn read_self(
    reader: &dyn ProcessMemoryReader,
    combatant_table: usize,
    table: &OffsetTable,
) -> Option<Combatant> {
    let width = table.pointer_width;
    let slot = reader.read_zeroed(combatant_table, width);
    let address = read_ptr(&slot, 0, width);
    if address == 0 {
        return None;
    }
    Some(read_combatant(reader, address, table))
}

/// The actor the local player has targeted, if any.
pub fn read_target(
    reader: &dyn ProcessMemoryReader,
    target_pointer: usize,
    table: &OffsetTable,
) -> Option<Combatant> {
    let width = table.pointer_width;
    let slot = reader.read_zeroed(target_pointer, width);
    let address = read_signed_ptr(&slot, 0, width);
    if address <= 0 {
        return None;
    }
    Some(read_combatant(reader, address as usize, table))
}
