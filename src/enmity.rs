use log::debug;
use serde::Serialize;

use crate::bytes::read_u32;
use crate::entity::Combatant;
use crate::memory::ProcessMemoryReader;
use crate::offsets::{ENMITY_ID, ENMITY_SLOTS, ENMITY_SLOT_SIZE, ENMITY_VALUE};

pub const UNKNOWN_NAME: &str = "Unknown";

/// One row of the current target's enmity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnmityEntry {
    pub id: u32,
    pub owner_id: u32,
    pub name: String,
    pub job: u8,
    pub enmity: u32,
    /// Percentage of the top enmity, 0..=100.
    pub hate_rate: u8,
    pub is_me: bool,
}

/// Size of the enmity table snapshot.
pub const ENMITY_TABLE_SIZE: usize = ENMITY_SLOTS * ENMITY_SLOT_SIZE;

/// Decode a snapshot of the enmity table and join it against the visible actors.
///
/// The game keeps the table sorted by enmity, highest first, and leaves unused
/// slots at the end, so decoding stops at the first empty id and the first
/// non-zero enmity is the maximum.
pub fn build_enmity_list(
    data: &[u8],
    combatants: &[Combatant],
    me: Option<&Combatant>,
) -> Vec<EnmityEntry> {
    let mut result = Vec::new();
    let mut top_enmity = 0u32;

    for slot in 0..ENMITY_SLOTS {
        let base = slot * ENMITY_SLOT_SIZE;
        let id = read_u32(data, base + ENMITY_ID);
        if id == 0 {
            break;
        }
        let enmity = read_u32(data, base + ENMITY_VALUE);

        let mut entry = EnmityEntry {
            id,
            owner_id: 0,
            name: UNKNOWN_NAME.to_string(),
            job: 0,
            enmity,
            hate_rate: 0,
            is_me: me.map_or(false, |m| m.id == id),
        };
        if let Some(c) = combatants.iter().find(|c| c.id == id) {
            entry.name = c.name.clone();
            entry.job = c.job;
            entry.owner_id = c.owner_id;
        }

        if top_enmity == 0 {
            top_enmity = enmity;
        }
        entry.hate_rate = hate_rate(enmity, top_enmity);
        result.push(entry);
    }

    result
}

fn hate_rate(enmity: u32, top: u32) -> u8 {
    if top == 0 {
        return 0;
    }
    let rate = (f64::from(enmity) * 100.0 / f64::from(top)).round();
    rate.clamp(0.0, 100.0) as u8
}

/// Read the enmity table at `address` in one snapshot and decode it.
pub fn read_enmity_list(
    reader: &dyn ProcessMemoryReader,
    address: usize,
    combatants: &[Combatant],
    me: Option<&Combatant>,
) -> Vec<EnmityEntry> {
    let data = reader.read_zeroed(address, ENMITY_TABLE_SIZE);
    let list = build_enmity_list(&data, combatants, me);
    debug!("Enmity list: {} entries", list.len());
    list
}
