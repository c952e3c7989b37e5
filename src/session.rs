use log::{debug, error, info};
use serde::Serialize;
use std::io;
use sysinfo::System;

use crate::anchor::{AnchorResolver, Anchors};
use crate::enmity::{read_enmity_list, EnmityEntry};
use crate::entity::{list_combatants, read_self, read_target, Combatant};
use crate::error::{EngineError, Result};
use crate::memory::{create_reader, ProcessMemoryReader};
use crate::offsets::{ClientVariant, OffsetTable};

/// A running game client found on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProcess {
    pub pid: u32,
    pub name: String,
}

impl ClientProcess {
    pub fn variant(&self) -> ClientVariant {
        ClientVariant::from_process_name(&self.name)
    }
}

/// Every running process whose executable is a known client build.
pub fn find_client_processes() -> Vec<ClientProcess> {
    let mut sys = System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
    let mut found: Vec<ClientProcess> = sys
        .processes()
        .values()
        .map(|p| ClientProcess {
            pid: p.pid().as_u32(),
            name: p.name().to_string_lossy().into_owned(),
        })
        .filter(|p| p.variant() != ClientVariant::Unknown)
        .collect();
    found.sort_by_key(|p| p.pid);
    debug!("Found {} client processes", found.len());
    found
}

/// Everything the overlay shows for one poll.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub me: Option<Combatant>,
    pub target: Option<Combatant>,
    pub combatants: Vec<Combatant>,
    pub enmity: Vec<EnmityEntry>,
}

/// An attached client. Calls must be serialized: resolution mutates the anchors.
pub struct Session {
    pid: u32,
    variant: ClientVariant,
    reader: Box<dyn ProcessMemoryReader>,
    resolver: AnchorResolver,
}

impl Session {
    /// Open `process` for reading and try to resolve its anchors.
    pub fn attach(process: &ClientProcess) -> Result<Self> {
        let mut reader = create_reader();
        reader.attach(process.pid)?;
        Ok(Self::with_reader(process.pid, process.variant(), reader))
    }

    /// Attach to the first running client, if any.
    pub fn attach_first() -> Result<Self> {
        let process = find_client_processes().into_iter().next().ok_or_else(|| {
            EngineError::Attach(io::Error::new(
                io::ErrorKind::NotFound,
                "no ffxiv client process is running",
            ))
        })?;
        Self::attach(&process)
    }

    /// Build a session over an already attached reader.
    pub fn with_reader(
        pid: u32,
        variant: ClientVariant,
        reader: Box<dyn ProcessMemoryReader>,
    ) -> Self {
        info!("Attached process: {} ({})", pid, variant.label());
        let mut session = Self {
            pid,
            variant,
            reader,
            resolver: AnchorResolver::new(variant),
        };
        if variant == ClientVariant::Unknown {
            error!("{}", EngineError::UnsupportedVariant(variant.label().to_string()));
        } else {
            session.resolver.resolve(&*session.reader);
        }
        session
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn variant(&self) -> ClientVariant {
        self.variant
    }

    pub fn anchors(&self) -> Anchors {
        self.resolver.anchors()
    }

    /// Full anchor scans performed over the session's lifetime.
    pub fn resolve_attempts(&self) -> u32 {
        self.resolver.attempts()
    }

    pub fn has_exited(&self) -> bool {
        !self.reader.is_alive()
    }

    /// False once the process is gone or while any anchor is unresolved.
    /// A missing anchor triggers one rescan before answering.
    pub fn is_usable(&mut self) -> bool {
        if !self.reader.is_alive() {
            debug!("{}", EngineError::StaleSession(self.pid));
            return false;
        }
        self.resolver.ensure_resolved(&*self.reader)
    }

    /// Layout plus one anchor, when both are available.
    fn anchor(&self, pick: fn(&Anchors) -> Option<usize>) -> Option<(&'static OffsetTable, usize)> {
        let table = self.resolver.table()?;
        let address = pick(&self.resolver.anchors())?;
        Some((table, address))
    }

    pub fn list_combatants(&self) -> Vec<Combatant> {
        match self.anchor(|a| a.combatant_table) {
            Some((table, address)) => list_combatants(&*self.reader, address, table),
            None => Vec::new(),
        }
    }

    pub fn get_self(&self) -> Option<Combatant> {
        let (table, address) = self.anchor(|a| a.combatant_table)?;
        read_self(&*self.reader, address, table)
    }

    pub fn get_current_target(&self) -> Option<Combatant> {
        let (table, address) = self.anchor(|a| a.target_pointer)?;
        read_target(&*self.reader, address, table)
    }

    pub fn get_threat_table(&self) -> Vec<EnmityEntry> {
        let combatants = self.list_combatants();
        let me = self.get_self();
        self.threat_table_with(&combatants, me.as_ref())
    }

    fn threat_table_with(&self, combatants: &[Combatant], me: Option<&Combatant>) -> Vec<EnmityEntry> {
        match self.anchor(|a| a.enmity_table) {
            Some((_, address)) => read_enmity_list(&*self.reader, address, combatants, me),
            None => Vec::new(),
        }
    }

    /// One poll: the combatant list is read once and shared with the enmity join.
    pub fn snapshot(&self) -> Snapshot {
        let combatants = self.list_combatants();
        let me = self.get_self();
        let target = self.get_current_target();
        let enmity = self.threat_table_with(&combatants, me.as_ref());
        Snapshot {
            me,
            target,
            combatants,
            enmity,
        }
    }
}
