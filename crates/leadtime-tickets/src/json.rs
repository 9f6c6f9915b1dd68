//! File-backed event provider.
//!
//! Reads a JSON dump of tickets and their event streams, the shape the
//! `leadtime burndown` command consumes. Useful for offline reporting and
//! as the provider implementation the test suites run against; the live
//! ticket system sits behind the same trait.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    EventProvider, ProviderError, Ticket, TicketEvent, TicketFilter, TicketHistory, TicketId,
};

/// On-disk dump: repository name, team rosters and full ticket histories.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TicketDump {
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub teams: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub tickets: Vec<TicketHistory>,
}

/// [`EventProvider`] over a [`TicketDump`] loaded from disk.
pub struct JsonFileProvider {
    dump: TicketDump,
}

impl JsonFileProvider {
    pub fn open(path: &Path) -> Result<Self, ProviderError> {
        let raw = std::fs::read_to_string(path)?;
        let dump = serde_json::from_str(&raw)?;
        Ok(Self { dump })
    }

    pub fn from_dump(dump: TicketDump) -> Self {
        Self { dump }
    }

    /// Every history in the dump, already ordered.
    pub fn histories(&self) -> &[TicketHistory] {
        &self.dump.tickets
    }

    fn find(&self, id: TicketId) -> Result<&TicketHistory, ProviderError> {
        self.dump
            .tickets
            .iter()
            .find(|history| history.ticket.id == id)
            .ok_or(ProviderError::UnknownTicket(id))
    }
}

impl EventProvider for JsonFileProvider {
    fn list_issues(
        &self,
        _repo: &str,
        filter: &TicketFilter,
    ) -> Result<BTreeSet<TicketId>, ProviderError> {
        Ok(self
            .dump
            .tickets
            .iter()
            .filter(|history| {
                filter
                    .label
                    .as_ref()
                    .map_or(true, |label| history.ticket.labels.contains(label))
            })
            .filter(|history| {
                filter
                    .assignee
                    .as_ref()
                    .map_or(true, |login| history.ticket.assignees.contains(login))
            })
            .map(|history| history.ticket.id)
            .collect())
    }

    fn get_ticket(&self, id: TicketId) -> Result<Ticket, ProviderError> {
        Ok(self.find(id)?.ticket.clone())
    }

    fn get_events(&self, id: TicketId) -> Result<Vec<TicketEvent>, ProviderError> {
        Ok(self.find(id)?.events.clone())
    }

    fn list_labels(&self, _repo: &str) -> Result<BTreeSet<String>, ProviderError> {
        let mut labels: BTreeSet<String> = BTreeSet::new();
        for history in &self.dump.tickets {
            labels.extend(history.ticket.labels.iter().cloned());
            labels.extend(history.events.iter().filter_map(|e| e.label.clone()));
        }
        Ok(labels)
    }

    fn list_teams(&self, _repo: &str) -> Result<BTreeMap<String, BTreeSet<String>>, ProviderError> {
        Ok(self.dump.teams.clone())
    }
}
