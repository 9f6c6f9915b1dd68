//! Mutations of the process store.
//!
//! The store is pure data: every operation here rewrites the
//! [`ProjectDocument`] value and bumps `cache_hash`, and none of them know
//! anything about scheduling. Estimate mutations never overwrite history;
//! they append a new record under the mutation date, so the document can be
//! replayed as of any earlier observation date.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::NaiveDate;
use tracing::debug;

use crate::{EstimateRecord, Pid, Process, ProjectDocument, RoleId, StoreError};

impl ProjectDocument {
    /// Insert `record` into the history of `pid` under `today`, creating
    /// the process if it does not exist yet.
    ///
    /// Fails with [`StoreError::CycleDetected`] when the record's
    /// dependencies would close a cycle among the records effective today;
    /// the document is unchanged in that case.
    pub fn upsert_process(
        &mut self,
        pid: Pid,
        record: EstimateRecord,
        today: NaiveDate,
    ) -> Result<(), StoreError> {
        // History keys are business days
        let today = crate::bizdays::next_business_day(today);
        if self.would_cycle(&pid, &record, today) {
            return Err(StoreError::CycleDetected(pid));
        }

        match self.processes.get_mut(&pid) {
            Some(process) => {
                process.history.insert(today, record);
                process.last_date = process
                    .history
                    .keys()
                    .next_back()
                    .copied()
                    .expect("history non-empty after insert");
            }
            None => {
                self.processes.insert(pid.clone(), Process::new(today, record));
            }
        }
        self.bump();
        debug!(%pid, %today, cache_hash = self.cache_hash, "process upserted");
        Ok(())
    }

    /// Remove each listed process and scrub the removed ids from the
    /// dependency sets of every remaining history entry. Unknown ids are
    /// ignored.
    pub fn delete_processes(&mut self, pids: &[Pid]) {
        let victims: BTreeSet<&Pid> = pids.iter().collect();
        let mut removed = false;
        for pid in &victims {
            removed |= self.processes.remove(*pid).is_some();
        }
        for process in self.processes.values_mut() {
            for record in process.history.values_mut() {
                record.dependencies.retain(|dep| !victims.contains(dep));
            }
        }
        if removed {
            self.bump();
        }
    }

    /// Remove each listed role from the registry, from every resource and
    /// from every history entry's role set and commitment map.
    pub fn delete_roles(&mut self, roles: &[RoleId]) {
        let victims: BTreeSet<&RoleId> = roles.iter().collect();
        self.roles.retain(|role| !victims.contains(role));
        for resource in self.resources.values_mut() {
            resource.roles.retain(|role| !victims.contains(role));
        }
        for process in self.processes.values_mut() {
            for record in process.history.values_mut() {
                record.roles.retain(|role| !victims.contains(role));
                record.commitment.retain(|role, _| !victims.contains(role));
            }
        }
        self.bump();
    }

    /// Every date on which any estimate changed, ascending and deduplicated.
    pub fn dates_of_prediction_change(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<NaiveDate> = self
            .processes
            .values()
            .flat_map(|process| process.history.keys().copied())
            .collect();
        dates.into_iter().collect()
    }

    /// Derive a fresh symbolic id from a human-readable name.
    ///
    /// Takes the uppercased initial of each token (numeric and all-caps
    /// tokens are kept whole); punctuation separates tokens like
    /// whitespace. When the symbol is already taken, the smallest positive
    /// integer suffix producing a fresh id is appended.
    pub fn pid_from_name(&self, name: &str) -> Pid {
        let symbol = symbolify(name);
        if !self.processes.contains_key(&symbol) {
            return symbol;
        }
        let mut i = 1;
        loop {
            let candidate = format!("{symbol}{i}");
            if !self.processes.contains_key(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    fn bump(&mut self) {
        self.cache_hash += 1;
    }

    /// Would inserting `record` as the today-effective estimate of `pid`
    /// close a cycle among the today-effective dependency sets?
    fn would_cycle(&self, pid: &Pid, record: &EstimateRecord, today: NaiveDate) -> bool {
        // Adjacency over records effective today, with the candidate record
        // standing in for `pid`. Processes not yet defined today cannot
        // participate.
        let mut deps: BTreeMap<&Pid, &BTreeSet<Pid>> = BTreeMap::new();
        for (other, process) in &self.processes {
            if other == pid {
                continue;
            }
            if let Some(effective) = process.record_as_of(today) {
                deps.insert(other, &effective.dependencies);
            }
        }
        deps.insert(pid, &record.dependencies);

        // Kahn's algorithm; leftover nodes mean a cycle.
        let mut in_degree: BTreeMap<&Pid, usize> = deps.keys().map(|p| (*p, 0)).collect();
        for targets in deps.values() {
            for dep in targets.iter() {
                if let Some(degree) = in_degree.get_mut(dep) {
                    *degree += 1;
                }
            }
        }
        let mut queue: VecDeque<&Pid> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(p, _)| *p)
            .collect();
        let mut visited = 0;
        while let Some(current) = queue.pop_front() {
            visited += 1;
            if let Some(targets) = deps.get(current) {
                for dep in targets.iter() {
                    if let Some(degree) = in_degree.get_mut(dep) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dep);
                        }
                    }
                }
            }
        }
        visited != deps.len()
    }
}

/// Compress a name into a symbol: `"Design Backend"` becomes `"DB"`,
/// `"phase 2 rollout"` becomes `"P2R"`. Tokens that are numeric or fully
/// uppercase are kept whole.
pub fn symbolify(text: &str) -> String {
    const PUNCT: &[char] = &[
        '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '_', '-', '=', '+',
    ];
    let cleaned: String = text
        .chars()
        .map(|c| if PUNCT.contains(&c) { ' ' } else { c })
        .collect();

    cleaned
        .split_whitespace()
        .map(|token| {
            if token.chars().all(|c| c.is_ascii_digit()) {
                token.to_string()
            } else if token.chars().all(|c| !c.is_lowercase()) {
                token.to_string()
            } else {
                token
                    .chars()
                    .next()
                    .map(|c| c.to_uppercase().to_string())
                    .unwrap_or_default()
            }
        })
        .collect()
}
