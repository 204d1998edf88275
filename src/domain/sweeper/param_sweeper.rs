use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::sweeper::combination::Combination;
use crate::domain::sweeper::parameter_space::ParameterSpace;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepState {
    Pending,
    InProgress,
    Done,
    Cancelled,
}

impl SweepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SweepState::Done | SweepState::Cancelled)
    }
}

impl fmt::Display for SweepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SweepState::Pending => "pending",
            SweepState::InProgress => "in progress",
            SweepState::Done => "done",
            SweepState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// On-disk record of a combination that reached a terminal state.
#[derive(Debug, Serialize, Deserialize)]
struct SweepRecord {
    combination: Combination,
    state: SweepState,
    updated_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub cancelled: usize,
}

/// Tracks the state of every combination of a parameter space.
///
/// Terminal states are persisted as one JSON record per combination in the persist
/// directory, written to a temporary file and renamed into place. `InProgress` only
/// lives in memory: a combination interrupted by a crash is pending again on restart.
#[derive(Debug)]
pub struct ParamSweeper {
    persist_dir: PathBuf,
    combinations: Vec<Combination>,
    states: HashMap<Combination, SweepState>,
}

impl ParamSweeper {
    /// Builds the universe of combinations and restores the terminal states recorded in `persist_dir`.
    pub fn create(space: &ParameterSpace, persist_dir: &Path) -> Result<Self> {
        fs::create_dir_all(persist_dir)?;

        let combinations = space.combinations();
        let mut states: HashMap<Combination, SweepState> = combinations.iter().map(|c| (c.clone(), SweepState::Pending)).collect();

        let mut restored = 0;
        for entry in fs::read_dir(persist_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let record: SweepRecord = match fs::read_to_string(&path).map_err(Error::from).and_then(|s| Ok(serde_json::from_str(&s)?)) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Ignoring unreadable sweep record {}: {}", path.display(), e);
                    continue;
                }
            };

            match states.get_mut(&record.combination) {
                Some(state) if record.state.is_terminal() => {
                    *state = record.state;
                    restored += 1;
                }
                Some(_) => {}
                None => log::debug!("Sweep record {} is outside the parameter space", path.display()),
            }
        }

        let sweeper = Self { persist_dir: persist_dir.to_path_buf(), combinations, states };
        log::info!(
            "Sweep over {} combination(s), {} restored from {}, {} remaining",
            sweeper.combinations.len(),
            restored,
            persist_dir.display(),
            sweeper.get_remaining()
        );
        Ok(sweeper)
    }

    /// First pending combination in product order, now marked in progress.
    pub fn get_next(&mut self) -> Result<Combination> {
        let next = self.combinations.iter().find(|c| self.states.get(*c) == Some(&SweepState::Pending)).cloned().ok_or(Error::EmptySweep)?;
        self.states.insert(next.clone(), SweepState::InProgress);
        Ok(next)
    }

    /// Combinations neither done nor cancelled.
    pub fn get_remaining(&self) -> usize {
        self.states.values().filter(|state| !state.is_terminal()).count()
    }

    pub fn done(&mut self, combination: &Combination) -> Result<()> {
        self.finish(combination, SweepState::Done)
    }

    pub fn cancel(&mut self, combination: &Combination) -> Result<()> {
        self.finish(combination, SweepState::Cancelled)
    }

    pub fn state_of(&self, combination: &Combination) -> Option<SweepState> {
        self.states.get(combination).copied()
    }

    pub fn get_done(&self) -> Vec<&Combination> {
        self.in_state(SweepState::Done)
    }

    pub fn get_cancelled(&self) -> Vec<&Combination> {
        self.in_state(SweepState::Cancelled)
    }

    pub fn stats(&self) -> SweepStats {
        let mut stats = SweepStats { total: self.combinations.len(), ..SweepStats::default() };
        for state in self.states.values() {
            match state {
                SweepState::Pending => stats.pending += 1,
                SweepState::InProgress => stats.in_progress += 1,
                SweepState::Done => stats.done += 1,
                SweepState::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    fn in_state(&self, wanted: SweepState) -> Vec<&Combination> {
        self.combinations.iter().filter(|c| self.states.get(*c) == Some(&wanted)).collect()
    }

    fn finish(&mut self, combination: &Combination, target: SweepState) -> Result<()> {
        let current = self.states.get(combination).copied().ok_or_else(|| Error::UnknownCombination(combination.to_string()))?;
        if current.is_terminal() {
            return Err(Error::InvalidSweepTransition { combination: combination.to_string(), state: current.to_string() });
        }

        self.persist(combination, target)?;
        self.states.insert(combination.clone(), target);
        Ok(())
    }

    fn persist(&self, combination: &Combination, state: SweepState) -> Result<()> {
        let record = SweepRecord { combination: combination.clone(), state, updated_at: Utc::now().to_rfc3339() };
        let slug = combination.slug();
        let target = self.persist_dir.join(format!("{}.json", slug));
        let staging = self.persist_dir.join(format!(".{}.json.tmp", slug));

        let mut file = File::create(&staging)?;
        file.write_all(&serde_json::to_vec_pretty(&record)?)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&staging, &target)?;
        sync_dir(&self.persist_dir);
        Ok(())
    }
}

/// Flushes the directory entry of a rename. Not every platform can open a directory, so failures are only logged.
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        log::debug!("Could not sync {}: {}", dir.display(), e);
    }
}
