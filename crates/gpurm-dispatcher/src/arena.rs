//! Arena of simulated job state
//!
//! Entries are checked out by whoever advances a job for a round and checked
//! back in afterwards. While an entry is out, every other access to that job
//! fails, so a job cannot be advanced twice in the same round.

use gpurm_core::{ActiveJobState, GpurmError, GpurmResult, JobId};
use std::collections::HashMap;
use tracing::debug;

enum Slot {
    Idle(ActiveJobState),
    CheckedOut,
}

/// Exclusive hold on one job's state
#[derive(Debug)]
pub struct Lease {
    job_id: JobId,
    state: ActiveJobState,
}

impl Lease {
    /// Job this lease belongs to
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// State as checked out, or as last replaced
    pub fn state(&self) -> &ActiveJobState {
        &self.state
    }

    /// Replace the state that will be committed on check-in
    pub fn replace(&mut self, state: ActiveJobState) {
        self.state = state;
    }
}

/// Simulated job state indexed by job ID
#[derive(Default)]
pub struct JobStateTable {
    slots: HashMap<JobId, Slot>,
}

impl JobStateTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register state for a job, replacing any idle entry
    pub fn insert(&mut self, job_id: JobId, state: ActiveJobState) -> GpurmResult<()> {
        if let Some(Slot::CheckedOut) = self.slots.get(&job_id) {
            return Err(GpurmError::StateCheckedOut(job_id));
        }
        self.slots.insert(job_id, Slot::Idle(state));
        debug!(job_id = %job_id, "Registered simulated job state");
        Ok(())
    }

    /// Remove and return a job's state
    pub fn remove(&mut self, job_id: JobId) -> GpurmResult<ActiveJobState> {
        match self.slots.remove(&job_id) {
            Some(Slot::Idle(state)) => Ok(state),
            Some(Slot::CheckedOut) => {
                self.slots.insert(job_id, Slot::CheckedOut);
                Err(GpurmError::StateCheckedOut(job_id))
            }
            None => Err(GpurmError::SimulationStateMissing(job_id)),
        }
    }

    /// Take exclusive hold of a job's state
    pub fn checkout(&mut self, job_id: JobId) -> GpurmResult<Lease> {
        let slot = self
            .slots
            .get_mut(&job_id)
            .ok_or(GpurmError::SimulationStateMissing(job_id))?;

        match std::mem::replace(slot, Slot::CheckedOut) {
            Slot::Idle(state) => Ok(Lease { job_id, state }),
            Slot::CheckedOut => Err(GpurmError::StateCheckedOut(job_id)),
        }
    }

    /// Return a lease, committing its state
    pub fn checkin(&mut self, lease: Lease) -> GpurmResult<()> {
        match self.slots.get_mut(&lease.job_id) {
            Some(slot @ Slot::CheckedOut) => {
                *slot = Slot::Idle(lease.state);
                Ok(())
            }
            Some(Slot::Idle(_)) => Err(GpurmError::Internal(format!(
                "job {} checked in without being checked out",
                lease.job_id
            ))),
            None => Err(GpurmError::Internal(format!(
                "job {} removed while checked out",
                lease.job_id
            ))),
        }
    }

    /// Borrow an idle job's state
    pub fn get(&self, job_id: JobId) -> Option<&ActiveJobState> {
        match self.slots.get(&job_id) {
            Some(Slot::Idle(state)) => Some(state),
            _ => None,
        }
    }

    /// Mutably borrow an idle job's state
    pub fn get_mut(&mut self, job_id: JobId) -> Option<&mut ActiveJobState> {
        match self.slots.get_mut(&job_id) {
            Some(Slot::Idle(state)) => Some(state),
            _ => None,
        }
    }

    /// Whether the table has an entry for the job, idle or checked out
    pub fn contains(&self, job_id: JobId) -> bool {
        self.slots.contains_key(&job_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ActiveJobState {
        ActiveJobState::new(1.0, 10.0, 1)
    }

    #[test]
    fn test_checkout_and_checkin() {
        let mut table = JobStateTable::new();
        table.insert(JobId(1), state()).unwrap();

        let mut lease = table.checkout(JobId(1)).unwrap();
        assert!(table.get(JobId(1)).is_none());
        assert!(table.contains(JobId(1)));

        let mut next = lease.state().clone();
        next.job_executed_iteration = 4.0;
        lease.replace(next);
        table.checkin(lease).unwrap();

        assert_eq!(table.get(JobId(1)).unwrap().job_executed_iteration, 4.0);
    }

    #[test]
    fn test_double_checkout_rejected() {
        let mut table = JobStateTable::new();
        table.insert(JobId(1), state()).unwrap();

        let _lease = table.checkout(JobId(1)).unwrap();
        assert!(matches!(
            table.checkout(JobId(1)),
            Err(GpurmError::StateCheckedOut(JobId(1)))
        ));
        assert!(matches!(
            table.remove(JobId(1)),
            Err(GpurmError::StateCheckedOut(JobId(1)))
        ));
        assert!(matches!(
            table.insert(JobId(1), state()),
            Err(GpurmError::StateCheckedOut(JobId(1)))
        ));
    }

    #[test]
    fn test_missing_state() {
        let mut table = JobStateTable::new();
        assert!(matches!(
            table.checkout(JobId(3)),
            Err(GpurmError::SimulationStateMissing(JobId(3)))
        ));
        assert!(matches!(
            table.remove(JobId(3)),
            Err(GpurmError::SimulationStateMissing(JobId(3)))
        ));
    }

    #[test]
    fn test_checkin_without_checkout() {
        let mut table = JobStateTable::new();
        table.insert(JobId(1), state()).unwrap();
        let lease = table.checkout(JobId(1)).unwrap();
        table.checkin(lease).unwrap();

        let stray = Lease {
            job_id: JobId(1),
            state: state(),
        };
        assert!(matches!(table.checkin(stray), Err(GpurmError::Internal(_))));
    }

    #[test]
    fn test_checkin_each_slot_kind() {
        let mut table = JobStateTable::new();
        table.insert(JobId(1), state()).unwrap();
        table.insert(JobId(2), state()).unwrap();

        let first = table.checkout(JobId(1)).unwrap();
        let second = table.checkout(JobId(2)).unwrap();
        table.checkin(second).unwrap();
        table.checkin(first).unwrap();
        assert!(table.get(JobId(1)).is_some());
        assert!(table.get(JobId(2)).is_some());

        let unknown = Lease {
            job_id: JobId(9),
            state: state(),
        };
        assert!(matches!(table.checkin(unknown), Err(GpurmError::Internal(_))));
    }

    #[test]
    fn test_remove() {
        let mut table = JobStateTable::new();
        table.insert(JobId(1), state()).unwrap();
        assert_eq!(table.len(), 1);

        table.remove(JobId(1)).unwrap();
        assert!(table.is_empty());
    }
}
