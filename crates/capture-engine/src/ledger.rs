//! The authoritative in-memory table of recordings.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cameraman_common::error::{CameramanError, CameramanResult};

use crate::recording::{Recording, RecordingId, RecordingSnapshot, RecordingStatus};

/// All recordings of this process, keyed by id.
///
/// Keys are never removed. Every access takes the same lock and runs
/// synchronously, so no await point can happen while it is held and a
/// reader never observes a half-applied transition.
#[derive(Debug, Default)]
pub struct RecordingLedger {
    entries: Mutex<BTreeMap<RecordingId, Recording>>,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<RecordingId, Recording>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a new recording.
    pub fn insert(&self, recording: Recording) -> CameramanResult<()> {
        let mut entries = self.entries();
        let id = recording.id();
        if entries.contains_key(&id) {
            return Err(CameramanError::DuplicateId { id: id.to_string() });
        }
        entries.insert(id, recording);
        Ok(())
    }

    pub fn get(&self, id: RecordingId) -> CameramanResult<RecordingSnapshot> {
        self.entries()
            .get(&id)
            .map(Recording::snapshot)
            .ok_or_else(|| CameramanError::unknown_recording(id))
    }

    /// Apply `f` to one recording under exclusive access.
    pub fn mutate<R>(
        &self,
        id: RecordingId,
        f: impl FnOnce(&mut Recording) -> R,
    ) -> CameramanResult<R> {
        let mut entries = self.entries();
        let recording = entries
            .get_mut(&id)
            .ok_or_else(|| CameramanError::unknown_recording(id))?;
        Ok(f(recording))
    }

    /// Recordings whose capture process is running, oldest first.
    pub fn list_ongoing(&self) -> Vec<RecordingSnapshot> {
        self.list_with_status(RecordingStatus::Running)
    }

    /// Recordings that have been stopped, oldest first.
    pub fn list_ended(&self) -> Vec<RecordingSnapshot> {
        self.list_with_status(RecordingStatus::Stopped)
    }

    /// Running and stopped recordings, read under one lock so no recording
    /// appears in both or neither.
    pub fn partition(&self) -> (Vec<RecordingSnapshot>, Vec<RecordingSnapshot>) {
        let entries = self.entries();
        let mut ongoing = Vec::new();
        let mut ended = Vec::new();
        for recording in entries.values() {
            match recording.status() {
                RecordingStatus::Running => ongoing.push(recording.snapshot()),
                RecordingStatus::Stopped => ended.push(recording.snapshot()),
                RecordingStatus::Idle => {}
            }
        }
        (ongoing, ended)
    }

    fn list_with_status(&self, status: RecordingStatus) -> Vec<RecordingSnapshot> {
        self.entries()
            .values()
            .filter(|r| r.status() == status)
            .map(Recording::snapshot)
            .collect()
    }

    /// Running recordings older than `max`, with their current length.
    /// Recordings already being stopped are skipped.
    pub fn running_longer_than(&self, max: Duration) -> Vec<(RecordingId, Duration)> {
        self.entries()
            .values()
            .filter(|r| r.status() == RecordingStatus::Running && !r.is_stopping())
            .filter_map(|r| r.elapsed().map(|elapsed| (r.id(), elapsed)))
            .filter(|(_, elapsed)| *elapsed > max)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
