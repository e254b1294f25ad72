// SPDX-License-Identifier: MIT OR Apache-2.0
//! Polling change detection for pipelines and libraries.
//!
//! The tracker keeps one checkpoint: the clock time at which the previous
//! tick started. Any watched file modified after it is reloaded, and every
//! graph depending on it is reloaded and recompiled.

use crate::compiler::CompileError;
use crate::graph::GraphId;
use crate::pipeline::PipelineError;
use crate::reflection::ReflectionError;
use crate::workspace::{Workspace, WorkspaceError};
use indexmap::IndexSet;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Interval between ticks when none is configured
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Time source for checkpoints
pub trait Clock {
    /// Current time
    fn now(&self) -> SystemTime;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone, Copy)]
pub struct ManualClock {
    now: SystemTime,
}

impl ManualClock {
    /// Start at `now`
    pub fn new(now: SystemTime) -> Self {
        Self { now }
    }

    /// Jump to a time
    pub fn set(&mut self, now: SystemTime) {
        self.now = now;
    }

    /// Move forward
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.now
    }
}

/// What one tick changed
#[derive(Debug, Default)]
pub struct TickReport {
    /// Pipelines re-read from disk
    pub reloaded_pipelines: Vec<String>,
    /// Libraries reflected
    pub reflected_libraries: Vec<PathBuf>,
    /// Libraries dropped because no graph uses them
    pub evicted_libraries: Vec<PathBuf>,
    /// Graphs reloaded and recompiled
    pub updated_graphs: Vec<GraphId>,
    /// Graphs that failed to compile
    pub failed_graphs: Vec<(GraphId, CompileError)>,
    /// Delay before the next tick
    pub next_tick: Duration,
}

impl TickReport {
    /// Whether the tick changed nothing
    pub fn is_empty(&self) -> bool {
        self.reloaded_pipelines.is_empty()
            && self.reflected_libraries.is_empty()
            && self.evicted_libraries.is_empty()
            && self.updated_graphs.is_empty()
            && self.failed_graphs.is_empty()
    }
}

/// Error reloading a watched file
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A pipeline definition could not be reloaded
    #[error("Failed to reload pipeline {name:?}: {source}")]
    Pipeline {
        /// Pipeline name
        name: String,
        /// Underlying error
        #[source]
        source: PipelineError,
    },

    /// A library could not be reflected
    #[error("Failed to reflect library {path:?}: {source}")]
    Library {
        /// Library path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: ReflectionError,
    },
}

/// Polls watched files and keeps a workspace current
#[derive(Debug)]
pub struct ChangeTracker<C: Clock = SystemClock> {
    clock: C,
    checkpoint: Option<SystemTime>,
    interval: Duration,
}

impl ChangeTracker<SystemClock> {
    /// Tracker using the wall clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for ChangeTracker<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ChangeTracker<C> {
    /// Tracker using a custom clock
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            checkpoint: None,
            interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Set the tick interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Time to wait between ticks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start time of the previous tick
    pub fn checkpoint(&self) -> Option<SystemTime> {
        self.checkpoint
    }

    /// The clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The clock, mutably
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Reflect every referenced library, then reload and recompile every active graph
    pub fn setup(&mut self, workspace: &mut Workspace) -> Result<TickReport, TrackerError> {
        let (mut report, error) = self.scan(workspace, true);
        let active: Vec<GraphId> = workspace
            .graph_ids()
            .into_iter()
            .filter(|id| workspace.is_active(*id))
            .collect();
        for id in active {
            Self::reload(workspace, id, &mut report);
        }
        tracing::info!(
            "Tracker ready: {} libraries, {} graphs",
            report.reflected_libraries.len(),
            report.updated_graphs.len()
        );
        error.map_or(Ok(report), Err)
    }

    /// Reload whatever changed since the previous tick.
    ///
    /// The checkpoint advances even when a reload fails, so a broken file is
    /// reported once and retried after its next modification.
    pub fn tick(&mut self, workspace: &mut Workspace) -> Result<TickReport, TrackerError> {
        if self.checkpoint.is_none() {
            return self.setup(workspace);
        }
        let (mut report, error) = self.scan(workspace, false);

        let affected = workspace.graphs_using(&report.reloaded_pipelines, &report.reflected_libraries);
        for id in affected {
            Self::reload(workspace, id, &mut report);
        }
        if !report.is_empty() {
            tracing::debug!("Tick: {report:?}");
        }
        error.map_or(Ok(report), Err)
    }

    fn scan(&mut self, workspace: &mut Workspace, initial: bool) -> (TickReport, Option<TrackerError>) {
        let start = self.clock.now();
        let checkpoint = self.checkpoint.unwrap_or(SystemTime::UNIX_EPOCH);
        let mut report = TickReport {
            next_tick: self.interval,
            ..TickReport::default()
        };
        let mut error = None;

        if !initial {
            let names: Vec<String> = workspace.pipelines().names().map(str::to_string).collect();
            for name in names {
                if !workspace.pipelines().needs_reload(&name, checkpoint) {
                    continue;
                }
                match workspace.pipelines_mut().reload(&name) {
                    Ok(()) => report.reloaded_pipelines.push(name),
                    Err(source) => {
                        tracing::error!("Failed to reload pipeline {name:?}: {source}");
                        error.get_or_insert(TrackerError::Pipeline { name, source });
                    }
                }
            }
        }

        let referenced = workspace.referenced_libraries();
        let libraries = workspace.libraries_mut();
        report.evicted_libraries = libraries.retain(&referenced);
        for path in &referenced {
            libraries.track(path);
        }

        let mut targets: IndexSet<PathBuf> = libraries.pending().map(|p| p.to_path_buf()).collect();
        if initial {
            // Libraries broken before setup are reported like any other failure
            targets.extend(libraries.failed().map(|p| p.to_path_buf()));
        } else {
            targets.extend(libraries.stale(checkpoint));
        }
        for path in targets {
            match libraries.refresh(&path) {
                Ok(_) => report.reflected_libraries.push(path),
                Err(source) => {
                    error.get_or_insert(TrackerError::Library { path, source });
                }
            }
        }

        self.checkpoint = Some(start);
        (report, error)
    }

    fn reload(workspace: &mut Workspace, id: GraphId, report: &mut TickReport) {
        match workspace.reload_graph(id) {
            Ok(()) => report.updated_graphs.push(id),
            Err(WorkspaceError::Compile(err)) => report.failed_graphs.push((id, err)),
            Err(err) => tracing::warn!("Skipping graph {id:?}: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let mut clock = ManualClock::new(start);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), start + Duration::from_secs(5));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_checkpoint_advances_each_tick() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let mut tracker = ChangeTracker::with_clock(ManualClock::new(start));
        let mut workspace = Workspace::new();
        assert_eq!(tracker.checkpoint(), None);
        assert_eq!(tracker.interval(), DEFAULT_TICK_INTERVAL);

        let report = tracker.tick(&mut workspace).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.next_tick, DEFAULT_TICK_INTERVAL);
        assert_eq!(tracker.checkpoint(), Some(start));

        tracker.clock_mut().advance(Duration::from_secs(1));
        tracker.tick(&mut workspace).unwrap();
        assert_eq!(tracker.checkpoint(), Some(start + Duration::from_secs(1)));
    }
}
