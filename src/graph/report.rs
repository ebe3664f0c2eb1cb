// src/graph/report.rs

use crate::task::TaskReport;
use crate::types::TaskName;
use crate::watch::WatchSummary;

/// Outcome of a successful plan execution.
///
/// Leaf reports are kept in completion order for sequences and declaration
/// order for parallel groups. A task that appears in several branches is
/// reported once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub tasks: Vec<TaskReport>,
    /// Leaf tasks not started because fail-fast had tripped.
    pub skipped: Vec<TaskName>,
    pub watches: Vec<(TaskName, WatchSummary)>,
}

impl Report {
    pub(crate) fn from_task(report: TaskReport) -> Self {
        Self {
            tasks: vec![report],
            ..Self::default()
        }
    }

    pub(crate) fn skipped(task: impl Into<TaskName>) -> Self {
        Self {
            skipped: vec![task.into()],
            ..Self::default()
        }
    }

    pub(crate) fn watched(watcher: impl Into<TaskName>, summary: WatchSummary) -> Self {
        Self {
            watches: vec![(watcher.into(), summary)],
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: Report) {
        self.tasks.extend(other.tasks);
        self.skipped.extend(other.skipped);
        self.watches.extend(other.watches);
    }

    /// Files written by `task`, summed over all its runs.
    pub fn files_written(&self, task: &str) -> usize {
        self.tasks
            .iter()
            .filter(|r| r.task == task)
            .map(|r| r.files_written)
            .sum()
    }

    pub fn total_files_written(&self) -> usize {
        self.tasks.iter().map(|r| r.files_written).sum()
    }

    /// Whether `task` ran at least once.
    pub fn ran(&self, task: &str) -> bool {
        self.tasks.iter().any(|r| r.task == task)
    }

    /// Per-task totals, in first-seen order.
    pub fn per_task(&self) -> Vec<(&str, usize)> {
        let mut totals: Vec<(&str, usize)> = Vec::new();
        for report in &self.tasks {
            match totals.iter_mut().find(|(name, _)| *name == report.task) {
                Some((_, count)) => *count += report.files_written,
                None => totals.push((report.task.as_str(), report.files_written)),
            }
        }
        totals
    }

    /// Lines for the end-of-run summary on stdout.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .per_task()
            .into_iter()
            .map(|(task, files)| format!("{task}: {files} file(s) written"))
            .collect();

        for task in &self.skipped {
            lines.push(format!("{task}: skipped"));
        }
        for (watcher, summary) in &self.watches {
            lines.push(format!(
                "{watcher}: {} event(s), {} run(s), {} failed",
                summary.events, summary.runs, summary.failures
            ));
        }
        lines.push(format!("total: {} file(s) written", self.total_files_written()));
        lines
    }
}
