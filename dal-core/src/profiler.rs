//! Scoped task profiler (spec §4.6), generalized from the teacher's
//! `TimingTree` (`plonky2/src/util/timing.rs`). The teacher's tree tracks a
//! single linear stack of scopes and prints it verbatim; this generalizes it
//! with named verbosity modes read once from `VERBOSE`, and with the
//! sibling-merge-at-teardown behavior spec §4.6 requires (same-name siblings
//! at the same level collapse, by max duration for threading tasks and by
//! sum otherwise).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use dal_threading::in_threading_scope;

/// Profiler verbosity, selected by the `VERBOSE` environment variable
/// (spec §6): `0=off, 1=logger, 2=tracer, 3=analyzer, 4=all, 5=debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Off,
    Logger,
    Tracer,
    Analyzer,
    All,
    Debug,
}

impl Verbosity {
    fn from_env_value(raw: &str) -> Self {
        match raw.trim().parse::<u32>() {
            Ok(0) | Err(_) => Verbosity::Off,
            Ok(1) => Verbosity::Logger,
            Ok(2) => Verbosity::Tracer,
            Ok(3) => Verbosity::Analyzer,
            Ok(4) => Verbosity::All,
            Ok(_) => Verbosity::Debug,
        }
    }

    fn current() -> Self {
        static CACHED: OnceLock<Verbosity> = OnceLock::new();
        *CACHED.get_or_init(|| {
            std::env::var("VERBOSE")
                .map(|v| Verbosity::from_env_value(&v))
                .unwrap_or(Verbosity::Off)
        })
    }

    fn logs_per_task(self) -> bool {
        matches!(self, Verbosity::Logger | Verbosity::All | Verbosity::Debug)
    }

    fn builds_tree(self) -> bool {
        !matches!(self, Verbosity::Off)
    }
}

#[derive(Debug, Clone)]
struct TaskNode {
    index: usize,
    name: String,
    level: usize,
    is_threading: bool,
    repetitions: usize,
    start: Instant,
    duration: Option<Duration>,
    children: Vec<TaskNode>,
}

impl TaskNode {
    fn is_open(&self) -> bool {
        self.duration.is_none()
    }

    fn wall_duration(&self) -> Duration {
        self.duration.unwrap_or_else(|| self.start.elapsed())
    }

    /// Finds the deepest currently-open descendant and appends a new child.
    fn push(&mut self, name: &str, level: usize, is_threading: bool, index: usize) {
        if let Some(last) = self.children.last_mut() {
            if last.is_open() {
                last.push(name, level, is_threading, index);
                return;
            }
        }
        self.children.push(TaskNode {
            index,
            name: name.to_string(),
            level,
            is_threading,
            repetitions: 1,
            start: Instant::now(),
            duration: None,
            children: Vec::new(),
        });
    }

    /// Closes the deepest open descendant.
    fn pop(&mut self) {
        if let Some(last) = self.children.last_mut() {
            if last.is_open() {
                last.pop();
                return;
            }
        }
        self.duration = Some(self.start.elapsed());
    }

    /// Collapses same-name siblings at this level, recursing into children.
    /// Threading-task groups merge by max duration; ordinary groups sum.
    fn merged_children(&self) -> Vec<TaskNode> {
        let mut merged: Vec<TaskNode> = Vec::new();
        for child in &self.children {
            if let Some(existing) = merged.iter_mut().find(|m| m.name == child.name) {
                existing.repetitions += 1;
                let child_dur = child.wall_duration();
                let existing_dur = existing.duration.unwrap_or_default();
                existing.duration = Some(if child.is_threading {
                    existing_dur.max(child_dur)
                } else {
                    existing_dur + child_dur
                });
                existing.children.extend(child.children.clone());
            } else {
                let mut clone = child.clone();
                clone.duration = Some(child.wall_duration());
                merged.push(clone);
            }
        }
        for m in &mut merged {
            m.children = TaskNode {
                children: std::mem::take(&mut m.children),
                ..m.clone()
            }
            .merged_children();
        }
        merged
    }

    fn print_into(&self, out: &mut String, depth: usize, root_duration: Duration) {
        let prefix = "  ".repeat(depth);
        let secs = self.wall_duration().as_secs_f64();
        let pct = if root_duration.as_secs_f64() > 0.0 {
            100.0 * secs / root_duration.as_secs_f64()
        } else {
            0.0
        };
        out.push_str(&format!(
            "{prefix}{} [{:.2}%] {:.6}s (x{})\n",
            self.name, pct, secs, self.repetitions
        ));
        for child in &self.children {
            child.print_into(out, depth + 1, root_duration);
        }
    }
}

/// A process-wide hierarchy of scoped tasks, rooted at construction time.
pub struct Profiler {
    verbosity: Verbosity,
    root: Mutex<TaskNode>,
    counter: AtomicUsize,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new("root")
    }
}

impl Profiler {
    pub fn new(root_name: &str) -> Self {
        Self {
            verbosity: Verbosity::current(),
            root: Mutex::new(TaskNode {
                index: 0,
                name: root_name.to_string(),
                level: 0,
                is_threading: false,
                repetitions: 1,
                start: Instant::now(),
                duration: None,
                children: Vec::new(),
            }),
            counter: AtomicUsize::new(1),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Opens a named task scope. Returns a guard that closes it on drop;
    /// dropping always records a (possibly failed) task, so traces of
    /// failed runs remain inspectable (spec §7).
    pub fn scoped_task<'p>(&'p self, name: &str) -> ScopedTask<'p> {
        let is_threading = in_threading_scope();
        if self.verbosity.builds_tree() {
            let index = self.counter.fetch_add(1, Ordering::Relaxed);
            let level = {
                let mut root = self.root.lock().unwrap();
                let level = open_depth(&root) + 1;
                root.push(name, level, is_threading, index);
                level
            };
            if self.verbosity.logs_per_task() {
                log::debug!("profiler: enter {name} (level {level}, threading={is_threading})");
            }
        }
        ScopedTask {
            profiler: self,
            name: name.to_string(),
        }
    }

    fn close_task(&self, name: &str) {
        if self.verbosity.builds_tree() {
            let mut root = self.root.lock().unwrap();
            root.pop();
            if self.verbosity.logs_per_task() {
                log::debug!("profiler: exit {name}");
            }
        }
    }

    /// Closes the root and renders the merged tree as an indented summary
    /// with percent-of-root for each node (spec §4.6, S6).
    pub fn teardown_report(&self) -> String {
        let mut root = self.root.lock().unwrap();
        while root.is_open() {
            root.pop();
        }
        let merged_children = root.merged_children();
        let root_duration = root.wall_duration();
        let mut out = String::new();
        let mut merged_root = root.clone();
        merged_root.children = merged_children;
        merged_root.print_into(&mut out, 0, root_duration);
        out
    }

    #[cfg(test)]
    fn debug_root_clone(&self) -> TaskNode {
        self.root.lock().unwrap().clone()
    }
}

fn open_depth(node: &TaskNode) -> usize {
    match node.children.last() {
        Some(last) if last.is_open() => open_depth(last),
        _ => node.level,
    }
}

/// RAII guard for a single profiler task; closes the task on drop regardless
/// of whether the body panicked or returned an error.
pub struct ScopedTask<'p> {
    profiler: &'p Profiler,
    name: String,
}

impl Drop for ScopedTask<'_> {
    fn drop(&mut self) {
        self.profiler.close_task(&self.name);
    }
}
