//! Process-tree discovery and termination.
//!
//! Termination is best-effort: every discovered descendant gets a kill
//! attempt, processes that already exited are ignored, and nothing here
//! guarantees that zero processes leak.

use std::collections::{HashMap, HashSet};
use std::process::Child;

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

/// Take a fresh snapshot of the process table.
fn snapshot() -> System {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::everything(),
    );
    system
}

/// All descendants of `root` (excluding `root`), leaves first.
pub fn descendants(root: u32) -> Vec<u32> {
    descendants_in(&snapshot(), root)
}

fn descendants_in(system: &System, root: u32) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, process) in system.processes() {
        // Threads are listed as tasks of their process; signal processes only
        if process.thread_kind().is_some() {
            continue;
        }
        if let Some(parent) = process.parent() {
            children.entry(parent.as_u32()).or_default().push(pid.as_u32());
        }
    }

    // Parents are visited before their children, so the reversed visit
    // order puts every child ahead of its parent.
    let mut visited = Vec::new();
    let mut seen = HashSet::from([root]);
    let mut to_visit = vec![root];
    while let Some(current) = to_visit.pop() {
        for &child in children.get(&current).map(Vec::as_slice).unwrap_or_default() {
            if seen.insert(child) {
                visited.push(child);
                to_visit.push(child);
            }
        }
    }
    visited.reverse();
    visited
}

/// Kill `child` and everything it spawned.
///
/// Descendants are killed leaves-to-root, then the child itself, then (on
/// unix) the child's whole process group to catch anything spawned after the
/// snapshot. Returns the descendants that were targeted.
pub fn kill_tree(child: &mut Child) -> Vec<u32> {
    let root = child.id();
    let system = snapshot();
    let doomed = descendants_in(&system, root);

    for &pid in &doomed {
        kill_pid(&system, pid);
    }

    if let Err(e) = child.kill() {
        tracing::debug!(pid = root, error = %e, "root process already gone");
    }

    #[cfg(unix)]
    kill_group(root);

    doomed
}

#[cfg(unix)]
fn kill_pid(_system: &System, pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;

    match signal::kill(NixPid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, error = %e, "failed to kill descendant"),
    }
}

#[cfg(not(unix))]
fn kill_pid(system: &System, pid: u32) {
    if let Some(process) = system.process(Pid::from_u32(pid)) {
        if process.kill_with(sysinfo::Signal::Kill) != Some(true) {
            tracing::debug!(pid, "descendant did not accept kill");
        }
    }
}

/// Kill whatever is left in the process group led by `root`.
///
/// Used after `root` exited on its own; background processes it started
/// stay in its group unless they detached. No-op off unix.
pub fn sweep_group(root: u32) {
    #[cfg(unix)]
    kill_group(root);
    #[cfg(not(unix))]
    let _ = root;
}

/// Sweep the process group led by `pgid`.
#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid as NixPid;

    match killpg(NixPid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid, error = %e, "failed to kill process group"),
    }
}

/// Whether `pid` is running. Zombies count as gone.
pub fn is_alive(pid: u32) -> bool {
    !survivors(&[pid]).is_empty()
}

/// The subset of `pids` still running.
pub fn survivors(pids: &[u32]) -> Vec<u32> {
    if pids.is_empty() {
        return Vec::new();
    }
    let targets: Vec<Pid> = pids.iter().map(|&p| Pid::from_u32(p)).collect();
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&targets),
        true,
        ProcessRefreshKind::everything(),
    );
    pids.iter()
        .copied()
        .filter(|&pid| {
            system
                .process(Pid::from_u32(pid))
                .map(|p| p.status() != ProcessStatus::Zombie)
                .unwrap_or(false)
        })
        .collect()
}
