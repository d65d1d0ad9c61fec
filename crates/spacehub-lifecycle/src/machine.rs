//! Space app status machine.
//!
//! ```text
//! Init ─► Building ─┬─► BuildSuccessful ─┬─► Serving
//!                   └─► BuildFailed      └─► StartFailed
//!
//! {Serving, StartFailed, RestartFailed, BuildFailed} ─restart─► Restarted ─┬─► Serving
//!                                                                          └─► RestartFailed
//! {Serving, StartFailed, Restarted, RestartFailed, BuildFailed, BuildSuccessful} ─pause─► Paused
//! {Paused, ResumeFailed} ─resume─► Resuming ─► ResumeFailed
//! ```
//!
//! Each function takes the current status and returns the next one, or
//! `UnmatchedStatus` without side effects.

use spacehub_state::AppStatus;

use crate::error::{LifecycleError, LifecycleResult};

use AppStatus::*;

const RESTARTABLE: &[AppStatus] = &[Serving, StartFailed, RestartFailed, BuildFailed];
const PAUSABLE: &[AppStatus] = &[
    Serving,
    StartFailed,
    Restarted,
    RestartFailed,
    BuildFailed,
    BuildSuccessful,
];
const RESUMABLE: &[AppStatus] = &[Paused, ResumeFailed];

fn guard(
    operation: &'static str,
    status: AppStatus,
    allowed: &[AppStatus],
    next: AppStatus,
) -> LifecycleResult<AppStatus> {
    if allowed.contains(&status) {
        Ok(next)
    } else {
        Err(LifecycleError::UnmatchedStatus { operation, status })
    }
}

pub fn start_building(status: AppStatus) -> LifecycleResult<AppStatus> {
    guard("start building", status, &[Init], Building)
}

pub fn finish_build(status: AppStatus, success: bool) -> LifecycleResult<AppStatus> {
    let next = if success { BuildSuccessful } else { BuildFailed };
    guard("finish build", status, &[Building], next)
}

/// A deploy that reports no app URL failed to start.
pub fn start_service(status: AppStatus, has_app_url: bool) -> LifecycleResult<AppStatus> {
    let next = if has_app_url { Serving } else { StartFailed };
    guard("start service", status, &[BuildSuccessful, Restarted], next)
}

pub fn fail_restart(status: AppStatus) -> LifecycleResult<AppStatus> {
    guard("fail restart", status, &[Restarted], RestartFailed)
}

pub fn fail_resume(status: AppStatus) -> LifecycleResult<AppStatus> {
    guard("fail resume", status, &[Resuming], ResumeFailed)
}

/// User restart. An app already restarting may be restarted again only
/// once `over_time` seconds have passed since `restarted_at`.
pub fn restart(
    status: AppStatus,
    restarted_at: u64,
    now: u64,
    over_time: u64,
) -> LifecycleResult<AppStatus> {
    if status == Restarted {
        let elapsed = now.saturating_sub(restarted_at);
        if elapsed < over_time {
            return Err(LifecycleError::RestartTooSoon {
                elapsed_secs: elapsed,
                remaining_secs: over_time - elapsed,
            });
        }
        return Ok(Restarted);
    }
    guard("restart", status, RESTARTABLE, Restarted)
}

pub fn pause(status: AppStatus) -> LifecycleResult<AppStatus> {
    guard("pause", status, PAUSABLE, Paused)
}

/// User resume. A resume that has been pending for at least `over_time`
/// seconds may be requested again.
pub fn resume(
    status: AppStatus,
    resumed_at: u64,
    now: u64,
    over_time: u64,
) -> LifecycleResult<AppStatus> {
    if status == Resuming && now.saturating_sub(resumed_at) >= over_time {
        return Ok(Resuming);
    }
    guard("resume", status, RESUMABLE, Resuming)
}

/// Status an app takes after its environment changed, or `None` when it
/// must be left alone because a pause or resume is in flight.
pub fn restart_on_env_change(status: AppStatus) -> Option<AppStatus> {
    match status {
        Paused | Resuming | ResumeFailed => None,
        _ => Some(Restarted),
    }
}

/// A new build may not replace an app that is paused or resuming.
pub fn blocks_recreate(status: AppStatus) -> bool {
    matches!(status, Paused | Resuming)
}
