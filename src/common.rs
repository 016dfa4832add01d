// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use log::warn;
use std::time::Duration;

/// Moves the calling thread to the real-time FIFO scheduler.
///
/// Failure, usually for lack of privileges, is logged and otherwise ignored.
#[cfg(target_os = "linux")]
pub fn set_process_priority() {
    let mut param = libc::sched_param { sched_priority: 10 };
    let pid = unsafe { libc::pthread_self() };
    let err = unsafe {
        libc::pthread_setschedparam(pid, libc::SCHED_FIFO, &mut param as *mut libc::sched_param)
    };
    if err != 0 {
        let err = std::io::Error::from_raw_os_error(err);
        warn!("unable to set radar real-time fifo scheduler: {}", err);
    }
}

/// Moves the calling thread to the real-time FIFO scheduler.
#[cfg(not(target_os = "linux"))]
pub fn set_process_priority() {}

/// Time since boot from the raw monotonic clock.
#[cfg(target_os = "linux")]
pub fn monotonic() -> Result<Duration, std::io::Error> {
    clock(libc::CLOCK_MONOTONIC_RAW)
}

/// Time since boot from the monotonic clock.
#[cfg(not(target_os = "linux"))]
pub fn monotonic() -> Result<Duration, std::io::Error> {
    clock(libc::CLOCK_MONOTONIC)
}

fn clock(id: libc::clockid_t) -> Result<Duration, std::io::Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(id, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(Duration::new(tp.tv_sec as u64, tp.tv_nsec as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_advances() {
        let a = monotonic().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let b = monotonic().unwrap();
        assert!(b > a);
    }
}
