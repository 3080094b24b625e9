//! スケジューリング設定（Linux のみ）
//!
//! 失敗してもループは続ける。権限不足（CAP_SYS_NICE なし）はよくあるため警告に留める。

use std::io;

/// 優先度と CPU 固定を適用する
pub fn apply(realtime_priority: i32, core_affinity: &[usize]) {
    if realtime_priority > 0 {
        match set_realtime_priority(realtime_priority) {
            Ok(()) => log::info!("Realtime priority set: SCHED_FIFO {realtime_priority}"),
            Err(e) => log::warn!("Failed to set realtime priority {realtime_priority}: {e}"),
        }
    }
    if !core_affinity.is_empty() {
        match set_core_affinity(core_affinity) {
            Ok(()) => log::info!("Pinned to cores {core_affinity:?}"),
            Err(e) => log::warn!("Failed to set core affinity {core_affinity:?}: {e}"),
        }
    }
}

#[cfg(target_os = "linux")]
fn set_realtime_priority(priority: i32) -> io::Result<()> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn set_core_affinity(cores: &[usize]) -> io::Result<()> {
    let max_cpus = 8 * std::mem::size_of::<libc::cpu_set_t>();
    if let Some(&bad) = cores.iter().find(|&&c| c >= max_cpus) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("core {bad} exceeds cpu_set_t capacity {max_cpus}"),
        ));
    }

    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        for &core in cores {
            libc::CPU_SET(core, &mut set);
        }
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_realtime_priority(_priority: i32) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "realtime priority is Linux only"))
}

#[cfg(not(target_os = "linux"))]
fn set_core_affinity(_cores: &[usize]) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "core affinity is Linux only"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_when_unset() {
        // 何も設定しなければ何もしない（パニックしない）
        apply(0, &[]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_out_of_range_core() {
        let err = set_core_affinity(&[1 << 20]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
