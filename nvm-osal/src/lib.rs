//! nvm-osal: 操作系统抽象层
//!
//! 为持久内存层提供跨平台的共享文件映射、内存屏障、线程亲和性与 NUMA 放置抽象

use std::sync::atomic::{Ordering, fence};

pub mod error;
pub mod mapping;
pub mod numa;

pub use error::{OsalError, OsalResult};
pub use mapping::{FileMapping, MapOptions};
pub use numa::{CpuMask, NumaNodeInfo, NumaPlacement, NumaTopology};

// ============================================================================
// 内存屏障
// ============================================================================

/// 全序内存屏障（`SeqCst`），通用后端以此代替缓存行刷新
pub fn barrier_full() {
    fence(Ordering::SeqCst);
}

// ============================================================================
// 平台检测
// ============================================================================

pub fn host_os() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        return "linux";
    }
    #[cfg(target_os = "macos")]
    {
        return "macos";
    }
    #[cfg(target_os = "windows")]
    {
        return "windows";
    }
    #[cfg(target_os = "android")]
    {
        return "android";
    }
    #[allow(unreachable_code)]
    "unknown"
}

pub fn host_arch() -> &'static str {
    #[cfg(target_arch = "x86_64")]
    {
        return "x86_64";
    }
    #[cfg(target_arch = "aarch64")]
    {
        return "aarch64";
    }
    #[cfg(target_arch = "riscv64")]
    {
        return "riscv64";
    }
    #[allow(unreachable_code)]
    "unknown"
}

/// 系统页大小
pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if let Ok(size) = usize::try_from(size)
            && size > 0
        {
            return size;
        }
    }
    4096
}

// ============================================================================
// 线程亲和性
// ============================================================================

/// 将调用线程绑定到掩码中的 CPU
///
/// 内核会与 cgroup 允许的 CPU 集合求交集；交集为空时返回错误。
#[cfg(target_os = "linux")]
pub fn set_thread_affinity(mask: &CpuMask) -> OsalResult<()> {
    let set = mask.to_cpu_set();
    let ret =
        unsafe { libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) };
    if ret != 0 {
        return Err(OsalError::Affinity(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn set_thread_affinity(_mask: &CpuMask) -> OsalResult<()> {
    Err(OsalError::Unsupported(host_os()))
}

/// 读取调用线程当前的 CPU 亲和性
#[cfg(target_os = "linux")]
pub fn thread_affinity() -> OsalResult<CpuMask> {
    let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    let ret =
        unsafe { libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set) };
    if ret != 0 {
        return Err(OsalError::Affinity(std::io::Error::last_os_error()));
    }
    Ok(CpuMask::from_cpu_set(&set))
}

#[cfg(not(target_os = "linux"))]
pub fn thread_affinity() -> OsalResult<CpuMask> {
    Err(OsalError::Unsupported(host_os()))
}

/// 调用线程当前运行的 CPU
#[cfg(target_os = "linux")]
pub fn current_cpu() -> Option<usize> {
    let cpu = unsafe { libc::sched_getcpu() };
    usize::try_from(cpu).ok()
}

#[cfg(not(target_os = "linux"))]
pub fn current_cpu() -> Option<usize> {
    None
}

// ============================================================================
// 测试
// ============================================================================
