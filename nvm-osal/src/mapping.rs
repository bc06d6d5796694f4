//! 共享文件映射
//!
//! 将已打开的普通文件以 `MAP_SHARED` 方式映射进进程地址空间，
//! 对映射区的写入直接对底层文件可见。

use std::fs::File;
#[cfg(unix)]
use std::io;
#[cfg(unix)]
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use crate::error::{OsalError, OsalResult};

/// 映射选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOptions {
    /// 预先建立页表（`MAP_POPULATE`），避免运行时缺页
    pub populate: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self { populate: true }
    }
}

/// 可读写的共享文件映射
///
/// 拥有文件句柄。释放顺序固定：先 `munmap`，再关闭文件描述符。
pub struct FileMapping {
    ptr: *mut u8,
    len: usize,
    file: File,
}

unsafe impl Send for FileMapping {}
unsafe impl Sync for FileMapping {}

impl FileMapping {
    /// 映射 `file` 的前 `len` 字节
    ///
    /// 调用者需保证文件长度不小于 `len`，否则访问超出文件末尾的页会触发 `SIGBUS`。
    pub fn map(file: File, len: usize, options: MapOptions) -> OsalResult<Self> {
        if len == 0 {
            return Err(OsalError::InvalidLength(len));
        }

        #[cfg(unix)]
        {
            Self::map_unix(file, len, options)
        }
        #[cfg(not(unix))]
        {
            let _ = (file, options);
            Err(OsalError::Unsupported(crate::host_os()))
        }
    }

    #[cfg(unix)]
    fn map_unix(file: File, len: usize, options: MapOptions) -> OsalResult<Self> {
        use std::ptr;

        #[allow(unused_mut)]
        let mut flags = libc::MAP_SHARED;
        #[cfg(any(target_os = "linux", target_os = "android"))]
        if options.populate {
            flags |= libc::MAP_POPULATE;
        }
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        let _ = options;

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                flags,
                file.as_raw_fd(),
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(OsalError::Map {
                len,
                source: io::Error::last_os_error(),
            });
        }

        log::trace!("mapped {} bytes of fd {} at {:p}", len, file.as_raw_fd(), ptr);

        Ok(Self {
            ptr: ptr.cast::<u8>(),
            len,
            file,
        })
    }

    /// 同步写回映射区到文件（`msync(MS_SYNC)`）
    pub fn sync(&self) -> OsalResult<()> {
        #[cfg(unix)]
        {
            let ret = unsafe { libc::msync(self.ptr.cast(), self.len, libc::MS_SYNC) };
            if ret != 0 {
                return Err(OsalError::Sync {
                    len: self.len,
                    source: io::Error::last_os_error(),
                });
            }
            Ok(())
        }
        #[cfg(not(unix))]
        {
            Err(OsalError::Unsupported(crate::host_os()))
        }
    }

    /// 获取映射起始指针
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// 获取可变映射起始指针
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr
    }

    /// 映射长度
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 底层文件
    pub fn file(&self) -> &File {
        &self.file
    }
}

#[cfg(unix)]
impl AsFd for FileMapping {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

#[cfg(unix)]
impl AsRawFd for FileMapping {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl std::fmt::Debug for FileMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMapping")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl Drop for FileMapping {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            if libc::munmap(self.ptr.cast(), self.len) != 0 {
                log::warn!(
                    "munmap of {} bytes at {:p} failed: {}",
                    self.len,
                    self.ptr,
                    io::Error::last_os_error()
                );
            }
        }
        // `file` 随后被释放，关闭文件描述符
    }
}

// ============================================================================
// 测试
// ============================================================================
