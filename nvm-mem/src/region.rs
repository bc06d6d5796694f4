//! File-backed persistent memory regions.
//!
//! A [`RegionMapper`] turns `(directory, name, size)` into a [`Region`]: the
//! directory is created if needed, the file is opened and sized to exactly
//! `size` bytes, and the whole file is mapped shared and pre-faulted. The
//! region exposes the cache-line-aligned part of the mapping.
//!
//! Dropping a region unmaps it, closes the descriptor and then, under the
//! default [`TeardownPolicy::Delete`], removes the backing file.
//!
//! ```rust,no_run
//! use nvm_mem::{MemoryConfig, RegionMapper};
//!
//! let mapper = RegionMapper::new(MemoryConfig::default())?;
//! let mut region = mapper.map("/mnt/pmem0/app".as_ref(), "log", 1 << 20)?;
//!
//! region.as_mut_slice()[..5].copy_from_slice(b"hello");
//! region.flush(0, 5)?;
//! # Ok::<(), nvm_mem::MemError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io;
use std::mem::ManuallyDrop;
#[cfg(unix)]
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use nvm_osal::{FileMapping, MapOptions};

use crate::CACHE_LINE_SIZE;
use crate::cache::{CacheBackend, FlushKind, PrefetchLocality};
use crate::config::{Config, MemoryConfig, TeardownPolicy};
use crate::error::{MemError, MemResult};
use crate::naming::NameAllocator;

/// An exclusively owned, file-backed shared mapping.
///
/// `as_ptr()` is always `CACHE_LINE_SIZE`-aligned and
/// `len() == raw_len() - offset()`.
pub struct Region {
    mapping: ManuallyDrop<FileMapping>,
    path: PathBuf,
    aligned: NonNull<u8>,
    aligned_len: usize,
    backend: CacheBackend,
    teardown: TeardownPolicy,
}

// The aligned pointer points into `mapping`, which is Send + Sync.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    fn new(
        mapping: FileMapping,
        path: PathBuf,
        backend: CacheBackend,
        teardown: TeardownPolicy,
    ) -> MemResult<Self> {
        let raw = mapping.as_ptr();
        let offset = raw.align_offset(CACHE_LINE_SIZE);
        let raw_len = mapping.len();
        if offset >= raw_len {
            return Err(MemError::RegionTooSmall {
                requested: raw_len,
                minimum: CACHE_LINE_SIZE,
            });
        }

        // offset < raw_len, so the aligned pointer stays inside the mapping
        let aligned = NonNull::new(raw.wrapping_add(offset).cast_mut())
            .ok_or(MemError::RegionTooSmall {
                requested: raw_len,
                minimum: CACHE_LINE_SIZE,
            })?;

        Ok(Self {
            mapping: ManuallyDrop::new(mapping),
            path,
            aligned,
            aligned_len: raw_len - offset,
            backend,
            teardown,
        })
    }

    /// Start of the mapping as returned by the OS.
    pub fn raw_ptr(&self) -> *const u8 {
        self.mapping.as_ptr()
    }

    /// Size of the mapping, equal to the backing file's length.
    pub fn raw_len(&self) -> usize {
        self.mapping.len()
    }

    /// Cache-line-aligned start of the usable bytes.
    pub fn as_ptr(&self) -> *const u8 {
        self.aligned.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.aligned.as_ptr()
    }

    /// Usable bytes after alignment.
    pub fn len(&self) -> usize {
        self.aligned_len
    }

    pub fn is_empty(&self) -> bool {
        self.aligned_len == 0
    }

    /// Bytes skipped at the start of the mapping to reach alignment.
    pub fn offset(&self) -> usize {
        self.raw_len() - self.aligned_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    pub fn teardown(&self) -> TeardownPolicy {
        self.teardown
    }

    pub fn set_teardown(&mut self, teardown: TeardownPolicy) {
        self.teardown = teardown;
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.aligned.as_ptr(), self.aligned_len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.aligned.as_ptr(), self.aligned_len) }
    }

    fn check_range(&self, offset: usize, len: usize) -> MemResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.aligned_len => Ok(()),
            _ => Err(MemError::OutOfBounds {
                offset,
                len,
                size: self.aligned_len,
            }),
        }
    }

    /// Flush `len` bytes starting `offset` bytes into the aligned region.
    ///
    /// Once this returns the bytes have reached the persistence point.
    pub fn flush(&self, offset: usize, len: usize) -> MemResult<()> {
        self.check_range(offset, len)?;
        // widened lines stay within the mapping: the aligned start is a line
        // boundary and the mapping ends on a page boundary
        unsafe { self.backend.flush(self.as_ptr().add(offset), len) };
        Ok(())
    }

    pub fn flush_all(&self) {
        unsafe { self.backend.flush(self.as_ptr(), self.aligned_len) };
    }

    pub fn prefetch(&self, offset: usize, len: usize) -> MemResult<()> {
        self.check_range(offset, len)?;
        self.backend.prefetch(self.as_ptr().wrapping_add(offset), len);
        Ok(())
    }

    /// Streaming copy of `src` to `offset`.
    ///
    /// The stores are weakly ordered: call [`fence`](Self::fence) before
    /// relying on them and [`flush`](Self::flush) to make them durable.
    pub fn write_nt(&mut self, offset: usize, src: &[u8]) -> MemResult<()> {
        self.check_range(offset, src.len())?;
        let dst = self.as_mut_ptr();
        unsafe { self.backend.write_nt(dst.add(offset), src.as_ptr(), src.len()) };
        Ok(())
    }

    pub fn fence(&self) {
        self.backend.fence();
    }

    /// `msync` the whole mapping to the backing file.
    pub fn sync(&self) -> MemResult<()> {
        self.mapping.sync().map_err(|source| MemError::Sync {
            path: self.path.clone(),
            source,
        })
    }

    /// Unmap and close, leaving the backing file on disk.
    pub fn close_keep_file(mut self) -> PathBuf {
        self.teardown = TeardownPolicy::Keep;
        self.path.clone()
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // unmap and close before the file goes away
        unsafe { ManuallyDrop::drop(&mut self.mapping) };

        match self.teardown {
            TeardownPolicy::Delete => match fs::remove_file(&self.path) {
                Ok(()) => log::debug!("region {} unmapped and removed", self.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("region {} already removed", self.path.display());
                }
                Err(e) => log::warn!("failed to remove {}: {}", self.path.display(), e),
            },
            TeardownPolicy::Keep => {
                log::debug!("region {} unmapped, file kept", self.path.display());
            }
        }
    }
}

#[cfg(unix)]
impl AsFd for Region {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.mapping.as_fd()
    }
}

#[cfg(unix)]
impl AsRawFd for Region {
    fn as_raw_fd(&self) -> RawFd {
        self.mapping.as_raw_fd()
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("path", &self.path)
            .field("raw_ptr", &self.raw_ptr())
            .field("raw_len", &self.raw_len())
            .field("ptr", &self.as_ptr())
            .field("len", &self.aligned_len)
            .field("backend", &self.backend)
            .field("teardown", &self.teardown)
            .finish()
    }
}

// ============================================================================
// Mapper
// ============================================================================

/// Creates [`Region`]s according to a [`MemoryConfig`].
#[derive(Debug)]
pub struct RegionMapper {
    config: MemoryConfig,
    names: Option<Arc<NameAllocator>>,
    backend: CacheBackend,
}

impl RegionMapper {
    /// Validate `config` and select the cache backend it asks for.
    pub fn new(config: MemoryConfig) -> MemResult<Self> {
        config.validate()?;
        let backend =
            if config.flush == FlushKind::Auto && config.prefetch_locality == PrefetchLocality::T0
            {
                *CacheBackend::detected()
            } else {
                CacheBackend::detect(config.flush, config.prefetch_locality)
            };
        Ok(Self {
            config,
            names: None,
            backend,
        })
    }

    /// Draw unique names from `names` instead of the process-wide allocator.
    #[must_use]
    pub fn with_name_allocator(mut self, names: Arc<NameAllocator>) -> Self {
        self.names = Some(names);
        self
    }

    /// Use `backend` for regions created from now on.
    #[must_use]
    pub fn with_backend(mut self, backend: CacheBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    fn names(&self) -> &NameAllocator {
        self.names.as_deref().unwrap_or_else(|| NameAllocator::global())
    }

    /// Map `size` bytes of `dir/name`, creating the directory and file as
    /// needed. An existing file is resized to `size` and keeps its contents
    /// up to that length.
    pub fn map(&self, dir: &Path, name: &str, size: usize) -> MemResult<Region> {
        if size < CACHE_LINE_SIZE {
            return Err(MemError::RegionTooSmall {
                requested: size,
                minimum: CACHE_LINE_SIZE,
            });
        }
        validate_name(name)?;

        fs::create_dir_all(dir).map_err(|source| MemError::CreateDirectory {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(name);
        let existed = path.exists();
        let file = open_backing_file(&path)?;

        match self.map_file(file, &path, size) {
            Ok(region) => {
                log::debug!(
                    "mapped region {} ({} bytes, {} usable at +{}, {})",
                    path.display(),
                    region.raw_len(),
                    region.len(),
                    region.offset(),
                    region.backend
                );
                Ok(region)
            }
            Err(e) => {
                if !existed && let Err(rm) = fs::remove_file(&path) {
                    log::warn!("failed to clean up {}: {}", path.display(), rm);
                }
                Err(e)
            }
        }
    }

    fn map_file(&self, file: File, path: &Path, size: usize) -> MemResult<Region> {
        let len = size as u64;
        file.set_len(len).map_err(|source| MemError::ResizeFile {
            path: path.to_path_buf(),
            size: len,
            source,
        })?;

        let options = MapOptions {
            populate: self.config.populate,
        };
        let mapping = FileMapping::map(file, size, options).map_err(|source| MemError::Map {
            path: path.to_path_buf(),
            size,
            source,
        })?;

        Region::new(mapping, path.to_path_buf(), self.backend, self.config.teardown)
    }

    /// Map `size` bytes under the configured directory with a fresh
    /// `<name_prefix><index>` name.
    pub fn map_unique(&self, size: usize) -> MemResult<Region> {
        self.map_unique_in(&self.config.directory, size)
    }

    pub fn map_unique_in(&self, dir: &Path, size: usize) -> MemResult<Region> {
        let index = self.names().next_index()?;
        let name = format!("{}{}", self.config.name_prefix, index);
        self.map(dir, &name, size)
    }
}

impl Default for RegionMapper {
    fn default() -> Self {
        Self {
            config: MemoryConfig::default(),
            names: None,
            backend: *CacheBackend::detected(),
        }
    }
}

fn validate_name(name: &str) -> MemResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(MemError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn open_backing_file(path: &Path) -> MemResult<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(|source| MemError::OpenFile {
        path: path.to_path_buf(),
        source,
    })
}
