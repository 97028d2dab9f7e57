// src/surface.rs

//! The shared pixel surface: one XRGB8888 raster in an anonymous shared
//! memory object that the compositor maps through the exported descriptor.
//!
//! The mapping is sized to a whole number of pages; only the first
//! `stride * height` bytes hold pixels. Writes outside the raster are
//! clipped and counted rather than reported as errors.

use crate::error::DisplayError;
use log::{debug, trace};
use std::ffi::{c_void, CString};
use std::io;
use std::os::fd::{AsFd, BorrowedFd, FromRawFd, OwnedFd};
use std::os::unix::io::AsRawFd;

const BYTES_PER_PIXEL: u32 = 4;

/// Owns an `mmap`ed region. Unmapped on drop.
struct ShmMap {
    ptr: *mut u8,
    len: usize,
}

impl Drop for ShmMap {
    fn drop(&mut self) {
        if !self.ptr.is_null() && self.len > 0 {
            unsafe { libc::munmap(self.ptr as *mut c_void, self.len) };
        }
    }
}

pub struct PixelSurface {
    width: u32,
    height: u32,
    stride: u32,
    request_size: usize,
    map: Option<ShmMap>,
    fd: Option<OwnedFd>,
    clipped: u64,
}

impl PixelSurface {
    /// Creates the shared memory object, sizes it to `stride * height`
    /// rounded up to the page size, and maps it read/write.
    ///
    /// Sizes the compositor protocol cannot express (anything past
    /// `i32::MAX`) are rejected before any memory is touched.
    pub fn allocate(width: u32, height: u32) -> Result<Self, DisplayError> {
        let stride = width
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or_else(|| DisplayError::Allocation(format!("width {} overflows stride", width)))?;
        let request_size = (stride as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| DisplayError::Allocation(format!("{}x{} overflows", width, height)))?;
        let limit = i32::MAX as usize;
        if request_size > limit || stride as usize > limit || height as usize > limit {
            return Err(DisplayError::Allocation(format!(
                "{}x{} ({} bytes) exceeds the shm pool limit",
                width, height, request_size
            )));
        }
        let alloc_size = round_to_page(request_size)?;

        let fd = create_memfd(alloc_size)
            .map_err(|e| DisplayError::Allocation(format!("shared memory object: {}", e)))?;

        let ptr = if alloc_size == 0 {
            std::ptr::null_mut()
        } else {
            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    alloc_size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    fd.as_raw_fd(),
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                return Err(DisplayError::Allocation(format!(
                    "mmap of {} bytes: {}",
                    alloc_size,
                    io::Error::last_os_error()
                )));
            }
            ptr as *mut u8
        };

        debug!(
            "PixelSurface: {}x{} stride {} ({} bytes requested, {} mapped)",
            width, height, stride, request_size, alloc_size
        );

        Ok(Self {
            width,
            height,
            stride,
            request_size,
            map: Some(ShmMap { ptr, len: alloc_size }),
            fd: Some(fd),
            clipped: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Bytes holding pixel rows (`stride * height`), as shared with the compositor.
    pub fn request_size(&self) -> usize {
        self.request_size
    }

    /// Length of the page-rounded mapping; zero once released.
    pub fn alloc_size(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len)
    }

    /// Descriptor the compositor maps to see the same bytes.
    pub fn fd(&self) -> Option<BorrowedFd<'_>> {
        self.fd.as_ref().map(|fd| fd.as_fd())
    }

    pub fn is_released(&self) -> bool {
        self.map.is_none() && self.fd.is_none()
    }

    /// Number of pixel writes discarded by clipping.
    pub fn clipped_count(&self) -> u64 {
        self.clipped
    }

    /// The pixel rows. Empty once released.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.map {
            Some(m) if !m.ptr.is_null() => unsafe {
                std::slice::from_raw_parts(m.ptr, self.request_size)
            },
            _ => &[],
        }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        match &self.map {
            Some(m) if !m.ptr.is_null() => unsafe {
                std::slice::from_raw_parts_mut(m.ptr, self.request_size)
            },
            _ => &mut [],
        }
    }

    /// Sets every byte of the raster, the padding channel included.
    pub fn fill(&mut self, value: u8) {
        self.as_bytes_mut().fill(value);
    }

    /// Writes one pixel in memory order B, G, R, X. Out-of-range coordinates
    /// are dropped and counted.
    pub fn set_pixel(&mut self, x: u32, y: u32, bgra: [u8; 4]) {
        if x >= self.width || y >= self.height {
            trace!("Clipped pixel: {},{}", x, y);
            self.clipped += 1;
            return;
        }
        let offset = y as usize * self.stride as usize + x as usize * BYTES_PER_PIXEL as usize;
        let bytes = self.as_bytes_mut();
        if let Some(dst) = bytes.get_mut(offset..offset + 4) {
            dst.copy_from_slice(&bgra);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride as usize + x as usize * BYTES_PER_PIXEL as usize;
        let px = self.as_bytes().get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Unmaps and closes the backing object. Calling it again is a no-op.
    pub fn release(&mut self) {
        if self.is_released() {
            return;
        }
        self.map.take();
        self.fd.take();
        debug!("PixelSurface: released");
    }
}

impl Drop for PixelSurface {
    fn drop(&mut self) {
        self.release();
    }
}

fn round_to_page(size: usize) -> Result<usize, DisplayError> {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page <= 0 {
        return Err(DisplayError::Allocation(format!(
            "sysconf(_SC_PAGESIZE): {}",
            io::Error::last_os_error()
        )));
    }
    let page = page as usize;
    let slop = size % page;
    if slop == 0 {
        Ok(size)
    } else {
        size.checked_add(page - slop)
            .ok_or_else(|| DisplayError::Allocation(format!("{} bytes overflows page rounding", size)))
    }
}

fn create_memfd(size: usize) -> io::Result<OwnedFd> {
    let name = CString::new("pictureframe-shm")
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let fd = unsafe { libc::memfd_create(name.as_ptr(), libc::MFD_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    if unsafe { libc::ftruncate(owned.as_raw_fd(), size as libc::off_t) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn it_should_round_the_mapping_up_to_whole_pages() {
        let surface = PixelSurface::allocate(100, 50).unwrap();
        let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        assert_eq!(surface.stride(), 400);
        assert_eq!(surface.request_size(), 400 * 50);
        assert!(surface.alloc_size() >= surface.request_size());
        assert_eq!(surface.alloc_size() % page, 0);
        assert!(surface.fd().is_some());
    }

    #[test]
    fn it_should_write_pixels_at_stride_offsets() {
        let mut surface = PixelSurface::allocate(16, 8).unwrap();
        surface.fill(0);
        surface.set_pixel(3, 2, [1, 2, 3, 4]);
        let offset = 2 * 64 + 3 * 4;
        assert_eq!(&surface.as_bytes()[offset..offset + 4], &[1, 2, 3, 4]);
        assert_eq!(surface.pixel(3, 2), Some([1, 2, 3, 4]));
        assert_eq!(surface.clipped_count(), 0);
    }

    #[test]
    fn it_should_discard_and_count_writes_past_the_right_edge() {
        let mut surface = PixelSurface::allocate(100, 50).unwrap();
        surface.fill(128);
        let before = surface.as_bytes().to_vec();

        surface.set_pixel(100, 0, [0xff; 4]);

        assert_eq!(surface.as_bytes(), &before[..]);
        assert_eq!(surface.clipped_count(), 1);
    }

    #[test]
    fn it_should_leave_the_buffer_unchanged_for_any_out_of_range_write() {
        let mut surface = PixelSurface::allocate(10, 6).unwrap();
        surface.fill(7);
        let before = surface.as_bytes().to_vec();

        let outside = [(10, 0), (0, 6), (10, 6), (u32::MAX, 3), (4, u32::MAX), (57, 91)];
        for (x, y) in outside {
            surface.set_pixel(x, y, [0xaa; 4]);
        }

        assert_eq!(surface.as_bytes(), &before[..]);
        assert_eq!(surface.clipped_count(), outside.len() as u64);
    }

    #[test]
    fn it_should_reject_sizes_the_shm_pool_cannot_describe() {
        // 80000-byte stride times 30000 rows is past i32::MAX.
        let err = PixelSurface::allocate(20_000, 30_000).err().unwrap();
        assert!(matches!(err, DisplayError::Allocation(_)));

        let err = PixelSurface::allocate(1 << 29, 1).err().unwrap();
        assert!(matches!(err, DisplayError::Allocation(_)));

        assert!(PixelSurface::allocate(0, u32::MAX).is_err());
    }

    #[test]
    fn it_should_tolerate_repeated_release() {
        let mut surface = PixelSurface::allocate(4, 4).unwrap();
        surface.release();
        assert!(surface.is_released());
        assert_eq!(surface.alloc_size(), 0);
        assert!(surface.as_bytes().is_empty());

        surface.release();
        surface.set_pixel(0, 0, [1; 4]);
        assert!(surface.fd().is_none());
    }
}
