// SPDX-License-Identifier: AGPL-3.0-only

//! Memory-mapped register backend
//!
//! Maps one PCIe BAR of the FPGA card through its sysfs `resource<N>` file
//! and performs volatile 64-bit register accesses on it.
//!
//! The resource file is held under an exclusive, non-blocking `flock` for the
//! lifetime of the backend: a second process opening the same card sees
//! `DeviceBusy` instead of interleaving register traffic with ours.

use crate::backend::{BackendType, RegisterBackend};
use crate::error::{AccelError, Result};
use rustix::fs::{flock, FlockOperation};
use rustix::io::Errno;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::Path;
use std::ptr::NonNull;
use systolic_chip::regs::{WINDOW_SIZE, WORD_BYTES};

/// Memory-mapped accelerator register window
#[derive(Debug)]
pub struct MmioBackend {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    pcie_address: String,
    bar_index: usize,
}

impl MmioBackend {
    /// Map BAR `bar_index` of the function at `device_dir`
    /// (`/sys/bus/pci/devices/<pcie_address>`).
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The resource file cannot be opened (`DriverMissing` when absent)
    /// - Another process holds the card (`DeviceBusy`)
    /// - The BAR is smaller than the register window
    /// - mmap fails
    pub fn open(device_dir: &Path, pcie_address: &str, bar_index: usize) -> Result<Self> {
        let path = device_dir.join(format!("resource{bar_index}"));

        tracing::debug!("Mapping PCIe BAR: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AccelError::driver_missing(format!(
                    "{} does not exist; is the card enabled?",
                    path.display()
                )),
                _ => AccelError::from(e),
            })?;

        match flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => {}
            Err(e) if e == Errno::WOULDBLOCK => {
                tracing::debug!("{pcie_address} is locked by another process");
                return Err(AccelError::device_busy(pcie_address));
            }
            Err(e) => return Err(AccelError::from(std::io::Error::from(e))),
        }

        // Truncation acceptable: BAR sizes fit in usize on 64-bit (our only target)
        #[allow(clippy::cast_possible_truncation)]
        let size = file.metadata()?.len() as usize;

        if size < WINDOW_SIZE {
            return Err(AccelError::from(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "BAR{bar_index} of {pcie_address} is {size:#x} bytes, \
                     register window needs {WINDOW_SIZE:#x}"
                ),
            )));
        }

        // SAFETY: mmap is unsafe but all preconditions hold:
        // - The fd is valid (just opened) and kept open in `_file` for the mapping's lifetime
        // - size is non-zero (checked against WINDOW_SIZE above)
        // - PROT_READ|PROT_WRITE with MAP_SHARED so writes reach the device
        // - offset 0 is the start of the BAR
        // - The mapping is released exactly once in Drop
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| AccelError::from(std::io::Error::from(e)))?;

        let ptr = NonNull::new(addr.cast::<u8>()).ok_or_else(|| {
            AccelError::from(std::io::Error::other("mmap returned a null mapping"))
        })?;

        tracing::info!("Mapped BAR{bar_index} for {pcie_address} ({size:#x} bytes at {ptr:p})");

        Ok(Self {
            ptr,
            size,
            _file: file,
            pcie_address: pcie_address.to_string(),
            bar_index,
        })
    }

    /// Get PCIe address
    #[must_use]
    pub fn pcie_address(&self) -> &str {
        &self.pcie_address
    }

    /// Get BAR index
    #[must_use]
    pub const fn bar_index(&self) -> usize {
        self.bar_index
    }

    /// Get mapped size
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    fn check(&self, address: usize) -> std::result::Result<(), String> {
        if address % WORD_BYTES != 0 {
            return Err(format!("misaligned (registers are {WORD_BYTES}-byte aligned)"));
        }
        if address.checked_add(WORD_BYTES).map_or(true, |end| end > self.size) {
            return Err(format!("out of bounds (BAR size {:#x})", self.size));
        }
        Ok(())
    }
}

impl RegisterBackend for MmioBackend {
    fn read(&mut self, address: usize) -> Result<u64> {
        self.check(address)
            .map_err(|reason| AccelError::read_failed(address, reason))?;

        // SAFETY: Volatile read from a memory-mapped device register.
        // - Bounds and 8-byte alignment validated by `check` above
        // - ptr comes from a successful mmap and stays valid until Drop
        // - read_volatile: the device may change the value between reads
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(address).cast::<u64>().read_volatile() };

        tracing::trace!("read  @ {address:#05x} = {value:#018x}");
        Ok(value)
    }

    fn write(&mut self, address: usize, word: u64) -> Result<()> {
        self.check(address)
            .map_err(|reason| AccelError::write_failed(address, reason))?;

        tracing::trace!("write @ {address:#05x} = {word:#018x}");

        // SAFETY: Volatile write to a memory-mapped device register.
        // - Bounds and 8-byte alignment validated by `check` above
        // - ptr comes from a successful mmap and stays valid until Drop
        // - write_volatile: writes have device side effects (the trigger
        //   starts a compute pass) and must not be elided or reordered
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(address).cast::<u64>().write_volatile(word);
        }
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Mmio
    }
}

impl Drop for MmioBackend {
    fn drop(&mut self) {
        tracing::info!("Closing accelerator {} (BAR{})", self.pcie_address, self.bar_index);

        // SAFETY: self.ptr/self.size are exactly what mmap returned in open();
        // Drop runs once, so the region is unmapped once. The flock is released
        // when `_file` closes right after.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: MmioBackend owns its mapping exclusively; moving it to another
// thread does not invalidate the mapping. All access goes through &mut self.
unsafe impl Send for MmioBackend {}

#[cfg(test)]
mod tests {
    use super::*;
    use systolic_chip::regs;

    // A regular file stands in for the BAR resource: MAP_SHARED over a file
    // and flock behave the same way for our purposes.
    fn fake_device(size: u64) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let file = File::create(dir.path().join("resource0")).unwrap();
        file.set_len(size).unwrap();
        dir
    }

    #[test]
    fn write_then_read_through_mapping() {
        let dir = fake_device(0x1000);
        let mut bar = MmioBackend::open(dir.path(), "0000:3b:00.1", 0).unwrap();
        bar.write(regs::USER_REG, 0xDEAD_BEEF_0123_4567).unwrap();
        bar.write(regs::c_row_high(7), u64::MAX).unwrap();
        assert_eq!(bar.read(regs::USER_REG).unwrap(), 0xDEAD_BEEF_0123_4567);
        assert_eq!(bar.read(regs::c_row_high(7)).unwrap(), u64::MAX);
        assert_eq!(bar.backend_type(), BackendType::Mmio);
    }

    #[test]
    fn misaligned_and_out_of_bounds_accesses_fail() {
        let dir = fake_device(0x1000);
        let mut bar = MmioBackend::open(dir.path(), "0000:3b:00.1", 0).unwrap();
        assert!(matches!(
            bar.read(0x104),
            Err(AccelError::RegisterAccess {
                op: "read",
                address: 0x104,
                ..
            })
        ));
        assert!(matches!(
            bar.write(0x1000, 1),
            Err(AccelError::RegisterAccess { op: "write", .. })
        ));
    }

    #[test]
    fn second_open_reports_busy() {
        let dir = fake_device(0x1000);
        let _held = MmioBackend::open(dir.path(), "0000:3b:00.1", 0).unwrap();
        let second = MmioBackend::open(dir.path(), "0000:3b:00.1", 0);
        assert!(matches!(second, Err(AccelError::DeviceBusy { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = fake_device(0x1000);
        drop(MmioBackend::open(dir.path(), "0000:3b:00.1", 0).unwrap());
        assert!(MmioBackend::open(dir.path(), "0000:3b:00.1", 0).is_ok());
    }

    #[test]
    fn missing_resource_is_driver_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = MmioBackend::open(dir.path(), "0000:3b:00.1", 0).unwrap_err();
        assert!(matches!(err, AccelError::DriverMissing { .. }));
    }

    #[test]
    fn undersized_bar_rejected() {
        let dir = fake_device(0x100);
        assert!(MmioBackend::open(dir.path(), "0000:3b:00.1", 0).is_err());
    }
}
