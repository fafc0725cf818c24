// SPDX-License-Identifier: MIT

//! Mount lifecycle of a [`LittleFsVfs`].

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use flashio::prelude::*;
use log::{debug, warn};

use crate::core::errors::*;
use crate::core::path::absolute_path;
use crate::engine::{CheckReport, Lfs, LfsConfig, MountStatus};
use crate::vfs::bdev::BlockDeviceAdapter;
use crate::vfs::errno::engine_error;

pub(crate) type Engine<D> = Lfs<BlockDeviceAdapter<D>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Unmounted,
    Mounted,
    /// The device carries no filesystem yet; `format` or
    /// `mount(_, true)` will create one.
    NoFilesystemDetected,
}

/// State shared by the filesystem object and every handle it hands out.
pub(crate) struct Core<D: BlockDevice> {
    pub(crate) lfs: Engine<D>,
    pub(crate) state: MountState,
    pub(crate) cwd: String,
}

impl<D: BlockDevice> Core<D> {
    pub(crate) fn require_mounted(&self) -> VfsResult {
        ensure!(self.state == MountState::Mounted, UsageError::NotMounted);
        Ok(())
    }

    /// Runs one engine call and translates its failure.
    pub(crate) fn engine<T, F>(&mut self, f: F) -> VfsResult<T>
    where
        F: FnOnce(&mut Engine<D>) -> LfsResult<T>,
    {
        self.lfs.clear_fault();
        f(&mut self.lfs).map_err(|e| engine_error(&mut self.lfs, e))
    }

    /// Anchors `path` at the current directory.
    pub(crate) fn resolve(&self, path: &str) -> String {
        absolute_path(&self.cwd, path)
    }

    fn require_writable(&self) -> VfsResult {
        ensure!(self.lfs.storage().has_write(), UsageError::ReadOnly);
        Ok(())
    }
}

impl<D: BlockDevice> Drop for Core<D> {
    fn drop(&mut self) {
        if self.lfs.is_mounted()
            && let Err(e) = self.lfs.unmount()
        {
            warn!("teardown: unmount failed: {e}");
        }
        // the adapter detaches the device when the engine drops
    }
}

/// A mounted (or mountable) flash filesystem over a block device.
///
/// Handles returned by [`open`](Self::open) and [`ilistdir`](Self::ilistdir)
/// share the filesystem; it is torn down when the last of them and this
/// object are dropped. Single-threaded: neither this type nor its handles
/// are `Send`.
pub struct LittleFsVfs<D: BlockDevice> {
    pub(crate) core: Rc<RefCell<Core<D>>>,
}

impl<D: BlockDevice> LittleFsVfs<D> {
    /// Attaches `device` and mounts it. A blank device is not an error: the
    /// state becomes [`MountState::NoFilesystemDetected`].
    pub fn new(device: D) -> VfsResult<Self> {
        let mut lfs = Self::build_engine(device)?;
        let state = match lfs.mount() {
            Ok(MountStatus::Mounted) => MountState::Mounted,
            Ok(MountStatus::NoFilesystem) => MountState::NoFilesystemDetected,
            Err(e) => return Err(engine_error(&mut lfs, e)),
        };
        debug!("vfs: {state:?}");
        Ok(Self {
            core: Rc::new(RefCell::new(Core {
                lfs,
                state,
                cwd: String::from("/"),
            })),
        })
    }

    /// Formats `device` without mounting it.
    pub fn mkfs(device: D) -> VfsResult {
        let mut lfs = Self::build_engine(device)?;
        ensure!(lfs.storage().has_write(), UsageError::ReadOnly);
        match lfs.format() {
            Ok(()) => Ok(()),
            Err(e) => Err(engine_error(&mut lfs, e)),
        }
    }

    fn build_engine(device: D) -> VfsResult<Engine<D>> {
        let adapter = BlockDeviceAdapter::new(device)?;
        let cfg = LfsConfig::from_geometry(adapter.geometry());
        Ok(Lfs::new(cfg, adapter)?)
    }

    /// Formats with the stored configuration. The filesystem is left
    /// unmounted until the next [`mount`](Self::mount).
    pub fn format(&self) -> VfsResult {
        let mut core = self.core.borrow_mut();
        core.require_writable()?;
        let res = core.engine(|lfs| lfs.format());
        core.state = MountState::Unmounted;
        res
    }

    pub fn mount(&self, readonly: bool, format_if_missing: bool) -> VfsResult {
        let mut core = self.core.borrow_mut();
        if readonly {
            core.lfs.storage_mut().disable_write();
        }
        if core.state == MountState::NoFilesystemDetected && format_if_missing {
            debug!("mount: formatting blank device");
            core.require_writable()?;
            core.engine(|lfs| lfs.format())?;
        }
        if core.lfs.is_mounted() {
            debug!("mount: remounting");
            core.engine(|lfs| lfs.unmount())?;
        }

        let status = core.engine(|lfs| lfs.mount());
        core.state = match status {
            Ok(MountStatus::Mounted) => MountState::Mounted,
            Ok(MountStatus::NoFilesystem) => MountState::NoFilesystemDetected,
            Err(_) => MountState::Unmounted,
        };
        match status? {
            MountStatus::Mounted => Ok(()),
            MountStatus::NoFilesystem => Err(LfsError::Corrupt.into()),
        }
    }

    /// Logical unmount only: the engine stays usable until this object is
    /// dropped.
    pub fn unmount(&self) -> VfsResult {
        debug!("unmount: logical, engine kept alive");
        Ok(())
    }

    pub fn state(&self) -> MountState {
        self.core.borrow().state
    }

    pub fn config(&self) -> LfsConfig {
        *self.core.borrow().lfs.config()
    }

    pub fn is_read_only(&self) -> bool {
        !self.core.borrow().lfs.storage().has_write()
    }

    /// Runs the engine consistency checker.
    pub fn check(&self) -> VfsResult<CheckReport> {
        let mut core = self.core.borrow_mut();
        core.require_mounted()?;
        core.engine(|lfs| lfs.check())
    }
}
