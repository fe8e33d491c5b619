// SPDX-License-Identifier: AGPL-3.0-only

//! Shared helpers for integration tests

#![allow(dead_code)]

use systolic_driver::{BackendType, RegisterBackend, Result, SoftwareBackend};

/// One register access as seen on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(usize),
    Write(usize, u64),
}

/// Software accelerator that also records every access in order
#[derive(Debug, Default)]
pub struct Recording {
    pub inner: SoftwareBackend,
    pub log: Vec<Access>,
}

impl RegisterBackend for Recording {
    fn read(&mut self, address: usize) -> Result<u64> {
        let value = self.inner.read(address)?;
        self.log.push(Access::Read(address));
        Ok(value)
    }

    fn write(&mut self, address: usize, word: u64) -> Result<()> {
        self.inner.write(address, word)?;
        self.log.push(Access::Write(address, word));
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        self.inner.backend_type()
    }
}
