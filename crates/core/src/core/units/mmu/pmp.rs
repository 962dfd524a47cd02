//! Physical Memory Protection (PMP) register file.
//!
//! Full PMP enforcement (TOR/NA4/NAPOT range matching against the current
//! privilege mode) is out of scope here; this unit only backs
//! `pmpcfg0..pmpcfg15` and `pmpaddr0..pmpaddr63` with storage so that a
//! guest probing for PMP support sees all-zero registers (no regions
//! configured) instead of an illegal-instruction trap on CSR access.

/// Maximum number of PMP entries (RISC-V spec allows up to 64).
pub const PMP_COUNT: usize = 64;

/// Physical Memory Protection register file.
///
/// Every entry starts, and stays, at its reset value (`cfg = 0, addr = 0`)
/// unless the guest writes to it; no access is ever denied by this unit.
pub struct Pmp {
    cfg: [u8; PMP_COUNT],
    addr: [u64; PMP_COUNT],
}

impl Default for Pmp {
    fn default() -> Self {
        Self::new()
    }
}

impl Pmp {
    /// Creates a new PMP register file with every entry disabled.
    pub fn new() -> Self {
        Self {
            cfg: [0; PMP_COUNT],
            addr: [0; PMP_COUNT],
        }
    }

    /// Reads the configuration byte for entry `idx` (0 if out of range).
    pub fn get_cfg(&self, idx: usize) -> u8 {
        self.cfg.get(idx).copied().unwrap_or(0)
    }

    /// Writes the configuration byte for entry `idx`, unless the entry is locked.
    pub fn set_cfg(&mut self, idx: usize, cfg: u8) {
        const LOCKED: u8 = 1 << 7;
        if let Some(slot) = self.cfg.get_mut(idx) {
            if *slot & LOCKED == 0 {
                *slot = cfg;
            }
        }
    }

    /// Reads the address register for entry `idx` (0 if out of range).
    pub fn get_addr(&self, idx: usize) -> u64 {
        self.addr.get(idx).copied().unwrap_or(0)
    }

    /// Writes the address register for entry `idx`, unless the entry is locked.
    pub fn set_addr(&mut self, idx: usize, addr: u64) {
        const LOCKED: u8 = 1 << 7;
        if idx < self.cfg.len() && self.cfg[idx] & LOCKED == 0 {
            self.addr[idx] = addr;
        }
    }
}
