//! Simulator: owns the CPU and drives its tick loop.
//!
//! The single-issue interpreter needs no separate pipeline object — `tick()`
//! just forwards to `Cpu::tick`. This thin wrapper exists so callers (the
//! CLI, tests, embedders) have one type to construct and drive regardless
//! of how the core executes internally.

use crate::config::Config;
use crate::core::Cpu;
use crate::soc::System;

/// Top-level simulator: owns the CPU and exposes the tick/exit surface.
pub struct Simulator {
    /// CPU architectural state (registers, MMU, bus, stats).
    pub cpu: Cpu,
}

unsafe impl Send for Simulator {}
unsafe impl Sync for Simulator {}

impl Simulator {
    /// Creates a new simulator with the given system and configuration.
    pub fn new(system: System, config: &Config) -> Self {
        Self {
            cpu: Cpu::new(system, config),
        }
    }

    /// Advances the simulator by one clock cycle.
    pub fn tick(&mut self) -> Result<(), String> {
        self.cpu.tick()
    }

    /// Retrieves the exit code if the simulation has finished.
    pub fn take_exit(&mut self) -> Option<u64> {
        self.cpu.take_exit()
    }
}
