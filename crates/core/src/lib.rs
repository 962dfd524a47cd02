//! RISC-V execution core library.
//!
//! This crate implements the interpreter core of a RISC-V system emulator:
//! 1. **Core:** single-issue hart (fetch/decode/execute loop), GPR/FPR, CSR
//!    file, and privileged trap/interrupt delivery.
//! 2. **Memory:** MMU, TLB, and page table walker for BARE/SV32/SV39/SV48/SV57.
//! 3. **ISA:** Decoding and execution for RV64I/M/A/F/D/C and privileged operations.
//! 4. **SoC:** Interconnect, RAM, and MMIO devices (UART, CLINT, PLIC, VirtIO, etc.).
//! 5. **JIT:** Block-level code-cache protocol for an optional dynamic binary translator.
//! 6. **Simulation:** `Simulator` (owns the `Cpu`), binary loader, configuration, statistics.

/// Typed atomic primitives and bit-manipulation helpers.
pub mod atomic;
/// Common types and constants (addresses, registers, traps, access types).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// CPU core (arch state, execution units, single-issue interpreter).
pub mod core;
/// Instruction set (decode, instruction, ABI, RV64I/M/A/F/D, RVC, privileged).
pub mod isa;
/// JIT code-cache protocol (block registry, link registry, dirty tracking).
pub mod jit;
/// Simulation: `Simulator`, binary loader, and kernel setup.
pub mod sim;
/// System-on-chip (builder, bus, devices, memory, traits).
pub mod soc;
/// Single-word spinlock guarding the JIT heap's shared registries.
pub mod spinlock;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from Python/JSON.
pub use crate::config::Config;
/// Main CPU type; holds architectural state, MMU, and stats.
pub use crate::core::Cpu;
/// Top-level simulator; owns the CPU and drives its tick loop.
pub use crate::sim::simulator::Simulator;
/// Top-level system (bus, memory controller, devices); construct with `System::new`.
pub use crate::soc::System;
