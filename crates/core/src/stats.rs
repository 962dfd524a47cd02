//! Simulation statistics collection and reporting.
//!
//! The execution core tracks only a monotonic cycle/time counter — enough
//! for `rdcycle`/`rdtime`/`rdinstret` and the CLINT's `mtime` derivation.
//! Per-instruction-mix, cache, and branch-prediction counters belong to a
//! cycle-accurate pipeline model this core does not implement.

use std::time::Instant;

/// Monotonic simulation statistics.
#[derive(Clone)]
pub struct SimStats {
    start_time: Instant,
    /// Total simulator cycles elapsed.
    pub cycles: u64,
    /// Number of instructions committed (retired).
    pub instructions_retired: u64,
    /// Number of traps (exceptions or interrupts) taken.
    pub traps_taken: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            instructions_retired: 0,
            traps_taken: 0,
        }
    }
}

impl SimStats {
    /// Prints summary statistics to stdout.
    pub fn print(&self) {
        let seconds = self.start_time.elapsed().as_secs_f64();
        let cyc = self.cycles.max(1);
        let ipc = self.instructions_retired as f64 / cyc as f64;
        let mips = (self.instructions_retired as f64 / seconds) / 1_000_000.0;

        println!("==========================================================");
        println!("EXECUTION STATISTICS");
        println!("==========================================================");
        println!("host_seconds             {seconds:.4} s");
        println!("sim_cycles               {}", self.cycles);
        println!("sim_insts                {}", self.instructions_retired);
        println!("sim_ipc                  {ipc:.4}");
        println!("sim_mips                 {mips:.2}");
        println!("traps_taken              {}", self.traps_taken);
        println!("==========================================================");
    }
}
