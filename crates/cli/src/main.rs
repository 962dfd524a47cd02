//! RISC-V execution core CLI front end.
//!
//! This binary parses the flat option surface described by the execution
//! core's external interfaces, builds a [`Config`], and drives the hart's
//! `tick()` loop until the guest exits or takes a fatal trap.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use riscv_core::config::Config;
use riscv_core::core::Cpu;
use riscv_core::sim::loader;
use riscv_core::soc::System;

/// Maximum number of harts this CLI will accept (single-hart core; see
/// `Cli::smp` doc).
const MAX_SMP: u32 = 1024;

#[derive(Parser, Debug)]
#[command(
    name = "sim",
    author,
    version,
    about = "RISC-V execution core",
    long_about = "Boots a bootrom or kernel image against the execution core.\n\nExamples:\n  sim boot.bin\n  sim --image Image --dtb board.dtb --mem 256M\n  sim boot.bin --rv64 --verbose"
)]
struct Cli {
    /// Bootrom binary to execute (loaded at the RAM base, PC set there).
    bootrom: PathBuf,

    /// Device tree blob; loaded into RAM alongside the kernel image, not parsed by the core.
    #[arg(long)]
    dtb: Option<PathBuf>,

    /// Kernel image; when given, boots through the kernel trampoline instead of direct mode.
    #[arg(long)]
    image: Option<PathBuf>,

    /// RAM size, e.g. `256M`, `2G`, `131072K`.
    #[arg(long)]
    mem: Option<String>,

    /// Number of harts to report to the guest. Only one hart is ever ticked.
    #[arg(long, default_value_t = 1)]
    smp: u32,

    /// Run the hart in RV64 mode (the only mode this core implements).
    #[arg(long)]
    rv64: bool,

    /// Raise the default log filter to `debug`.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.smp > MAX_SMP {
        eprintln!("error: --smp must be <= {MAX_SMP} (got {})", cli.smp);
        process::exit(1);
    }
    if cli.smp > 1 {
        tracing::warn!(
            smp = cli.smp,
            "only a single hart is simulated; extra harts are accepted but not ticked"
        );
    }
    if !cli.rv64 {
        tracing::warn!("this core only implements RV64; --rv64 is a no-op, proceeding in RV64 mode");
    }

    let mut config = Config::default();
    if let Some(mem) = cli.mem.as_deref() {
        match parse_mem_size(mem) {
            Ok(bytes) => config.memory.ram_size = bytes,
            Err(e) => {
                eprintln!("error: invalid --mem value '{mem}': {e}");
                process::exit(1);
            }
        }
    }

    let disk_path = String::new();
    let system = System::new(&config, &disk_path);
    let mut cpu = Cpu::new(system, &config);
    let ram_base = config.system.ram_base;

    tracing::info!(bootrom = %cli.bootrom.display(), "loading bootrom");
    let bootrom_data = loader::load_binary(&cli.bootrom.display().to_string());
    cpu.bus.load_binary_at(&bootrom_data, ram_base);
    cpu.pc = ram_base;

    let mut dtb_addr = 0u64;
    if let Some(dtb) = &cli.dtb {
        tracing::info!(dtb = %dtb.display(), "loading device tree blob");
        let dtb_data = loader::load_binary(&dtb.display().to_string());
        dtb_addr = ram_base + config.system.kernel_offset + 0x2000000;
        cpu.bus.load_binary_at(&dtb_data, dtb_addr);
    }

    if let Some(image) = &cli.image {
        tracing::info!(image = %image.display(), "loading kernel image");
        let image_data = loader::load_binary(&image.display().to_string());
        let kernel_addr = ram_base + config.system.kernel_offset;
        cpu.bus.load_binary_at(&image_data, kernel_addr);
        cpu.regs.write(riscv_core::isa::abi::REG_A0, 0);
        cpu.regs.write(riscv_core::isa::abi::REG_A1, dtb_addr);
        cpu.direct_mode = false;
    }

    run(cpu);
}

/// Drives the hart until it exits or takes a fatal trap.
fn run(mut cpu: Cpu) -> ! {
    loop {
        if let Err(e) = cpu.tick() {
            eprintln!("fatal trap: {e}");
            cpu.dump_state();
            process::exit(1);
        }
        if let Some(code) = cpu.take_exit() {
            process::exit(code as i32);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

/// Parses a memory size with an optional `K`/`M`/`G` suffix (binary units).
fn parse_mem_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.chars().last() {
        Some(c @ ('K' | 'k')) => (&s[..s.len() - c.len_utf8()], 1024),
        Some(c @ ('M' | 'm')) => (&s[..s.len() - c.len_utf8()], 1024 * 1024),
        Some(c @ ('G' | 'g')) => (&s[..s.len() - c.len_utf8()], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    let value: usize = digits
        .parse()
        .map_err(|_| format!("'{s}' is not a valid size"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("'{s}' overflows"))
}
