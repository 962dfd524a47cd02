//! Main Execution Loop.
//!
//! Implements the hart as a single-issue interpreter: each call to `tick()`
//! advances the simulated clock by one cycle, and — outside of interrupt
//! delivery and `WFI` stalls — fetches, decodes, and executes exactly one
//! instruction to completion before returning. There is no pipeline: a
//! load's result is visible to the very next instruction, and a taken
//! branch redirects `pc` immediately.

use super::Cpu;
use super::decode::{ExecOp, decode_operation};
use crate::common::constants::{
    COMPRESSED_INSTRUCTION_MASK, COMPRESSED_INSTRUCTION_VALUE, DEBUG_PC_END, DEBUG_PC_START,
    DELEG_MEIP_BIT, DELEG_MSIP_BIT, DELEG_MTIP_BIT, DELEG_SEIP_BIT, DELEG_SSIP_BIT, DELEG_STIP_BIT,
    HANG_DETECTION_THRESHOLD, INSTRUCTION_SIZE_16, INSTRUCTION_SIZE_32, OPCODE_MASK,
    PAGE_OFFSET_MASK, PAGE_SHIFT, STATUS_UPDATE_INTERVAL, VPN_MASK, WFI_INSTRUCTION,
};
use crate::common::{AccessType, Trap, TranslationResult, VirtAddr};
use crate::core::arch::csr;
use crate::core::arch::mode::PrivilegeMode;
use crate::core::arch::trap::TrapHandler;
use crate::core::cpu::csr::CsrAccess;
use crate::core::units::alu::Alu;
use crate::core::units::fpu::Fpu;
use crate::core::units::lsu::Lsu;
use crate::isa::abi;
use crate::isa::alu::{AluOp, AtomicOp, CsrOp, MemWidth, OpASrc, OpBSrc};
use crate::isa::privileged::opcodes as sys_ops;
use crate::isa::rv64i::{funct3, opcodes};
use crate::isa::rvc::expand::expand;

/// Bit mask to force `JALR` target addresses to 2-byte alignment.
const JALR_ALIGNMENT_MASK: u64 = !1;

impl Cpu {
    /// Advances the CPU state by one clock cycle.
    ///
    /// Checks for simulator exit conditions, derives pending interrupts from
    /// device state, delivers the highest-priority pending and enabled
    /// interrupt if any, and otherwise fetches/decodes/executes a single
    /// instruction.
    pub fn tick(&mut self) -> Result<(), String> {
        if let Some(code) = self.bus.check_exit() {
            self.exit_code = Some(code);
            return Ok(());
        }

        if self.bus.check_kernel_panic() {
            eprintln!("\n[!] Kernel panic detected - exiting simulator");
            self.exit_code = Some(1);
            return Ok(());
        }

        #[allow(clippy::absurd_extreme_comparisons)]
        if self.pc >= DEBUG_PC_START && self.pc <= DEBUG_PC_END {
            self.trace = true;
        }

        if self.pc == self.last_pc {
            self.same_pc_count += 1;
            if self.same_pc_count == HANG_DETECTION_THRESHOLD {
                let inst = if let Some((ppn, _, _, _, _)) =
                    self.mmu.dtlb.lookup((self.pc >> PAGE_SHIFT) & VPN_MASK)
                {
                    let paddr = (ppn << PAGE_SHIFT) | (self.pc & PAGE_OFFSET_MASK);
                    self.bus.bus.read_u32(paddr)
                } else {
                    0
                };

                if self.trace {
                    if inst == WFI_INSTRUCTION {
                        println!(
                            "\n[CPU] Stuck in WFI at {:#x}. Waiting for interrupt...",
                            self.pc
                        );
                    } else {
                        println!(
                            "\n[CPU] POTENTIAL HANG: Stuck at PC {:#x} (Inst: {:#010x})",
                            self.pc, inst
                        );
                    }
                }
            }
        } else {
            self.last_pc = self.pc;
            self.same_pc_count = 0;
        }

        let prev_priv = self.privilege;

        let (timer_irq, meip, seip) = self.bus.tick();

        let mut mip = self.csrs.mip;
        if timer_irq {
            mip |= csr::MIP_MTIP;
        } else {
            mip &= !csr::MIP_MTIP;
        }
        if meip {
            mip |= csr::MIP_MEIP;
        } else {
            mip &= !csr::MIP_MEIP;
        }
        if seip {
            mip |= csr::MIP_SEIP;
        } else {
            mip &= !csr::MIP_SEIP;
        }

        let mtime = self.stats.cycles / self.clint_divider;
        if self.csrs.stimecmp > 0 {
            if mtime >= self.csrs.stimecmp {
                mip |= csr::MIP_STIP;
            } else {
                mip &= !csr::MIP_STIP;
            }
        }
        self.csrs.mip = mip;

        self.stats.cycles += 1;

        if let Some(trap) = self.pending_interrupt() {
            let epc = if self.wfi_waiting { self.wfi_pc } else { self.pc };
            self.wfi_waiting = false;
            if self.trace {
                eprintln!("*  pc={:#x} INTERRUPT DETECTED: {:?}", epc, trap);
            }
            self.trap(trap, epc);
        } else if self.wfi_waiting {
            if (self.csrs.mip & self.csrs.mie) != 0 {
                self.wfi_waiting = false;
                self.pc = self.wfi_pc;
            }
        } else {
            let pc = self.pc;
            if let Err(trap) = self.step(pc) {
                if self.trace {
                    eprintln!("*  pc={:#x} TRAP: {:?}", pc, trap);
                }
                self.trap(trap, pc);
            } else {
                self.stats.instructions_retired += 1;
            }
        }

        self.regs.write(abi::REG_ZERO, 0);

        if self.trace {
            if self.privilege != prev_priv {
                println!(
                    "[CPU] Mode Switch: {} -> {} (PC={:#x})",
                    prev_priv.name(),
                    self.privilege.name(),
                    self.pc
                );
            }

            if self.stats.cycles % STATUS_UPDATE_INTERVAL == 0 {
                let mode_name = match self.privilege {
                    PrivilegeMode::Machine => "M",
                    PrivilegeMode::Supervisor => "S",
                    PrivilegeMode::User => "U",
                };
                println!(
                    "[Status] Cycles: {:>10} | PC: {:#010x} | Mode: {}",
                    self.stats.cycles, self.pc, mode_name
                );
            }
        }

        Ok(())
    }

    /// Checks pending/enabled interrupts in RISC-V standard priority order
    /// (external > software > timer, machine before supervisor), gated on
    /// delegation and the target privilege's global interrupt-enable bit.
    fn pending_interrupt(&self) -> Option<Trap> {
        let mip = self.csrs.mip;
        let mie = self.csrs.mie;
        let mstatus = self.csrs.mstatus;
        let m_global_ie = (mstatus & csr::MSTATUS_MIE) != 0;
        let s_global_ie = (mstatus & csr::MSTATUS_SIE) != 0;

        let check = |bit: u64, enable_bit: u64, deleg_bit: u64| -> Option<Trap> {
            let pending = (mip & bit) != 0;
            let enabled = (mie & enable_bit) != 0;
            if !pending || !enabled {
                return None;
            }

            let delegated = (self.csrs.mideleg & deleg_bit) != 0;
            let target_priv = if delegated {
                PrivilegeMode::Supervisor
            } else {
                PrivilegeMode::Machine
            };

            if self.privilege.to_u8() < target_priv.to_u8() {
                return Some(TrapHandler::irq_to_trap(bit));
            }
            if self.privilege == target_priv {
                if target_priv == PrivilegeMode::Machine && m_global_ie {
                    return Some(TrapHandler::irq_to_trap(bit));
                }
                if target_priv == PrivilegeMode::Supervisor && s_global_ie {
                    return Some(TrapHandler::irq_to_trap(bit));
                }
            }
            None
        };

        check(csr::MIP_MEIP, csr::MIE_MEIP, 1 << DELEG_MEIP_BIT)
            .or_else(|| check(csr::MIP_MSIP, csr::MIE_MSIP, 1 << DELEG_MSIP_BIT))
            .or_else(|| check(csr::MIP_MTIP, csr::MIE_MTIE, 1 << DELEG_MTIP_BIT))
            .or_else(|| check(csr::MIP_SEIP, csr::MIE_SEIP, 1 << DELEG_SEIP_BIT))
            .or_else(|| check(csr::MIP_SSIP, csr::MIE_SSIP, 1 << DELEG_SSIP_BIT))
            .or_else(|| check(csr::MIP_STIP, csr::MIE_STIE, 1 << DELEG_STIP_BIT))
    }

    /// Fetches, decodes, and executes the instruction at `pc` to completion.
    ///
    /// On success, `self.pc` holds the next instruction's address. On
    /// failure, `self.pc` is left unchanged so the caller can fault at `pc`.
    fn step(&mut self, pc: u64) -> Result<(), Trap> {
        let (inst, inst_size) = self.fetch(pc)?;

        if self.trace {
            eprintln!("pc={:#x} inst={:#010x}", pc, inst);
        }

        let op = decode_operation(inst, pc)?;

        if op.is_fence_i {
            self.mmu.itlb.flush();
            self.pc = pc.wrapping_add(inst_size);
            return Ok(());
        }

        if op.is_system {
            if op.is_mret {
                self.do_mret();
                return Ok(());
            }
            if op.is_sret {
                self.do_sret();
                return Ok(());
            }
            if op.is_wfi {
                let tw = (self.csrs.mstatus >> 21) & 1;
                if self.privilege == PrivilegeMode::User
                    || (self.privilege == PrivilegeMode::Supervisor && tw != 0)
                {
                    return Err(Trap::IllegalInstruction(inst));
                }
                self.wfi_waiting = true;
                self.wfi_pc = pc.wrapping_add(inst_size);
                return Ok(());
            }
            if op.is_sfence_vma {
                self.mmu.dtlb.flush();
                self.mmu.itlb.flush();
                self.pc = pc.wrapping_add(inst_size);
                return Ok(());
            }
            if inst == sys_ops::ECALL {
                if self.direct_mode {
                    let a7 = self.regs.read(abi::REG_A7);
                    let a0 = self.regs.read(abi::REG_A0);
                    if a7 == sys_ops::SYS_EXIT {
                        self.exit_code = Some(a0);
                        return Ok(());
                    } else if a0 == sys_ops::SYS_EXIT {
                        let a1 = self.regs.read(abi::REG_A1);
                        self.exit_code = Some(a1);
                        return Ok(());
                    }
                }
                return Err(match self.privilege {
                    PrivilegeMode::User => Trap::EnvironmentCallFromUMode,
                    PrivilegeMode::Supervisor => Trap::EnvironmentCallFromSMode,
                    PrivilegeMode::Machine => Trap::EnvironmentCallFromMMode,
                });
            }
            if op.csr_op != CsrOp::None {
                let access = CsrAccess::from_csr_op(op.csr_op).expect("csr_op != None");
                let src = match op.csr_op {
                    CsrOp::Rwi | CsrOp::Rsi | CsrOp::Rci => (op.rs1 as u64) & 0x1f,
                    _ => self.regs.read(op.rs1),
                };
                let old = self.csr_op(op.csr_addr, access, src);
                if op.reg_write && op.rd != 0 {
                    self.regs.write(op.rd, old);
                }
                self.pc = pc.wrapping_add(inst_size);
                return Ok(());
            }
        }

        self.execute_arith_mem_ctl(pc, inst, inst_size, &op)
    }

    /// Resolves operands, dispatches the ALU/FPU, resolves any branch/jump
    /// target, performs the memory access, and writes back the result.
    fn execute_arith_mem_ctl(
        &mut self,
        pc: u64,
        inst: u32,
        inst_size: u64,
        op: &ExecOp,
    ) -> Result<(), Trap> {
        let rs1_val = if op.rs1_fp {
            self.regs.read_f(op.rs1)
        } else {
            self.regs.read(op.rs1)
        };
        let rs2_val = if op.rs2_fp {
            self.regs.read_f(op.rs2)
        } else {
            self.regs.read(op.rs2)
        };
        let rs3_val = if op.rs3_fp { self.regs.read_f(op.rs3) } else { 0 };
        let store_data = rs2_val;

        let op_a = match op.a_src {
            OpASrc::Reg1 => rs1_val,
            OpASrc::Pc => pc,
            OpASrc::Zero => 0,
        };
        let op_b = match op.b_src {
            OpBSrc::Reg2 => rs2_val,
            OpBSrc::Imm => op.imm as u64,
            OpBSrc::Zero => 0,
        };
        let op_c = rs3_val;

        let alu_out = if matches!(
            op.alu,
            AluOp::FCvtSW | AluOp::FCvtSL | AluOp::FCvtSD | AluOp::FCvtDS | AluOp::FMvToF
        ) {
            match op.alu {
                AluOp::FCvtSW => {
                    if op.is_rv32 {
                        Fpu::box_f32((op_a as i32) as f32)
                    } else {
                        ((op_a as i32) as f64).to_bits()
                    }
                }
                AluOp::FCvtSL => {
                    if op.is_rv32 {
                        Fpu::box_f32((op_a as i64) as f32)
                    } else {
                        ((op_a as i64) as f64).to_bits()
                    }
                }
                AluOp::FCvtSD => {
                    let val_d = f64::from_bits(op_a);
                    Fpu::box_f32(val_d as f32)
                }
                AluOp::FCvtDS => {
                    let val_s = f32::from_bits(op_a as u32);
                    (val_s as f64).to_bits()
                }
                AluOp::FMvToF => {
                    if op.is_rv32 {
                        Fpu::box_f32(f32::from_bits(op_a as u32))
                    } else {
                        op_a
                    }
                }
                _ => unreachable!(),
            }
        } else {
            let is_fp_op = matches!(
                op.alu,
                AluOp::FAdd
                    | AluOp::FSub
                    | AluOp::FMul
                    | AluOp::FDiv
                    | AluOp::FSqrt
                    | AluOp::FMin
                    | AluOp::FMax
                    | AluOp::FMAdd
                    | AluOp::FMSub
                    | AluOp::FNMAdd
                    | AluOp::FNMSub
                    | AluOp::FSgnJ
                    | AluOp::FSgnJN
                    | AluOp::FSgnJX
                    | AluOp::FEq
                    | AluOp::FLt
                    | AluOp::FLe
                    | AluOp::FClass
                    | AluOp::FCvtWS
                    | AluOp::FCvtLS
                    | AluOp::FMvToX
            );

            if is_fp_op {
                Fpu::execute(op.alu, op_a, op_b, op_c, op.is_rv32)
            } else {
                Alu::execute(op.alu, op_a, op_b, op_c, op.is_rv32)
            }
        };

        let mut next_pc = pc.wrapping_add(inst_size);

        if op.branch {
            let taken = match (inst >> 12) & 0x7 {
                funct3::BEQ => op_a == op_b,
                funct3::BNE => op_a != op_b,
                funct3::BLT => (op_a as i64) < (op_b as i64),
                funct3::BGE => (op_a as i64) >= (op_b as i64),
                funct3::BLTU => op_a < op_b,
                funct3::BGEU => op_a >= op_b,
                _ => false,
            };
            if taken {
                next_pc = pc.wrapping_add(op.imm as u64);
            }
        }

        if op.jump {
            let is_jalr = (inst & OPCODE_MASK) == opcodes::OP_JALR;
            next_pc = if is_jalr {
                rs1_val.wrapping_add(op.imm as u64) & JALR_ALIGNMENT_MASK
            } else {
                pc.wrapping_add(op.imm as u64)
            };
        }

        let load_data = if op.mem_read || op.mem_write {
            self.access_memory(op, alu_out, store_data)?
        } else {
            0
        };

        let val = if op.mem_read {
            load_data
        } else if op.jump {
            pc.wrapping_add(inst_size)
        } else {
            alu_out
        };

        if op.fp_reg_write {
            self.regs.write_f(op.rd, val);
        } else if op.reg_write && op.rd != 0 {
            self.regs.write(op.rd, val);
        }

        self.pc = next_pc;
        Ok(())
    }

    /// Performs the load/store/atomic memory access for one instruction.
    ///
    /// Returns the value a load (or the old value of an AMO/LR/SC) produces;
    /// callers for pure stores ignore the result.
    fn access_memory(&mut self, op: &ExecOp, vaddr: u64, store_data: u64) -> Result<u64, Trap> {
        let align_mask = match op.width {
            MemWidth::Byte => 0,
            MemWidth::Half => 1,
            MemWidth::Word => 3,
            MemWidth::Double => 7,
            MemWidth::Nop => 0,
        };
        if (vaddr & align_mask) != 0 && self.trace {
            let would_be = if op.mem_read {
                Trap::LoadAddressMisaligned(vaddr)
            } else {
                Trap::StoreAddressMisaligned(vaddr)
            };
            eprintln!("MEM # WARNING: Ignored {:?}", would_be);
        }

        let access = if op.mem_write {
            AccessType::Write
        } else {
            AccessType::Read
        };
        let TranslationResult { paddr, trap, .. } = self.translate(VirtAddr::new(vaddr), access);
        if let Some(t) = trap {
            return Err(t);
        }

        let raw_paddr = paddr.val();
        let is_ram = raw_paddr >= self.ram_start && raw_paddr < self.ram_end;
        let ram_offset = if is_ram {
            (raw_paddr - self.ram_start) as usize
        } else {
            0
        };

        if op.atomic_op != AtomicOp::None {
            return Ok(match op.atomic_op {
                AtomicOp::Lr => {
                    let ld = match op.width {
                        MemWidth::Word => (self.bus.bus.read_u32(raw_paddr) as i32) as i64 as u64,
                        MemWidth::Double => self.bus.bus.read_u64(raw_paddr),
                        _ => 0,
                    };
                    self.load_reservation = Some(raw_paddr);
                    ld
                }
                AtomicOp::Sc => {
                    let ld = if self.load_reservation == Some(raw_paddr) {
                        match op.width {
                            MemWidth::Word => self.bus.bus.write_u32(raw_paddr, store_data as u32),
                            MemWidth::Double => self.bus.bus.write_u64(raw_paddr, store_data),
                            _ => {}
                        }
                        0
                    } else {
                        1
                    };
                    self.load_reservation = None;
                    ld
                }
                _ => {
                    let old_val = match op.width {
                        MemWidth::Word => (self.bus.bus.read_u32(raw_paddr) as i32) as i64 as u64,
                        MemWidth::Double => self.bus.bus.read_u64(raw_paddr),
                        _ => 0,
                    };
                    let new_val = Lsu::atomic_alu(op.atomic_op, old_val, store_data, op.width);
                    match op.width {
                        MemWidth::Word => self.bus.bus.write_u32(raw_paddr, new_val as u32),
                        MemWidth::Double => self.bus.bus.write_u64(raw_paddr, new_val),
                        _ => {}
                    }
                    if self.load_reservation == Some(raw_paddr) {
                        self.load_reservation = None;
                    }
                    old_val
                }
            });
        }

        if op.mem_read {
            let mut ld = if is_ram {
                // SAFETY: `is_ram` confirms raw_paddr falls within [ram_start,
                // ram_end), so `ram_offset` indexes into the allocation behind
                // `ram_ptr`; `read_unaligned` tolerates any byte alignment.
                unsafe {
                    match (op.width, op.signed_load) {
                        (MemWidth::Byte, true) => (*self.ram_ptr.add(ram_offset) as i8) as i64 as u64,
                        (MemWidth::Half, true) => {
                            ((self.ram_ptr.add(ram_offset) as *const u16).read_unaligned() as i16)
                                as i64 as u64
                        }
                        (MemWidth::Word, true) => {
                            ((self.ram_ptr.add(ram_offset) as *const u32).read_unaligned() as i32)
                                as i64 as u64
                        }
                        (MemWidth::Byte, false) => *self.ram_ptr.add(ram_offset) as u64,
                        (MemWidth::Half, false) => {
                            (self.ram_ptr.add(ram_offset) as *const u16).read_unaligned() as u64
                        }
                        (MemWidth::Word, false) => {
                            (self.ram_ptr.add(ram_offset) as *const u32).read_unaligned() as u64
                        }
                        (MemWidth::Double, _) => {
                            (self.ram_ptr.add(ram_offset) as *const u64).read_unaligned()
                        }
                        _ => 0,
                    }
                }
            } else {
                match (op.width, op.signed_load) {
                    (MemWidth::Byte, true) => (self.bus.bus.read_u8(raw_paddr) as i8) as i64 as u64,
                    (MemWidth::Half, true) => (self.bus.bus.read_u16(raw_paddr) as i16) as i64 as u64,
                    (MemWidth::Word, true) => (self.bus.bus.read_u32(raw_paddr) as i32) as i64 as u64,
                    (MemWidth::Byte, false) => self.bus.bus.read_u8(raw_paddr) as u64,
                    (MemWidth::Half, false) => self.bus.bus.read_u16(raw_paddr) as u64,
                    (MemWidth::Word, false) => self.bus.bus.read_u32(raw_paddr) as u64,
                    (MemWidth::Double, _) => self.bus.bus.read_u64(raw_paddr),
                    _ => 0,
                }
            };

            if op.fp_reg_write && matches!(op.width, MemWidth::Word) {
                ld |= 0xFFFF_FFFF_0000_0000;
            }
            return Ok(ld);
        }

        if self.load_reservation == Some(raw_paddr) {
            self.load_reservation = None;
        }

        if is_ram {
            // SAFETY: see the load path above; `write_unaligned` tolerates
            // any byte alignment within the validated RAM region.
            unsafe {
                match op.width {
                    MemWidth::Byte => *self.ram_ptr.add(ram_offset) = store_data as u8,
                    MemWidth::Half => {
                        (self.ram_ptr.add(ram_offset) as *mut u16).write_unaligned(store_data as u16)
                    }
                    MemWidth::Word => {
                        (self.ram_ptr.add(ram_offset) as *mut u32).write_unaligned(store_data as u32)
                    }
                    MemWidth::Double => {
                        (self.ram_ptr.add(ram_offset) as *mut u64).write_unaligned(store_data)
                    }
                    MemWidth::Nop => {}
                }
            }
        } else {
            match op.width {
                MemWidth::Byte => self.bus.bus.write_u8(raw_paddr, store_data as u8),
                MemWidth::Half => self.bus.bus.write_u16(raw_paddr, store_data as u16),
                MemWidth::Word => self.bus.bus.write_u32(raw_paddr, store_data as u32),
                MemWidth::Double => self.bus.bus.write_u64(raw_paddr, store_data),
                MemWidth::Nop => {}
            }
        }

        Ok(0)
    }

    /// Fetches one instruction (compressed or standard) at `pc`.
    ///
    /// Returns the expanded/raw 32-bit instruction and its encoded size (2
    /// or 4 bytes). Consults the MMU (or bypasses it in direct mode) and
    /// takes the RAM fast path when the physical address falls in simulated
    /// RAM, matching the fast path `translate`/load/store use.
    fn fetch(&mut self, pc: u64) -> Result<(u32, u64), Trap> {
        if (pc & 1) != 0 {
            return Err(Trap::InstructionAddressMisaligned(pc));
        }

        let TranslationResult { paddr, trap, .. } =
            self.translate(VirtAddr::new(pc), AccessType::Fetch);
        if let Some(t) = trap {
            return Err(t);
        }
        let phys_addr = paddr.val();

        let half_word = if phys_addr >= self.ram_start && phys_addr < self.ram_end {
            let offset = (phys_addr - self.ram_start) as usize;
            // SAFETY: `phys_addr` was checked against `[ram_start, ram_end)`.
            unsafe { (self.ram_ptr.add(offset) as *const u16).read_unaligned() }
        } else {
            self.bus.bus.read_u16(phys_addr)
        };

        let is_compressed = (half_word & COMPRESSED_INSTRUCTION_MASK) != COMPRESSED_INSTRUCTION_VALUE;

        if is_compressed {
            let expanded = expand(half_word);
            if expanded == 0 {
                return Err(Trap::IllegalInstruction(half_word as u32));
            }
            return Ok((expanded, INSTRUCTION_SIZE_16));
        }

        const UPPER_HALF_OFFSET: u64 = 2;
        const UPPER_HALF_SHIFT: u32 = 16;
        let upper_half = if phys_addr + UPPER_HALF_OFFSET >= self.ram_start
            && phys_addr + UPPER_HALF_OFFSET < self.ram_end
        {
            let offset = (phys_addr + UPPER_HALF_OFFSET - self.ram_start) as usize;
            // SAFETY: checked against `[ram_start, ram_end)` above.
            unsafe { (self.ram_ptr.add(offset) as *const u16).read_unaligned() }
        } else {
            self.bus.bus.read_u16(phys_addr + UPPER_HALF_OFFSET)
        };

        let full_inst = (upper_half as u32) << UPPER_HALF_SHIFT | (half_word as u32);
        Ok((full_inst, INSTRUCTION_SIZE_32))
    }
}
