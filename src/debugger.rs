/// Debugger facade.
///
/// The single entry point a controller (UI, script, remote protocol
/// client) talks to. Exactly two actors share this state: the execution
/// thread, which owns stepping and mutates emulated state, and client
/// callers issuing synchronous requests. Mutual exclusion for the
/// halted-only operations comes from the execution thread being parked,
/// not from a lock; the `HaltToken` parameter turns that contract into
/// something the signature demands instead of a comment.

use std::sync::Arc;

use log::debug;

use crate::breakpoint::{AccessKind, Breakpoint, BreakpointRegistry, SetBreakpointError, Trigger};
use crate::cpu::{Cpu, Mode, RegisterError, LR_REG, PC_REG};
use crate::disasm::{Disassembler, DisasmWindow, DisassemblyLine};
use crate::memory::{self, MemoryMap};
use crate::mmu::{self, L1Entry, L2Entry, TranslationFault};
use crate::peek::Peripherals;

/// Proof that the execution thread is parked.
///
/// Issued by the execution loop when it stops advancing (breakpoint hit,
/// explicit pause, or never started) and dropped before it resumes.
/// Constructing one while the core is running voids the concurrency
/// contract; that misuse is documented, not defended.
pub struct HaltToken {
    _priv: (),
}

impl HaltToken {
    pub fn issue() -> Self {
        Self { _priv: () }
    }
}

pub struct Debugger<D> {
    cpu: Cpu,
    mem: MemoryMap,
    periph: Arc<Peripherals>,
    breakpoints: BreakpointRegistry,
    window: DisasmWindow<D>,
}

impl<D: Disassembler> Debugger<D> {
    pub fn new(mem: MemoryMap, periph: Arc<Peripherals>, disasm: D) -> Self {
        Self {
            cpu: Cpu::new(),
            mem,
            periph,
            breakpoints: BreakpointRegistry::new(),
            window: DisasmWindow::new(disasm),
        }
    }

    // -- Execution loop side --------------------------------------------

    /// Instruction-fetch check; called by the loop on every fetch.
    pub fn check_exec(&mut self, addr: u32) -> Option<Trigger> {
        let (bps, cpu, mem) = (&mut self.breakpoints, &self.cpu, &self.mem);
        bps.check_exec(addr, cpu, mem)
    }

    /// Data-access check; called by the loop on every load/store that can
    /// be watched.
    pub fn check_access(&mut self, addr: u32, len: u32, kind: AccessKind) -> Option<Trigger> {
        let (bps, cpu, mem) = (&mut self.breakpoints, &self.cpu, &self.mem);
        bps.check_access(addr, len, kind, cpu, mem)
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn mem_mut(&mut self) -> &mut MemoryMap {
        &mut self.mem
    }

    // -- Execution state (halted only) ----------------------------------

    pub fn get_registers(&self, _halt: &HaltToken) -> ([u32; 16], u32, Option<u32>) {
        self.cpu.get_registers()
    }

    pub fn set_register(&mut self, _halt: &HaltToken, n: usize, value: u32) -> Result<(), RegisterError> {
        self.cpu.set_register(n, value)?;
        if n == PC_REG {
            self.window.invalidate();
        }
        Ok(())
    }

    pub fn set_cpsr(&mut self, _halt: &HaltToken, value: u32) -> Result<(), RegisterError> {
        self.cpu.set_cpsr(value)?;
        self.window.invalidate();
        Ok(())
    }

    pub fn is_thumb_mode(&self, _halt: &HaltToken) -> bool {
        self.cpu.is_thumb_mode()
    }

    pub fn get_banked_registers(&self, _halt: &HaltToken, mode: Mode) -> ([u32; 16], Option<u32>) {
        self.cpu.get_banked_registers(mode)
    }

    pub fn get_cp15(&self, _halt: &HaltToken) -> [u32; 6] {
        self.cpu.get_cp15()
    }

    // -- Memory gateway -------------------------------------------------

    /// Virtual-path read; fewer bytes than requested when part of the
    /// range is unmapped.
    pub fn read_virtual(&self, _halt: &HaltToken, vaddr: u32, buf: &mut [u8]) -> usize {
        memory::read_virtual(self.cpu.cp15(), &self.mem, vaddr, buf)
    }

    pub fn write_virtual(&mut self, _halt: &HaltToken, vaddr: u32, data: &[u8]) -> usize {
        let n = memory::write_virtual(self.cpu.cp15(), &mut self.mem, vaddr, data);
        if n > 0 {
            self.window.invalidate();
        }
        n
    }

    /// Physical-path read; callable at any time.
    pub fn read_physical(&self, paddr: u32, buf: &mut [u8]) -> usize {
        self.mem.read_physical(paddr, buf)
    }

    pub fn write_physical(&mut self, paddr: u32, data: &[u8]) -> usize {
        let n = self.mem.write_physical(paddr, data);
        if n > 0 {
            self.window.invalidate();
        }
        n
    }

    /// Peripheral register peek; callable at any time, no side effects.
    pub fn peek_register(&self, paddr: u32) -> Option<u32> {
        self.periph.peek_register(paddr)
    }

    pub fn search(&self, start: u32, length: u32, pattern: &[u8]) -> Option<u32> {
        self.mem.search(start, length, pattern)
    }

    pub fn search_all(&self, start: u32, length: u32, pattern: &[u8], max_matches: usize) -> Vec<u32> {
        self.mem.search_all(start, length, pattern, max_matches)
    }

    // -- MMU ------------------------------------------------------------

    pub fn translate(&self, _halt: &HaltToken, va: u32) -> Result<u32, TranslationFault> {
        mmu::translate(self.cpu.cp15(), &self.mem, va)
    }

    pub fn walk_l1(&self, _halt: &HaltToken) -> Vec<L1Entry> {
        mmu::walk_l1(self.cpu.cp15(), &self.mem)
    }

    pub fn walk_l2(&self, _halt: &HaltToken, l1: &L1Entry) -> Vec<L2Entry> {
        mmu::walk_l2(&self.mem, l1)
    }

    // -- Breakpoints (mutations halted only) -----------------------------

    pub fn list_breakpoints(&self, max: usize) -> Vec<Breakpoint> {
        self.breakpoints.list(max)
    }

    /// Set or update breakpoint flags at `addr`. The address must resolve
    /// (through the MMU when enabled) into a RAM region; ROM and MMIO
    /// targets are rejected and the registry is left unchanged.
    pub fn set_breakpoint(
        &mut self,
        _halt: &HaltToken,
        addr: u32,
        exec: bool,
        read: bool,
        write: bool,
    ) -> Result<(), SetBreakpointError> {
        self.resolve_ram(addr)?;
        self.breakpoints.set(addr, exec, read, write)?;
        // Cached lines carry breakpoint flags.
        self.window.invalidate();
        Ok(())
    }

    pub fn clear_breakpoint(&mut self, _halt: &HaltToken, addr: u32) {
        self.breakpoints.clear(addr);
        self.window.invalidate();
    }

    pub fn clear_all_breakpoints(&mut self, _halt: &HaltToken) {
        self.breakpoints.clear_all();
        self.window.invalidate();
    }

    pub fn set_breakpoint_enabled(&mut self, _halt: &HaltToken, addr: u32, enabled: bool) -> Result<(), SetBreakpointError> {
        self.breakpoints.set_enabled(addr, enabled)?;
        self.window.invalidate();
        Ok(())
    }

    pub fn set_breakpoint_size(&mut self, _halt: &HaltToken, addr: u32, size: u32) -> Result<(), SetBreakpointError> {
        self.breakpoints.set_size(addr, size)
    }

    pub fn set_breakpoint_condition(&mut self, _halt: &HaltToken, addr: u32, text: &str) -> Result<(), SetBreakpointError> {
        self.breakpoints.set_condition(addr, text)
    }

    pub fn breakpoint_condition(&self, addr: u32) -> &str {
        self.breakpoints.condition_text(addr)
    }

    pub fn reset_hit_count(&mut self, _halt: &HaltToken, addr: u32) -> Result<(), SetBreakpointError> {
        self.breakpoints.reset_hit_count(addr)
    }

    /// Arm a one-shot exec trap at the current LR ("finish"/step-out).
    /// Silently does nothing when LR does not point into RAM, matching the
    /// best-effort probe ethos.
    pub fn step_out(&mut self, _halt: &HaltToken) {
        let lr = self.cpu.read_reg(LR_REG);
        if self.resolve_ram(lr).is_ok() {
            debug!("step-out trap armed at {:08X}", lr);
            self.breakpoints.set_step_out(lr);
        }
    }

    // -- Disassembly ----------------------------------------------------

    /// A window of `count` lines starting at `start`; shorter when memory
    /// runs out. Repeated calls with the same start address are served
    /// from the cache.
    pub fn disassemble(&mut self, _halt: &HaltToken, start: u32, count: usize) -> &[DisassemblyLine] {
        let thumb = self.cpu.is_thumb_mode();
        let pc = self.cpu.read_reg(PC_REG);
        self.window.disassemble(start, count, thumb, pc, &self.breakpoints)
    }

    /// Signal that code memory may have changed (e.g. after a step).
    pub fn invalidate_disassembly(&mut self) {
        self.window.invalidate();
    }

    fn resolve_ram(&self, addr: u32) -> Result<u32, SetBreakpointError> {
        let pa = mmu::translate(self.cpu.cp15(), &self.mem, addr)
            .map_err(|_| SetBreakpointError::NotInRam(addr))?;
        if self.mem.is_ram(pa) {
            Ok(pa)
        } else {
            Err(SetBreakpointError::NotInRam(addr))
        }
    }
}
