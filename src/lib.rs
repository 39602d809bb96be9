//! Debugger access and breakpoint coordination for an ARM-based SoC
//! emulator.
//!
//! The crate is the boundary between an external controller and a halted
//! (or running) emulated core: structured access to registers, banked
//! register sets and CP15 state, virtual and physical memory, page-table
//! inspection, a breakpoint/watchpoint registry with a small conditional
//! trigger language, a cached disassembly window, and a lock-free peek
//! path for peripheral registers that stays safe while the core runs.

mod breakpoint;
mod common;
mod condition;
mod cpu;
mod debugger;
mod disasm;
mod memory;
mod mmu;
mod peek;

#[cfg(test)]
mod breakpoint_test;

pub use crate::breakpoint::{
    AccessKind, Breakpoint, BreakpointRegistry, SetBreakpointError, Trigger,
};
pub use crate::condition::{CompiledCondition, ConditionParseError, EvalContext};
pub use crate::cpu::{Cp15, Cpu, Mode, RegisterError, CPSR, SPSR};
pub use crate::debugger::{Debugger, HaltToken};
pub use crate::disasm::{Disassembler, DisassemblyLine, DisasmWindow, RawInsn};
pub use crate::memory::{
    read_virtual, write_virtual, MemoryMap, Region, RegionKind,
};
pub use crate::mmu::{
    decode_ap, domain_access, translate, walk_l1, walk_l2, DomainAccess, FaultKind,
    FaultStatus, L1Entry, L1Kind, L2Entry, L2Kind, TranslationFault,
};
pub use crate::peek::{
    ClassicTimer, ClassicTimerPair, CxTimer, HwVariant, LcdState, Peripherals, Watchdog,
};
