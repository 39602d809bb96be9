/// Breakpoint/watchpoint registry.
///
/// One entry per address, keyed by the 32-bit byte address. The client
/// mutates entries while the core is halted; the execution loop calls
/// `check_exec`/`check_access` on every candidate access. Disabled entries
/// are never consulted beyond the map probe. Hit counters are incremented
/// on the execution thread, before the halt is reported, so a client that
/// lists entries right after a halt sees the count that caused it.
///
/// `clear` removes the whole entry: hit count and condition go with it.
/// Re-`set` on a live address replaces the flags in place and preserves
/// hit count, size, condition and enabled state.

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

use crate::condition::{CompiledCondition, ConditionParseError, EvalContext};
use crate::cpu::Cpu;
use crate::memory::MemoryMap;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetBreakpointError {
    #[error("address 0x{0:08X} is not in RAM")]
    NotInRam(u32),
    #[error("no access kind selected (need at least one of exec/read/write)")]
    NoKindSelected,
    #[error("no breakpoint at 0x{0:08X}")]
    NoSuchBreakpoint(u32),
    #[error(transparent)]
    Condition(#[from] ConditionParseError),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Clone)]
pub struct Breakpoint {
    pub addr: u32,
    pub exec: bool,
    pub read: bool,
    pub write: bool,
    pub enabled: bool,
    /// Watch coverage in bytes; read/write triggers only.
    pub size: u32,
    pub hit_count: u32,
    pub condition: Option<CompiledCondition>,
    /// One-shot exec trap used for step-out; never listed, auto-clears
    /// when hit.
    one_shot: bool,
}

impl Breakpoint {
    fn new(addr: u32) -> Self {
        Self {
            addr,
            exec: false,
            read: false,
            write: false,
            enabled: true,
            size: 4,
            hit_count: 0,
            condition: None,
            one_shot: false,
        }
    }

    fn has_user_flags(&self) -> bool {
        self.exec || self.read || self.write
    }
}

/// A fired trigger, reported to the execution loop so it can park the core.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Trigger {
    pub addr: u32,
    /// Set when a step-out trap fired (already removed from the registry).
    pub one_shot: bool,
}

pub struct BreakpointRegistry {
    entries: BTreeMap<u32, Breakpoint>,
    /// Largest watch size ever configured; bounds the range probe in
    /// `check_access`.
    max_watch_size: u32,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            max_watch_size: 4,
        }
    }

    /// Entries in address order, at most `max` of them. Step-out traps are
    /// internal and never listed.
    pub fn list(&self, max: usize) -> Vec<Breakpoint> {
        self.entries
            .values()
            .filter(|bp| bp.has_user_flags())
            .take(max)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry at `addr`, if any (step-out traps included).
    pub fn get(&self, addr: u32) -> Option<&Breakpoint> {
        self.entries.get(&addr)
    }

    fn entry_mut(&mut self, addr: u32) -> Result<&mut Breakpoint, SetBreakpointError> {
        self.entries
            .get_mut(&addr)
            .ok_or(SetBreakpointError::NoSuchBreakpoint(addr))
    }

    /// Create or update the entry at `addr`. Flags replace the stored ones;
    /// hit count, size, condition and enabled state survive a re-set.
    /// The caller (the debugger facade) has already checked the address
    /// resolves into RAM.
    pub fn set(&mut self, addr: u32, exec: bool, read: bool, write: bool) -> Result<(), SetBreakpointError> {
        if !(exec || read || write) {
            return Err(SetBreakpointError::NoKindSelected);
        }
        let bp = self.entries.entry(addr).or_insert_with(|| Breakpoint::new(addr));
        bp.exec = exec;
        bp.read = read;
        bp.write = write;
        debug!("breakpoint set at {:08X} exec={} read={} write={}", addr, exec, read, write);
        Ok(())
    }

    /// Remove the entry at `addr` entirely. A no-op on a never-set address.
    pub fn clear(&mut self, addr: u32) {
        if self.entries.remove(&addr).is_some() {
            debug!("breakpoint cleared at {:08X}", addr);
        }
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        debug!("all breakpoints cleared");
    }

    pub fn set_enabled(&mut self, addr: u32, enabled: bool) -> Result<(), SetBreakpointError> {
        let bp = self.entry_mut(addr)?;
        bp.enabled = enabled;
        debug!("breakpoint at {:08X} enabled={}", addr, enabled);
        Ok(())
    }

    /// Watch coverage in bytes, independent of the access-kind flags.
    pub fn set_size(&mut self, addr: u32, size: u32) -> Result<(), SetBreakpointError> {
        let bp = self.entry_mut(addr)?;
        bp.size = size.max(1);
        self.max_watch_size = self.max_watch_size.max(size);
        Ok(())
    }

    /// Attach a condition; empty text clears it. On a parse error the
    /// previous condition stays in place.
    pub fn set_condition(&mut self, addr: u32, text: &str) -> Result<(), SetBreakpointError> {
        let compiled = if text.trim().is_empty() {
            None
        } else {
            Some(CompiledCondition::parse(text)?)
        };
        let bp = self.entry_mut(addr)?;
        bp.condition = compiled;
        Ok(())
    }

    /// Source text of the stored condition, "" if none.
    pub fn condition_text(&self, addr: u32) -> &str {
        self.entries
            .get(&addr)
            .and_then(|bp| bp.condition.as_ref())
            .map_or("", |c| c.text())
    }

    pub fn reset_hit_count(&mut self, addr: u32) -> Result<(), SetBreakpointError> {
        self.entry_mut(addr)?.hit_count = 0;
        Ok(())
    }

    /// Arm a one-shot exec trap at `addr` (the current LR) to implement
    /// step-out. Does not disturb a user breakpoint at the same address.
    pub fn set_step_out(&mut self, addr: u32) {
        self.entries
            .entry(addr)
            .or_insert_with(|| Breakpoint::new(addr))
            .one_shot = true;
    }

    /// Instruction-fetch check. Runs on the execution thread.
    ///
    /// A pending step-out trap at `addr` takes the fetch: it fires and
    /// auto-clears without touching the hit count of a user breakpoint
    /// sharing the address (the return address was reached either way;
    /// the user entry counts again on the next fetch).
    pub fn check_exec(&mut self, addr: u32, cpu: &Cpu, mem: &MemoryMap) -> Option<Trigger> {
        let bp = self.entries.get_mut(&addr)?;

        if bp.one_shot {
            bp.one_shot = false;
            let addr = bp.addr;
            if !bp.has_user_flags() {
                self.entries.remove(&addr);
            }
            return Some(Trigger { addr, one_shot: true });
        }

        if !bp.enabled || !bp.exec {
            return None;
        }
        fire(bp, cpu, mem)
    }

    /// Data-access check. An entry with `size = N` matches any access whose
    /// byte range intersects `[addr, addr + N)`. Runs on the execution
    /// thread.
    pub fn check_access(&mut self, addr: u32, len: u32, kind: AccessKind, cpu: &Cpu, mem: &MemoryMap) -> Option<Trigger> {
        let lo = addr.saturating_sub(self.max_watch_size - 1);
        let hi = addr.saturating_add(len.max(1) - 1);
        let candidates: Vec<u32> = self
            .entries
            .range(lo..=hi)
            .filter(|(_, bp)| {
                bp.enabled
                    && match kind {
                        AccessKind::Read => bp.read,
                        AccessKind::Write => bp.write,
                    }
                    && ranges_intersect(bp.addr, bp.size, addr, len)
            })
            .map(|(a, _)| *a)
            .collect();

        for bp_addr in candidates {
            let bp = self.entries.get_mut(&bp_addr)?;
            if let Some(trigger) = fire(bp, cpu, mem) {
                return Some(trigger);
            }
        }
        None
    }
}

fn ranges_intersect(a: u32, a_len: u32, b: u32, b_len: u32) -> bool {
    let a_end = a.saturating_add(a_len.max(1));
    let b_end = b.saturating_add(b_len.max(1));
    a < b_end && b < a_end
}

/// Count the hit, then gate on the condition. The counter moves even when
/// the condition holds the halt back, which is what lets `hit>=N` express
/// "break on the Nth hit".
fn fire(bp: &mut Breakpoint, cpu: &Cpu, mem: &MemoryMap) -> Option<Trigger> {
    bp.hit_count = bp.hit_count.wrapping_add(1);
    let halt = match &bp.condition {
        None => true,
        Some(cond) => cond.evaluate(&EvalContext {
            cpu,
            mem,
            hit_count: bp.hit_count,
        }),
    };
    halt.then_some(Trigger { addr: bp.addr, one_shot: false })
}
