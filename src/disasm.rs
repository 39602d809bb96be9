/// Disassembly window provider.
///
/// The actual decode lives outside this layer: a `Disassembler` renders one
/// instruction at a time as `"mnemonic\toperands"` text plus the raw bits.
/// This module walks a bounded window from a start address, splits the text
/// and tags each line with debugger metadata (current PC, breakpoint
/// flags). Windows are best-effort: an unmapped address ends the window
/// early, it is never an error.
///
/// The most recent window is cached by start address. The cache is purely
/// an optimization; the facade invalidates it after steps, memory writes
/// and register writes.

use crate::breakpoint::BreakpointRegistry;

/// One rendered instruction from the external decoder.
pub struct RawInsn {
    /// Instruction bits, widened to 32 even for 16-bit Thumb encodings.
    pub raw: u32,
    /// 2 (Thumb) or 4 (ARM).
    pub size: u8,
    /// `"mnemonic\toperands"`; operands may be empty.
    pub text: String,
}

/// External decode collaborator. Returns None when `addr` is unmapped.
pub trait Disassembler {
    fn decode(&mut self, addr: u32, thumb: bool) -> Option<RawInsn>;
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DisassemblyLine {
    pub addr: u32,
    pub raw: u32,
    pub size: u8,
    pub is_thumb: bool,
    pub mnemonic: String,
    pub operands: String,
    /// This line is the halted PC.
    pub is_pc: bool,
    pub exec_bp: bool,
    pub watch_bp: bool,
}

pub struct DisasmWindow<D> {
    disasm: D,
    cache: Option<CachedWindow>,
}

struct CachedWindow {
    start: u32,
    count: usize,
    lines: Vec<DisassemblyLine>,
}

impl<D: Disassembler> DisasmWindow<D> {
    pub fn new(disasm: D) -> Self {
        Self { disasm, cache: None }
    }

    /// Up to `count` lines starting at `start`, shorter if memory becomes
    /// unmapped partway through.
    pub fn disassemble(
        &mut self,
        start: u32,
        count: usize,
        thumb: bool,
        pc: u32,
        breakpoints: &BreakpointRegistry,
    ) -> &[DisassemblyLine] {
        let fresh = match &self.cache {
            Some(c) => c.start != start || c.count != count,
            None => true,
        };
        if fresh {
            let lines = self.build(start, count, thumb, pc, breakpoints);
            self.cache = Some(CachedWindow { start, count, lines });
        }
        &self.cache.as_ref().unwrap().lines
    }

    /// Drop the cached window. Call after anything that can change code
    /// memory or the PC.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    fn build(
        &mut self,
        start: u32,
        count: usize,
        thumb: bool,
        pc: u32,
        breakpoints: &BreakpointRegistry,
    ) -> Vec<DisassemblyLine> {
        let mut lines = Vec::with_capacity(count);
        let mut addr = start;
        for _ in 0..count {
            let Some(insn) = self.disasm.decode(addr, thumb) else {
                break;
            };
            let (mnemonic, operands) = match insn.text.split_once('\t') {
                Some((m, o)) => (m.to_string(), o.to_string()),
                None => (insn.text.clone(), String::new()),
            };
            let bp = breakpoints.get(addr);
            lines.push(DisassemblyLine {
                addr,
                raw: insn.raw,
                size: insn.size,
                is_thumb: thumb,
                mnemonic,
                operands,
                is_pc: addr == pc,
                exec_bp: bp.map_or(false, |b| b.exec && b.enabled),
                watch_bp: bp.map_or(false, |b| (b.read || b.write) && b.enabled),
            });
            addr = addr.wrapping_add(insn.size as u32);
        }
        lines
    }
}
