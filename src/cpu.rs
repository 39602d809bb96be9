/// Halted-CPU state: register file, banked register sets, CPSR and CP15.
///
/// Everything here assumes the execution thread is parked. The debugger
/// facade enforces that with a `HaltToken`; the raw methods on `Cpu` are
/// plain because the emulator core itself owns this struct.

use bitflags::bitflags;
use thiserror::Error;

use crate::common::{bit, bits};

pub const PC_REG: usize = 15;
pub const LR_REG: usize = 14;
pub const SP_REG: usize = 13;

bitflags! {
    #[derive(Default)]
    pub struct CPSR: u32 {
        const N = bit(31);
        const Z = bit(30);
        const C = bit(29);
        const V = bit(28);
        const Q = bit(27);
        const I = bit(7);
        const F = bit(6);
        const T = bit(5);
        const MODE = bits(0, 4);
    }
}

pub type SPSR = CPSR;

/// Processor modes, by the mode field of CPSR.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    USR,    // User
    FIQ,    // Fast Interrupt
    IRQ,    // Interrupt
    SVC,    // Supervisor
    ABT,    // Abort
    UND,    // Undefined
    SYS,    // System
}

impl Mode {
    pub fn from_cpsr(cpsr: u32) -> Option<Mode> {
        match cpsr & 0x1F {
            0x10 => Some(Mode::USR),
            0x11 => Some(Mode::FIQ),
            0x12 => Some(Mode::IRQ),
            0x13 => Some(Mode::SVC),
            0x17 => Some(Mode::ABT),
            0x1B => Some(Mode::UND),
            0x1F => Some(Mode::SYS),
            _ => None,
        }
    }

    /// Does this mode have a shadow status register?
    pub fn has_spsr(self) -> bool {
        !matches!(self, Mode::USR | Mode::SYS)
    }
}

/// The CP15 registers this layer exposes for inspection.
#[derive(Clone, Copy, Default)]
pub struct Cp15 {
    pub sctlr: u32,
    pub ttbr0: u32,
    pub dacr:  u32,
    pub dfsr:  u32,
    pub ifsr:  u32,
    pub far:   u32,
}

impl Cp15 {
    /// [SCTLR, TTBR0, DACR, DFSR, IFSR, FAR]
    pub fn as_array(&self) -> [u32; 6] {
        [self.sctlr, self.ttbr0, self.dacr, self.dfsr, self.ifsr, self.far]
    }

    pub fn mmu_enabled(&self) -> bool {
        (self.sctlr & 1) != 0
    }

    /// L1 translation table base.
    pub fn l1_table_base(&self) -> u32 {
        self.ttbr0 & 0xFFFF_C000
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("register index {0} out of range (0..16)")]
    InvalidIndex(usize),
    #[error("CPSR value 0x{0:08X} has no valid mode field")]
    InvalidMode(u32),
}

pub struct Cpu {
    regs: [u32; 16],
    fiq_regs: [u32; 7],
    irq_regs: [u32; 2],
    und_regs: [u32; 2],
    abt_regs: [u32; 2],
    svc_regs: [u32; 2],

    cpsr: CPSR,
    fiq_spsr: SPSR,
    irq_spsr: SPSR,
    und_spsr: SPSR,
    abt_spsr: SPSR,
    svc_spsr: SPSR,

    cp15: Cp15,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: [0; 16],
            fiq_regs: [0; 7],
            irq_regs: [0; 2],
            und_regs: [0; 2],
            abt_regs: [0; 2],
            svc_regs: [0; 2],

            cpsr: CPSR::I | CPSR::F | CPSR::from_bits_truncate(0x13),
            fiq_spsr: Default::default(),
            irq_spsr: Default::default(),
            und_spsr: Default::default(),
            abt_spsr: Default::default(),
            svc_spsr: Default::default(),

            cp15: Cp15::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        // The mode field is only ever written through from_cpsr-validated
        // values, so this cannot fail.
        Mode::from_cpsr(self.cpsr.bits()).unwrap_or(Mode::SVC)
    }

    pub fn is_thumb_mode(&self) -> bool {
        self.cpsr.contains(CPSR::T)
    }

    /// Current register file, CPSR, and SPSR (None in USR/SYS).
    pub fn get_registers(&self) -> ([u32; 16], u32, Option<u32>) {
        let mode = self.mode();
        let spsr = if mode.has_spsr() {
            Some(self.spsr_for(mode).bits())
        } else {
            None
        };
        (self.regs, self.cpsr.bits(), spsr)
    }

    pub fn read_reg(&self, n: usize) -> u32 {
        self.regs[n]
    }

    pub fn set_register(&mut self, n: usize, value: u32) -> Result<(), RegisterError> {
        if n >= 16 {
            return Err(RegisterError::InvalidIndex(n));
        }
        self.regs[n] = value;
        Ok(())
    }

    /// Replace CPSR wholesale, re-shadowing the banked registers if the
    /// mode field changes.
    pub fn set_cpsr(&mut self, value: u32) -> Result<(), RegisterError> {
        if Mode::from_cpsr(value).is_none() {
            return Err(RegisterError::InvalidMode(value));
        }
        self.shadow_registers();
        self.cpsr = CPSR::from_bits_truncate(value);
        self.shadow_registers();
        Ok(())
    }

    pub fn cpsr(&self) -> CPSR {
        self.cpsr
    }

    /// Register file as seen from `mode`: banked slots from that mode's
    /// shadow set, everything else from the current file. SPSR is None for
    /// USR/SYS.
    pub fn get_banked_registers(&self, mode: Mode) -> ([u32; 16], Option<u32>) {
        let spsr = if mode.has_spsr() {
            Some(self.spsr_for(mode).bits())
        } else {
            None
        };
        if mode == self.mode() || (mode == Mode::SYS && self.mode() == Mode::USR) {
            return (self.regs, spsr);
        }

        // Start from the USR view: while a banked mode is current, its
        // shadow array holds the swapped-out USR values.
        let mut out = self.regs;
        match self.mode() {
            Mode::USR | Mode::SYS => {},
            Mode::FIQ => out[8..=14].copy_from_slice(&self.fiq_regs),
            Mode::IRQ => out[13..=14].copy_from_slice(&self.irq_regs),
            Mode::UND => out[13..=14].copy_from_slice(&self.und_regs),
            Mode::SVC => out[13..=14].copy_from_slice(&self.svc_regs),
            Mode::ABT => out[13..=14].copy_from_slice(&self.abt_regs),
        }
        // Then overlay the target mode's banked slots (held in its shadow
        // array whenever it is not the current mode).
        match mode {
            Mode::USR | Mode::SYS => {},
            Mode::FIQ => out[8..=14].copy_from_slice(&self.fiq_regs),
            Mode::IRQ => out[13..=14].copy_from_slice(&self.irq_regs),
            Mode::UND => out[13..=14].copy_from_slice(&self.und_regs),
            Mode::SVC => out[13..=14].copy_from_slice(&self.svc_regs),
            Mode::ABT => out[13..=14].copy_from_slice(&self.abt_regs),
        }
        (out, spsr)
    }

    pub fn cp15(&self) -> &Cp15 {
        &self.cp15
    }

    pub fn cp15_mut(&mut self) -> &mut Cp15 {
        &mut self.cp15
    }

    /// [SCTLR, TTBR0, DACR, DFSR, IFSR, FAR]
    pub fn get_cp15(&self) -> [u32; 6] {
        self.cp15.as_array()
    }

    fn spsr_for(&self, mode: Mode) -> SPSR {
        match mode {
            Mode::USR | Mode::SYS => SPSR::default(),
            Mode::FIQ => self.fiq_spsr,
            Mode::IRQ => self.irq_spsr,
            Mode::UND => self.und_spsr,
            Mode::SVC => self.svc_spsr,
            Mode::ABT => self.abt_spsr,
        }
    }

    /// Swap the banked registers of the current mode in or out.
    ///
    /// Call this both before and after changing the mode field, as the
    /// pipeline does on exception entry.
    fn shadow_registers(&mut self) {
        match self.mode() {
            Mode::USR | Mode::SYS => {},
            Mode::FIQ => {
                for i in 0..7 {
                    std::mem::swap(&mut self.regs[8 + i], &mut self.fiq_regs[i]);
                }
            },
            Mode::IRQ => {
                std::mem::swap(&mut self.regs[13], &mut self.irq_regs[0]);
                std::mem::swap(&mut self.regs[14], &mut self.irq_regs[1]);
            },
            Mode::UND => {
                std::mem::swap(&mut self.regs[13], &mut self.und_regs[0]);
                std::mem::swap(&mut self.regs[14], &mut self.und_regs[1]);
            },
            Mode::SVC => {
                std::mem::swap(&mut self.regs[13], &mut self.svc_regs[0]);
                std::mem::swap(&mut self.regs[14], &mut self.svc_regs[1]);
            },
            Mode::ABT => {
                std::mem::swap(&mut self.regs[13], &mut self.abt_regs[0]);
                std::mem::swap(&mut self.regs[14], &mut self.abt_regs[1]);
            },
        }
    }
}
