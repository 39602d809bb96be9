/// Side-effect-free peripheral register peek.
///
/// Reads peripheral state directly, without going through MMIO dispatch:
/// no read-clears-interrupt semantics fire, no locks are taken, and the
/// call is safe from any thread while the core is running. Every register
/// is an `AtomicU32` updated by single relaxed stores on the execution
/// thread, so the worst case is a value one tick stale, never a torn read.
///
/// Address decode goes through a fixed tagged-range table; the set of
/// peripheral blocks is closed and known at build time. Unrecognized
/// offsets inside a known block read as zero so register-dump tooling can
/// sweep a block blindly; addresses outside every block return None and
/// the caller falls back to the halted-only gateway.

use std::sync::atomic::{AtomicU32, Ordering};

fn ld(reg: &AtomicU32) -> u32 {
    reg.load(Ordering::Relaxed)
}

/// Which hardware variant is being emulated. The LCD control and
/// interrupt-mask register offsets swap between the two, and the timer
/// blocks have entirely different layouts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HwVariant {
    Classic,
    Cx,
}

#[derive(Default)]
pub struct LcdState {
    pub timing: [AtomicU32; 4],
    /// Upper/lower panel frame buffer base pointers.
    pub upbase: AtomicU32,
    pub lpbase: AtomicU32,
    pub control: AtomicU32,
    pub int_mask: AtomicU32,
    pub int_status: AtomicU32,
    pub cursor_control: AtomicU32,
    pub cursor_config: AtomicU32,
    pub cursor_palette: [AtomicU32; 2],
    pub cursor_xy: AtomicU32,
    pub cursor_clip: AtomicU32,
    pub cursor_int_mask: AtomicU32,
    pub cursor_int_status: AtomicU32,
}

/// One half of a classic-platform timer pair.
#[derive(Default)]
pub struct ClassicTimer {
    pub value: AtomicU32,
    pub divider: AtomicU32,
    pub control: AtomicU32,
}

#[derive(Default)]
pub struct ClassicTimerPair {
    pub timers: [ClassicTimer; 2],
}

/// CX-platform SP804-style sub-timer.
#[derive(Default)]
pub struct CxTimer {
    pub load: AtomicU32,
    /// Snapshot value, not the live countdown.
    pub value: AtomicU32,
    pub control: AtomicU32,
    pub interrupt: AtomicU32,
}

#[derive(Default)]
pub struct Watchdog {
    pub load: AtomicU32,
    pub value: AtomicU32,
    pub control: AtomicU32,
    pub interrupt: AtomicU32,
    pub locked: AtomicU32,
}

/// Peripheral state blocks this layer is allowed to read. The execution
/// core owns the authoritative state and writes through these same atomics.
pub struct Peripherals {
    pub variant: HwVariant,
    pub lcd: LcdState,
    pub classic_timers: [ClassicTimerPair; 3],
    pub cx_timers: [[CxTimer; 2]; 3],
    pub watchdog: Watchdog,
}

#[derive(Clone, Copy)]
enum Block {
    Lcd,
    /// Timer block by index; layout depends on the hardware variant.
    Timer(usize),
    Watchdog,
}

/// Physical ranges with a peek decoder, checked in order.
const BLOCKS: [(u32, u32, Block); 5] = [
    (0xC000_0000, 0x1000, Block::Lcd),
    (0x9001_0000, 0x1000, Block::Timer(0)),
    (0x900C_0000, 0x1000, Block::Timer(1)),
    (0x900D_0000, 0x1000, Block::Timer(2)),
    (0x9006_0000, 0x1000, Block::Watchdog),
];

impl Peripherals {
    pub fn new(variant: HwVariant) -> Self {
        Self {
            variant,
            lcd: Default::default(),
            classic_timers: Default::default(),
            cx_timers: Default::default(),
            watchdog: Default::default(),
        }
    }

    /// Read a peripheral register by physical address. None if the address
    /// is outside every recognized block.
    pub fn peek_register(&self, paddr: u32) -> Option<u32> {
        let block = BLOCKS
            .iter()
            .find(|(base, size, _)| paddr.wrapping_sub(*base) < *size)
            .map(|(_, _, block)| *block)?;
        let off = paddr & 0xFFF;
        Some(match block {
            Block::Lcd => self.peek_lcd(off),
            Block::Timer(which) => match self.variant {
                HwVariant::Classic => self.peek_classic_timer(which, off),
                HwVariant::Cx => self.peek_cx_timer(which, off),
            },
            Block::Watchdog => self.peek_watchdog(off),
        })
    }

    fn peek_lcd(&self, off: u32) -> u32 {
        let lcd = &self.lcd;
        let cx = self.variant == HwVariant::Cx;
        match off {
            0x000 | 0x004 | 0x008 | 0x00C => ld(&lcd.timing[(off >> 2) as usize]),
            0x010 => ld(&lcd.upbase),
            0x014 => ld(&lcd.lpbase),
            // Control and interrupt-mask swap offsets between variants.
            0x018 => if cx { ld(&lcd.control) } else { ld(&lcd.int_mask) },
            0x01C => if cx { ld(&lcd.int_mask) } else { ld(&lcd.control) },
            0x020 => ld(&lcd.int_status),
            0x024 => ld(&lcd.int_status) & ld(&lcd.int_mask),
            0xC00 => ld(&lcd.cursor_control),
            0xC04 => ld(&lcd.cursor_config),
            0xC08 => ld(&lcd.cursor_palette[0]),
            0xC0C => ld(&lcd.cursor_palette[1]),
            0xC10 => ld(&lcd.cursor_xy),
            0xC14 => ld(&lcd.cursor_clip),
            0xC20 => ld(&lcd.cursor_int_mask),
            0xC28 => ld(&lcd.cursor_int_status),
            _ => 0,
        }
    }

    fn peek_classic_timer(&self, which: usize, off: u32) -> u32 {
        let tp = &self.classic_timers[which];
        match off & 0x3F {
            0x00 => ld(&tp.timers[0].value),
            0x04 => ld(&tp.timers[0].divider),
            0x08 => ld(&tp.timers[0].control),
            0x0C => ld(&tp.timers[1].value),
            0x10 => ld(&tp.timers[1].divider),
            0x14 => ld(&tp.timers[1].control),
            _ => 0,
        }
    }

    fn peek_cx_timer(&self, which: usize, off: u32) -> u32 {
        // Bit 5 of the offset selects the sub-timer within the pair.
        let ti = ((off >> 5) & 1) as usize;
        let t = &self.cx_timers[which][ti];
        match off & 0x1F {
            0x00 => ld(&t.load),
            0x04 => ld(&t.value),
            0x08 => ld(&t.control),
            0x0C => ld(&t.interrupt),
            _ => 0,
        }
    }

    fn peek_watchdog(&self, off: u32) -> u32 {
        let wd = &self.watchdog;
        match off {
            0x000 => ld(&wd.load),
            0x004 => ld(&wd.value),
            0x008 => ld(&wd.control),
            0x00C => ld(&wd.interrupt),
            0xC00 => ld(&wd.locked),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn st(reg: &AtomicU32, v: u32) {
        reg.store(v, Ordering::Relaxed);
    }

    #[test]
    fn lcd_control_offset_swaps_between_variants() {
        for (variant, ctl_off, mask_off) in [
            (HwVariant::Cx, 0x18u32, 0x1Cu32),
            (HwVariant::Classic, 0x1C, 0x18),
        ] {
            let p = Peripherals::new(variant);
            st(&p.lcd.control, 0x1234);
            st(&p.lcd.int_mask, 0x00FF);
            assert_eq!(p.peek_register(0xC000_0000 + ctl_off), Some(0x1234));
            assert_eq!(p.peek_register(0xC000_0000 + mask_off), Some(0x00FF));
        }
    }

    #[test]
    fn lcd_masked_interrupt_status() {
        let p = Peripherals::new(HwVariant::Cx);
        st(&p.lcd.int_status, 0b1111);
        st(&p.lcd.int_mask, 0b0101);
        assert_eq!(p.peek_register(0xC000_0020), Some(0b1111));
        assert_eq!(p.peek_register(0xC000_0024), Some(0b0101));
    }

    #[test]
    fn classic_timer_layout() {
        let p = Peripherals::new(HwVariant::Classic);
        st(&p.classic_timers[1].timers[0].value, 0xAA);
        st(&p.classic_timers[1].timers[1].control, 0xBB);
        assert_eq!(p.peek_register(0x900C_0000), Some(0xAA));
        assert_eq!(p.peek_register(0x900C_0014), Some(0xBB));
    }

    #[test]
    fn cx_timer_subtimer_select() {
        let p = Peripherals::new(HwVariant::Cx);
        st(&p.cx_timers[2][0].load, 0x111);
        st(&p.cx_timers[2][1].load, 0x222);
        st(&p.cx_timers[2][1].interrupt, 0x1);
        assert_eq!(p.peek_register(0x900D_0000), Some(0x111));
        assert_eq!(p.peek_register(0x900D_0020), Some(0x222));
        assert_eq!(p.peek_register(0x900D_002C), Some(0x1));
    }

    #[test]
    fn watchdog_block() {
        let p = Peripherals::new(HwVariant::Cx);
        st(&p.watchdog.value, 0xFFFF_FFFF);
        st(&p.watchdog.locked, 1);
        assert_eq!(p.peek_register(0x9006_0004), Some(0xFFFF_FFFF));
        assert_eq!(p.peek_register(0x9006_0C00), Some(1));
    }

    #[test]
    fn unknown_offset_in_known_block_reads_zero() {
        let p = Peripherals::new(HwVariant::Cx);
        assert_eq!(p.peek_register(0xC000_0FF0), Some(0));
        assert_eq!(p.peek_register(0x9006_0123), Some(0));
    }

    #[test]
    fn address_outside_all_blocks_is_unrecognized() {
        let p = Peripherals::new(HwVariant::Cx);
        assert_eq!(p.peek_register(0x8000_0000), None);
        assert_eq!(p.peek_register(0xC000_1000), None);
        assert_eq!(p.peek_register(0x9001_1000), None);
    }
}
