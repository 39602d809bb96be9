/// Physical memory regions and the debug memory gateway.
///
/// The gateway has two personalities: a physical path that clamps to the
/// containing region and is callable at any time, and a virtual path that
/// translates through the MMU page by page and therefore requires the
/// core to be halted.
///
/// None of these operations ever fault on an unmapped address: they
/// transfer fewer bytes (possibly zero) instead, so a probe of garbage
/// input keeps the debugger alive.

use crate::cpu::Cp15;
use crate::mmu;

/// What backs a physical range. Breakpoints may only target `Ram`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegionKind {
    Ram,
    Rom,
}

pub struct Region {
    pub base: u32,
    pub kind: RegionKind,
    data: Vec<u8>,
}

impl Region {
    pub fn new(base: u32, size: usize, kind: RegionKind) -> Self {
        Self { base, kind, data: vec![0; size] }
    }

    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn contains(&self, addr: u32) -> bool {
        addr.wrapping_sub(self.base) < self.size()
    }
}

/// The physical address map of the emulated system.
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// The classic layout: boot ROM at 0, SDRAM at 0x10000000,
    /// on-chip SRAM at 0xA4000000.
    pub fn nspire(sdram_size: usize) -> Self {
        Self::new(vec![
            Region::new(0x0000_0000, 0x8_0000, RegionKind::Rom),
            Region::new(0x1000_0000, sdram_size, RegionKind::Ram),
            Region::new(0xA400_0000, 0x2_0000, RegionKind::Ram),
        ])
    }

    fn region_containing(&self, addr: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    /// Is this physical address backed by RAM (a valid breakpoint target)?
    pub fn is_ram(&self, paddr: u32) -> bool {
        self.region_containing(paddr)
            .map_or(false, |r| r.kind == RegionKind::Ram)
    }

    /// Copy out of physical memory, clamped to the containing region.
    /// Returns the number of bytes read; 0 if `paddr` is unmapped.
    pub fn read_physical(&self, paddr: u32, buf: &mut [u8]) -> usize {
        let Some(region) = self.region_containing(paddr) else {
            return 0;
        };
        let offset = (paddr - region.base) as usize;
        let len = buf.len().min(region.data.len() - offset);
        buf[..len].copy_from_slice(&region.data[offset..offset + len]);
        len
    }

    /// Copy into physical memory, clamped to the containing region.
    pub fn write_physical(&mut self, paddr: u32, data: &[u8]) -> usize {
        let Some(region) = self
            .regions
            .iter_mut()
            .find(|r| r.contains(paddr))
        else {
            return 0;
        };
        let offset = (paddr - region.base) as usize;
        let len = data.len().min(region.data.len() - offset);
        region.data[offset..offset + len].copy_from_slice(&data[..len]);
        len
    }

    /// Aligned word load used by the page-table walker and the condition
    /// evaluator. None if the word is not fully mapped.
    pub fn read_u32(&self, paddr: u32) -> Option<u32> {
        let mut buf = [0; 4];
        if self.read_physical(paddr & !3, &mut buf) == 4 {
            Some(u32::from_le_bytes(buf))
        } else {
            None
        }
    }

    pub fn write_u32(&mut self, paddr: u32, value: u32) -> bool {
        self.write_physical(paddr & !3, &value.to_le_bytes()) == 4
    }

    /// First byte-for-byte match of `pattern` in physical memory, scanning
    /// `[start, start + length)`. The scan is clamped to the region
    /// containing `start` and never reads past the mapped range.
    pub fn search(&self, start: u32, length: u32, pattern: &[u8]) -> Option<u32> {
        if pattern.is_empty() {
            return None;
        }
        let region = self.region_containing(start)?;
        let offset = (start - region.base) as usize;
        let avail = (region.data.len() - offset).min(length as usize);
        let hay = &region.data[offset..offset + avail];
        hay.windows(pattern.len())
            .position(|w| w == pattern)
            .map(|pos| start + pos as u32)
    }

    /// All matches from `start`, each search resuming one byte past the
    /// previous hit, capped at `max_matches`.
    pub fn search_all(&self, start: u32, length: u32, pattern: &[u8], max_matches: usize) -> Vec<u32> {
        let mut out = Vec::new();
        let end = start.wrapping_add(length);
        let mut at = start;
        while out.len() < max_matches {
            let remaining = end.wrapping_sub(at);
            match self.search(at, remaining, pattern) {
                Some(addr) => {
                    out.push(addr);
                    at = addr.wrapping_add(1);
                    if at >= end {
                        break;
                    }
                }
                None => break,
            }
        }
        out
    }
}

/// Translate-then-copy out of virtual memory, one page at a time, stopping
/// at the first unmapped page. Halted-only: the caller must hold the halt
/// token (enforced at the facade).
pub fn read_virtual(cp15: &Cp15, mem: &MemoryMap, vaddr: u32, buf: &mut [u8]) -> usize {
    let mut total = 0;
    let mut va = vaddr;
    while total < buf.len() {
        let page_off = (va & 0xFFF) as usize;
        let chunk = (0x1000 - page_off).min(buf.len() - total);
        let Ok(pa) = mmu::translate(cp15, mem, va) else {
            break;
        };
        let got = mem.read_physical(pa, &mut buf[total..total + chunk]);
        total += got;
        if got < chunk {
            break;
        }
        va = va.wrapping_add(chunk as u32);
    }
    total
}

/// Virtual-path store with the same chunking and early-out rules as
/// `read_virtual`.
pub fn write_virtual(cp15: &Cp15, mem: &mut MemoryMap, vaddr: u32, data: &[u8]) -> usize {
    let mut total = 0;
    let mut va = vaddr;
    while total < data.len() {
        let page_off = (va & 0xFFF) as usize;
        let chunk = (0x1000 - page_off).min(data.len() - total);
        let Ok(pa) = mmu::translate(cp15, mem, va) else {
            break;
        };
        let put = mem.write_physical(pa, &data[total..total + chunk]);
        total += put;
        if put < chunk {
            break;
        }
        va = va.wrapping_add(chunk as u32);
    }
    total
}
