/// ARM short-descriptor page-table walking for the debugger.
///
/// `translate` and the `walk_l1`/`walk_l2` inspection views share the same
/// descriptor decoding (`L1Entry::decode` / `L2Entry::decode`). The table
/// view is only useful if it matches what translation actually does, so
/// there is exactly one copy of the bit-field logic.

use thiserror::Error;

use crate::common::field;
use crate::cpu::Cp15;
use crate::memory::MemoryMap;

/// A translation fault is an expected outcome of probing an arbitrary
/// address, not an internal error.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TranslationFault {
    #[error("section translation fault at VA 0x{va:08X}")]
    Section { va: u32 },
    #[error("page translation fault at VA 0x{va:08X}")]
    Page { va: u32 },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum L1Kind {
    Invalid,
    Coarse,
    Section,
    Fine,
}

/// A decoded level-1 descriptor. Derived on demand, never stored.
#[derive(Clone, Copy, Debug)]
pub struct L1Entry {
    pub index: u16,
    pub va_base: u32,
    pub kind: L1Kind,
    pub domain: u8,
    /// Access permission; meaningful for Section entries only.
    pub ap: u8,
    /// Physical base for Section, L2 table base for Coarse/Fine.
    pub target: u32,
}

impl L1Entry {
    pub fn decode(index: u16, desc: u32) -> Self {
        let (kind, target) = match desc & 3 {
            1 => (L1Kind::Coarse, desc & 0xFFFF_FC00),
            2 => (L1Kind::Section, desc & 0xFFF0_0000),
            3 => (L1Kind::Fine, desc & 0xFFFF_F000),
            _ => (L1Kind::Invalid, 0),
        };
        Self {
            index,
            va_base: (index as u32) << 20,
            kind,
            domain: field(desc, 5, 8) as u8,
            ap: field(desc, 10, 11) as u8,
            target,
        }
    }

    /// Number of L2 entries and the VA bits each one covers.
    fn l2_geometry(&self) -> Option<(u32, u32)> {
        match self.kind {
            L1Kind::Coarse => Some((256, 12)),
            L1Kind::Fine => Some((1024, 10)),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum L2Kind {
    Invalid,
    Large64K,
    Small4K,
    Tiny1K,
}

impl L2Kind {
    /// VA bits that pass through below the page base.
    fn offset_mask(self) -> u32 {
        match self {
            L2Kind::Large64K => 0xFFFF,
            L2Kind::Small4K => 0xFFF,
            L2Kind::Tiny1K => 0x3FF,
            L2Kind::Invalid => 0,
        }
    }
}

/// A decoded level-2 descriptor.
#[derive(Clone, Copy, Debug)]
pub struct L2Entry {
    pub index: u16,
    pub va: u32,
    pub kind: L2Kind,
    pub ap: u8,
    /// Physical address of `va` (page base with the VA offset bits merged).
    pub physical: u32,
}

impl L2Entry {
    pub fn decode(index: u16, va: u32, desc: u32) -> Self {
        let (kind, base) = match desc & 3 {
            1 => (L2Kind::Large64K, desc & 0xFFFF_0000),
            2 => (L2Kind::Small4K, desc & 0xFFFF_F000),
            3 => (L2Kind::Tiny1K, desc & 0xFFFF_FC00),
            _ => (L2Kind::Invalid, 0),
        };
        Self {
            index,
            va,
            kind,
            ap: field(desc, 4, 5) as u8,
            physical: base | (va & kind.offset_mask()),
        }
    }
}

/// Resolve a virtual address to a physical one.
///
/// Identity when the MMU-enable bit of SCTLR is clear. Otherwise walks the
/// two-level table rooted at TTBR0; any invalid descriptor (or a descriptor
/// fetch landing in unmapped memory) is a translation fault.
pub fn translate(cp15: &Cp15, mem: &MemoryMap, va: u32) -> Result<u32, TranslationFault> {
    if !cp15.mmu_enabled() {
        return Ok(va);
    }

    let ttb = cp15.l1_table_base();
    let index = (va >> 20) as u16;
    let desc = mem
        .read_u32(ttb + (index as u32) * 4)
        .ok_or(TranslationFault::Section { va })?;
    let l1 = L1Entry::decode(index, desc);

    let (index_mask, va_shift) = match l1.kind {
        L1Kind::Invalid => return Err(TranslationFault::Section { va }),
        L1Kind::Section => return Ok(l1.target | (va & 0xF_FFFF)),
        L1Kind::Coarse => (0xFF, 12),
        L1Kind::Fine => (0x3FF, 10),
    };

    let l2_index = (va >> va_shift) & index_mask;
    let l2_desc = mem
        .read_u32(l1.target + l2_index * 4)
        .ok_or(TranslationFault::Page { va })?;
    let l2 = L2Entry::decode(l2_index as u16, va, l2_desc);
    if l2.kind == L2Kind::Invalid {
        return Err(TranslationFault::Page { va });
    }
    Ok(l2.physical)
}

/// All valid L1 entries, for the table view. Invalid slots are skipped.
pub fn walk_l1(cp15: &Cp15, mem: &MemoryMap) -> Vec<L1Entry> {
    if !cp15.mmu_enabled() {
        return Vec::new();
    }
    let ttb = cp15.l1_table_base();
    (0u32..4096)
        .filter_map(|i| {
            let desc = mem.read_u32(ttb + i * 4)?;
            let entry = L1Entry::decode(i as u16, desc);
            (entry.kind != L1Kind::Invalid).then_some(entry)
        })
        .collect()
}

/// All valid L2 entries under a Coarse or Fine L1 entry. Empty for
/// Section or Invalid entries.
pub fn walk_l2(mem: &MemoryMap, l1: &L1Entry) -> Vec<L2Entry> {
    let Some((count, va_shift)) = l1.l2_geometry() else {
        return Vec::new();
    };
    (0..count)
        .filter_map(|i| {
            let desc = mem.read_u32(l1.target + i * 4)?;
            let va = l1.va_base + (i << va_shift);
            let entry = L2Entry::decode(i as u16, va, desc);
            (entry.kind != L2Kind::Invalid).then_some(entry)
        })
        .collect()
}

/// The 16 fault kinds encodable in DFSR/IFSR bits [3:0].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FaultKind {
    None,
    Alignment,
    Terminal,
    Alignment3,
    SectionLinefetch,
    SectionTranslation,
    PageLinefetch,
    PageTranslation,
    SectionAccess,
    SectionDomain,
    PageAccess,
    PageDomain,
    L1ExternalAbort,
    SectionPermission,
    L2ExternalAbort,
    PagePermission,
}

impl FaultKind {
    pub fn name(self) -> &'static str {
        match self {
            FaultKind::None => "None",
            FaultKind::Alignment => "Alignment",
            FaultKind::Terminal => "Terminal",
            FaultKind::Alignment3 => "Alignment (3)",
            FaultKind::SectionLinefetch => "Section linefetch",
            FaultKind::SectionTranslation => "Section translation",
            FaultKind::PageLinefetch => "Page linefetch",
            FaultKind::PageTranslation => "Page translation",
            FaultKind::SectionAccess => "Section access",
            FaultKind::SectionDomain => "Section domain",
            FaultKind::PageAccess => "Page access",
            FaultKind::PageDomain => "Page domain",
            FaultKind::L1ExternalAbort => "L1 ext abort (xlat)",
            FaultKind::SectionPermission => "Section permission",
            FaultKind::L2ExternalAbort => "L2 ext abort (xlat)",
            FaultKind::PagePermission => "Page permission",
        }
    }
}

/// Decoded DFSR/IFSR: 4-bit fault type plus 4-bit domain.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FaultStatus {
    pub kind: FaultKind,
    pub domain: u8,
}

impl FaultStatus {
    pub fn decode(fsr: u32) -> Self {
        let kind = match fsr & 0xF {
            0x0 => FaultKind::None,
            0x1 => FaultKind::Alignment,
            0x2 => FaultKind::Terminal,
            0x3 => FaultKind::Alignment3,
            0x4 => FaultKind::SectionLinefetch,
            0x5 => FaultKind::SectionTranslation,
            0x6 => FaultKind::PageLinefetch,
            0x7 => FaultKind::PageTranslation,
            0x8 => FaultKind::SectionAccess,
            0x9 => FaultKind::SectionDomain,
            0xA => FaultKind::PageAccess,
            0xB => FaultKind::PageDomain,
            0xC => FaultKind::L1ExternalAbort,
            0xD => FaultKind::SectionPermission,
            0xE => FaultKind::L2ExternalAbort,
            _ => FaultKind::PagePermission,
        };
        Self { kind, domain: field(fsr, 4, 7) as u8 }
    }

    pub fn is_fault(&self) -> bool {
        self.kind != FaultKind::None
    }
}

/// Render a 2-bit access-permission field.
pub fn decode_ap(ap: u8) -> &'static str {
    match ap & 3 {
        0 => "No access",
        1 => "SVC R/W",
        2 => "SVC R/W, USR RO",
        _ => "R/W",
    }
}

/// Access class for `domain` under the given DACR value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DomainAccess {
    NoAccess,
    Client,
    Reserved,
    Manager,
}

pub fn domain_access(dacr: u32, domain: u8) -> DomainAccess {
    match (dacr >> (domain as u32 * 2)) & 3 {
        0 => DomainAccess::NoAccess,
        1 => DomainAccess::Client,
        2 => DomainAccess::Reserved,
        _ => DomainAccess::Manager,
    }
}
