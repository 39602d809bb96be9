use crate::breakpoint::{AccessKind, BreakpointRegistry, SetBreakpointError};
use crate::cpu::Cpu;
use crate::memory::{MemoryMap, Region, RegionKind};

fn fixture() -> (BreakpointRegistry, Cpu, MemoryMap) {
    let mem = MemoryMap::new(vec![
        Region::new(0x1000_0000, 0x1_0000, RegionKind::Ram),
    ]);
    (BreakpointRegistry::new(), Cpu::new(), mem)
}

#[test]
fn set_then_list_contains_exactly_one_entry() {
    let (mut bps, _, _) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    let list = bps.list(usize::MAX);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].addr, 0x1000_1000);
    assert!(list[0].exec);
    assert!(list[0].enabled);
    assert_eq!(list[0].size, 4);
}

#[test]
fn no_kind_selected_is_rejected() {
    let (mut bps, _, _) = fixture();
    assert_eq!(
        bps.set(0x1000_1000, false, false, false),
        Err(SetBreakpointError::NoKindSelected)
    );
    assert!(bps.list(usize::MAX).is_empty());
}

#[test]
fn clear_is_idempotent() {
    let (mut bps, _, _) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.clear(0x1000_1000);
    assert!(bps.list(usize::MAX).is_empty());
    // Twice in a row, and on a never-set address: no-ops.
    bps.clear(0x1000_1000);
    bps.clear(0xDEAD_0000);
}

#[test]
fn reset_replaces_flags_but_preserves_bookkeeping() {
    let (mut bps, cpu, mem) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.set_size(0x1000_1000, 8).unwrap();
    bps.set_condition(0x1000_1000, "hit>=100").unwrap();
    bps.check_exec(0x1000_1000, &cpu, &mem);

    // Re-set with different flags: hit count, size, condition survive.
    bps.set(0x1000_1000, false, true, true).unwrap();
    let list = bps.list(usize::MAX);
    assert_eq!(list.len(), 1);
    assert!(!list[0].exec && list[0].read && list[0].write);
    assert_eq!(list[0].hit_count, 1);
    assert_eq!(list[0].size, 8);
    assert_eq!(bps.condition_text(0x1000_1000), "hit>=100");
}

#[test]
fn clear_discards_hit_count_and_condition() {
    let (mut bps, cpu, mem) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.set_condition(0x1000_1000, "hit>=100").unwrap();
    bps.check_exec(0x1000_1000, &cpu, &mem);
    bps.clear(0x1000_1000);

    bps.set(0x1000_1000, true, false, false).unwrap();
    let list = bps.list(usize::MAX);
    assert_eq!(list[0].hit_count, 0);
    assert!(list[0].condition.is_none());
}

#[test]
fn unconditional_exec_always_halts() {
    let (mut bps, cpu, mem) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    let t = bps.check_exec(0x1000_1000, &cpu, &mem).unwrap();
    assert_eq!(t.addr, 0x1000_1000);
    assert!(!t.one_shot);
    assert!(bps.check_exec(0x1000_1004, &cpu, &mem).is_none());
}

#[test]
fn disabled_entry_neither_halts_nor_counts() {
    let (mut bps, cpu, mem) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.set_enabled(0x1000_1000, false).unwrap();
    assert!(bps.check_exec(0x1000_1000, &cpu, &mem).is_none());
    assert_eq!(bps.list(usize::MAX)[0].hit_count, 0);

    // Re-enabling restores the stored configuration.
    bps.set_enabled(0x1000_1000, true).unwrap();
    assert!(bps.check_exec(0x1000_1000, &cpu, &mem).is_some());
}

#[test]
fn enable_on_missing_entry_is_an_error() {
    let (mut bps, _, _) = fixture();
    assert_eq!(
        bps.set_enabled(0x1000_1000, true),
        Err(SetBreakpointError::NoSuchBreakpoint(0x1000_1000))
    );
}

#[test]
fn watch_size_covers_intersecting_accesses() {
    let (mut bps, cpu, mem) = fixture();
    bps.set(0x1000_1000, false, false, true).unwrap();
    bps.set_size(0x1000_1000, 8).unwrap();

    // Access overlapping the tail of the watch range.
    assert!(bps
        .check_access(0x1000_1006, 4, AccessKind::Write, &cpu, &mem)
        .is_some());
    // One byte past the range.
    assert!(bps
        .check_access(0x1000_1008, 4, AccessKind::Write, &cpu, &mem)
        .is_none());
    // Access starting below the watch address but reaching into it.
    assert!(bps
        .check_access(0x1000_0FFE, 4, AccessKind::Write, &cpu, &mem)
        .is_some());
    // Wrong access kind.
    assert!(bps
        .check_access(0x1000_1000, 4, AccessKind::Read, &cpu, &mem)
        .is_none());
}

#[test]
fn read_watch_matches_reads_only() {
    let (mut bps, cpu, mem) = fixture();
    bps.set(0x1000_2000, false, true, false).unwrap();
    assert!(bps
        .check_access(0x1000_2000, 1, AccessKind::Read, &cpu, &mem)
        .is_some());
    assert!(bps
        .check_access(0x1000_2000, 1, AccessKind::Write, &cpu, &mem)
        .is_none());
}

#[test]
fn condition_gates_halt_but_not_hit_count() {
    let (mut bps, mut cpu, mem) = fixture();
    cpu.set_register(0, 0x10).unwrap();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.set_condition(0x1000_1000, "r0==0x99").unwrap();

    assert!(bps.check_exec(0x1000_1000, &cpu, &mem).is_none());
    assert_eq!(bps.list(usize::MAX)[0].hit_count, 1);

    cpu.set_register(0, 0x99).unwrap();
    assert!(bps.check_exec(0x1000_1000, &cpu, &mem).is_some());
    assert_eq!(bps.list(usize::MAX)[0].hit_count, 2);
}

#[test]
fn hit_condition_fires_on_nth_trigger() {
    let (mut bps, cpu, mem) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.set_condition(0x1000_1000, "hit>=3").unwrap();

    assert!(bps.check_exec(0x1000_1000, &cpu, &mem).is_none());
    assert!(bps.check_exec(0x1000_1000, &cpu, &mem).is_none());
    assert!(bps.check_exec(0x1000_1000, &cpu, &mem).is_some());
}

#[test]
fn malformed_condition_keeps_previous_one() {
    let (mut bps, _, _) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.set_condition(0x1000_1000, "r0==1").unwrap();
    assert!(bps.set_condition(0x1000_1000, "r0=!garbage").is_err());
    assert_eq!(bps.condition_text(0x1000_1000), "r0==1");
}

#[test]
fn empty_condition_text_clears_condition() {
    let (mut bps, _, _) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.set_condition(0x1000_1000, "r0==1").unwrap();
    bps.set_condition(0x1000_1000, "").unwrap();
    assert_eq!(bps.condition_text(0x1000_1000), "");
    assert!(bps.list(usize::MAX)[0].condition.is_none());
}

#[test]
fn reset_hit_count() {
    let (mut bps, cpu, mem) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.check_exec(0x1000_1000, &cpu, &mem);
    bps.check_exec(0x1000_1000, &cpu, &mem);
    assert_eq!(bps.list(usize::MAX)[0].hit_count, 2);
    bps.reset_hit_count(0x1000_1000).unwrap();
    assert_eq!(bps.list(usize::MAX)[0].hit_count, 0);
}

#[test]
fn step_out_trap_fires_once_and_vanishes() {
    let (mut bps, cpu, mem) = fixture();
    bps.set_step_out(0x1000_4000);
    // Internal trap, not visible to clients.
    assert!(bps.list(usize::MAX).is_empty());

    let t = bps.check_exec(0x1000_4000, &cpu, &mem).unwrap();
    assert!(t.one_shot);
    assert!(bps.check_exec(0x1000_4000, &cpu, &mem).is_none());
    assert!(bps.is_empty());
}

#[test]
fn step_out_trap_coexists_with_user_breakpoint() {
    let (mut bps, cpu, mem) = fixture();
    bps.set(0x1000_4000, false, true, false).unwrap();
    bps.set_step_out(0x1000_4000);

    let t = bps.check_exec(0x1000_4000, &cpu, &mem).unwrap();
    assert!(t.one_shot);
    // The user watchpoint survives the trap, and the trap's firing is not
    // counted against it.
    assert_eq!(bps.list(usize::MAX).len(), 1);
    assert!(bps.list(usize::MAX)[0].read);
    assert_eq!(bps.list(usize::MAX)[0].hit_count, 0);
}

#[test]
fn list_is_bounded_and_address_ordered() {
    let (mut bps, _, _) = fixture();
    for addr in [0x1000_3000u32, 0x1000_1000, 0x1000_2000] {
        bps.set(addr, true, false, false).unwrap();
    }
    let list = bps.list(2);
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].addr, 0x1000_1000);
    assert_eq!(list[1].addr, 0x1000_2000);
}

#[test]
fn clear_all_sweeps_everything() {
    let (mut bps, _, _) = fixture();
    bps.set(0x1000_1000, true, false, false).unwrap();
    bps.set(0x1000_2000, false, true, false).unwrap();
    bps.clear_all();
    assert!(bps.list(usize::MAX).is_empty());
    assert!(bps.is_empty());
}
