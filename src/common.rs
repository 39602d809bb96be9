/// Common bit and byte manip.

/// Set the nth bit.
pub const fn bit(n: usize) -> u32 {
    1 << n
}

/// Set all bits between the top and bottom (inclusive).
pub const fn bits(mut bottom: usize, top: usize) -> u32 {
    let mut out = 0;
    while bottom <= top {
        out |= bit(bottom);
        bottom += 1;
    }
    return out;
}

/// Extract the field between the bottom and top bits (inclusive),
/// shifted down to bit 0.
pub const fn field(val: u32, bottom: usize, top: usize) -> u32 {
    (val & bits(bottom, top)) >> bottom
}
