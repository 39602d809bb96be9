/// Trigger-condition mini-language for breakpoints.
///
/// A condition is a comma-separated conjunction of clauses:
///
/// ```text
/// r0==0x1234, hit>=5, [0xA0000000]==0xFF
/// ```
///
/// Parsing happens once, at `set_condition` time, and fails fast with a
/// typed error. The compiled form holds pre-resolved operands (register
/// index, literal address, literal value) so trigger-time evaluation is
/// allocation-free. Any evaluation failure (an unmapped memory operand, an
/// absent SPSR) makes the clause false rather than propagating an error:
/// a broken condition must never be able to stop the execution loop.
///
/// Register aliases always read the currently active register file, even
/// while a client is displaying a different banked mode.

use thiserror::Error;

use crate::cpu::Cpu;
use crate::memory::MemoryMap;
use crate::mmu;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionParseError {
    #[error("empty clause")]
    EmptyClause,
    #[error("unknown operand '{0}'")]
    UnknownOperand(String),
    #[error("missing comparison operator in '{0}'")]
    MissingOperator(String),
    #[error("invalid value '{0}'")]
    InvalidValue(String),
    #[error("unterminated '[' in '{0}'")]
    UnterminatedBracket(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CmpOp {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl CmpOp {
    fn apply(self, lhs: u32, rhs: u32) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Lt => lhs < rhs,
        }
    }
}

/// Left-hand side of a clause, resolved at parse time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Operand {
    Reg(usize),
    Cpsr,
    Spsr,
    HitCount,
    /// 32-bit word at a literal address, translated through the MMU when
    /// it is enabled.
    Mem(u32),
}

#[derive(Clone, Debug)]
struct Clause {
    lhs: Operand,
    op: CmpOp,
    value: u32,
}

/// Everything a clause can read at trigger time.
pub struct EvalContext<'a> {
    pub cpu: &'a Cpu,
    pub mem: &'a MemoryMap,
    /// The entry's hit counter, including the hit being evaluated.
    pub hit_count: u32,
}

#[derive(Clone, Debug)]
pub struct CompiledCondition {
    clauses: Vec<Clause>,
    text: String,
}

impl CompiledCondition {
    /// Parse `text`. Whitespace around clauses and operators is ignored.
    pub fn parse(text: &str) -> Result<Self, ConditionParseError> {
        let clauses = text
            .split(',')
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clauses, text: text.trim().to_string() })
    }

    /// The source text, for display.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True only if every clause holds.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> bool {
        self.clauses.iter().all(|clause| {
            match read_operand(clause.lhs, ctx) {
                Some(lhs) => clause.op.apply(lhs, clause.value),
                None => false,
            }
        })
    }
}

fn read_operand(operand: Operand, ctx: &EvalContext<'_>) -> Option<u32> {
    match operand {
        Operand::Reg(n) => Some(ctx.cpu.read_reg(n)),
        Operand::Cpsr => Some(ctx.cpu.cpsr().bits()),
        Operand::Spsr => ctx.cpu.get_registers().2,
        Operand::HitCount => Some(ctx.hit_count),
        Operand::Mem(addr) => {
            let pa = mmu::translate(ctx.cpu.cp15(), ctx.mem, addr).unwrap_or(addr);
            ctx.mem.read_u32(pa)
        }
    }
}

fn parse_clause(src: &str) -> Result<Clause, ConditionParseError> {
    let src = src.trim();
    if src.is_empty() {
        return Err(ConditionParseError::EmptyClause);
    }

    let (lhs, rest) = if let Some(after) = src.strip_prefix('[') {
        let close = after
            .find(']')
            .ok_or_else(|| ConditionParseError::UnterminatedBracket(src.to_string()))?;
        let addr = parse_value(&after[..close])?;
        (Operand::Mem(addr), &after[close + 1..])
    } else {
        let end = src
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(src.len());
        (parse_register(&src[..end])?, &src[end..])
    };

    let rest = rest.trim_start();
    let (op, value_src) = parse_op(rest)
        .ok_or_else(|| ConditionParseError::MissingOperator(src.to_string()))?;
    let value = parse_value(value_src)?;

    Ok(Clause { lhs, op, value })
}

fn parse_register(name: &str) -> Result<Operand, ConditionParseError> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "sp" => return Ok(Operand::Reg(13)),
        "lr" => return Ok(Operand::Reg(14)),
        "pc" => return Ok(Operand::Reg(15)),
        "cpsr" => return Ok(Operand::Cpsr),
        "spsr" => return Ok(Operand::Spsr),
        "hit" => return Ok(Operand::HitCount),
        _ => {}
    }
    if let Some(num) = lower.strip_prefix('r') {
        if let Ok(n) = num.parse::<usize>() {
            if n < 16 {
                return Ok(Operand::Reg(n));
            }
        }
    }
    Err(ConditionParseError::UnknownOperand(name.to_string()))
}

fn parse_op(src: &str) -> Option<(CmpOp, &str)> {
    for (token, op) in [
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        (">=", CmpOp::Ge),
        ("<=", CmpOp::Le),
        (">", CmpOp::Gt),
        ("<", CmpOp::Lt),
    ] {
        if let Some(rest) = src.strip_prefix(token) {
            return Some((op, rest));
        }
    }
    None
}

fn parse_value(src: &str) -> Result<u32, ConditionParseError> {
    let src = src.trim();
    let parsed = if let Some(hex) = src.strip_prefix("0x").or_else(|| src.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        src.parse::<u32>()
    };
    parsed.map_err(|_| ConditionParseError::InvalidValue(src.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryMap, Region, RegionKind};

    fn ctx_parts() -> (Cpu, MemoryMap) {
        let cpu = Cpu::new();
        let mem = MemoryMap::new(vec![
            Region::new(0x1000_0000, 0x1_0000, RegionKind::Ram),
        ]);
        (cpu, mem)
    }

    fn eval(cond: &str, cpu: &Cpu, mem: &MemoryMap, hits: u32) -> bool {
        let compiled = CompiledCondition::parse(cond).unwrap();
        compiled.evaluate(&EvalContext { cpu, mem, hit_count: hits })
    }

    #[test]
    fn register_compare() {
        let (mut cpu, mem) = ctx_parts();
        cpu.set_register(0, 0x10).unwrap();
        assert!(eval("r0==0x10", &cpu, &mem, 0));
        assert!(!eval("r0==0x11", &cpu, &mem, 0));
        assert!(eval("r0!=0", &cpu, &mem, 0));
        assert!(eval("r0<17", &cpu, &mem, 0));
    }

    #[test]
    fn register_aliases() {
        let (mut cpu, mem) = ctx_parts();
        cpu.set_register(13, 0x100).unwrap();
        cpu.set_register(14, 0x200).unwrap();
        cpu.set_register(15, 0x300).unwrap();
        assert!(eval("sp==0x100", &cpu, &mem, 0));
        assert!(eval("LR==0x200", &cpu, &mem, 0));
        assert!(eval("pc>=0x300", &cpu, &mem, 0));
    }

    #[test]
    fn hit_counter_compare() {
        let (cpu, mem) = ctx_parts();
        assert!(!eval("hit>=3", &cpu, &mem, 1));
        assert!(!eval("hit>=3", &cpu, &mem, 2));
        assert!(eval("hit>=3", &cpu, &mem, 3));
    }

    #[test]
    fn memory_dereference() {
        let (cpu, mut mem) = ctx_parts();
        mem.write_u32(0x1000_0040, 0xFF);
        assert!(eval("[0x10000040]==0xFF", &cpu, &mem, 0));
        assert!(!eval("[0x10000040]==0xFE", &cpu, &mem, 0));
        // Unmapped operand: clause false, not an error.
        assert!(!eval("[0x90000000]==0", &cpu, &mem, 0));
    }

    #[test]
    fn conjunction_requires_all_clauses() {
        let (mut cpu, mem) = ctx_parts();
        cpu.set_register(2, 5).unwrap();
        assert!(eval("r2==0x5, hit>=2", &cpu, &mem, 2));
        assert!(!eval("r2==0x5, hit>=2", &cpu, &mem, 1));
        cpu.set_register(2, 6).unwrap();
        assert!(!eval("r2==0x5, hit>=2", &cpu, &mem, 2));
    }

    #[test]
    fn decimal_and_hex_values() {
        let (mut cpu, mem) = ctx_parts();
        cpu.set_register(1, 255).unwrap();
        assert!(eval("r1==255", &cpu, &mem, 0));
        assert!(eval("r1==0xFF", &cpu, &mem, 0));
        assert!(eval("r1 == 0xff", &cpu, &mem, 0));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            CompiledCondition::parse("bogus==1"),
            Err(ConditionParseError::UnknownOperand(_))
        ));
        assert!(matches!(
            CompiledCondition::parse("r0=1"),
            Err(ConditionParseError::MissingOperator(_))
        ));
        assert!(matches!(
            CompiledCondition::parse("r0==zzz"),
            Err(ConditionParseError::InvalidValue(_))
        ));
        assert!(matches!(
            CompiledCondition::parse("[0x100==1"),
            Err(ConditionParseError::UnterminatedBracket(_))
        ));
        assert!(matches!(
            CompiledCondition::parse("r0==1,,r1==2"),
            Err(ConditionParseError::EmptyClause)
        ));
        assert!(matches!(
            CompiledCondition::parse("r16==1"),
            Err(ConditionParseError::UnknownOperand(_))
        ));
    }

    #[test]
    fn text_round_trip() {
        let c = CompiledCondition::parse(" r0==1, hit>=2 ").unwrap();
        assert_eq!(c.text(), "r0==1, hit>=2");
    }
}
