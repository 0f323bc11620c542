//! Operation Executor: the dispatch table and per-instruction semantics.
//!
//! Dispatch is a table of function pointers keyed on `op0`, with op0 `0x00`
//! (R-type) dispatching again on `op1`, an O(1), single-point-of-definition
//! table shape.
//!
//! Every op function receives the instruction's own `pc` and the default
//! next PC (`pc + 4`, computed once up front) and returns the PC the
//! instruction actually produces; jumps and taken branches return something
//! other than `default_next_pc`. `execute_one` applies the returned value
//! through `Cpu::set_pc`, which is the sole alignment/bounds guard.

use cuss_mem::{CuError, CuResult, Memory};

use crate::cpu::{Cpu, LINK_REGISTER};
use crate::decode::{sign_extend16, sign_extend21, sign_extend26, Fields};

type OpFn = fn(&mut Cpu, &mut Memory, &Fields, u32, u32) -> CuResult<u32>;

/// Fetches the instruction at the CPU's current PC, decodes it, executes it
/// against `table`, and advances the PC to whatever the instruction produced.
pub fn execute_one(cpu: &mut Cpu, mem: &mut Memory, table: &OpTable) -> CuResult<()> {
    let pc = cpu.pc();
    let word = mem.get_word(pc)?;
    let fields = Fields::decode(word);
    let default_next_pc = pc.wrapping_add(4);
    let new_pc = table.dispatch(cpu, mem, &fields, pc, default_next_pc)?;
    cpu.set_pc(new_pc)
}

/// The opcode dispatch table: 64 primary-opcode slots, with slot `0x00`
/// (R-type) dispatching through a second 64-entry table on `op1`.
pub struct OpTable {
    primary: [OpFn; 64],
    rtype: [OpFn; 64],
}

impl OpTable {
    fn dispatch(
        &self,
        cpu: &mut Cpu,
        mem: &mut Memory,
        f: &Fields,
        pc: u32,
        default_next_pc: u32,
    ) -> CuResult<u32> {
        if f.op0 == 0x00 {
            (self.rtype[f.op1 as usize])(cpu, mem, f, pc, default_next_pc)
        } else {
            (self.primary[f.op0 as usize])(cpu, mem, f, pc, default_next_pc)
        }
    }

    fn with_primary(mut self, op0: u8, f: OpFn) -> Self {
        self.primary[op0 as usize] = f;
        self
    }

    fn with_rtype(mut self, op1: u8, f: OpFn) -> Self {
        self.rtype[op1 as usize] = f;
        self
    }
}

impl Default for OpTable {
    fn default() -> Self {
        Self {
            primary: [bad_primary; 64],
            rtype: [bad_rtype; 64],
        }
        .with_primary(0x01, andi)
        .with_primary(0x02, orri)
        .with_primary(0x03, xori)
        .with_primary(0x04, addi)
        .with_primary(0x05, jmpi)
        .with_primary(0x06, jali)
        .with_primary(0x07, brnr)
        .with_primary(0x08, bror)
        .with_primary(0x09, brcr)
        .with_primary(0x0A, brzr)
        .with_primary(0x0B, brne)
        .with_primary(0x0C, brgt)
        .with_primary(0x0D, ldui)
        .with_primary(0x0E, ldwd)
        .with_primary(0x0F, ldhs)
        .with_primary(0x10, ldhu)
        .with_primary(0x11, ldbs)
        .with_primary(0x12, ldbu)
        .with_primary(0x13, stwd)
        .with_primary(0x14, sthw)
        .with_primary(0x15, stsb)
        .with_rtype(0x00, sllr)
        .with_rtype(0x01, slrf)
        .with_rtype(0x02, srlr)
        .with_rtype(0x03, srrf)
        .with_rtype(0x04, srar)
        .with_rtype(0x05, sras)
        .with_rtype(0x06, slli)
        .with_rtype(0x07, slif)
        .with_rtype(0x08, srli)
        .with_rtype(0x09, srif)
        .with_rtype(0x0A, srai)
        .with_rtype(0x0B, sraj)
        .with_rtype(0x0C, andr)
        .with_rtype(0x0D, adrf)
        .with_rtype(0x0E, orrr)
        .with_rtype(0x0F, orrf)
        .with_rtype(0x10, notr)
        .with_rtype(0x11, notf)
        .with_rtype(0x12, xorr)
        .with_rtype(0x13, xorf)
        .with_rtype(0x14, addr)
        .with_rtype(0x15, addf)
        .with_rtype(0x16, subr)
        .with_rtype(0x17, subf)
        .with_rtype(0x18, mulr)
        .with_rtype(0x19, mulf)
        .with_rtype(0x1A, divr)
        .with_rtype(0x1B, divf)
        .with_rtype(0x1C, rdep)
        .with_rtype(0x1D, wrep)
        .with_rtype(0x1E, jmpr)
        .with_rtype(0x1F, jalr)
    }
}

fn bad_primary(_cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, _next: u32) -> CuResult<u32> {
    Err(CuError::BadInstruction { op0: f.op0 })
}

fn bad_rtype(_cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, _next: u32) -> CuResult<u32> {
    Err(CuError::BadRTypeInstruction {
        op0: f.op0,
        op1: f.op1,
    })
}

// --- R-type (op0 = 0x00) ---------------------------------------------------

fn sllr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) << (cpu.register(f.rb) & 0x1F);
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn slrf(cpu: &mut Cpu, mem: &mut Memory, f: &Fields, pc: u32, next: u32) -> CuResult<u32> {
    let shamt = cpu.register(f.rb) & 0x1F;
    let wide = (cpu.register(f.ra) as u64) << shamt;
    let result = wide as u32;
    cpu.set_register(f.rt, result)?;
    set_shift_flags(cpu, result, wide);
    let _ = (mem, pc);
    Ok(next)
}

fn srlr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) >> (cpu.register(f.rb) & 0x1F);
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn srrf(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let shamt = cpu.register(f.rb) & 0x1F;
    let a = cpu.register(f.ra);
    let result = a >> shamt;
    let carry_out = shamt != 0 && (a >> (shamt - 1)) & 1 != 0;
    cpu.set_register(f.rt, result)?;
    cpu.set_flags(result & 0x8000_0000 != 0, false, carry_out, result == 0);
    Ok(next)
}

fn srar(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let shamt = cpu.register(f.rb) & 0x1F;
    let result = ((cpu.register(f.ra) as i32) >> shamt) as u32;
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn sras(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let shamt = cpu.register(f.rb) & 0x1F;
    let a = cpu.register(f.ra);
    let result = ((a as i32) >> shamt) as u32;
    let carry_out = shamt != 0 && (a >> (shamt - 1)) & 1 != 0;
    cpu.set_register(f.rt, result)?;
    cpu.set_flags(result & 0x8000_0000 != 0, false, carry_out, result == 0);
    Ok(next)
}

fn slli(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) << f.imm5;
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn slif(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let wide = (cpu.register(f.ra) as u64) << f.imm5;
    let result = wide as u32;
    cpu.set_register(f.rt, result)?;
    set_shift_flags(cpu, result, wide);
    Ok(next)
}

fn srli(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) >> f.imm5;
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn srif(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let a = cpu.register(f.ra);
    let result = a >> f.imm5;
    let carry_out = f.imm5 != 0 && (a >> (f.imm5 - 1)) & 1 != 0;
    cpu.set_register(f.rt, result)?;
    cpu.set_flags(result & 0x8000_0000 != 0, false, carry_out, result == 0);
    Ok(next)
}

fn srai(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = ((cpu.register(f.ra) as i32) >> f.imm5) as u32;
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn sraj(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let a = cpu.register(f.ra);
    let result = ((a as i32) >> f.imm5) as u32;
    let carry_out = f.imm5 != 0 && (a >> (f.imm5 - 1)) & 1 != 0;
    cpu.set_register(f.rt, result)?;
    cpu.set_flags(result & 0x8000_0000 != 0, false, carry_out, result == 0);
    Ok(next)
}

fn andr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) & cpu.register(f.rb);
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn adrf(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) & cpu.register(f.rb);
    cpu.set_register(f.rt, result)?;
    set_logical_flags(cpu, result);
    Ok(next)
}

fn orrr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) | cpu.register(f.rb);
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn orrf(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) | cpu.register(f.rb);
    cpu.set_register(f.rt, result)?;
    set_logical_flags(cpu, result);
    Ok(next)
}

fn notr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = !cpu.register(f.ra);
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn notf(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = !cpu.register(f.ra);
    cpu.set_register(f.rt, result)?;
    set_logical_flags(cpu, result);
    Ok(next)
}

fn xorr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) ^ cpu.register(f.rb);
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn xorf(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) ^ cpu.register(f.rb);
    cpu.set_register(f.rt, result)?;
    set_logical_flags(cpu, result);
    Ok(next)
}

fn addr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra).wrapping_add(cpu.register(f.rb));
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn addf(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let a = cpu.register(f.ra);
    let b = cpu.register(f.rb);
    let result = add_with_flags(cpu, a, b);
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn subr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra).wrapping_sub(cpu.register(f.rb));
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn subf(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let a = cpu.register(f.ra);
    let b = cpu.register(f.rb);
    // Subtraction as two's-complement addition keeps the same 33-bit
    // carry/overflow derivation as ADDF.
    let result = add_with_flags(cpu, a, (!b).wrapping_add(1));
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn mulr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let wide = (cpu.register(f.ra) as u64) * (cpu.register(f.rb) as u64);
    cpu.set_register(f.rt, wide as u32)?;
    cpu.set_epr((wide >> 32) as u32);
    Ok(next)
}

fn mulf(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let wide = (cpu.register(f.ra) as u64) * (cpu.register(f.rb) as u64);
    let low = wide as u32;
    let high = (wide >> 32) as u32;
    cpu.set_register(f.rt, low)?;
    cpu.set_epr(high);
    cpu.set_flags(low & 0x8000_0000 != 0, false, high != 0, low == 0 && high == 0);
    Ok(next)
}

fn divr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, pc: u32, next: u32) -> CuResult<u32> {
    divide(cpu, f, pc, next, false)
}

fn divf(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, pc: u32, next: u32) -> CuResult<u32> {
    divide(cpu, f, pc, next, true)
}

fn divide(cpu: &mut Cpu, f: &Fields, pc: u32, next: u32, set_flags: bool) -> CuResult<u32> {
    let rb = cpu.register(f.rb);
    if rb == 0 {
        return Err(CuError::DivideByZero { pc });
    }
    let dividend = ((cpu.epr() as u64) << 32) | cpu.register(f.ra) as u64;
    let divisor = rb as u64;
    let quotient = (dividend / divisor) as u32;
    let remainder = (dividend % divisor) as u32;
    cpu.set_register(f.rt, quotient)?;
    cpu.set_epr(remainder);
    if set_flags {
        cpu.set_flags(quotient & 0x8000_0000 != 0, false, false, quotient == 0);
    }
    Ok(next)
}

fn rdep(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    cpu.set_register(f.rt, cpu.epr())?;
    Ok(next)
}

fn wrep(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    cpu.set_epr(cpu.register(f.ra));
    Ok(next)
}

fn jmpr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, _next: u32) -> CuResult<u32> {
    Ok(cpu
        .register(f.ra)
        .wrapping_add(cpu.register(f.rb) << f.imm5))
}

fn jalr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let target = cpu
        .register(f.ra)
        .wrapping_add(cpu.register(f.rb) << f.imm5);
    cpu.set_register(LINK_REGISTER as u8, next)?;
    Ok(target)
}

// --- I-type (op0 = 0x01..0x15) ---------------------------------------------

fn andi(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) & f.imm16 as u32;
    cpu.set_register(f.rt, result)?;
    set_logical_flags(cpu, result);
    Ok(next)
}

fn orri(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) | f.imm16 as u32;
    cpu.set_register(f.rt, result)?;
    set_logical_flags(cpu, result);
    Ok(next)
}

fn xori(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let result = cpu.register(f.ra) ^ f.imm16 as u32;
    cpu.set_register(f.rt, result)?;
    set_logical_flags(cpu, result);
    Ok(next)
}

fn addi(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let a = cpu.register(f.ra);
    let imm = sign_extend16(f.imm16) as u32;
    let result = add_with_flags(cpu, a, imm);
    cpu.set_register(f.rt, result)?;
    Ok(next)
}

fn jmpi(_cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, pc: u32, _next: u32) -> CuResult<u32> {
    Ok(pc.wrapping_add((sign_extend26(f.imm26) << 2) as u32))
}

fn jali(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, pc: u32, next: u32) -> CuResult<u32> {
    cpu.set_register(LINK_REGISTER as u8, next)?;
    Ok(pc.wrapping_add((sign_extend26(f.imm26) << 2) as u32))
}

fn flag_branch(
    cpu: &mut Cpu,
    f: &Fields,
    next: u32,
    flag_set: bool,
) -> CuResult<u32> {
    if flag_set {
        Ok(cpu
            .register(f.rt)
            .wrapping_add((sign_extend21(f.imm21) << 2) as u32))
    } else {
        Ok(next)
    }
}

fn brnr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let set = cpu.psr().negative();
    flag_branch(cpu, f, next, set)
}

fn bror(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let set = cpu.psr().overflow();
    flag_branch(cpu, f, next, set)
}

fn brcr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let set = cpu.psr().carry();
    flag_branch(cpu, f, next, set)
}

fn brzr(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let set = cpu.psr().zero();
    flag_branch(cpu, f, next, set)
}

fn brne(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, pc: u32, next: u32) -> CuResult<u32> {
    if cpu.register(f.rt) != cpu.register(f.ra) {
        Ok(pc.wrapping_add((sign_extend16(f.imm16) << 2) as u32))
    } else {
        Ok(next)
    }
}

fn brgt(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, pc: u32, next: u32) -> CuResult<u32> {
    if cpu.register(f.rt) > cpu.register(f.ra) {
        Ok(pc.wrapping_add((sign_extend16(f.imm16) << 2) as u32))
    } else {
        Ok(next)
    }
}

fn ldui(cpu: &mut Cpu, _mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    cpu.set_register(f.rt, (f.imm16 as u32) << 16)?;
    Ok(next)
}

fn load_address(cpu: &Cpu, f: &Fields) -> u32 {
    cpu.register(f.ra)
        .wrapping_add(sign_extend16(f.imm16) as u32)
}

fn ldwd(cpu: &mut Cpu, mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let addr = load_address(cpu, f);
    let value = mem.get_word(addr)?;
    cpu.set_register(f.rt, value)?;
    Ok(next)
}

fn ldhs(cpu: &mut Cpu, mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let addr = load_address(cpu, f);
    let value = mem.get_half(addr)? as i16 as i32 as u32;
    cpu.set_register(f.rt, value)?;
    Ok(next)
}

fn ldhu(cpu: &mut Cpu, mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let addr = load_address(cpu, f);
    let value = mem.get_half(addr)? as u32;
    cpu.set_register(f.rt, value)?;
    Ok(next)
}

fn ldbs(cpu: &mut Cpu, mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let addr = load_address(cpu, f);
    let value = mem.get_byte(addr)? as i8 as i32 as u32;
    cpu.set_register(f.rt, value)?;
    Ok(next)
}

fn ldbu(cpu: &mut Cpu, mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let addr = load_address(cpu, f);
    let value = mem.get_byte(addr)? as u32;
    cpu.set_register(f.rt, value)?;
    Ok(next)
}

fn stwd(cpu: &mut Cpu, mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let addr = load_address(cpu, f);
    mem.set_word(addr, cpu.register(f.rt))?;
    Ok(next)
}

fn sthw(cpu: &mut Cpu, mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let addr = load_address(cpu, f);
    mem.set_half(addr, cpu.register(f.rt) as u16)?;
    Ok(next)
}

fn stsb(cpu: &mut Cpu, mem: &mut Memory, f: &Fields, _pc: u32, next: u32) -> CuResult<u32> {
    let addr = load_address(cpu, f);
    mem.set_byte(addr, cpu.register(f.rt) as u8)?;
    Ok(next)
}

/// Computes `a + b` and sets Negative/Overflow/Carry/Zero from the 33-bit
/// intermediate, returning the wrapped 32-bit result.
fn add_with_flags(cpu: &mut Cpu, a: u32, b: u32) -> u32 {
    let wide = a as u64 + b as u64;
    let result = wide as u32;
    let carry = wide > u32::MAX as u64;
    let overflow = ((a ^ result) & (b ^ result) & 0x8000_0000) != 0;
    cpu.set_flags(result & 0x8000_0000 != 0, overflow, carry, result == 0);
    result
}

fn set_logical_flags(cpu: &mut Cpu, result: u32) {
    cpu.set_flags(result & 0x8000_0000 != 0, false, false, result == 0);
}

fn set_shift_flags(cpu: &mut Cpu, result: u32, wide: u64) {
    let carry = (wide >> 32) & 1 != 0;
    cpu.set_flags(result & 0x8000_0000 != 0, false, carry, result == 0);
}
