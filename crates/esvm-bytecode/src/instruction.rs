//! Bytecode opcodes and the decoded instruction representation.
//!
//! Spec section 4.8 describes each instruction as a 32-bit word: a 6-bit
//! opcode plus 8-bit `A` / 9-bit `B` / 9-bit `C` operand fields, with `B`
//! and `C` also combinable into an 18-bit `BC` or, with `A`, a 26-bit `ABC`
//! field; `B`/`C` values of 256 or more address the function's constant
//! pool rather than a register. This crate keeps that packed byte-level
//! [`Opcode`] for serialized/disassembled form, but decodes it once at load
//! time into the richer [`Instruction`] enum below (one variant per
//! opcode, carrying typed operand fields) rather than re-interpreting raw
//! `A`/`B`/`C` bit patterns on every dispatch — decoding cost paid once
//! beats an unsafe bit-packed struct re-read per instruction.

use serde::{Deserialize, Serialize};

use crate::operand::{ConstantIndex, FunctionIndex, JumpOffset, LocalIndex, Register};

/// Byte-sized opcode, grouped the way spec section 4.8 groups them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // Constants
    LoadUndefined = 0x00,
    LoadNull = 0x01,
    LoadTrue = 0x02,
    LoadFalse = 0x03,
    LoadInt = 0x04,
    LoadConst = 0x05,
    LoadThis = 0x06,

    // Variables / identifiers
    GetVar = 0x10,
    PutVar = 0x11,
    DeclVar = 0x12,
    DelVar = 0x13,
    CsVar = 0x14,
    GetLocal = 0x15,
    SetLocal = 0x16,
    GetUpvalue = 0x17,

    // Arithmetic
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    Div = 0x23,
    Mod = 0x24,
    Neg = 0x25,
    Inc = 0x26,
    Dec = 0x27,
    Exp = 0x28,

    // Bitwise
    BAnd = 0x30,
    BOr = 0x31,
    BXor = 0x32,
    BNot = 0x33,
    Shl = 0x34,
    Shr = 0x35,
    UShr = 0x36,

    // Comparison
    Eq = 0x40,
    NEq = 0x41,
    SEq = 0x42,
    SNEq = 0x43,
    Lt = 0x44,
    Le = 0x45,
    Gt = 0x46,
    Ge = 0x47,

    // Logical / unary
    LNot = 0x50,

    // Type operators
    TypeOf = 0x58,
    InstanceOf = 0x59,
    In = 0x5a,
    ToNumber = 0x5b,
    ToString = 0x5c,
    ToObject = 0x5d,

    // Objects
    NewObject = 0x60,
    GetProp = 0x61,
    PutProp = 0x62,
    DelProp = 0x63,
    HasProp = 0x64,
    CsProp = 0x65,
    InitGet = 0x66,
    InitSet = 0x67,
    DefProp = 0x68,

    // Arrays
    NewArray = 0x70,
    GetElem = 0x71,
    PutElem = 0x72,
    DelElem = 0x73,

    // Functions
    Closure = 0x80,
    Call = 0x81,
    CallMethod = 0x82,
    TailCall = 0x83,
    Return = 0x84,
    NewTarget = 0x85,
    Construct = 0x86,

    // Control flow
    Jump = 0x90,
    JumpIfTrue = 0x91,
    JumpIfFalse = 0x92,
    Label = 0x93,
    Nop = 0x94,

    // Exception handling
    TryCatch = 0xa0,
    EndTry = 0xa1,
    EndCatch = 0xa2,
    EndFin = 0xa3,
    Throw = 0xa4,

    // Iteration / enumeration
    InitEnum = 0xb0,
    NextEnum = 0xb1,
    Break = 0xb2,
    Continue = 0xb3,

    // Coroutines
    Yield = 0xd0,
    Resume = 0xd1,
}

impl Opcode {
    /// Decode a raw byte into an opcode, if it names one.
    pub fn from_byte(byte: u8) -> Option<Self> {
        // `Opcode` is `#[repr(u8)]` with explicit, sparse discriminants, so
        // this must enumerate rather than transmute.
        use Opcode::*;
        const ALL: &[Opcode] = &[
            LoadUndefined, LoadNull, LoadTrue, LoadFalse, LoadInt, LoadConst, LoadThis,
            GetVar, PutVar, DeclVar, DelVar, CsVar, GetLocal, SetLocal, GetUpvalue,
            Add, Sub, Mul, Div, Mod, Neg, Inc, Dec, Exp,
            BAnd, BOr, BXor, BNot, Shl, Shr, UShr,
            Eq, NEq, SEq, SNEq, Lt, Le, Gt, Ge,
            LNot,
            TypeOf, InstanceOf, In, ToNumber, ToString, ToObject,
            NewObject, GetProp, PutProp, DelProp, HasProp, CsProp, InitGet, InitSet, DefProp,
            NewArray, GetElem, PutElem, DelElem,
            Closure, Call, CallMethod, TailCall, Return, NewTarget, Construct,
            Jump, JumpIfTrue, JumpIfFalse, Label, Nop,
            TryCatch, EndTry, EndCatch, EndFin, Throw,
            InitEnum, NextEnum, Break, Continue,
            Yield, Resume,
        ];
        ALL.iter().copied().find(|op| *op as u8 == byte)
    }

    /// The opcode's mnemonic, as used in disassembly.
    pub fn name(&self) -> &'static str {
        use Opcode::*;
        match self {
            LoadUndefined => "LoadUndefined",
            LoadNull => "LoadNull",
            LoadTrue => "LoadTrue",
            LoadFalse => "LoadFalse",
            LoadInt => "LoadInt",
            LoadConst => "LoadConst",
            LoadThis => "LoadThis",
            GetVar => "GetVar",
            PutVar => "PutVar",
            DeclVar => "DeclVar",
            DelVar => "DelVar",
            CsVar => "CsVar",
            GetLocal => "GetLocal",
            SetLocal => "SetLocal",
            GetUpvalue => "GetUpvalue",
            Add => "Add",
            Sub => "Sub",
            Mul => "Mul",
            Div => "Div",
            Mod => "Mod",
            Neg => "Neg",
            Inc => "Inc",
            Dec => "Dec",
            Exp => "Exp",
            BAnd => "BAnd",
            BOr => "BOr",
            BXor => "BXor",
            BNot => "BNot",
            Shl => "Shl",
            Shr => "Shr",
            UShr => "UShr",
            Eq => "Eq",
            NEq => "NEq",
            SEq => "SEq",
            SNEq => "SNEq",
            Lt => "Lt",
            Le => "Le",
            Gt => "Gt",
            Ge => "Ge",
            LNot => "LNot",
            TypeOf => "TypeOf",
            InstanceOf => "InstanceOf",
            In => "In",
            ToNumber => "ToNumber",
            ToString => "ToString",
            ToObject => "ToObject",
            NewObject => "NewObject",
            GetProp => "GetProp",
            PutProp => "PutProp",
            DelProp => "DelProp",
            HasProp => "HasProp",
            CsProp => "CsProp",
            InitGet => "InitGet",
            InitSet => "InitSet",
            DefProp => "DefProp",
            NewArray => "NewArray",
            GetElem => "GetElem",
            PutElem => "PutElem",
            DelElem => "DelElem",
            Closure => "Closure",
            Call => "Call",
            CallMethod => "CallMethod",
            TailCall => "TailCall",
            Return => "Return",
            NewTarget => "NewTarget",
            Construct => "Construct",
            Jump => "Jump",
            JumpIfTrue => "JumpIfTrue",
            JumpIfFalse => "JumpIfFalse",
            Label => "Label",
            Nop => "Nop",
            TryCatch => "TryCatch",
            EndTry => "EndTry",
            EndCatch => "EndCatch",
            EndFin => "EndFin",
            Throw => "Throw",
            InitEnum => "InitEnum",
            NextEnum => "NextEnum",
            Break => "Break",
            Continue => "Continue",
            Yield => "Yield",
            Resume => "Resume",
        }
    }
}

/// A decoded instruction, one variant per [`Opcode`], with typed operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    LoadUndefined { dst: Register },
    LoadNull { dst: Register },
    LoadTrue { dst: Register },
    LoadFalse { dst: Register },
    LoadInt { dst: Register, value: i32 },
    LoadConst { dst: Register, constant: ConstantIndex },
    LoadThis { dst: Register },

    GetVar { dst: Register, name: ConstantIndex },
    PutVar { name: ConstantIndex, src: Register },
    DeclVar { name: ConstantIndex, init: Option<Register>, mutable: bool },
    DelVar { dst: Register, name: ConstantIndex },
    GetLocal { dst: Register, local: LocalIndex },
    SetLocal { local: LocalIndex, src: Register },
    GetUpvalue { dst: Register, upvalue: LocalIndex },

    Add { dst: Register, lhs: Register, rhs: Register },
    Sub { dst: Register, lhs: Register, rhs: Register },
    Mul { dst: Register, lhs: Register, rhs: Register },
    Div { dst: Register, lhs: Register, rhs: Register },
    Mod { dst: Register, lhs: Register, rhs: Register },
    Exp { dst: Register, lhs: Register, rhs: Register },
    Neg { dst: Register, src: Register },
    Inc { dst: Register, src: Register },
    Dec { dst: Register, src: Register },

    BAnd { dst: Register, lhs: Register, rhs: Register },
    BOr { dst: Register, lhs: Register, rhs: Register },
    BXor { dst: Register, lhs: Register, rhs: Register },
    BNot { dst: Register, src: Register },
    Shl { dst: Register, lhs: Register, rhs: Register },
    Shr { dst: Register, lhs: Register, rhs: Register },
    UShr { dst: Register, lhs: Register, rhs: Register },

    Eq { dst: Register, lhs: Register, rhs: Register },
    NEq { dst: Register, lhs: Register, rhs: Register },
    SEq { dst: Register, lhs: Register, rhs: Register },
    SNEq { dst: Register, lhs: Register, rhs: Register },
    Lt { dst: Register, lhs: Register, rhs: Register },
    Le { dst: Register, lhs: Register, rhs: Register },
    Gt { dst: Register, lhs: Register, rhs: Register },
    Ge { dst: Register, lhs: Register, rhs: Register },

    LNot { dst: Register, src: Register },

    TypeOf { dst: Register, src: Register },
    InstanceOf { dst: Register, lhs: Register, rhs: Register },
    In { dst: Register, lhs: Register, rhs: Register },
    ToNumber { dst: Register, src: Register },
    ToString { dst: Register, src: Register },
    ToObject { dst: Register, src: Register },

    NewObject { dst: Register },
    GetProp { dst: Register, obj: Register, key: Register },
    PutProp { obj: Register, key: Register, value: Register },
    DelProp { dst: Register, obj: Register, key: Register },
    HasProp { dst: Register, obj: Register, key: Register },
    InitGet { obj: Register, key: Register, getter: Register },
    InitSet { obj: Register, key: Register, setter: Register },
    DefProp { obj: Register, key: Register, value: Register, flags: u8 },

    NewArray { dst: Register, hint_len: u32 },
    GetElem { dst: Register, arr: Register, index: Register },
    PutElem { arr: Register, index: Register, value: Register },
    DelElem { dst: Register, arr: Register, index: Register },

    /// Instantiates a closure over the given function template, capturing
    /// the listed upvalues from the current activation.
    Closure { dst: Register, function: FunctionIndex },
    Call { dst: Register, callee: Register, this: Register, first_arg: Register, nargs: u8 },
    CallMethod { dst: Register, obj: Register, key: Register, first_arg: Register, nargs: u8 },
    TailCall { callee: Register, this: Register, first_arg: Register, nargs: u8 },
    Return { src: Register },
    NewTarget { dst: Register },
    Construct { dst: Register, callee: Register, first_arg: Register, nargs: u8 },

    Jump { target: JumpOffset },
    JumpIfTrue { cond: Register, target: JumpOffset },
    JumpIfFalse { cond: Register, target: JumpOffset },
    Label { id: u32 },
    Nop,

    /// Installs a catcher. `catch_target`/`finally_target` are bytecode
    /// offsets; absence means "no catch clause"/"no finally clause".
    TryCatch {
        catch_target: Option<JumpOffset>,
        finally_target: Option<JumpOffset>,
        catch_binding: Option<ConstantIndex>,
    },
    EndTry,
    EndCatch,
    EndFin,
    Throw { src: Register },

    InitEnum { dst: Register, obj: Register, flags: u8 },
    NextEnum { dst: Register, enum_reg: Register, done_target: JumpOffset },
    /// Unwinds out of `label` (0 = nearest enclosing loop) to `target`.
    /// The interpreter truncates the catch stack straight to the label's
    /// depth; any `Finally` catcher between the break site and `label` is
    /// dropped without running its handler, so a compiler targeting this
    /// format must emit an explicit inline replay of intervening `finally`
    /// blocks before a `Break` that would otherwise skip them.
    Break { label: u32, target: JumpOffset },
    /// Unwinds to `label`'s continue point at `target`. Same caveat as
    /// `Break`: intervening `finally` blocks are not run by this opcode
    /// and must be replayed by the compiler if required.
    Continue { label: u32, target: JumpOffset },

    Yield { dst: Register, value: Register },
    Resume { dst: Register, thread: Register, value: Register },
}

impl Instruction {
    /// The opcode this instruction decodes to, for disassembly/tracing.
    pub fn opcode(&self) -> Opcode {
        use Instruction as I;
        match self {
            I::LoadUndefined { .. } => Opcode::LoadUndefined,
            I::LoadNull { .. } => Opcode::LoadNull,
            I::LoadTrue { .. } => Opcode::LoadTrue,
            I::LoadFalse { .. } => Opcode::LoadFalse,
            I::LoadInt { .. } => Opcode::LoadInt,
            I::LoadConst { .. } => Opcode::LoadConst,
            I::LoadThis { .. } => Opcode::LoadThis,
            I::GetVar { .. } => Opcode::GetVar,
            I::PutVar { .. } => Opcode::PutVar,
            I::DeclVar { .. } => Opcode::DeclVar,
            I::DelVar { .. } => Opcode::DelVar,
            I::GetLocal { .. } => Opcode::GetLocal,
            I::SetLocal { .. } => Opcode::SetLocal,
            I::GetUpvalue { .. } => Opcode::GetUpvalue,
            I::Add { .. } => Opcode::Add,
            I::Sub { .. } => Opcode::Sub,
            I::Mul { .. } => Opcode::Mul,
            I::Div { .. } => Opcode::Div,
            I::Mod { .. } => Opcode::Mod,
            I::Exp { .. } => Opcode::Exp,
            I::Neg { .. } => Opcode::Neg,
            I::Inc { .. } => Opcode::Inc,
            I::Dec { .. } => Opcode::Dec,
            I::BAnd { .. } => Opcode::BAnd,
            I::BOr { .. } => Opcode::BOr,
            I::BXor { .. } => Opcode::BXor,
            I::BNot { .. } => Opcode::BNot,
            I::Shl { .. } => Opcode::Shl,
            I::Shr { .. } => Opcode::Shr,
            I::UShr { .. } => Opcode::UShr,
            I::Eq { .. } => Opcode::Eq,
            I::NEq { .. } => Opcode::NEq,
            I::SEq { .. } => Opcode::SEq,
            I::SNEq { .. } => Opcode::SNEq,
            I::Lt { .. } => Opcode::Lt,
            I::Le { .. } => Opcode::Le,
            I::Gt { .. } => Opcode::Gt,
            I::Ge { .. } => Opcode::Ge,
            I::LNot { .. } => Opcode::LNot,
            I::TypeOf { .. } => Opcode::TypeOf,
            I::InstanceOf { .. } => Opcode::InstanceOf,
            I::In { .. } => Opcode::In,
            I::ToNumber { .. } => Opcode::ToNumber,
            I::ToString { .. } => Opcode::ToString,
            I::ToObject { .. } => Opcode::ToObject,
            I::NewObject { .. } => Opcode::NewObject,
            I::GetProp { .. } => Opcode::GetProp,
            I::PutProp { .. } => Opcode::PutProp,
            I::DelProp { .. } => Opcode::DelProp,
            I::HasProp { .. } => Opcode::HasProp,
            I::InitGet { .. } => Opcode::InitGet,
            I::InitSet { .. } => Opcode::InitSet,
            I::DefProp { .. } => Opcode::DefProp,
            I::NewArray { .. } => Opcode::NewArray,
            I::GetElem { .. } => Opcode::GetElem,
            I::PutElem { .. } => Opcode::PutElem,
            I::DelElem { .. } => Opcode::DelElem,
            I::Closure { .. } => Opcode::Closure,
            I::Call { .. } => Opcode::Call,
            I::CallMethod { .. } => Opcode::CallMethod,
            I::TailCall { .. } => Opcode::TailCall,
            I::Return { .. } => Opcode::Return,
            I::NewTarget { .. } => Opcode::NewTarget,
            I::Construct { .. } => Opcode::Construct,
            I::Jump { .. } => Opcode::Jump,
            I::JumpIfTrue { .. } => Opcode::JumpIfTrue,
            I::JumpIfFalse { .. } => Opcode::JumpIfFalse,
            I::Label { .. } => Opcode::Label,
            I::Nop => Opcode::Nop,
            I::TryCatch { .. } => Opcode::TryCatch,
            I::EndTry => Opcode::EndTry,
            I::EndCatch => Opcode::EndCatch,
            I::EndFin => Opcode::EndFin,
            I::Throw { .. } => Opcode::Throw,
            I::InitEnum { .. } => Opcode::InitEnum,
            I::NextEnum { .. } => Opcode::NextEnum,
            I::Break { .. } => Opcode::Break,
            I::Continue { .. } => Opcode::Continue,
            I::Yield { .. } => Opcode::Yield,
            I::Resume { .. } => Opcode::Resume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_roundtrip() {
        for op in [Opcode::Add, Opcode::Call, Opcode::TryCatch, Opcode::Yield] {
            let byte = op as u8;
            assert_eq!(Opcode::from_byte(byte), Some(op));
        }
    }

    #[test]
    fn instruction_opcode_matches() {
        let instr = Instruction::Add {
            dst: Register(0),
            lhs: Register(1),
            rhs: Register(2),
        };
        assert_eq!(instr.opcode(), Opcode::Add);
    }
}
