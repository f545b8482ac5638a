//! Typed access to the kernel's x86-64 `user_regs_struct`. Exposes the
//! block as a plain struct plus a small `Register` enum mapped to
//! accessor functions for the one place (`DumpRegisters`) that needs to
//! iterate "all of them" generically.

use crate::ptrace::Regs;

/// Named general-purpose registers the debugger core actually
/// addresses individually (program counter, frame pointer, stack
/// pointer). DumpRegisters below walks the full kernel block, not just
/// these three; this enum exists for the handful of call sites that want
/// one named register rather than the whole struct.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Register {
    Rip,
    Rbp,
    Rsp,
}

impl Register {
    pub fn get(self, regs: &Regs) -> u64 {
        match self {
            Register::Rip => regs.rip,
            Register::Rbp => regs.rbp,
            Register::Rsp => regs.rsp,
        }
    }

    pub fn set(self, regs: &mut Regs, value: u64) {
        match self {
            Register::Rip => regs.rip = value,
            Register::Rbp => regs.rbp = value,
            Register::Rsp => regs.rsp = value,
        }
    }
}

/// All fields of `user_regs_struct`, in kernel declaration order, as
/// `(name, value)` pairs. Used by `DumpRegisters` to print
/// `Name: 0x<hex>` for every general-purpose register.
pub fn all_fields(regs: &Regs) -> Vec<(&'static str, u64)> {
    vec![
        ("r15", regs.r15),
        ("r14", regs.r14),
        ("r13", regs.r13),
        ("r12", regs.r12),
        ("rbp", regs.rbp),
        ("rbx", regs.rbx),
        ("r11", regs.r11),
        ("r10", regs.r10),
        ("r9", regs.r9),
        ("r8", regs.r8),
        ("rax", regs.rax),
        ("rcx", regs.rcx),
        ("rdx", regs.rdx),
        ("rsi", regs.rsi),
        ("rdi", regs.rdi),
        ("orig_rax", regs.orig_rax),
        ("rip", regs.rip),
        ("cs", regs.cs),
        ("eflags", regs.eflags),
        ("rsp", regs.rsp),
        ("ss", regs.ss),
        ("fs_base", regs.fs_base),
        ("gs_base", regs.gs_base),
        ("ds", regs.ds),
        ("es", regs.es),
        ("fs", regs.fs),
        ("gs", regs.gs),
    ]
}
