//! Thin, safe wrappers over the raw ptrace(2) requests this debugger
//! needs: traceme, continue, single-step, peek-data, poke-data,
//! get-regs, set-regs. Calls `libc::ptrace` directly rather than through
//! a higher-level wrapper, since this crate only targets one
//! architecture.

use nix::errno::Errno;
use nix::unistd::Pid;
use std::ffi::c_void;

pub type Regs = libc::user_regs_struct;

fn check(ret: libc::c_long) -> nix::Result<libc::c_long> {
    if ret == -1 {
        let errno = Errno::last();
        if errno != Errno::UnknownErrno && errno as i32 != 0 {
            return Err(errno);
        }
    }
    Ok(ret)
}

/// Request that the current (about-to-exec) process be traced by its
/// parent. Must be called in the child after `fork`, before `exec`.
pub fn traceme() -> nix::Result<()> {
    Errno::clear();
    check(unsafe { libc::ptrace(libc::PTRACE_TRACEME, 0, std::ptr::null_mut::<c_void>(), std::ptr::null_mut::<c_void>()) })?;
    Ok(())
}

/// Read one word (8 bytes on x86-64) from the tracee's address space.
pub fn peek_data(pid: Pid, addr: u64) -> nix::Result<u64> {
    Errno::clear();
    let ret = check(unsafe {
        libc::ptrace(
            libc::PTRACE_PEEKDATA,
            pid.as_raw(),
            addr as *mut c_void,
            std::ptr::null_mut::<c_void>(),
        )
    })?;
    Ok(ret as u64)
}

/// Write one word (8 bytes on x86-64) into the tracee's address space.
pub fn poke_data(pid: Pid, addr: u64, data: u64) -> nix::Result<()> {
    Errno::clear();
    check(unsafe {
        libc::ptrace(
            libc::PTRACE_POKEDATA,
            pid.as_raw(),
            addr as *mut c_void,
            data as *mut c_void,
        )
    })?;
    Ok(())
}

pub fn cont(pid: Pid, sig: i32) -> nix::Result<()> {
    Errno::clear();
    check(unsafe {
        libc::ptrace(
            libc::PTRACE_CONT,
            pid.as_raw(),
            std::ptr::null_mut::<c_void>(),
            sig as *mut c_void,
        )
    })?;
    Ok(())
}

pub fn single_step(pid: Pid, sig: i32) -> nix::Result<()> {
    Errno::clear();
    check(unsafe {
        libc::ptrace(
            libc::PTRACE_SINGLESTEP,
            pid.as_raw(),
            std::ptr::null_mut::<c_void>(),
            sig as *mut c_void,
        )
    })?;
    Ok(())
}

pub fn get_regs(pid: Pid) -> nix::Result<Regs> {
    Errno::clear();
    let mut regs = std::mem::MaybeUninit::<Regs>::uninit();
    check(unsafe {
        libc::ptrace(
            libc::PTRACE_GETREGS,
            pid.as_raw(),
            std::ptr::null_mut::<c_void>(),
            regs.as_mut_ptr() as *mut c_void,
        )
    })?;
    Ok(unsafe { regs.assume_init() })
}

pub fn set_regs(pid: Pid, regs: &Regs) -> nix::Result<()> {
    Errno::clear();
    check(unsafe {
        libc::ptrace(
            libc::PTRACE_SETREGS,
            pid.as_raw(),
            std::ptr::null_mut::<c_void>(),
            regs as *const Regs as *mut c_void,
        )
    })?;
    Ok(())
}
