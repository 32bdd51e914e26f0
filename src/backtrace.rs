//! Stack unwinding by frame pointers.
//!
//! Every function compiled with frame pointers starts by pushing the caller's
//! `rbp` and pointing `rbp` at the pushed copy. The result is a linked list of
//! frame records threaded through the stack:
//!
//! ```text
//!                 +----------------+
//!   fp + 48   ->  |     arg 4      |
//!                 |      ...       |
//!   fp + 16   ->  |     arg 0      |
//!   fp + 8    ->  | return address |
//!   fp        ->  |   caller's fp  | ---> next record, 0 at the end
//!                 +----------------+
//! ```
//!
//! [`Backtrace`] follows this list. It reads every word through a
//! [`MemoryView`] of the stack, so a corrupted chain ends the walk instead of
//! faulting the kernel.
//!
//! The "arguments" are simply the five words above the return address. They
//! are only arguments when the callee spilled them there; on x86_64 arguments
//! are passed in registers, so treat them as a hint.
use crate::debug_info::{DebugInfo, DebugLocation};
use crate::mm::memory::{MemoryView, WORD_SIZE};

/// Default bound on the number of frames reported by a [`Backtrace`].
pub const MAX_BACKTRACE_DEPTH: usize = 256;

/// Number of words after the return address reported as arguments.
pub const FRAME_ARGS: usize = 5;

/// A frame record as found on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Address of the record.
    pub fp: usize,
    /// The caller's frame pointer. 0 terminates the chain.
    pub saved_fp: usize,
    /// Return address into the caller.
    pub ret: usize,
    /// Words following the return address; `None` for a word outside the
    /// stack.
    pub args: [Option<usize>; FRAME_ARGS],
}

impl Frame {
    /// Reads the record at `fp`.
    ///
    /// Returns `None` unless both the saved frame pointer and the return
    /// address lie in `stack`.
    pub fn read(stack: &MemoryView<'_>, fp: usize) -> Option<Self> {
        let word = |slot: usize| {
            slot.checked_mul(WORD_SIZE)
                .and_then(|ofs| fp.checked_add(ofs))
                .and_then(|addr| stack.read_word(addr))
        };
        Some(Self {
            fp,
            saved_fp: word(0)?,
            ret: word(1)?,
            args: core::array::from_fn(|i| word(2 + i)),
        })
    }
}

struct Word(Option<usize>);

impl core::fmt::Display for Word {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(w) => write!(f, "{w:016x}"),
            None => f.write_str("????????????????"),
        }
    }
}

/// One reported frame: the record and where its return address points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktraceEntry<'a> {
    pub frame: Frame,
    pub location: DebugLocation<'a>,
}

impl core::fmt::Display for BacktraceEntry<'_> {
    /// Formats the entry as two lines:
    ///
    /// ```text
    /// rbp ffff80000010ff80  rip ffffffff8010012a  args 0000000000000001 ...
    ///      src/monitor.rs:42: kmon::monitor::monitor+298
    /// ```
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let Frame { fp, ret, args, .. } = self.frame;
        write!(f, "rbp {fp:016x}  rip {ret:016x}  args")?;
        for arg in args {
            write!(f, " {}", Word(arg))?;
        }
        write!(
            f,
            "\n     {}:{}: {}+{}",
            self.location.file,
            self.location.line,
            self.location.function,
            self.location.offset(ret)
        )
    }
}

/// A lazy walk of the frame-pointer chain, nearest frame first.
///
/// The walk ends at a zero frame pointer, at a record that is not inside the
/// stack, at a return address that does not resolve, or after `max_depth`
/// frames, whichever comes first.
pub struct Backtrace<'a, D: DebugInfo + ?Sized> {
    stack: MemoryView<'a>,
    debug_info: &'a D,
    fp: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a, D: DebugInfo + ?Sized> Backtrace<'a, D> {
    /// Starts a walk at the record `fp` on `stack`.
    pub fn new(stack: MemoryView<'a>, debug_info: &'a D, fp: usize) -> Self {
        Self {
            stack,
            debug_info,
            fp,
            depth: 0,
            max_depth: MAX_BACKTRACE_DEPTH,
        }
    }

    /// Bounds the walk to `max_depth` frames.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[inline]
    fn finish(&mut self) -> Option<BacktraceEntry<'a>> {
        self.fp = 0;
        None
    }
}

impl<'a, D: DebugInfo + ?Sized> Iterator for Backtrace<'a, D> {
    type Item = BacktraceEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fp == 0 {
            return None;
        }
        if self.depth >= self.max_depth {
            warning!(
                "backtrace: stopped after {} frames at rbp {:016x}",
                self.max_depth,
                self.fp
            );
            return self.finish();
        }
        let Some(frame) = Frame::read(&self.stack, self.fp) else {
            debug!("backtrace: rbp {:016x} is outside of {:?}", self.fp, self.stack);
            return self.finish();
        };
        let Some(location) = self.debug_info.resolve(frame.ret) else {
            return self.finish();
        };
        self.fp = frame.saved_fp;
        self.depth += 1;
        Some(BacktraceEntry { frame, location })
    }
}

impl<D: DebugInfo + ?Sized> core::iter::FusedIterator for Backtrace<'_, D> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_info::testing::FakeDebugInfo;
    use alloc::{format, vec, vec::Vec};

    const BASE: usize = 0xffff_8000_0010_0000;

    struct Stack(Vec<u8>);

    impl Stack {
        fn new(len: usize) -> Self {
            Self(vec![0; len])
        }

        fn put(&mut self, addr: usize, words: &[usize]) {
            for (i, w) in words.iter().enumerate() {
                let at = addr - BASE + i * WORD_SIZE;
                self.0[at..at + WORD_SIZE].copy_from_slice(&w.to_ne_bytes());
            }
        }

        fn view(&self) -> MemoryView<'_> {
            MemoryView::new(BASE, &self.0)
        }
    }

    fn kernel() -> FakeDebugInfo {
        FakeDebugInfo(vec![
            (0x1000, 0x1100, "kern/a.rs", 12, "kmon::a"),
            (0x2000, 0x2100, "kern/b.rs", 34, "kmon::b"),
            (0x3000, 0x3100, "kern/entry.rs", 56, "kmon::entry"),
        ])
    }

    #[test]
    fn walks_the_chain_nearest_first() {
        let mut stack = Stack::new(0x400);
        stack.put(BASE + 0x100, &[BASE + 0x200, 0x1000 + 10, 1, 2, 3, 4, 5]);
        stack.put(BASE + 0x200, &[BASE + 0x300, 0x2000 + 20, 6, 7, 8, 9, 10]);
        stack.put(BASE + 0x300, &[0, 0x3000, 0, 0, 0, 0, 0]);
        let debug_info = kernel();

        let entries: Vec<_> = Backtrace::new(stack.view(), &debug_info, BASE + 0x100).collect();
        assert_eq!(entries.len(), 3);

        let names: Vec<_> = entries
            .iter()
            .map(|e| (e.location.function, e.location.offset(e.frame.ret)))
            .collect();
        assert_eq!(
            names,
            [("kmon::a", 10), ("kmon::b", 20), ("kmon::entry", 0)]
        );
        assert!(entries.windows(2).all(|w| w[0].frame.fp < w[1].frame.fp));
        assert_eq!(entries[1].frame.args, [Some(6), Some(7), Some(8), Some(9), Some(10)]);
    }

    #[test]
    fn entry_format() {
        let mut stack = Stack::new(0x400);
        stack.put(BASE + 0x100, &[0, 0x1000 + 10, 1, 2, 3, 4, 0xdead_beef]);
        let debug_info = kernel();

        let entry = Backtrace::new(stack.view(), &debug_info, BASE + 0x100)
            .next()
            .unwrap();
        assert_eq!(
            format!("{entry}"),
            "rbp ffff800000100100  rip 000000000000100a  args \
             0000000000000001 0000000000000002 0000000000000003 \
             0000000000000004 00000000deadbeef\n     kern/a.rs:12: kmon::a+10"
        );
    }

    #[test]
    fn zero_frame_pointer_is_an_empty_backtrace() {
        let stack = Stack::new(0x100);
        let debug_info = kernel();
        assert_eq!(Backtrace::new(stack.view(), &debug_info, 0).count(), 0);
    }

    #[test]
    fn stops_at_an_unresolvable_return_address() {
        let mut stack = Stack::new(0x400);
        stack.put(BASE + 0x100, &[BASE + 0x200, 0x1000]);
        stack.put(BASE + 0x200, &[BASE + 0x300, 0x2000]);
        // Not code.
        stack.put(BASE + 0x300, &[0, 0x9999]);
        let debug_info = kernel();

        let entries: Vec<_> = Backtrace::new(stack.view(), &debug_info, BASE + 0x100).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].location.function, "kmon::b");
    }

    #[test]
    fn records_must_lie_on_the_stack() {
        let mut stack = Stack::new(0x100);
        // The saved fp fits, the return address does not.
        stack.put(BASE + 0xf8, &[0]);
        let debug_info = kernel();
        assert_eq!(Backtrace::new(stack.view(), &debug_info, BASE + 0xf8).count(), 0);

        // Below the stack.
        assert_eq!(Backtrace::new(stack.view(), &debug_info, BASE - 0x10).count(), 0);
        // Near the top of the address space.
        assert_eq!(Backtrace::new(stack.view(), &debug_info, usize::MAX - 8).count(), 0);
    }

    #[test]
    fn arguments_past_the_stack_are_unreadable() {
        let mut stack = Stack::new(0x100);
        stack.put(BASE + 0xe8, &[0, 0x1000, 7]);
        let debug_info = kernel();

        let entry = Backtrace::new(stack.view(), &debug_info, BASE + 0xe8)
            .next()
            .unwrap();
        assert_eq!(entry.frame.args, [Some(7), None, None, None, None]);
        assert!(format!("{entry}").contains("args 0000000000000007 ???????????????? "));
    }

    #[test]
    fn cyclic_chains_are_cut_off() {
        let mut stack = Stack::new(0x200);
        stack.put(BASE + 0x100, &[BASE + 0x100, 0x1000]);
        let debug_info = kernel();

        let backtrace = Backtrace::new(stack.view(), &debug_info, BASE + 0x100);
        assert_eq!(backtrace.count(), MAX_BACKTRACE_DEPTH);

        let backtrace = Backtrace::new(stack.view(), &debug_info, BASE + 0x100).with_max_depth(3);
        assert_eq!(backtrace.count(), 3);
    }
}
