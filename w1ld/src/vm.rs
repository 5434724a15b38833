//! Virtual machine.
use log::{debug, info};

use crate::{
    bytecode::{Opcode, Program},
    constants::*,
    cpu::Cpu,
    error::{ResourceError, Segment, W1ldError, W1ldResult},
    host::{Host, StdHost},
    printf,
};

pub struct Vm<H: Host = StdHost> {
    cpu: Cpu,
    text: Box<[Word]>,
    host: H,
    /// Set once the program has executed `EXIT`.
    exit: Option<Word>,
    /// Scratch buffer for `printf` output.
    print_buf: Vec<u8>,
    conf: VmConf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// Returned by `JMP`, `CALL`, `LEV`, and by conditional
    /// jumps that were taken.
    Jump,
    /// Program has exited with the given value.
    Exit(Word),
}

/// VM Configuration Parameters.
#[derive(Debug, Clone)]
pub struct VmConf {
    /// Size in bytes of each of the data, heap and stack regions.
    pub pool_size: usize,
}

impl Default for VmConf {
    fn default() -> Self {
        Self {
            pool_size: POOL_SIZE,
        }
    }
}

impl Vm<StdHost> {
    pub fn new(conf: VmConf) -> W1ldResult<Self> {
        Self::with_host(conf, StdHost::new())
    }
}

impl<H: Host> Vm<H> {
    pub fn with_host(conf: VmConf, host: H) -> W1ldResult<Self> {
        Ok(Self {
            cpu: Cpu::new(conf.pool_size)?,
            text: Box::new([]),
            host,
            exit: None,
            print_buf: Vec::new(),
            conf,
        })
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &VmConf {
        &self.conf
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Exit value, once the program has finished.
    pub fn exit_code(&self) -> Option<Word> {
        self.exit
    }

    /// Load a program and prepare the call to `main(argc, argv)`.
    ///
    /// The argument strings and the `argv` array are placed on the heap.
    /// `main` returns into the exit stub at the start of the text segment.
    pub fn load_program<S: AsRef<str>>(&mut self, program: &Program, args: &[S]) -> W1ldResult<()> {
        if program.entry >= program.text.len() {
            return Err(ResourceError::Text {
                pc: program.entry as Word,
            }
            .into());
        }

        // Start with clean memory to avoid leaking previous program.
        self.cpu.memory.clear();
        self.cpu.memory.load_data(&program.data)?;
        self.cpu.reset();
        self.text = program.text.clone();
        self.exit = None;

        let mut argv = Vec::with_capacity(args.len() + 1);
        for arg in args {
            let bytes = arg.as_ref().as_bytes();
            let addr = self.heap_alloc(bytes.len() + 1)?;
            self.cpu
                .memory
                .slice_mut(addr, bytes.len() as Word)?
                .copy_from_slice(bytes);
            argv.push(addr);
        }
        // Null terminated, as in C.
        argv.push(0);

        let argv_addr = self.heap_alloc(argv.len() * WORD_SIZE)?;
        for (i, ptr) in argv.iter().enumerate() {
            self.cpu
                .memory
                .store_word(argv_addr + (i * WORD_SIZE) as Word, *ptr)?;
        }

        self.cpu.push(args.len() as Word)?;
        self.cpu.push(argv_addr)?;
        self.cpu.push(EXIT_STUB as Word)?;
        self.cpu.pc = program.entry;

        debug!(
            "loaded {} text words, {} data bytes, entry {:04}, argc {}",
            self.text.len(),
            program.data.len(),
            program.entry,
            args.len()
        );

        Ok(())
    }

    fn heap_alloc(&mut self, size: usize) -> W1ldResult<Word> {
        self.cpu
            .memory
            .alloc(size as Word)
            .map(|addr| addr as Word)
            .ok_or(W1ldError::Allocation {
                segment: Segment::Heap,
                size,
            })
    }
}

/// Interpreter
impl<H: Host> Vm<H> {
    /// Run until the program exits, returning its exit value.
    pub fn execute(&mut self) -> W1ldResult<Word> {
        loop {
            if let Flow::Exit(code) = self.step()? {
                return Ok(code);
            }
        }
    }

    /// Execute at most `step_count` instructions.
    pub fn run_steps(&mut self, step_count: usize) -> W1ldResult<Flow> {
        for _ in 0..step_count {
            if let Flow::Exit(code) = self.step()? {
                return Ok(Flow::Exit(code));
            }
        }

        Ok(Flow::Ok)
    }

    /// Read the word at the program counter and advance.
    #[inline(always)]
    fn fetch(&mut self) -> Result<Word, ResourceError> {
        match self.text.get(self.cpu.pc) {
            Some(word) => {
                self.cpu.pc += 1;
                Ok(*word)
            }
            None => Err(ResourceError::Text {
                pc: self.cpu.pc as Word,
            }),
        }
    }

    /// Text address operand, checked against the text segment.
    #[inline(always)]
    fn fetch_target(&mut self) -> Result<TextAddr, ResourceError> {
        let target = self.fetch()?;
        match usize::try_from(target) {
            Ok(addr) if addr < self.text.len() => Ok(addr),
            _ => Err(ResourceError::Text { pc: target }),
        }
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> W1ldResult<Flow> {
        if let Some(code) = self.exit {
            return Ok(Flow::Exit(code));
        }

        let pc = self.cpu.pc;
        let word = self.fetch()?;
        let op = Opcode::decode(word).ok_or(W1ldError::Decode { word, pc })?;
        self.cpu.cycle += 1;

        op_trace(op, pc, &self.text, &self.cpu);

        let mut control_flow = Flow::Ok;

        match op {
            // ----------------------------------------------------------------
            // Loads and stores
            Opcode::LEA => {
                let n = self.fetch()?;
                self.cpu.ax = (self.cpu.bp as Word).wrapping_add(n.wrapping_mul(WORD_SIZE as Word));
            }
            Opcode::IMM => {
                self.cpu.ax = self.fetch()?;
            }
            Opcode::LI => {
                self.cpu.ax = self.cpu.memory.load_word(self.cpu.ax)?;
            }
            // char is signed
            Opcode::LC => {
                self.cpu.ax = self.cpu.memory.load_byte(self.cpu.ax)? as i8 as Word;
            }
            Opcode::SI => {
                let addr = self.cpu.pop()?;
                self.cpu.memory.store_word(addr, self.cpu.ax)?;
            }
            Opcode::SC => {
                let addr = self.cpu.pop()?;
                let byte = self.cpu.ax as u8;
                self.cpu.memory.store_byte(addr, byte)?;
                self.cpu.ax = byte as i8 as Word;
            }
            Opcode::PUSH => {
                self.cpu.push(self.cpu.ax)?;
            }

            // ----------------------------------------------------------------
            // Control flow
            Opcode::JMP => {
                self.cpu.pc = self.fetch_target()?;
                control_flow = Flow::Jump;
            }
            Opcode::JEZ => {
                let target = self.fetch_target()?;
                if self.cpu.ax == 0 {
                    self.cpu.pc = target;
                    control_flow = Flow::Jump;
                }
            }
            Opcode::JNZ => {
                let target = self.fetch_target()?;
                if self.cpu.ax != 0 {
                    self.cpu.pc = target;
                    control_flow = Flow::Jump;
                }
            }
            Opcode::CALL => {
                let target = self.fetch_target()?;
                self.cpu.push(self.cpu.pc as Word)?;
                self.cpu.pc = target;
                control_flow = Flow::Jump;
            }
            // Push the caller's frame and reserve n local words.
            Opcode::ENT => {
                let n = self.fetch()?;
                self.cpu.push(self.cpu.bp as Word)?;
                self.cpu.bp = self.cpu.sp;
                let sp = (self.cpu.sp as Word).wrapping_sub(n.wrapping_mul(WORD_SIZE as Word));
                self.cpu.set_sp(sp)?;
            }
            Opcode::ADJ => {
                let n = self.fetch()?;
                let sp = (self.cpu.sp as Word).wrapping_add(n.wrapping_mul(WORD_SIZE as Word));
                self.cpu.set_sp(sp)?;
            }
            Opcode::LEV => {
                self.cpu.set_sp(self.cpu.bp as Word)?;
                let bp = self.cpu.pop()?;
                let ret = self.cpu.pop()?;
                self.cpu.bp = usize::try_from(bp).map_err(|_| ResourceError::Stack { sp: bp })?;
                self.cpu.pc = usize::try_from(ret).map_err(|_| ResourceError::Text { pc: ret })?;
                control_flow = Flow::Jump;
            }

            // ----------------------------------------------------------------
            // Arithmetic, left operand on the stack
            Opcode::OR => self.binary(|a, b| a | b)?,
            Opcode::XOR => self.binary(|a, b| a ^ b)?,
            Opcode::AND => self.binary(|a, b| a & b)?,
            Opcode::EQ => self.binary(|a, b| (a == b) as Word)?,
            Opcode::NE => self.binary(|a, b| (a != b) as Word)?,
            Opcode::LT => self.binary(|a, b| (a < b) as Word)?,
            Opcode::GT => self.binary(|a, b| (a > b) as Word)?,
            Opcode::LE => self.binary(|a, b| (a <= b) as Word)?,
            Opcode::GE => self.binary(|a, b| (a >= b) as Word)?,
            Opcode::SHL => self.binary(|a, b| a.wrapping_shl(b as u32))?,
            Opcode::SHR => self.binary(|a, b| a.wrapping_shr(b as u32))?,
            Opcode::ADD => self.binary(Word::wrapping_add)?,
            Opcode::SUB => self.binary(Word::wrapping_sub)?,
            Opcode::MUL => self.binary(Word::wrapping_mul)?,
            Opcode::DIV | Opcode::MOD => {
                let a = self.cpu.pop()?;
                let b = self.cpu.ax;
                if b == 0 {
                    return Err(W1ldError::DivisionByZero { pc });
                }
                self.cpu.ax = match op {
                    Opcode::DIV => a.wrapping_div(b),
                    _ => a.wrapping_rem(b),
                };
            }

            // ----------------------------------------------------------------
            // Builtins, arguments on the stack with the last one on top
            Opcode::OPEN => {
                let path = self.cpu.memory.c_str(self.cpu.stack_arg(1)?)?;
                let path = String::from_utf8_lossy(path).into_owned();
                let flags = self.cpu.stack_arg(0)?;
                self.cpu.ax = self.host.open(&path, flags);
            }
            Opcode::READ => {
                let fd = self.cpu.stack_arg(2)?;
                let buf = self.cpu.stack_arg(1)?;
                let count = self.cpu.stack_arg(0)?;
                let buf = self.cpu.memory.slice_mut(buf, count)?;
                self.cpu.ax = self.host.read(fd, buf);
            }
            Opcode::CLOS => {
                let fd = self.cpu.stack_arg(0)?;
                self.cpu.ax = self.host.close(fd);
            }
            Opcode::PRTF => self.printf()?,
            Opcode::MALC => {
                let size = self.cpu.stack_arg(0)?;
                self.cpu.ax = match self.cpu.memory.alloc(size) {
                    Some(addr) => addr as Word,
                    None => {
                        debug!("malloc({size}) failed, heap exhausted");
                        0
                    }
                };
            }
            Opcode::MSET => {
                let dst = self.cpu.stack_arg(2)?;
                let value = self.cpu.stack_arg(1)?;
                let size = self.cpu.stack_arg(0)?;
                self.cpu.memory.slice_mut(dst, size)?.fill(value as u8);
                self.cpu.ax = dst;
            }
            Opcode::MCMP => {
                let a = self.cpu.stack_arg(2)?;
                let b = self.cpu.stack_arg(1)?;
                let size = self.cpu.stack_arg(0)?;
                let a = self.cpu.memory.slice(a, size)?;
                let b = self.cpu.memory.slice(b, size)?;
                self.cpu.ax = a
                    .iter()
                    .zip(b)
                    .find(|(x, y)| x != y)
                    .map(|(x, y)| *x as Word - *y as Word)
                    .unwrap_or(0);
            }
            Opcode::EXIT => {
                let code = self.cpu.stack_arg(0)?;
                info!("exit({}) cycle = {}", code, self.cpu.cycle);
                self.exit = Some(code);
                control_flow = Flow::Exit(code);
            }
        }

        Ok(control_flow)
    }

    /// Pop the left operand and combine it with `ax`.
    #[inline(always)]
    fn binary(&mut self, f: impl Fn(Word, Word) -> Word) -> Result<(), ResourceError> {
        let a = self.cpu.pop()?;
        self.cpu.ax = f(a, self.cpu.ax);
        Ok(())
    }

    /// `printf` finds its argument count in the `ADJ` that follows the call.
    fn printf(&mut self) -> W1ldResult<()> {
        let argc = match self.text.get(self.cpu.pc..self.cpu.pc + 2) {
            Some(&[adj, n]) if adj == Opcode::ADJ.as_word() && n > 0 => n as usize,
            _ => {
                self.cpu.ax = 0;
                return Ok(());
            }
        };
        if argc > self.cpu.stack_depth() {
            return Err(ResourceError::Stack {
                sp: self.cpu.sp() as Word,
            }
            .into());
        }

        // Format string was pushed first, so it sits deepest.
        let mut args = [0; PRINTF_MAX_ARGS];
        let forwarded = argc.min(PRINTF_MAX_ARGS);
        for (i, arg) in args.iter_mut().enumerate().take(forwarded) {
            *arg = self.cpu.stack_arg(argc - 1 - i)?;
        }

        let fmt = self.cpu.memory.c_str(args[0])?;
        self.print_buf.clear();
        let written = printf::format(
            &self.cpu.memory,
            fmt,
            &args[1..forwarded],
            &mut self.print_buf,
        )?;
        self.host.print(&self.print_buf);
        self.cpu.ax = written as Word;

        Ok(())
    }
}

/// Troubleshooting
#[allow(dead_code)]
#[doc(hidden)]
impl<H: Host> Vm<H> {
    /// Returns the stack of the current frame as a human readable string.
    pub fn dump_stack(&self) -> Result<String, std::fmt::Error> {
        use std::fmt::Write;

        let mut buf = String::new();
        let mut addr = self.cpu.sp;
        while addr + WORD_SIZE <= self.cpu.memory.stack_base() {
            let marker = if addr == self.cpu.bp { "<- bp" } else { "" };
            match self.cpu.memory.load_word(addr as Word) {
                Ok(word) => writeln!(buf, "{addr:08X}: {word:20} {marker}")?,
                Err(_) => break,
            }
            addr += WORD_SIZE;
        }

        Ok(buf)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(op: Opcode, pc: TextAddr, text: &[Word], cpu: &Cpu) {
    if op.has_operand() {
        let operand = text.get(pc + 1).copied().unwrap_or_default();
        log::trace!("{:04}: {:<4} {:<8} ax={} sp={:X}", pc, op.mnemonic(), operand, cpu.ax, cpu.sp);
    } else {
        log::trace!("{:04}: {:<4} {:8} ax={} sp={:X}", pc, op.mnemonic(), "", cpu.ax, cpu.sp);
    }
}

#[cfg(not(feature = "op_trace"))]
#[inline(always)]
fn op_trace(_op: Opcode, _pc: TextAddr, _text: &[Word], _cpu: &Cpu) {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::BufferHost;

    /// Wrap raw instructions in a program that starts at address 2.
    fn program(code: &[Word]) -> Program {
        let mut text = vec![Opcode::PUSH.as_word(), Opcode::EXIT.as_word()];
        text.extend_from_slice(code);
        Program {
            text: text.into_boxed_slice(),
            data: vec![0; DATA_START].into_boxed_slice(),
            entry: 2,
        }
    }

    fn run(code: &[Word]) -> W1ldResult<Word> {
        let mut vm = Vm::with_host(VmConf { pool_size: 1024 }, BufferHost::new())?;
        vm.load_program(&program(code), &["test"])?;
        vm.execute()
    }

    #[rustfmt::skip]
    fn arith(a: Word, op: Opcode, b: Word) -> Vec<Word> {
        vec![
            Opcode::IMM.as_word(), a,
            Opcode::PUSH.as_word(),
            Opcode::IMM.as_word(), b,
            op.as_word(),
            Opcode::PUSH.as_word(),
            Opcode::EXIT.as_word(),
        ]
    }

    #[test]
    fn test_div_truncates() {
        for (a, b) in [(7, 2), (-7, 2), (7, -2), (100, 7), (0, 5)] {
            assert_eq!(run(&arith(a, Opcode::DIV, b)).unwrap(), a / b, "{a} / {b}");
            assert_eq!(run(&arith(a, Opcode::MOD, b)).unwrap(), a % b, "{a} % {b}");
        }
    }

    #[test]
    fn test_division_by_zero() {
        let err = run(&arith(1, Opcode::DIV, 0)).unwrap_err();
        assert!(matches!(err, W1ldError::DivisionByZero { pc: 7 }), "{err}");
        let err = run(&arith(1, Opcode::MOD, 0)).unwrap_err();
        assert_eq!(err.kind(), "division by zero");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run(&arith(1, Opcode::LT, 2)).unwrap(), 1);
        assert_eq!(run(&arith(2, Opcode::LE, 1)).unwrap(), 0);
        assert_eq!(run(&arith(3, Opcode::EQ, 3)).unwrap(), 1);
        assert_eq!(run(&arith(1, Opcode::SHL, 4)).unwrap(), 16);
        assert_eq!(run(&arith(Word::MAX, Opcode::ADD, 1)).unwrap(), Word::MIN);
    }

    #[test]
    fn test_unknown_opcode() {
        let err = run(&[999]).unwrap_err();
        assert!(matches!(err, W1ldError::Decode { word: 999, pc: 2 }));
        assert!(err.to_string().starts_with("runtime decode error"));
    }

    #[test]
    fn test_pc_out_of_text() {
        let err = run(&[Opcode::JMP.as_word(), 1000]).unwrap_err();
        assert!(matches!(err, W1ldError::Resource(ResourceError::Text { pc: 1000 })));

        // Falls off the end of the text segment.
        let err = run(&[Opcode::IMM.as_word(), 1]).unwrap_err();
        assert!(matches!(err, W1ldError::Resource(ResourceError::Text { .. })));
    }

    #[test]
    fn test_bad_memory_access() {
        #[rustfmt::skip]
        let code = [
            Opcode::IMM.as_word(), 1 << 40,
            Opcode::LI.as_word(),
        ];
        let err = run(&code).unwrap_err();
        assert!(matches!(err, W1ldError::Resource(ResourceError::Memory { .. })));
    }

    #[test]
    fn test_stack_overflow() {
        // Unbounded recursion: CALL to itself.
        let err = run(&[Opcode::CALL.as_word(), 2]).unwrap_err();
        assert!(matches!(err, W1ldError::Resource(ResourceError::Stack { .. })));
    }

    #[test]
    fn test_run_steps() {
        let mut vm = Vm::with_host(VmConf { pool_size: 1024 }, BufferHost::new()).unwrap();
        // Infinite loop.
        vm.load_program(&program(&[Opcode::JMP.as_word(), 2]), &["loop"])
            .unwrap();
        assert_eq!(vm.run_steps(100).unwrap(), Flow::Ok);
        assert_eq!(vm.cpu().cycle(), 100);
        assert_eq!(vm.exit_code(), None);
    }

    #[test]
    fn test_exit_is_sticky() {
        let mut vm = Vm::with_host(VmConf { pool_size: 1024 }, BufferHost::new()).unwrap();
        vm.load_program(&program(&arith(6, Opcode::MUL, 7)), &["x"])
            .unwrap();
        assert_eq!(vm.execute().unwrap(), 42);
        assert_eq!(vm.step().unwrap(), Flow::Exit(42));
    }

    #[test]
    fn test_argv_on_heap() {
        let mut vm = Vm::with_host(VmConf { pool_size: 1024 }, BufferHost::new()).unwrap();
        vm.load_program(&program(&[Opcode::IMM.as_word(), 0]), &["prog", "arg"])
            .unwrap();

        let cpu = vm.cpu();
        assert_eq!(cpu.stack_arg(0).unwrap(), EXIT_STUB as Word);
        let argv = cpu.stack_arg(1).unwrap();
        assert_eq!(cpu.stack_arg(2).unwrap(), 2);

        let memory = cpu.memory();
        let arg1 = memory.load_word(argv + WORD_SIZE as Word).unwrap();
        assert_eq!(memory.c_str(arg1).unwrap(), b"arg");
        assert_eq!(memory.load_word(argv + 2 * WORD_SIZE as Word).unwrap(), 0);
    }

    #[test]
    fn test_printf_argc_beyond_stack() {
        #[rustfmt::skip]
        let code = [
            Opcode::PRTF.as_word(),
            Opcode::ADJ.as_word(), 1 << 62,
        ];
        let err = run(&code).unwrap_err();
        assert!(matches!(err, W1ldError::Resource(ResourceError::Stack { .. })), "{err}");

        // Only the three startup words are on the stack.
        let code = [Opcode::PRTF.as_word(), Opcode::ADJ.as_word(), 4];
        let err = run(&code).unwrap_err();
        assert_eq!(err.kind(), "runtime resource error");
    }
}
