mod bytecode;
pub mod compiler;
pub mod constants;
mod cpu;
mod disasm;
mod error;
mod host;
mod memory;
mod printf;
mod vm;

pub use self::{
    bytecode::{Opcode, Program},
    compiler::{compile, compile_with, load_source, tokenize, CompileConf},
};

pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        bytecode::{Opcode, Program},
        compiler::{compile, compile_with, load_source, CompileConf},
        cpu::Cpu,
        disasm::Disassembler,
        error::{LexError, ParseError, ResourceError, W1ldError, W1ldResult},
        host::{BufferHost, Host, StdHost},
        memory::Memory,
        vm::{Flow, Vm, VmConf},
    };
}
