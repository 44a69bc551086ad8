use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("invalid BIN file magic")]
    InvalidMagic,
    #[error("unknown opcode 0x{opcode:X} at offset 0x{offset:X}")]
    UnknownOpcode { opcode: u32, offset: usize },
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),
    #[error("unexpected end of file at offset 0x{offset:X}")]
    UnexpectedEof { offset: usize },
    #[error("reference to undefined label '{0}'")]
    InvalidLabel(String),
    #[error("unrecognized argument '{0}'")]
    InvalidArgType(String),
}
