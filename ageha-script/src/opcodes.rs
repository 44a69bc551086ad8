use std::collections::HashMap;

use lazy_static::lazy_static;

/// Opcode tracked by footer table T1.
pub const TABLE1_OPCODE: u32 = 0x71;
/// Opcode tracked by footer table T2.
pub const TABLE2_OPCODE: u32 = 0x03;
/// Opcode tracked by footer table T3.
pub const TABLE3_OPCODE: u32 = 0x8F;
/// Opcode whose second argument references an inline uint32 array.
pub const ARRAY_OPCODE: u32 = 0x64;

/// A single entry of the static opcode table. `label_arg` names the argument
/// slot that may hold a code offset; instructions without one are not
/// control flow.
#[derive(Debug)]
pub struct OpcodeDef {
    pub opcode: u32,
    pub mnemonic: &'static str,
    pub arg_count: usize,
    pub label_arg: Option<usize>,
}

const fn op(opcode: u32, mnemonic: &'static str, arg_count: usize) -> OpcodeDef {
    OpcodeDef {
        opcode,
        mnemonic,
        arg_count,
        label_arg: None,
    }
}

const fn jump(opcode: u32, mnemonic: &'static str, arg_count: usize, label_arg: usize) -> OpcodeDef {
    OpcodeDef {
        opcode,
        mnemonic,
        arg_count,
        label_arg: Some(label_arg),
    }
}

/// The instruction set this toolkit declares. Argument counts drive the
/// instruction walk; nothing here implies execution semantics.
static OPCODES: &[OpcodeDef] = &[
    op(0x00, "nop", 0),
    op(0x01, "wait", 1),
    jump(0x02, "jmp", 1, 0),
    op(0x03, "show-text", 2),
    op(0x04, "set", 2),
    op(0x05, "calc", 4),
    jump(0x06, "jcc", 4, 3),
    jump(0x07, "call", 1, 0),
    op(0x08, "ret", 0),
    op(0x09, "push", 1),
    op(0x0A, "pop", 1),
    op(0x0C, "call-script", 2),
    op(0x0D, "ret-script", 0),
    op(0x10, "set-global", 2),
    op(0x11, "get-global", 2),
    op(0x12, "set-flag", 2),
    op(0x13, "get-flag", 2),
    op(0x14, "rand", 3),
    op(0x15, "min", 3),
    op(0x16, "max", 3),
    op(0x17, "clamp", 4),
    op(0x20, "str-copy", 2),
    op(0x21, "str-concat", 3),
    op(0x22, "str-format", 3),
    op(0x23, "str-compare", 3),
    op(0x30, "set-speaker", 1),
    op(0x31, "voice", 1),
    op(0x32, "message-wait", 0),
    op(0x33, "clear-text", 0),
    op(0x34, "select-menu", 2),
    op(0x35, "select-end", 0),
    op(0x36, "backlog-add", 1),
    op(0x40, "load-image", 2),
    op(0x41, "free-image", 1),
    op(0x42, "draw-image", 3),
    op(0x43, "move-image", 4),
    op(0x44, "fade-in", 1),
    op(0x45, "fade-out", 1),
    op(0x46, "shake", 2),
    op(0x47, "set-transition", 2),
    op(0x48, "update-screen", 0),
    op(0x50, "play-bgm", 2),
    op(0x51, "stop-bgm", 1),
    op(0x52, "play-se", 2),
    op(0x53, "stop-se", 1),
    op(0x54, "play-voice", 1),
    op(0x55, "stop-voice", 0),
    op(0x60, "local-clear", 1),
    op(0x61, "local-copy", 3),
    op(0x64, "copy-local-array", 2),
    op(0x65, "array-get", 3),
    op(0x66, "array-set", 3),
    op(0x70, "task-yield", 0),
    op(0x71, "input-wait", 0),
    op(0x72, "timer-start", 1),
    op(0x73, "timer-wait", 1),
    op(0x74, "save-enable", 1),
    op(0x75, "quick-save", 0),
    op(0x80, "scene-begin", 1),
    op(0x81, "scene-end", 0),
    op(0x82, "load-scene", 1),
    op(0x8C, "event-begin", 1),
    op(0x8D, "event-end", 0),
    op(0x8F, "display-furigana", 3),
    op(0xA0, "set-title", 1),
    op(0xA6, "movie-play", 1),
    op(0xB0, "achievement", 1),
    op(0xFF, "exit", 0),
];

lazy_static! {
    static ref BY_OPCODE: HashMap<u32, &'static OpcodeDef> =
        OPCODES.iter().map(|def| (def.opcode, def)).collect();
    static ref BY_MNEMONIC: HashMap<&'static str, &'static OpcodeDef> =
        OPCODES.iter().map(|def| (def.mnemonic, def)).collect();
}

pub fn lookup_opcode(opcode: u32) -> Option<&'static OpcodeDef> {
    BY_OPCODE.get(&opcode).copied()
}

pub fn lookup_mnemonic(mnemonic: &str) -> Option<&'static OpcodeDef> {
    BY_MNEMONIC.get(mnemonic).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_duplicates() {
        assert_eq!(BY_OPCODE.len(), OPCODES.len());
        assert_eq!(BY_MNEMONIC.len(), OPCODES.len());
    }

    #[test]
    fn tracked_opcodes_are_declared() {
        for code in [TABLE1_OPCODE, TABLE2_OPCODE, TABLE3_OPCODE, ARRAY_OPCODE] {
            assert!(lookup_opcode(code).is_some(), "0x{:X} missing", code);
        }
    }

    #[test]
    fn lookup_by_both_keys() {
        let def = lookup_mnemonic("jmp").unwrap();
        assert_eq!(def.opcode, 0x02);
        assert_eq!(def.label_arg, Some(0));
        assert_eq!(lookup_opcode(0xFF).unwrap().mnemonic, "exit");
        assert!(lookup_opcode(0x0B).is_none());
        assert!(lookup_mnemonic("no-such-op").is_none());
    }
}
