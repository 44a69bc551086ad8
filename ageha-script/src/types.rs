use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use maplit::hashmap;
use strum_macros::EnumString;

use crate::Header;

/// The two dialects of the script format, distinguished by the header
/// signature and by string encoding: SYS4 stores Shift-JIS bytes, SYS5
/// stores UTF-16LE code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Dialect {
    Sys4,
    Sys5,
}

/// Argument type tag as stored in the 32-bit slot preceding each value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Immediate,
    Float,
    Str,
    GlobalInt,
    GlobalFloat,
    GlobalString,
    GlobalPtr,
    GlobalStringPtr,
    LocalInt,
    LocalFloat,
    LocalString,
    LocalPtr,
    LocalFloatPtr,
    LocalStringPtr,
    Ext8003,
    Ext8005,
    Ext8009,
    Ext800B,
}

impl ArgType {
    pub fn from_raw(raw: u32) -> Option<ArgType> {
        Some(match raw {
            0x00 => ArgType::Immediate,
            0x01 => ArgType::Float,
            0x02 => ArgType::Str,
            0x03 => ArgType::GlobalInt,
            0x04 => ArgType::GlobalFloat,
            0x05 => ArgType::GlobalString,
            0x06 => ArgType::GlobalPtr,
            0x08 => ArgType::GlobalStringPtr,
            0x09 => ArgType::LocalInt,
            0x0A => ArgType::LocalFloat,
            0x0B => ArgType::LocalString,
            0x0C => ArgType::LocalPtr,
            0x0D => ArgType::LocalFloatPtr,
            0x0E => ArgType::LocalStringPtr,
            0x8003 => ArgType::Ext8003,
            0x8005 => ArgType::Ext8005,
            0x8009 => ArgType::Ext8009,
            0x800B => ArgType::Ext800B,
            _ => return None,
        })
    }

    pub fn raw(self) -> u32 {
        match self {
            ArgType::Immediate => 0x00,
            ArgType::Float => 0x01,
            ArgType::Str => 0x02,
            ArgType::GlobalInt => 0x03,
            ArgType::GlobalFloat => 0x04,
            ArgType::GlobalString => 0x05,
            ArgType::GlobalPtr => 0x06,
            ArgType::GlobalStringPtr => 0x08,
            ArgType::LocalInt => 0x09,
            ArgType::LocalFloat => 0x0A,
            ArgType::LocalString => 0x0B,
            ArgType::LocalPtr => 0x0C,
            ArgType::LocalFloatPtr => 0x0D,
            ArgType::LocalStringPtr => 0x0E,
            ArgType::Ext8003 => 0x8003,
            ArgType::Ext8005 => 0x8005,
            ArgType::Ext8009 => 0x8009,
            ArgType::Ext800B => 0x800B,
        }
    }

    /// Display name used for the `type:value` text form. Immediates have no
    /// prefix.
    pub fn name(self) -> &'static str {
        match self {
            ArgType::Immediate => "",
            ArgType::Float => "float",
            ArgType::Str => "string",
            ArgType::GlobalInt => "global-int",
            ArgType::GlobalFloat => "global-float",
            ArgType::GlobalString => "global-string",
            ArgType::GlobalPtr => "global-ptr",
            ArgType::GlobalStringPtr => "global-string-ptr",
            ArgType::LocalInt => "local-int",
            ArgType::LocalFloat => "local-float",
            ArgType::LocalString => "local-string",
            ArgType::LocalPtr => "local-ptr",
            ArgType::LocalFloatPtr => "local-float-ptr",
            ArgType::LocalStringPtr => "local-string-ptr",
            ArgType::Ext8003 => "ext-8003",
            ArgType::Ext8005 => "ext-8005",
            ArgType::Ext8009 => "ext-8009",
            ArgType::Ext800B => "ext-800B",
        }
    }

    pub fn from_name(name: &str) -> Option<ArgType> {
        TYPE_NAMES.get(name).copied()
    }
}

lazy_static! {
    static ref TYPE_NAMES: HashMap<&'static str, ArgType> = hashmap! {
        "float" => ArgType::Float,
        "string" => ArgType::Str,
        "global-int" => ArgType::GlobalInt,
        "global-float" => ArgType::GlobalFloat,
        "global-string" => ArgType::GlobalString,
        "global-ptr" => ArgType::GlobalPtr,
        "global-string-ptr" => ArgType::GlobalStringPtr,
        "local-int" => ArgType::LocalInt,
        "local-float" => ArgType::LocalFloat,
        "local-string" => ArgType::LocalString,
        "local-ptr" => ArgType::LocalPtr,
        "local-float-ptr" => ArgType::LocalFloatPtr,
        "local-string-ptr" => ArgType::LocalStringPtr,
        "ext-8003" => ArgType::Ext8003,
        "ext-8005" => ArgType::Ext8005,
        "ext-8009" => ArgType::Ext8009,
        "ext-800B" => ArgType::Ext800B,
    };
}

/// One instruction argument. The wire form is always a (type tag, raw value)
/// pair; the variants carry the decoded view the text form works with.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Type tag 0. Rendered as a signed decimal.
    Immediate(i32),
    /// Type tag 1; the raw value holds the f32 bits.
    Float(f32),
    /// Type tag 2 with a non-empty decoded string. The raw value is a footer
    /// offset assigned at assembly time.
    Str(String),
    /// Any variable-class tag (including `string`/`float` forms whose
    /// payload is carried as a plain value).
    Variable { kind: ArgType, value: u32 },
    /// A code offset that resolved to an instruction start.
    Label(String),
    /// An inline uint32 array in the footer (opcode 0x64).
    Array(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte offset of the opcode within the file.
    pub offset: usize,
    pub opcode: u32,
    pub args: Vec<Argument>,
}

impl Instruction {
    pub fn byte_len(&self) -> usize {
        4 + self.args.len() * 8
    }
}

/// A fully disassembled script.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub header: Header,
    pub instructions: Vec<Instruction>,
    /// Jump-target offsets, in offset order, mapped to their label names.
    pub labels: BTreeMap<usize, String>,
    /// The three footer offset tables (instruction offsets divided by 4).
    pub tables: [Vec<u32>; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_type_tags_round_trip() {
        for raw in (0u32..0x0F).chain([0x8003, 0x8005, 0x8009, 0x800B]) {
            if let Some(t) = ArgType::from_raw(raw) {
                assert_eq!(t.raw(), raw);
                if t != ArgType::Immediate {
                    assert_eq!(ArgType::from_name(t.name()), Some(t));
                }
            }
        }
        assert!(ArgType::from_raw(0x07).is_none());
        assert!(ArgType::from_raw(0x0F).is_none());
    }

    #[test]
    fn dialect_parses_case_insensitively() {
        use std::str::FromStr;
        assert_eq!(Dialect::from_str("sys5").unwrap(), Dialect::Sys5);
        assert_eq!(Dialect::from_str("SYS4").unwrap(), Dialect::Sys4);
    }
}
