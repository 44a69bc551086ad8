mod text;

use std::collections::{BTreeMap, HashSet};

use ageha_script::{
    decode_text, lookup_opcode, ArgType, Argument, Header, Instruction, Script, ScriptError,
    ARRAY_OPCODE,
};
use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

pub use text::render;

/// Disassembles a BIN script into its structured form.
pub fn disassemble(data: &[u8]) -> Result<Script> {
    let header = Header::parse(data).context("failed to read BIN header")?;

    let mut data_end = header.data_end();
    if data_end == 0 || data_end > data.len() {
        data_end = data.len();
    }

    // First pass: walk instructions. A decode failure means we ran into
    // footer data, so the walk stops cleanly there.
    let mut instructions = Vec::new();
    let mut offset = header.byte_len();
    while offset < data_end {
        match parse_instruction(data, offset) {
            Ok(instr) => {
                offset += instr.byte_len();
                instructions.push(instr);
            }
            Err(err) => {
                debug!(offset, %err, "instruction walk stopped");
                break;
            }
        }
    }

    let offsets: HashSet<usize> = instructions.iter().map(|i| i.offset).collect();
    let header_len = header.byte_len();

    // Second pass: recover labels from control-flow instructions. Offsets
    // that do not land on an instruction stay raw (engine-internal
    // addresses).
    let mut labels = BTreeMap::new();
    for instr in instructions.iter_mut() {
        let def = match lookup_opcode(instr.opcode) {
            Some(def) => def,
            None => continue,
        };
        let label_arg = match def.label_arg {
            Some(i) if i < instr.args.len() => i,
            _ => continue,
        };
        if let Argument::Immediate(value) = instr.args[label_arg] {
            let target = header_len + (value as u32 as usize) * 4;
            if offsets.contains(&target) {
                let name = format!("label_{:08X}", target);
                labels.insert(target, name.clone());
                instr.args[label_arg] = Argument::Label(name);
            }
        }
    }

    // Third pass: decode string arguments and the inline arrays referenced
    // by copy-local-array.
    for instr in instructions.iter_mut() {
        for arg in instr.args.iter_mut() {
            if let Argument::Variable {
                kind: ArgType::Str,
                value,
            } = *arg
            {
                let str_offset = header_len + value as usize * 4;
                if let Ok(text) = decode_text(data, str_offset, header.dialect) {
                    if !text.is_empty() {
                        *arg = Argument::Str(text);
                    }
                }
            }
        }

        if instr.opcode == ARRAY_OPCODE && instr.args.len() >= 2 {
            let raw = match instr.args[1] {
                Argument::Immediate(v) => Some(v as u32),
                Argument::Variable {
                    kind: ArgType::Str,
                    value,
                } => Some(value),
                _ => None,
            };
            if let Some(raw) = raw {
                let array_offset = header_len + raw as usize * 4;
                if let Some(values) = read_data_array(data, array_offset) {
                    if !values.is_empty() {
                        instr.args[1] = Argument::Array(values);
                    }
                }
            }
        }
    }

    let tables = [
        read_table(
            data,
            header_len + header.table1_offset as usize * 4,
            header.table1_length as usize,
        ),
        read_table(
            data,
            header_len + header.table2_offset as usize * 4,
            header.table2_length as usize,
        ),
        read_table(
            data,
            header_len + header.table3_offset as usize * 4,
            header.table3_length as usize,
        ),
    ];

    Ok(Script {
        header,
        instructions,
        labels,
        tables,
    })
}

/// Disassembles a BIN script and renders it to assembly text.
pub fn disassemble_to_text(data: &[u8]) -> Result<String> {
    Ok(render(&disassemble(data)?))
}

fn parse_instruction(data: &[u8], offset: usize) -> Result<Instruction, ScriptError> {
    if offset + 4 > data.len() {
        return Err(ScriptError::UnexpectedEof { offset });
    }
    let opcode = LittleEndian::read_u32(&data[offset..]);
    let def = lookup_opcode(opcode).ok_or(ScriptError::UnknownOpcode { opcode, offset })?;

    let mut args = Vec::with_capacity(def.arg_count);
    let mut arg_offset = offset + 4;
    for _ in 0..def.arg_count {
        if arg_offset + 8 > data.len() {
            return Err(ScriptError::UnexpectedEof { offset: arg_offset });
        }
        let tag = LittleEndian::read_u32(&data[arg_offset..]);
        let raw = LittleEndian::read_u32(&data[arg_offset + 4..]);
        let kind = ArgType::from_raw(tag)
            .ok_or_else(|| ScriptError::InvalidArgType(format!("0x{:X}", tag)))?;
        args.push(match kind {
            ArgType::Immediate => Argument::Immediate(raw as i32),
            ArgType::Float => Argument::Float(f32::from_bits(raw)),
            kind => Argument::Variable { kind, value: raw },
        });
        arg_offset += 8;
    }

    Ok(Instruction {
        offset,
        opcode,
        args,
    })
}

fn read_data_array(data: &[u8], offset: usize) -> Option<Vec<u32>> {
    if offset + 4 > data.len() {
        return None;
    }
    let length = LittleEndian::read_u32(&data[offset..]) as usize;
    if offset + 4 + length * 4 > data.len() {
        return None;
    }
    Some(
        (0..length)
            .map(|i| LittleEndian::read_u32(&data[offset + 4 + i * 4..]))
            .collect(),
    )
}

fn read_table(data: &[u8], offset: usize, length: usize) -> Vec<u32> {
    if length == 0 || offset + length * 4 > data.len() {
        return Vec::new();
    }
    (0..length)
        .map(|i| LittleEndian::read_u32(&data[offset + i * 4..]))
        .collect()
}
