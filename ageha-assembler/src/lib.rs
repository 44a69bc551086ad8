//! Assembles BIN script text back into its binary form. Layout is two-pass:
//! instructions are placed first, then string blobs, inline arrays and the
//! three offset tables, and finally every deferred label/string/array
//! reference is patched with its footer position.

mod parser;

use ageha_script::{
    encode_text, Argument, Dialect, Header, ScriptError, TABLE1_OPCODE, TABLE2_OPCODE,
    TABLE3_OPCODE,
};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use tracing::debug;

use parser::ParsedSource;

/// Assembles script text into BIN bytes. The dialect is taken from the
/// signature in the header block.
pub fn assemble(text: &str) -> Result<Vec<u8>> {
    let source = parser::parse(text)?;
    build(source)
}

/// Disassembles `data`, reassembles the text, and reports whether the result
/// is byte-identical to the input.
pub fn verify_round_trip(data: &[u8]) -> Result<bool> {
    let text = ageha_disassembler::disassemble_to_text(data).context("disassembly failed")?;
    let rebuilt = assemble(&text).context("assembly failed")?;
    Ok(rebuilt == data)
}

fn build(source: ParsedSource) -> Result<Vec<u8>> {
    let dialect = source.dialect;
    let header_len = match dialect {
        Dialect::Sys4 => ageha_script::SYS4_HEADER_SIZE,
        Dialect::Sys5 => ageha_script::SYS5_HEADER_SIZE,
    };

    // Instruction layout in declaration order.
    let mut offsets = Vec::with_capacity(source.instructions.len());
    let mut offset = header_len;
    for instr in &source.instructions {
        offsets.push(offset);
        offset += 4 + instr.args.len() * 8;
    }
    let instr_end = offset;

    let mut footer: Vec<u8> = Vec::new();

    // String blobs, one per occurrence. Offsets are stored in 4-byte units
    // from the end of the header; the terminator is part of the 0xFF fill
    // that pads each blob to the next 4-byte boundary.
    let mut string_refs: FxHashMap<(usize, usize), u32> = FxHashMap::default();
    let mut cursor = instr_end;
    for (i, instr) in source.instructions.iter().enumerate() {
        for (j, arg) in instr.args.iter().enumerate() {
            if let Argument::Str(text) = arg {
                if text.is_empty() {
                    continue;
                }
                string_refs.insert((i, j), ((cursor - header_len) / 4) as u32);
                let encoded = encode_text(text, dialect);
                cursor += encoded.len();
                footer.extend_from_slice(&encoded);
                let padding = 4 - cursor % 4;
                footer.extend(std::iter::repeat(0xFF).take(padding));
                cursor += padding;
            }
        }
    }

    // Inline arrays follow the strings.
    let mut array_refs: FxHashMap<(usize, usize), u32> = FxHashMap::default();
    let mut array_unit = ((cursor - header_len) / 4) as u32;
    for (i, instr) in source.instructions.iter().enumerate() {
        for (j, arg) in instr.args.iter().enumerate() {
            if let Argument::Array(values) = arg {
                array_refs.insert((i, j), array_unit);
                footer.extend_from_slice(&(values.len() as u32).to_le_bytes());
                for &value in values {
                    footer.extend_from_slice(&value.to_le_bytes());
                }
                array_unit += 1 + values.len() as u32;
            }
        }
    }

    // The three offset tables, each listing (offset - header_len) / 4 for
    // every instruction of its tracked opcode, in instruction order.
    let mut table_info = [(0u32, 0u32); 3];
    for (slot, tracked) in [TABLE1_OPCODE, TABLE2_OPCODE, TABLE3_OPCODE]
        .into_iter()
        .enumerate()
    {
        let table_start = instr_end + footer.len();
        let mut count = 0u32;
        for (i, instr) in source.instructions.iter().enumerate() {
            if instr.opcode == tracked {
                footer.extend_from_slice(&(((offsets[i] - header_len) / 4) as u32).to_le_bytes());
                count += 1;
            }
        }
        table_info[slot] = (count, ((table_start - header_len) / 4) as u32);
    }

    // Resolve label references now that every instruction has an offset.
    let mut label_values: FxHashMap<(usize, usize), u32> = FxHashMap::default();
    for reference in &source.label_refs {
        let target = *source
            .labels
            .get(&reference.name)
            .ok_or_else(|| ScriptError::InvalidLabel(reference.name.clone()))?;
        label_values.insert(
            (reference.instr, reference.arg),
            ((offsets[target] - header_len) / 4) as u32,
        );
    }

    let header = Header {
        dialect,
        signature: source.signature,
        local_integer_1: source.locals[0],
        local_floats: source.locals[1],
        local_strings_1: source.locals[2],
        local_integer_2: source.locals[3],
        unknown_data: source.locals[4],
        local_strings_2: source.locals[5],
        sub_header_length: 0x1C,
        table1_length: table_info[0].0,
        table1_offset: table_info[0].1,
        table2_length: table_info[1].0,
        table2_offset: table_info[1].1,
        table3_length: table_info[2].0,
        table3_offset: table_info[2].1,
    };

    let mut out = header.to_bytes();
    debug_assert_eq!(out.len(), header_len);

    for (i, instr) in source.instructions.iter().enumerate() {
        out.extend_from_slice(&instr.opcode.to_le_bytes());
        for (j, arg) in instr.args.iter().enumerate() {
            let (tag, raw) = match arg {
                Argument::Immediate(v) => (0, *v as u32),
                Argument::Float(f) => (1, f.to_bits()),
                Argument::Variable { kind, value } => (kind.raw(), *value),
                Argument::Str(text) => {
                    let raw = if text.is_empty() {
                        0
                    } else {
                        string_refs[&(i, j)]
                    };
                    (2, raw)
                }
                Argument::Array(_) => (0, array_refs[&(i, j)]),
                Argument::Label(name) => {
                    let raw = label_values
                        .get(&(i, j))
                        .copied()
                        .ok_or_else(|| ScriptError::InvalidLabel(name.clone()))?;
                    (0, raw)
                }
            };
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&raw.to_le_bytes());
        }
    }

    out.extend_from_slice(&footer);
    debug!(
        instructions = source.instructions.len(),
        bytes = out.len(),
        "assembled script"
    );
    Ok(out)
}
