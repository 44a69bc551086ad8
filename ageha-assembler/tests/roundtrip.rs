use ageha_assembler::{assemble, verify_round_trip};
use ageha_disassembler::{disassemble, disassemble_to_text};
use ageha_script::{Argument, Dialect, SYS5_HEADER_SIZE};

const SYS5_HEADER_BLOCK: &str = "\
==Binary Information - do not edit==
signature = SYS5501
local_vars = { 1 2 3 4 5 6 }
====
";

fn sys5_source(body: &str) -> String {
    format!("{}\n{}", SYS5_HEADER_BLOCK, body)
}

fn assert_round_trips(data: &[u8]) {
    assert!(verify_round_trip(data).unwrap(), "round trip mismatch");
}

#[test]
fn exit_only_script_round_trips() {
    let data = assemble(&sys5_source("    exit\n")).unwrap();
    // Header + one bare opcode, no footer.
    assert_eq!(data.len(), SYS5_HEADER_SIZE + 4);

    let text = disassemble_to_text(&data).unwrap();
    assert!(text.contains("    exit"));
    assert!(text.contains("signature = SYS5501"));
    assert_eq!(assemble(&text).unwrap(), data);
}

#[test]
fn zero_instruction_script_round_trips() {
    let data = assemble(SYS5_HEADER_BLOCK).unwrap();
    assert_eq!(data.len(), SYS5_HEADER_SIZE);
    assert_round_trips(&data);

    let script = disassemble(&data).unwrap();
    assert!(script.instructions.is_empty());
    assert_eq!(script.header.local_integer_1, 1);
    assert_eq!(script.header.unknown_data, 5);
}

#[test]
fn jump_labels_resolve_to_instruction_offsets() {
    let body = "\
    wait 1
label_00A0:
    input-wait
    jmp label_00A0
";
    let data = assemble(&sys5_source(body)).unwrap();
    let script = disassemble(&data).unwrap();

    // wait is 12 bytes, so input-wait sits at 0x44 + 12 = 0x50.
    let target = SYS5_HEADER_SIZE + 12;
    assert_eq!(script.labels.len(), 1);
    assert!(script.labels.contains_key(&target));

    let jmp = &script.instructions[2];
    match &jmp.args[0] {
        Argument::Label(name) => {
            assert_eq!(name, &format!("label_{:08X}", target))
        }
        other => panic!("expected label argument, got {:?}", other),
    }

    // The stored raw value satisfies raw * 4 + header_len == target.
    let raw = u32::from_le_bytes(data[jmp.offset + 8..jmp.offset + 12].try_into().unwrap());
    assert_eq!(raw as usize * 4 + SYS5_HEADER_SIZE, target);

    assert_round_trips(&data);
}

#[test]
fn conditional_jump_uses_its_designated_slot() {
    let body = "\
label_0B:
    show-text 0 \"looping\"
    jcc 0 local-int:2 7 label_0B
    exit
";
    let data = assemble(&sys5_source(body)).unwrap();
    let script = disassemble(&data).unwrap();
    match &script.instructions[1].args[3] {
        Argument::Label(_) => {}
        other => panic!("expected label in slot 3, got {:?}", other),
    }
    assert_round_trips(&data);
}

#[test]
fn duplicate_strings_get_distinct_blobs() {
    let body = "\
    show-text 0 \"same words\"
    show-text 1 \"same words\"
    exit
";
    let data = assemble(&sys5_source(body)).unwrap();
    let script = disassemble(&data).unwrap();

    let raw_of = |instr: usize| {
        let offset = script.instructions[instr].offset;
        u32::from_le_bytes(data[offset + 16..offset + 20].try_into().unwrap())
    };
    let first = raw_of(0);
    let second = raw_of(1);
    assert_ne!(first, second, "string blobs must not be deduplicated");

    // "same words": 10 code units + terminator = 22 bytes, padded to 24.
    assert_eq!(second - first, 6);
    assert_round_trips(&data);
}

#[test]
fn footer_tables_track_their_opcodes() {
    let body = "\
    show-text 0 \"a\"
    input-wait
    show-text 0 \"b\"
    display-furigana 0 \"base\" \"ruby\"
    input-wait
    exit
";
    let data = assemble(&sys5_source(body)).unwrap();
    let script = disassemble(&data).unwrap();

    let count = |opcode: u32| {
        script
            .instructions
            .iter()
            .filter(|i| i.opcode == opcode)
            .count()
    };
    assert_eq!(script.tables[0].len(), count(0x71));
    assert_eq!(script.tables[1].len(), count(0x03));
    assert_eq!(script.tables[2].len(), count(0x8F));

    // Every table entry points at an instruction of the tracked opcode, in
    // instruction order.
    for (table, opcode) in script.tables.iter().zip([0x71u32, 0x03, 0x8F]) {
        let expected: Vec<u32> = script
            .instructions
            .iter()
            .filter(|i| i.opcode == opcode)
            .map(|i| ((i.offset - SYS5_HEADER_SIZE) / 4) as u32)
            .collect();
        assert_eq!(table, &expected);
    }

    // Instructions are 4-aligned.
    for instr in &script.instructions {
        assert_eq!(instr.offset % 4, 0);
    }

    assert_round_trips(&data);
}

#[test]
fn inline_arrays_round_trip() {
    let body = "\
    show-text 0 \"keep strings first\"
    copy-local-array local-int:0 [10, 20, 30, 40]
    exit
";
    let data = assemble(&sys5_source(body)).unwrap();
    let script = disassemble(&data).unwrap();
    assert_eq!(
        script.instructions[1].args[1],
        Argument::Array(vec![10, 20, 30, 40])
    );
    assert_round_trips(&data);
}

#[test]
fn typed_float_and_negative_arguments_round_trip() {
    let body = "\
    calc local-int:1 -7 2.5 global-float:3
    wait 2.0
    exit
";
    let data = assemble(&sys5_source(body)).unwrap();
    let script = disassemble(&data).unwrap();
    assert_eq!(script.instructions[0].args[1], Argument::Immediate(-7));
    assert_eq!(script.instructions[0].args[2], Argument::Float(2.5));
    assert_eq!(script.instructions[1].args[0], Argument::Float(2.0));
    assert_round_trips(&data);
}

#[test]
fn sys4_scripts_use_shift_jis_strings() {
    let text = "\
==Binary Information - do not edit==
signature = SYS4405a
local_vars = { 0 0 0 0 0 0 }
====

    show-text 0 \"\u{30C6}\u{30B9}\u{30C8}\"
    show-text 0 \"plain\"
    exit
";
    let data = assemble(text).unwrap();
    let script = disassemble(&data).unwrap();
    assert_eq!(script.header.dialect, Dialect::Sys4);
    assert_eq!(
        script.instructions[0].args[1],
        Argument::Str("\u{30C6}\u{30B9}\u{30C8}".to_string())
    );
    assert_round_trips(&data);
}

#[test]
fn undefined_label_is_an_error() {
    let result = assemble(&sys5_source("    jmp label_0000BEEF\n"));
    let err = format!("{:?}", result.unwrap_err());
    assert!(err.contains("label_0000BEEF"), "{}", err);
}

#[test]
fn comments_and_blank_lines_are_ignored() {
    let body = "\
// a comment
# another comment

    exit
";
    let with_comments = assemble(&sys5_source(body)).unwrap();
    let without = assemble(&sys5_source("    exit\n")).unwrap();
    assert_eq!(with_comments, without);
}
