use std::fmt::Write;

use ageha_script::{lookup_opcode, Argument, Script};

/// Renders a disassembled script as assembly text. The output is the input
/// grammar of the assembler; unmodified scripts reassemble byte-identically.
pub fn render(script: &Script) -> String {
    let mut out = String::new();

    out.push_str("==Binary Information - do not edit==\n");
    let signature = script
        .header
        .signature
        .trim_end_matches(|c| c == '\0' || c == ' ');
    let _ = writeln!(out, "signature = {}", signature);
    let _ = writeln!(
        out,
        "local_vars = {{ {} {} {} {} {} {} }}",
        script.header.local_integer_1,
        script.header.local_floats,
        script.header.local_strings_1,
        script.header.local_integer_2,
        script.header.unknown_data,
        script.header.local_strings_2
    );
    out.push_str("====\n\n");

    for instr in &script.instructions {
        if let Some(label) = script.labels.get(&instr.offset) {
            let _ = writeln!(out, "\n{}:", label);
        }

        let def = match lookup_opcode(instr.opcode) {
            Some(def) => def,
            // Unreachable for scripts produced by the disassembler; kept so
            // hand-built scripts still render something inspectable.
            None => {
                let _ = writeln!(out, "    // undeclared opcode 0x{:X}", instr.opcode);
                continue;
            }
        };
        let _ = write!(out, "    {}", def.mnemonic);
        for arg in &instr.args {
            out.push(' ');
            out.push_str(&format_argument(arg));
        }
        out.push('\n');
    }

    out
}

fn format_argument(arg: &Argument) -> String {
    match arg {
        Argument::Label(name) => name.clone(),
        Argument::Str(text) => format!("\"{}\"", escape(text)),
        Argument::Array(values) => {
            let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            format!("[{}]", parts.join(", "))
        }
        Argument::Variable { kind, value } => format!("{}:{}", kind.name(), value),
        Argument::Float(f) => format_float(*f),
        Argument::Immediate(v) => v.to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Shortest round-trip form, with a decimal point forced so the assembler
/// can tell floats from integer immediates.
fn format_float(f: f32) -> String {
    let s = f.to_string();
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{}.0", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_specials() {
        assert_eq!(escape("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }

    #[test]
    fn floats_keep_their_point() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-1.25), "-1.25");
    }
}
