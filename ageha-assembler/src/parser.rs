use ageha_script::{lookup_mnemonic, ArgType, Argument, Dialect, ScriptError};
use anyhow::{bail, Context, Result};
use rustc_hash::FxHashMap;

pub(crate) struct LabelRef {
    pub instr: usize,
    pub arg: usize,
    pub name: String,
}

pub(crate) struct ParsedInstruction {
    pub opcode: u32,
    pub args: Vec<Argument>,
}

pub(crate) struct ParsedSource {
    pub dialect: Dialect,
    pub signature: String,
    pub locals: [u32; 6],
    pub instructions: Vec<ParsedInstruction>,
    pub labels: FxHashMap<String, usize>,
    pub label_refs: Vec<LabelRef>,
}

/// Parses assembly text into instructions plus label bookkeeping. Lines
/// before the `====` marker form the header block; blank lines and `//`/`#`
/// comments are ignored everywhere.
pub(crate) fn parse(text: &str) -> Result<ParsedSource> {
    let mut signature = String::new();
    let mut locals = [0u32; 6];
    let mut instructions: Vec<ParsedInstruction> = Vec::new();
    let mut labels: FxHashMap<String, usize> = FxHashMap::default();
    let mut label_refs: Vec<LabelRef> = Vec::new();
    let mut past_header = false;

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        let context = || format!("line {}", lineno + 1);

        if line == "====" {
            past_header = true;
            continue;
        }

        if !past_header {
            if let Some(value) = line.strip_prefix("signature =") {
                signature = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("local_vars =") {
                let inner = value.trim().trim_matches(|c| c == '{' || c == '}');
                let parts: Vec<&str> = inner.split_whitespace().collect();
                if parts.len() < 6 {
                    bail!("{}: local_vars needs six values", context());
                }
                for (slot, part) in locals.iter_mut().zip(parts) {
                    *slot = part
                        .parse()
                        .with_context(|| format!("{}: bad local_vars value '{}'", context(), part))?;
                }
            }
            continue;
        }

        if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
            continue;
        }

        if let Some(name) = parse_label_definition(line) {
            if labels.insert(name.to_string(), instructions.len()).is_some() {
                bail!("{}: duplicate label '{}'", context(), name);
            }
            continue;
        }

        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m, rest),
            None => (line, ""),
        };
        let def = lookup_mnemonic(mnemonic)
            .ok_or_else(|| ScriptError::UnknownMnemonic(mnemonic.to_string()))
            .with_context(context)?;

        let mut args = Vec::with_capacity(def.arg_count);
        parse_arguments(
            rest,
            def.arg_count,
            instructions.len(),
            &mut args,
            &mut label_refs,
        )
        .with_context(|| format!("{}: arguments of {}", context(), mnemonic))?;
        while args.len() < def.arg_count {
            args.push(Argument::Immediate(0));
        }

        instructions.push(ParsedInstruction {
            opcode: def.opcode,
            args,
        });
    }

    let dialect = if signature.starts_with("SYS5") {
        Dialect::Sys5
    } else if signature.starts_with("SYS4") {
        Dialect::Sys4
    } else {
        return Err(ScriptError::InvalidMagic).context("signature does not name a dialect");
    };

    Ok(ParsedSource {
        dialect,
        signature,
        locals,
        instructions,
        labels,
        label_refs,
    })
}

fn parse_label_definition(line: &str) -> Option<&str> {
    let name = line.strip_suffix(':')?;
    let hex = name.strip_prefix("label_")?;
    if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(name)
    } else {
        None
    }
}

fn parse_arguments(
    mut rest: &str,
    max_args: usize,
    instr_index: usize,
    args: &mut Vec<Argument>,
    label_refs: &mut Vec<LabelRef>,
) -> Result<()> {
    loop {
        rest = rest.trim_start();
        if rest.is_empty() || args.len() >= max_args {
            return Ok(());
        }

        if let Some(inner) = rest.strip_prefix('"') {
            let (text, consumed) = scan_string(inner)?;
            args.push(Argument::Str(text));
            rest = &inner[consumed..];
            continue;
        }

        if let Some(inner) = rest.strip_prefix('[') {
            let end = inner
                .find(']')
                .ok_or_else(|| anyhow::anyhow!("unterminated array literal"))?;
            args.push(Argument::Array(parse_array_values(&inner[..end])?));
            rest = &inner[end + 1..];
            continue;
        }

        let token_end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        let token = &rest[..token_end];
        rest = &rest[token_end..];

        if let Some(hex) = token.strip_prefix("label_") {
            if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                label_refs.push(LabelRef {
                    instr: instr_index,
                    arg: args.len(),
                    name: token.to_string(),
                });
                args.push(Argument::Label(token.to_string()));
                continue;
            }
        }

        if let Some((type_name, value)) = split_typed(token) {
            let kind = ArgType::from_name(type_name)
                .ok_or_else(|| ScriptError::InvalidArgType(token.to_string()))?;
            let value: i64 = value
                .parse()
                .map_err(|_| ScriptError::InvalidArgType(token.to_string()))?;
            args.push(Argument::Variable {
                kind,
                value: value as u32,
            });
            continue;
        }

        if let Ok(value) = parse_int(token) {
            args.push(Argument::Immediate(value as i32));
            continue;
        }

        if let Ok(value) = token.parse::<f32>() {
            args.push(Argument::Float(value));
            continue;
        }

        return Err(ScriptError::InvalidArgType(token.to_string()).into());
    }
}

/// Scans a string literal body up to the closing quote, unescaping as it
/// goes. Returns the text and the number of input bytes consumed, closing
/// quote included.
fn scan_string(input: &str) -> Result<(String, usize)> {
    let mut text = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((text, i + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 'r')) => text.push('\r'),
                Some((_, 't')) => text.push('\t'),
                Some((_, '"')) => text.push('"'),
                Some((_, '\\')) => text.push('\\'),
                Some((_, other)) => {
                    text.push('\\');
                    text.push(other);
                }
                None => bail!("unterminated string literal"),
            },
            other => text.push(other),
        }
    }
    bail!("unterminated string literal")
}

fn parse_array_values(inner: &str) -> Result<Vec<u32>> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            let part = part.trim();
            parse_int(part)
                .map(|v| v as u32)
                .map_err(|_| anyhow::anyhow!("bad array value '{}'", part))
        })
        .collect()
}

fn split_typed(token: &str) -> Option<(&str, &str)> {
    let (name, value) = token.split_once(':')?;
    let name_ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let value_ok = !value.is_empty()
        && value
            .strip_prefix('-')
            .unwrap_or(value)
            .chars()
            .all(|c| c.is_ascii_digit());
    if name_ok && value_ok {
        Some((name, value))
    } else {
        None
    }
}

/// Parses a signed decimal or `0x`-prefixed hex integer.
fn parse_int(token: &str) -> Result<i64, std::num::ParseIntError> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(body) => (true, body),
        None => (false, token),
    };
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)?
    } else {
        body.parse::<i64>()?
    };
    Ok(if negative { -value } else { value })
}
