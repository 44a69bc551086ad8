use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "ageha", version, about = "Tools for Eushully AGE engine games")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Disassemble BIN script files to assembly text
    Disasm {
        /// Input .bin file (omit when using --dir)
        input: Option<PathBuf>,
        /// Output path (defaults to the input with a .txt extension)
        output: Option<PathBuf>,
        /// Process every .bin file in a directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Verify the round trip (disasm -> asm -> compare)
        #[arg(short, long)]
        verify: bool,
    },
    /// Assemble script text back into a BIN file
    Asm {
        /// Input .txt file (omit when using --dir)
        input: Option<PathBuf>,
        /// Output path (defaults to the input with a .BIN extension)
        output: Option<PathBuf>,
        /// Process every .txt file in a directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Extract files from an ALF archive index
    Extract {
        /// Index file (SYS4INI.BIN, SYS5INI.BIN, APPENDxx.AAI)
        index: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "data")]
        output: PathBuf,
        /// Only extract entries whose name contains this string
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Rebuild containers from a directory tree of modified files
    Pack {
        /// Original index file
        index: PathBuf,
        /// Directory mirroring the extraction layout
        input_dir: PathBuf,
        /// Output directory for the new index and containers
        #[arg(short, long, default_value = "repacked")]
        output: PathBuf,
    },
    /// Display the structure of an S5 index file
    Sys5iniDump {
        index: PathBuf,
    },
    /// Append a new DATA*.ALF container to an S5 index
    Sys5iniAddArchive {
        index: PathBuf,
        /// Name of the new container (e.g. DATA9.ALF)
        archive_name: String,
        /// Directory of files to pack into the new container
        input_dir: PathBuf,
        /// Output path for the rewritten index
        #[arg(short, long, default_value = "SYS5INI_modified.BIN")]
        output: PathBuf,
    },
    /// Convert AGF images to BMP
    Agf2bmp {
        /// Input .AGF file or directory
        input: PathBuf,
        /// Output file or directory
        output: Option<PathBuf>,
    },
    /// Convert BMP images back to AGF using the originals as reference
    Bmp2agf {
        /// Input .BMP file or directory
        input: PathBuf,
        /// Output file or directory
        output: Option<PathBuf>,
        /// Original AGF file or directory for format reference
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:?}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Disasm {
            input,
            output,
            dir,
            verify,
        } => run_disasm(input, output, dir, verify),
        Command::Asm { input, output, dir } => run_asm(input, output, dir),
        Command::Extract {
            index,
            output,
            filter,
        } => run_extract(&index, output, filter),
        Command::Pack {
            index,
            input_dir,
            output,
        } => ageha_alf::repack(&index, &input_dir, &output),
        Command::Sys5iniDump { index } => run_dump(&index),
        Command::Sys5iniAddArchive {
            index,
            archive_name,
            input_dir,
            output,
        } => {
            ageha_alf::add_archive(&index, &archive_name, &input_dir, &output)?;
            println!("Modified index written to: {}", output.display());
            Ok(())
        }
        Command::Agf2bmp { input, output } => run_agf2bmp(&input, output),
        Command::Bmp2agf {
            input,
            output,
            reference,
        } => run_bmp2agf(&input, output, reference),
    }
}

fn run_disasm(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    dir: Option<PathBuf>,
    verify: bool,
) -> Result<()> {
    if let Some(dir) = dir {
        let mut processed = 0;
        let mut errors = 0;
        for path in files_with_extension(&dir, "bin")? {
            let out = path.with_extension("txt");
            match disasm_file(&path, &out, verify) {
                Ok(()) => processed += 1,
                Err(err) => {
                    eprintln!("error processing {}: {:?}", path.display(), err);
                    errors += 1;
                }
            }
        }
        println!("Processed {} files, {} errors", processed, errors);
        return Ok(());
    }

    let input = input.context("either --dir or a file path is required")?;
    let output = output.unwrap_or_else(|| input.with_extension("txt"));
    disasm_file(&input, &output, verify)
}

fn disasm_file(input: &Path, output: &Path, verify: bool) -> Result<()> {
    let data = std::fs::read(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    if verify {
        match ageha_assembler::verify_round_trip(&data) {
            Ok(true) => println!("Verify OK: {}", input.display()),
            Ok(false) => println!("Verify MISMATCH: {}", input.display()),
            Err(err) => println!("Verify failed for {}: {:?}", input.display(), err),
        }
    }

    let script = ageha_disassembler::disassemble(&data)
        .with_context(|| format!("failed to disassemble {}", input.display()))?;
    let text = ageha_disassembler::render(&script);
    std::fs::write(output, text)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Disassembled {} -> {} ({} instructions)",
        input.display(),
        output.display(),
        script.instructions.len()
    );
    Ok(())
}

fn run_asm(input: Option<PathBuf>, output: Option<PathBuf>, dir: Option<PathBuf>) -> Result<()> {
    if let Some(dir) = dir {
        let mut processed = 0;
        let mut errors = 0;
        for path in files_with_extension(&dir, "txt")? {
            let out = path.with_extension("BIN");
            match asm_file(&path, &out) {
                Ok(()) => processed += 1,
                Err(err) => {
                    eprintln!("error processing {}: {:?}", path.display(), err);
                    errors += 1;
                }
            }
        }
        println!("Processed {} files, {} errors", processed, errors);
        return Ok(());
    }

    let input = input.context("either --dir or a file path is required")?;
    let output = output.unwrap_or_else(|| input.with_extension("BIN"));
    asm_file(&input, &output)
}

fn asm_file(input: &Path, output: &Path) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let data = ageha_assembler::assemble(&text)
        .with_context(|| format!("failed to assemble {}", input.display()))?;
    std::fs::write(output, &data)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Assembled {} -> {} ({} bytes)",
        input.display(),
        output.display(),
        data.len()
    );
    Ok(())
}

fn run_extract(index: &Path, output: PathBuf, filter: Option<String>) -> Result<()> {
    let archive = ageha_alf::Archive::open(index)?;
    println!("Extracting: {}", archive.header.title);
    println!("Format: {}", archive.header.signature);
    println!("Archives: {}", archive.sources.len());
    println!("Files: {}", archive.entries.len());
    if let Some(filter) = &filter {
        println!("Filter: {}", filter);
    }

    archive.extract(&ageha_alf::ExtractOptions {
        output_dir: output,
        filter,
    })?;
    println!("Extraction complete");
    Ok(())
}

fn run_dump(index: &Path) -> Result<()> {
    let data = std::fs::read(index)
        .with_context(|| format!("failed to read {}", index.display()))?;
    let (header, names, entries) = ageha_alf::parse_index(&data)?;

    println!("File: {}", index.display());
    println!("Format: {:?} ({})", header.version, header.signature);
    if !header.title.is_empty() {
        println!("Title: {}", header.title);
    }
    println!("Compressed: {}", header.is_compressed());
    println!();

    println!("Archives ({}):", names.len());
    for (i, name) in names.iter().enumerate() {
        println!("  [{}] {}", i, name);
    }
    println!();

    println!("Files: {} total", entries.len());
    let mut per_archive: HashMap<u32, usize> = HashMap::new();
    for entry in &entries {
        *per_archive.entry(entry.archive_index).or_default() += 1;
    }
    for (i, name) in names.iter().enumerate() {
        if let Some(count) = per_archive.get(&(i as u32)) {
            println!("  {}: {} files", name, count);
        }
    }
    println!();

    println!("Sample files (first 20):");
    for (i, entry) in entries.iter().enumerate() {
        if i >= 20 {
            println!("  ... and {} more files", entries.len() - 20);
            break;
        }
        let archive_name = names
            .get(entry.archive_index as usize)
            .map_or("UNKNOWN", String::as_str);
        println!(
            "  [{}] {} (archive: {}, offset: 0x{:X}, size: {} bytes)",
            entry.file_index, entry.name, archive_name, entry.offset, entry.length
        );
    }
    Ok(())
}

fn run_agf2bmp(input: &Path, output: Option<PathBuf>) -> Result<()> {
    if input.is_dir() {
        let out_dir = output.unwrap_or_else(|| append_suffix(input, "_BMP"));
        let mut count = 0;
        for path in files_with_extension(input, "agf")? {
            let relative = path.strip_prefix(input).expect("walked under input");
            let out = out_dir.join(relative).with_extension("BMP");
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match agf2bmp_file(&path, &out) {
                Ok(()) => count += 1,
                Err(err) => eprintln!("warning: {:?}", err),
            }
        }
        println!("Converted {} files", count);
        return Ok(());
    }

    let output = output.unwrap_or_else(|| input.with_extension("BMP"));
    agf2bmp_file(input, &output)
}

fn agf2bmp_file(input: &Path, output: &Path) -> Result<()> {
    let data = std::fs::read(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let result = ageha_agf::unpack(&data)
        .with_context(|| format!("failed to unpack {}", input.display()))?;
    std::fs::write(output, result.to_bmp())
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Converted: {}", output.display());
    Ok(())
}

fn run_bmp2agf(input: &Path, output: Option<PathBuf>, reference: Option<PathBuf>) -> Result<()> {
    if input.is_dir() {
        let out_dir = output.unwrap_or_else(|| append_suffix(input, "_AGF"));
        let ref_dir = reference.unwrap_or_else(|| input.to_path_buf());
        let mut count = 0;
        for path in files_with_extension(input, "bmp")? {
            let relative = path.strip_prefix(input).expect("walked under input");
            let reference = ref_dir.join(relative).with_extension("AGF");
            if !reference.is_file() {
                eprintln!("warning: no reference AGF for {}", path.display());
                continue;
            }
            let out = out_dir.join(relative).with_extension("AGF");
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match bmp2agf_file(&path, &out, &reference) {
                Ok(()) => count += 1,
                Err(err) => eprintln!("warning: {:?}", err),
            }
        }
        println!("Converted {} files", count);
        return Ok(());
    }

    let output = output.unwrap_or_else(|| input.with_extension("AGF"));
    let reference = match reference {
        Some(reference) => reference,
        None => {
            let guess = input.with_extension("AGF");
            if !guess.is_file() {
                bail!(
                    "original AGF not found, use --reference to specify: {}",
                    guess.display()
                );
            }
            guess
        }
    };
    bmp2agf_file(input, &output, &reference)
}

fn bmp2agf_file(input: &Path, output: &Path, reference: &Path) -> Result<()> {
    let reference_data = std::fs::read(reference)
        .with_context(|| format!("failed to read {}", reference.display()))?;
    let unpacked = ageha_agf::unpack(&reference_data)
        .with_context(|| format!("failed to unpack reference {}", reference.display()))?;

    let bmp = std::fs::read(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let agf = ageha_agf::pack(&bmp, &unpacked)
        .with_context(|| format!("failed to pack {}", input.display()))?;
    std::fs::write(output, agf)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Converted: {}", output.display());
    Ok(())
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    name.push_str(suffix);
    path.with_file_name(name)
}

/// Walks a directory and returns every file whose extension matches,
/// case-insensitively.
fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case(extension));
        if matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
