use lr35902asm::assembler::{self, EmittedRun};
use lr35902asm::logging::error;
use std::{env, fs};

/// Flatten emitted (address, bytes) runs into one contiguous image starting
/// at address 0, filling any gap between runs with `0x00` (§6: "suitable
/// for an object-file writer that is out of scope" — this CLI is that
/// writer, not the library).
fn build_image(runs: &[EmittedRun]) -> Vec<u8> {
    let end = runs
        .iter()
        .map(|(address, bytes)| *address as usize + bytes.len())
        .max()
        .unwrap_or(0);
    let mut image = vec![0u8; end];
    for (address, bytes) in runs {
        let start = *address as usize;
        image[start..start + bytes.len()].copy_from_slice(bytes);
    }
    image
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input.asm> <output.gb>", args[0]);
        std::process::exit(1);
    }

    let input_path = &args[1];
    let output_path = &args[2];

    let runs = assembler::assemble_from_file(input_path).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(2);
    });

    let image = build_image(&runs);

    fs::write(output_path, image).unwrap_or_else(|e| {
        error(format!("failed to write to output file: {}", e));
        std::process::exit(3);
    });
}
