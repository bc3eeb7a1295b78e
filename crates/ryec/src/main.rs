//! Command-line driver for the Rye compiler.
//!
//! Compiles one source file to LLVM IR (default) or a native object
//! file. Linking the object against the runtime is left to the build
//! environment, e.g.:
//!
//! ```bash
//! ryec program.rye --object
//! cc program.o target/release/librye_runtime.a -o program
//! ```

use anyhow::Result;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        anyhow::bail!(
            "Usage: {} <source_file> [-o <path>] [--object] [--source-names] [--verbose-arc]",
            args[0]
        );
    }

    let mut options = ryec::CompileOptions::new(args[1].clone());

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-o" => {
                if i + 1 >= args.len() {
                    anyhow::bail!("-o requires an argument");
                }
                options.out_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--object" => {
                options.emit_object = true;
                i += 1;
            }
            "--source-names" => {
                options.use_fingerprints = false;
                i += 1;
            }
            "--verbose-arc" => {
                options.verbose_arc = true;
                i += 1;
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }

    let out = ryec::compile(&options)?;
    eprintln!("wrote {}", out);
    Ok(())
}
