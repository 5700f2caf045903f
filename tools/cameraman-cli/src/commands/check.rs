//! Check configuration and environment.

use std::path::{Path, PathBuf};

pub fn run(config: Option<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    println!("Cameraman Check");
    println!("{}", "=".repeat(50));

    let config = super::load_config(config, verbose)?;
    println!("[OK] Configuration valid");
    println!("     {} cameras configured", config.cameras.len());
    for camera in &config.cameras {
        println!("     no.{} at {}", camera.number, camera.address);
    }

    let mut all_ok = true;

    match check_output_dir(&config.output_dir) {
        Ok(()) => println!("[OK] Output directory writable: {}", config.output_dir.display()),
        Err(e) => {
            all_ok = false;
            println!(
                "[FAIL] Output directory {} unusable: {e}",
                config.output_dir.display()
            );
        }
    }

    match find_program(&config.capture.program) {
        Some(path) => println!("[OK] Capture program: {}", path.display()),
        None => {
            all_ok = false;
            println!("[FAIL] Capture program not found: {}", config.capture.program);
        }
    }

    if config.auth.tokens.is_empty() {
        println!("[WARN] No API tokens configured; start and stop will be rejected");
    } else {
        println!("[OK] API tokens configured: {}", config.auth.tokens.len());
    }

    println!();
    if all_ok {
        println!("All checks passed. Cameraman is ready.");
        Ok(())
    } else {
        anyhow::bail!("Some checks failed. See above for details.")
    }
}

fn check_output_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(".cameraman-write-check");
    std::fs::write(&probe, b"ok")?;
    std::fs::remove_file(probe)
}

/// Resolve a program name the way the OS would when spawning it.
fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        let full = dir.join(program);
        if full.is_file() {
            return Some(full);
        }
        let exe = full.with_extension(std::env::consts::EXE_EXTENSION);
        exe.is_file().then_some(exe)
    })
}
