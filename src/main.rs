use clap::Parser;
use invoice_seal::batch::{self, BatchHalt, BatchReport};
use invoice_seal::config::{Args, Settings};
use invoice_seal::files;
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Args::parse().resolve();
    let geometry = match settings.geometry() {
        Ok(geometry) => geometry,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("🔧 Preparing folders...");
    if let Err(e) = files::ensure_folders(&[
        settings.input_directory.as_path(),
        settings.output_directory.as_path(),
    ]) {
        error!("Could not prepare folders: {e}");
        return ExitCode::FAILURE;
    }

    println!("🚀 Signing invoices...");
    println!("{}", "=".repeat(60));

    let report = batch::run_batch(&settings, &geometry);

    println!("\n{}", "=".repeat(60));
    print_summary(&report);
    print_tips(&settings);

    // Per-file failures are part of a normal run; only a halted batch fails.
    match report.halt {
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::SUCCESS,
    }
}

fn print_summary(report: &BatchReport) {
    let signed = report.signed_names();
    if signed.is_empty() {
        println!("⚠️ No files were processed");
    } else {
        println!("🎉 Finished: {} file(s) signed", signed.len());
        println!("📂 Signed files:");
        for name in &signed {
            println!("   ✓ {name}");
        }
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("❌ {} file(s) failed:", failures.len());
        for (source, err) in failures {
            println!("   ✗ {}: {}", source.display(), err);
        }
    }

    match &report.halt {
        Some(BatchHalt::StampImageMissing(path)) => {
            println!("❌ Stamp image not found: {}", path.display())
        }
        Some(BatchHalt::NoInputFiles(path)) => {
            println!("❌ No PDF files found in: {}", path.display())
        }
        Some(BatchHalt::OutputDirectory { path, reason }) => {
            println!("❌ Output folder unavailable: {} ({reason})", path.display())
        }
        None => {}
    }
}

fn print_tips(settings: &Settings) {
    println!("\n💡 Tips:");
    println!("1. Put the PDF invoices in '{}'", settings.input_directory.display());
    println!("2. Make sure the seal image '{}' exists", settings.stamp_image_path.display());
    println!("3. Signed copies appear in '{}'", settings.output_directory.display());
}
