//! Command-line interface for xslcheck

#[cfg(feature = "cli")]
use clap::Parser;

/// Exit code for a transformation that fails type preservation or validity
#[cfg(feature = "cli")]
const EXIT_INVALID: i32 = 1;

/// Exit code for a stylesheet outside the analyzable subset
#[cfg(feature = "cli")]
const EXIT_SUBSET_REJECTED: i32 = 2;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(author, version, about = "Statically validate an XSLT-subset transformation against a source/target XSD pair", long_about = None)]
struct Args {
    /// Source schema file
    #[arg(short, long)]
    source: String,

    /// Target schema file
    #[arg(short, long)]
    target: String,

    /// Stylesheet file
    #[arg(short = 'x', long)]
    stylesheet: String,

    /// Emit the full report as JSON
    #[arg(short, long)]
    json: bool,
}

#[cfg(feature = "cli")]
fn main() {
    use xslcheck::analysis::Analyzer;
    use xslcheck::trace::TraceLevel;

    let args = Args::parse();

    let request = match read_inputs(&args) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(EXIT_INVALID);
        }
    };

    let report = match Analyzer::new().analyze(&request) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(EXIT_INVALID);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: failed to serialize report: {}", e);
                std::process::exit(EXIT_INVALID);
            }
        }
    } else {
        println!("xslcheck v{}", xslcheck::VERSION);

        if report.rejected_by_linter() {
            println!("subset check: REJECTED");
            for diag in &report.subset_check.errors {
                println!("  error: {} (at {})", diag.message, diag.path);
            }
        } else {
            for diag in &report.subset_check.warnings {
                println!("  warning: {} (at {})", diag.message, diag.path);
            }
            if let Some(validation) = &report.type_validation {
                for entry in validation.proof.entries() {
                    let prefix = match entry.level {
                        TraceLevel::Info => "  ",
                        TraceLevel::Ok => "✓ ",
                        TraceLevel::Warn => "⚠ ",
                        TraceLevel::Error => "✗ ",
                    };
                    println!("{}{}", prefix, entry.message);
                }
            }
            if let Some(preimage) = &report.preimage {
                println!("\naccepted input patterns:");
                for pattern in &preimage.accepted_patterns {
                    println!("  {}", pattern);
                }
                for rejected in &preimage.rejected_patterns {
                    println!("  ✗ {} ({})", rejected.pattern, rejected.reason);
                }
            }
            if let Some(validity) = &report.validity {
                println!("\n{}", validity.explanation);
                for cx in &validity.counterexamples {
                    println!("\ncounterexample for {}:\n{}", cx.element, cx.example_xml);
                }
            }
        }

        println!(
            "\nresult: {}",
            if report.valid { "VALID" } else { "INVALID" }
        );
    }

    if report.rejected_by_linter() {
        std::process::exit(EXIT_SUBSET_REJECTED);
    }
    if !report.valid {
        std::process::exit(EXIT_INVALID);
    }
}

#[cfg(feature = "cli")]
fn read_inputs(args: &Args) -> xslcheck::Result<xslcheck::analysis::AnalysisRequest> {
    Ok(xslcheck::analysis::AnalysisRequest {
        source_schema: std::fs::read_to_string(&args.source)?,
        target_schema: std::fs::read_to_string(&args.target)?,
        stylesheet: std::fs::read_to_string(&args.stylesheet)?,
    })
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
