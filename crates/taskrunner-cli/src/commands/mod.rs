pub mod config;
pub mod run;
pub mod status;
pub mod wait;

use taskrunner_core::Diagnostic;

/// Report a failed run: JSON on stdout, or text on stderr.
pub fn print_diagnostic(diagnostic: &Diagnostic, json: bool) -> anyhow::Result<()> {
    if json {
        let output = serde_json::json!({
            "outcome": "failure",
            "summary": diagnostic.summary,
            "detail": diagnostic.detail,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!("Error: {}", diagnostic.summary);
        eprintln!("  {}", diagnostic.detail);
    }
    Ok(())
}
