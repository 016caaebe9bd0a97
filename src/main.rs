use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use clap::Subcommand;
use miette::IntoDiagnostic;
use miette::WrapErr;
use tiny_interpreter::Interpreter;
use tiny_interpreter::Lexer;
use tiny_interpreter::lex::EscapeError;
use tiny_interpreter::lex::SingleTokenError;
use tiny_interpreter::lex::StringTerminationError;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print every token in the file, one per line
    Tokenize { filename: PathBuf },
    /// Run the program in the file
    Run {
        filename: PathBuf,
        /// Do not print the success message after the program finishes
        #[arg(short, long)]
        quiet: bool,
    },
}

fn read(filename: &Path) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Tokenize { filename } => {
            let file_contents = read(&filename)?;

            for token in Lexer::new(filename.to_str(), &file_contents) {
                let token = match token {
                    Ok(token) => token,
                    Err(e) => {
                        let line = if let Some(error) = e.downcast_ref::<SingleTokenError>() {
                            Some((error.line(), format!("Invalid character: {}", error.token)))
                        } else if let Some(error) = e.downcast_ref::<EscapeError>() {
                            Some((error.line(), "Incomplete escape sequence".to_string()))
                        } else {
                            e.downcast_ref::<StringTerminationError>()
                                .map(|error| (error.line(), "Unterminated string".to_string()))
                        };
                        if let Some((line, message)) = line {
                            eprintln!("[line {line}] Error: {message}");
                            eprintln!("{e:?}");
                            std::process::exit(65);
                        }
                        return Err(e);
                    }
                };
                println!("{token}");
            }
        }
        Commands::Run { filename, quiet } => {
            let file_contents = read(&filename)?;

            let mut interpreter =
                Interpreter::new(filename.to_str(), &file_contents, io::stdout().lock())?;
            interpreter.run()?;

            if !quiet {
                let mut out = interpreter.into_output();
                writeln!(out, "Program parsed successfully.").into_diagnostic()?;
            }
        }
    }
    Ok(())
}
