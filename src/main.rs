use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use quill::ast_printer::AstPrinter;
use quill::parser::Parser;
use quill::scanner::Scanner;
use quill::session::Session;

#[derive(ClapParser, Debug)]
#[command(version, about = "Quill language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Emit the token stream as JSON instead of the plain listing
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Runs input from a file as a Quill program
    Run {
        filename: PathBuf,

        /// Report warnings (unused variables and kin)
        #[arg(short = 'w', long)]
        warnings: bool,
    },

    /// Starts an interactive session
    Repl {
        /// Report warnings (unused variables and kin)
        #[arg(short = 'w', long)]
        warnings: bool,
    },
}

/// Reads the contents of a file into a String
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("quill::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // default Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            info!("Running Tokenize subcommand");

            let source = read_file(&filename)?;
            let scanner = Scanner::new(&source);
            let mut tokenized = true;

            for result in scanner {
                match result {
                    Ok(token) => {
                        debug!("Scanned token: {}", token);

                        if json {
                            println!("{}", serde_json::to_string(&token)?);
                        } else {
                            println!("{}", token);
                        }
                    }

                    Err(e) => {
                        tokenized = false;

                        debug!("Tokenization error: {}", e);

                        eprintln!("{}", e);
                    }
                }
            }

            if !tokenized {
                debug!("Tokenization failed, exiting with code 65");

                std::process::exit(65);
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { filename } => {
            info!("Running Parse subcommand");

            let source = read_file(&filename)?;
            let tokens = match Scanner::new(&source).collect::<Result<Vec<_>, _>>() {
                Ok(tokens) => tokens,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(65);
                }
            };

            match Parser::new(tokens).parse_expression() {
                Ok(expr) => {
                    let ast_str = AstPrinter.print(&expr);

                    debug!("AST: {}", ast_str);
                    println!("{}", ast_str);
                }

                Err(e) => {
                    debug!("Parse error: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(65);
                }
            }

            info!("Parse subcommand completed");
        }

        Commands::Run { filename, warnings } => {
            info!("Running Run subcommand");

            let source = read_file(&filename)?;

            let mut session = Session::new();
            session.report_warnings = warnings;

            match session.run(&source) {
                Ok(produced_warnings) => {
                    if warnings {
                        for warning in produced_warnings {
                            println!("{}", warning);
                        }
                    }
                    info!("Program executed successfully");
                }

                Err(e) => {
                    debug!("Run error: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(e.exit_code());
                }
            }
        }

        Commands::Repl { warnings } => {
            info!("Starting REPL");

            let mut session = Session::new();
            session.report_warnings = warnings;

            repl(&mut session)?;
        }
    }

    Ok(())
}

/// Read-eval-print loop. Lines ending in `;` run as statements; anything
/// else is evaluated as a single expression and its value echoed. Errors
/// are reported and the prompt continues.
fn repl(session: &mut Session) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // Ctrl-D
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.ends_with(';') || line.ends_with('}') {
            match session.run(line) {
                Ok(produced_warnings) => {
                    if session.report_warnings {
                        for warning in produced_warnings {
                            println!("{}", warning);
                        }
                    }
                }
                Err(e) => println!("{}", e),
            }
        } else {
            match session.run_expression(line) {
                Ok(rendered) => println!("{}", rendered),
                Err(e) => println!("{}", e),
            }
        }
    }

    Ok(())
}
