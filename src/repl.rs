//! Interactive read-eval-print loop
//!
//! Lines starting with `:` are REPL commands; anything else is evaluated as
//! primer source against one long-lived [`Interpreter`].

use std::sync::Arc;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::config::Config;
use crate::diagnostics::{EvalError, SourceFile};
use crate::interp::{Interpreter, RandomSource};

const HELP: &str = "\
Commands:
  :help, :h      Show this help
  :quit, :q      Exit the REPL
  :vars          List bindings
  :types         List record types
  :reset         Forget all bindings and declared types
  :seed <n>      Restart random draws from seed <n>

Examples:
  let x: Int? = nil
  x ?? 5
  var town = Town(name: \"Munich\", citizens: [])
  town.citizens.append(\"Richard\")
  Int.random(in: 1...3)";

/// Result of handling one input line
#[derive(Debug, PartialEq)]
pub enum Step {
    /// Text to show the user
    Output(String),
    /// Evaluation failed
    Error(EvalError),
    /// Nothing to show
    Silent,
    Quit,
}

pub struct Repl {
    interpreter: Interpreter,
    rng: Arc<RandomSource>,
    config: Config,
}

impl Repl {
    pub fn new(config: Config) -> Self {
        Self::with_random(config, RandomSource::shared())
    }

    pub fn with_random(config: Config, rng: Arc<RandomSource>) -> Self {
        Self {
            interpreter: Interpreter::with_random(rng.clone()).quiet(),
            rng,
            config,
        }
    }

    /// Run until `:quit`, Ctrl-D or Ctrl-C
    pub fn run(&mut self) -> miette::Result<()> {
        let mut editor = DefaultEditor::new()
            .map_err(|e| miette::miette!("Failed to start line editor: {}", e))?;
        if let Some(path) = &self.config.history_file {
            // A missing history file is normal on first start
            let _ = editor.load_history(path);
        }

        println!("primer v{}", crate::VERSION);
        println!("Type :help for help, :quit to exit");
        println!();

        loop {
            let line = match editor.readline(&self.config.prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => return Err(miette::miette!("Failed to read input: {}", e)),
            };
            if line.trim().is_empty() {
                continue;
            }
            if let Err(e) = editor.add_history_entry(line.as_str()) {
                tracing::warn!("failed to add history entry: {}", e);
            }

            match self.handle(&line) {
                Step::Output(text) => println!("{}", text),
                Step::Error(err) => {
                    let report = SourceFile::new("<repl>", line.clone()).report(err);
                    eprintln!("{:?}", report);
                }
                Step::Silent => {}
                Step::Quit => break,
            }
        }

        if let Some(path) = &self.config.history_file {
            if let Err(e) = editor.save_history(path) {
                tracing::warn!("failed to save history to {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    /// Handle one line of input
    pub fn handle(&mut self, line: &str) -> Step {
        let trimmed = line.trim();
        if let Some(command) = trimmed.strip_prefix(':') {
            return self.command(command);
        }

        self.interpreter.clear_output();
        let result = self.interpreter.eval_source(line);

        let mut lines: Vec<String> = self.interpreter.get_output().to_vec();
        match result {
            Ok(Some(value)) => lines.push(value.to_string()),
            Ok(None) => {}
            Err(err) => return Step::Error(err),
        }

        if lines.is_empty() {
            Step::Silent
        } else {
            Step::Output(lines.join("\n"))
        }
    }

    fn command(&mut self, command: &str) -> Step {
        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("quit" | "q"), _) => Step::Quit,
            (Some("help" | "h"), _) => Step::Output(HELP.to_string()),
            (Some("vars"), _) => {
                let lines: Vec<String> = self
                    .interpreter
                    .env()
                    .bindings()
                    .map(|(name, binding)| {
                        let keyword = if binding.mutable { "var" } else { "let" };
                        match &binding.ty {
                            Some(ty) => format!("{} {}: {} = {}", keyword, name, ty, binding.value),
                            None => format!("{} {} = {}", keyword, name, binding.value),
                        }
                    })
                    .collect();
                if lines.is_empty() {
                    Step::Output("(no bindings)".to_string())
                } else {
                    Step::Output(lines.join("\n"))
                }
            }
            (Some("types"), _) => {
                let lines: Vec<String> = self
                    .interpreter
                    .env()
                    .records
                    .types()
                    .map(|ty| {
                        let fields: Vec<String> = ty
                            .fields
                            .iter()
                            .map(|f| format!("{} {}", if f.mutable { "var" } else { "let" }, f.name))
                            .collect();
                        format!("{:?} {} {{ {} }}", ty.kind, ty.name, fields.join("; "))
                    })
                    .collect();
                Step::Output(lines.join("\n"))
            }
            (Some("reset"), _) => {
                self.interpreter.reset();
                Step::Output("Environment reset".to_string())
            }
            (Some("seed"), Some(seed)) => match seed.parse::<u64>() {
                Ok(seed) => {
                    self.rng.reseed(seed);
                    Step::Output(format!("Random draws restarted from seed {}", seed))
                }
                Err(_) => Step::Output(format!("Not a seed: {}", seed)),
            },
            (Some(other), _) => Step::Output(format!(
                "Unknown command :{} (type :help for a list)",
                other
            )),
            (None, _) => Step::Silent,
        }
    }
}
