use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use threadlisp::prelude::with_prelude;
use threadlisp::{Environment, Error, Value, create_global_env, eval, parse_program};

fn main() {
    threadlisp::init_tracing();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("threadlisp");
    println!("Enter expressions like: (+ 1 2) or (defn sq (x) (* x x))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut env = match with_prelude(&create_global_env()) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Could not load the prelude: {e}");
            process::exit(1);
        }
    };

    loop {
        match rl.readline("threadlisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&env);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match eval_line(line, &env) {
                    Ok((values, next)) => {
                        // Definitions evaluate to null; there is nothing to show for them
                        for value in values.iter().filter(|v| !matches!(v, Value::Null)) {
                            println!("{value}");
                        }
                        env = next;
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

/// Evaluate each expression on the line in turn, keeping their definitions.
/// Nothing is kept when any of them fails.
fn eval_line(line: &str, env: &Environment) -> Result<(Vec<Value>, Environment), Error> {
    let mut env = env.clone();
    let mut values = Vec::new();
    for expr in parse_program(line)? {
        let (value, next) = eval(&expr, &env)?;
        values.push(value);
        env = next;
    }
    Ok((values, env))
}

fn print_help() {
    println!("threadlisp REPL:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Special forms:");
    println!("  (def name value)               bind a name for the rest of the session");
    println!("  (fn (params ...) body)         a function; free names resolve at the call site");
    println!("  (if test then [else])");
    println!("  (macro name (::p ...) body)    textual macro");
    println!();
    println!("Builtins: + - * / ^ < not = arrayOf append reduce print");
    println!("Prelude:  defn or and > >= <= != map filter");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 3)");
    println!("  ([10 20 30] 1)");
    println!("  (defn sq (x) (* x x))");
    println!("  (map sq [1 2 3])");
    println!("  ((print 1) (print 2))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in functions from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Builtin { .. } => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("Values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
        println!();
    }

    let macros = env.macro_names();
    if !macros.is_empty() {
        println!("Macros ({}):", macros.len());
        for name in macros {
            if let Some(definition) = env.macro_named(&name) {
                println!("  ({name} {}) => {}", definition.params().join(" "), definition.body());
            }
        }
    }
}
