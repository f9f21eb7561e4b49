use gisp::{Binding, Gisp};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("Gisp Interpreter v{}", env!("CARGO_PKG_VERSION"));
    println!("Type expressions to evaluate them, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    };
    let mut gisp = Gisp::with_core();

    loop {
        match rl.readline("gisp> ") {
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
                        print_environment(&gisp);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                // Forms before a failing one keep their effects
                match gisp.parse(line) {
                    Ok(result) => println!("{}", result),
                    Err(e) => println!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted. Use Ctrl+D or :quit to exit.");
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
}

fn print_help() {
    println!("Gisp Interpreter Commands:");
    println!("  :help    - Show this help message");
    println!("  :env     - Show current environment bindings");
    println!("  :quit    - Exit the interpreter");
    println!("  :exit    - Exit the interpreter");
    println!();
    println!("Supported features:");
    println!("  Numbers: 42, 3.14, -5");
    println!("  Booleans and nil: true, false, nil");
    println!("  Strings: \"hello world\"");
    println!("  Quoted atoms: 'name");
    println!("  Typed atoms: x::int, y::string?");
    println!("  Indexing: xs[0], xs[-1], xs[1:3], xs[0:4:2], m[\"key\"]");
    println!("  Builtins: + - * < > = not list dict len");
    println!("  Special forms: var, set");
    println!();
    println!("Examples:");
    println!("  (var xs (list 10 20 30))");
    println!("  xs[1:3]");
    println!("  (set xs[0] 99)");
    println!("  (var m::map (dict \"a\" 1))");
    println!("  m[\"a\"]");
}

fn print_environment(gisp: &Gisp) {
    let bindings = gisp.bindings();
    if bindings.is_empty() {
        println!("(no local bindings)");
        return;
    }
    for (name, binding) in bindings {
        match binding {
            Binding::Var(slot) => println!("  {}::{} = {}", name, slot.ty(), slot.get()),
            Binding::Function(function) => {
                println!("  {} <{} overloads>", name, function.overload_count())
            }
        }
    }
}
