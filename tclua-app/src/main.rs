use std::env;
use tclua::Interp;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    init_logging();

    // FIRST, get the command line arguments.
    let args: Vec<String> = env::args().collect();

    // NEXT, create the interpreter.
    let mut interp = Interp::new();

    // NEXT, if there's at least one then it's a script to run; otherwise, start the REPL.
    if args.len() > 1 {
        tclua_shell::script(&mut interp, &args[1..]);
    } else {
        println!("Tclua {}", env!("CARGO_PKG_VERSION"));
        tclua_shell::repl(&mut interp);
    }
}

/// Installs a log subscriber filtered by `RUST_LOG`, if it is set.
fn init_logging() {
    if env::var_os("RUST_LOG").is_none() {
        return;
    }

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(EnvFilter::from_default_env())
        .init();
}
