use smallsh::Interpreter;
use smallsh::config::Options;
use std::process::ExitCode;

fn main() -> ExitCode {
    let options: Options = argh::from_env();
    let default_filter = if options.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut sh = Interpreter::new(options.into_config());
    if let Err(err) = sh.install_signal_posture() {
        eprintln!("smallsh: cannot install signal handlers: {}", err);
        return ExitCode::FAILURE;
    }

    match sh.repl() {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("smallsh: {:#}", err);
            sh.shutdown();
            ExitCode::FAILURE
        }
    }
}
