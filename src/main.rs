use anyhow::{bail, Result};
use env_logger::Env;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = std::env::args().collect::<Vec<_>>();
    match args.len() {
        0 | 1 => bail!("Missing <command> and <file>"),
        2 => bail!("Missing <file>"),
        _ => {}
    }

    let command = &args[1];
    let target = &args[2];

    match command.as_str() {
        "verify" => {
            let dump = args.get(3).map(String::as_str) == Some("--dump");
            let mut progress = |name: &str, count: u64| {
                log::info!("verify progress: {name} at {count} pages");
            };

            let report = if dump {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                btverify::verify_dump(target, Some(&mut progress), &mut lock)?
            } else {
                btverify::verify(target, Some(&mut progress))?
            };

            println!("{target}: OK ({} pages verified)", report.pages_verified);
            Ok(())
        }
        _ => bail!("Unknown command: {command}"),
    }
}
