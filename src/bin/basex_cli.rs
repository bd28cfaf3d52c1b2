use std::{error::Error, io, sync::Arc};

use clap::Parser;
use log::warn;

use basex_client::{
    ConnectOptions, Session,
    cli::{Command, prompt},
    connection::{DEFAULT_ENCODING, DEFAULT_HOST, DEFAULT_PORT},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server host name or address
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    /// Server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// User to authenticate as
    #[arg(short, long)]
    username: String,
    /// Password of the user
    #[arg(short, long, env = "BASEX_PASSWORD")]
    password: String,
    /// Text encoding used on the wire
    #[arg(long, default_value = DEFAULT_ENCODING)]
    encoding: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let options = ConnectOptions::new(cli.username, cli.password)
        .host(cli.host)
        .port(cli.port)
        .encoding(cli.encoding);

    let session = Arc::new(Session::connect(&options)?);
    println!("connected to {}", session.connection());

    let handle = Arc::clone(&session);
    ctrlc::set_handler(move || {
        handle.connection().close();
        std::process::exit(130);
    })?;

    let stdin = io::stdin();
    let stdout = io::stdout();

    loop {
        let cmd = match prompt(stdin.lock(), stdout.lock()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        let out = match cmd {
            Command::Exit => break,
            Command::Empty => continue,
            Command::Execute(command) => session.command(command),
            Command::Query(text) => run_query(&session, &text),
        };

        match out {
            Ok(out) if out.is_empty() => {}
            Ok(out) => println!("{out}"),
            Err(e) if e.is_server_error() => eprintln!("error: {e}"),
            Err(e) => {
                warn!("session lost: {e}");
                return Err(e.into());
            }
        }
    }

    session.connection().close();
    Ok(())
}

fn run_query(session: &Session, text: &str) -> basex_client::Result<String> {
    let query = session.query(text)?;
    let result = query.execute();
    query.close()?;
    result
}
