use std::error::Error;
use std::time::Duration;

use pipedis::client::Response;
use pipedis::config::{Config, ErrorPolicy};
use pipedis::Client;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();

    let server = std::env::var("REDIS_URL").unwrap_or_else(|_| "tcp://127.0.0.1:6379".into());
    let command: Vec<_> = std::env::args().skip(1).collect();
    if command.is_empty() {
        eprintln!("usage: runcmd <COMMAND> [ARGS...]");
        std::process::exit(2);
    }

    let config = Config::builder()
        .server(server.parse()?)
        .timeout(Duration::from_secs(5))
        .error_policy(ErrorPolicy::ReturnAsValue)
        .build();
    let mut client = Client::new(config);

    match client.raw_reply(&command).await? {
        Response::Ready(reply) => println!("{}", reply),
        Response::Failed(err) => println!("(error) {}", err),
        Response::Queued(_) => unreachable!("the client is not capturing"),
    }

    Ok(())
}
