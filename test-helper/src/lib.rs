use std::env;
use std::future::Future;
use std::time::Duration;

use pipedis::{Client, Config};

pub type BoxError = Box<dyn std::error::Error>;
pub type MainResult = Result<(), BoxError>;

/// Client to the server of the `REDIS_URL` env var, or `None` if it's not set.
pub fn client() -> Result<Option<Client>, BoxError> {
    let url = match env::var("REDIS_URL") {
        Ok(url) => url,
        Err(err) => {
            println!(
                "Failed to lookup `REDIS_URL` env var. Test aborted: {:?}",
                err
            );
            return Ok(None);
        }
    };
    let config = Config::builder()
        .server(url.parse()?)
        .timeout(Duration::from_secs(3))
        .build();
    Ok(Some(Client::new(config)))
}

/// Run the `f` with a client on a fresh runtime. Does nothing if `REDIS_URL` is not set.
pub fn with_client<F, Fut>(f: F) -> MainResult
where
    F: FnOnce(Client) -> Fut,
    Fut: Future<Output = MainResult>,
{
    let client = match client()? {
        Some(client) => client,
        None => return Ok(()),
    };

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(f(client))
}
