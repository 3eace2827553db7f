//! Minimal end-to-end demo: the reference runtime driving a handler through
//! the dispatch bridge.
//!
//! Run with `cargo run --example hello`, then:
//! `curl -i 'http://127.0.0.1:8080/items?a=1&b=2'`

use gantry::{HandlerError, JsonBody, Request, Response, Server};
use serde::Serialize;

#[derive(Serialize)]
struct Echo {
    method: String,
    uri: String,
    query: Option<String>,
    remote: String,
}

fn echo(req: &mut dyn Request) -> Result<Response, HandlerError> {
    let echo = Echo {
        method: req.method(),
        uri: req.uri(),
        query: req.query_string(),
        remote: req.remote_addr(),
    };
    let body = JsonBody::new(&echo).map_err(HandlerError::new)?;
    Ok(Response::new(200).body(body))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry=debug".into()),
        )
        .init();

    let server = Server::bind("127.0.0.1:8080").await?;
    println!("Listening on http://{}", server.local_addr());
    server.run(echo).await?;
    Ok(())
}
