use hearth::config::Config;
use hearth::http::file::FileOptions;
use hearth::router::middleware;
use hearth::{HttpError, Router, Server};
use serde_json::json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::load(),
    };

    let server = build_server(&cfg);

    tokio::select! {
        res = server.serve() => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn build_server(cfg: &Config) -> Server {
    let mut server = Server::from_config(cfg);

    server.add_middleware(middleware::request_logger());

    server.get("/", |_req, res| {
        res.send("Hello from Hearth\n");
        Ok(())
    });

    server.get("/health", |_req, res| {
        res.json(&json!({ "status": "ok" }));
        Ok(())
    });

    server.get("/files/:name", |req, res| {
        let name = req.param("name").unwrap_or_default();
        if name.contains("..") {
            return Err(HttpError::bad_request("Invalid file name").into());
        }
        res.send_file(format!("public/{name}"), &FileOptions::default())
    });

    let mut api = Router::new();
    api.get("/echo/:word", |req, res| {
        res.json(&json!({
            "word": req.param("word"),
            "query": req.query,
        }));
        Ok(())
    });
    api.post("/echo", |req, res| {
        res.json(&req.json());
        Ok(())
    });
    server.mount("/api", api);

    server
}
