use micro_pipeline::filter::BodyFilter;
use micro_pipeline::{action_fn, respond, HttpError, Router, Server};
use serde_json::json;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut router = Router::new();
    router.get("/", action_fn(|_ctx| Ok(respond::ok("hello world"))))?;
    router.get("/hello/:name", action_fn(|ctx| {
        let name = ctx.path_params().get("name").unwrap_or("stranger");
        Ok(respond::ok(format!("hello {name}")))
    }))?;
    router.post("/echo", action_fn(|ctx| {
        let payload = ctx.payload().as_json().ok_or_else(|| HttpError::bad_request().with_cause("json body expected"))?;
        Ok(respond::json(http::StatusCode::OK, &json!({ "echo": payload })))
    }))?;

    Server::init_logging(Level::INFO);
    Server::builder().router(router).filter(BodyFilter).address("127.0.0.1:8080".parse()?).build().run().await?;
    Ok(())
}
