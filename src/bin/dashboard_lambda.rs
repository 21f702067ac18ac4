//! AWS Lambda HTTP handler serving the dashboard
//!
//! Query parameters mirror the sidebar and widgets:
//! `?section=regions`, `?section=univariate&var=risk_load`,
//! `?section=bivariate&x=risk_load&y=AAL_usd&color=occtype_grp`.
//! Set `RISK_LOAD_CONFIG` to a JSON config path to override the defaults.

use lambda_http::{run, service_fn, Body, Request, RequestExt, Response};
use lambda_runtime::Error;
use log::{error, info};
use risk_load_explorer::views::{alert, page, AlertKind};
use risk_load_explorer::{DashboardConfig, DashboardSession, Section, ViewRequest};
use std::path::Path;
use std::sync::Arc;

fn html_response(status: u16, html: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "text/html; charset=utf-8")
        .body(Body::from(html))?)
}

async fn function_handler(session: Arc<DashboardSession>, event: Request) -> Result<Response<Body>, Error> {
    let params = event.query_string_parameters();
    let request = match ViewRequest::from_params(params.iter()) {
        Ok(r) => r,
        Err(e) => {
            let body = alert(AlertKind::Error, &e.to_string());
            return html_response(400, page(Section::Overview, &body));
        }
    };
    info!("Request for section '{}'", request.section.slug());

    // Loading and fetching block, so keep them off the async workers
    let rendered = tokio::task::spawn_blocking(move || session.render(&request)).await?;
    match rendered {
        Ok(html) => html_response(200, html),
        Err(e) => {
            error!("Failed to render dashboard: {}", e);
            let body = alert(AlertKind::Error, &format!("No se pudo cargar el dataset: {}", e));
            html_response(500, page(Section::Overview, &body))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let config = match std::env::var("RISK_LOAD_CONFIG") {
        Ok(path) => DashboardConfig::from_json_file(Path::new(&path))?,
        Err(_) => DashboardConfig::default(),
    };
    let session = Arc::new(DashboardSession::new(config));

    run(service_fn(move |event: Request| {
        let session = Arc::clone(&session);
        async move { function_handler(session, event).await }
    }))
    .await
}
